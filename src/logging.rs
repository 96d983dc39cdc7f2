//! Logging setup: `tracing-subscriber` with an `EnvFilter`, writing either
//! to stderr or to the file named by `--log`.
//!
//! Simplified from the OTel-capable pipeline this is descended from — no
//! exporters, no span propagation, just structured-enough output that maps
//! onto the upstream tool's `-v`/`-q`/`--log` flags.

use std::fs::File;
use std::path::Path;
use std::sync::{Arc, Mutex};

use tracing_subscriber::EnvFilter;

/// What the `-v`/`-q` flags resolved to, independent of how many times
/// `-v` was repeated or which keyword variant was used.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Verbosity {
    /// `--quiet`: errors only.
    Quiet,
    /// Default: warnings and above.
    Normal,
    /// `-v`/`--verbose`: info and above (`revs`, `commits`).
    Verbose,
    /// `-v -v` or `--verbose=all`/`dump_all`: every trace-level event,
    /// including full diff dumps.
    Dump,
}

impl Verbosity {
    const fn level_str(self) -> &'static str {
        match self {
            Self::Quiet => "error",
            Self::Normal => "warn",
            Self::Verbose => "info",
            Self::Dump => "trace",
        }
    }
}

/// A shared, lockable file handle usable as a `tracing-subscriber` writer.
#[derive(Clone)]
struct SharedFile(Arc<Mutex<File>>);

impl std::io::Write for SharedFile {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap_or_else(std::sync::PoisonError::into_inner).write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.0.lock().unwrap_or_else(std::sync::PoisonError::into_inner).flush()
    }
}

/// Install a global subscriber. `log_file`, if given, receives output
/// instead of stderr.
///
/// # Errors
/// Returns the `std::io::Error` from opening `log_file`, if given.
pub fn init(verbosity: Verbosity, log_file: Option<&Path>) -> std::io::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(verbosity.level_str()));

    if let Some(path) = log_file {
        let file = SharedFile(Arc::new(Mutex::new(File::create(path)?)));
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(move || file.clone())
            .with_ansi(false)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
    }
    Ok(())
}
