//! Converts a Mercurial-style repository history into an equivalent Git
//! history.
//!
//! This binary wires the pure conversion engine ([`hg2git_core`]) to a
//! concrete history source ([`reader_jsonl::JsonlReader`]) and a concrete
//! git backend ([`hg2git_git::GixSink`]), and maps its own exit status onto
//! the upstream tool's convention: `0` success, `1` missing input, `2`
//! target-repository error, `128` history or config parse failure, `130`
//! user interrupt.

mod logging;
mod progress_cli;
mod reader_jsonl;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use clap::{ArgAction, Parser, ValueEnum};
use hg2git_core::commit::CommitOptions;
use hg2git_core::config::{BranchMap, ProjectConfig, ProjectMapping};
use hg2git_core::orchestrator::{Orchestrator, RunError};
use hg2git_git::GixSink;

use logging::Verbosity;
use progress_cli::RateLimitedProgress;
use reader_jsonl::{JsonlReader, JsonlReaderError};

/// Convert a Mercurial-style repository history into an equivalent Git
/// history.
#[derive(Parser, Debug)]
#[command(name = "hg2git", version, about)]
struct Cli {
    /// Mercurial repository root directory (a JSON-lines changeset stream,
    /// or a directory containing `revisions.jsonl`).
    in_repository: PathBuf,

    /// Logfile destination; defaults to stderr.
    #[arg(long)]
    log: Option<PathBuf>,

    /// Log verbosity.
    #[arg(short, long = "verbose", action = ArgAction::Append, value_enum)]
    verbose: Vec<VerboseLevel>,

    /// Revision id to stop input processing at (inclusive).
    #[arg(short = 'e', long = "end-revision", value_name = "REV")]
    end_revision: Option<String>,

    /// Suppress progress indication.
    #[arg(short, long)]
    quiet: bool,

    /// Forces progress indication when not detected as on a terminal, and
    /// optionally sets the update period in seconds.
    #[arg(long, value_name = "SEC", num_args = 0..=1, default_missing_value = "1.0")]
    progress: Option<f64>,

    /// XML file to configure conversion to a Git repository.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Namespace for branches.
    #[arg(long, default_value = "refs/heads/")]
    branches: String,

    /// Namespace for tags.
    #[arg(long, default_value = "refs/tags/")]
    tags: String,

    /// Convert `.hgignore` files to `.gitignore`.
    #[arg(long)]
    convert_hgignore: bool,

    /// Convert `.hgeol` files to `.gitattributes`.
    #[arg(long)]
    convert_hgeol: bool,

    /// Don't use the built-in default mapping (`refs/heads/*`,
    /// `refs/tags/*`). Mappings must then come entirely from `--config`.
    #[arg(long)]
    no_default_config: bool,

    /// Process only selected projects. The value is a Git-style globspec;
    /// may be given multiple times.
    #[arg(long = "project", value_name = "GLOB")]
    project_filter: Vec<String>,

    /// Target Git repository to write the conversion result into.
    #[arg(long)]
    target_repository: Option<PathBuf>,

    /// Extra taglines to add to commit messages.
    #[arg(long, value_enum, action = ArgAction::Append)]
    decorate_commit_message: Vec<DecorateTag>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum VerboseLevel {
    Dump,
    DumpAll,
    Revs,
    Commits,
    All,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum DecorateTag {
    #[value(name = "revision-id")]
    RevisionId,
}

impl Cli {
    fn verbosity(&self) -> Verbosity {
        if self.quiet {
            return Verbosity::Quiet;
        }
        if self.verbose.contains(&VerboseLevel::DumpAll) {
            Verbosity::Dump
        } else if self.verbose.contains(&VerboseLevel::Dump) || self.verbose.contains(&VerboseLevel::All) {
            Verbosity::Dump
        } else if !self.verbose.is_empty() {
            Verbosity::Verbose
        } else {
            Verbosity::Normal
        }
    }

    fn commit_options(&self) -> CommitOptions {
        CommitOptions {
            decorate_revision_id: self.decorate_commit_message.contains(&DecorateTag::RevisionId),
        }
    }

    fn progress_interval(&self) -> Option<Duration> {
        if self.quiet {
            return None;
        }
        self.progress.map(Duration::from_secs_f64).or_else(RateLimitedProgress::default_interval_if_tty)
    }
}

/// Exit status this process should use, matching the upstream tool's
/// convention.
#[derive(Debug, thiserror::Error)]
enum AppError {
    #[error("{}", .0.display())]
    MissingInput(PathBuf),
    #[error("{0}")]
    Repository(String),
    #[error("{0}")]
    HistoryOrConfig(String),
}

impl AppError {
    const fn exit_code(&self) -> u8 {
        match self {
            Self::MissingInput(_) => 1,
            Self::Repository(_) => 2,
            Self::HistoryOrConfig(_) => 128,
        }
    }
}

impl From<JsonlReaderError> for AppError {
    fn from(e: JsonlReaderError) -> Self {
        match e {
            JsonlReaderError::NotFound(path) | JsonlReaderError::Io { path, .. } => Self::MissingInput(path),
            JsonlReaderError::Parse { .. } => Self::HistoryOrConfig(e.to_string()),
        }
    }
}

impl From<RunError<JsonlReaderError>> for AppError {
    fn from(e: RunError<JsonlReaderError>) -> Self {
        match e {
            RunError::Reader(inner) => inner.into(),
            RunError::History(inner) => Self::HistoryOrConfig(inner.to_string()),
        }
    }
}

impl From<hg2git_core::config::ConfigError> for AppError {
    fn from(e: hg2git_core::config::ConfigError) -> Self {
        Self::HistoryOrConfig(e.to_string())
    }
}

impl From<hg2git_git::GitError> for AppError {
    fn from(e: hg2git_git::GitError) -> Self {
        Self::Repository(e.to_string())
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if logging::init(cli.verbosity(), cli.log.as_deref()).is_err() {
        eprintln!("ERROR: could not open log file {:?}", cli.log);
        return ExitCode::from(1);
    }

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("ERROR: {e}");
            let code = e.downcast_ref::<AppError>().map_or(1, AppError::exit_code);
            ExitCode::from(code)
        }
    }
}

/// The built-in default mapping, with the branch/tag namespaces the
/// upstream tool lets `--branches`/`--tags` override (the default
/// `refs/heads/main` is specific to the `"default"` branch name; any other
/// source branch maps 1:1 under the configured namespace).
fn default_mapping(branches_prefix: &str, tags_prefix: &str) -> ProjectMapping {
    ProjectMapping {
        projects: vec![ProjectConfig {
            name: "default".to_owned(),
            branches: vec![
                BranchMap {
                    glob: "default".to_owned(),
                    refname_template: format!("{branches_prefix}main"),
                    revisions_ref_template: None,
                    edit_rules: Vec::new(),
                    tag_map: vec![("*".to_owned(), format!("{tags_prefix}{{name}}"))],
                    gitattributes: Vec::new(),
                },
                BranchMap {
                    glob: "*".to_owned(),
                    refname_template: format!("{branches_prefix}{{name}}"),
                    revisions_ref_template: None,
                    edit_rules: Vec::new(),
                    tag_map: vec![("*".to_owned(), format!("{tags_prefix}{{name}}"))],
                    gitattributes: Vec::new(),
                },
            ],
        }],
    }
}

fn load_config(cli: &Cli) -> Result<ProjectMapping, AppError> {
    let mut mapping = match &cli.config {
        Some(path) => ProjectMapping::load(path)?,
        None if cli.no_default_config => ProjectMapping::default(),
        None => default_mapping(&cli.branches, &cli.tags),
    };
    if !cli.project_filter.is_empty() {
        mapping
            .projects
            .retain(|p| cli.project_filter.iter().any(|pat| glob::Pattern::new(pat).is_ok_and(|g| g.matches(&p.name))));
    }
    Ok(mapping)
}

fn open_target(path: &Path) -> Result<GixSink, hg2git_git::GitError> {
    if path.join(".git").exists() || path.join("HEAD").exists() {
        GixSink::open(path)
    } else {
        GixSink::init_bare(path)
    }
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let mapping = load_config(cli)?;
    let target = cli.target_repository.clone().unwrap_or_else(|| PathBuf::from("."));
    let mut sink = open_target(&target).map_err(AppError::from)?;

    let mut reader =
        JsonlReader::open(&cli.in_repository).map_err(AppError::from)?.with_conversions(cli.convert_hgignore, cli.convert_hgeol);
    let options = cli.commit_options();
    let mut progress = cli.progress_interval().map(RateLimitedProgress::new);

    let mut orchestrator = Orchestrator::new(&mapping, &mut sink, options);
    let mut orchestrator = match progress.as_mut() {
        Some(p) => orchestrator.with_progress(p),
        None => orchestrator,
    };

    loop {
        let Some(revision) = reader.next_revision().map_err(AppError::from)? else {
            break;
        };
        let stop_after = cli.end_revision.as_deref() == Some(revision.rev_id.as_str());
        orchestrator.apply_revision(revision).map_err(|e| AppError::HistoryOrConfig(e.to_string()))?;
        if stop_after {
            break;
        }
    }
    orchestrator.finalize().map_err(|e| AppError::HistoryOrConfig(e.to_string()))?;
    Ok(())
}
