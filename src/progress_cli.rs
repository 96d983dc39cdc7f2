//! Stderr progress reporting for `--progress [SEC]`.

use std::io::{self, IsTerminal, Write};
use std::time::{Duration, Instant};

use hg2git_core::progress::{ProgressSink, ProgressStats};

/// Prints a rate-limited one-line progress indicator to stderr.
///
/// Matches the upstream tool's `--progress SEC` behavior: updates are
/// gated by wall-clock time, not by revision count, so a fast run of many
/// small revisions doesn't spam the terminal and a slow run of a few huge
/// ones still reports promptly.
pub struct RateLimitedProgress {
    interval: Duration,
    last_report: Option<Instant>,
}

impl RateLimitedProgress {
    /// `interval` is how often (at minimum) a new line is emitted.
    #[must_use]
    pub const fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_report: None,
        }
    }

    /// The default interval used when `--progress` is given without a
    /// value, matching the upstream default of once per second on an
    /// interactive terminal.
    #[must_use]
    pub fn default_interval_if_tty() -> Option<Duration> {
        io::stderr().is_terminal().then(|| Duration::from_secs(1))
    }
}

impl ProgressSink for RateLimitedProgress {
    fn on_progress(&mut self, stats: ProgressStats) {
        let now = Instant::now();
        if let Some(last) = self.last_report
            && now.duration_since(last) < self.interval
        {
            return;
        }
        self.last_report = Some(now);
        let _ = writeln!(
            io::stderr(),
            "revisions: {} commits: {}",
            stats.revisions_processed,
            stats.commits_made
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_call_always_reports() {
        let mut sink = RateLimitedProgress::new(Duration::from_secs(3600));
        assert!(sink.last_report.is_none());
        sink.on_progress(ProgressStats::default());
        assert!(sink.last_report.is_some());
    }
}
