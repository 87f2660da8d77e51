//! Terminal progress display for generation runs.

use std::io::IsTerminal as _;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use tracing::debug;

use codeloom_core::application::{Progress, ProgressEvent, ports::ProgressSink};

/// Relays [`ProgressEvent`]s to an indicatif bar on stderr.
pub struct ProgressReporter {
    bar: ProgressBar,
}

impl ProgressReporter {
    /// A visible bar when stderr is a terminal and `enabled`, hidden otherwise.
    pub fn new(enabled: bool) -> Self {
        if !enabled || !std::io::stderr().is_terminal() {
            return Self::hidden();
        }

        let bar = ProgressBar::new(100);
        let style = ProgressStyle::with_template("{spinner:.cyan} [{bar:30.cyan/blue}] {pos:>3}% {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> ");
        bar.set_style(style);
        bar.enable_steady_tick(Duration::from_millis(120));
        Self { bar }
    }

    pub fn hidden() -> Self {
        Self {
            bar: ProgressBar::hidden(),
        }
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }

    pub fn position(&self) -> u64 {
        self.bar.position()
    }
}

impl ProgressSink for ProgressReporter {
    fn report(&self, event: ProgressEvent) {
        debug!(step = %event.step, message = %event.message, "Progress");
        if let Progress::Percent(percent) = event.progress {
            self.bar.set_position(u64::from(percent));
        }
        self.bar.set_message(format!("{}: {}", event.step, event.message));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_events_move_the_bar() {
        let reporter = ProgressReporter::hidden();
        reporter.report(ProgressEvent::percent("entities", "Customer", 40));
        assert_eq!(reporter.position(), 40);

        reporter.report(ProgressEvent::indeterminate("write", "flushing"));
        assert_eq!(reporter.position(), 40);
    }
}
