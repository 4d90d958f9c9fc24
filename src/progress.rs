//! Terminal progress for a bot run
//!
//! Spinners for the provider round trips and a bar while requirements are
//! checked against the package index. Disabled for quiet and JSON runs.

use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Progress reporter for one run
pub struct Progress {
    enabled: bool,
    bar: Option<ProgressBar>,
}

impl Progress {
    pub fn new(enabled: bool) -> Self {
        Self { enabled, bar: None }
    }

    pub fn disabled() -> Self {
        Self::new(false)
    }

    /// Spinner for a step of unknown length
    pub fn spinner(&mut self, message: &str) {
        if !self.enabled {
            return;
        }

        let spinner = ProgressBar::new_spinner();
        let style = ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏");
        spinner.set_style(style);
        spinner.set_message(message.to_string());
        spinner.enable_steady_tick(Duration::from_millis(80));
        self.replace(spinner);
    }

    /// Bar over `total` requirements
    pub fn start(&mut self, total: u64, message: &str) {
        if !self.enabled || total == 0 {
            return;
        }

        let bar = ProgressBar::new(total);
        let style = ProgressStyle::default_bar()
            .template("{spinner:.cyan} {msg} [{bar:30.cyan/blue}] {pos}/{len}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▓▒░");
        bar.set_style(style);
        bar.set_message(message.to_string());
        bar.enable_steady_tick(Duration::from_millis(100));
        self.replace(bar);
    }

    fn replace(&mut self, bar: ProgressBar) {
        if let Some(previous) = self.bar.replace(bar) {
            previous.finish_and_clear();
        }
    }

    pub fn inc(&self) {
        if let Some(ref bar) = self.bar {
            bar.inc(1);
        }
    }

    pub fn set_message(&self, message: &str) {
        if let Some(ref bar) = self.bar {
            bar.set_message(message.to_string());
        }
    }

    pub fn finish_and_clear(&mut self) {
        if let Some(bar) = self.bar.take() {
            bar.finish_and_clear();
        }
    }

    pub fn is_active(&self) -> bool {
        self.bar.is_some()
    }
}

impl Drop for Progress {
    fn drop(&mut self) {
        self.finish_and_clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_progress_never_draws() {
        let mut progress = Progress::disabled();
        progress.spinner("Loading configuration...");
        assert!(!progress.is_active());
        progress.start(10, "Checking requirements");
        assert!(!progress.is_active());
        progress.inc();
        progress.set_message("six");
        progress.finish_and_clear();
    }

    #[test]
    fn test_spinner_replaced_by_bar() {
        let mut progress = Progress::new(true);
        progress.spinner("Discovering requirement files...");
        assert!(progress.is_active());
        progress.start(3, "Checking requirements");
        progress.inc();
        progress.set_message("django");
        progress.finish_and_clear();
        assert!(!progress.is_active());
    }

    #[test]
    fn test_empty_bar_is_skipped() {
        let mut progress = Progress::new(true);
        progress.start(0, "Checking requirements");
        assert!(!progress.is_active());
    }
}
