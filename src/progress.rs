//! Progress indicators for catalink CLI.

use colored::Colorize;
use convergence::PollCallback;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

use crate::ui;

const TICK: Duration = Duration::from_millis(120);

/// Create a spinner with a message
pub fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(TICK);
    pb
}

/// Create a progress bar for applying `len` resources
pub fn bar(len: u64, prefix: &str) -> ProgressBar {
    let pb = ProgressBar::new(len);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} {prefix} [{bar:30.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=>-"),
    );
    pb.set_prefix(prefix.to_string());
    pb
}

/// A hidden bar for quiet runs
pub fn hidden() -> ProgressBar {
    ProgressBar::hidden()
}

pub fn finish_success(pb: &ProgressBar, msg: &str) {
    pb.finish_with_message(format!("{} {}", "✓".green(), msg));
}

pub fn finish_error(pb: &ProgressBar, msg: &str) {
    pb.finish_with_message(format!("{} {}", "✗".red(), msg));
}

pub fn finish_clear(pb: &ProgressBar) {
    pb.finish_and_clear();
}

/// Reports pending poll observations on a spinner
pub struct SpinnerCallback {
    pb: ProgressBar,
    label: String,
}

impl SpinnerCallback {
    pub fn new(pb: ProgressBar, label: impl Into<String>) -> Self {
        Self {
            pb,
            label: label.into(),
        }
    }
}

impl PollCallback for SpinnerCallback {
    fn on_pending(&self, _operation: &str, attempt: u64, elapsed: Duration, status: &str) {
        self.pb.set_message(format!(
            "{} {} ({}, poll {})",
            self.label,
            status.yellow(),
            ui::format_duration(elapsed),
            attempt
        ));
    }
}
