//! Progress reporting.
//!
//! The engine reports through the [`Progress`] trait; it never reads anything
//! back from it. `ProgressReporter` renders an indicatif bar on stderr and prints
//! messages above it.

use indicatif::{ProgressBar, ProgressStyle};

/// Sink for run progress
pub trait Progress {
    /// Begin a bar expecting `total` steps
    fn start(&mut self, total: u64);

    /// One step done
    fn advance(&mut self);

    /// A line of narrative output
    fn message(&mut self, text: &str);

    /// Close the current bar, if any
    fn finish(&mut self) {}
}

/// Discards everything
#[derive(Debug, Default)]
pub struct NoProgress;

impl Progress for NoProgress {
    fn start(&mut self, _total: u64) {}

    fn advance(&mut self) {}

    fn message(&mut self, _text: &str) {}
}

/// Terminal progress: bar on stderr, messages on stdout
pub struct ProgressReporter {
    show_bar: bool,
    quiet: bool,
    bar: Option<ProgressBar>,
}

impl ProgressReporter {
    pub fn new(show_bar: bool) -> Self {
        Self {
            show_bar,
            quiet: false,
            bar: None,
        }
    }

    /// Suppress narrative messages (e.g. when stdout carries JSON)
    pub fn quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }
}

impl Progress for ProgressReporter {
    fn start(&mut self, total: u64) {
        self.finish();
        if !self.show_bar {
            return;
        }
        let pb = ProgressBar::new(total);
        pb.set_style(
            ProgressStyle::with_template(
                "  {spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%)",
            )
            .unwrap()
            .progress_chars("█▓▒░  ")
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"),
        );
        pb.enable_steady_tick(std::time::Duration::from_millis(100));
        self.bar = Some(pb);
    }

    fn advance(&mut self) {
        if let Some(ref pb) = self.bar {
            pb.inc(1);
        }
    }

    fn message(&mut self, text: &str) {
        if self.quiet {
            return;
        }
        match self.bar {
            Some(ref pb) => pb.suspend(|| println!("{}", text)),
            None => println!("{}", text),
        }
    }

    fn finish(&mut self) {
        if let Some(pb) = self.bar.take() {
            pb.finish_and_clear();
        }
    }
}

impl Drop for ProgressReporter {
    fn drop(&mut self) {
        self.finish();
    }
}
