//! Progress indicators with CI fallback

use super::context::UiContext;
use crate::log::{LogEntry, Logger};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;
use tokio::task::JoinHandle;

/// Longest worker log line shown next to the activity spinner
const ACTIVITY_WIDTH: usize = 60;

/// A one-shot task spinner
pub struct TaskSpinner {
    spinner: Option<cliclack::ProgressBar>,
    interactive: bool,
}

impl TaskSpinner {
    pub fn new(ctx: &UiContext) -> Self {
        Self {
            spinner: None,
            interactive: ctx.use_fancy_output(),
        }
    }

    pub fn start(&mut self, message: &str) {
        if self.interactive {
            let spinner = cliclack::spinner();
            spinner.start(message);
            self.spinner = Some(spinner);
        } else {
            println!("{} {}", style("...").dim(), message);
        }
    }

    pub fn stop(&mut self, message: &str) {
        match self.spinner.take() {
            Some(spinner) => spinner.stop(message),
            None => println!("{} {}", style("[OK]").green(), message),
        }
    }

    pub fn stop_error(&mut self, message: &str) {
        match self.spinner.take() {
            Some(spinner) => spinner.error(message),
            None => println!("{} {}", style("[FAIL]").red(), message),
        }
    }
}

/// Spinner that shows the latest worker log entry while a lifecycle step
/// runs. Plain mode prints only the start and end lines.
pub struct ActivityBar {
    bar: Option<ProgressBar>,
    feed: Option<JoinHandle<()>>,
}

impl ActivityBar {
    /// Start the spinner and follow `logger` until finished
    pub fn follow(ctx: &UiContext, label: &str, logger: &Logger) -> Self {
        if !ctx.use_fancy_output() {
            println!("{} {}", style("...").dim(), label);
            return Self {
                bar: None,
                feed: None,
            };
        }

        let bar = ProgressBar::new_spinner();
        if let Ok(template) = ProgressStyle::default_spinner()
            .template("  {spinner:.cyan} {prefix}  {msg:.dim}  {elapsed:.dim}")
        {
            bar.set_style(template.tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ "));
        }
        bar.set_prefix(label.to_string());
        bar.enable_steady_tick(Duration::from_millis(120));

        let mut entries = logger.subscribe();
        let shown = bar.clone();
        let feed = tokio::spawn(async move {
            while let Some(entry) = entries.recv().await {
                shown.set_message(activity_line(&entry));
            }
        });

        Self {
            bar: Some(bar),
            feed: Some(feed),
        }
    }

    pub fn finish(self, message: &str) {
        self.close();
        println!("{} {}", style("[OK]").green(), message);
    }

    pub fn finish_error(self, message: &str) {
        self.close();
        println!("{} {}", style("[FAIL]").red(), message);
    }

    fn close(&self) {
        if let Some(feed) = &self.feed {
            feed.abort();
        }
        if let Some(bar) = &self.bar {
            bar.finish_and_clear();
        }
    }
}

/// One log entry trimmed to fit beside the spinner
fn activity_line(entry: &LogEntry) -> String {
    let message = entry.message.trim();
    if message.chars().count() <= ACTIVITY_WIDTH {
        return message.to_string();
    }
    let cut: String = message.chars().take(ACTIVITY_WIDTH - 3).collect();
    format!("{}...", cut)
}
