use std::sync::Mutex;

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use watch_core::{JobProgressView, TIMEOUT_MESSAGE};
use watch_engine::PollObserver;

use crate::render;

const BAR_TEMPLATE: &str = "{prefix:.bold} [{bar:30.cyan/blue}] {msg}";

/// Draws one job's progress as an indicatif bar and echoes new server log
/// lines above it.
pub struct TerminalObserver {
    bar: ProgressBar,
    seen_log: Mutex<String>,
}

impl TerminalObserver {
    pub fn new(multi: &MultiProgress, job_id: &str) -> Self {
        let bar = multi.add(ProgressBar::new(100));
        if let Ok(style) = ProgressStyle::with_template(BAR_TEMPLATE) {
            bar.set_style(style.progress_chars("=> "));
        }
        bar.set_prefix(job_id.to_string());
        bar.set_message("Waiting for server");
        Self {
            bar,
            seen_log: Mutex::new(String::new()),
        }
    }

    fn print_new_log_lines(&self, view: &JobProgressView) {
        let Ok(mut seen) = self.seen_log.lock() else {
            return;
        };
        let lines = render::new_log_lines(&seen, &view.log_text);
        if !lines.is_empty() {
            self.bar.suspend(|| {
                for line in &lines {
                    println!("[{}] {line}", view.job_id);
                }
            });
        }
        seen.clone_from(&view.log_text);
    }
}

impl PollObserver for TerminalObserver {
    fn on_progress(&self, view: &JobProgressView) {
        self.print_new_log_lines(view);
        if view.progress_visible || !view.phase.is_terminal() {
            self.bar.set_position(render::bar_position(view));
            self.bar.set_message(render::status_line(view));
        }
    }

    fn on_complete(&self, _job_id: &str) {
        self.bar.set_position(100);
        self.bar.finish_with_message("Completed");
    }

    fn on_failed(&self, _job_id: &str, message: Option<&str>) {
        let text = match message {
            Some(message) => format!("Failed: {message}"),
            None => "Failed".to_string(),
        };
        self.bar.abandon_with_message(text);
    }

    fn on_cancelled(&self, _job_id: &str) {
        self.bar.abandon_with_message("Cancelled");
    }

    fn on_timeout(&self, _job_id: &str, _attempts: u32) {
        self.bar.abandon_with_message(TIMEOUT_MESSAGE);
    }

    fn on_progress_hidden(&self, _job_id: &str) {
        self.bar.finish_and_clear();
    }
}
