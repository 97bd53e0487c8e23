//! Plain-text rendering of poll state for the terminal.

use watch_core::{JobProgressView, Phase, TIMEOUT_MESSAGE};
use watch_engine::{DownloadedFile, PollOutcome, SaveResult, UrlList};

use crate::persistence::LastResult;

/// Bar position in whole percent. The label shows the server's value as is.
pub fn bar_position(view: &JobProgressView) -> u64 {
    match view.progress_percentage {
        Some(value) if value.is_finite() && value > 0.0 => value.min(100.0).round() as u64,
        _ => 0,
    }
}

/// One-line summary shown next to the progress bar.
pub fn status_line(view: &JobProgressView) -> String {
    let mut parts = Vec::new();
    parts.push(
        view.status_label
            .clone()
            .unwrap_or_else(|| "Waiting for server".to_string()),
    );
    if let Some(value) = view.progress_percentage {
        parts.push(format!("{value}%"));
    }
    match (view.processed_papers, view.total_papers) {
        (Some(done), Some(total)) => parts.push(format!("{done}/{total} papers")),
        (Some(done), None) => parts.push(format!("{done} papers")),
        _ => {}
    }
    if let Some(failed) = view.failed_papers.filter(|&n| n > 0) {
        parts.push(format!("{failed} failed"));
    }
    if let Some(message) = &view.message {
        parts.push(message.clone());
    }
    parts.join(" | ")
}

/// Lines of `current` the user has not seen yet.
///
/// The log normally grows by appending; when the server replaces it with
/// something unrelated the whole text is shown again.
pub fn new_log_lines<'a>(previous: &str, current: &'a str) -> Vec<&'a str> {
    let fresh = match current.strip_prefix(previous) {
        Some(rest) if !previous.is_empty() => rest,
        _ if current == previous => "",
        _ => current,
    };
    fresh.lines().filter(|line| !line.trim().is_empty()).collect()
}

pub fn outcome_summary(outcome: &PollOutcome) -> String {
    let job = &outcome.job_id;
    match outcome.phase {
        Phase::Completed => format!("[{job}] completed after {} checks", outcome.attempts),
        Phase::Failed => format!(
            "[{job}] {}",
            outcome.view.message.as_deref().unwrap_or("Job failed")
        ),
        Phase::Cancelled => format!("[{job}] cancelled"),
        Phase::TimedOut => format!("[{job}] {TIMEOUT_MESSAGE}"),
        Phase::Stopped => format!("[{job}] stopped before the job finished"),
        Phase::NotStarted | Phase::Polling => format!("[{job}] not watched"),
    }
}

pub fn url_list(list: &UrlList) -> String {
    if list.urls.is_empty() {
        return "No URLs to open".to_string();
    }
    let mut out = format!("{} URL(s) to open:", list.total_urls.max(list.urls.len()));
    for entry in &list.urls {
        let title = if entry.title.is_empty() {
            "(untitled)"
        } else {
            entry.title.as_str()
        };
        if entry.kind.is_empty() {
            out.push_str(&format!("\n  {title}\n    {}", entry.url));
        } else {
            out.push_str(&format!("\n  [{}] {title}\n    {}", entry.kind, entry.url));
        }
    }
    out
}

pub fn downloaded(file: &DownloadedFile) -> String {
    format!(
        "[{}] saved {} ({} bytes)",
        file.job_id,
        file.path.display(),
        file.byte_len
    )
}

pub fn saved(job_id: &str, result: &SaveResult) -> String {
    let mut out = format!(
        "[{job_id}] {}",
        result.message.as_deref().unwrap_or("saved to project")
    );
    for path in &result.file_paths {
        out.push_str(&format!("\n    {path}"));
    }
    out
}

pub fn last_result(result: &LastResult) -> String {
    let mut out = format!(
        "Last completed job {} at {}",
        result.job_id, result.completed_at
    );
    if let (Some(done), Some(total)) = (result.processed_papers, result.total_papers) {
        out.push_str(&format!("\n  {done}/{total} papers"));
        if let Some(failed) = result.failed_papers.filter(|&n| n > 0) {
            out.push_str(&format!(", {failed} failed"));
        }
    }
    if let Some(path) = &result.downloaded_path {
        out.push_str(&format!("\n  file: {}", path.display()));
    }
    for entry in &result.urls {
        out.push_str(&format!("\n  [{}] {}\n    {}", entry.kind, entry.title, entry.url));
    }
    out
}
