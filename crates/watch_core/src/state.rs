use std::time::Duration;

use crate::view_model::{ActionAvailability, JobProgressView};

/// Opaque server-side job identifier.
pub type JobId = String;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum JobStatus {
    #[default]
    Pending,
    Processing,
    Completed,
    Failed,
    Cancelled,
    /// Any status string the server sends that we do not recognize.
    /// Polled exactly like `Processing`.
    Unknown(String),
}

impl JobStatus {
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        match trimmed.to_ascii_lowercase().as_str() {
            "pending" => Self::Pending,
            "processing" => Self::Processing,
            "completed" => Self::Completed,
            "failed" => Self::Failed,
            "cancelled" | "canceled" => Self::Cancelled,
            _ => Self::Unknown(trimmed.to_string()),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    pub fn label(&self) -> &str {
        match self {
            Self::Pending => "Pending",
            Self::Processing => "Processing",
            Self::Completed => "Completed",
            Self::Failed => "Failed",
            Self::Cancelled => "Cancelled",
            Self::Unknown(raw) => raw,
        }
    }
}

/// One status response, already decoded from the wire.
///
/// Everything but `status` is optional; the server omits fields freely.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StatusSnapshot {
    pub status: JobStatus,
    pub progress_percentage: Option<f64>,
    pub processed_papers: Option<u64>,
    pub total_papers: Option<u64>,
    pub failed_papers: Option<u64>,
    pub log: Option<String>,
    pub error_message: Option<String>,
}

impl StatusSnapshot {
    pub fn new(status: JobStatus) -> Self {
        Self {
            status,
            ..Self::default()
        }
    }

    pub fn with_progress(mut self, percentage: f64) -> Self {
        self.progress_percentage = Some(percentage);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    /// Delay between a non-terminal response and the next request.
    pub interval: Duration,
    /// Delay after a transient error before retrying.
    pub error_backoff: Duration,
    /// Request cycles allowed before giving up with a timeout.
    pub max_attempts: u32,
    /// How long a failed job stays on screen before the progress view hides.
    pub failure_grace: Duration,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(2000),
            error_backoff: Duration::from_millis(5000),
            max_attempts: 180,
            failure_grace: Duration::from_millis(5000),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    NotStarted,
    Polling,
    Completed,
    Failed,
    Cancelled,
    TimedOut,
    Stopped,
}

impl Phase {
    pub fn is_terminal(self) -> bool {
        !matches!(self, Phase::NotStarted | Phase::Polling)
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct PollerState {
    settings: PollSettings,
    job_id: Option<JobId>,
    phase: Phase,
    attempts: u32,
    error_noted: bool,
    last_status: Option<JobStatus>,
    progress_percentage: Option<f64>,
    processed_papers: Option<u64>,
    total_papers: Option<u64>,
    failed_papers: Option<u64>,
    log_text: String,
    message: Option<String>,
    progress_visible: bool,
    actions: ActionAvailability,
    dirty: bool,
}

impl PollerState {
    pub fn new(settings: PollSettings) -> Self {
        Self {
            settings,
            ..Self::default()
        }
    }

    pub fn settings(&self) -> PollSettings {
        self.settings
    }

    pub fn job_id(&self) -> Option<&str> {
        self.job_id.as_deref()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn view(&self) -> JobProgressView {
        JobProgressView {
            job_id: self.job_id.clone().unwrap_or_default(),
            phase: self.phase,
            status_label: self
                .last_status
                .as_ref()
                .map(|status| status.label().to_string()),
            progress_percentage: self.progress_percentage,
            processed_papers: self.processed_papers,
            total_papers: self.total_papers,
            failed_papers: self.failed_papers,
            log_text: self.log_text.clone(),
            message: self.message.clone(),
            progress_visible: self.progress_visible,
            actions: self.actions,
            attempts: self.attempts,
            max_attempts: self.settings.max_attempts,
            dirty: self.dirty,
        }
    }

    /// Returns whether the view changed since the last call, clearing the flag.
    pub fn consume_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    pub(crate) fn progress_percentage(&self) -> Option<f64> {
        self.progress_percentage
    }

    pub(crate) fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub(crate) fn begin(&mut self, job_id: JobId) {
        let settings = self.settings;
        *self = Self::new(settings);
        self.job_id = Some(job_id);
        self.phase = Phase::Polling;
        self.progress_visible = true;
        self.mark_dirty();
    }

    pub(crate) fn record_attempt(&mut self) -> u32 {
        self.attempts = self.attempts.saturating_add(1);
        self.attempts
    }

    pub(crate) fn attempts_exhausted(&self) -> bool {
        self.attempts >= self.settings.max_attempts
    }

    /// Projects each present field onto the view; absent fields keep their
    /// previous value.
    pub(crate) fn apply_snapshot(&mut self, snapshot: &StatusSnapshot) {
        self.last_status = Some(snapshot.status.clone());
        if let Some(percentage) = snapshot.progress_percentage {
            self.progress_percentage = Some(percentage);
        }
        if let Some(processed) = snapshot.processed_papers {
            self.processed_papers = Some(processed);
        }
        if let Some(total) = snapshot.total_papers {
            self.total_papers = Some(total);
        }
        if let Some(failed) = snapshot.failed_papers {
            self.failed_papers = Some(failed);
        }
        if let Some(log) = &snapshot.log {
            self.log_text.clone_from(log);
        }
        self.mark_dirty();
    }

    pub(crate) fn append_log_line(&mut self, line: &str) {
        if !self.log_text.is_empty() && !self.log_text.ends_with('\n') {
            self.log_text.push('\n');
        }
        self.log_text.push_str(line);
        self.mark_dirty();
    }

    /// Marks the first transient error of the chain. Returns `true` only once.
    pub(crate) fn note_first_error(&mut self) -> bool {
        !std::mem::replace(&mut self.error_noted, true)
    }

    pub(crate) fn finish(&mut self, phase: Phase, message: Option<String>) {
        self.phase = phase;
        if message.is_some() {
            self.message = message;
        }
        if phase == Phase::Completed {
            self.actions = ActionAvailability::all();
        }
        self.mark_dirty();
    }

    /// Returns `true` if the progress view was visible and is now hidden.
    pub(crate) fn hide_progress(&mut self) -> bool {
        if !self.progress_visible {
            return false;
        }
        self.progress_visible = false;
        self.mark_dirty();
        true
    }
}
