use watch_logging::{poll_debug, poll_info, poll_warn};

use crate::{Effect, JobId, JobStatus, Msg, Notification, Phase, PollerState, StatusSnapshot};

/// Appended to the log text on the first transient error of a poll chain.
pub const CONNECTION_RETRY_NOTE: &str = "Connection error, retrying...";

/// Shown when the attempt ceiling is reached without a terminal status.
pub const TIMEOUT_MESSAGE: &str = "Polling timeout - please refresh to check the job status";

/// Pure update function: applies a message to state and returns any effects.
pub fn update(mut state: PollerState, msg: Msg) -> (PollerState, Vec<Effect>) {
    let effects = match msg {
        Msg::Start { job_id } => {
            let job_id = job_id.trim().to_string();
            if job_id.is_empty() {
                // Caller contract violation: nothing to poll.
                poll_warn!("poll start requested without a job id; ignoring");
                return (state, Vec::new());
            }
            if state.phase() == Phase::Polling {
                poll_warn!(job = job_id; "poll start ignored, chain already running");
                return (state, Vec::new());
            }
            state.begin(job_id.clone());
            poll_info!(job = job_id; "polling started");
            vec![Effect::FetchStatus { job_id }]
        }
        Msg::TickElapsed => match polling_job(&state) {
            Some(job_id) => vec![Effect::FetchStatus { job_id }],
            None => Vec::new(),
        },
        Msg::StatusReceived(snapshot) => match polling_job(&state) {
            Some(job_id) => apply_status(&mut state, job_id, snapshot),
            None => {
                poll_debug!("status response after poll chain ended; ignoring");
                Vec::new()
            }
        },
        Msg::StatusFailed { error } => match polling_job(&state) {
            Some(job_id) => apply_transient_error(&mut state, job_id, &error),
            None => Vec::new(),
        },
        Msg::GraceElapsed => {
            if state.phase() != Phase::Failed {
                return (state, Vec::new());
            }
            let Some(job_id) = state.job_id().map(ToOwned::to_owned) else {
                return (state, Vec::new());
            };
            if state.hide_progress() {
                vec![Effect::Notify(Notification::ProgressHidden { job_id })]
            } else {
                Vec::new()
            }
        }
        Msg::Stop => {
            if let Some(job_id) = polling_job(&state) {
                poll_info!(job = job_id; "polling stopped by caller");
                state.finish(Phase::Stopped, None);
            }
            Vec::new()
        }
    };

    (state, effects)
}

fn polling_job(state: &PollerState) -> Option<JobId> {
    if state.phase() == Phase::Polling {
        state.job_id().map(ToOwned::to_owned)
    } else {
        None
    }
}

fn apply_status(state: &mut PollerState, job_id: JobId, snapshot: StatusSnapshot) -> Vec<Effect> {
    let attempt = state.record_attempt();

    if let (Some(previous), Some(current)) =
        (state.progress_percentage(), snapshot.progress_percentage)
    {
        if current < previous && snapshot.status == JobStatus::Processing {
            poll_debug!(job = job_id; "progress went backwards: {} -> {}", previous, current);
        }
    }
    state.apply_snapshot(&snapshot);

    match snapshot.status {
        JobStatus::Completed => {
            poll_info!(job = job_id; "completed after {} attempt(s)", attempt);
            state.finish(Phase::Completed, Some("Job completed".to_string()));
            vec![Effect::Notify(Notification::Completed { job_id })]
        }
        JobStatus::Failed => {
            let message = snapshot.error_message;
            if let Some(error) = message.as_deref() {
                state.append_log_line(&format!("Error: {error}"));
            }
            poll_warn!(
                job = job_id;
                "server reported failure: {}",
                message.as_deref().unwrap_or("no error message")
            );
            let status_message = match message.as_deref() {
                Some(error) => format!("Job failed: {error}"),
                None => "Job failed".to_string(),
            };
            state.finish(Phase::Failed, Some(status_message));
            vec![
                Effect::Notify(Notification::Failed { job_id, message }),
                Effect::ScheduleGrace {
                    delay: state.settings().failure_grace,
                },
            ]
        }
        JobStatus::Cancelled => {
            poll_info!(job = job_id; "job was cancelled");
            state.finish(Phase::Cancelled, Some("Job cancelled".to_string()));
            vec![Effect::Notify(Notification::Cancelled { job_id })]
        }
        JobStatus::Pending | JobStatus::Processing | JobStatus::Unknown(_) => {
            if state.attempts_exhausted() {
                time_out(state, job_id)
            } else {
                vec![Effect::ScheduleTick {
                    delay: state.settings().interval,
                }]
            }
        }
    }
}

fn apply_transient_error(state: &mut PollerState, job_id: JobId, error: &str) -> Vec<Effect> {
    let attempt = state.record_attempt();
    if state.note_first_error() {
        poll_warn!(job = job_id; "status check failed, retrying: {}", error);
        state.append_log_line(CONNECTION_RETRY_NOTE);
    } else {
        poll_debug!(job = job_id; "status check failed again (attempt {}): {}", attempt, error);
    }

    if state.attempts_exhausted() {
        time_out(state, job_id)
    } else {
        vec![Effect::ScheduleTick {
            delay: state.settings().error_backoff,
        }]
    }
}

fn time_out(state: &mut PollerState, job_id: JobId) -> Vec<Effect> {
    let attempts = state.attempts();
    poll_warn!(job = job_id; "giving up after {} attempts", attempts);
    state.finish(Phase::TimedOut, Some(TIMEOUT_MESSAGE.to_string()));
    vec![Effect::Notify(Notification::TimedOut { job_id, attempts })]
}
