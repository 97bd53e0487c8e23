use std::collections::VecDeque;
use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use watch_core::{
    update, Effect, JobId, JobProgressView, Msg, Notification, Phase, PollSettings, PollerState,
};
use watch_logging::poll_debug;

use crate::{StatusFetcher, WatchError};

/// Receives progress and terminal notifications from one poll chain.
///
/// Every method defaults to a no-op so observers implement only what they
/// render.
pub trait PollObserver: Send + Sync {
    fn on_progress(&self, _view: &JobProgressView) {}
    fn on_complete(&self, _job_id: &str) {}
    fn on_failed(&self, _job_id: &str, _message: Option<&str>) {}
    fn on_cancelled(&self, _job_id: &str) {}
    fn on_timeout(&self, _job_id: &str, _attempts: u32) {}
    fn on_progress_hidden(&self, _job_id: &str) {}
}

/// Observer that ignores everything.
pub struct NoopObserver;

impl PollObserver for NoopObserver {}

#[derive(Debug, Clone, PartialEq)]
pub struct PollOutcome {
    pub job_id: JobId,
    pub phase: Phase,
    pub attempts: u32,
    pub view: JobProgressView,
}

impl PollOutcome {
    pub fn is_success(&self) -> bool {
        self.phase == Phase::Completed
    }
}

/// Runs poll chains: feeds `watch_core::update` and executes its effects.
#[derive(Clone)]
pub struct JobWatcher {
    fetcher: Arc<dyn StatusFetcher>,
    settings: PollSettings,
}

impl JobWatcher {
    pub fn new(fetcher: Arc<dyn StatusFetcher>, settings: PollSettings) -> Self {
        Self { fetcher, settings }
    }

    pub fn settings(&self) -> PollSettings {
        self.settings
    }

    /// Starts an independent poll chain on the current tokio runtime.
    pub fn spawn(&self, job_id: impl Into<JobId>, observer: Arc<dyn PollObserver>) -> PollHandle {
        let job_id = job_id.into().trim().to_string();
        let cancel = CancellationToken::new();
        let watcher = self.clone();
        let token = cancel.clone();
        let task_job_id = job_id.clone();
        let task = tokio::spawn(async move {
            watcher
                .run(task_job_id, observer.as_ref(), token)
                .await
        });
        PollHandle {
            job_id,
            cancel,
            task,
        }
    }

    /// Polls `job_id` (surrounding whitespace removed) until a terminal
    /// status, the attempt ceiling, or cancellation. Exactly one request is
    /// in flight at a time.
    pub async fn run(
        &self,
        job_id: JobId,
        observer: &dyn PollObserver,
        cancel: CancellationToken,
    ) -> PollOutcome {
        let job_id = job_id.trim().to_string();
        let mut pending = VecDeque::new();
        let mut state = self.apply(
            PollerState::new(self.settings),
            Msg::Start {
                job_id: job_id.clone(),
            },
            &mut pending,
            observer,
        );

        while let Some(effect) = pending.pop_front() {
            let msg = match effect {
                Effect::FetchStatus { job_id } => {
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => Msg::Stop,
                        result = self.fetcher.fetch_status(&job_id) => match result {
                            Ok(snapshot) => Msg::StatusReceived(snapshot),
                            Err(err) => Msg::StatusFailed { error: err.to_string() },
                        },
                    }
                }
                Effect::ScheduleTick { delay } => {
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => Msg::Stop,
                        _ = tokio::time::sleep(delay) => Msg::TickElapsed,
                    }
                }
                Effect::ScheduleGrace { delay } => {
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => Msg::Stop,
                        _ = tokio::time::sleep(delay) => Msg::GraceElapsed,
                    }
                }
                Effect::Notify(notification) => {
                    notify(observer, &notification);
                    continue;
                }
            };
            state = self.apply(state, msg, &mut pending, observer);
        }

        poll_debug!(job = job_id; "poll chain finished in phase {:?}", state.phase());
        PollOutcome {
            job_id,
            phase: state.phase(),
            attempts: state.attempts(),
            view: state.view(),
        }
    }

    fn apply(
        &self,
        state: PollerState,
        msg: Msg,
        pending: &mut VecDeque<Effect>,
        observer: &dyn PollObserver,
    ) -> PollerState {
        let (mut state, effects) = update(state, msg);
        if state.consume_dirty() {
            observer.on_progress(&state.view());
        }
        pending.extend(effects);
        state
    }
}

fn notify(observer: &dyn PollObserver, notification: &Notification) {
    match notification {
        Notification::Completed { job_id } => observer.on_complete(job_id),
        Notification::Failed { job_id, message } => observer.on_failed(job_id, message.as_deref()),
        Notification::Cancelled { job_id } => observer.on_cancelled(job_id),
        Notification::TimedOut { job_id, attempts } => observer.on_timeout(job_id, *attempts),
        Notification::ProgressHidden { job_id } => observer.on_progress_hidden(job_id),
    }
}

/// Handle to a spawned poll chain.
pub struct PollHandle {
    job_id: JobId,
    cancel: CancellationToken,
    task: JoinHandle<PollOutcome>,
}

impl PollHandle {
    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    /// Stops the chain at its next suspension point. Does not contact the
    /// server; use `JobClient::cancel` to cancel the job itself.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// Token that stops this chain when cancelled. Usable after the handle
    /// itself has been moved into `join`.
    pub fn stop_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    pub async fn join(self) -> Result<PollOutcome, WatchError> {
        let job_id = self.job_id;
        self.task
            .await
            .map_err(|source| WatchError::Join { job_id, source })
    }
}
