use std::path::PathBuf;

use chrono::Utc;
use futures_util::future::join_all;
use watch_engine::{
    DownloadedFile, JobClient, PollHandle, PollOutcome, SaveResult, UrlList, WatchError,
};
use watch_logging::{poll_error, poll_info, poll_warn};

use crate::persistence::LastResult;

/// What to do once a job completes.
#[derive(Debug, Clone)]
pub struct CompletionPlan {
    pub fetch_urls: bool,
    pub auto_download: bool,
    pub output_dir: PathBuf,
    pub project_id: Option<String>,
}

/// Results of the completion side effects. A `None` means the step was
/// skipped or failed; failures are logged, never fatal.
#[derive(Debug, Default)]
pub struct CompletionReport {
    pub urls: Option<UrlList>,
    pub downloaded: Option<DownloadedFile>,
    pub saved: Option<SaveResult>,
}

impl CompletionReport {
    pub fn to_last_result(&self, outcome: &PollOutcome) -> LastResult {
        let mut result = LastResult::new(&outcome.job_id, Utc::now());
        result.processed_papers = outcome.view.processed_papers;
        result.total_papers = outcome.view.total_papers;
        result.failed_papers = outcome.view.failed_papers;
        result.downloaded_path = self.downloaded.as_ref().map(|file| file.path.clone());
        match &self.urls {
            Some(list) => result.with_urls(list),
            None => result,
        }
    }
}

/// How one poll chain ended, with its completion side effects already run.
#[derive(Debug)]
pub enum Settlement {
    Completed {
        outcome: PollOutcome,
        report: CompletionReport,
    },
    /// Failed, cancelled, timed out or stopped.
    Unfinished(PollOutcome),
    /// The chain's task died before producing an outcome.
    Lost { job_id: String, error: WatchError },
}

impl Settlement {
    pub fn job_id(&self) -> &str {
        match self {
            Settlement::Completed { outcome, .. } | Settlement::Unfinished(outcome) => {
                &outcome.job_id
            }
            Settlement::Lost { job_id, .. } => job_id,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Settlement::Completed { .. })
    }
}

/// Runs the result actions a completed job unlocks.
pub struct CompletionDispatcher<'a> {
    client: &'a JobClient,
    plan: &'a CompletionPlan,
}

impl<'a> CompletionDispatcher<'a> {
    pub fn new(client: &'a JobClient, plan: &'a CompletionPlan) -> Self {
        Self { client, plan }
    }

    /// Waits on every chain concurrently. Each chain's side effects run as
    /// soon as that chain ends, and `on_settled` sees it right after.
    /// Settlements are returned in the order of `handles`.
    pub async fn settle<F>(&self, handles: Vec<PollHandle>, on_settled: &F) -> Vec<Settlement>
    where
        F: Fn(&Settlement),
    {
        let chains = handles.into_iter().map(|handle| async move {
            let settlement = self.settle_one(handle).await;
            on_settled(&settlement);
            settlement
        });
        join_all(chains).await
    }

    async fn settle_one(&self, handle: PollHandle) -> Settlement {
        let job_id = handle.job_id().to_string();
        match handle.join().await {
            Ok(outcome) if outcome.is_success() => {
                let report = self.dispatch(&outcome).await;
                Settlement::Completed { outcome, report }
            }
            Ok(outcome) => Settlement::Unfinished(outcome),
            Err(error) => {
                poll_error!(job = job_id; "{}", error);
                Settlement::Lost { job_id, error }
            }
        }
    }

    pub async fn dispatch(&self, outcome: &PollOutcome) -> CompletionReport {
        let mut report = CompletionReport::default();
        if !outcome.is_success() || !outcome.view.actions.any() {
            return report;
        }
        let job_id = outcome.job_id.as_str();
        let actions = outcome.view.actions;

        if self.plan.fetch_urls && actions.open_urls {
            match self.client.url_list(job_id).await {
                Ok(list) => report.urls = Some(list),
                Err(err) => poll_warn!(job = job_id; "could not fetch URL list: {}", err),
            }
        }

        if self.plan.auto_download && actions.download {
            match self.client.download(job_id, &self.plan.output_dir).await {
                Ok(file) => {
                    poll_info!(job = job_id; "downloaded {:?}", file.path);
                    report.downloaded = Some(file);
                }
                Err(err) => poll_warn!(job = job_id; "download failed: {}", err),
            }
        }

        if let (Some(project_id), true) = (&self.plan.project_id, actions.save_to_project) {
            match self.client.save_to_project(job_id, project_id).await {
                Ok(result) => report.saved = Some(result),
                Err(err) => {
                    poll_warn!(job = job_id; "saving to project {} failed: {}", project_id, err)
                }
            }
        }

        report
    }
}
