use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;

use pretty_assertions::assert_eq;
use tokio_util::sync::CancellationToken;
use watch_core::{JobProgressView, JobStatus, Phase, PollSettings, StatusSnapshot};
use watch_engine::{
    ClientError, FailureKind, JobWatcher, PollObserver, StatusFetcher,
};

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(watch_logging::initialize_for_tests);
}

type Scripted = Result<StatusSnapshot, ClientError>;

/// Replays a per-job script of responses; once a script runs dry every
/// further request answers `processing`.
#[derive(Default)]
struct ScriptedFetcher {
    scripts: Mutex<HashMap<String, VecDeque<Scripted>>>,
    calls: AtomicUsize,
}

impl ScriptedFetcher {
    fn with_script(job_id: &str, script: Vec<Scripted>) -> Self {
        let fetcher = Self::default();
        fetcher.add_script(job_id, script);
        fetcher
    }

    fn add_script(&self, job_id: &str, script: Vec<Scripted>) {
        self.scripts
            .lock()
            .unwrap()
            .insert(job_id.to_string(), script.into());
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl StatusFetcher for ScriptedFetcher {
    async fn fetch_status(&self, job_id: &str) -> Result<StatusSnapshot, ClientError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.scripts
            .lock()
            .unwrap()
            .get_mut(job_id)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| Ok(StatusSnapshot::new(JobStatus::Processing)))
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Event {
    Progress(Option<f64>),
    Complete(String),
    Failed(String, Option<String>),
    Cancelled(String),
    Timeout(String, u32),
    Hidden(String),
}

#[derive(Default)]
struct RecordingObserver {
    events: Mutex<Vec<Event>>,
}

impl RecordingObserver {
    fn take(&self) -> Vec<Event> {
        self.events.lock().unwrap().drain(..).collect()
    }

    fn push(&self, event: Event) {
        self.events.lock().unwrap().push(event);
    }
}

impl PollObserver for RecordingObserver {
    fn on_progress(&self, view: &JobProgressView) {
        self.push(Event::Progress(view.progress_percentage));
    }
    fn on_complete(&self, job_id: &str) {
        self.push(Event::Complete(job_id.to_string()));
    }
    fn on_failed(&self, job_id: &str, message: Option<&str>) {
        self.push(Event::Failed(job_id.to_string(), message.map(str::to_string)));
    }
    fn on_cancelled(&self, job_id: &str) {
        self.push(Event::Cancelled(job_id.to_string()));
    }
    fn on_timeout(&self, job_id: &str, attempts: u32) {
        self.push(Event::Timeout(job_id.to_string(), attempts));
    }
    fn on_progress_hidden(&self, job_id: &str) {
        self.push(Event::Hidden(job_id.to_string()));
    }
}

fn processing(percentage: f64) -> Scripted {
    Ok(StatusSnapshot::new(JobStatus::Processing).with_progress(percentage))
}

fn status(status: JobStatus) -> Scripted {
    Ok(StatusSnapshot::new(status))
}

fn network_error() -> Scripted {
    Err(ClientError {
        kind: FailureKind::Network,
        message: "connection reset".to_string(),
    })
}

#[tokio::test(start_paused = true)]
async fn scripted_sequence_runs_in_order_with_backoff() {
    init_logging();
    let fetcher = Arc::new(ScriptedFetcher::with_script(
        "job-1",
        vec![
            processing(10.0),
            network_error(),
            processing(55.0),
            status(JobStatus::Completed),
        ],
    ));
    let watcher = JobWatcher::new(fetcher.clone(), PollSettings::default());
    let observer = RecordingObserver::default();
    let started = tokio::time::Instant::now();

    let outcome = watcher
        .run("job-1".to_string(), &observer, CancellationToken::new())
        .await;

    assert_eq!(outcome.phase, Phase::Completed);
    assert_eq!(outcome.attempts, 4);
    assert_eq!(fetcher.calls(), 4);
    // 2 s after the first response, 5 s backoff after the error, 2 s again.
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_millis(9000), "elapsed {elapsed:?}");
    assert!(elapsed < Duration::from_millis(9100), "elapsed {elapsed:?}");
    assert_eq!(
        observer.take(),
        vec![
            Event::Progress(None),
            Event::Progress(Some(10.0)),
            Event::Progress(Some(10.0)),
            Event::Progress(Some(55.0)),
            Event::Progress(Some(55.0)),
            Event::Complete("job-1".to_string()),
        ]
    );
    assert!(outcome.view.actions.download);
}

#[tokio::test(start_paused = true)]
async fn attempt_ceiling_stops_requests() {
    init_logging();
    let fetcher = Arc::new(ScriptedFetcher::default());
    let settings = PollSettings {
        max_attempts: 5,
        ..PollSettings::default()
    };
    let watcher = JobWatcher::new(fetcher.clone(), settings);
    let observer = RecordingObserver::default();

    let outcome = watcher
        .run("stuck".to_string(), &observer, CancellationToken::new())
        .await;

    assert_eq!(outcome.phase, Phase::TimedOut);
    assert_eq!(fetcher.calls(), 5);
    let events = observer.take();
    assert_eq!(events.last(), Some(&Event::Timeout("stuck".to_string(), 5)));
    assert!(!events.iter().any(|e| matches!(e, Event::Complete(_))));
}

#[tokio::test(start_paused = true)]
async fn failure_notifies_then_hides_after_grace() {
    init_logging();
    let fetcher = Arc::new(ScriptedFetcher::with_script(
        "job-2",
        vec![
            processing(40.0),
            Ok(StatusSnapshot {
                status: JobStatus::Failed,
                error_message: Some("CrossRef quota exceeded".to_string()),
                ..StatusSnapshot::default()
            }),
        ],
    ));
    let watcher = JobWatcher::new(fetcher.clone(), PollSettings::default());
    let observer = RecordingObserver::default();
    let started = tokio::time::Instant::now();

    let outcome = watcher
        .run("job-2".to_string(), &observer, CancellationToken::new())
        .await;

    assert_eq!(outcome.phase, Phase::Failed);
    assert_eq!(fetcher.calls(), 2);
    assert!(!outcome.view.progress_visible);
    assert!(outcome.view.log_text.ends_with("Error: CrossRef quota exceeded"));
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_millis(7000), "elapsed {elapsed:?}");
    assert!(elapsed < Duration::from_millis(7100), "elapsed {elapsed:?}");

    let terminal: Vec<Event> = observer
        .take()
        .into_iter()
        .filter(|e| !matches!(e, Event::Progress(_)))
        .collect();
    assert_eq!(
        terminal,
        vec![
            Event::Failed(
                "job-2".to_string(),
                Some("CrossRef quota exceeded".to_string())
            ),
            Event::Hidden("job-2".to_string()),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn cancelled_status_halts_on_next_response() {
    init_logging();
    let fetcher = Arc::new(ScriptedFetcher::with_script(
        "job-3",
        vec![
            processing(5.0),
            status(JobStatus::Cancelled),
            processing(6.0),
        ],
    ));
    let watcher = JobWatcher::new(fetcher.clone(), PollSettings::default());
    let observer = RecordingObserver::default();

    let outcome = watcher
        .run("job-3".to_string(), &observer, CancellationToken::new())
        .await;

    assert_eq!(outcome.phase, Phase::Cancelled);
    assert_eq!(fetcher.calls(), 2);
    assert_eq!(
        observer.take().last(),
        Some(&Event::Cancelled("job-3".to_string()))
    );
}

#[tokio::test(start_paused = true)]
async fn stop_handle_ends_chain_without_more_requests() {
    init_logging();
    let fetcher = Arc::new(ScriptedFetcher::default());
    let watcher = JobWatcher::new(fetcher.clone(), PollSettings::default());
    let handle = watcher.spawn("long", Arc::new(RecordingObserver::default()));

    while fetcher.calls() < 2 {
        tokio::time::sleep(Duration::from_millis(500)).await;
    }
    handle.stop();
    let outcome = handle.join().await.unwrap();
    let calls = fetcher.calls();

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(outcome.phase, Phase::Stopped);
    assert_eq!(fetcher.calls(), calls);
}

#[tokio::test(start_paused = true)]
async fn concurrent_chains_are_independent() {
    init_logging();
    let fetcher = Arc::new(ScriptedFetcher::default());
    fetcher.add_script(
        "a",
        vec![processing(50.0), status(JobStatus::Completed)],
    );
    fetcher.add_script("b", vec![status(JobStatus::Failed)]);
    let watcher = JobWatcher::new(fetcher.clone(), PollSettings::default());

    let first = watcher.spawn("a", Arc::new(RecordingObserver::default()));
    let second = watcher.spawn("b", Arc::new(RecordingObserver::default()));
    let first = first.join().await.unwrap();
    let second = second.join().await.unwrap();

    assert_eq!(first.phase, Phase::Completed);
    assert_eq!(first.attempts, 2);
    assert_eq!(second.phase, Phase::Failed);
    assert_eq!(second.attempts, 1);
    assert_eq!(fetcher.calls(), 3);
}

#[tokio::test]
async fn empty_job_id_never_requests() {
    init_logging();
    let fetcher = Arc::new(ScriptedFetcher::default());
    let watcher = JobWatcher::new(fetcher.clone(), PollSettings::default());
    let observer = RecordingObserver::default();

    let outcome = watcher
        .run(String::new(), &observer, CancellationToken::new())
        .await;

    assert_eq!(outcome.phase, Phase::NotStarted);
    assert_eq!(fetcher.calls(), 0);
    assert!(observer.take().is_empty());
}

#[tokio::test(start_paused = true)]
async fn padded_job_id_is_trimmed_for_the_whole_chain() {
    init_logging();
    let fetcher = Arc::new(ScriptedFetcher::with_script(
        "job-7",
        vec![status(JobStatus::Completed)],
    ));
    let watcher = JobWatcher::new(fetcher.clone(), PollSettings::default());

    let handle = watcher.spawn("  job-7 ", Arc::new(RecordingObserver::default()));
    assert_eq!(handle.job_id(), "job-7");
    let outcome = handle.join().await.unwrap();

    assert_eq!(outcome.job_id, "job-7");
    assert_eq!(outcome.phase, Phase::Completed);
    assert_eq!(fetcher.calls(), 1);
}
