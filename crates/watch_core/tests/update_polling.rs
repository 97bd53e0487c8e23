use std::sync::Once;
use std::time::Duration;

use pretty_assertions::assert_eq;
use watch_core::{
    update, Effect, JobStatus, Msg, Notification, Phase, PollSettings, PollerState,
    StatusSnapshot, CONNECTION_RETRY_NOTE, TIMEOUT_MESSAGE,
};

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(watch_logging::initialize_for_tests);
}

fn start(job_id: &str) -> (PollerState, Vec<Effect>) {
    update(
        PollerState::new(PollSettings::default()),
        Msg::Start {
            job_id: job_id.to_string(),
        },
    )
}

fn fetch(job_id: &str) -> Effect {
    Effect::FetchStatus {
        job_id: job_id.to_string(),
    }
}

fn processing(percentage: f64) -> Msg {
    Msg::StatusReceived(StatusSnapshot::new(JobStatus::Processing).with_progress(percentage))
}

fn network_error() -> Msg {
    Msg::StatusFailed {
        error: "connection refused".to_string(),
    }
}

#[test]
fn start_without_job_id_is_ignored() {
    init_logging();
    for blank in ["", "   "] {
        let (state, effects) = start(blank);
        assert!(effects.is_empty());
        assert_eq!(state.phase(), Phase::NotStarted);
        assert_eq!(state.job_id(), None);
    }
}

#[test]
fn start_requests_status_immediately() {
    init_logging();
    let (mut state, effects) = start("job-1");

    assert_eq!(effects, vec![fetch("job-1")]);
    assert_eq!(state.phase(), Phase::Polling);
    let view = state.view();
    assert_eq!(view.job_id, "job-1");
    assert!(view.progress_visible);
    assert!(!view.actions.any());
    assert!(state.consume_dirty());
    assert!(!state.consume_dirty());
}

#[test]
fn start_while_polling_is_ignored() {
    init_logging();
    let (state, _) = start("job-1");
    let (next, effects) = update(
        state.clone(),
        Msg::Start {
            job_id: "job-2".to_string(),
        },
    );

    assert!(effects.is_empty());
    assert_eq!(next, state);
}

#[test]
fn scripted_sequence_shows_progress_then_completes() {
    init_logging();
    let settings = PollSettings::default();
    let mut requests = 0;

    let (state, effects) = start("job-7");
    requests += effects.iter().filter(|e| matches!(e, Effect::FetchStatus { .. })).count();

    // Tick 1: processing at 10%.
    let (state, effects) = update(state, processing(10.0));
    assert_eq!(
        effects,
        vec![Effect::ScheduleTick {
            delay: settings.interval
        }]
    );
    assert_eq!(state.view().progress_percentage, Some(10.0));
    let (state, effects) = update(state, Msg::TickElapsed);
    assert_eq!(effects, vec![fetch("job-7")]);
    requests += 1;

    // Tick 2: network error, progress stays at 10%.
    let (state, effects) = update(state, network_error());
    assert_eq!(
        effects,
        vec![Effect::ScheduleTick {
            delay: settings.error_backoff
        }]
    );
    assert_eq!(state.view().progress_percentage, Some(10.0));
    let (state, effects) = update(state, Msg::TickElapsed);
    assert_eq!(effects, vec![fetch("job-7")]);
    requests += 1;

    // Tick 3: processing at 55%.
    let (state, _) = update(state, processing(55.0));
    assert_eq!(state.view().progress_percentage, Some(55.0));
    let (state, effects) = update(state, Msg::TickElapsed);
    assert_eq!(effects, vec![fetch("job-7")]);
    requests += 1;

    // Tick 4: completed.
    let (state, effects) = update(
        state,
        Msg::StatusReceived(StatusSnapshot::new(JobStatus::Completed)),
    );
    assert_eq!(
        effects,
        vec![Effect::Notify(Notification::Completed {
            job_id: "job-7".to_string()
        })]
    );

    let view = state.view();
    assert_eq!(requests, 4);
    assert_eq!(state.attempts(), 4);
    assert_eq!(view.phase, Phase::Completed);
    assert_eq!(view.progress_percentage, Some(55.0));
    assert!(view.actions.download);
    assert!(view.actions.view_diff);
    assert!(view.actions.open_urls);
    assert!(view.actions.save_to_project);
}

#[test]
fn completed_without_optional_fields_still_notifies() {
    init_logging();
    let (state, _) = start("bare");
    let (state, effects) = update(
        state,
        Msg::StatusReceived(StatusSnapshot::new(JobStatus::Completed)),
    );

    assert_eq!(
        effects,
        vec![Effect::Notify(Notification::Completed {
            job_id: "bare".to_string()
        })]
    );
    let view = state.view();
    assert_eq!(view.progress_percentage, None);
    assert_eq!(view.processed_papers, None);
    assert_eq!(view.total_papers, None);
    assert_eq!(view.log_text, "");
}

#[test]
fn absent_fields_keep_previous_values() {
    init_logging();
    let (state, _) = start("job-1");
    let (state, _) = update(
        state,
        Msg::StatusReceived(StatusSnapshot {
            status: JobStatus::Processing,
            progress_percentage: Some(40.0),
            processed_papers: Some(8),
            total_papers: Some(20),
            failed_papers: Some(1),
            log: Some("Processing entry 8/20".to_string()),
            error_message: None,
        }),
    );
    let (state, _) = update(state, Msg::TickElapsed);
    let (state, _) = update(
        state,
        Msg::StatusReceived(StatusSnapshot::new(JobStatus::Processing)),
    );

    let view = state.view();
    assert_eq!(view.progress_percentage, Some(40.0));
    assert_eq!(view.processed_papers, Some(8));
    assert_eq!(view.total_papers, Some(20));
    assert_eq!(view.failed_papers, Some(1));
    assert_eq!(view.log_text, "Processing entry 8/20");
}

#[test]
fn progress_is_displayed_verbatim() {
    init_logging();
    let (state, _) = start("job-1");
    let (state, _) = update(state, processing(70.0));
    let (state, _) = update(state, Msg::TickElapsed);
    let (state, _) = update(state, processing(65.5));

    assert_eq!(state.view().progress_percentage, Some(65.5));
}

#[test]
fn server_log_replaces_previous_log_text() {
    init_logging();
    let (state, _) = start("job-1");
    let mut snapshot = StatusSnapshot::new(JobStatus::Processing);
    snapshot.log = Some("line a\nline b".to_string());
    let (state, _) = update(state, Msg::StatusReceived(snapshot.clone()));
    let (state, _) = update(state, Msg::TickElapsed);
    snapshot.log = Some("line a\nline b\nline c".to_string());
    let (state, _) = update(state, Msg::StatusReceived(snapshot));

    assert_eq!(state.view().log_text, "line a\nline b\nline c");
}

#[test]
fn connection_note_is_appended_only_once() {
    init_logging();
    let (state, _) = start("job-1");
    let (state, _) = update(state, network_error());
    let (state, _) = update(state, Msg::TickElapsed);
    let (state, _) = update(state, network_error());

    let log = state.view().log_text;
    assert_eq!(log.matches(CONNECTION_RETRY_NOTE).count(), 1);
    assert_eq!(state.attempts(), 2);
    assert_eq!(state.phase(), Phase::Polling);
}

#[test]
fn attempt_ceiling_times_out() {
    init_logging();
    let settings = PollSettings {
        max_attempts: 3,
        ..PollSettings::default()
    };
    let (state, _) = update(
        PollerState::new(settings),
        Msg::Start {
            job_id: "slow".to_string(),
        },
    );
    let (state, _) = update(state, processing(1.0));
    let (state, _) = update(state, Msg::TickElapsed);
    let (state, _) = update(state, network_error());
    let (state, _) = update(state, Msg::TickElapsed);
    let (state, effects) = update(state, processing(2.0));

    assert_eq!(
        effects,
        vec![Effect::Notify(Notification::TimedOut {
            job_id: "slow".to_string(),
            attempts: 3
        })]
    );
    assert_eq!(state.phase(), Phase::TimedOut);
    assert_eq!(state.view().message.as_deref(), Some(TIMEOUT_MESSAGE));
    assert!(!state.view().actions.any());

    let (_, effects) = update(state, Msg::TickElapsed);
    assert!(effects.is_empty());
}

#[test]
fn transient_errors_alone_reach_the_ceiling() {
    init_logging();
    let settings = PollSettings {
        max_attempts: 2,
        ..PollSettings::default()
    };
    let (state, _) = update(
        PollerState::new(settings),
        Msg::Start {
            job_id: "offline".to_string(),
        },
    );
    let (state, _) = update(state, network_error());
    let (state, _) = update(state, Msg::TickElapsed);
    let (state, effects) = update(state, network_error());

    assert_eq!(
        effects,
        vec![Effect::Notify(Notification::TimedOut {
            job_id: "offline".to_string(),
            attempts: 2
        })]
    );
}

#[test]
fn failure_appends_error_and_hides_after_grace() {
    init_logging();
    let settings = PollSettings::default();
    let (state, _) = start("job-9");
    let (state, _) = update(state, processing(30.0));
    let (state, _) = update(state, Msg::TickElapsed);
    let (state, effects) = update(
        state,
        Msg::StatusReceived(StatusSnapshot {
            status: JobStatus::Failed,
            log: Some("Parsing bibliography".to_string()),
            error_message: Some("Invalid BibTeX".to_string()),
            ..StatusSnapshot::default()
        }),
    );

    assert_eq!(
        effects,
        vec![
            Effect::Notify(Notification::Failed {
                job_id: "job-9".to_string(),
                message: Some("Invalid BibTeX".to_string()),
            }),
            Effect::ScheduleGrace {
                delay: settings.failure_grace
            },
        ]
    );
    let view = state.view();
    assert_eq!(view.phase, Phase::Failed);
    assert_eq!(view.log_text, "Parsing bibliography\nError: Invalid BibTeX");
    assert_eq!(view.message.as_deref(), Some("Job failed: Invalid BibTeX"));
    assert!(view.progress_visible);
    assert!(!view.actions.any());

    let (state, effects) = update(state, Msg::GraceElapsed);
    assert_eq!(
        effects,
        vec![Effect::Notify(Notification::ProgressHidden {
            job_id: "job-9".to_string()
        })]
    );
    assert!(!state.view().progress_visible);

    let (_, effects) = update(state, Msg::GraceElapsed);
    assert!(effects.is_empty());
}

#[test]
fn cancelled_status_halts_on_that_response() {
    init_logging();
    let (state, _) = start("job-3");
    let (state, effects) = update(state, processing(20.0));
    assert!(matches!(effects[..], [Effect::ScheduleTick { .. }]));
    let (state, _) = update(state, Msg::TickElapsed);
    let (state, effects) = update(
        state,
        Msg::StatusReceived(StatusSnapshot::new(JobStatus::Cancelled)),
    );

    assert_eq!(
        effects,
        vec![Effect::Notify(Notification::Cancelled {
            job_id: "job-3".to_string()
        })]
    );
    assert_eq!(state.phase(), Phase::Cancelled);
}

#[test]
fn nothing_happens_after_terminal_status() {
    init_logging();
    let (state, _) = start("job-1");
    let (state, _) = update(
        state,
        Msg::StatusReceived(StatusSnapshot::new(JobStatus::Completed)),
    );
    let attempts = state.attempts();

    for msg in [
        Msg::TickElapsed,
        processing(99.0),
        network_error(),
        Msg::GraceElapsed,
        Msg::Stop,
    ] {
        let (next, effects) = update(state.clone(), msg);
        assert!(effects.is_empty());
        assert_eq!(next.attempts(), attempts);
        assert_eq!(next.phase(), Phase::Completed);
    }
}

#[test]
fn stop_ends_the_chain() {
    init_logging();
    let (state, _) = start("job-1");
    let (state, _) = update(state, processing(5.0));
    let (state, effects) = update(state, Msg::Stop);

    assert!(effects.is_empty());
    assert_eq!(state.phase(), Phase::Stopped);
    let (_, effects) = update(state, Msg::TickElapsed);
    assert!(effects.is_empty());
}

#[test]
fn unrecognized_status_is_polled_like_processing() {
    init_logging();
    let (state, _) = start("job-1");
    let (state, effects) = update(
        state,
        Msg::StatusReceived(StatusSnapshot::new(JobStatus::parse("queued"))),
    );

    assert_eq!(
        effects,
        vec![Effect::ScheduleTick {
            delay: Duration::from_millis(2000)
        }]
    );
    assert_eq!(state.view().status_label.as_deref(), Some("queued"));
}

#[test]
fn restart_after_terminal_starts_fresh() {
    init_logging();
    let (state, _) = start("job-1");
    let (state, _) = update(state, network_error());
    let (state, _) = update(state, Msg::TickElapsed);
    let (state, _) = update(
        state,
        Msg::StatusReceived(StatusSnapshot::new(JobStatus::Failed)),
    );

    let (state, effects) = update(
        state,
        Msg::Start {
            job_id: "job-2".to_string(),
        },
    );
    assert_eq!(effects, vec![fetch("job-2")]);
    assert_eq!(state.attempts(), 0);
    assert_eq!(state.view().log_text, "");
    assert_eq!(state.view().message, None);
}

#[test]
fn status_strings_parse_case_insensitively() {
    assert_eq!(JobStatus::parse("Completed"), JobStatus::Completed);
    assert_eq!(JobStatus::parse(" processing "), JobStatus::Processing);
    assert_eq!(JobStatus::parse("PENDING"), JobStatus::Pending);
    assert_eq!(JobStatus::parse("canceled"), JobStatus::Cancelled);
    assert_eq!(
        JobStatus::parse("waiting"),
        JobStatus::Unknown("waiting".to_string())
    );
    assert!(JobStatus::Failed.is_terminal());
    assert!(!JobStatus::Unknown("waiting".to_string()).is_terminal());
}
