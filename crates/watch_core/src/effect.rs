use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    FetchStatus { job_id: crate::JobId },
    ScheduleTick { delay: Duration },
    ScheduleGrace { delay: Duration },
    Notify(Notification),
}

/// Terminal outcomes reported to whoever drives the poll chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    Completed {
        job_id: crate::JobId,
    },
    Failed {
        job_id: crate::JobId,
        message: Option<String>,
    },
    Cancelled {
        job_id: crate::JobId,
    },
    TimedOut {
        job_id: crate::JobId,
        attempts: u32,
    },
    ProgressHidden {
        job_id: crate::JobId,
    },
}
