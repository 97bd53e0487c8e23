#[derive(Debug, Clone, PartialEq)]
pub enum Msg {
    /// Begin polling the given job.
    Start { job_id: crate::JobId },
    /// A scheduled poll delay elapsed; time to ask the server again.
    TickElapsed,
    /// The status endpoint answered.
    StatusReceived(crate::StatusSnapshot),
    /// The status request failed (network, non-2xx, undecodable body).
    StatusFailed { error: String },
    /// The grace period after a failure elapsed.
    GraceElapsed,
    /// Caller asked to stop polling.
    Stop,
}
