//! Watch engine: HTTP job client, effect execution and file persistence.
mod client;
mod endpoints;
mod filename;
mod persist;
mod types;
mod watch;

pub use client::{HttpSettings, JobClient, StatusFetcher};
pub use endpoints::{EndpointTemplates, Endpoints};
pub use filename::{attachment_filename, download_filename};
pub use persist::{ensure_output_dir, AtomicFileWriter, PersistError};
pub use types::{
    CancelResult, ClientError, DownloadedFile, FailureKind, SaveResult, StatusResponse, UrlEntry,
    UrlList, WatchError,
};
pub use watch::{JobWatcher, NoopObserver, PollHandle, PollObserver, PollOutcome};
