use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Deserializer};
use serde_json::Value;
use thiserror::Error;
use watch_core::{JobId, JobStatus, StatusSnapshot};
use watch_logging::poll_debug;

/// Status endpoint payload. Only `status` is required; an optional field
/// with an unexpected type decodes as `None` instead of failing the response.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StatusResponse {
    pub status: String,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub progress_percentage: Option<f64>,
    #[serde(default, deserialize_with = "lenient_count")]
    pub processed_papers: Option<u64>,
    #[serde(default, deserialize_with = "lenient_count")]
    pub total_papers: Option<u64>,
    #[serde(default, deserialize_with = "lenient_count")]
    pub failed_papers: Option<u64>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub log: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub error_message: Option<String>,
}

/// Numbers, or numeric strings such as Django's `"100.00"` decimals.
fn number_value(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    };
    number.filter(|n| n.is_finite())
}

fn ignored(value: &Value) {
    if !value.is_null() {
        poll_debug!("ignoring status field with unexpected value {}", value);
    }
}

fn lenient_f64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
    let value = Value::deserialize(deserializer)?;
    let number = number_value(&value);
    if number.is_none() {
        ignored(&value);
    }
    Ok(number)
}

fn lenient_count<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u64>, D::Error> {
    let value = Value::deserialize(deserializer)?;
    let count = number_value(&value)
        .filter(|n| *n >= 0.0)
        .map(|n| n.round() as u64);
    if count.is_none() {
        ignored(&value);
    }
    Ok(count)
}

fn lenient_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    let value = Value::deserialize(deserializer)?;
    match value {
        Value::String(text) => Ok(Some(text)),
        other => {
            ignored(&other);
            Ok(None)
        }
    }
}

impl From<StatusResponse> for StatusSnapshot {
    fn from(response: StatusResponse) -> Self {
        StatusSnapshot {
            status: JobStatus::parse(&response.status),
            progress_percentage: response.progress_percentage,
            processed_papers: response.processed_papers,
            total_papers: response.total_papers,
            failed_papers: response.failed_papers,
            log: response.log,
            error_message: response.error_message,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UrlEntry {
    #[serde(default)]
    pub title: String,
    pub url: String,
    #[serde(rename = "type", default)]
    pub kind: String,
}

/// Links a completed job wants opened (DOIs, publisher pages, ...).
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct UrlList {
    #[serde(default)]
    pub total_urls: usize,
    #[serde(default)]
    pub urls: Vec<UrlEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct CancelResult {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct SaveResult {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub file_paths: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadedFile {
    pub job_id: JobId,
    pub filename: String,
    pub path: PathBuf,
    pub byte_len: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct ClientError {
    pub kind: FailureKind,
    pub message: String,
}

impl ClientError {
    pub(crate) fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    InvalidUrl,
    HttpStatus(u16),
    Timeout,
    Network,
    Decode,
    TooLarge { max_bytes: u64, actual: Option<u64> },
    /// The server answered but refused the request (`success: false`).
    Rejected,
    Io,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::InvalidUrl => write!(f, "invalid url"),
            FailureKind::HttpStatus(code) => write!(f, "http status {code}"),
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::Network => write!(f, "network error"),
            FailureKind::Decode => write!(f, "malformed response"),
            FailureKind::TooLarge { max_bytes, actual } => {
                write!(f, "response too large (max {max_bytes}, actual {actual:?})")
            }
            FailureKind::Rejected => write!(f, "rejected by server"),
            FailureKind::Io => write!(f, "io error"),
        }
    }
}

#[derive(Debug, Error)]
pub enum WatchError {
    #[error("poll task for job {job_id} did not finish: {source}")]
    Join {
        job_id: JobId,
        #[source]
        source: tokio::task::JoinError,
    },
}
