use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use watch_engine::{AtomicFileWriter, UrlList};
use watch_logging::{poll_error, poll_info, poll_warn};

/// How long a completed result stays available to `last`.
pub const CACHE_TTL_HOURS: i64 = 24;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedUrl {
    pub title: String,
    pub url: String,
    pub kind: String,
}

/// Most recent completed job, as recorded after its completion side effects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LastResult {
    pub job_id: String,
    /// RFC 3339 timestamp of completion.
    pub completed_at: String,
    pub processed_papers: Option<u64>,
    pub total_papers: Option<u64>,
    pub failed_papers: Option<u64>,
    pub downloaded_path: Option<PathBuf>,
    pub urls: Vec<CachedUrl>,
}

impl LastResult {
    pub fn new(job_id: &str, completed_at: DateTime<Utc>) -> Self {
        Self {
            job_id: job_id.to_string(),
            completed_at: completed_at.to_rfc3339(),
            processed_papers: None,
            total_papers: None,
            failed_papers: None,
            downloaded_path: None,
            urls: Vec::new(),
        }
    }

    pub fn with_urls(mut self, list: &UrlList) -> Self {
        self.urls = list
            .urls
            .iter()
            .map(|entry| CachedUrl {
                title: entry.title.clone(),
                url: entry.url.clone(),
                kind: entry.kind.clone(),
            })
            .collect();
        self
    }

    fn completed_at(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.completed_at)
            .ok()
            .map(|at| at.with_timezone(&Utc))
    }

    /// Unparseable timestamps count as expired.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match self.completed_at() {
            Some(at) => now - at > Duration::hours(CACHE_TTL_HOURS),
            None => true,
        }
    }
}

/// Returns the cached result if it is younger than 24 hours. Expired or
/// unreadable cache files are removed.
pub(crate) fn load_last_result(path: &Path, now: DateTime<Utc>) -> Option<LastResult> {
    let content = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return None,
        Err(err) => {
            poll_warn!("Failed to read result cache {:?}: {}", path, err);
            return None;
        }
    };

    let result: LastResult = match ron::from_str(&content) {
        Ok(result) => result,
        Err(err) => {
            poll_warn!("Discarding unparseable result cache {:?}: {}", path, err);
            remove_cache(path);
            return None;
        }
    };

    if result.is_expired(now) {
        poll_info!(job = result.job_id; "cached result expired, removing {:?}", path);
        remove_cache(path);
        return None;
    }
    Some(result)
}

pub(crate) fn save_last_result(path: &Path, result: &LastResult) {
    let Some(filename) = path.file_name().and_then(|name| name.to_str()) else {
        poll_error!("Result cache path {:?} has no file name", path);
        return;
    };
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };

    let pretty = ron::ser::PrettyConfig::new();
    let content = match ron::ser::to_string_pretty(result, pretty) {
        Ok(text) => text,
        Err(err) => {
            poll_error!("Failed to serialize result cache: {}", err);
            return;
        }
    };

    let writer = AtomicFileWriter::new(dir);
    match writer.write(filename, content.as_bytes()) {
        Ok(target) => poll_info!(job = result.job_id; "recorded result in {:?}", target),
        Err(err) => poll_error!("Failed to write result cache {:?}: {}", path, err),
    }
}

fn remove_cache(path: &Path) {
    if let Err(err) = fs::remove_file(path) {
        poll_warn!("Failed to remove result cache {:?}: {}", path, err);
    }
}
