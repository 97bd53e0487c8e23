use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use watch_core::PollSettings;
use watch_engine::{EndpointTemplates, Endpoints, HttpSettings};
use watch_logging::{poll_info, poll_warn};

pub const DEFAULT_CONFIG_FILE: &str = "enrich-watch.ron";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    pub base_url: String,
    pub endpoints: EndpointTemplates,
    pub poll: PollConfig,
    pub http: HttpConfig,
    pub output_dir: PathBuf,
    pub auto_download: bool,
    pub cache_path: PathBuf,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            endpoints: EndpointTemplates::default(),
            poll: PollConfig::default(),
            http: HttpConfig::default(),
            output_dir: PathBuf::from("output"),
            auto_download: true,
            cache_path: PathBuf::from(".enrich_watch_cache.ron"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    pub interval_ms: u64,
    pub error_backoff_ms: u64,
    pub max_attempts: u32,
    pub failure_grace_ms: u64,
}

impl Default for PollConfig {
    fn default() -> Self {
        let settings = PollSettings::default();
        Self {
            interval_ms: millis(settings.interval),
            error_backoff_ms: millis(settings.error_backoff),
            max_attempts: settings.max_attempts,
            failure_grace_ms: millis(settings.failure_grace),
        }
    }
}

/// Shortest delay allowed between two status requests.
pub const MIN_POLL_DELAY_MS: u64 = 100;

impl PollConfig {
    /// Delays below `MIN_POLL_DELAY_MS` and a zero attempt ceiling are raised
    /// to the minimum so a chain never polls in a tight loop.
    pub fn to_settings(self) -> PollSettings {
        let interval_ms = at_least("interval_ms", self.interval_ms, MIN_POLL_DELAY_MS);
        let error_backoff_ms = at_least("error_backoff_ms", self.error_backoff_ms, MIN_POLL_DELAY_MS);
        let max_attempts = if self.max_attempts == 0 {
            poll_warn!("poll.max_attempts = 0 would never poll; using 1");
            1
        } else {
            self.max_attempts
        };
        PollSettings {
            interval: Duration::from_millis(interval_ms),
            error_backoff: Duration::from_millis(error_backoff_ms),
            max_attempts,
            failure_grace: Duration::from_millis(self.failure_grace_ms),
        }
    }
}

fn at_least(name: &str, value: u64, minimum: u64) -> u64 {
    if value < minimum {
        poll_warn!("poll.{} = {} is below {}; using {}", name, value, minimum, minimum);
        minimum
    } else {
        value
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
    pub max_download_bytes: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        let settings = HttpSettings::default();
        Self {
            connect_timeout_secs: settings.connect_timeout.as_secs(),
            request_timeout_secs: settings.request_timeout.as_secs(),
            max_download_bytes: settings.max_body_bytes,
        }
    }
}

impl HttpConfig {
    pub fn to_settings(self) -> HttpSettings {
        HttpSettings {
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            max_body_bytes: self.max_download_bytes,
        }
    }
}

/// Values given on the command line; `None` keeps the file's value.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub base_url: Option<String>,
    pub interval_ms: Option<u64>,
    pub max_attempts: Option<u32>,
    pub output_dir: Option<PathBuf>,
    pub no_download: bool,
}

impl WatchConfig {
    /// Reads `explicit` if given (it must exist), otherwise
    /// `./enrich-watch.ron` when present, otherwise the defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) => Self::read(path),
            None => {
                let path = Path::new(DEFAULT_CONFIG_FILE);
                if path.exists() {
                    Self::read(path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    fn read(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config = Self::parse(&text)
            .with_context(|| format!("failed to parse config {}", path.display()))?;
        poll_info!("Loaded config from {:?}", path);
        Ok(config)
    }

    pub fn parse(text: &str) -> Result<Self> {
        Ok(ron::from_str(text)?)
    }

    pub fn apply_overrides(&mut self, overrides: &Overrides) {
        if let Some(base_url) = &overrides.base_url {
            self.base_url = base_url.clone();
        }
        if let Some(interval_ms) = overrides.interval_ms {
            self.poll.interval_ms = interval_ms;
        }
        if let Some(max_attempts) = overrides.max_attempts {
            self.poll.max_attempts = max_attempts;
        }
        if let Some(output_dir) = &overrides.output_dir {
            self.output_dir = output_dir.clone();
        }
        if overrides.no_download {
            self.auto_download = false;
        }
    }

    pub fn endpoints(&self) -> Result<Endpoints> {
        Endpoints::new(&self.base_url, self.endpoints.clone())
            .with_context(|| format!("invalid base url {:?}", self.base_url))
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
