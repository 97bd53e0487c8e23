use serde::{Deserialize, Serialize};
use url::Url;

use crate::{ClientError, FailureKind};

const JOB_ID_PLACEHOLDER: &str = "{job_id}";

/// Path templates for the job endpoints. Each contains a `{job_id}`
/// placeholder and is joined onto the server's base URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointTemplates {
    pub status: String,
    pub cancel: String,
    pub download: String,
    pub urls: String,
    pub save_to_project: String,
}

impl Default for EndpointTemplates {
    fn default() -> Self {
        Self {
            status: "/scholar/bibtex/job/{job_id}/status/".to_string(),
            cancel: "/scholar/bibtex/job/{job_id}/cancel/".to_string(),
            download: "/scholar/bibtex/job/{job_id}/download/".to_string(),
            urls: "/scholar/bibtex/job/{job_id}/urls/".to_string(),
            save_to_project: "/scholar/bibtex/job/{job_id}/save-to-project/".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    base_url: Url,
    templates: EndpointTemplates,
}

impl Endpoints {
    pub fn new(base_url: &str, templates: EndpointTemplates) -> Result<Self, ClientError> {
        let base_url = Url::parse(base_url)
            .map_err(|err| ClientError::new(FailureKind::InvalidUrl, err.to_string()))?;
        if base_url.cannot_be_a_base() {
            return Err(ClientError::new(
                FailureKind::InvalidUrl,
                format!("{base_url} cannot be used as a base url"),
            ));
        }
        Ok(Self {
            base_url,
            templates,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn status(&self, job_id: &str) -> Result<Url, ClientError> {
        self.resolve(&self.templates.status, job_id)
    }

    pub fn cancel(&self, job_id: &str) -> Result<Url, ClientError> {
        self.resolve(&self.templates.cancel, job_id)
    }

    pub fn download(&self, job_id: &str) -> Result<Url, ClientError> {
        self.resolve(&self.templates.download, job_id)
    }

    pub fn urls(&self, job_id: &str) -> Result<Url, ClientError> {
        self.resolve(&self.templates.urls, job_id)
    }

    pub fn save_to_project(&self, job_id: &str) -> Result<Url, ClientError> {
        self.resolve(&self.templates.save_to_project, job_id)
    }

    /// Substitutes the job id into each path segment of `template`; segments
    /// are percent-encoded, so an id can never add or escape path levels.
    fn resolve(&self, template: &str, job_id: &str) -> Result<Url, ClientError> {
        if job_id.trim().is_empty() {
            return Err(ClientError::new(FailureKind::InvalidUrl, "empty job id"));
        }
        let mut url = self.base_url.clone();
        {
            let mut segments = url.path_segments_mut().map_err(|()| {
                ClientError::new(FailureKind::InvalidUrl, "base url cannot carry a path")
            })?;
            segments.pop_if_empty();
            for segment in template.trim_start_matches('/').split('/') {
                segments.push(&segment.replace(JOB_ID_PLACEHOLDER, job_id));
            }
        }
        Ok(url)
    }
}
