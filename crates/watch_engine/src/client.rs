use std::path::Path;
use std::time::Duration;

use futures_util::StreamExt;
use reqwest::header::{HeaderValue, ACCEPT, CONTENT_DISPOSITION, CONTENT_TYPE};
use serde::de::DeserializeOwned;
use url::Url;
use watch_core::StatusSnapshot;
use watch_logging::{poll_debug, poll_info};

use crate::filename::download_filename;
use crate::persist::AtomicFileWriter;
use crate::{
    CancelResult, ClientError, DownloadedFile, Endpoints, FailureKind, SaveResult,
    StatusResponse, UrlList,
};

#[derive(Debug, Clone)]
pub struct HttpSettings {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    /// Upper bound for any response body, JSON or file.
    pub max_body_bytes: u64,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            max_body_bytes: 50 * 1024 * 1024,
        }
    }
}

/// Source of job status snapshots; the poll driver only needs this.
#[async_trait::async_trait]
pub trait StatusFetcher: Send + Sync {
    async fn fetch_status(&self, job_id: &str) -> Result<StatusSnapshot, ClientError>;
}

#[derive(Debug, Clone)]
pub struct JobClient {
    http: reqwest::Client,
    endpoints: Endpoints,
    settings: HttpSettings,
}

impl JobClient {
    pub fn new(endpoints: Endpoints, settings: HttpSettings) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .build()
            .map_err(|err| ClientError::new(FailureKind::Network, err.to_string()))?;
        Ok(Self {
            http,
            endpoints,
            settings,
        })
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    /// Asks the server to cancel the job. Running poll chains are not touched;
    /// they observe the new status on their next tick.
    pub async fn cancel(&self, job_id: &str) -> Result<CancelResult, ClientError> {
        let url = self.endpoints.cancel(job_id)?;
        let result: CancelResult = self.post_json(url, &serde_json::json!({})).await?;
        if !result.success {
            return Err(rejected(result.error.or(result.message), "cancel refused"));
        }
        poll_info!(job = job_id; "cancel requested");
        Ok(result)
    }

    pub async fn url_list(&self, job_id: &str) -> Result<UrlList, ClientError> {
        let url = self.endpoints.urls(job_id)?;
        self.get_json(url).await
    }

    pub async fn save_to_project(
        &self,
        job_id: &str,
        project_id: &str,
    ) -> Result<SaveResult, ClientError> {
        let url = self.endpoints.save_to_project(job_id)?;
        let body = serde_json::json!({ "project_id": project_id });
        let result: SaveResult = self.post_json(url, &body).await?;
        if !result.success {
            return Err(rejected(result.error.or(result.message), "save refused"));
        }
        poll_info!(job = job_id; "saved to project {}", project_id);
        Ok(result)
    }

    /// Downloads the job's result file into `output_dir`, named after the
    /// server's `Content-Disposition` header when it provides one.
    pub async fn download(
        &self,
        job_id: &str,
        output_dir: &Path,
    ) -> Result<DownloadedFile, ClientError> {
        let url = self.endpoints.download(job_id)?;
        let response = self.send(self.http.get(url)).await?;
        let filename = download_filename(
            response
                .headers()
                .get(CONTENT_DISPOSITION)
                .and_then(|value| value.to_str().ok()),
            job_id,
        );
        let bytes = self.read_body(response).await?;

        let writer = AtomicFileWriter::new(output_dir.to_path_buf());
        let path = writer
            .write(&filename, &bytes)
            .map_err(|err| ClientError::new(FailureKind::Io, err.to_string()))?;
        poll_info!(job = job_id; "downloaded {} bytes to {:?}", bytes.len(), path);

        Ok(DownloadedFile {
            job_id: job_id.to_string(),
            filename,
            path,
            byte_len: bytes.len() as u64,
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, ClientError> {
        let request = self
            .http
            .get(url)
            .header(ACCEPT, HeaderValue::from_static("application/json"));
        let response = self.send(request).await?;
        let bytes = self.read_body(response).await?;
        decode(&bytes)
    }

    async fn post_json<T: DeserializeOwned>(
        &self,
        url: Url,
        body: &serde_json::Value,
    ) -> Result<T, ClientError> {
        let payload = serde_json::to_vec(body)
            .map_err(|err| ClientError::new(FailureKind::Decode, err.to_string()))?;
        let request = self
            .http
            .post(url)
            .header(ACCEPT, HeaderValue::from_static("application/json"))
            .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .header("X-Requested-With", HeaderValue::from_static("XMLHttpRequest"))
            .body(payload);
        let response = self.send(request).await?;
        let bytes = self.read_body(response).await?;
        decode(&bytes)
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response, ClientError> {
        let response = request.send().await.map_err(map_reqwest_error)?;
        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::new(
                FailureKind::HttpStatus(status.as_u16()),
                status.to_string(),
            ));
        }
        Ok(response)
    }

    async fn read_body(&self, response: reqwest::Response) -> Result<Vec<u8>, ClientError> {
        let max_bytes = self.settings.max_body_bytes;
        if let Some(content_len) = response.content_length() {
            if content_len > max_bytes {
                return Err(too_large(max_bytes, Some(content_len)));
            }
        }

        let mut bytes = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(map_reqwest_error)?;
            let next_len = bytes.len() as u64 + chunk.len() as u64;
            if next_len > max_bytes {
                return Err(too_large(max_bytes, Some(next_len)));
            }
            bytes.extend_from_slice(&chunk);
        }
        Ok(bytes)
    }
}

#[async_trait::async_trait]
impl StatusFetcher for JobClient {
    async fn fetch_status(&self, job_id: &str) -> Result<StatusSnapshot, ClientError> {
        let url = self.endpoints.status(job_id)?;
        let response: StatusResponse = self.get_json(url).await?;
        poll_debug!(job = job_id; "status {}", response.status);
        Ok(response.into())
    }
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, ClientError> {
    serde_json::from_slice(bytes).map_err(|err| ClientError::new(FailureKind::Decode, err.to_string()))
}

fn rejected(server_message: Option<String>, fallback: &str) -> ClientError {
    ClientError::new(
        FailureKind::Rejected,
        server_message.unwrap_or_else(|| fallback.to_string()),
    )
}

fn too_large(max_bytes: u64, actual: Option<u64>) -> ClientError {
    ClientError::new(
        FailureKind::TooLarge { max_bytes, actual },
        "response too large",
    )
}

fn map_reqwest_error(err: reqwest::Error) -> ClientError {
    if err.is_timeout() {
        return ClientError::new(FailureKind::Timeout, err.to_string());
    }
    if err.is_decode() {
        return ClientError::new(FailureKind::Decode, err.to_string());
    }
    ClientError::new(FailureKind::Network, err.to_string())
}
