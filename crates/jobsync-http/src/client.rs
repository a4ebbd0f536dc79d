//! `reqwest` implementation of [`DownloadsBackend`].

use async_trait::async_trait;
use jobsync_core::normalize::{check_envelope, extract_job_id};
use jobsync_core::{DownloadsBackend, JobKind, StartDownloadRequest, SyncResult};
use reqwest::Method;
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use crate::config::HttpBackendConfig;
use crate::endpoints::{Endpoints, start_body};
use crate::error::{HttpError, HttpResult};

/// Downloads backend reached over HTTP.
///
/// One attempt per call; the runtime loops own retrying.
#[derive(Debug, Clone)]
pub struct ReqwestBackend {
    client: reqwest::Client,
    endpoints: Endpoints,
    token: Option<String>,
}

impl ReqwestBackend {
    /// Build a backend from `config`.
    ///
    /// Fails if the base URL does not parse or the client cannot be built.
    pub fn new(config: &HttpBackendConfig) -> HttpResult<Self> {
        let endpoints = Endpoints::new(&config.base_url)?;
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()?;

        Ok(Self {
            client,
            endpoints,
            token: config.token.clone(),
        })
    }

    async fn send(&self, method: Method, url: Url, body: Option<&Value>) -> HttpResult<Value> {
        debug!(%method, %url, "Downloads backend request");

        let mut request = self.client.request(method, url.clone());
        if let Some(ref token) = self.token {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            warn!(%url, status = status.as_u16(), "Downloads backend returned an error status");
            return Err(HttpError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_slice(&bytes)?)
    }
}

#[async_trait]
impl DownloadsBackend for ReqwestBackend {
    async fn downloader_status(&self) -> SyncResult<Value> {
        let url = self.endpoints.downloader_status()?;
        Ok(self.send(Method::GET, url, None).await?)
    }

    async fn job_status(&self, kind: JobKind, job_id: &str) -> SyncResult<Value> {
        let url = self.endpoints.job_status(kind, job_id)?;
        Ok(self.send(Method::GET, url, None).await?)
    }

    async fn start_download(&self, request: &StartDownloadRequest) -> SyncResult<String> {
        let url = self.endpoints.start_download(request.kind)?;
        let body = self
            .send(Method::POST, url, Some(&start_body(request)))
            .await?;
        extract_job_id(&body)
    }

    async fn cancel_download(&self, kind: JobKind, job_id: &str) -> SyncResult<()> {
        let url = self.endpoints.cancel(kind, job_id)?;
        let body = self.send(Method::POST, url, None).await?;
        check_envelope(&body)
    }
}
