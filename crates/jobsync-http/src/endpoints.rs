//! URL and request body construction for the downloads API.
//!
//! Pure functions only; nothing here performs I/O.

use jobsync_core::{JobKind, StartDownloadRequest};
use serde_json::{Map, Value, json};
use url::Url;

use crate::error::{HttpError, HttpResult};

/// Resolved endpoint URLs for one base URL.
#[derive(Debug, Clone)]
pub struct Endpoints {
    base: Url,
}

impl Endpoints {
    /// Parse `base`, forcing a trailing slash so relative joins append.
    pub fn new(base: &str) -> HttpResult<Self> {
        let mut base = Url::parse(base)?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Ok(Self { base })
    }

    /// `GET downloader/status`
    pub fn downloader_status(&self) -> HttpResult<Url> {
        Ok(self.base.join("downloader/status")?)
    }

    /// `GET <kind>/status/{job_id}`
    pub fn job_status(&self, kind: JobKind, job_id: &str) -> HttpResult<Url> {
        self.job_url(kind, "status", job_id)
    }

    /// `POST <kind>/download`
    pub fn start_download(&self, kind: JobKind) -> HttpResult<Url> {
        Ok(self.base.join(&format!("{}/download", kind.path_segment()))?)
    }

    /// `POST <kind>/cancel/{job_id}`
    pub fn cancel(&self, kind: JobKind, job_id: &str) -> HttpResult<Url> {
        self.job_url(kind, "cancel", job_id)
    }

    fn job_url(&self, kind: JobKind, action: &str, job_id: &str) -> HttpResult<Url> {
        // Dot segments would be collapsed by the join
        if job_id.is_empty() || job_id == "." || job_id == ".." {
            return Err(HttpError::InvalidJobId(job_id.to_string()));
        }
        let path = format!(
            "{}/{action}/{}",
            kind.path_segment(),
            urlencoding::encode(job_id)
        );
        Ok(self.base.join(&path)?)
    }
}

/// JSON body of a start-download request.
///
/// `hf` takes `{ modelId, targetDir? }`; every other kind takes a batch of
/// `{ url, destDir? }` items.
pub fn start_body(request: &StartDownloadRequest) -> Value {
    match request.kind {
        JobKind::Hf => {
            let mut body = Map::new();
            body.insert("modelId".to_string(), json!(request.source));
            if let Some(ref dir) = request.target_dir {
                body.insert("targetDir".to_string(), json!(dir));
            }
            Value::Object(body)
        }
        JobKind::Url | JobKind::Dataset | JobKind::Tts => {
            let mut item = Map::new();
            item.insert("url".to_string(), json!(request.source));
            if let Some(ref dir) = request.target_dir {
                item.insert("destDir".to_string(), json!(dir));
            }
            json!({ "items": [item] })
        }
    }
}
