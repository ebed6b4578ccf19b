//! Stateless HTTP client for the sync API.
//!
//! One method per endpoint. The client classifies failures into the
//! [`SyncError`] taxonomy and never retries; retry is a cycle-level
//! concern handled by the orchestrator.

use chrono::{DateTime, Utc};
use reqwest::multipart;
use reqwest::{RequestBuilder, Response, StatusCode};

use super::codec::{UpdateFeed, UploadAck, WireUpload};
use super::types::SyncError;
use super::REQUEST_TIMEOUT;

/// Client for the field-service sync API.
pub struct RemoteClient {
    http: reqwest::Client,
    base_url: String,
    auth_token: Option<String>,
}

impl RemoteClient {
    /// Build a client for the given server.
    ///
    /// The per-request timeout is distinct from any cycle deadline the
    /// orchestrator enforces on top.
    pub fn new(base_url: &str, auth_token: Option<String>) -> Result<Self, SyncError> {
        let base = url::Url::parse(base_url)
            .map_err(|e| SyncError::Transport(format!("invalid base url '{base_url}': {e}")))?;
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| SyncError::Transport(e.to_string()))?;
        Ok(Self {
            http,
            base_url: base.as_str().trim_end_matches('/').to_string(),
            auth_token,
        })
    }

    pub async fn upload_job(&self, upload: &WireUpload) -> Result<UploadAck, SyncError> {
        self.post_structured("api/jobs", upload).await
    }

    pub async fn upload_chemical(&self, upload: &WireUpload) -> Result<UploadAck, SyncError> {
        self.post_structured("api/chemicals", upload).await
    }

    pub async fn upload_chemical_treatment(
        &self,
        upload: &WireUpload,
    ) -> Result<UploadAck, SyncError> {
        self.post_structured("api/chemical-treatments", upload).await
    }

    pub async fn register_device(&self, upload: &WireUpload) -> Result<UploadAck, SyncError> {
        self.post_structured("api/devices/register", upload).await
    }

    /// Upload a photo: multipart body with a JSON metadata part and the
    /// image bytes as a binary attachment.
    pub async fn upload_photo(
        &self,
        upload: &WireUpload,
        image: Vec<u8>,
        file_name: &str,
    ) -> Result<UploadAck, SyncError> {
        let metadata = serde_json::to_string(upload)
            .map_err(|e| SyncError::Decode(format!("photo metadata encode: {e}")))?;
        let form = multipart::Form::new()
            .part(
                "metadata",
                multipart::Part::text(metadata)
                    .mime_str("application/json")
                    .map_err(|e| SyncError::Decode(e.to_string()))?,
            )
            .part(
                "image",
                multipart::Part::bytes(image).file_name(file_name.to_string()),
            );
        let response = self
            .authorized(self.http.post(self.url("api/photos")))
            .multipart(form)
            .send()
            .await?;
        Self::decode_ack(response).await
    }

    /// Fetch all server-side changes since the given checkpoint. `None`
    /// asks for everything.
    pub async fn fetch_updates_since(
        &self,
        since: Option<DateTime<Utc>>,
    ) -> Result<UpdateFeed, SyncError> {
        let mut request = self.authorized(self.http.get(self.url("api/updates")));
        if let Some(since) = since {
            request = request.query(&[("since", since.to_rfc3339())]);
        }
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SyncError::Server(status.as_u16()));
        }
        let feed = response.json::<UpdateFeed>().await?;
        Ok(feed)
    }

    async fn post_structured(
        &self,
        path: &str,
        upload: &WireUpload,
    ) -> Result<UploadAck, SyncError> {
        let response = self
            .authorized(self.http.post(self.url(path)))
            .json(upload)
            .send()
            .await?;
        Self::decode_ack(response).await
    }

    /// Map an upload response to the error taxonomy.
    ///
    /// HTTP 409 with a server id in the body is the server's idempotency
    /// guard saying the record already exists (e.g. a crash between server
    /// success and local persistence led to a re-upload); that counts as
    /// success.
    async fn decode_ack(response: Response) -> Result<UploadAck, SyncError> {
        let status = response.status();
        if status.is_success() || status == StatusCode::CONFLICT {
            let ack = response.json::<UploadAck>().await?;
            if ack.success || (status == StatusCode::CONFLICT && ack.server_id.is_some()) {
                return Ok(ack);
            }
            if let Some(message) = &ack.message {
                tracing::warn!(%status, message, "server rejected upload");
            }
            return Err(SyncError::Server(status.as_u16()));
        }
        Err(SyncError::Server(status.as_u16()))
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.auth_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}
