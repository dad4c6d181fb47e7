//! Avatar upload
//!
//! Multipart uploads bypass the JSON transport and go straight through the
//! shared reqwest client. They carry the stored credential and the
//! pass-through headers but never trigger a refresh: a 401 here is reported
//! as a network error like any other non-200 status.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use reqwest::multipart::{Form, Part};
use session_auth::CredentialStore;
use tracing::{debug, info, instrument, warn};
use transport::{HeaderMap, HeaderValue, ReqwestTransport, apply_pass_through};

use crate::config::ClientConfig;
use crate::envelope::Envelope;
use crate::error::{ApiError, Result};

/// Avatar upload endpoint, relative to the base URL.
pub const AVATAR_UPLOAD_PATH: &str = "/file/upload/avatar";

/// Multipart part name the server reads the file from.
const FILE_FIELD: &str = "file";

pub struct Uploader {
    config: Arc<ClientConfig>,
    client: reqwest::Client,
    timeout: Duration,
    credentials: CredentialStore,
}

impl Uploader {
    /// Share the client and timeout of the production transport.
    pub fn new(
        config: Arc<ClientConfig>,
        transport: &ReqwestTransport,
        credentials: CredentialStore,
    ) -> Self {
        Self {
            config,
            client: transport.client().clone(),
            timeout: transport.timeout(),
            credentials,
        }
    }

    /// Upload an image file and return the URL the server stored it at.
    #[instrument(skip_all, fields(path = %path.display()))]
    pub async fn upload_avatar(&self, path: &Path) -> Result<String> {
        if path.as_os_str().is_empty() {
            return Err(ApiError::InvalidInput("no file selected".into()));
        }
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| ApiError::InvalidInput(format!("reading {}: {e}", path.display())))?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "avatar".to_string());
        debug!(bytes = bytes.len(), file_name = %file_name, "uploading avatar");

        let form = Form::new().part(FILE_FIELD, Part::bytes(bytes).file_name(file_name));

        let response = self
            .client
            .post(self.config.url(AVATAR_UPLOAD_PATH))
            .headers(self.headers())
            .timeout(self.timeout)
            .multipart(form)
            .send()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        let status = response.status().as_u16();
        if status != 200 {
            warn!(status, "avatar upload rejected");
            return Err(ApiError::Network(status));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ApiError::Application(format!("malformed upload response: {e}")))?;
        let envelope = Envelope::from_value(body)
            .map_err(|e| ApiError::Application(format!("malformed upload response: {e}")))?;
        if !envelope.is_success() {
            let message = match envelope.message() {
                "" => "upload failed".to_string(),
                msg => msg.to_string(),
            };
            return Err(ApiError::Application(message));
        }

        let url = envelope
            .data
            .get("url")
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| ApiError::Application("upload response missing data.url".into()))?;
        info!(url, "avatar uploaded");
        Ok(url.to_string())
    }

    /// Pass-through headers plus the credential. Content-Type is left to the
    /// multipart encoder.
    fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        apply_pass_through(&mut headers, &self.config.pass_through_headers);
        if let Some(credential) = self.credentials.credential() {
            match HeaderValue::from_str(&credential.authorization_value()) {
                Ok(mut value) => {
                    value.set_sensitive(true);
                    headers.insert(reqwest::header::AUTHORIZATION, value);
                }
                Err(_) => warn!("stored token is not a valid header value, uploading without it"),
            }
        }
        headers
    }
}
