//! Production transport backed by `reqwest`.

use crate::{Result, Transport, TransportError, TransportRequest, TransportResponse};
use reqwest::Method;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use tracing::{debug, instrument};

/// Transport sending requests through a shared `reqwest::Client`.
///
/// The per-request timeout is the only timeout in the request path; the
/// dispatcher and coordinator wait for whatever this returns.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    timeout: Duration,
}

impl ReqwestTransport {
    pub fn new(client: reqwest::Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    /// Underlying client, shared with callers that need multipart uploads.
    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    #[instrument(skip_all, fields(method = %request.method, url = %request.url))]
    async fn execute(&self, request: TransportRequest) -> Result<TransportResponse> {
        let TransportRequest {
            url,
            method,
            data,
            headers,
        } = request;

        let builder = self
            .client
            .request(method.clone(), &url)
            .headers(headers)
            .timeout(self.timeout);

        // GET payloads travel in the query string, everything else as JSON
        let builder = if method == Method::GET {
            builder.query(&query_pairs(&data))
        } else {
            builder.json(&data)
        };

        let response = builder.send().await.map_err(classify_send_error)?;
        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| TransportError::Request(format!("reading response body: {e}")))?;

        debug!(status, bytes = text.len(), "received response");
        Ok(TransportResponse {
            status,
            data: decode_body(text),
        })
    }
}

impl Transport for ReqwestTransport {
    fn send(
        &self,
        request: TransportRequest,
    ) -> Pin<Box<dyn Future<Output = Result<TransportResponse>> + Send + '_>> {
        Box::pin(self.execute(request))
    }
}

fn classify_send_error(e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout(e.to_string())
    } else if e.is_builder() {
        TransportError::InvalidRequest(e.to_string())
    } else {
        TransportError::Request(e.to_string())
    }
}

/// Flatten a JSON object into query parameters. Nulls are dropped, strings are
/// sent verbatim, other values use their JSON text.
fn query_pairs(data: &serde_json::Value) -> Vec<(String, String)> {
    let Some(object) = data.as_object() else {
        return Vec::new();
    };
    object
        .iter()
        .filter(|(_, v)| !v.is_null())
        .map(|(k, v)| {
            let value = match v {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (k.clone(), value)
        })
        .collect()
}

fn decode_body(text: String) -> serde_json::Value {
    if text.is_empty() {
        return serde_json::Value::Null;
    }
    serde_json::from_str(&text).unwrap_or(serde_json::Value::String(text))
}
