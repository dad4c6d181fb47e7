//! Transport abstraction for outbound API calls
//!
//! Defines the `Transport` trait that decouples the request dispatcher and the
//! refresh coordinator from the networking primitive. `ReqwestTransport` is the
//! production implementation; tests substitute a recording mock so they can
//! count calls to individual endpoints.
//!
//! A transport only moves bytes: it reports the HTTP status and the decoded
//! body and never interprets the application envelope. Timeouts belong here,
//! not in the callers.

pub mod headers;
pub mod reqwest_transport;

pub use headers::{HeaderInjection, apply_pass_through};
pub use reqwest_transport::ReqwestTransport;

pub use reqwest::Method;
pub use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

use std::future::Future;
use std::pin::Pin;

/// One outbound call: absolute URL, method, JSON payload, and final headers.
#[derive(Debug, Clone)]
pub struct TransportRequest {
    pub url: String,
    pub method: Method,
    /// Payload. Sent as the query string for GET, as a JSON body otherwise.
    pub data: serde_json::Value,
    pub headers: HeaderMap,
}

/// Raw response as seen by the transport.
///
/// `data` is the decoded JSON body. Bodies that are not JSON are carried as a
/// JSON string of the raw text; empty bodies become `Value::Null`.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportResponse {
    pub status: u16,
    pub data: serde_json::Value,
}

/// Failure to obtain any response at all.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    #[error("request failed: {0}")]
    Request(String),

    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

/// Result alias for transport operations.
pub type Result<T> = std::result::Result<T, TransportError>;

/// Networked request primitive shared by the dispatcher and the coordinator.
///
/// Uses `Pin<Box<dyn Future>>` return types for dyn-compatibility (`Arc<dyn Transport>`).
pub trait Transport: Send + Sync {
    /// Send one request and wait for its response.
    ///
    /// Returns `Err` only when no response was received. Every HTTP status,
    /// including 4xx/5xx, is a successful transport outcome.
    fn send(
        &self,
        request: TransportRequest,
    ) -> Pin<Box<dyn Future<Output = Result<TransportResponse>> + Send + '_>>;
}
