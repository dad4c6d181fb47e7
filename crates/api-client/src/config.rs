//! Client configuration shared by the dispatcher, coordinator and uploader

use transport::{HeaderInjection, HeaderMap, HeaderValue, apply_pass_through};

/// Where calls go and which fixed headers ride along.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base address every call path is appended to
    pub base_url: String,
    /// Deployment-specific headers attached to every call
    pub pass_through_headers: Vec<HeaderInjection>,
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            pass_through_headers: Vec::new(),
        }
    }

    pub fn with_pass_through_headers(mut self, headers: Vec<HeaderInjection>) -> Self {
        self.pass_through_headers = headers;
        self
    }

    /// Absolute URL for an API path.
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    /// `Content-Type: application/json` plus the pass-through headers.
    pub fn fixed_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        self.apply_fixed_headers(&mut headers);
        headers
    }

    /// Merge the fixed headers into caller-supplied headers, replacing
    /// duplicates.
    pub fn apply_fixed_headers(&self, headers: &mut HeaderMap) {
        headers.insert(
            reqwest::header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        apply_pass_through(headers, &self.pass_through_headers);
    }
}
