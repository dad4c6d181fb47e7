//! Fixed pass-through header injection
//!
//! Deployments sometimes sit behind a tunnel that serves an interstitial page
//! unless every request carries a marker header. Those headers come from
//! config and are applied uniformly to every outbound call. They may never
//! replace the computed `Authorization` or `Content-Type` headers.

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use serde::Deserialize;
use std::str::FromStr;
use tracing::warn;

/// Header injection rule (name + value pair from config).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HeaderInjection {
    pub name: String,
    pub value: String,
}

impl HeaderInjection {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Apply configured pass-through headers, replacing existing values.
///
/// Invalid names or values are skipped with a warning rather than failing the
/// call. `Authorization` and `Content-Type` are protected.
pub fn apply_pass_through(headers: &mut HeaderMap, injections: &[HeaderInjection]) {
    for injection in injections {
        let name = match HeaderName::from_str(&injection.name) {
            Ok(n) => n,
            Err(e) => {
                warn!(header = %injection.name, error = %e, "skipping invalid header name");
                continue;
            }
        };
        if name == AUTHORIZATION || name == CONTENT_TYPE {
            warn!(header = %injection.name, "refusing to overwrite computed header");
            continue;
        }
        let value = match HeaderValue::from_str(&injection.value) {
            Ok(v) => v,
            Err(e) => {
                warn!(header = %injection.name, error = %e, "skipping invalid header value");
                continue;
            }
        };
        headers.insert(name, value);
    }
}
