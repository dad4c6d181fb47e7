//! Typed credential access on top of `Storage`
//!
//! The stored values are opaque strings. An empty string counts as absent,
//! which is how a cleared mobile storage slot reads back.

use std::fmt;
use std::sync::Arc;

use common::Secret;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::constants::{REFRESH_TOKEN_KEY, SESSION_KEYS, TOKEN_KEY, USER_KEY};
use crate::error::{Error, Result};
use crate::storage::Storage;

/// Short-lived bearer token authorizing API calls.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(Secret<String>);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(Secret::new(token.into()))
    }

    pub fn expose(&self) -> &str {
        self.0.expose()
    }

    /// Value for the `Authorization` header.
    pub fn authorization_value(&self) -> String {
        format!("Bearer {}", self.0.expose())
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Credential({})", self.0)
    }
}

/// Body of a successful `/auth/login` envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginResult {
    /// User profile, stored verbatim as JSON text
    #[serde(default)]
    pub user: serde_json::Value,
    pub token: String,
    #[serde(rename = "refreshToken")]
    pub refresh_token: String,
}

/// Credential view over a shared `Storage`.
///
/// Cheap to clone; all clones share the same storage.
#[derive(Clone)]
pub struct CredentialStore {
    storage: Arc<dyn Storage>,
}

impl CredentialStore {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// Current bearer credential, if any.
    pub fn credential(&self) -> Option<Credential> {
        non_empty(self.storage.get(TOKEN_KEY)).map(Credential::new)
    }

    /// Stored refresh token, if any.
    pub fn refresh_token(&self) -> Option<Secret<String>> {
        non_empty(self.storage.get(REFRESH_TOKEN_KEY)).map(Secret::new)
    }

    /// Stored user profile, if it parses as JSON.
    pub fn user(&self) -> Option<serde_json::Value> {
        let raw = non_empty(self.storage.get(USER_KEY))?;
        match serde_json::from_str(&raw) {
            Ok(v) => Some(v),
            Err(e) => {
                warn!(error = %e, "stored user profile is not valid JSON");
                None
            }
        }
    }

    pub fn set_credential(&self, credential: &Credential) -> Result<()> {
        self.storage.set(TOKEN_KEY, credential.expose())
    }

    pub fn set_refresh_token(&self, refresh_token: &str) -> Result<()> {
        self.storage.set(REFRESH_TOKEN_KEY, refresh_token)
    }

    /// Persist a fresh login: bearer token, refresh token and user profile.
    pub fn store_login(&self, login: &LoginResult) -> Result<()> {
        let user = serde_json::to_string(&login.user)
            .map_err(|e| Error::Serialize(format!("serializing user profile: {e}")))?;
        self.storage.set(TOKEN_KEY, &login.token)?;
        self.storage.set(REFRESH_TOKEN_KEY, &login.refresh_token)?;
        self.storage.set(USER_KEY, &user)?;
        debug!("stored login session");
        Ok(())
    }

    /// Remove every session key.
    ///
    /// Attempts all removals even if one fails, and reports the first failure.
    pub fn clear(&self) -> Result<()> {
        let mut first_error = None;
        for key in SESSION_KEYS {
            if let Err(e) = self.storage.remove(key) {
                warn!(key, error = %e, "failed to remove session key");
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}
