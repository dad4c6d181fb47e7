//! Wiring of the request core and the command implementations
//!
//! One `App` per process: a single transport, a single credential store and a
//! single refresh coordinator shared by every call the command makes.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use api_client::{ApiCall, ClientConfig, Dispatcher, RefreshCoordinator, Uploader};
use serde::Serialize;
use serde_json::Value;
use session_auth::{CredentialStore, FileStorage, LoginResult, Notifier, SessionTeardown};
use tracing::info;
use transport::{HeaderName, HeaderValue, Method, ReqwestTransport, Transport};

use crate::config::Config;

/// Login endpoint, relative to the base URL.
pub const LOGIN_PATH: &str = "/auth/login";

/// Body of `POST /auth/login`.
#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    /// One-time code from the platform login flow
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

/// Output of `status`.
#[derive(Debug, Serialize, PartialEq)]
pub struct SessionStatus {
    pub logged_in: bool,
    pub has_refresh_token: bool,
    pub user: Option<Value>,
}

pub struct App {
    dispatcher: Dispatcher,
    uploader: Uploader,
    credentials: CredentialStore,
}

impl App {
    pub fn build(config: &Config, notifier: Arc<dyn Notifier>) -> Result<Self> {
        let storage = FileStorage::load(config.storage.path.clone()).with_context(|| {
            format!(
                "failed to open session storage {}",
                config.storage.path.display()
            )
        })?;
        let credentials = CredentialStore::new(Arc::new(storage));

        let client_config = Arc::new(
            ClientConfig::new(config.api.base_url.clone())
                .with_pass_through_headers(config.headers.clone()),
        );
        let client = reqwest::Client::builder()
            .build()
            .context("failed to build HTTP client")?;
        let reqwest_transport = ReqwestTransport::new(client, config.api.timeout());
        let uploader = Uploader::new(
            client_config.clone(),
            &reqwest_transport,
            credentials.clone(),
        );
        let transport: Arc<dyn Transport> = Arc::new(reqwest_transport);

        let teardown = Arc::new(
            SessionTeardown::new(credentials.clone(), notifier)
                .with_login_route(config.session.login_route.clone())
                .with_navigate_delay(config.session.navigate_delay()),
        );
        let coordinator = Arc::new(RefreshCoordinator::new(
            client_config.clone(),
            transport.clone(),
            credentials.clone(),
            teardown.clone(),
        ));
        let dispatcher = Dispatcher::new(
            client_config,
            transport,
            credentials.clone(),
            coordinator,
            teardown,
        );

        Ok(Self {
            dispatcher,
            uploader,
            credentials,
        })
    }

    /// Send an arbitrary API call and return the envelope data.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        data: Option<Value>,
        headers: Vec<(HeaderName, HeaderValue)>,
    ) -> Result<Value> {
        let mut call = ApiCall::new(method, path).body(data.unwrap_or(Value::Null));
        for (name, value) in headers {
            call = call.header(name, value);
        }
        Ok(self.dispatcher.dispatch(call).await?)
    }

    /// Exchange a login code for a session and persist it.
    pub async fn login(&self, request: &LoginRequest) -> Result<Value> {
        let login: LoginResult = self.dispatcher.post(LOGIN_PATH, request).await?;
        self.credentials
            .store_login(&login)
            .context("failed to store login session")?;
        info!("logged in");
        Ok(login.user)
    }

    pub async fn upload_avatar(&self, path: &Path) -> Result<String> {
        Ok(self.uploader.upload_avatar(path).await?)
    }

    pub fn logout(&self) -> Result<()> {
        self.credentials
            .clear()
            .context("failed to clear session")?;
        info!("logged out");
        Ok(())
    }

    pub fn status(&self) -> SessionStatus {
        SessionStatus {
            logged_in: self.credentials.credential().is_some(),
            has_refresh_token: self.credentials.refresh_token().is_some(),
            user: self.credentials.user(),
        }
    }
}
