//! Request dispatcher
//!
//! Builds one outbound call, attaches the stored credential and the fixed
//! headers, and interprets the response. The response side is an explicit
//! two-phase state machine: a call is sent once (`Initial`), and if that
//! attempt is answered with 401 and the coordinator supplies a fresh
//! credential, it is replayed exactly once (`Replayed`). A 401 on the replay
//! is final.

use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use session_auth::{Credential, CredentialStore, SessionTeardown};
use tracing::{Instrument, debug, info_span, warn};
use transport::{
    HeaderMap, HeaderName, HeaderValue, Method, Transport, TransportRequest, TransportResponse,
};

use crate::classify::{ResponseClass, classify};
use crate::config::ClientConfig;
use crate::error::{ApiError, RefreshError, Result};
use crate::refresh::RefreshCoordinator;
use crate::telemetry;

/// Notice shown when no response was received.
pub const REQUEST_FAILED_NOTICE: &str = "Request Failed";

/// Notice shown for any HTTP status other than 200 and 401.
pub const NETWORK_ERROR_NOTICE: &str = "Network Error";

/// Notice shown when a replayed call is still rejected with 401.
pub const UNAUTHORIZED_NOTICE: &str = "Unauthorized";

/// A call that has not completed yet.
#[derive(Debug, Clone)]
pub struct ApiCall {
    pub method: Method,
    /// Path relative to the configured base URL
    pub path: String,
    pub body: Value,
    /// Extra headers; fixed headers and the credential are merged on top
    pub headers: HeaderMap,
}

impl ApiCall {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: Value::Null,
            headers: HeaderMap::new(),
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn body(mut self, body: Value) -> Self {
        self.body = body;
        self
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }
}

/// Which attempt a response belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchPhase {
    /// First send with the stored credential
    Initial,
    /// The single replay after a successful refresh
    Replayed,
}

/// What the dispatcher does with a response.
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchStep {
    /// Complete with the envelope's data
    Resolve(Value),
    /// Obtain a fresh credential and replay
    Refresh,
    /// Complete with an error
    Fail(ApiError),
}

/// Decide the next step for a response received in `phase`.
///
/// Pure function: no I/O, no state. Only an `Initial` 401 leads to a refresh.
pub fn next_step(phase: DispatchPhase, response: TransportResponse) -> DispatchStep {
    match classify(response) {
        ResponseClass::Unauthorized => match phase {
            DispatchPhase::Initial => DispatchStep::Refresh,
            DispatchPhase::Replayed => DispatchStep::Fail(ApiError::Unauthorized),
        },
        ResponseClass::Success(data) => DispatchStep::Resolve(data),
        ResponseClass::Application(message) => DispatchStep::Fail(ApiError::Application(message)),
        ResponseClass::Network(status) => DispatchStep::Fail(ApiError::Network(status)),
    }
}

/// Sends API calls on behalf of callers.
///
/// Every dispatcher in a process shares the same `RefreshCoordinator`.
pub struct Dispatcher {
    config: Arc<ClientConfig>,
    transport: Arc<dyn Transport>,
    credentials: CredentialStore,
    coordinator: Arc<RefreshCoordinator>,
    teardown: Arc<SessionTeardown>,
}

impl Dispatcher {
    pub fn new(
        config: Arc<ClientConfig>,
        transport: Arc<dyn Transport>,
        credentials: CredentialStore,
        coordinator: Arc<RefreshCoordinator>,
        teardown: Arc<SessionTeardown>,
    ) -> Self {
        Self {
            config,
            transport,
            credentials,
            coordinator,
            teardown,
        }
    }

    pub fn coordinator(&self) -> &Arc<RefreshCoordinator> {
        &self.coordinator
    }

    pub fn credentials(&self) -> &CredentialStore {
        &self.credentials
    }

    /// Send a call and return the envelope's `data` on success.
    pub async fn dispatch(&self, call: ApiCall) -> Result<Value> {
        let request_id = format!("req_{}", uuid::Uuid::new_v4().simple());
        let span = info_span!(
            "dispatch",
            request_id = %request_id,
            method = %call.method,
            path = %call.path
        );
        let result = self.run(call).instrument(span).await;
        telemetry::record_dispatch(&result);
        result
    }

    /// GET with `query` serialized into the query string.
    pub async fn get<T, Q>(&self, path: &str, query: &Q) -> Result<T>
    where
        T: DeserializeOwned,
        Q: Serialize + ?Sized,
    {
        self.call_typed(ApiCall::get(path), query).await
    }

    pub async fn post<T, B>(&self, path: &str, body: &B) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.call_typed(ApiCall::post(path), body).await
    }

    pub async fn put<T, B>(&self, path: &str, body: &B) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.call_typed(ApiCall::put(path), body).await
    }

    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let data = self.dispatch(ApiCall::delete(path)).await?;
        decode(data)
    }

    async fn call_typed<T, B>(&self, call: ApiCall, body: &B) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let body = serde_json::to_value(body)
            .map_err(|e| ApiError::Serialization(format!("encoding request body: {e}")))?;
        let data = self.dispatch(call.body(body)).await?;
        decode(data)
    }

    async fn run(&self, call: ApiCall) -> Result<Value> {
        let ApiCall {
            method,
            path,
            body,
            mut headers,
        } = call;

        self.config.apply_fixed_headers(&mut headers);
        let sent_with = self.credentials.credential();
        if let Some(credential) = &sent_with {
            set_authorization(&mut headers, credential)?;
        }

        let mut request = TransportRequest {
            url: self.config.url(&path),
            method,
            data: if body.is_null() { json!({}) } else { body },
            headers,
        };
        let mut phase = DispatchPhase::Initial;

        loop {
            let response = match self.transport.send(request.clone()).await {
                Ok(response) => response,
                Err(e) => {
                    warn!(error = %e, "no response received");
                    self.teardown.notifier().show_notice(REQUEST_FAILED_NOTICE);
                    return Err(ApiError::Transport(e.to_string()));
                }
            };
            debug!(status = response.status, ?phase, "received response");

            match next_step(phase, response) {
                DispatchStep::Resolve(data) => return Ok(data),
                DispatchStep::Fail(error) => {
                    self.notify_failure(&error);
                    return Err(error);
                }
                DispatchStep::Refresh => {
                    let credential = match self.newer_credential(sent_with.as_ref()) {
                        Some(stored) => {
                            debug!("credential changed since send, skipping refresh");
                            stored
                        }
                        None => self.refreshed_credential().await?,
                    };
                    set_authorization(&mut request.headers, &credential)?;
                    phase = DispatchPhase::Replayed;
                    debug!("replaying with refreshed credential");
                }
            }
        }
    }

    /// Stored credential, if it differs from the one the call was sent with.
    ///
    /// A 401 can arrive after another caller already completed a refresh; the
    /// stored token is then newer and the call is replayed with it directly.
    fn newer_credential(&self, sent_with: Option<&Credential>) -> Option<Credential> {
        self.credentials
            .credential()
            .filter(|stored| Some(stored) != sent_with)
    }

    /// Wait on the coordinator after a 401.
    ///
    /// With no refresh token stored the session cannot recover, so teardown
    /// runs here. A failed refresh attempt has already torn the session down
    /// inside the coordinator.
    async fn refreshed_credential(&self) -> Result<Credential> {
        match self.coordinator.await_refreshed_credential().await {
            Ok(credential) => Ok(credential),
            Err(RefreshError::NoRefreshCredential) => {
                warn!("401 with no refresh token, tearing down session");
                self.teardown.run();
                telemetry::record_teardown();
                Err(ApiError::Unauthorized)
            }
            Err(RefreshError::RefreshFailed(reason)) => Err(ApiError::RefreshFailed(reason)),
        }
    }

    fn notify_failure(&self, error: &ApiError) {
        let notifier = self.teardown.notifier();
        match error {
            ApiError::Application(message) => notifier.show_notice(message),
            ApiError::Network(status) => {
                warn!(status, "unexpected HTTP status");
                notifier.show_notice(NETWORK_ERROR_NOTICE);
            }
            ApiError::Unauthorized => {
                warn!("unauthorized after refresh");
                notifier.show_notice(UNAUTHORIZED_NOTICE);
            }
            _ => {}
        }
    }
}

fn set_authorization(headers: &mut HeaderMap, credential: &Credential) -> Result<()> {
    let mut value = HeaderValue::from_str(&credential.authorization_value())
        .map_err(|_| ApiError::InvalidInput("stored token is not a valid header value".into()))?;
    value.set_sensitive(true);
    headers.insert(reqwest::header::AUTHORIZATION, value);
    Ok(())
}

fn decode<T: DeserializeOwned>(data: Value) -> Result<T> {
    serde_json::from_value(data)
        .map_err(|e| ApiError::Serialization(format!("decoding response data: {e}")))
}


#[cfg(test)]
mod http_tests {
    //! End-to-end against an in-process HTTP server through the real transport.

    use super::*;
    use crate::refresh::REFRESH_PATH;
    use crate::testing::RecordingNotifier;
    use axum::Json;
    use axum::http::{HeaderMap as AxumHeaders, StatusCode};
    use axum::response::IntoResponse;
    use session_auth::{FileStorage, REFRESH_TOKEN_KEY, Storage, TOKEN_KEY};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::net::TcpListener;
    use transport::{HeaderInjection, ReqwestTransport};

    #[derive(Default)]
    struct ServerState {
        refresh_calls: AtomicUsize,
    }

    /// API where `T1` is expired and `/auth/refresh` with `R1` issues `T2`.
    async fn start_api() -> (String, Arc<ServerState>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let state = Arc::new(ServerState::default());

        let refresh_state = state.clone();
        let app = axum::Router::new()
            .route(
                REFRESH_PATH,
                axum::routing::post(move |Json(body): Json<Value>| {
                    let state = refresh_state.clone();
                    async move {
                        state.refresh_calls.fetch_add(1, Ordering::SeqCst);
                        // Hold the refresh open until every caller has seen its 401
                        tokio::time::sleep(Duration::from_millis(200)).await;
                        let reply = if body["refreshToken"] == "R1" {
                            json!({"code": 200, "data": {"token": "T2"}, "msg": ""})
                        } else {
                            json!({"code": 401, "data": null, "msg": "invalid refresh token"})
                        };
                        Json(reply)
                    }
                }),
            )
            .route(
                "/task/list",
                axum::routing::get(|headers: AxumHeaders| async move {
                    if headers.get("ngrok-skip-browser-warning").is_none() {
                        return (StatusCode::BAD_GATEWAY, "tunnel interstitial").into_response();
                    }
                    match headers.get("authorization").and_then(|v| v.to_str().ok()) {
                        Some("Bearer T2") => Json(json!({
                            "code": 200,
                            "data": [{"id": 1, "name": "walk"}],
                            "msg": ""
                        }))
                        .into_response(),
                        _ => StatusCode::UNAUTHORIZED.into_response(),
                    }
                }),
            );
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        (url, state)
    }

    #[tokio::test]
    async fn expired_token_is_refreshed_over_http_and_persisted() {
        let (url, server) = start_api().await;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        let storage = FileStorage::load(path.clone()).unwrap();
        storage.set(TOKEN_KEY, "T1").unwrap();
        storage.set(REFRESH_TOKEN_KEY, "R1").unwrap();

        let config = Arc::new(ClientConfig::new(url).with_pass_through_headers(vec![
            HeaderInjection::new("ngrok-skip-browser-warning", "true"),
        ]));
        let transport: Arc<dyn Transport> = Arc::new(ReqwestTransport::new(
            reqwest::Client::new(),
            Duration::from_secs(5),
        ));
        let credentials = CredentialStore::new(Arc::new(storage));
        let teardown = Arc::new(SessionTeardown::new(
            credentials.clone(),
            Arc::new(RecordingNotifier::default()),
        ));
        let coordinator = Arc::new(RefreshCoordinator::new(
            config.clone(),
            transport.clone(),
            credentials.clone(),
            teardown.clone(),
        ));
        let dispatcher = Arc::new(Dispatcher::new(
            config,
            transport,
            credentials,
            coordinator,
            teardown,
        ));

        let mut tasks = tokio::task::JoinSet::new();
        for _ in 0..3 {
            let d = dispatcher.clone();
            tasks.spawn(async move { d.dispatch(ApiCall::get("/task/list")).await });
        }
        while let Some(result) = tasks.join_next().await {
            assert_eq!(result.unwrap().unwrap()[0]["name"], "walk");
        }

        assert_eq!(server.refresh_calls.load(Ordering::SeqCst), 1);

        let reloaded = FileStorage::load(path).unwrap();
        assert_eq!(reloaded.get(TOKEN_KEY).as_deref(), Some("T2"));
        assert_eq!(reloaded.get(REFRESH_TOKEN_KEY).as_deref(), Some("R1"));
    }
}
