//! Single-flight credential refresh
//!
//! At most one call to the refresh endpoint is outstanding at any time. The
//! first caller to hit a 401 leads the attempt; every caller that arrives
//! while it is in flight parks on a oneshot channel and receives the leader's
//! outcome. The queue is drained exactly once per attempt, on success and on
//! failure alike, and the in-flight flag is cleared in the same critical
//! section, so a later 401 always starts a fresh attempt.
//!
//! The state mutex is never held across an `.await`.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use common::Secret;
use serde_json::json;
use session_auth::{Credential, CredentialStore, SessionTeardown};
use tokio::sync::oneshot;
use tracing::{debug, info, instrument, warn};
use transport::{Method, Transport, TransportRequest};

use crate::config::ClientConfig;
use crate::envelope::Envelope;
use crate::error::RefreshError;
use crate::telemetry;

/// Token refresh endpoint, relative to the base URL.
pub const REFRESH_PATH: &str = "/auth/refresh";

type RefreshOutcome = Result<Credential, RefreshError>;

/// Mutable coordinator state.
///
/// `waiters` is non-empty only while `in_flight` is true.
#[derive(Default)]
struct RefreshState {
    in_flight: bool,
    waiters: Vec<oneshot::Sender<RefreshOutcome>>,
}

enum Role {
    Leader,
    Waiter(oneshot::Receiver<RefreshOutcome>),
}

/// Tokens returned by a successful refresh.
struct Refreshed {
    credential: Credential,
    /// Present only when the server rotates the refresh token
    refresh_token: Option<String>,
}

/// Serializes credential renewal across every concurrent dispatcher call.
///
/// Instantiate once per process and share it (via `Arc`) with every
/// `Dispatcher`.
pub struct RefreshCoordinator {
    state: Mutex<RefreshState>,
    transport: Arc<dyn Transport>,
    credentials: CredentialStore,
    teardown: Arc<SessionTeardown>,
    config: Arc<ClientConfig>,
}

impl RefreshCoordinator {
    pub fn new(
        config: Arc<ClientConfig>,
        transport: Arc<dyn Transport>,
        credentials: CredentialStore,
        teardown: Arc<SessionTeardown>,
    ) -> Self {
        Self {
            state: Mutex::new(RefreshState::default()),
            transport,
            credentials,
            teardown,
            config,
        }
    }

    /// Wait for a renewed credential.
    ///
    /// Fails with `NoRefreshCredential` without touching the network when no
    /// refresh token is stored. Otherwise joins the in-flight attempt or
    /// starts one. Every caller that joined the same attempt receives the same
    /// credential or the same `RefreshFailed`.
    pub async fn await_refreshed_credential(&self) -> Result<Credential, RefreshError> {
        let Some(refresh_token) = self.credentials.refresh_token() else {
            debug!("no refresh token stored");
            return Err(RefreshError::NoRefreshCredential);
        };

        let role = {
            let mut state = self.lock();
            if state.in_flight {
                let (tx, rx) = oneshot::channel();
                state.waiters.push(tx);
                debug!(waiters = state.waiters.len(), "refresh in flight, queued");
                Role::Waiter(rx)
            } else {
                state.in_flight = true;
                Role::Leader
            }
        };

        match role {
            Role::Leader => self.lead(refresh_token).await,
            // A dropped sender means the leader was abandoned mid-attempt
            Role::Waiter(rx) => rx.await.unwrap_or_else(|_| {
                Err(RefreshError::RefreshFailed(
                    "refresh attempt abandoned".into(),
                ))
            }),
        }
    }

    /// Whether a refresh call is currently outstanding.
    pub fn is_in_flight(&self) -> bool {
        self.lock().in_flight
    }

    /// Number of callers parked behind the in-flight attempt.
    pub fn waiting(&self) -> usize {
        self.lock().waiters.len()
    }

    #[instrument(skip_all)]
    async fn lead(&self, refresh_token: Secret<String>) -> RefreshOutcome {
        let mut guard = InFlightGuard {
            coordinator: self,
            armed: true,
        };
        let result = self.request_refresh(&refresh_token).await;
        guard.armed = false;

        match result {
            Ok(refreshed) => {
                if let Err(e) = self.credentials.set_credential(&refreshed.credential) {
                    warn!(error = %e, "failed to persist refreshed token");
                }
                if let Some(rotated) = &refreshed.refresh_token
                    && let Err(e) = self.credentials.set_refresh_token(rotated)
                {
                    warn!(error = %e, "failed to persist rotated refresh token");
                }

                let waiters = self.finish();
                info!(waiters = waiters.len(), "token refresh succeeded");
                telemetry::record_refresh(true, waiters.len());
                for waiter in waiters {
                    let _ = waiter.send(Ok(refreshed.credential.clone()));
                }
                Ok(refreshed.credential)
            }
            Err(reason) => {
                warn!(error = %reason, "token refresh failed, tearing down session");

                // Clear storage while still in flight: a 401 arriving meanwhile
                // queues onto this attempt instead of re-sending the rejected token
                self.teardown.run();
                telemetry::record_teardown();

                let waiters = self.finish();
                telemetry::record_refresh(false, waiters.len());

                let error = RefreshError::RefreshFailed(reason);
                for waiter in waiters {
                    let _ = waiter.send(Err(error.clone()));
                }
                Err(error)
            }
        }
    }

    /// Issue the single refresh call and validate its envelope.
    async fn request_refresh(&self, refresh_token: &Secret<String>) -> Result<Refreshed, String> {
        let request = TransportRequest {
            url: self.config.url(REFRESH_PATH),
            method: Method::POST,
            data: json!({ "refreshToken": refresh_token.expose() }),
            headers: self.config.fixed_headers(),
        };

        let response = self
            .transport
            .send(request)
            .await
            .map_err(|e| format!("refresh request failed: {e}"))?;

        if response.status != 200 {
            return Err(format!("refresh endpoint returned HTTP {}", response.status));
        }

        let envelope = Envelope::from_value(response.data)
            .map_err(|e| format!("malformed refresh response: {e}"))?;
        if !envelope.is_success() {
            return Err(format!(
                "refresh rejected ({}): {}",
                envelope.code,
                envelope.message()
            ));
        }

        let token = envelope
            .data
            .get("token")
            .and_then(serde_json::Value::as_str)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| "refresh response missing data.token".to_string())?;
        let rotated = envelope
            .data
            .get("refreshToken")
            .and_then(serde_json::Value::as_str)
            .filter(|t| !t.is_empty())
            .map(str::to_owned);

        Ok(Refreshed {
            credential: Credential::new(token),
            refresh_token: rotated,
        })
    }

    /// End the current attempt: clear the flag and hand back every waiter.
    fn finish(&self) -> Vec<oneshot::Sender<RefreshOutcome>> {
        let mut state = self.lock();
        state.in_flight = false;
        std::mem::take(&mut state.waiters)
    }

    fn lock(&self) -> MutexGuard<'_, RefreshState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Resets the state if the leader's future is dropped before the refresh call
/// returns. Dropping the queued senders wakes every waiter with an error.
struct InFlightGuard<'a> {
    coordinator: &'a RefreshCoordinator,
    armed: bool,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            let waiters = self.coordinator.finish();
            warn!(waiters = waiters.len(), "refresh leader dropped, releasing waiters");
        }
    }
}
