//! Test doubles shared by the coordinator and dispatcher tests

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::{Value, json};
use session_auth::{Notifier, SESSION_EXPIRED_NOTICE};
use tokio::sync::Semaphore;
use transport::{Transport, TransportRequest, TransportResponse};

use crate::refresh::{REFRESH_PATH, RefreshCoordinator};

type Responder = dyn Fn(&TransportRequest) -> transport::Result<TransportResponse> + Send + Sync;

/// Transport that records every request and answers through a closure.
///
/// When gated, calls to the refresh endpoint block until a permit is added to
/// the gate, which lets tests pile callers up behind an in-flight refresh.
pub struct MockTransport {
    requests: Mutex<Vec<TransportRequest>>,
    responder: Box<Responder>,
    gate: Option<Arc<Semaphore>>,
}

impl MockTransport {
    pub fn new(
        responder: impl Fn(&TransportRequest) -> transport::Result<TransportResponse>
        + Send
        + Sync
        + 'static,
    ) -> Self {
        Self {
            requests: Mutex::new(Vec::new()),
            responder: Box::new(responder),
            gate: None,
        }
    }

    pub fn gated(mut self) -> Self {
        self.gate = Some(Arc::new(Semaphore::new(0)));
        self
    }

    pub fn gate(&self) -> Arc<Semaphore> {
        self.gate.clone().expect("transport is not gated")
    }

    pub fn requests(&self) -> Vec<TransportRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// Requests whose URL ends with `path`.
    pub fn requests_to(&self, path: &str) -> Vec<TransportRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.url.ends_with(path))
            .collect()
    }
}

impl Transport for MockTransport {
    fn send(
        &self,
        request: TransportRequest,
    ) -> std::pin::Pin<
        Box<dyn std::future::Future<Output = transport::Result<TransportResponse>> + Send + '_>,
    > {
        Box::pin(async move {
            self.requests.lock().unwrap().push(request.clone());
            if let Some(gate) = &self.gate
                && request.url.ends_with(REFRESH_PATH)
            {
                gate.acquire().await.unwrap().forget();
            }
            (self.responder)(&request)
        })
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    notices: Mutex<Vec<String>>,
    routes: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub fn notices(&self) -> Vec<String> {
        self.notices.lock().unwrap().clone()
    }

    pub fn routes(&self) -> Vec<String> {
        self.routes.lock().unwrap().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn show_notice(&self, message: &str) {
        self.notices.lock().unwrap().push(message.to_string());
    }

    fn navigate(&self, route: &str) {
        self.routes.lock().unwrap().push(route.to_string());
    }
}

/// How many times the session-expired notice was shown, i.e. teardown count.
pub fn expiry_notices(notifier: &RecordingNotifier) -> usize {
    notifier
        .notices()
        .iter()
        .filter(|n| n.as_str() == SESSION_EXPIRED_NOTICE)
        .count()
}

/// HTTP 200 carrying an application envelope.
pub fn envelope(code: i64, data: Value) -> TransportResponse {
    TransportResponse {
        status: 200,
        data: json!({"code": code, "data": data, "msg": ""}),
    }
}

/// HTTP 200 carrying a failed envelope with a server message.
pub fn envelope_error(code: i64, msg: &str) -> TransportResponse {
    TransportResponse {
        status: 200,
        data: json!({"code": code, "data": null, "msg": msg}),
    }
}

pub fn status(status: u16) -> TransportResponse {
    TransportResponse {
        status,
        data: Value::Null,
    }
}

/// Bearer token on a recorded request, without the `Bearer ` prefix.
pub fn bearer(request: &TransportRequest) -> Option<String> {
    request
        .headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::to_owned)
}

pub async fn wait_for_waiters(coordinator: &RefreshCoordinator, n: usize) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while coordinator.waiting() < n {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await
    .expect("waiters never queued");
}

pub async fn wait_for_in_flight(coordinator: &RefreshCoordinator) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !coordinator.is_in_flight() {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await
    .expect("refresh never started");
}
