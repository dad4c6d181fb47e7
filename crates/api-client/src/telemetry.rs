//! Metrics emitted by the request core
//!
//! - `api_dispatch_total` (counter): label `outcome`
//! - `api_refresh_attempts_total` (counter): label `outcome`
//! - `api_refresh_waiters` (histogram): callers released per refresh attempt
//! - `api_session_teardowns_total` (counter)
//!
//! Without an installed recorder these calls are no-ops.

use crate::error::ApiError;

/// Record the final outcome of one `dispatch` call.
pub fn record_dispatch(result: &Result<serde_json::Value, ApiError>) {
    let outcome = match result {
        Ok(_) => "ok",
        Err(e) => e.kind(),
    };
    metrics::counter!("api_dispatch_total", "outcome" => outcome).increment(1);
}

/// Record a completed refresh attempt and how many queued callers it released.
pub fn record_refresh(success: bool, waiters: usize) {
    let outcome = if success { "success" } else { "failure" };
    metrics::counter!("api_refresh_attempts_total", "outcome" => outcome).increment(1);
    metrics::histogram!("api_refresh_waiters").record(waiters as f64);
}

pub fn record_teardown() {
    metrics::counter!("api_session_teardowns_total").increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;
    use metrics_exporter_prometheus::PrometheusBuilder;

    #[test]
    fn record_functions_do_not_panic_without_recorder() {
        record_dispatch(&Ok(serde_json::Value::Null));
        record_refresh(true, 3);
        record_teardown();
    }

    #[test]
    fn dispatch_outcomes_are_labelled() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();

        metrics::with_local_recorder(&recorder, || {
            record_dispatch(&Ok(serde_json::json!({"foo": 1})));
            record_dispatch(&Err(ApiError::Network(502)));
            record_dispatch(&Err(ApiError::Network(500)));
        });

        let output = handle.render();
        assert!(
            output.contains(r#"api_dispatch_total{outcome="ok"} 1"#),
            "got:\n{output}"
        );
        assert!(
            output.contains(r#"api_dispatch_total{outcome="network"} 2"#),
            "got:\n{output}"
        );
    }

    #[test]
    fn refresh_attempts_and_teardowns_are_counted() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();

        metrics::with_local_recorder(&recorder, || {
            record_refresh(false, 2);
            record_teardown();
        });

        let output = handle.render();
        assert!(
            output.contains(r#"api_refresh_attempts_total{outcome="failure"} 1"#),
            "got:\n{output}"
        );
        assert!(output.contains("api_session_teardowns_total 1"), "got:\n{output}");
        assert!(output.contains("api_refresh_waiters"), "got:\n{output}");
    }
}
