//! Response classification
//!
//! Maps a raw transport response onto the four outcomes the dispatcher
//! distinguishes. Only HTTP 401 leads to a refresh; only HTTP 200 is read as
//! an envelope; every other status is a network error regardless of body.

use transport::TransportResponse;

use crate::envelope::Envelope;

/// What a single response means to the dispatcher.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseClass {
    /// HTTP 401
    Unauthorized,
    /// HTTP 200 with envelope code 200, carrying `data`
    Success(serde_json::Value),
    /// HTTP 200 with any other envelope code, or a body that is not an envelope
    Application(String),
    /// Any other HTTP status
    Network(u16),
}

pub fn classify(response: TransportResponse) -> ResponseClass {
    match response.status {
        401 => ResponseClass::Unauthorized,
        200 => match Envelope::from_value(response.data) {
            Ok(envelope) if envelope.is_success() => ResponseClass::Success(envelope.data),
            Ok(envelope) => ResponseClass::Application(envelope.failure_message()),
            Err(e) => ResponseClass::Application(format!("malformed response envelope: {e}")),
        },
        status => ResponseClass::Network(status),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn response(status: u16, data: serde_json::Value) -> TransportResponse {
        TransportResponse { status, data }
    }

    #[test]
    fn http_401_is_unauthorized_whatever_the_body() {
        assert_eq!(
            classify(response(401, json!({"code": 200, "data": 1}))),
            ResponseClass::Unauthorized
        );
        assert_eq!(
            classify(response(401, serde_json::Value::Null)),
            ResponseClass::Unauthorized
        );
    }

    #[test]
    fn success_envelope_yields_data() {
        assert_eq!(
            classify(response(200, json!({"code": 200, "data": {"foo": 1}, "msg": ""}))),
            ResponseClass::Success(json!({"foo": 1}))
        );
    }

    #[test]
    fn envelope_error_code_yields_message() {
        assert_eq!(
            classify(response(200, json!({"code": 3002, "data": null, "msg": "今日已打卡"}))),
            ResponseClass::Application("今日已打卡".into())
        );
    }

    #[test]
    fn envelope_401_code_under_http_200_is_application_error() {
        // Only the HTTP status triggers a refresh
        assert_eq!(
            classify(response(200, json!({"code": 401, "msg": "未认证或Token已失效"}))),
            ResponseClass::Application("未认证或Token已失效".into())
        );
    }

    #[test]
    fn non_envelope_200_body_is_application_error() {
        let class = classify(response(200, json!("<html>interstitial</html>")));
        match class {
            ResponseClass::Application(msg) => {
                assert!(msg.starts_with("malformed response envelope"), "got: {msg}")
            }
            other => panic!("expected Application, got {other:?}"),
        }
    }

    #[test]
    fn other_statuses_are_network_errors() {
        for status in [201, 204, 302, 400, 403, 404, 429, 500, 502, 503] {
            assert_eq!(
                classify(response(status, json!({"code": 200}))),
                ResponseClass::Network(status),
                "status {status}"
            );
        }
    }
}
