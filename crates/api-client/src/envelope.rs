//! Application response envelope
//!
//! Every API response body is wrapped as `{ "code": int, "data": any, "msg": string }`.
//! `code == 200` is the only success value; anything else is an application
//! error carrying `msg`.

use serde::{Deserialize, Serialize};

/// Envelope code meaning success.
pub const SUCCESS_CODE: i64 = 200;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub code: i64,
    #[serde(default)]
    pub data: serde_json::Value,
    #[serde(default)]
    pub msg: Option<String>,
}

impl Envelope {
    pub fn from_value(value: serde_json::Value) -> serde_json::Result<Self> {
        serde_json::from_value(value)
    }

    pub fn is_success(&self) -> bool {
        self.code == SUCCESS_CODE
    }

    /// Server message, or an empty string when absent.
    pub fn message(&self) -> &str {
        self.msg.as_deref().unwrap_or("")
    }

    /// Message suitable for showing to the user when the call failed.
    pub fn failure_message(&self) -> String {
        match self.message() {
            "" => format!("request failed with code {}", self.code),
            msg => msg.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn success_envelope_exposes_data() {
        let envelope = Envelope::from_value(json!({"code": 200, "data": {"foo": 1}, "msg": ""}))
            .unwrap();
        assert!(envelope.is_success());
        assert_eq!(envelope.data, json!({"foo": 1}));
    }

    #[test]
    fn missing_data_and_msg_default() {
        let envelope = Envelope::from_value(json!({"code": 401})).unwrap();
        assert!(!envelope.is_success());
        assert_eq!(envelope.data, serde_json::Value::Null);
        assert_eq!(envelope.message(), "");
        assert_eq!(envelope.failure_message(), "request failed with code 401");
    }

    #[test]
    fn null_msg_is_accepted() {
        let envelope =
            Envelope::from_value(json!({"code": 3001, "data": null, "msg": null})).unwrap();
        assert_eq!(envelope.message(), "");
    }

    #[test]
    fn failure_message_prefers_server_text() {
        let envelope =
            Envelope::from_value(json!({"code": 2005, "msg": "处于解绑冷却期中"})).unwrap();
        assert_eq!(envelope.failure_message(), "处于解绑冷却期中");
    }

    #[test]
    fn body_without_code_is_rejected() {
        assert!(Envelope::from_value(json!({"data": {}})).is_err());
        assert!(Envelope::from_value(json!("<html>tunnel warning</html>")).is_err());
    }
}
