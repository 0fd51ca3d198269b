use serde::Deserialize;
use serde_json::value::RawValue;

use super::scalar::TransportScalar;

/// Business failure reported by the gateway as `{"error": ..., "code": ...}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorBody {
    pub code: Option<String>,
    pub message: String,
}

#[derive(Debug, Deserialize)]
struct ErrorJson {
    #[serde(default)]
    error: Option<Box<RawValue>>,
    #[serde(default)]
    code: Option<TransportScalar>,
    #[serde(default)]
    message: Option<String>,
}

/// Extract an error body, if `json` is an object carrying a truthy `error` member.
///
/// `error` may be a string (used as the message), `true` (the `message` member is used),
/// or any other JSON value (rendered verbatim). `null`, `false`, `0`, `""`, `"0"`, `[]`
/// and `{}` mean success.
pub fn decode_error_body(json: &str) -> Option<ErrorBody> {
    let parsed: ErrorJson = serde_json::from_str(json).ok()?;
    let error = parsed.error?;
    let token = error.get().trim();
    let value: serde_json::Value = serde_json::from_str(token).ok()?;
    if is_falsy(&value) {
        return None;
    }

    let message = match value {
        serde_json::Value::Bool(true) => parsed
            .message
            .unwrap_or_else(|| "unknown error".to_owned()),
        serde_json::Value::String(text) => text,
        _ => token.to_owned(),
    };

    Some(ErrorBody {
        code: parsed.code.map(TransportScalar::into_string),
        message,
    })
}

fn is_falsy(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::Null => true,
        serde_json::Value::Bool(flag) => !flag,
        serde_json::Value::Number(number) => number.as_f64() == Some(0.0),
        serde_json::Value::String(text) => matches!(text.trim(), "" | "0"),
        serde_json::Value::Array(items) => items.is_empty(),
        serde_json::Value::Object(members) => members.is_empty(),
    }
}

/// Best-effort human readable message from an error response (used for auth failures).
pub fn error_message(json: &str) -> Option<String> {
    if let Some(body) = decode_error_body(json) {
        return Some(body.message);
    }

    #[derive(Deserialize)]
    struct MessageOnly {
        message: Option<String>,
    }

    serde_json::from_str::<MessageOnly>(json)
        .ok()
        .and_then(|it| it.message)
        .filter(|it| !it.trim().is_empty())
}
