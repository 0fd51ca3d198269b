use serde::Deserialize;

use super::TransportError;
use super::scalar::TransportScalar;
use crate::domain::{
    ApiKey, MessageBody, MessageId, OutboundMessage, Recipient, SendReceipt, Session,
};

#[derive(Debug, Deserialize)]
struct SendJsonResponse {
    #[serde(default)]
    status: Option<serde_json::Value>,
    #[serde(default)]
    message_id: Option<TransportScalar>,
    #[serde(default)]
    id: Option<TransportScalar>,
}

pub fn encode_send_json(session: &Session, message: &OutboundMessage) -> serde_json::Value {
    let mut body = serde_json::Map::new();
    body.insert(
        Recipient::FIELD.to_owned(),
        message.recipient().as_str().into(),
    );
    body.insert(MessageBody::FIELD.to_owned(), message.body().as_str().into());
    body.insert(ApiKey::FIELD.to_owned(), session.api_key().as_str().into());
    serde_json::Value::Object(body)
}

pub fn decode_send_json_response(json: &str) -> Result<SendReceipt, TransportError> {
    let raw: serde_json::Value = serde_json::from_str(json)?;
    let parsed: SendJsonResponse = serde_json::from_str(json)?;

    let message_id = parsed
        .message_id
        .or(parsed.id)
        .and_then(|id| MessageId::new(id.into_string()).ok());

    Ok(SendReceipt {
        status: parsed.status.and_then(status_text),
        message_id,
        raw,
    })
}

fn status_text(value: serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::Null => None,
        serde_json::Value::String(text) => Some(text),
        other => Some(other.to_string()),
    }
}
