use serde::Deserialize;
use serde_json::value::RawValue;

use super::TransportError;
use super::scalar::TransportScalar;
use crate::domain::{
    ApiKey, BatchOrder, InboundMessage, MarkReadResult, MessageId, PollLimit, PollOptions, Session,
};

/// One element of a receive batch, decoded on its own so a bad entry cannot sink the batch.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEntry {
    Message(InboundMessage),
    Malformed {
        id: Option<MessageId>,
        reason: &'static str,
    },
}

impl InboundEntry {
    pub fn id(&self) -> Option<&MessageId> {
        match self {
            Self::Message(message) => message.id.as_ref(),
            Self::Malformed { id, .. } => id.as_ref(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ReceiveJsonResponse {
    #[serde(default)]
    messages: Vec<Box<RawValue>>,
}

#[derive(Debug, Deserialize)]
struct InboundJson {
    #[serde(default)]
    id: Option<TransportScalar>,
    #[serde(default)]
    message_id: Option<TransportScalar>,
    #[serde(default)]
    body: Option<String>,
    #[serde(default)]
    from: Option<TransportScalar>,
    #[serde(default)]
    sender: Option<TransportScalar>,
    #[serde(default)]
    timestamp: Option<TransportScalar>,
}

#[derive(Debug, Deserialize)]
struct UnreadCountJsonResponse {
    #[serde(default)]
    count: Option<TransportScalar>,
}

#[derive(Debug, Deserialize)]
struct MarkReadJsonResponse {
    #[serde(default)]
    marked_count: Option<TransportScalar>,
}

pub fn encode_api_key_query(session: &Session) -> Vec<(String, String)> {
    vec![(
        ApiKey::FIELD.to_owned(),
        session.api_key().as_str().to_owned(),
    )]
}

pub fn encode_receive_query(
    session: &Session,
    options: &PollOptions,
    after: Option<&MessageId>,
) -> Vec<(String, String)> {
    let mut params = encode_api_key_query(session);
    params.push((
        PollLimit::FIELD.to_owned(),
        options.limit.value().to_string(),
    ));
    if let Some(after) = after {
        params.push(("after".to_owned(), after.as_str().to_owned()));
    }
    if options.mark_as_read {
        params.push(("mark_read".to_owned(), "true".to_owned()));
    }
    params
}

pub fn encode_mark_read_query(session: &Session, ids: &[MessageId]) -> Vec<(String, String)> {
    let mut params = encode_api_key_query(session);
    if !ids.is_empty() {
        let joined = ids
            .iter()
            .map(MessageId::as_str)
            .collect::<Vec<_>>()
            .join(",");
        params.push(("message_ids".to_owned(), joined));
    }
    params
}

/// Decode a receive batch into entries in arrival order (oldest first).
pub fn decode_receive_json_response(
    json: &str,
    order: BatchOrder,
) -> Result<Vec<InboundEntry>, TransportError> {
    let parsed: ReceiveJsonResponse = serde_json::from_str(json)?;
    let mut entries = parsed
        .messages
        .iter()
        .map(|raw| decode_entry(raw.get()))
        .collect::<Vec<_>>();

    if order == BatchOrder::NewestFirst {
        entries.reverse();
    }
    Ok(entries)
}

pub fn decode_message_json_response(json: &str) -> Result<InboundMessage, TransportError> {
    match decode_entry(json) {
        InboundEntry::Message(message) => Ok(message),
        InboundEntry::Malformed { reason, .. } => Err(TransportError::MalformedMessage { reason }),
    }
}

pub fn decode_unread_count_json_response(json: &str) -> Result<u64, TransportError> {
    let parsed: UnreadCountJsonResponse = serde_json::from_str(json)?;
    Ok(parsed
        .count
        .as_ref()
        .and_then(TransportScalar::to_u64)
        .unwrap_or(0))
}

pub fn decode_mark_read_json_response(json: &str) -> Result<MarkReadResult, TransportError> {
    let raw: serde_json::Value = serde_json::from_str(json)?;
    let parsed: MarkReadJsonResponse = serde_json::from_str(json)?;
    Ok(MarkReadResult {
        marked_count: parsed
            .marked_count
            .as_ref()
            .and_then(TransportScalar::to_u64)
            .unwrap_or(0),
        raw,
    })
}

fn decode_entry(json: &str) -> InboundEntry {
    let Ok(object) = serde_json::from_str::<serde_json::Map<String, serde_json::Value>>(json)
    else {
        return InboundEntry::Malformed {
            id: None,
            reason: "not a JSON object",
        };
    };

    let Ok(fields) = serde_json::from_str::<InboundJson>(json) else {
        return InboundEntry::Malformed {
            id: loose_id(&object),
            reason: "unexpected field type",
        };
    };

    let id = fields
        .id
        .or(fields.message_id)
        .and_then(|id| MessageId::new(id.into_string()).ok());

    let Some(body) = fields.body else {
        return InboundEntry::Malformed {
            id,
            reason: "missing body",
        };
    };

    InboundEntry::Message(InboundMessage {
        id,
        sender: fields
            .from
            .or(fields.sender)
            .map(TransportScalar::into_string),
        body,
        timestamp: fields.timestamp.map(TransportScalar::into_string),
        raw: object,
    })
}

fn loose_id(object: &serde_json::Map<String, serde_json::Value>) -> Option<MessageId> {
    ["id", "message_id"]
        .iter()
        .filter_map(|key| object.get(*key))
        .find_map(|value| match value {
            serde_json::Value::String(text) => MessageId::new(text.as_str()).ok(),
            serde_json::Value::Number(number) => MessageId::new(number.to_string()).ok(),
            _ => None,
        })
}
