use chrono::{DateTime, Utc};

use crate::domain::value::{MessageId, Token};

#[derive(Debug, Clone, PartialEq)]
pub struct TokenGrant {
    pub token: Token,
    pub expires_in_minutes: u32,
    pub expires_at: DateTime<Utc>,
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TokenStatus {
    pub has_token: bool,
    pub token: Option<Token>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl TokenStatus {
    /// Whole minutes left before `expires_at`, clamped at zero. `None` without expiry info.
    pub fn minutes_until_expiry(&self, now: DateTime<Utc>) -> Option<i64> {
        self.expires_at
            .map(|expires_at| (expires_at - now).num_minutes().max(0))
    }

    /// A token is usable when the gateway reports one and it has at least a minute left.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.has_token
            && self.token.is_some()
            && self.minutes_until_expiry(now).is_some_and(|minutes| minutes > 0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TokenInfo {
    pub token: Token,
    pub expires_at: Option<DateTime<Utc>>,
    /// `true` when the token was issued by this call rather than reused.
    pub is_new: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SendReceipt {
    pub status: Option<String>,
    pub message_id: Option<MessageId>,
    /// The gateway's response body, unmodified.
    pub raw: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InboundMessage {
    pub id: Option<MessageId>,
    pub sender: Option<String>,
    pub body: String,
    pub timestamp: Option<String>,
    /// The message object exactly as the gateway sent it.
    pub raw: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct InboundBatch {
    /// Well-formed messages in arrival order.
    pub messages: Vec<InboundMessage>,
    /// Entries dropped because they were not valid message objects.
    pub skipped: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MarkReadResult {
    pub marked_count: u64,
    pub raw: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionReport {
    pub base_url: String,
    pub status: u16,
    pub body_preview: String,
}

impl ConnectionReport {
    pub fn is_reachable(&self) -> bool {
        (200..=299).contains(&self.status)
    }
}
