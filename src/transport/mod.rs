//! Transport layer: HTTP and wire-format details (serialization/deserialization).

mod error_body;
mod receive;
mod scalar;
mod send;
mod token;

pub use error_body::{ErrorBody, decode_error_body, error_message};
pub use receive::{
    InboundEntry, decode_mark_read_json_response, decode_message_json_response,
    decode_receive_json_response, decode_unread_count_json_response, encode_api_key_query,
    encode_mark_read_query, encode_receive_query,
};
pub use send::{decode_send_json_response, encode_send_json};
pub use token::{
    TokenReply, decode_check_token_json_response, decode_token_json_response,
    encode_credential_json,
};

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("invalid JSON response: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid timestamp: {value}")]
    InvalidTimestamp { value: String },

    #[error("malformed message: {reason}")]
    MalformedMessage { reason: &'static str },
}
