//! Typed Rust client for the TradeUnifox WhatsApp gateway.
//!
//! Three components share one [`Gateway`] (base URL plus HTTP client):
//! - [`TokenManager`] exchanges a username and API key for a bearer token,
//! - [`MessageSender`] sends text messages with a [`Session`],
//! - [`MessageReceiver`] polls for inbound messages and hands them to a callback.
//!
//! The layout follows the usual three layers: a domain layer of validated types, a transport
//! layer for the JSON wire format, and a small client layer orchestrating requests.
//!
//! ```rust,no_run
//! use tradeunifox::{Credential, Gateway};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), tradeunifox::TradeUnifoxError> {
//!     let gateway = Gateway::new();
//!     let credential = Credential::new("user", "api-key")?;
//!     let token = gateway.token_manager(credential.clone()).refresh_token().await?;
//!
//!     let sender = gateway.sender(credential.session(token));
//!     let receipt = sender.send_message("+91 98765 43210", "hello").await?;
//!     println!("{:?}", receipt.message_id);
//!     Ok(())
//! }
//! ```
#![forbid(unsafe_code)]

pub mod client;
pub mod domain;
mod transport;

pub use client::{
    DEFAULT_TIMEOUT, Gateway, GatewayBuilder, MessageHandler, MessageReceiver, MessageSender,
    ReceiverState, StopHandle, TokenManager, TradeUnifoxError,
};
pub use domain::{
    ApiKey, BatchOrder, ConnectionReport, Credential, DEFAULT_POLL_INTERVAL, InboundBatch,
    InboundMessage, MarkReadResult, MessageBody, MessageId, OutboundMessage, Password,
    PhoneNumber, PollLimit, PollOptions, Recipient, SendReceipt, Session, Token, TokenGrant,
    TokenInfo, TokenStatus, Username, ValidationError,
};
