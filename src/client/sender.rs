use super::{Gateway, HttpRequest, TradeUnifoxError, ensure_success, parse_error, reject_error_body};
use crate::domain::{OutboundMessage, SendReceipt, Session};
use crate::transport::{decode_send_json_response, encode_send_json};

#[derive(Debug, Clone)]
/// Sends WhatsApp text messages on behalf of a [`Session`].
///
/// Each call is exactly one request. Nothing is retried, batched or rate limited.
pub struct MessageSender {
    gateway: Gateway,
    session: Session,
}

impl MessageSender {
    /// Sender on the default [`Gateway`].
    pub fn new(session: Session) -> Self {
        Self::with_gateway(Gateway::new(), session)
    }

    pub(crate) fn with_gateway(gateway: Gateway, session: Session) -> Self {
        Self { gateway, session }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Validate `recipient` and `body`, then send.
    ///
    /// Invalid input fails with [`TradeUnifoxError::Validation`] before anything goes over
    /// the wire.
    pub async fn send_message(
        &self,
        recipient: impl Into<String>,
        body: impl Into<String>,
    ) -> Result<SendReceipt, TradeUnifoxError> {
        let message = OutboundMessage::parse(recipient, body)?;
        self.send(&message).await
    }

    /// Send an already validated message.
    ///
    /// Errors:
    /// - [`TradeUnifoxError::Auth`] when the token is rejected (refresh and call again),
    /// - [`TradeUnifoxError::Remote`] when the gateway refuses the message,
    /// - [`TradeUnifoxError::HttpStatus`] for other non-2xx responses,
    /// - [`TradeUnifoxError::Network`] for transport failures.
    pub async fn send(&self, message: &OutboundMessage) -> Result<SendReceipt, TradeUnifoxError> {
        let recipient = message.recipient().as_str();
        tracing::info!(recipient, "sending message");

        let url = self.gateway.endpoint(&["send"], Vec::new())?;
        let request = HttpRequest::post(url)
            .basic_auth(&self.session)
            .json(encode_send_json(&self.session, message));
        let response = self.gateway.execute(request).await?;
        let status = response.status;

        let body = ensure_success(response)
            .and_then(|body| reject_error_body(status, body))
            .inspect_err(|err| tracing::warn!(recipient, error = %err, "message not sent"))?;

        let receipt = decode_send_json_response(&body).map_err(parse_error)?;
        tracing::info!(
            recipient,
            message_id = receipt.message_id.as_ref().map(|id| id.as_str()),
            "message accepted"
        );
        Ok(receipt)
    }
}
