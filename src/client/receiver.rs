use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::Notify;

use super::{
    Gateway, HttpRequest, TradeUnifoxError, ensure_success, parse_error, reject_error_body,
};
use crate::domain::{
    BatchOrder, ConnectionReport, InboundBatch, InboundMessage, MarkReadResult, MessageId,
    PollLimit, PollOptions, Session, ValidationError,
};
use crate::transport::{
    InboundEntry, decode_mark_read_json_response, decode_message_json_response,
    decode_receive_json_response, decode_unread_count_json_response, encode_api_key_query,
    encode_mark_read_query, encode_receive_query,
};

const CONNECTION_PREVIEW_CHARS: usize = 100;

/// Callback invoked for every inbound message, one at a time, in arrival order.
///
/// Implemented for any `FnMut(InboundMessage) + Send` closure.
pub trait MessageHandler: Send {
    fn handle(&mut self, message: InboundMessage);
}

impl<F> MessageHandler for F
where
    F: FnMut(InboundMessage) + Send,
{
    fn handle(&mut self, message: InboundMessage) {
        self(message)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiverState {
    Idle,
    Running,
}

#[derive(Debug, Default)]
struct ReceiverControl {
    stop_requested: AtomicBool,
    running: AtomicBool,
    wake: Notify,
}

impl ReceiverControl {
    fn request_stop(&self) {
        self.stop_requested.store(true, Ordering::SeqCst);
        self.wake.notify_one();
    }

    fn stop_requested(&self) -> bool {
        self.stop_requested.load(Ordering::SeqCst)
    }

    fn state(&self) -> ReceiverState {
        if self.running.load(Ordering::SeqCst) {
            ReceiverState::Running
        } else {
            ReceiverState::Idle
        }
    }
}

/// Marks the receiver as running for as long as it lives, then clears both flags, even when
/// the polling future is dropped half way.
struct RunGuard<'a>(&'a ReceiverControl);

impl<'a> RunGuard<'a> {
    fn enter(control: &'a ReceiverControl) -> Self {
        control.running.store(true, Ordering::SeqCst);
        Self(control)
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        // Drop the permit left by a stop that nothing was waiting on.
        let pending = std::pin::pin!(self.0.wake.notified());
        pending.enable();

        self.0.running.store(false, Ordering::SeqCst);
        self.0.stop_requested.store(false, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone)]
/// Cloneable handle that stops a running [`MessageReceiver`].
///
/// Safe to use from inside the handler or from another task. A stop issued while the
/// receiver is idle makes the next [`MessageReceiver::start`] return before its first poll.
pub struct StopHandle(Arc<ReceiverControl>);

impl StopHandle {
    pub fn stop(&self) {
        self.0.request_stop();
    }

    pub fn state(&self) -> ReceiverState {
        self.0.state()
    }
}

/// Polls the gateway for inbound messages and hands each one to the registered handler.
///
/// ```rust,no_run
/// use tradeunifox::{MessageReceiver, Session};
///
/// # async fn run() -> Result<(), tradeunifox::TradeUnifoxError> {
/// let mut receiver = MessageReceiver::new(Session::from_parts("user", "token", "key")?);
/// let stop = receiver.stop_handle();
/// receiver.on_message(move |message: tradeunifox::InboundMessage| {
///     println!("{:?}: {}", message.sender, message.body);
///     if message.body == "bye" {
///         stop.stop();
///     }
/// });
/// receiver.start().await?;
/// # Ok(())
/// # }
/// ```
pub struct MessageReceiver {
    gateway: Gateway,
    session: Session,
    options: PollOptions,
    handler: Option<Box<dyn MessageHandler>>,
    cursor: Option<MessageId>,
    control: Arc<ReceiverControl>,
}

impl fmt::Debug for MessageReceiver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageReceiver")
            .field("gateway", &self.gateway)
            .field("session", &self.session)
            .field("options", &self.options)
            .field("has_handler", &self.handler.is_some())
            .field("cursor", &self.cursor)
            .field("state", &self.state())
            .finish()
    }
}

impl MessageReceiver {
    /// Receiver on the default [`Gateway`].
    pub fn new(session: Session) -> Self {
        Self::with_gateway(Gateway::new(), session)
    }

    pub(crate) fn with_gateway(gateway: Gateway, session: Session) -> Self {
        Self {
            gateway,
            session,
            options: PollOptions::default(),
            handler: None,
            cursor: None,
            control: Arc::new(ReceiverControl::default()),
        }
    }

    /// Pause between polls (default 5 seconds).
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.options.interval = interval;
        self
    }

    /// Maximum messages requested per poll (default 10).
    pub fn with_limit(mut self, limit: PollLimit) -> Self {
        self.options.limit = limit;
        self
    }

    /// Ask the gateway to mark fetched messages as read.
    pub fn with_mark_as_read(mut self, mark_as_read: bool) -> Self {
        self.options.mark_as_read = mark_as_read;
        self
    }

    pub fn with_batch_order(mut self, order: BatchOrder) -> Self {
        self.options.order = order;
        self
    }

    pub fn options(&self) -> &PollOptions {
        &self.options
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Id of the newest message seen so far; sent as `after` on the next poll.
    pub fn cursor(&self) -> Option<&MessageId> {
        self.cursor.as_ref()
    }

    pub fn state(&self) -> ReceiverState {
        self.control.state()
    }

    /// Register the message handler. A later registration replaces the earlier one.
    pub fn on_message(&mut self, handler: impl MessageHandler + 'static) {
        if self.handler.is_some() {
            tracing::debug!("replacing registered message handler");
        }
        self.handler = Some(Box::new(handler));
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle(Arc::clone(&self.control))
    }

    /// Request a cooperative stop; see [`StopHandle::stop`].
    pub fn stop(&self) {
        self.control.request_stop();
    }

    /// Poll until stopped, dispatching every new message to the handler.
    ///
    /// The returned future completes only when a stop is requested (after the message being
    /// handled, or the poll in flight, is finished) or when the gateway rejects the token.
    /// Run it on its own task if other work must continue meanwhile.
    ///
    /// Errors:
    /// - [`ValidationError::MissingHandler`] when [`MessageReceiver::on_message`] was never called,
    /// - [`TradeUnifoxError::Auth`] when the token is rejected; the receiver is idle again.
    ///
    /// Any other poll failure is logged and the next poll happens after the interval.
    /// Entries that are not valid messages are logged and skipped.
    pub async fn start(&mut self) -> Result<(), TradeUnifoxError> {
        let Some(handler) = self.handler.as_mut() else {
            return Err(ValidationError::MissingHandler.into());
        };

        let control = &*self.control;
        let _running = RunGuard::enter(control);
        tracing::info!(
            interval = ?self.options.interval,
            limit = self.options.limit.value(),
            "receiver started"
        );

        while !control.stop_requested() {
            let fetched = fetch(
                &self.gateway,
                &self.session,
                &self.options,
                self.cursor.as_ref(),
            )
            .await;

            match fetched {
                Ok(entries) => {
                    for entry in entries {
                        if let Some(id) = entry.id() {
                            self.cursor = Some(id.clone());
                        }
                        match entry {
                            InboundEntry::Message(message) => handler.handle(message),
                            InboundEntry::Malformed { id, reason } => {
                                tracing::warn!(?id, reason, "skipping malformed inbound message");
                            }
                        }
                        if control.stop_requested() {
                            break;
                        }
                    }
                }
                Err(err) if err.is_auth() => {
                    tracing::warn!(error = %err, "token rejected, receiver stopping");
                    return Err(err);
                }
                Err(err) => {
                    tracing::warn!(error = %err, "poll failed, retrying after interval");
                }
            }

            if control.stop_requested() {
                break;
            }
            tokio::select! {
                _ = tokio::time::sleep(self.options.interval) => {}
                _ = control.wake.notified() => {}
            }
        }

        tracing::info!("receiver stopped");
        Ok(())
    }

    /// Fetch one batch outside the polling loop and advance the cursor past it.
    pub async fn receive_messages(&mut self) -> Result<InboundBatch, TradeUnifoxError> {
        let entries = fetch(
            &self.gateway,
            &self.session,
            &self.options,
            self.cursor.as_ref(),
        )
        .await?;

        let mut batch = InboundBatch::default();
        for entry in entries {
            if let Some(id) = entry.id() {
                self.cursor = Some(id.clone());
            }
            match entry {
                InboundEntry::Message(message) => batch.messages.push(message),
                InboundEntry::Malformed { id, reason } => {
                    tracing::warn!(?id, reason, "skipping malformed inbound message");
                    batch.skipped += 1;
                }
            }
        }
        Ok(batch)
    }

    /// Number of messages the gateway still considers unread.
    pub async fn unread_count(&self) -> Result<u64, TradeUnifoxError> {
        let url = self
            .gateway
            .endpoint(&["unread-count"], encode_api_key_query(&self.session))?;
        let body = self.call(HttpRequest::get(url)).await?;
        let count = decode_unread_count_json_response(&body).map_err(parse_error)?;
        tracing::debug!(count, "unread message count");
        Ok(count)
    }

    /// Mark the given messages as read; an empty slice marks every unread message.
    pub async fn mark_as_read(&self, ids: &[MessageId]) -> Result<MarkReadResult, TradeUnifoxError> {
        let url = self
            .gateway
            .endpoint(&["mark-read"], encode_mark_read_query(&self.session, ids))?;
        let body = self.call(HttpRequest::post(url)).await?;
        let result = decode_mark_read_json_response(&body).map_err(parse_error)?;
        tracing::info!(marked = result.marked_count, "messages marked as read");
        Ok(result)
    }

    pub async fn message_by_id(&self, id: &MessageId) -> Result<InboundMessage, TradeUnifoxError> {
        let url = self.gateway.endpoint(
            &["message", id.as_str()],
            encode_api_key_query(&self.session),
        )?;
        let body = self.call(HttpRequest::get(url)).await?;
        decode_message_json_response(&body).map_err(parse_error)
    }

    /// Unauthenticated reachability probe of `{base}/status`.
    ///
    /// Any HTTP answer counts as a report; only transport failures are errors.
    pub async fn check_connection(&self) -> Result<ConnectionReport, TradeUnifoxError> {
        let url = self.gateway.endpoint(&["status"], Vec::new())?;
        let response = self.gateway.execute(HttpRequest::get(url)).await?;
        Ok(ConnectionReport {
            base_url: self.gateway.base_url().to_owned(),
            status: response.status,
            body_preview: response
                .body
                .chars()
                .take(CONNECTION_PREVIEW_CHARS)
                .collect(),
        })
    }

    async fn call(&self, request: HttpRequest) -> Result<String, TradeUnifoxError> {
        let response = self
            .gateway
            .execute(request.basic_auth(&self.session))
            .await?;
        let status = response.status;
        ensure_success(response).and_then(|body| reject_error_body(status, body))
    }
}

async fn fetch(
    gateway: &Gateway,
    session: &Session,
    options: &PollOptions,
    after: Option<&MessageId>,
) -> Result<Vec<InboundEntry>, TradeUnifoxError> {
    let url = gateway.endpoint(
        &["receive"],
        encode_receive_query(session, options, after),
    )?;
    let response = gateway
        .execute(HttpRequest::get(url).basic_auth(session))
        .await?;
    let status = response.status;
    let body = ensure_success(response).and_then(|body| reject_error_body(status, body))?;

    let entries = decode_receive_json_response(&body, options.order).map_err(parse_error)?;
    tracing::debug!(count = entries.len(), "inbound batch received");
    Ok(entries)
}
