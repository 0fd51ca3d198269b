use std::time::Duration;

use crate::domain::validation::ValidationError;
use crate::domain::value::{ApiKey, MessageBody, Password, PollLimit, Recipient, Token, Username};

/// Default pause between two receive polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Eq)]
/// Account credential exchanged for a [`Token`].
///
/// Immutable once built; a token manager keeps its copy for its whole lifetime.
pub struct Credential {
    username: Username,
    api_key: ApiKey,
    password: Option<Password>,
}

impl Credential {
    /// Create a credential from a username and API key.
    pub fn new(
        username: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        Ok(Self {
            username: Username::new(username)?,
            api_key: ApiKey::new(api_key)?,
            password: None,
        })
    }

    /// Attach the account password, which the gateway may require to issue a token.
    pub fn with_password(mut self, password: impl Into<String>) -> Result<Self, ValidationError> {
        self.password = Some(Password::new(password)?);
        Ok(self)
    }

    pub fn username(&self) -> &Username {
        &self.username
    }

    pub fn api_key(&self) -> &ApiKey {
        &self.api_key
    }

    pub fn password(&self) -> Option<&Password> {
        self.password.as_ref()
    }

    /// Pair this credential with an issued token.
    pub fn session(&self, token: Token) -> Session {
        Session::new(self.username.clone(), token, self.api_key.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Everything a sender or receiver needs to talk to the gateway.
pub struct Session {
    username: Username,
    token: Token,
    api_key: ApiKey,
}

impl Session {
    pub fn new(username: Username, token: Token, api_key: ApiKey) -> Self {
        Self {
            username,
            token,
            api_key,
        }
    }

    /// Validate raw strings into a session.
    pub fn from_parts(
        username: impl Into<String>,
        token: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        Ok(Self::new(
            Username::new(username)?,
            Token::new(token)?,
            ApiKey::new(api_key)?,
        ))
    }

    pub fn username(&self) -> &Username {
        &self.username
    }

    pub fn token(&self) -> &Token {
        &self.token
    }

    pub fn api_key(&self) -> &ApiKey {
        &self.api_key
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// A text message addressed to one WhatsApp number.
pub struct OutboundMessage {
    recipient: Recipient,
    body: MessageBody,
}

impl OutboundMessage {
    pub fn new(recipient: Recipient, body: MessageBody) -> Self {
        Self { recipient, body }
    }

    /// Validate a raw recipient and body.
    pub fn parse(
        recipient: impl Into<String>,
        body: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        Ok(Self::new(Recipient::new(recipient)?, MessageBody::new(body)?))
    }

    pub fn recipient(&self) -> &Recipient {
        &self.recipient
    }

    pub fn body(&self) -> &MessageBody {
        &self.body
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
/// Order in which the gateway lists a batch of inbound messages.
pub enum BatchOrder {
    /// `messages[0]` is the most recent message.
    #[default]
    NewestFirst,
    /// `messages[0]` is the oldest message.
    OldestFirst,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Polling parameters of a message receiver.
pub struct PollOptions {
    pub interval: Duration,
    pub limit: PollLimit,
    pub mark_as_read: bool,
    pub order: BatchOrder,
}

impl Default for PollOptions {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            limit: PollLimit::default(),
            mark_as_read: false,
            order: BatchOrder::default(),
        }
    }
}
