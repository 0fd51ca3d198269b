//! Client layer: orchestrates transport calls and maps transport ↔ domain.

mod receiver;
mod sender;
mod token;

#[cfg(test)]
mod testing;

use std::error::Error as StdError;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use url::Url;

use crate::domain::{Credential, Session, Token, Username, ValidationError};
use crate::transport::ErrorBody;

pub use receiver::{MessageHandler, MessageReceiver, ReceiverState, StopHandle};
pub use sender::MessageSender;
pub use token::TokenManager;

const DEFAULT_BASE_URL: &str = "https://whatsapp.tradeunifox.com/api";

/// Per-request timeout used unless [`GatewayBuilder::timeout`] overrides it.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

const DEFAULT_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HttpMethod {
    Get,
    Post,
}

#[derive(Debug, Clone)]
struct HttpRequest {
    method: HttpMethod,
    url: Url,
    basic_auth: Option<(Username, Token)>,
    json: Option<serde_json::Value>,
    user_agent: Option<String>,
}

impl HttpRequest {
    fn get(url: Url) -> Self {
        Self {
            method: HttpMethod::Get,
            url,
            basic_auth: None,
            json: None,
            user_agent: None,
        }
    }

    fn post(url: Url) -> Self {
        Self {
            method: HttpMethod::Post,
            ..Self::get(url)
        }
    }

    /// Authenticate as `username:token`, the scheme the gateway uses for every session call.
    fn basic_auth(mut self, session: &Session) -> Self {
        self.basic_auth = Some((session.username().clone(), session.token().clone()));
        self
    }

    fn json(mut self, body: serde_json::Value) -> Self {
        self.json = Some(body);
        self
    }
}

#[derive(Debug, Clone)]
struct HttpResponse {
    status: u16,
    body: String,
}

trait HttpTransport: Send + Sync {
    fn execute<'a>(
        &'a self,
        request: HttpRequest,
    ) -> BoxFuture<'a, Result<HttpResponse, Box<dyn StdError + Send + Sync>>>;
}

#[derive(Debug, Clone)]
struct ReqwestTransport {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpTransport for ReqwestTransport {
    fn execute<'a>(
        &'a self,
        request: HttpRequest,
    ) -> BoxFuture<'a, Result<HttpResponse, Box<dyn StdError + Send + Sync>>> {
        Box::pin(async move {
            let mut builder = match request.method {
                HttpMethod::Get => self.client.get(request.url),
                HttpMethod::Post => self.client.post(request.url),
            };
            builder = builder.timeout(self.timeout);
            if let Some(user_agent) = &request.user_agent {
                builder = builder.header(reqwest::header::USER_AGENT, user_agent.as_str());
            }
            if let Some((username, token)) = &request.basic_auth {
                builder = builder.basic_auth(username.as_str(), Some(token.as_str()));
            }
            if let Some(body) = &request.json {
                builder = builder.json(body);
            }

            let response = builder.send().await?;
            let status = response.status().as_u16();
            let body = response.text().await?;
            Ok(HttpResponse { status, body })
        })
    }
}

#[derive(Debug, thiserror::Error)]
/// Errors returned by the token manager, sender and receiver.
///
/// No variant is retried or refreshed automatically; callers that see
/// [`TradeUnifoxError::Auth`] are expected to refresh the token and try again.
pub enum TradeUnifoxError {
    /// HTTP client / transport failure (DNS, TLS, timeouts, etc).
    #[error("network error: {0}")]
    Network(#[source] Box<dyn StdError + Send + Sync>),

    /// The gateway rejected the credential or token.
    #[error("authentication rejected (HTTP {status}): {message:?}")]
    Auth { status: u16, message: Option<String> },

    /// The gateway answered with a well-formed error body (`{"error": ..., "code": ...}`).
    #[error("remote error (HTTP {status}): {message} (code {code:?})")]
    Remote {
        status: u16,
        code: Option<String>,
        message: String,
    },

    /// Non-successful HTTP status code without a recognisable error body.
    #[error("unexpected HTTP status: {status}")]
    HttpStatus { status: u16, body: Option<String> },

    /// Response body could not be parsed as the expected format.
    #[error("parse error: {0}")]
    Parse(#[source] Box<dyn StdError + Send + Sync>),

    /// One of the domain constructors rejected an invalid value.
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl TradeUnifoxError {
    /// `true` when the caller should obtain a new token before trying again.
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Auth { .. })
    }
}

#[derive(Debug, Clone)]
/// Builder for [`Gateway`].
///
/// Use this when you need to customize the base URL, timeout, or user-agent.
pub struct GatewayBuilder {
    base_url: String,
    timeout: Duration,
    user_agent: String,
}

impl Default for GatewayBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl GatewayBuilder {
    /// Create a builder with the production base URL and default timeout/user-agent.
    pub fn new() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_owned(),
            timeout: DEFAULT_TIMEOUT,
            user_agent: DEFAULT_USER_AGENT.to_owned(),
        }
    }

    /// Override the API base URL (the part before `/send`, `/get-token`, ...).
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Set the timeout applied to every request.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Override the HTTP `User-Agent` header.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Build a [`Gateway`].
    pub fn build(self) -> Result<Gateway, TradeUnifoxError> {
        let base_url = validate_base_url(&self.base_url)?;

        let client = reqwest::Client::builder()
            .build()
            .map_err(|err| TradeUnifoxError::Network(Box::new(err)))?;

        Ok(Gateway {
            base_url,
            user_agent: self.user_agent,
            http: Arc::new(ReqwestTransport {
                client,
                timeout: self.timeout,
            }),
        })
    }
}

#[derive(Clone)]
/// Handle to one TradeUnifox API deployment.
///
/// Owns the base URL and the HTTP client. Cloning is cheap; every component created from a
/// gateway shares its connection pool. There is no process-wide instance: callers create
/// the gateway they need and pass it around.
pub struct Gateway {
    base_url: String,
    user_agent: String,
    http: Arc<dyn HttpTransport>,
}

impl fmt::Debug for Gateway {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Gateway")
            .field("base_url", &self.base_url)
            .field("user_agent", &self.user_agent)
            .finish_non_exhaustive()
    }
}

impl Default for Gateway {
    fn default() -> Self {
        Self::new()
    }
}

impl Gateway {
    /// Gateway for `https://whatsapp.tradeunifox.com/api` with the default timeout.
    ///
    /// For more customization, use [`Gateway::builder`].
    pub fn new() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_owned(),
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            http: Arc::new(ReqwestTransport {
                client: reqwest::Client::new(),
                timeout: DEFAULT_TIMEOUT,
            }),
        }
    }

    /// Start building a gateway with custom settings.
    pub fn builder() -> GatewayBuilder {
        GatewayBuilder::new()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `User-Agent` sent with every request.
    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    /// Create a token manager bound to this gateway.
    pub fn token_manager(&self, credential: Credential) -> TokenManager {
        TokenManager::with_gateway(self.clone(), credential)
    }

    /// Create a message sender bound to this gateway.
    pub fn sender(&self, session: Session) -> MessageSender {
        MessageSender::with_gateway(self.clone(), session)
    }

    /// Create a message receiver bound to this gateway.
    pub fn receiver(&self, session: Session) -> MessageReceiver {
        MessageReceiver::with_gateway(self.clone(), session)
    }

    fn endpoint(
        &self,
        segments: &[&str],
        query: Vec<(String, String)>,
    ) -> Result<Url, TradeUnifoxError> {
        let invalid = || ValidationError::InvalidBaseUrl {
            input: self.base_url.clone(),
        };
        let mut url = Url::parse(&self.base_url).map_err(|_| invalid())?;

        url.path_segments_mut()
            .map_err(|_| invalid())?
            .pop_if_empty()
            .extend(segments);

        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Ok(url)
    }

    async fn execute(&self, mut request: HttpRequest) -> Result<HttpResponse, TradeUnifoxError> {
        request.user_agent = Some(self.user_agent.clone());
        let method = request.method;
        let path = request.url.path().to_owned();
        tracing::debug!(?method, %path, "gateway request");

        let response = self.http.execute(request).await.map_err(|err| {
            tracing::warn!(?method, %path, error = %err, "gateway request failed");
            TradeUnifoxError::Network(err)
        })?;

        tracing::debug!(?method, %path, status = response.status, "gateway response");
        Ok(response)
    }
}

fn validate_base_url(input: &str) -> Result<String, ValidationError> {
    let trimmed = input.trim().trim_end_matches('/');
    let invalid = || ValidationError::InvalidBaseUrl {
        input: input.to_owned(),
    };

    let url = Url::parse(trimmed).map_err(|_| invalid())?;
    if !matches!(url.scheme(), "http" | "https") || url.cannot_be_a_base() {
        return Err(invalid());
    }
    Ok(trimmed.to_owned())
}

/// Map auth failures and non-2xx statuses to errors; hand back the body otherwise.
fn ensure_success(response: HttpResponse) -> Result<String, TradeUnifoxError> {
    let HttpResponse { status, body } = response;

    if matches!(status, 401 | 403) {
        return Err(TradeUnifoxError::Auth {
            status,
            message: crate::transport::error_message(&body),
        });
    }

    if !(200..=299).contains(&status) {
        if let Some(error) = crate::transport::decode_error_body(&body) {
            return Err(remote_error(status, error));
        }
        let body = if body.trim().is_empty() {
            None
        } else {
            Some(body)
        };
        return Err(TradeUnifoxError::HttpStatus { status, body });
    }

    Ok(body)
}

/// Reject 2xx bodies that still carry an `error` member.
fn reject_error_body(status: u16, body: String) -> Result<String, TradeUnifoxError> {
    match crate::transport::decode_error_body(&body) {
        Some(error) => Err(remote_error(status, error)),
        None => Ok(body),
    }
}

fn remote_error(status: u16, error: ErrorBody) -> TradeUnifoxError {
    TradeUnifoxError::Remote {
        status,
        code: error.code,
        message: error.message,
    }
}

fn parse_error(err: crate::transport::TransportError) -> TradeUnifoxError {
    TradeUnifoxError::Parse(Box::new(err))
}
