use chrono::Utc;

use super::{Gateway, HttpRequest, TradeUnifoxError, ensure_success, parse_error, reject_error_body};
use crate::domain::{Credential, Token, TokenGrant, TokenInfo, TokenStatus};
use crate::transport::{
    TokenReply, decode_check_token_json_response, decode_token_json_response,
    encode_credential_json,
};

#[derive(Debug, Clone)]
/// Exchanges a [`Credential`] for bearer tokens.
///
/// The manager keeps no token state of its own: every call goes to the gateway, and callers
/// decide when a new token is needed (typically after a [`TradeUnifoxError::Auth`]).
pub struct TokenManager {
    gateway: Gateway,
    credential: Credential,
}

impl TokenManager {
    /// Token manager on the default [`Gateway`].
    pub fn new(credential: Credential) -> Self {
        Self::with_gateway(Gateway::new(), credential)
    }

    pub(crate) fn with_gateway(gateway: Gateway, credential: Credential) -> Self {
        Self {
            gateway,
            credential,
        }
    }

    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    /// Request a fresh token.
    ///
    /// Errors:
    /// - [`TradeUnifoxError::Auth`] when the credential is rejected,
    /// - [`TradeUnifoxError::Network`] when the gateway is unreachable or times out.
    pub async fn refresh_token(&self) -> Result<Token, TradeUnifoxError> {
        self.generate_token().await.map(|grant| grant.token)
    }

    /// Request a fresh token and keep the lifetime reported by the gateway.
    pub async fn generate_token(&self) -> Result<TokenGrant, TradeUnifoxError> {
        let username = self.credential.username().as_str();
        tracing::info!(username, "requesting token");

        let url = self.gateway.endpoint(&["get-token"], Vec::new())?;
        let request = HttpRequest::post(url).json(encode_credential_json(&self.credential));
        let response = self.gateway.execute(request).await?;
        let status = response.status;

        let body = ensure_success(response).inspect_err(|err| {
            tracing::warn!(username, error = %err, "token request failed");
        })?;

        match decode_token_json_response(&body, Utc::now()).map_err(parse_error)? {
            TokenReply::Granted(grant) => {
                tracing::info!(
                    username,
                    expires_in_minutes = grant.expires_in_minutes,
                    expires_at = %grant.expires_at.to_rfc3339(),
                    "token issued"
                );
                Ok(grant)
            }
            TokenReply::Rejected { message } => {
                tracing::warn!(username, ?message, "gateway answered without a token");
                Err(TradeUnifoxError::Auth { status, message })
            }
        }
    }

    /// Ask the gateway whether it already holds a token for this account.
    pub async fn check_token_status(&self) -> Result<TokenStatus, TradeUnifoxError> {
        tracing::debug!(
            username = self.credential.username().as_str(),
            "checking token status"
        );

        let url = self.gateway.endpoint(&["check-token"], Vec::new())?;
        let request = HttpRequest::post(url).json(encode_credential_json(&self.credential));
        let response = self.gateway.execute(request).await?;
        let status = response.status;
        let body = ensure_success(response).and_then(|body| reject_error_body(status, body))?;

        decode_check_token_json_response(&body).map_err(parse_error)
    }

    /// Reuse the gateway's current token while it has time left, otherwise issue a new one.
    pub async fn current_or_new_token(&self) -> Result<TokenInfo, TradeUnifoxError> {
        let status = self.check_token_status().await?;

        if status.is_valid_at(Utc::now()) {
            if let Some(token) = status.token {
                tracing::debug!("reusing token held by the gateway");
                return Ok(TokenInfo {
                    token,
                    expires_at: status.expires_at,
                    is_new: false,
                });
            }
        }

        if status.has_token {
            tracing::info!("gateway token expired, generating a new one");
        } else {
            tracing::info!("no token held by the gateway, generating a new one");
        }

        let grant = self.generate_token().await?;
        Ok(TokenInfo {
            token: grant.token,
            expires_at: Some(grant.expires_at),
            is_new: true,
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::client::HttpMethod;
    use crate::client::testing::{BASE_URL, FakeTransport};

    use super::*;

    fn credential() -> Credential {
        Credential::new("ssc", "key-1")
            .unwrap()
            .with_password("pw")
            .unwrap()
    }

    fn manager(transport: &FakeTransport) -> TokenManager {
        transport.gateway().token_manager(credential())
    }

    #[tokio::test]
    async fn refresh_token_posts_credential_and_returns_token() {
        let transport = FakeTransport::new();
        transport.respond(200, r#"{"token": "fresh-token", "expires_in_minutes": 15}"#);

        let token = manager(&transport).refresh_token().await.unwrap();
        assert_eq!(token.as_str(), "fresh-token");

        let requests = transport.requests();
        assert_eq!(requests.len(), 1);
        let request = &requests[0];
        assert_eq!(request.method, HttpMethod::Post);
        assert_eq!(request.url.as_str(), format!("{BASE_URL}/get-token"));
        assert!(request.basic_auth.is_none());
        assert_eq!(
            request.json,
            Some(serde_json::json!({
                "username": "ssc",
                "api_key": "key-1",
                "password": "pw",
            }))
        );
    }

    #[tokio::test]
    async fn generate_token_reports_lifetime() {
        let transport = FakeTransport::new();
        transport.respond(200, r#"{"auth_token": "t", "expires_in": 120}"#);

        let before = Utc::now();
        let grant = manager(&transport).generate_token().await.unwrap();
        assert_eq!(grant.expires_in_minutes, 2);
        assert!(grant.expires_at >= before + chrono::Duration::minutes(2));
    }

    #[tokio::test]
    async fn refresh_token_maps_401_to_auth_error() {
        let transport = FakeTransport::new();
        transport.respond(401, r#"{"error": "Invalid API key"}"#);

        let err = manager(&transport).refresh_token().await.unwrap_err();
        match err {
            TradeUnifoxError::Auth { status, message } => {
                assert_eq!(status, 401);
                assert_eq!(message.as_deref(), Some("Invalid API key"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn refresh_token_without_token_in_body_is_auth_error() {
        let transport = FakeTransport::new();
        transport.respond(200, r#"{"message": "Authentication failed"}"#);

        let err = manager(&transport).refresh_token().await.unwrap_err();
        assert!(matches!(
            err,
            TradeUnifoxError::Auth { status: 200, message: Some(ref m) } if m == "Authentication failed"
        ));
    }

    #[tokio::test]
    async fn refresh_token_maps_transport_failure_to_network_error() {
        let transport = FakeTransport::new();
        transport.fail("connection refused");

        let err = manager(&transport).refresh_token().await.unwrap_err();
        assert!(matches!(err, TradeUnifoxError::Network(_)));
    }

    #[tokio::test]
    async fn check_token_status_uses_check_endpoint() {
        let transport = FakeTransport::new();
        transport.respond(
            200,
            r#"{"has_token": true, "token": "held", "expires_at": "2999-01-01T00:00:00"}"#,
        );

        let status = manager(&transport).check_token_status().await.unwrap();
        assert!(status.has_token);
        assert_eq!(status.token.unwrap().as_str(), "held");

        let requests = transport.requests();
        assert_eq!(requests[0].url.as_str(), format!("{BASE_URL}/check-token"));
    }

    #[tokio::test]
    async fn current_or_new_token_surfaces_check_error_body() {
        let transport = FakeTransport::new();
        transport
            .respond(200, r#"{"error": "bad key", "code": "K1"}"#)
            .respond(200, r#"{"token": "never"}"#);

        let err = manager(&transport).current_or_new_token().await.unwrap_err();
        assert!(matches!(
            err,
            TradeUnifoxError::Remote { status: 200, code: Some(ref c), ref message }
                if c == "K1" && message == "bad key"
        ));
        assert_eq!(transport.request_count(), 1);
    }

    #[tokio::test]
    async fn current_or_new_token_reuses_valid_gateway_token() {
        let transport = FakeTransport::new();
        transport.respond(
            200,
            r#"{"has_token": true, "token": "held", "expires_at": "2999-01-01T00:00:00Z"}"#,
        );

        let info = manager(&transport).current_or_new_token().await.unwrap();
        assert_eq!(info.token.as_str(), "held");
        assert!(!info.is_new);
        assert_eq!(transport.request_count(), 1);
    }

    #[tokio::test]
    async fn current_or_new_token_generates_when_expired() {
        let transport = FakeTransport::new();
        transport
            .respond(
                200,
                r#"{"has_token": true, "token": "old", "expires_at": "2000-01-01T00:00:00Z"}"#,
            )
            .respond(200, r#"{"token": "new"}"#);

        let info = manager(&transport).current_or_new_token().await.unwrap();
        assert_eq!(info.token.as_str(), "new");
        assert!(info.is_new);
        assert!(info.expires_at.is_some());

        let requests = transport.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[1].url.as_str(), format!("{BASE_URL}/get-token"));
    }

    #[tokio::test]
    async fn current_or_new_token_generates_when_gateway_has_none() {
        let transport = FakeTransport::new();
        transport
            .respond(200, r#"{"has_token": false}"#)
            .respond(200, r#"{"token": "new"}"#);

        let info = manager(&transport).current_or_new_token().await.unwrap();
        assert!(info.is_new);
        assert_eq!(transport.request_count(), 2);
    }
}
