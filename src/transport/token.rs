use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use serde::Deserialize;

use super::TransportError;
use super::error_body::error_message;
use super::scalar::TransportScalar;
use crate::domain::{ApiKey, Credential, Password, Token, TokenGrant, TokenStatus, Username};

/// Token lifetime assumed when the gateway does not report one.
pub const DEFAULT_TOKEN_LIFETIME_MINUTES: u32 = 60;

#[derive(Debug, Deserialize)]
struct TokenJsonResponse {
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    auth_token: Option<String>,
    #[serde(default)]
    key: Option<String>,
    #[serde(default)]
    expires_in_minutes: Option<TransportScalar>,
    #[serde(default)]
    expires_in: Option<TransportScalar>,
    #[serde(default)]
    message: Option<String>,
}

impl TokenJsonResponse {
    fn first_token(&mut self) -> Option<Token> {
        [
            self.token.take(),
            self.access_token.take(),
            self.auth_token.take(),
            self.key.take(),
        ]
        .into_iter()
        .flatten()
        .find_map(|value| Token::new(value).ok())
    }
}

#[derive(Debug, Deserialize)]
struct CheckTokenJsonResponse {
    #[serde(default)]
    has_token: bool,
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    auth_token: Option<String>,
    #[serde(default)]
    key: Option<String>,
    #[serde(default)]
    expires_at: Option<String>,
}

/// Outcome of a `get-token` call that returned a 2xx status.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenReply {
    Granted(TokenGrant),
    /// The body carried no usable token; the gateway's message, if any.
    Rejected { message: Option<String> },
}

pub fn encode_credential_json(credential: &Credential) -> serde_json::Value {
    let mut body = serde_json::Map::new();
    body.insert(
        Username::FIELD.to_owned(),
        credential.username().as_str().into(),
    );
    body.insert(ApiKey::FIELD.to_owned(), credential.api_key().as_str().into());
    if let Some(password) = credential.password() {
        body.insert(Password::FIELD.to_owned(), password.as_str().into());
    }
    serde_json::Value::Object(body)
}

pub fn decode_token_json_response(
    json: &str,
    now: DateTime<Utc>,
) -> Result<TokenReply, TransportError> {
    let mut parsed: TokenJsonResponse = serde_json::from_str(json)?;

    let Some(token) = parsed.first_token() else {
        return Ok(TokenReply::Rejected {
            message: error_message(json),
        });
    };

    let expires_in_minutes = parsed
        .expires_in_minutes
        .as_ref()
        .and_then(TransportScalar::to_u64)
        .or_else(|| {
            parsed
                .expires_in
                .as_ref()
                .and_then(TransportScalar::to_u64)
                .map(|seconds| seconds.div_ceil(60))
        })
        .map(|minutes| u32::try_from(minutes).unwrap_or(u32::MAX))
        .unwrap_or(DEFAULT_TOKEN_LIFETIME_MINUTES);

    Ok(TokenReply::Granted(TokenGrant {
        token,
        expires_in_minutes,
        expires_at: now + Duration::minutes(i64::from(expires_in_minutes)),
        message: parsed.message,
    }))
}

pub fn decode_check_token_json_response(json: &str) -> Result<TokenStatus, TransportError> {
    let parsed: CheckTokenJsonResponse = serde_json::from_str(json)?;

    if !parsed.has_token {
        return Ok(TokenStatus {
            has_token: false,
            token: None,
            expires_at: None,
        });
    }

    let token = [
        parsed.token,
        parsed.access_token,
        parsed.auth_token,
        parsed.key,
    ]
    .into_iter()
    .flatten()
    .find_map(|value| Token::new(value).ok());

    let expires_at = parsed
        .expires_at
        .filter(|value| !value.trim().is_empty())
        .map(|value| parse_timestamp(&value))
        .transpose()?;

    Ok(TokenStatus {
        has_token: true,
        token,
        expires_at,
    })
}

/// RFC 3339, or a naive ISO-8601 timestamp which is taken to be UTC.
fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, TransportError> {
    let value = value.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Ok(parsed.with_timezone(&Utc));
    }

    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .map(|naive| naive.and_utc())
        .ok_or_else(|| TransportError::InvalidTimestamp {
            value: value.to_owned(),
        })
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap()
    }

    #[test]
    fn encode_credential_omits_missing_password() {
        let credential = Credential::new("ssc", "key").unwrap();
        assert_eq!(
            encode_credential_json(&credential),
            serde_json::json!({"username": "ssc", "api_key": "key"})
        );

        let credential = credential.with_password("pw").unwrap();
        assert_eq!(
            encode_credential_json(&credential),
            serde_json::json!({"username": "ssc", "api_key": "key", "password": "pw"})
        );
    }

    #[test]
    fn decode_token_uses_minutes_lifetime() {
        let json = r#"{"token": "abc", "expires_in_minutes": 30, "message": "Token acquired"}"#;
        let TokenReply::Granted(grant) = decode_token_json_response(json, now()).unwrap() else {
            panic!("expected a grant");
        };
        assert_eq!(grant.token.as_str(), "abc");
        assert_eq!(grant.expires_in_minutes, 30);
        assert_eq!(grant.expires_at, now() + Duration::minutes(30));
        assert_eq!(grant.message.as_deref(), Some("Token acquired"));
    }

    #[test]
    fn decode_token_falls_back_to_seconds_then_default() {
        let json = r#"{"access_token": "abc", "expires_in": "3601"}"#;
        let TokenReply::Granted(grant) = decode_token_json_response(json, now()).unwrap() else {
            panic!("expected a grant");
        };
        assert_eq!(grant.expires_in_minutes, 61);

        let json = r#"{"key": "abc"}"#;
        let TokenReply::Granted(grant) = decode_token_json_response(json, now()).unwrap() else {
            panic!("expected a grant");
        };
        assert_eq!(grant.expires_in_minutes, DEFAULT_TOKEN_LIFETIME_MINUTES);
    }

    #[test]
    fn decode_token_skips_blank_aliases() {
        let json = r#"{"token": "  ", "auth_token": "real"}"#;
        let TokenReply::Granted(grant) = decode_token_json_response(json, now()).unwrap() else {
            panic!("expected a grant");
        };
        assert_eq!(grant.token.as_str(), "real");
    }

    #[test]
    fn decode_token_without_token_is_rejected_with_message() {
        let json = r#"{"status": false, "message": "Invalid API key"}"#;
        assert_eq!(
            decode_token_json_response(json, now()).unwrap(),
            TokenReply::Rejected {
                message: Some("Invalid API key".to_owned())
            }
        );
    }

    #[test]
    fn decode_token_invalid_json_is_error() {
        assert!(matches!(
            decode_token_json_response("<html>", now()),
            Err(TransportError::Json(_))
        ));
    }

    #[test]
    fn decode_check_token_accepts_rfc3339_and_naive_timestamps() {
        let json = r#"{"has_token": true, "token": "abc", "expires_at": "2025-03-01T10:00:00+01:00"}"#;
        let status = decode_check_token_json_response(json).unwrap();
        assert!(status.has_token);
        assert_eq!(status.token.unwrap().as_str(), "abc");
        assert_eq!(status.expires_at, Some(now()));

        let json = r#"{"has_token": true, "token": "abc", "expires_at": "2025-03-01T09:00:00.250"}"#;
        let status = decode_check_token_json_response(json).unwrap();
        assert_eq!(
            status.expires_at,
            Some(now() + Duration::milliseconds(250))
        );

        let json = r#"{"has_token": true, "token": "abc", "expires_at": "2025-03-01 09:00:00"}"#;
        let status = decode_check_token_json_response(json).unwrap();
        assert_eq!(status.expires_at, Some(now()));
    }

    #[test]
    fn decode_check_token_without_token() {
        let status = decode_check_token_json_response(r#"{"has_token": false}"#).unwrap();
        assert!(!status.has_token);
        assert!(status.token.is_none());
        assert!(status.expires_at.is_none());
    }

    #[test]
    fn decode_check_token_rejects_garbage_timestamp() {
        let json = r#"{"has_token": true, "token": "abc", "expires_at": "tomorrow"}"#;
        assert!(matches!(
            decode_check_token_json_response(json),
            Err(TransportError::InvalidTimestamp { .. })
        ));
    }
}
