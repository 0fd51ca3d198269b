//! Domain layer: strong types with validation and invariants (no I/O).

mod request;
mod response;
mod validation;
mod value;

pub use request::{
    BatchOrder, Credential, DEFAULT_POLL_INTERVAL, OutboundMessage, PollOptions, Session,
};
pub use response::{
    ConnectionReport, InboundBatch, InboundMessage, MarkReadResult, SendReceipt, TokenGrant,
    TokenInfo, TokenStatus,
};
pub use validation::ValidationError;
pub use value::{
    ApiKey, MessageBody, MessageId, Password, PhoneNumber, PollLimit, Recipient, Token, Username,
};

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use super::*;

    #[test]
    fn credential_rejects_empty_parts() {
        assert!(matches!(
            Credential::new("  ", "key"),
            Err(ValidationError::Empty {
                field: Username::FIELD
            })
        ));
        assert!(matches!(
            Credential::new("ssc", ""),
            Err(ValidationError::Empty {
                field: ApiKey::FIELD
            })
        ));
        assert!(matches!(
            Credential::new("ssc", "key").unwrap().with_password(""),
            Err(ValidationError::Empty {
                field: Password::FIELD
            })
        ));
    }

    #[test]
    fn credential_builds_session_with_its_own_username_and_key() {
        let credential = Credential::new("ssc", "key").unwrap();
        assert!(credential.password().is_none());

        let session = credential.session(Token::new("tok").unwrap());
        assert_eq!(session.username().as_str(), "ssc");
        assert_eq!(session.api_key().as_str(), "key");
        assert_eq!(session.token().as_str(), "tok");
    }

    #[test]
    fn session_from_parts_rejects_empty_token() {
        assert!(matches!(
            Session::from_parts("ssc", " ", "key"),
            Err(ValidationError::Empty {
                field: Token::FIELD
            })
        ));
    }

    #[test]
    fn outbound_message_validates_both_parts() {
        let message = OutboundMessage::parse("919876543210", "Hello").unwrap();
        assert_eq!(message.recipient().as_str(), "919876543210");
        assert_eq!(message.body().as_str(), "Hello");

        assert!(matches!(
            OutboundMessage::parse("", "Hello"),
            Err(ValidationError::Empty {
                field: Recipient::FIELD
            })
        ));
        assert!(matches!(
            OutboundMessage::parse("919876543210", " "),
            Err(ValidationError::Empty {
                field: MessageBody::FIELD
            })
        ));
    }

    #[test]
    fn poll_options_defaults() {
        let options = PollOptions::default();
        assert_eq!(options.interval, DEFAULT_POLL_INTERVAL);
        assert_eq!(options.limit.value(), 10);
        assert!(!options.mark_as_read);
        assert_eq!(options.order, BatchOrder::NewestFirst);
    }

    #[test]
    fn token_status_expiry_helpers() {
        let now = Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap();
        let status = TokenStatus {
            has_token: true,
            token: Some(Token::new("tok").unwrap()),
            expires_at: Some(now + Duration::minutes(30)),
        };
        assert_eq!(status.minutes_until_expiry(now), Some(30));
        assert!(status.is_valid_at(now));

        let later = now + Duration::hours(1);
        assert_eq!(status.minutes_until_expiry(later), Some(0));
        assert!(!status.is_valid_at(later));

        let unknown_expiry = TokenStatus {
            expires_at: None,
            ..status
        };
        assert_eq!(unknown_expiry.minutes_until_expiry(now), None);
        assert!(!unknown_expiry.is_valid_at(now));
    }

    #[test]
    fn connection_report_reachability() {
        let report = ConnectionReport {
            base_url: "https://example.invalid/api".to_owned(),
            status: 204,
            body_preview: String::new(),
        };
        assert!(report.is_reachable());
        assert!(
            !ConnectionReport {
                status: 502,
                ..report
            }
            .is_reachable()
        );
    }
}
