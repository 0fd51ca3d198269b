use std::fmt;

use crate::domain::validation::ValidationError;

use phonenumber::country;

fn non_empty_trimmed(field: &'static str, value: String) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::Empty { field });
    }
    Ok(trimmed.to_owned())
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
/// TradeUnifox account username.
///
/// Invariant: non-empty after trimming.
pub struct Username(String);

impl Username {
    /// JSON field name used by the gateway (`username`).
    pub const FIELD: &'static str = "username";

    /// Create a validated [`Username`].
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        non_empty_trimmed(Self::FIELD, value.into()).map(Self)
    }

    /// Borrow the validated username.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Clone, PartialEq, Eq, Hash)]
/// TradeUnifox API key (`api_key`).
///
/// Invariant: non-empty after trimming. `Debug` output is redacted.
pub struct ApiKey(String);

impl ApiKey {
    /// Field name used by the gateway (`api_key`).
    pub const FIELD: &'static str = "api_key";

    /// Create a validated [`ApiKey`].
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        non_empty_trimmed(Self::FIELD, value.into()).map(Self)
    }

    /// Borrow the validated key.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(<redacted>)")
    }
}

#[derive(Clone, PartialEq, Eq, Hash)]
/// TradeUnifox account password.
///
/// Invariant: must not be empty (whitespace is preserved and allowed). `Debug` output is
/// redacted.
pub struct Password(String);

impl Password {
    /// JSON field name used by the gateway (`password`).
    pub const FIELD: &'static str = "password";

    /// Create a validated [`Password`].
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let value = value.into();
        if value.is_empty() {
            return Err(ValidationError::Empty { field: Self::FIELD });
        }
        Ok(Self(value))
    }

    /// Borrow the password as provided.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Password(<redacted>)")
    }
}

#[derive(Clone, PartialEq, Eq, Hash)]
/// Opaque bearer token issued by the gateway.
///
/// Invariant: non-empty after trimming. The token is sent as the password half of HTTP
/// basic auth, next to the [`Username`]. `Debug` output is redacted.
pub struct Token(String);

impl Token {
    /// Field name used when the token appears in gateway JSON (`token`).
    pub const FIELD: &'static str = "token";

    /// Create a validated [`Token`].
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        non_empty_trimmed(Self::FIELD, value.into()).map(Self)
    }

    /// Borrow the raw token.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Token(<redacted>)")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
/// WhatsApp recipient phone number as sent to the gateway (`to`).
///
/// Accepts an optional leading `+` and the separators ` `, `-`, `.`, `(` and `)`, which are
/// removed. What remains must be 7 to 15 ASCII digits (the E.164 upper bound). The stored
/// value is digits only, e.g. `919876543210`.
pub struct Recipient(String);

impl Recipient {
    /// JSON field name used by the gateway (`to`).
    pub const FIELD: &'static str = "to";

    /// Minimum number of digits accepted.
    pub const MIN_DIGITS: usize = 7;
    /// Maximum number of digits accepted.
    pub const MAX_DIGITS: usize = 15;

    /// Create a validated recipient from a numeric-looking string.
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let value = value.into();
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::Empty { field: Self::FIELD });
        }

        let without_plus = trimmed.strip_prefix('+').unwrap_or(trimmed);
        let digits = without_plus
            .chars()
            .filter(|ch| !matches!(ch, ' ' | '-' | '.' | '(' | ')'))
            .collect::<String>();

        let valid = (Self::MIN_DIGITS..=Self::MAX_DIGITS).contains(&digits.len())
            && digits.bytes().all(|b| b.is_ascii_digit());
        if !valid {
            return Err(ValidationError::InvalidRecipient {
                input: trimmed.to_owned(),
            });
        }

        Ok(Self(digits))
    }

    /// Digits-only value as sent to the gateway.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<PhoneNumber> for Recipient {
    /// Convert a parsed phone number to its E.164 digits.
    fn from(value: PhoneNumber) -> Self {
        Self(value.e164.trim_start_matches('+').to_owned())
    }
}

impl fmt::Display for Recipient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone)]
/// Parsed phone number with an E.164 representation.
///
/// Use this when callers have local-format numbers and know the default region. Equality,
/// ordering, and hashing are based on the E.164 form.
pub struct PhoneNumber {
    raw: String,
    e164: String,
    parsed: phonenumber::PhoneNumber,
}

impl PhoneNumber {
    /// JSON field name used by the gateway (`to`).
    pub const FIELD: &'static str = "to";

    /// Parse and normalize a phone number into E.164.
    ///
    /// `default_region` is used when the input does not contain an explicit country prefix.
    pub fn parse(
        default_region: Option<country::Id>,
        input: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        let input = input.into();
        let raw = input.trim().to_owned();
        if raw.is_empty() {
            return Err(ValidationError::Empty { field: Self::FIELD });
        }

        let parsed = phonenumber::parse(default_region, &raw)
            .map_err(|_| ValidationError::InvalidRecipient { input: raw.clone() })?;

        let e164 = phonenumber::format(&parsed)
            .mode(phonenumber::Mode::E164)
            .to_string();

        Ok(Self { raw, e164, parsed })
    }

    /// Raw input after trimming.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Normalized E.164 representation.
    pub fn e164(&self) -> &str {
        &self.e164
    }

    /// The parsed phone number from the `phonenumber` crate.
    pub fn parsed(&self) -> &phonenumber::PhoneNumber {
        &self.parsed
    }
}

impl PartialEq for PhoneNumber {
    fn eq(&self, other: &Self) -> bool {
        self.e164 == other.e164
    }
}

impl Eq for PhoneNumber {}

impl std::hash::Hash for PhoneNumber {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.e164.hash(state);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
/// Outbound message text (`message`).
///
/// Invariant: non-empty after trimming. The original value (including whitespace) is preserved.
pub struct MessageBody(String);

impl MessageBody {
    /// JSON field name used by the gateway (`message`).
    pub const FIELD: &'static str = "message";

    /// Create validated message text.
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(ValidationError::Empty { field: Self::FIELD });
        }
        Ok(Self(value))
    }

    /// Borrow the message text as provided.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
/// Gateway message id, for sent and received messages alike.
///
/// Invariant: non-empty after trimming.
pub struct MessageId(String);

impl MessageId {
    /// Field name used by the gateway (`message_id`).
    pub const FIELD: &'static str = "message_id";

    /// Create a validated [`MessageId`].
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        non_empty_trimmed(Self::FIELD, value.into()).map(Self)
    }

    /// Borrow the validated id.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
/// Maximum number of messages requested per poll (`limit`).
///
/// Invariant: `1..=100`.
pub struct PollLimit(u32);

impl PollLimit {
    /// Query parameter name used by the gateway (`limit`).
    pub const FIELD: &'static str = "limit";

    /// Minimum allowed limit.
    pub const MIN: u32 = 1;
    /// Maximum allowed limit.
    pub const MAX: u32 = 100;

    /// Create a validated poll limit.
    pub fn new(value: u32) -> Result<Self, ValidationError> {
        if !(Self::MIN..=Self::MAX).contains(&value) {
            return Err(ValidationError::OutOfRange {
                field: Self::FIELD,
                min: Self::MIN,
                max: Self::MAX,
                actual: value,
            });
        }
        Ok(Self(value))
    }

    /// Get the underlying limit.
    pub fn value(self) -> u32 {
        self.0
    }
}

impl Default for PollLimit {
    fn default() -> Self {
        Self(10)
    }
}
