use serde::Deserialize;
use serde::de::Error as DeError;

/// Scalar returned by the gateway as either JSON string or JSON number (ids, codes, counts).
///
/// For numbers, the raw JSON token is preserved to avoid formatting drift
/// (`10.00` remains `"10.00"` instead of becoming `"10.0"`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportScalar(String);

impl TransportScalar {
    pub fn into_string(self) -> String {
        self.0
    }

    /// Non-negative integer value, if the scalar holds one (surrounding whitespace ignored).
    pub fn to_u64(&self) -> Option<u64> {
        self.0.trim().parse::<u64>().ok()
    }
}

impl<'de> Deserialize<'de> for TransportScalar {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw: Box<serde_json::value::RawValue> = Deserialize::deserialize(deserializer)?;
        let token = raw.get();

        match token.as_bytes().first().copied() {
            Some(b'"') => {
                let parsed = serde_json::from_str::<String>(token).map_err(D::Error::custom)?;
                Ok(Self(parsed))
            }
            Some(b'-' | b'0'..=b'9') => Ok(Self(token.to_owned())),
            _ => Err(D::Error::custom(
                "expected scalar field to be JSON string or number",
            )),
        }
    }
}
