use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    Empty {
        field: &'static str,
    },
    InvalidRecipient {
        input: String,
    },
    OutOfRange {
        field: &'static str,
        min: u32,
        max: u32,
        actual: u32,
    },
    InvalidBaseUrl {
        input: String,
    },
    MissingHandler,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty { field } => write!(f, "{field} must not be empty"),
            Self::InvalidRecipient { input } => write!(f, "invalid recipient: {input}"),
            Self::OutOfRange {
                field,
                min,
                max,
                actual,
            } => {
                write!(
                    f,
                    "{field} out of range: {actual} (expected {min}..={max})"
                )
            }
            Self::InvalidBaseUrl { input } => write!(f, "invalid base url: {input}"),
            Self::MissingHandler => write!(f, "no message handler registered"),
        }
    }
}

impl std::error::Error for ValidationError {}
