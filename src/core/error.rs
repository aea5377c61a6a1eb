//! Core error types.

use std::fmt;

use crate::form::FormValueError;

/// Boxed error used for caller-supplied sources.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors reported by the request context.
///
/// Every variant except the body errors is written to the response before it
/// is returned, so the handler only needs to stop processing.
#[derive(Debug)]
pub enum Error {
    /// Request body is not a valid JSON document for the target type.
    Decode {
        type_name: &'static str,
        source: DecodeError,
    },

    /// Form field could not be converted into the target kind.
    Form {
        key: String,
        source: FormValueError,
    },

    /// Unexpected failure reported through `check`.
    Internal { message: String, source: BoxError },

    /// Request body exceeded the configured limit.
    BodyTooLarge { limit: usize },

    /// Request body could not be read.
    Body(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Decode { type_name, source } => {
                write!(f, "couldn't decode request type ({}): {}", type_name, source)
            }
            Error::Form { key, source } => write!(f, "invalid form value {:?}: {}", key, source),
            Error::Internal { message, source } => write!(f, "{}: {}", message, source),
            Error::BodyTooLarge { limit } => {
                write!(f, "request body exceeds limit of {} bytes", limit)
            }
            Error::Body(msg) => write!(f, "failed to read request body: {}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Decode { source, .. } => Some(source),
            Error::Form { source, .. } => Some(source),
            Error::Internal { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}

/// JSON body decoding failure.
#[derive(Debug)]
pub enum DecodeError {
    /// Body was empty or already consumed.
    Eof,
    /// Body was present but malformed.
    Json(serde_json::Error),
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::Eof => f.write_str("EOF"),
            DecodeError::Json(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for DecodeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DecodeError::Json(e) => Some(e),
            DecodeError::Eof => None,
        }
    }
}

impl From<serde_json::Error> for DecodeError {
    fn from(e: serde_json::Error) -> Self {
        DecodeError::Json(e)
    }
}

/// Result type alias for request context operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::Form {
            key: "limit".to_string(),
            source: FormValueError::Bool {
                text: "maybe".to_string(),
            },
        };
        assert_eq!(
            err.to_string(),
            "invalid form value \"limit\": invalid boolean \"maybe\""
        );

        let err = Error::Internal {
            message: "loading user".to_string(),
            source: "connection reset".into(),
        };
        assert_eq!(err.to_string(), "loading user: connection reset");

        let err = Error::BodyTooLarge { limit: 16 };
        assert_eq!(err.to_string(), "request body exceeds limit of 16 bytes");
    }

    #[test]
    fn test_decode_error_display() {
        assert_eq!(DecodeError::Eof.to_string(), "EOF");

        let json_err = serde_json::from_slice::<u32>(b"{").unwrap_err();
        let err = DecodeError::from(json_err);
        assert!(matches!(err, DecodeError::Json(_)));
        assert!(err.to_string().contains("line 1"));
    }

    #[test]
    fn test_decode_display_includes_type() {
        let err = Error::Decode {
            type_name: "app::CreateUser",
            source: DecodeError::Eof,
        };
        assert_eq!(err.to_string(), "couldn't decode request type (app::CreateUser): EOF");
    }
}
