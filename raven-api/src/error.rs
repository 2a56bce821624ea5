use std::time::Duration;

use raven_parser::FieldError;
use raven_stream::StreamError;
use thiserror::Error;

/// Errors surfaced by the typed gateway API
#[derive(Debug, Error)]
pub enum ApiError {
    /// The protocol engine failed: framing, concurrency, cancellation,
    /// device warnings or transport I/O
    #[error(transparent)]
    Stream(StreamError),

    /// The gateway never answered within the deadline
    #[error("No reply to '{command}' within {timeout:?}")]
    NoReply { command: String, timeout: Duration },

    /// A reply arrived but a field could not be decoded (strict mode only)
    #[error("Invalid reply field {0}")]
    Decode(#[from] FieldError),

    /// A command argument cannot be represented on the wire
    #[error("Invalid argument '{argument}': {reason}")]
    InvalidArgument {
        argument: &'static str,
        reason: String,
    },

    /// The command could not be serialized
    #[error("Failed to encode command: {0}")]
    Encode(String),
}

impl ApiError {
    pub fn invalid_argument(argument: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            argument,
            reason: reason.into(),
        }
    }
}

impl From<StreamError> for ApiError {
    fn from(error: StreamError) -> Self {
        match error {
            StreamError::Timeout { command, timeout } => ApiError::NoReply { command, timeout },
            other => ApiError::Stream(other),
        }
    }
}

impl From<quick_xml::Error> for ApiError {
    fn from(error: quick_xml::Error) -> Self {
        ApiError::Encode(error.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use raven_parser::DecodeError;
    use raven_stream::CloseReason;

    #[test]
    fn test_timeout_becomes_no_reply() {
        let error: ApiError = StreamError::Timeout {
            command: "get_time".to_string(),
            timeout: Duration::from_secs(5),
        }
        .into();
        assert!(matches!(error, ApiError::NoReply { ref command, .. } if command == "get_time"));
        assert_eq!(error.to_string(), "No reply to 'get_time' within 5s");
    }

    #[test]
    fn test_other_stream_errors_pass_through() {
        let error: ApiError = StreamError::Cancelled(CloseReason::EndOfStream).into();
        assert!(matches!(error, ApiError::Stream(StreamError::Cancelled(_))));
        assert_eq!(
            error.to_string(),
            StreamError::Cancelled(CloseReason::EndOfStream).to_string()
        );
    }

    #[test]
    fn test_decode_error_display() {
        let error: ApiError = FieldError {
            field: "Currency".to_string(),
            error: DecodeError::UnknownCurrency(999),
        }
        .into();
        assert!(error.to_string().starts_with("Invalid reply field Currency: "));
    }
}
