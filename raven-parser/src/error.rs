//! Error types for fragment parsing and field decoding

use thiserror::Error;

/// Errors that can occur while turning fragment text into a [`Fragment`](crate::Fragment)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// The underlying XML reader rejected the input
    #[error("XML error at byte {position}: {message}")]
    Xml { position: usize, message: String },

    /// The markup was well-formed but not shaped like a single fragment
    #[error("Invalid fragment structure: {0}")]
    InvalidStructure(String),

    /// Fragment bytes were not valid UTF-8
    #[error("Fragment is not valid UTF-8: {0}")]
    Encoding(String),
}

/// Result type alias for parsing operations
pub type ParseResult<T> = Result<T, ParseError>;

/// Errors produced by the field value decoders
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The raw text does not have the expected shape
    #[error("Invalid value '{value}': {reason}")]
    Format { value: String, reason: String },

    /// The raw text is well-formed but not a known code for this enumeration
    #[error("Unknown {kind} value '{value}'")]
    UnknownValue { kind: &'static str, value: String },

    /// The currency lookup has no entry for this numeric code
    #[error("Unknown currency code {0}")]
    UnknownCurrency(u16),
}

impl DecodeError {
    pub(crate) fn format(value: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Format {
            value: value.into(),
            reason: reason.into(),
        }
    }
}

/// Result type alias for decoding operations
pub type DecodeResult<T> = Result<T, DecodeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_display() {
        let error = ParseError::Xml {
            position: 12,
            message: "ill-formed document".to_string(),
        };
        assert_eq!(error.to_string(), "XML error at byte 12: ill-formed document");

        let error = ParseError::InvalidStructure("no root element".to_string());
        assert_eq!(error.to_string(), "Invalid fragment structure: no root element");
    }

    #[test]
    fn test_decode_error_display() {
        let error = DecodeError::format("0xZZ", "expected hexadecimal digits");
        assert_eq!(
            error.to_string(),
            "Invalid value '0xZZ': expected hexadecimal digits"
        );

        let error = DecodeError::UnknownValue {
            kind: "meter type",
            value: "steam".to_string(),
        };
        assert_eq!(error.to_string(), "Unknown meter type value 'steam'");

        assert_eq!(
            DecodeError::UnknownCurrency(999).to_string(),
            "Unknown currency code 999"
        );
    }
}
