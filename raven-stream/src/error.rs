//! Error types for the raven-stream crate.

use std::time::Duration;

use raven_parser::ParseError;

/// Why a session stopped reading from the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// `close()` was called or the session was dropped
    Requested,
    /// The transport reported end of stream
    EndOfStream,
    /// The transport failed
    Io(String),
}

impl std::fmt::Display for CloseReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CloseReason::Requested => f.write_str("closed by request"),
            CloseReason::EndOfStream => f.write_str("end of stream"),
            CloseReason::Io(message) => write!(f, "I/O failure: {message}"),
        }
    }
}

/// Byte-level problems found while splitting the stream into fragments.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FramingError {
    /// A closing tag arrived with no element open
    #[error("Unexpected closing tag </{name}> at offset {offset}")]
    UnexpectedClose { name: String, offset: usize },

    /// A closing tag does not match the innermost open element
    #[error("Mismatched closing tag at offset {offset}: expected </{expected}>, found </{found}>")]
    MismatchedClose {
        expected: String,
        found: String,
        offset: usize,
    },

    /// Something other than whitespace or a tag between fragments
    #[error("Unexpected byte 0x{byte:02X} at offset {offset}")]
    UnexpectedByte { byte: u8, offset: usize },

    /// Tags balanced but the fragment text did not parse
    #[error("Invalid fragment: {0}")]
    InvalidFragment(#[from] ParseError),

    /// An incomplete fragment grew past the configured limit
    #[error("Buffered {buffered} bytes without completing a fragment (limit {limit})")]
    BufferOverflow { buffered: usize, limit: usize },
}

/// Errors that can occur in a device session.
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    /// The byte stream could not be framed
    #[error("Framing error: {0}")]
    Framing(#[from] FramingError),

    /// A reply-bearing command was issued while another was still pending
    #[error("Command '{rejected}' rejected: '{pending}' is still awaiting its reply")]
    Concurrency { pending: String, rejected: String },

    /// No reply arrived before the deadline
    #[error("Command '{command}' timed out after {timeout:?}")]
    Timeout { command: String, timeout: Duration },

    /// The session closed while a command was pending
    #[error("Command cancelled: {0}")]
    Cancelled(CloseReason),

    /// No fragment boundary was found while synchronizing
    #[error("Stream did not synchronize within {0:?}")]
    SynchronizationTimeout(Duration),

    /// The gateway answered a command with a warning
    #[error("Device warning: {0}")]
    DeviceWarning(String),

    /// Invalid configuration or command description
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Transport failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for session operations.
pub type StreamResult<T> = Result<T, StreamError>;
