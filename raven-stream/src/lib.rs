//! # raven-stream
//!
//! Turns the byte stream of a RAVEn-style energy gateway into discrete XML
//! fragments and multiplexes them between command replies and unsolicited
//! events.
//!
//! The gateway speaks line-oriented XML fragments with no envelope, no
//! request ids and no acknowledgement for most commands. This crate layers:
//!
//! - [`FragmentAssembler`]: incremental framing of fragments out of
//!   arbitrarily chunked bytes, with resynchronization after garbage
//! - [`FragmentReader`]: the async read side over any [`tokio::io::AsyncRead`]
//! - [`CommandCorrelator`]: the single outstanding command slot
//! - [`EventRouter`]: reply/event/warning dispatch and subscriber fan-out
//! - [`DeviceSession`]: the read loop plus the command API
//!
//! Decoding fragment contents into typed values lives in `raven-parser` and
//! the command catalogue in `raven-api`.

pub mod assembler;
pub mod command;
pub mod config;
pub mod correlator;
pub mod error;
pub mod logging;
pub mod reader;
pub mod router;
pub mod session;
pub mod subscription;

pub use assembler::{FragmentAssembler, DEFAULT_MAX_BUFFER_SIZE};
pub use command::CommandRequest;
pub use config::{SessionConfig, UnmatchedReplyPolicy};
pub use correlator::{CommandCorrelator, PendingReply};
pub use error::{CloseReason, FramingError, StreamError, StreamResult};
pub use logging::{init_logging, init_logging_from_env, LoggingError, LoggingMode};
pub use reader::{Assembled, FragmentReader};
pub use router::{EventRouter, RouteOutcome};
pub use session::{DeviceSession, SessionState};
pub use subscription::{EventHandler, EventSubscription, HandlerError, SubscriptionId};

pub use raven_parser::Fragment;
