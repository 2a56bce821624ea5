//! # raven-api
//!
//! Typed access to RAVEn-style energy gateways: every command the gateway
//! understands, the reports it answers with, and a [`RavenDevice`] facade
//! that runs them over a [`raven_stream::DeviceSession`].
//!
//! ```text
//! raven-api     (command catalogue, typed responses, RavenDevice)
//!     ↓
//! raven-stream  (framing, correlation, event fan-out)
//!     ↓
//! raven-parser  (fragments, value decoding)
//! ```
//!
//! Commands can also be used without the facade:
//!
//! ```rust
//! use raven_api::operations::GetMeterList;
//! use raven_api::RavenCommand;
//!
//! let bytes = GetMeterList::default().encode()?;
//! assert_eq!(&bytes[..], b"<Command><Name>get_meter_list</Name></Command>");
//! # Ok::<(), raven_api::ApiError>(())
//! ```

#[macro_use]
mod macros;

pub mod catalogue;
pub mod command;
pub mod device;
pub mod error;
pub mod events;
pub mod operations;
pub mod responses;

pub use command::{encode_command, Arguments, FromFields, HexId, RavenCommand, RavenQuery};
pub use device::RavenDevice;
pub use error::{ApiError, Result};
pub use events::{DeviceEvents, RavenEvent};

pub use raven_parser::{Decoded, FieldError, Reading};
pub use raven_stream::{init_logging, init_logging_from_env, LoggingMode, SessionConfig};
