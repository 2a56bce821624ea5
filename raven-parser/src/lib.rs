//! # raven-parser
//!
//! Parsing and decoding for the fragments a RAVEn-style energy gateway
//! writes to its serial port. This crate is runtime-free: it turns the text
//! of one complete fragment into a [`Fragment`], and turns fragment fields
//! into typed values.
//!
//! ## Usage
//!
//! ```rust
//! use raven_parser::{FieldDecoder, Fragment, IsoCurrencyTable};
//!
//! let fragment = Fragment::from_xml(
//!     "<PriceCluster><Price>0x000000c8</Price><Currency>0x0348</Currency>\
//!      <TrailingDigits>0x03</TrailingDigits></PriceCluster>",
//! )?;
//!
//! let currencies = IsoCurrencyTable::default();
//! let mut fields = FieldDecoder::new(&fragment);
//! let price = fields.price("Price", "TrailingDigits", "Currency", &currencies);
//! assert_eq!(price.map(|p| p.to_string()).as_deref(), Some("0.20 USD"));
//! # Ok::<(), raven_parser::ParseError>(())
//! ```

pub mod codec;
pub mod currency;
pub mod decoded;
pub mod enums;
pub mod error;
pub mod fragment;
pub mod value;

pub use codec::{DateCode, DisplayFormat, Price};
pub use currency::{Currency, CurrencyLookup, IsoCurrencyTable};
pub use decoded::{Decoded, FieldDecoder, FieldError, Reading};
pub use enums::{
    ConnectionState, DataStatus, IntervalChannel, IntervalPeriod, MessageQueue, MeterType,
    ScheduledEvent,
};
pub use error::{DecodeError, DecodeResult, ParseError, ParseResult};
pub use fragment::{Field, FieldValue, Fragment};
pub use value::{decode_fields, DomainValue, FieldKind};
