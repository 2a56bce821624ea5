//! Command encoding and the traits every catalogue entry implements
//!
//! Commands go to the gateway as a bare element with no XML declaration:
//!
//! ```text
//! <Command><Name>get_current_price</Name><MeterMacId>0xFEDCBA9876543210</MeterMacId></Command>
//! ```
//!
//! Arguments are written in insertion order and their text is escaped.

use std::fmt;
use std::str::FromStr;

use bytes::Bytes;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use raven_parser::codec::decode_hex_bytes;
use raven_parser::{CurrencyLookup, DecodeError, Decoded, FieldDecoder, Fragment};
use raven_stream::CommandRequest;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::Result;

/// Opaque identifier the gateway reports as `0x`-prefixed hex, such as a
/// MAC id, install code or short address
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HexId(Vec<u8>);

impl HexId {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl From<Vec<u8>> for HexId {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl<const N: usize> From<[u8; N]> for HexId {
    fn from(bytes: [u8; N]) -> Self {
        Self(bytes.to_vec())
    }
}

impl fmt::Display for HexId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode_upper(&self.0))
    }
}

impl FromStr for HexId {
    type Err = DecodeError;

    fn from_str(text: &str) -> std::result::Result<Self, Self::Err> {
        decode_hex_bytes(text).map(Self)
    }
}

impl Serialize for HexId {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for HexId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

/// `Y`/`N` wire flag
pub fn flag(value: bool) -> &'static str {
    if value {
        "Y"
    } else {
        "N"
    }
}

/// `0x`-prefixed uppercase hex padded to `width` digits
pub fn hex_number(value: u64, width: usize) -> String {
    format!("0x{value:0width$X}")
}

/// Ordered command arguments
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Arguments {
    entries: Vec<(&'static str, String)>,
}

impl Arguments {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.entries.push((name, value.into()));
        self
    }

    pub fn with_optional<V: Into<String>>(self, name: &'static str, value: Option<V>) -> Self {
        match value {
            Some(value) => self.with(name, value),
            None => self,
        }
    }

    /// `MeterMacId`, when targeting a specific meter
    pub fn meter(self, meter: Option<&HexId>) -> Self {
        self.with_optional("MeterMacId", meter.map(ToString::to_string))
    }

    /// `Refresh`, asking the gateway to read the meter instead of its cache
    pub fn refresh(self, refresh: Option<bool>) -> Self {
        self.with_optional("Refresh", refresh.map(flag))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &str)> {
        self.entries.iter().map(|(name, value)| (*name, value.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Serialize one command
pub fn encode_command(name: &str, arguments: &Arguments) -> Result<Bytes> {
    let mut writer = Writer::new(Vec::new());
    writer.write_event(Event::Start(BytesStart::new("Command")))?;
    write_element(&mut writer, "Name", name)?;
    for (key, value) in arguments.iter() {
        write_element(&mut writer, key, value)?;
    }
    writer.write_event(Event::End(BytesEnd::new("Command")))?;
    Ok(Bytes::from(writer.into_inner()))
}

fn write_element(writer: &mut Writer<Vec<u8>>, name: &str, text: &str) -> Result<()> {
    writer.write_event(Event::Start(BytesStart::new(name)))?;
    writer.write_event(Event::Text(BytesText::new(text)))?;
    writer.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}

/// A typed value decoded from the fields of one fragment root
pub trait FromFields: Sized {
    const ROOT: &'static str;

    fn from_fields(fields: &mut FieldDecoder<'_>, currencies: &dyn CurrencyLookup) -> Self;

    fn decode(fragment: &Fragment, currencies: &dyn CurrencyLookup) -> Decoded<Self> {
        let mut fields = FieldDecoder::new(fragment);
        let value = Self::from_fields(&mut fields, currencies);
        fields.finish(value)
    }
}

/// A gateway command
pub trait RavenCommand {
    /// Value of the `Name` element
    const NAME: &'static str;

    fn arguments(&self) -> Result<Arguments>;

    fn encode(&self) -> Result<Bytes> {
        encode_command(Self::NAME, &self.arguments()?)
    }

    /// Request for a command the gateway does not answer
    fn request(&self) -> Result<CommandRequest> {
        Ok(CommandRequest::without_reply(Self::NAME, self.encode()?))
    }
}

/// A command answered by a single reply fragment
pub trait RavenQuery: RavenCommand {
    type Response: FromFields;

    const REPLY_ROOT: &'static str = <Self::Response as FromFields>::ROOT;

    fn query_request(&self) -> Result<CommandRequest> {
        Ok(CommandRequest::new(Self::NAME, self.encode()?, [Self::REPLY_ROOT]))
    }

    fn decode(fragment: &Fragment, currencies: &dyn CurrencyLookup) -> Decoded<Self::Response> {
        <Self::Response as FromFields>::decode(fragment, currencies)
    }
}
