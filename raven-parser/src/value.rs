//! Schema-driven decoding into generic domain values
//!
//! Typed reply structs cover the known catalogue. For fragments outside it,
//! or for tooling that only needs a few fields, a schema of
//! `(field name, FieldKind)` pairs decodes straight into [`DomainValue`]s.

use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::codec::{self, Price};
use crate::currency::CurrencyLookup;
use crate::decoded::{Decoded, FieldDecoder};
use crate::error::{DecodeError, DecodeResult};
use crate::fragment::Fragment;

/// Generic decoded field value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DomainValue {
    Unsigned(u64),
    Signed(i64),
    Decimal(Decimal),
    Price(Price),
    /// Validated enumeration code
    Code(String),
    Text(String),
    Bytes(Vec<u8>),
}

impl fmt::Display for DomainValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DomainValue::Unsigned(value) => write!(f, "{value}"),
            DomainValue::Signed(value) => write!(f, "{value}"),
            DomainValue::Decimal(value) => write!(f, "{value}"),
            DomainValue::Price(price) => write!(f, "{price}"),
            DomainValue::Code(code) | DomainValue::Text(code) => f.write_str(code),
            DomainValue::Bytes(bytes) => write!(f, "0x{}", hex::encode_upper(bytes)),
        }
    }
}

/// How one field of a fragment should be decoded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Hex or decimal integer
    Unsigned,
    /// Two's complement hex of the given width
    Signed { width_bits: u32 },
    /// Fixed-point value with a constant number of fraction digits
    Fixed { exponent: u32 },
    /// Reading scaled by the fragment's `Multiplier` and `Divisor`
    Scaled,
    /// Price scaled by the named trailing-digits field, in the named currency
    Price {
        trailing_digits_field: &'static str,
        currency_field: &'static str,
    },
    /// One of a closed set of codes
    Code {
        kind: &'static str,
        codes: &'static [&'static str],
    },
    Text,
    Hex,
}

/// Decode the listed fields of `fragment`
///
/// Absent fields are skipped. Fields that fail to decode are reported in
/// the returned error list and omitted from the values.
pub fn decode_fields(
    fragment: &Fragment,
    schema: &[(&str, FieldKind)],
    currencies: &dyn CurrencyLookup,
) -> Decoded<Vec<(String, DomainValue)>> {
    let mut decoder = FieldDecoder::new(fragment);
    let mut values = Vec::new();

    for (name, kind) in schema {
        if let Some(value) = decode_field(&mut decoder, name, *kind, currencies) {
            values.push((name.to_string(), value));
        }
    }

    decoder.finish(values)
}

fn decode_field(
    decoder: &mut FieldDecoder<'_>,
    name: &str,
    kind: FieldKind,
    currencies: &dyn CurrencyLookup,
) -> Option<DomainValue> {
    match kind {
        FieldKind::Unsigned => decoder.integer(name).map(DomainValue::Unsigned),
        FieldKind::Signed { width_bits } => {
            decoder.signed(name, width_bits).map(DomainValue::Signed)
        }
        FieldKind::Fixed { exponent } => {
            let raw = decoder.signed(name, 64)?;
            let result = codec::decode_fixed(raw, exponent);
            decoder.check(name, result).map(DomainValue::Decimal)
        }
        FieldKind::Scaled => decoder
            .reading(name)
            .map(|reading| DomainValue::Decimal(reading.value)),
        FieldKind::Price {
            trailing_digits_field,
            currency_field,
        } => decoder
            .price(name, trailing_digits_field, currency_field, currencies)
            .map(DomainValue::Price),
        FieldKind::Code { kind, codes } => {
            let text = decoder.text(name)?;
            let result = check_code(&text, kind, codes);
            decoder.check(name, result).map(|()| DomainValue::Code(text))
        }
        FieldKind::Text => decoder.text(name).map(DomainValue::Text),
        FieldKind::Hex => decoder.hex_bytes(name).map(DomainValue::Bytes),
    }
}

fn check_code(text: &str, kind: &'static str, codes: &[&str]) -> DecodeResult<()> {
    if codes.contains(&text) {
        Ok(())
    } else {
        Err(DecodeError::UnknownValue {
            kind,
            value: text.to_string(),
        })
    }
}
