//! Field value decoders
//!
//! Every decoder is a pure function of its inputs. Numeric fields arrive as
//! hexadecimal text (`0x0000001A`), and scaled quantities carry their own
//! multiplier and divisor, so all arithmetic is done on [`Decimal`] to keep
//! results exact.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::currency::{Currency, CurrencyLookup};
use crate::error::{DecodeError, DecodeResult};

/// Raw timestamp value the gateway uses for "not set"
pub const UNSET_TIMESTAMP: u64 = 0x00FF_FFFF;

fn hex_digits(text: &str) -> DecodeResult<&str> {
    let trimmed = text.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);

    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(DecodeError::format(text, "expected hexadecimal digits"));
    }
    Ok(digits)
}

/// Decode hexadecimal text, with or without a `0x` prefix
///
/// ```
/// use raven_parser::codec::decode_unsigned;
///
/// assert_eq!(decode_unsigned("0x0000001A").unwrap(), 26);
/// assert_eq!(decode_unsigned("ff").unwrap(), 255);
/// assert!(decode_unsigned("0x").is_err());
/// ```
pub fn decode_unsigned(text: &str) -> DecodeResult<u64> {
    let digits = hex_digits(text)?;
    u64::from_str_radix(digits, 16)
        .map_err(|_| DecodeError::format(text, "value does not fit in 64 bits"))
}

/// Decode hexadecimal text as a two's complement integer of `width_bits`
///
/// Fails when the value needs more than `width_bits` bits. Leading zero
/// digits are allowed.
pub fn decode_signed(text: &str, width_bits: u32) -> DecodeResult<i64> {
    if width_bits == 0 || width_bits > 64 {
        return Err(DecodeError::format(
            text,
            format!("unsupported integer width {width_bits}"),
        ));
    }

    let raw = decode_unsigned(text)?;
    if width_bits < 64 && raw >> width_bits != 0 {
        return Err(DecodeError::format(
            text,
            format!("value exceeds {width_bits} bits"),
        ));
    }

    let sign_bit = 1u64 << (width_bits - 1);
    if raw & sign_bit == 0 {
        Ok(raw as i64)
    } else {
        Ok((i128::from(raw) - (1i128 << width_bits)) as i64)
    }
}

/// Decode a reading that the gateway sends as a 32-bit two's complement
/// value when it fits in 32 bits, and as a plain unsigned value otherwise
pub fn decode_reading(text: &str) -> DecodeResult<i64> {
    let raw = decode_unsigned(text)?;
    if raw <= u64::from(u32::MAX) {
        return decode_signed(text, 32);
    }
    i64::try_from(raw).map_err(|_| DecodeError::format(text, "value does not fit in 63 bits"))
}

/// Decode an integer written either as `0x`-prefixed hex or plain decimal
pub fn decode_integer(text: &str) -> DecodeResult<u64> {
    let trimmed = text.trim();
    if trimmed.starts_with("0x") || trimmed.starts_with("0X") {
        return decode_unsigned(trimmed);
    }
    if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return Err(DecodeError::format(text, "expected a decimal or 0x-prefixed integer"));
    }
    trimmed
        .parse()
        .map_err(|_| DecodeError::format(text, "value does not fit in 64 bits"))
}

/// `Y`/`N` flag
pub fn decode_bool(text: &str) -> DecodeResult<bool> {
    match text.trim() {
        "Y" => Ok(true),
        "N" => Ok(false),
        _ => Err(DecodeError::format(text, "expected 'Y' or 'N'")),
    }
}

/// Hexadecimal byte string such as a MAC id or install code
pub fn decode_hex_bytes(text: &str) -> DecodeResult<Vec<u8>> {
    let digits = hex_digits(text)?;
    hex::decode(digits).map_err(|e| DecodeError::format(text, e.to_string()))
}

/// Exact value of `raw * multiplier / divisor`
///
/// A multiplier or divisor of zero is treated as one; the gateway sends zero
/// when a meter does not publish formatting attributes.
pub fn decode_scaled(raw: i64, multiplier: u64, divisor: u64) -> DecodeResult<Decimal> {
    let multiplier = multiplier.max(1);
    let divisor = divisor.max(1);

    let product = Decimal::from(raw)
        .checked_mul(Decimal::from(multiplier))
        .ok_or_else(|| DecodeError::format(raw.to_string(), "scaled value overflows"))?;
    product
        .checked_div(Decimal::from(divisor))
        .ok_or_else(|| DecodeError::format(raw.to_string(), "scaled value overflows"))
}

/// `raw / 10^exponent`
pub fn decode_fixed(raw: i64, exponent: u32) -> DecodeResult<Decimal> {
    Decimal::try_new(raw, exponent)
        .map_err(|e| DecodeError::format(raw.to_string(), e.to_string()))
}

/// Round to `digits` fraction digits, halves away from zero
pub fn round_to(value: Decimal, digits: u32) -> Decimal {
    value.round_dp_with_strategy(digits, RoundingStrategy::MidpointAwayFromZero)
}

/// Decode a price and attach its currency
///
/// The amount keeps at least as many fraction digits as the currency's
/// minor unit; extra precision reported by the meter is preserved.
pub fn decode_price(
    raw: i64,
    multiplier: u64,
    divisor: u64,
    currency_code: u16,
    currencies: &dyn CurrencyLookup,
) -> DecodeResult<Price> {
    let currency = currencies
        .lookup(currency_code)
        .ok_or(DecodeError::UnknownCurrency(currency_code))?;
    let amount = decode_scaled(raw, multiplier, divisor)?;
    Ok(Price::new(amount, currency))
}

/// Map a raw code through a table of known codes
///
/// ```
/// use raven_parser::codec::decode_enum;
///
/// let table = [("electric", 1u8), ("gas", 2)];
/// assert_eq!(decode_enum("gas", "meter type", &table).unwrap(), 2);
/// assert!(decode_enum("steam", "meter type", &table).is_err());
/// ```
pub fn decode_enum<K, T>(raw: K, kind: &'static str, table: &[(K, T)]) -> DecodeResult<T>
where
    K: PartialEq + fmt::Display,
    T: Copy,
{
    table
        .iter()
        .find(|(code, _)| *code == raw)
        .map(|(_, value)| *value)
        .ok_or_else(|| DecodeError::UnknownValue {
            kind,
            value: raw.to_string(),
        })
}

fn epoch() -> Option<NaiveDateTime> {
    NaiveDate::from_ymd_opt(2000, 1, 1).and_then(|date| date.and_hms_opt(0, 0, 0))
}

/// Seconds since 2000-01-01 00:00:00, `None` for the unset sentinel
pub fn decode_timestamp(text: &str) -> DecodeResult<Option<NaiveDateTime>> {
    let seconds = decode_integer(text)?;
    if seconds == UNSET_TIMESTAMP {
        return Ok(None);
    }
    let seconds = u32::try_from(seconds)
        .map_err(|_| DecodeError::format(text, "timestamp exceeds 32 bits"))?;

    epoch()
        .and_then(|epoch| epoch.checked_add_signed(chrono::Duration::seconds(i64::from(seconds))))
        .map(Some)
        .ok_or_else(|| DecodeError::format(text, "timestamp out of range"))
}

/// Like [`decode_timestamp`] for fields the gateway reports in UTC
pub fn decode_utc_timestamp(text: &str) -> DecodeResult<Option<DateTime<Utc>>> {
    Ok(decode_timestamp(text)?.map(|naive| Utc.from_utc_datetime(&naive)))
}

/// Whole seconds
pub fn decode_duration(text: &str) -> DecodeResult<Duration> {
    decode_integer(text).map(Duration::from_secs)
}

/// Manufacturing date code: `YYYYMMDD` followed by a lot number
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateCode {
    pub date: NaiveDate,
    pub lot: String,
}

pub fn decode_date_code(text: &str) -> DecodeResult<DateCode> {
    let trimmed = text.trim();
    let bytes = trimmed.as_bytes();
    if bytes.len() < 8 || !bytes[..8].iter().all(u8::is_ascii_digit) {
        return Err(DecodeError::format(text, "expected YYYYMMDD followed by a lot number"));
    }

    let number = |range: std::ops::Range<usize>| -> DecodeResult<u32> {
        trimmed[range]
            .parse()
            .map_err(|_| DecodeError::format(text, "invalid date digits"))
    };
    let year = number(0..4)? as i32;
    let date = NaiveDate::from_ymd_opt(year, number(4..6)?, number(6..8)?)
        .ok_or_else(|| DecodeError::format(text, "invalid calendar date"))?;

    Ok(DateCode {
        date,
        lot: trimmed[8..].to_string(),
    })
}

/// Monetary amount with its currency
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Price {
    pub amount: Decimal,
    pub currency: Currency,
}

impl Price {
    /// Normalizes `amount` and pads it to the currency's minor-unit digits
    pub fn new(amount: Decimal, currency: Currency) -> Self {
        let mut amount = amount.normalize();
        if amount.scale() < currency.exponent {
            amount.rescale(currency.exponent);
        }
        Self { amount, currency }
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.amount, self.currency.code)
    }
}

/// Presentation hints a meter attaches to scaled readings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayFormat {
    /// Fraction digits; `None` prints the value as-is
    pub digits_right: Option<u32>,
    /// Minimum integer digits, padded with zeros
    pub digits_left: Option<u32>,
    pub suppress_leading_zero: bool,
}

/// Render a scaled reading using the meter's display hints
///
/// ```
/// use raven_parser::codec::{format_scaled, DisplayFormat};
/// use rust_decimal::Decimal;
///
/// let format = DisplayFormat {
///     digits_right: Some(2),
///     digits_left: Some(4),
///     suppress_leading_zero: false,
/// };
/// assert_eq!(format_scaled(Decimal::from(32), &format), "0032.00");
/// ```
pub fn format_scaled(value: Decimal, format: &DisplayFormat) -> String {
    let mut shown = match format.digits_right {
        Some(places) => {
            let mut rounded = round_to(value, places);
            rounded.rescale(places);
            rounded
        }
        None => value.normalize(),
    };

    let negative = shown.is_sign_negative() && !shown.is_zero();
    shown.set_sign_positive(true);
    let text = shown.to_string();
    let (whole, fraction) = match text.split_once('.') {
        Some((whole, fraction)) => (whole.to_string(), Some(fraction.to_string())),
        None => (text, None),
    };

    let mut whole = match format.digits_left {
        Some(width) => format!("{whole:0>width$}", width = width as usize),
        None => whole,
    };
    if format.suppress_leading_zero {
        let stripped = whole.trim_start_matches('0');
        whole = if stripped.is_empty() {
            "0".to_string()
        } else {
            stripped.to_string()
        };
    }

    let sign = if negative { "-" } else { "" };
    match fraction {
        Some(fraction) => format!("{sign}{whole}.{fraction}"),
        None => format!("{sign}{whole}"),
    }
}
