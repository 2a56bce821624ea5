//! Typed decoding of fragment fields with per-field error tracking
//!
//! A malformed field never fails a whole fragment. [`FieldDecoder`] records
//! the failure against the field name, yields `None` for that field and
//! keeps going; the caller receives the partial value together with the
//! list of failures in a [`Decoded`].

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::codec::{self, DateCode, DisplayFormat, Price};
use crate::currency::CurrencyLookup;
use crate::error::{DecodeError, DecodeResult};
use crate::fragment::Fragment;

/// A decoding failure attributed to one field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub error: DecodeError,
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.error)
    }
}

impl std::error::Error for FieldError {}

/// A decoded value plus the fields that could not be decoded
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded<T> {
    pub value: T,
    pub errors: Vec<FieldError>,
}

impl<T> Decoded<T> {
    pub fn clean(value: T) -> Self {
        Self {
            value,
            errors: Vec::new(),
        }
    }

    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }

    /// The value, or the first field error if any field failed
    pub fn strict(self) -> Result<T, FieldError> {
        match self.errors.into_iter().next() {
            Some(error) => Err(error),
            None => Ok(self.value),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Decoded<U> {
        Decoded {
            value: f(self.value),
            errors: self.errors,
        }
    }
}

/// A scaled meter reading with its display rendering
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reading {
    pub value: Decimal,
    /// `value` rendered with the meter's `DigitsRight`, `DigitsLeft` and
    /// `SuppressLeadingZero` hints
    pub display: String,
}

/// Reads typed values out of a fragment, collecting failures
pub struct FieldDecoder<'a> {
    fragment: &'a Fragment,
    errors: Vec<FieldError>,
}

impl<'a> FieldDecoder<'a> {
    pub fn new(fragment: &'a Fragment) -> Self {
        Self {
            fragment,
            errors: Vec::new(),
        }
    }

    pub fn fragment(&self) -> &'a Fragment {
        self.fragment
    }

    pub fn check<T>(&mut self, field: &str, result: DecodeResult<T>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(error) => {
                let seen = self
                    .errors
                    .iter()
                    .any(|recorded| recorded.field == field && recorded.error == error);
                if !seen {
                    self.errors.push(FieldError {
                        field: field.to_string(),
                        error,
                    });
                }
                None
            }
        }
    }

    fn decode<T>(&mut self, field: &str, f: impl FnOnce(&str) -> DecodeResult<T>) -> Option<T> {
        let text = self.fragment.get(field)?;
        let result = f(text);
        self.check(field, result)
    }

    pub fn text(&mut self, field: &str) -> Option<String> {
        self.fragment.get(field).map(str::to_string)
    }

    /// Like [`text`](Self::text) but treats an empty element as absent
    pub fn non_empty_text(&mut self, field: &str) -> Option<String> {
        self.fragment
            .get(field)
            .filter(|text| !text.is_empty())
            .map(str::to_string)
    }

    pub fn integer(&mut self, field: &str) -> Option<u64> {
        self.decode(field, codec::decode_integer)
    }

    pub fn signed(&mut self, field: &str, width_bits: u32) -> Option<i64> {
        self.decode(field, |text| codec::decode_signed(text, width_bits))
    }

    pub fn boolean(&mut self, field: &str) -> Option<bool> {
        self.decode(field, codec::decode_bool)
    }

    pub fn hex_bytes(&mut self, field: &str) -> Option<Vec<u8>> {
        self.decode(field, codec::decode_hex_bytes)
    }

    /// Every occurrence of a repeated byte-string field
    pub fn hex_bytes_all(&mut self, field: &str) -> Vec<Vec<u8>> {
        let fragment = self.fragment;
        fragment
            .get_all(field)
            .filter_map(|text| {
                let result = codec::decode_hex_bytes(text);
                self.check(field, result)
            })
            .collect()
    }

    pub fn timestamp(&mut self, field: &str) -> Option<NaiveDateTime> {
        self.decode(field, codec::decode_timestamp).flatten()
    }

    pub fn utc_timestamp(&mut self, field: &str) -> Option<DateTime<Utc>> {
        self.decode(field, codec::decode_utc_timestamp).flatten()
    }

    pub fn duration(&mut self, field: &str) -> Option<Duration> {
        self.decode(field, codec::decode_duration)
    }

    pub fn date_code(&mut self, field: &str) -> Option<DateCode> {
        self.decode(field, codec::decode_date_code)
    }

    /// Text-coded enumeration, e.g. `MeterType`
    pub fn parsed<T>(&mut self, field: &str) -> Option<T>
    where
        T: std::str::FromStr<Err = DecodeError>,
    {
        self.decode(field, str::parse)
    }

    /// Integer-coded enumeration, e.g. `DataStatus`
    pub fn coded<T>(&mut self, field: &str, from_code: fn(u64) -> DecodeResult<T>) -> Option<T> {
        self.decode(field, |text| codec::decode_integer(text).and_then(from_code))
    }

    /// Scaling and display hints that accompany readings in the same fragment
    pub fn display_format(&mut self) -> (u64, u64, DisplayFormat) {
        let multiplier = self.integer("Multiplier").unwrap_or(1);
        let divisor = self.integer("Divisor").unwrap_or(1);
        let digits_right = self.decode("DigitsRight", |text| {
            codec::decode_integer(text).and_then(|value| narrow(text, value))
        });
        let digits_left = self.decode("DigitsLeft", |text| {
            codec::decode_integer(text).and_then(|value| narrow(text, value))
        });
        let suppress_leading_zero = self.boolean("SuppressLeadingZero").unwrap_or(false);

        (
            multiplier,
            divisor,
            DisplayFormat {
                digits_right,
                digits_left,
                suppress_leading_zero,
            },
        )
    }

    /// A reading such as `Demand` or `SummationDelivered`, scaled by the
    /// fragment's `Multiplier` and `Divisor`
    pub fn reading(&mut self, field: &str) -> Option<Reading> {
        let raw = self.decode(field, codec::decode_reading)?;
        let (multiplier, divisor, format) = self.display_format();
        let result = codec::decode_scaled(raw, multiplier, divisor);
        let value = self.check(field, result)?;
        Some(Reading {
            display: codec::format_scaled(value, &format),
            value,
        })
    }

    /// Price from a value field, its trailing-digits field and a currency field
    pub fn price(
        &mut self,
        field: &str,
        trailing_digits_field: &str,
        currency_field: &str,
        currencies: &dyn CurrencyLookup,
    ) -> Option<Price> {
        let raw = self.decode(field, codec::decode_reading)?;
        let trailing = self
            .decode(trailing_digits_field, |text| {
                codec::decode_integer(text).and_then(|value| narrow(text, value))
            })
            .unwrap_or(0);
        let currency = self.decode(currency_field, |text| {
            codec::decode_integer(text).and_then(|value| {
                u16::try_from(value).map_err(|_| DecodeError::format(text, "currency code exceeds 16 bits"))
            })
        })?;

        let divisor = 10u64.checked_pow(trailing).unwrap_or(0);
        let result = if divisor == 0 {
            Err(DecodeError::format(raw.to_string(), "too many trailing digits"))
        } else {
            codec::decode_price(raw, 1, divisor, currency, currencies)
        };
        let error_field = match &result {
            Err(DecodeError::UnknownCurrency(_)) => currency_field,
            _ => field,
        };
        self.check(error_field, result)
    }

    pub fn finish<T>(self, value: T) -> Decoded<T> {
        Decoded {
            value,
            errors: self.errors,
        }
    }
}

fn narrow(text: &str, value: u64) -> DecodeResult<u32> {
    u32::try_from(value).map_err(|_| DecodeError::format(text, "value exceeds 32 bits"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::currency::IsoCurrencyTable;
    use crate::enums::{DataStatus, MeterType};

    fn fragment(xml: &str) -> Fragment {
        Fragment::from_xml(xml).unwrap()
    }

    #[test]
    fn test_reading_uses_fragment_format() {
        let summation = fragment(
            "<CurrentSummationDelivered>\
               <SummationDelivered>0x00000010</SummationDelivered>\
               <Multiplier>0x00000004</Multiplier><Divisor>0x00000002</Divisor>\
               <DigitsRight>0x02</DigitsRight><DigitsLeft>0x04</DigitsLeft>\
               <SuppressLeadingZero>N</SuppressLeadingZero>\
             </CurrentSummationDelivered>",
        );
        let mut decoder = FieldDecoder::new(&summation);
        let reading = decoder.reading("SummationDelivered").unwrap();

        assert_eq!(reading.value, Decimal::from(32));
        assert_eq!(reading.display, "0032.00");
        assert!(decoder.finish(()).is_clean());
    }

    #[test]
    fn test_reading_without_format_fields() {
        let demand = fragment("<InstantaneousDemand><Demand>0xFFFFFFF6</Demand></InstantaneousDemand>");
        let mut decoder = FieldDecoder::new(&demand);
        let reading = decoder.reading("Demand").unwrap();

        assert_eq!(reading.value, Decimal::from(-10));
        assert_eq!(reading.display, "-10");
    }

    #[test]
    fn test_price_from_trailing_digits() {
        let price = fragment(
            "<PriceCluster><Price>0x000000c8</Price><Currency>0x0348</Currency>\
             <TrailingDigits>0x03</TrailingDigits></PriceCluster>",
        );
        let table = IsoCurrencyTable::default();
        let mut decoder = FieldDecoder::new(&price);
        let price = decoder
            .price("Price", "TrailingDigits", "Currency", &table)
            .unwrap();

        assert_eq!(price.amount.to_string(), "0.20");
        assert_eq!(price.currency.code, "USD");
    }

    #[test]
    fn test_unknown_currency_is_attributed_to_currency_field() {
        let price = fragment(
            "<PriceCluster><Price>0x01</Price><Currency>0x03E7</Currency></PriceCluster>",
        );
        let table = IsoCurrencyTable::default();
        let mut decoder = FieldDecoder::new(&price);

        assert!(decoder.price("Price", "TrailingDigits", "Currency", &table).is_none());
        let decoded = decoder.finish(());
        assert_eq!(decoded.errors.len(), 1);
        assert_eq!(decoded.errors[0].field, "Currency");
        assert_eq!(decoded.errors[0].error, DecodeError::UnknownCurrency(999));
    }

    #[test]
    fn test_bad_fields_are_collected_not_fatal() {
        let info = fragment(
            "<MeterInfo><MeterMacId>0xZZ</MeterMacId><MeterType>steam</MeterType>\
             <NickName>House</NickName><Enabled>Y</Enabled><Status>0x09</Status></MeterInfo>",
        );
        let mut decoder = FieldDecoder::new(&info);

        assert_eq!(decoder.hex_bytes("MeterMacId"), None);
        assert_eq!(decoder.parsed::<MeterType>("MeterType"), None);
        assert_eq!(decoder.text("NickName").as_deref(), Some("House"));
        assert_eq!(decoder.boolean("Enabled"), Some(true));
        assert_eq!(decoder.coded("Status", DataStatus::from_code), None);
        assert_eq!(decoder.integer("Absent"), None);

        let decoded = decoder.finish("partial");
        let failed: Vec<&str> = decoded.errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(failed, vec!["MeterMacId", "MeterType", "Status"]);
        assert_eq!(decoded.clone().strict().unwrap_err().field, "MeterMacId");
        assert_eq!(decoded.value, "partial");
    }

    #[test]
    fn test_hex_bytes_all_skips_and_records_bad_entries() {
        let list = fragment(
            "<MeterList><MeterMacId>0x0a</MeterMacId><MeterMacId>bad</MeterMacId>\
             <MeterMacId>0x0b0c</MeterMacId></MeterList>",
        );
        let mut decoder = FieldDecoder::new(&list);
        let meters = decoder.hex_bytes_all("MeterMacId");

        assert_eq!(meters, vec![vec![0x0a], vec![0x0b, 0x0c]]);
        assert_eq!(decoder.finish(()).errors.len(), 1);
    }

    #[test]
    fn test_unset_timestamp_is_none_without_error() {
        let time = fragment("<TimeCluster><UTCTime>0xffffff</UTCTime></TimeCluster>");
        let mut decoder = FieldDecoder::new(&time);

        assert_eq!(decoder.utc_timestamp("UTCTime"), None);
        assert!(decoder.finish(()).is_clean());
    }

    #[test]
    fn test_decoded_map_keeps_errors() {
        let decoded = Decoded {
            value: 2,
            errors: vec![FieldError {
                field: "X".to_string(),
                error: DecodeError::UnknownCurrency(1),
            }],
        };
        let mapped = decoded.map(|v| v * 10);
        assert_eq!(mapped.value, 20);
        assert_eq!(mapped.errors[0].to_string(), "X: Unknown currency code 1");
    }
}
