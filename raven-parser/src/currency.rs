//! Currency metadata used when decoding prices
//!
//! The gateway reports prices with an ISO 4217 numeric currency code. The
//! decoders never consult process-global state; callers pass a
//! [`CurrencyLookup`] explicitly, usually the built-in [`IsoCurrencyTable`].

use serde::{Deserialize, Serialize};

/// Display metadata for one currency
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Currency {
    /// Alphabetic ISO 4217 code, e.g. `USD`
    pub code: String,
    /// Numeric ISO 4217 code, e.g. `840`
    pub numeric: u16,
    /// Number of minor-unit digits (2 for USD, 0 for JPY)
    pub exponent: u32,
    pub symbol: String,
}

impl Currency {
    pub fn new(code: &str, numeric: u16, exponent: u32, symbol: &str) -> Self {
        Self {
            code: code.to_string(),
            numeric,
            exponent,
            symbol: symbol.to_string(),
        }
    }
}

/// Maps numeric currency codes to their metadata
pub trait CurrencyLookup: Send + Sync {
    fn lookup(&self, numeric: u16) -> Option<Currency>;
}

/// Table of common ISO 4217 currencies
///
/// ```
/// use raven_parser::{CurrencyLookup, IsoCurrencyTable};
///
/// let table = IsoCurrencyTable::default();
/// let usd = table.lookup(840).unwrap();
/// assert_eq!(usd.code, "USD");
/// assert_eq!(usd.exponent, 2);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IsoCurrencyTable {
    entries: Vec<Currency>,
}

impl IsoCurrencyTable {
    /// Empty table, for callers that want full control over the entries
    pub fn empty() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Add or replace an entry
    pub fn with_currency(mut self, currency: Currency) -> Self {
        self.entries.retain(|entry| entry.numeric != currency.numeric);
        self.entries.push(currency);
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for IsoCurrencyTable {
    fn default() -> Self {
        let entries = [
            ("AUD", 36, 2, "$"),
            ("CAD", 124, 2, "$"),
            ("CNY", 156, 2, "¥"),
            ("DKK", 208, 2, "kr"),
            ("HKD", 344, 2, "$"),
            ("INR", 356, 2, "₹"),
            ("JPY", 392, 0, "¥"),
            ("KRW", 410, 0, "₩"),
            ("MXN", 484, 2, "$"),
            ("NZD", 554, 2, "$"),
            ("NOK", 578, 2, "kr"),
            ("SGD", 702, 2, "$"),
            ("ZAR", 710, 2, "R"),
            ("SEK", 752, 2, "kr"),
            ("CHF", 756, 2, "CHF"),
            ("GBP", 826, 2, "£"),
            ("USD", 840, 2, "$"),
            ("EUR", 978, 2, "€"),
            ("PLN", 985, 2, "zł"),
            ("BRL", 986, 2, "R$"),
        ]
        .into_iter()
        .map(|(code, numeric, exponent, symbol)| Currency::new(code, numeric, exponent, symbol))
        .collect();

        Self { entries }
    }
}

impl CurrencyLookup for IsoCurrencyTable {
    fn lookup(&self, numeric: u16) -> Option<Currency> {
        self.entries
            .iter()
            .find(|entry| entry.numeric == numeric)
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_table_lookups() {
        let table = IsoCurrencyTable::default();

        let usd = table.lookup(840).unwrap();
        assert_eq!(usd.code, "USD");
        assert_eq!(usd.symbol, "$");

        let yen = table.lookup(392).unwrap();
        assert_eq!(yen.exponent, 0);

        assert!(table.lookup(1).is_none());
    }

    #[test]
    fn test_with_currency_replaces_existing_entry() {
        let before = IsoCurrencyTable::default().len();
        let table = IsoCurrencyTable::default().with_currency(Currency::new("USD", 840, 3, "US$"));

        assert_eq!(table.len(), before);
        assert_eq!(table.lookup(840).unwrap().exponent, 3);
    }

    #[test]
    fn test_empty_table() {
        let table = IsoCurrencyTable::empty();
        assert!(table.is_empty());
        assert!(table.lookup(840).is_none());
    }
}
