//! Currency pair identifiers.

use crate::error::DataError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// An ordered pair of currency codes traded as one unit, e.g. `EUR/USD`.
///
/// Codes are ASCII alphabetic and stored upper-cased, so `"eur/usd"` and
/// `"EUR/USD"` parse to the same instrument. The canonical key is
/// `BASE/QUOTE`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Instrument {
    base: String,
    quote: String,
}

impl Instrument {
    /// Create an instrument from two currency codes.
    pub fn new(base: &str, quote: &str) -> Result<Self, DataError> {
        let base = normalize_code(base)?;
        let quote = normalize_code(quote)?;
        Ok(Self { base, quote })
    }

    /// Base currency code.
    pub fn base(&self) -> &str {
        &self.base
    }

    /// Quote currency code.
    pub fn quote(&self) -> &str {
        &self.quote
    }

    /// Canonical key, `BASE/QUOTE`.
    pub fn key(&self) -> String {
        format!("{}/{}", self.base, self.quote)
    }

    /// File-system friendly key, `BASE_QUOTE`.
    pub fn file_stem(&self) -> String {
        format!("{}_{}", self.base, self.quote)
    }
}

fn normalize_code(code: &str) -> Result<String, DataError> {
    let code = code.trim();
    if code.is_empty() || !code.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(DataError::InvalidInstrument(format!(
            "invalid currency code '{}'",
            code
        )));
    }
    Ok(code.to_ascii_uppercase())
}

impl fmt::Display for Instrument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.base, self.quote)
    }
}

impl FromStr for Instrument {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (base, quote) = s
            .split_once('/')
            .ok_or_else(|| DataError::InvalidInstrument(format!("expected BASE/QUOTE, got '{}'", s)))?;
        Self::new(base, quote)
    }
}

impl TryFrom<String> for Instrument {
    type Error = DataError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Instrument> for String {
    fn from(instrument: Instrument) -> Self {
        instrument.key()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_canonicalizes_case() {
        let pair: Instrument = "usd/jpy".parse().unwrap();
        assert_eq!(pair.base(), "USD");
        assert_eq!(pair.quote(), "JPY");
        assert_eq!(pair.key(), "USD/JPY");
        assert_eq!(pair.file_stem(), "USD_JPY");
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!("USDJPY".parse::<Instrument>().is_err());
        assert!("USD/".parse::<Instrument>().is_err());
        assert!("US1/JPY".parse::<Instrument>().is_err());
    }

    #[test]
    fn test_serde_as_string_key() {
        let pair: Instrument = "EUR/USD".parse().unwrap();
        let json = serde_json::to_string(&pair).unwrap();
        assert_eq!(json, "\"EUR/USD\"");

        let back: Instrument = serde_json::from_str(&json).unwrap();
        assert_eq!(back, pair);
    }
}
