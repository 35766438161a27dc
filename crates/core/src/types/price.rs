//! Type-safe money representation using decimal arithmetic.

use core::fmt;
use core::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A monetary amount with currency information.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money {
    /// Amount in the currency's standard unit (e.g., dollars, not cents).
    pub amount: Decimal,
    /// ISO 4217 currency code.
    pub currency_code: CurrencyCode,
}

impl Money {
    /// Create a new amount.
    #[must_use]
    pub const fn new(amount: Decimal, currency_code: CurrencyCode) -> Self {
        Self {
            amount,
            currency_code,
        }
    }

    /// Zero in the given currency.
    #[must_use]
    pub const fn zero(currency_code: CurrencyCode) -> Self {
        Self::new(Decimal::ZERO, currency_code)
    }

    /// Create an amount from minor units (e.g., cents).
    #[must_use]
    pub fn from_cents(cents: i64, currency_code: CurrencyCode) -> Self {
        Self::new(Decimal::new(cents, 2), currency_code)
    }

    /// Format for display (e.g., "$19.99", or "INR 499.00" when the
    /// currency has no known symbol).
    #[must_use]
    pub fn display(&self) -> String {
        let amount = self.amount.round_dp(2);
        match self.currency_code.symbol() {
            Some(symbol) => format!("{symbol}{amount:.2}"),
            None => format!("{} {amount:.2}", self.currency_code),
        }
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display())
    }
}

/// Error returned when a string is not a three-letter ISO 4217 code.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid currency code: {0}")]
pub struct CurrencyCodeError(pub String);

/// ISO 4217 currency code, stored as three uppercase ASCII letters.
///
/// Any well-formed code is accepted; the store decides which currencies it
/// sells in. Symbols are only known for a handful of codes and
/// [`Money::display`] falls back to the code for the rest.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CurrencyCode([u8; 3]);

impl CurrencyCode {
    pub const USD: Self = Self(*b"USD");
    pub const EUR: Self = Self(*b"EUR");
    pub const GBP: Self = Self(*b"GBP");
    pub const CAD: Self = Self(*b"CAD");
    pub const AUD: Self = Self(*b"AUD");
    pub const MXN: Self = Self(*b"MXN");

    /// Display symbol for the currency, if one is known.
    #[must_use]
    pub const fn symbol(self) -> Option<&'static str> {
        match &self.0 {
            b"USD" | b"CAD" | b"AUD" | b"MXN" => Some("$"),
            b"EUR" => Some("€"),
            b"GBP" => Some("£"),
            _ => None,
        }
    }

    /// The three-letter ISO code.
    #[must_use]
    pub fn code(&self) -> &str {
        // Only ever built from ASCII letters.
        core::str::from_utf8(&self.0).unwrap_or_default()
    }
}

impl Default for CurrencyCode {
    fn default() -> Self {
        Self::USD
    }
}

impl fmt::Debug for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CurrencyCode").field(&self.code()).finish()
    }
}

impl fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for CurrencyCode {
    type Err = CurrencyCodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.as_bytes() {
            &[a, b, c] if [a, b, c].iter().all(u8::is_ascii_alphabetic) => Ok(Self([
                a.to_ascii_uppercase(),
                b.to_ascii_uppercase(),
                c.to_ascii_uppercase(),
            ])),
            _ => Err(CurrencyCodeError(s.to_string())),
        }
    }
}

impl TryFrom<String> for CurrencyCode {
    type Error = CurrencyCodeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<CurrencyCode> for String {
    fn from(code: CurrencyCode) -> Self {
        code.code().to_owned()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_money_display() {
        let price = Money::from_cents(1999, CurrencyCode::USD);
        assert_eq!(price.display(), "$19.99");

        let price = Money::from_cents(500, CurrencyCode::EUR);
        assert_eq!(price.to_string(), "€5.00");
    }

    #[test]
    fn test_zero() {
        let zero = Money::zero(CurrencyCode::GBP);
        assert_eq!(zero.amount, Decimal::ZERO);
        assert_eq!(zero.display(), "£0.00");
    }

    #[test]
    fn test_currency_code_parse() {
        assert_eq!("usd".parse::<CurrencyCode>(), Ok(CurrencyCode::USD));
        assert_eq!("MXN".parse::<CurrencyCode>(), Ok(CurrencyCode::MXN));
        assert_eq!("inr".parse::<CurrencyCode>().map(|c| c.to_string()), Ok("INR".to_string()));

        for bad in ["", "US", "USDX", "U5D", "€UR"] {
            assert_eq!(
                bad.parse::<CurrencyCode>(),
                Err(CurrencyCodeError(bad.to_string()))
            );
        }
    }

    #[test]
    fn test_display_without_known_symbol() {
        let inr: CurrencyCode = "INR".parse().unwrap();
        assert_eq!(inr.symbol(), None);
        assert_eq!(Money::from_cents(49900, inr).display(), "INR 499.00");

        let jpy: CurrencyCode = "JPY".parse().unwrap();
        assert_eq!(Money::from_cents(120_000, jpy).to_string(), "JPY 1200.00");
    }

    #[test]
    fn test_currency_code_serde() {
        let json = serde_json::to_string(&CurrencyCode::GBP).unwrap();
        assert_eq!(json, "\"GBP\"");
        let parsed: CurrencyCode = serde_json::from_str("\"brl\"").unwrap();
        assert_eq!(parsed.code(), "BRL");
        assert!(serde_json::from_str::<CurrencyCode>("\"BR\"").is_err());
    }
}
