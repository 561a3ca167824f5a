//! Money Conversion Module
//!
//! Unified conversion between the internal `u64` minor-unit representation and
//! the client-facing string/Decimal representation. All conversions MUST go
//! through this module.
//!
//! ## Internal Representation
//! - Balances and transfer amounts are stored as `u64` minor units (cents)
//! - The scale factor is `10^CURRENCY_DECIMALS`
//! - Floating point is never used for currency
//!
//! ## Usage
//! ```rust
//! use peer_transfer::money::{Amount, format_amount, parse_amount};
//!
//! let internal = parse_amount("40.5", 2).unwrap();
//! assert_eq!(internal, 4050);
//! assert_eq!(format_amount(4050, 2, 2), "40.50");
//! assert_eq!(Amount::from_minor(4050).to_string(), "40.50");
//! ```

use std::fmt;
use std::str::FromStr;

use rust_decimal::prelude::*;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Decimal places of the single supported currency.
pub const CURRENCY_DECIMALS: u32 = 2;

// ============================================================================
// Error Types
// ============================================================================

/// Money conversion errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MoneyError {
    #[error("Precision overflow: provided {provided} decimals, max allowed {max}")]
    PrecisionOverflow { provided: u32, max: u32 },

    #[error("Amount must be positive")]
    InvalidAmount,

    #[error("Amount too large, would overflow")]
    Overflow,

    #[error("Invalid format: {0}")]
    InvalidFormat(String),
}

// ============================================================================
// Amount
// ============================================================================

/// Non-negative monetary amount in minor units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Amount(u64);

impl Amount {
    pub const ZERO: Amount = Amount(0);

    pub fn from_minor(minor: u64) -> Self {
        Self(minor)
    }

    /// Whole currency units, e.g. `Amount::units(100)` is `100.00`.
    pub fn units(units: u64) -> Self {
        Self(units * 10u64.pow(CURRENCY_DECIMALS))
    }

    #[inline]
    pub fn minor(&self) -> u64 {
        self.0
    }

    #[inline]
    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn checked_add(self, rhs: Amount) -> Option<Amount> {
        self.0.checked_add(rhs.0).map(Amount)
    }

    pub fn checked_sub(self, rhs: Amount) -> Option<Amount> {
        self.0.checked_sub(rhs.0).map(Amount)
    }

    /// Exact `NUMERIC` representation for storage.
    pub fn to_decimal(&self) -> Decimal {
        Decimal::from(self.0) / Decimal::from(10u64.pow(CURRENCY_DECIMALS))
    }

    /// Convert a stored `NUMERIC` value back. Zero is accepted here since
    /// balances may legitimately be empty.
    pub fn from_decimal(decimal: Decimal) -> Result<Self, MoneyError> {
        if decimal.is_zero() {
            return Ok(Amount::ZERO);
        }
        parse_decimal(decimal.normalize(), CURRENCY_DECIMALS).map(Amount)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_amount_full(self.0, CURRENCY_DECIMALS))
    }
}

impl FromStr for Amount {
    type Err = MoneyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_amount(s, CURRENCY_DECIMALS).map(Amount)
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Accepts `"40.50"` as well as bare JSON numbers (`40.5`). Numbers are
/// re-read from their source text (`arbitrary_precision`), never through `f64`.
impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = match serde_json::Value::deserialize(deserializer)? {
            serde_json::Value::String(s) => s,
            serde_json::Value::Number(n) => n.to_string(),
            other => {
                return Err(serde::de::Error::custom(format!(
                    "amount must be a string or number, got {}",
                    other
                )));
            }
        };
        match text.parse() {
            Ok(amount) => Ok(amount),
            // Stored balances may be empty; only signs are rejected here
            Err(MoneyError::InvalidAmount) if !text.trim_start().starts_with(['-', '+']) => {
                Ok(Amount::ZERO)
            }
            Err(e) => Err(serde::de::Error::custom(e)),
        }
    }
}

// ============================================================================
// Parse: Client → Internal (String/Decimal → u64)
// ============================================================================

/// Convert client string amount to internal u64 representation
///
/// # Errors
/// * `PrecisionOverflow` - If input has more decimal places than allowed
/// * `InvalidAmount` - If amount is zero or negative
/// * `Overflow` - If result would overflow u64
/// * `InvalidFormat` - If string format is invalid
pub fn parse_amount(amount_str: &str, decimals: u32) -> Result<u64, MoneyError> {
    let amount_str = amount_str.trim();
    if amount_str.is_empty() {
        return Err(MoneyError::InvalidFormat("empty string".into()));
    }

    if amount_str.starts_with('-') || amount_str.starts_with('+') {
        return Err(MoneyError::InvalidAmount);
    }

    let parts: Vec<&str> = amount_str.split('.').collect();
    let (whole, frac) = match parts.len() {
        1 => (parts[0], ""),
        2 => {
            // ".5" and "5." are ambiguous, require both sides
            if parts[0].is_empty() {
                return Err(MoneyError::InvalidFormat(
                    "missing leading zero (e.g., use 0.5 instead of .5)".into(),
                ));
            }
            if parts[1].is_empty() {
                return Err(MoneyError::InvalidFormat(
                    "missing fractional part (e.g., use 5.0 instead of 5.)".into(),
                ));
            }
            if decimals == 0 {
                return Err(MoneyError::InvalidFormat(
                    "decimals is 0, but dot provided".into(),
                ));
            }
            (parts[0], parts[1])
        }
        _ => return Err(MoneyError::InvalidFormat("multiple decimal points".into())),
    };

    if !frac.chars().all(|c| c.is_ascii_digit()) {
        return Err(MoneyError::InvalidFormat(format!(
            "invalid character in fractional part: {}",
            frac
        )));
    }

    // No silent truncation
    if frac.len() > decimals as usize {
        return Err(MoneyError::PrecisionOverflow {
            provided: frac.len() as u32,
            max: decimals,
        });
    }

    let whole_num: u64 = whole.parse::<u64>().map_err(|e| {
        let err_str = e.to_string();
        if err_str.contains("too large") || err_str.contains("overflow") {
            MoneyError::Overflow
        } else {
            MoneyError::InvalidFormat(format!("invalid character in whole part: {}", whole))
        }
    })?;

    let frac_num: u64 = if decimals == 0 || frac.is_empty() {
        0
    } else {
        let frac_padded = format!("{:0<width$}", frac, width = decimals as usize);
        frac_padded[..decimals as usize]
            .parse::<u64>()
            .map_err(|_| MoneyError::InvalidFormat("invalid fractional part".into()))?
    };

    let multiplier = 10u64.pow(decimals);
    let amount = whole_num
        .checked_mul(multiplier)
        .and_then(|v: u64| v.checked_add(frac_num))
        .ok_or(MoneyError::Overflow)?;

    if amount == 0 {
        return Err(MoneyError::InvalidAmount);
    }

    Ok(amount)
}

/// Convert Decimal to internal u64 representation
pub fn parse_decimal(decimal: Decimal, decimals: u32) -> Result<u64, MoneyError> {
    if decimal.is_sign_negative() {
        return Err(MoneyError::InvalidAmount);
    }

    if decimal.is_zero() {
        return Err(MoneyError::InvalidAmount);
    }

    if decimal.scale() > decimals {
        return Err(MoneyError::PrecisionOverflow {
            provided: decimal.scale(),
            max: decimals,
        });
    }

    let multiplier = Decimal::from(10u64.pow(decimals));
    let result = decimal * multiplier;

    if !result.fract().is_zero() {
        return Err(MoneyError::PrecisionOverflow {
            provided: decimal.scale(),
            max: decimals,
        });
    }

    result.to_u64().ok_or(MoneyError::Overflow)
}

// ============================================================================
// Format: Internal → Client (u64 → String)
// ============================================================================

/// Convert internal u64 to display string
pub fn format_amount(value: u64, decimals: u32, display_decimals: u32) -> String {
    let decimal_value = Decimal::from(value) / Decimal::from(10u64.pow(decimals));
    format!("{:.prec$}", decimal_value, prec = display_decimals as usize)
}

/// Convert internal u64 to full precision string
pub fn format_amount_full(value: u64, decimals: u32) -> String {
    format_amount(value, decimals, decimals)
}
