//! Exact representation of JSON numeric literals.

use crate::error::{CoreError, CoreResult};
use num_bigint::BigInt;
use std::fmt;
use std::str::FromStr;

/// An exact JSON numeric literal.
///
/// Holds the literal text as it appeared on the wire, so it can be converted
/// to a decimal string, a big integer or (when safe) a native `f64` without
/// ever losing precision.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LosslessNumber(String);

impl LosslessNumber {
    /// Parse and validate a JSON numeric literal.
    pub fn parse(text: &str) -> CoreResult<Self> {
        let number = serde_json::Number::from_str(text.trim()).map_err(|_| {
            CoreError::type_mismatch("", "numeric literal", format!("'{text}'"))
        })?;
        Ok(Self::from(&number))
    }

    /// The literal text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the literal is written as an integer (no fraction or exponent).
    pub fn is_integer(&self) -> bool {
        !self.0.contains(['.', 'e', 'E'])
    }

    /// Whether the value survives a round trip through `f64` unchanged.
    ///
    /// Compares the significant digits of the literal with those of the
    /// nearest double, so `9007199254740993` is unsafe while `1.50` and
    /// `2e3` are safe.
    pub fn is_safe(&self) -> bool {
        match self.0.parse::<f64>() {
            Ok(value) if value.is_finite() => {
                significant_digits(&self.0) == significant_digits(&format!("{value}"))
            }
            _ => false,
        }
    }

    /// The native value, if it can be represented exactly.
    pub fn to_f64(&self) -> Option<f64> {
        if self.is_safe() {
            self.0.parse().ok()
        } else {
            None
        }
    }

    /// Convert to a big integer. Fails for fractional or exponent literals.
    pub fn to_bigint(&self) -> CoreResult<BigInt> {
        if !self.is_integer() {
            return Err(CoreError::type_mismatch(
                "",
                "integer",
                format!("'{}'", self.0),
            ));
        }
        BigInt::from_str(&self.0)
            .map_err(|_| CoreError::type_mismatch("", "integer", format!("'{}'", self.0)))
    }

    /// The equivalent `serde_json::Number`, keeping the exact literal.
    pub fn to_number(&self) -> serde_json::Number {
        // The literal was validated on construction.
        serde_json::Number::from_str(&self.0).unwrap_or_else(|_| serde_json::Number::from(0))
    }
}

impl fmt::Display for LosslessNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&serde_json::Number> for LosslessNumber {
    fn from(number: &serde_json::Number) -> Self {
        Self(number.to_string())
    }
}

impl From<i64> for LosslessNumber {
    fn from(value: i64) -> Self {
        Self(value.to_string())
    }
}

impl From<u64> for LosslessNumber {
    fn from(value: u64) -> Self {
        Self(value.to_string())
    }
}

impl From<&BigInt> for LosslessNumber {
    fn from(value: &BigInt) -> Self {
        Self(value.to_string())
    }
}

impl FromStr for LosslessNumber {
    type Err = CoreError;

    fn from_str(s: &str) -> CoreResult<Self> {
        Self::parse(s)
    }
}

/// Significant digits of a decimal literal: sign, exponent, decimal point,
/// and leading/trailing zeros removed.
fn significant_digits(text: &str) -> String {
    let mantissa = text
        .split(['e', 'E'])
        .next()
        .unwrap_or_default()
        .trim_start_matches(['-', '+']);
    let digits: String = mantissa.chars().filter(|c| c.is_ascii_digit()).collect();
    digits
        .trim_start_matches('0')
        .trim_end_matches('0')
        .to_string()
}
