//! Exact decimal values.
//!
//! Percentages are carried as fixed-point parts per billion so that the
//! distribution invariant (`sum <= 1`) and the floor computation
//! `floor(base_unit * percentage)` are exact. Floating point never enters
//! the arithmetic: JSON numbers are converted through their shortest
//! decimal representation before parsing.
//!
//! ```text
//! "0.3"      -> 300_000_000 ppb
//! 1          -> 1_000_000_000 ppb
//! "0.0000000001" -> rejected (more than 9 fractional digits)
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::{Result, TypesError, PERCENTAGE_DECIMALS, PERCENTAGE_SCALE};

/// A non-negative decimal percentage expressed as a fraction of one.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Percentage(u64);

impl Percentage {
    /// Zero percent.
    pub const ZERO: Percentage = Percentage(0);

    /// One hundred percent.
    pub const ONE: Percentage = Percentage(PERCENTAGE_SCALE);

    /// Build a percentage from parts per billion.
    pub const fn from_ppb(ppb: u64) -> Self {
        Self(ppb)
    }

    /// Parts per billion.
    pub const fn ppb(self) -> u64 {
        self.0
    }

    /// Whether this percentage lies in `[0, 1]`.
    pub fn is_unit_bounded(self) -> bool {
        self.0 <= PERCENTAGE_SCALE
    }

    /// `floor(amount * self)`, computed exactly.
    ///
    /// Returns `None` when the result does not fit in a `u64`, which can
    /// only happen for percentages above one.
    pub fn apply_floor(self, amount: u64) -> Option<u64> {
        let scaled = u128::from(amount) * u128::from(self.0) / u128::from(PERCENTAGE_SCALE);
        u64::try_from(scaled).ok()
    }
}

impl FromStr for Percentage {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self> {
        let (int, frac) = parse_decimal_parts(s)?;
        if frac.len() > PERCENTAGE_DECIMALS {
            return Err(invalid(s, "more than 9 fractional digits"));
        }

        let int_value: u64 = if int.is_empty() {
            0
        } else {
            int.parse().map_err(|_| invalid(s, "integer part out of range"))?
        };

        let mut frac_value: u64 = 0;
        for (i, digit) in frac.bytes().enumerate() {
            let place = 10u64.pow((PERCENTAGE_DECIMALS - 1 - i) as u32);
            frac_value += u64::from(digit - b'0') * place;
        }

        int_value
            .checked_mul(PERCENTAGE_SCALE)
            .and_then(|v| v.checked_add(frac_value))
            .map(Percentage)
            .ok_or_else(|| invalid(s, "value out of range"))
    }
}

impl fmt::Display for Percentage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let int = self.0 / PERCENTAGE_SCALE;
        let frac = self.0 % PERCENTAGE_SCALE;
        if frac == 0 {
            return write!(f, "{int}");
        }
        let digits = format!("{frac:09}");
        write!(f, "{int}.{}", digits.trim_end_matches('0'))
    }
}

impl Serialize for Percentage {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Percentage {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let text = NumberOrText::deserialize(deserializer)?.into_text();
        text.parse().map_err(serde::de::Error::custom)
    }
}

/// An informational decimal amount, kept as validated decimal text.
///
/// The engine never computes with these values; they are carried so that
/// configuration round-trips without losing precision.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Decimal(String);

impl Default for Decimal {
    fn default() -> Self {
        Self("0".to_string())
    }
}

impl Decimal {
    /// Borrow the decimal text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for Decimal {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        let unsigned = trimmed.strip_prefix('-').unwrap_or(trimmed);
        parse_decimal_parts(unsigned)?;
        Ok(Self(trimmed.to_string()))
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for Decimal {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Decimal {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let text = NumberOrText::deserialize(deserializer)?.into_text();
        text.parse().map_err(serde::de::Error::custom)
    }
}

/// Configuration files written by hand carry numbers, the UI writes strings.
#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrText {
    Unsigned(u64),
    Float(f64),
    Text(String),
}

impl NumberOrText {
    fn into_text(self) -> String {
        match self {
            NumberOrText::Unsigned(v) => v.to_string(),
            // `Display` for f64 is the shortest round-tripping decimal form
            // and never uses exponent notation.
            NumberOrText::Float(v) => v.to_string(),
            NumberOrText::Text(s) => s,
        }
    }
}

/// Split an unsigned decimal literal into its integer and fractional digits.
fn parse_decimal_parts(s: &str) -> Result<(&str, &str)> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return Err(invalid(s, "empty"));
    }
    if trimmed.starts_with('-') {
        return Err(invalid(s, "negative"));
    }

    let (int, frac) = match trimmed.split_once('.') {
        Some((int, frac)) => (int, frac),
        None => (trimmed, ""),
    };

    if int.is_empty() && frac.is_empty() {
        return Err(invalid(s, "no digits"));
    }
    if trimmed.ends_with('.') {
        return Err(invalid(s, "trailing decimal point"));
    }
    if !int.bytes().all(|b| b.is_ascii_digit()) || !frac.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid(s, "not a decimal number"));
    }

    Ok((int, frac))
}

fn invalid(input: &str, reason: &'static str) -> TypesError {
    TypesError::InvalidDecimal {
        input: input.to_string(),
        reason,
    }
}
