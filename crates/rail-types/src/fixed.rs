//! 18-decimal fixed-point arithmetic.
//!
//! Weights, fee fractions and the earnings-per-weight accumulator are all
//! integers scaled by `10^18`, so `1.0 == 1_000_000_000_000_000_000`.
//!
//! ## Rounding
//!
//! Every division truncates toward zero. The distribution engine therefore keeps
//! a small residual ("dust") instead of over-distributing. Intermediate
//! products are computed in 512 bits so only a final result that does not fit
//! 256 bits is reported as [`FixedPointError::Overflow`].

use std::fmt;
use std::str::FromStr;

use primitive_types::{U256, U512};
use serde::{Deserialize, Serialize};

/// Number of decimals in the fixed-point representation.
pub const DECIMALS: usize = 18;

/// `10^18` as a raw limb, the fixed-point scale.
pub const SCALE_U64: u64 = 1_000_000_000_000_000_000;

/// `10^18` as a [`U256`].
pub const SCALE: U256 = U256([SCALE_U64, 0, 0, 0]);

/// Errors produced by fixed-point operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FixedPointError {
    /// A fraction was outside `[0, 1.0]`.
    #[error("invalid fraction: raw value {0} is outside [0, 1.0]")]
    InvalidFraction(U256),

    /// Result does not fit in 256 bits (or a subtraction underflowed).
    #[error("fixed-point overflow")]
    Overflow,

    /// Division by zero.
    #[error("fixed-point division by zero")]
    DivisionByZero,

    /// A decimal string could not be parsed.
    #[error("invalid decimal {0:?}")]
    Parse(String),
}

/// Convenience result type for fixed-point operations.
pub type Result<T> = std::result::Result<T, FixedPointError>;

/// `a * b / 10^18`, truncating.
pub fn mul_scaled(a: U256, b: U256) -> Result<U256> {
    let wide = a.full_mul(b) / U512::from(SCALE);
    U256::try_from(wide).map_err(|_| FixedPointError::Overflow)
}

/// `a * 10^18 / b`, truncating.
pub fn div_scaled(a: U256, b: U256) -> Result<U256> {
    if b.is_zero() {
        return Err(FixedPointError::DivisionByZero);
    }
    let wide = a.full_mul(SCALE) / U512::from(b);
    U256::try_from(wide).map_err(|_| FixedPointError::Overflow)
}

/// Parse a non-negative decimal string (`"3"`, `"0.09"`, `"1.5"`) into a raw
/// fixed-point value. More than 18 fractional digits is an error.
pub fn parse_decimal(s: &str) -> Result<U256> {
    let s = s.trim();
    let (int_part, frac_part) = match s.split_once('.') {
        Some((i, f)) => (i, f),
        None => (s, ""),
    };
    let all_digits = |p: &str| p.chars().all(|c| c.is_ascii_digit());
    if (int_part.is_empty() && frac_part.is_empty())
        || !all_digits(int_part)
        || !all_digits(frac_part)
        || frac_part.len() > DECIMALS
    {
        return Err(FixedPointError::Parse(s.to_string()));
    }

    let int_value = if int_part.is_empty() {
        U256::zero()
    } else {
        U256::from_dec_str(int_part).map_err(|_| FixedPointError::Parse(s.to_string()))?
    };
    let mut frac_digits = frac_part.to_string();
    while frac_digits.len() < DECIMALS {
        frac_digits.push('0');
    }
    let frac_value =
        U256::from_dec_str(&frac_digits).map_err(|_| FixedPointError::Parse(s.to_string()))?;

    int_value
        .checked_mul(SCALE)
        .and_then(|v| v.checked_add(frac_value))
        .ok_or(FixedPointError::Overflow)
}

/// Render a raw fixed-point value as a decimal string without trailing zeros.
pub fn format_decimal(raw: U256) -> String {
    let int_part = raw / SCALE;
    let frac_part = raw % SCALE;
    if frac_part.is_zero() {
        return int_part.to_string();
    }
    let mut frac = format!("{:0>width$}", frac_part.to_string(), width = DECIMALS);
    while frac.ends_with('0') {
        frac.pop();
    }
    format!("{int_part}.{frac}")
}

/// A fixed-point fraction in `[0, 1.0]`, used for fee fractions.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Fraction(U256);

impl Fraction {
    /// `0.0`
    pub const ZERO: Fraction = Fraction(U256([0, 0, 0, 0]));

    /// `1.0`
    pub const ONE: Fraction = Fraction(SCALE);

    /// Build a fraction from its raw scaled value.
    ///
    /// # Errors
    ///
    /// - [`FixedPointError::InvalidFraction`] if `raw > 10^18`
    pub fn from_raw(raw: U256) -> Result<Self> {
        if raw > SCALE {
            return Err(FixedPointError::InvalidFraction(raw));
        }
        Ok(Self(raw))
    }

    /// Build `numerator / denominator`, truncating.
    pub fn from_ratio(numerator: u64, denominator: u64) -> Result<Self> {
        let raw = div_scaled(U256::from(numerator), U256::from(denominator))?;
        Self::from_raw(raw)
    }

    /// Build a fraction from a whole number of percent.
    pub fn from_percent(percent: u64) -> Result<Self> {
        Self::from_ratio(percent, 100)
    }

    /// The raw scaled value.
    pub fn raw(&self) -> U256 {
        self.0
    }

    /// Whether this fraction is zero.
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// `1.0 - self`.
    pub fn complement(&self) -> Fraction {
        Fraction(SCALE.saturating_sub(self.0))
    }

    /// Sum of two fractions, or `None` if it exceeds `1.0`.
    pub fn checked_add(&self, other: Fraction) -> Option<Fraction> {
        let sum = self.0.checked_add(other.0)?;
        Fraction::from_raw(sum).ok()
    }

    /// The smaller of two fractions.
    pub fn min(self, other: Fraction) -> Fraction {
        if self.0 <= other.0 {
            self
        } else {
            other
        }
    }

    /// `amount * self`, truncating. Never exceeds `amount`.
    pub fn of(&self, amount: U256) -> Result<U256> {
        mul_scaled(amount, self.0)
    }
}

impl fmt::Display for Fraction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_decimal(self.0))
    }
}

impl fmt::Debug for Fraction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fraction({})", format_decimal(self.0))
    }
}

impl FromStr for Fraction {
    type Err = FixedPointError;

    fn from_str(s: &str) -> Result<Self> {
        Fraction::from_raw(parse_decimal(s)?)
    }
}

impl TryFrom<String> for Fraction {
    type Error = FixedPointError;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<Fraction> for String {
    fn from(f: Fraction) -> Self {
        f.to_string()
    }
}
