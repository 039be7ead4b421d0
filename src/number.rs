// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.
#![allow(
    clippy::float_cmp,
    clippy::as_conversions,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_possible_wrap
)]

use core::cmp::Ordering;
use core::fmt::{self, Debug, Display, Formatter};
use core::str::FromStr;

use serde::ser::Serializer;
use serde::Serialize;

/// A configuration number.
///
/// The variant records how the literal was written: non-negative integers are
/// `UInt`, negative integers are `Int` and everything with a fraction or exponent
/// is `Float`. Coercion into fixed-width destinations depends on this distinction.
#[derive(Clone, Copy)]
pub enum Number {
    UInt(u64),
    Int(i64),
    Float(f64),
}

impl Number {
    fn from_i128(value: i128) -> Option<Self> {
        if value >= 0 {
            u64::try_from(value).ok().map(Number::UInt)
        } else {
            i64::try_from(value).ok().map(Number::Int)
        }
    }

    fn as_exact_i128(&self) -> Option<i128> {
        match self {
            Number::UInt(v) => Some(*v as i128),
            Number::Int(v) => Some(*v as i128),
            Number::Float(f) => {
                if f.is_finite() && f.fract() == 0.0 && f.abs() < 1.7e38 {
                    Some(*f as i128)
                } else {
                    None
                }
            }
        }
    }

    pub fn is_zero(&self) -> bool {
        match self {
            Number::UInt(v) => *v == 0,
            Number::Int(v) => *v == 0,
            Number::Float(f) => *f == 0.0,
        }
    }

    pub fn is_integer(&self) -> bool {
        match self {
            Number::UInt(_) | Number::Int(_) => true,
            Number::Float(f) => f.is_finite() && f.fract() == 0.0,
        }
    }

    pub fn as_f64(&self) -> f64 {
        match self {
            Number::UInt(v) => *v as f64,
            Number::Int(v) => *v as f64,
            Number::Float(f) => *f,
        }
    }

    /// Returns the value when it fits an `i64` exactly.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Number::UInt(v) => i64::try_from(*v).ok(),
            Number::Int(v) => Some(*v),
            Number::Float(_) => self.as_exact_i128().and_then(|i| i64::try_from(i).ok()),
        }
    }

    /// Returns the value when it fits an `u64` exactly.
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Number::UInt(v) => Some(*v),
            Number::Int(v) => u64::try_from(*v).ok(),
            Number::Float(_) => self.as_exact_i128().and_then(|i| u64::try_from(i).ok()),
        }
    }

    /// Two's-complement view of the number as a signed 64-bit integer.
    ///
    /// Floats truncate toward zero first. Narrower widths are obtained by a further
    /// `as` cast, which wraps.
    pub fn wrapping_i64(&self) -> i64 {
        match self {
            Number::UInt(v) => *v as i64,
            Number::Int(v) => *v,
            Number::Float(f) => wrap_float(*f) as i64,
        }
    }

    /// Two's-complement view of the number as an unsigned 64-bit integer.
    ///
    /// Negative values wrap (`-1` becomes `u64::MAX`).
    pub fn wrapping_u64(&self) -> u64 {
        match self {
            Number::UInt(v) => *v,
            Number::Int(v) => *v as u64,
            Number::Float(f) => wrap_float(*f),
        }
    }

    /// Decimal rendering with the minimal number of digits and no exponent.
    pub fn format_decimal(&self) -> String {
        match self {
            Number::UInt(v) => v.to_string(),
            Number::Int(v) => v.to_string(),
            Number::Float(f) => format!("{f}"),
        }
    }
}

impl Debug for Number {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.format_decimal())
    }
}

impl Display for Number {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.format_decimal())
    }
}

impl Serialize for Number {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Number::UInt(v) => serializer.serialize_u64(*v),
            Number::Int(v) => serializer.serialize_i64(*v),
            Number::Float(f) => serializer.serialize_f64(*f),
        }
    }
}

impl From<u64> for Number {
    fn from(value: u64) -> Self {
        Number::UInt(value)
    }
}

impl From<u32> for Number {
    fn from(value: u32) -> Self {
        Number::UInt(u64::from(value))
    }
}

impl From<usize> for Number {
    fn from(value: usize) -> Self {
        Number::UInt(value as u64)
    }
}

impl From<i64> for Number {
    fn from(value: i64) -> Self {
        if value >= 0 {
            Number::UInt(value as u64)
        } else {
            Number::Int(value)
        }
    }
}

impl From<i32> for Number {
    fn from(value: i32) -> Self {
        Number::from(i64::from(value))
    }
}

impl From<f64> for Number {
    fn from(value: f64) -> Self {
        Number::Float(value)
    }
}

impl From<f32> for Number {
    fn from(value: f32) -> Self {
        Number::Float(f64::from(value))
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct ParseNumberError;

impl FromStr for Number {
    type Err = ParseNumberError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(ParseNumberError);
        }

        let is_integer_literal =
            !trimmed.contains('.') && !trimmed.contains('e') && !trimmed.contains('E');

        if is_integer_literal {
            if let Ok(v) = trimmed.parse::<i128>() {
                if let Some(n) = Number::from_i128(v) {
                    return Ok(n);
                }
            }
        }

        trimmed
            .parse::<f64>()
            .map(Number::Float)
            .map_err(|_| ParseNumberError)
    }
}

/// Low 64 bits of the float truncated toward zero. Magnitudes of 2^127 and above
/// are multiples of 2^64, as are infinities and NaN by convention.
fn wrap_float(f: f64) -> u64 {
    let truncated = f.trunc();
    if truncated.is_finite() && truncated.abs() < TWO_POW_127 {
        truncated as i128 as u64
    } else {
        0
    }
}

const TWO_POW_127: f64 = 170141183460469231731687303715884105728.0;

impl PartialEq for Number {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Number {}

impl Ord for Number {
    fn cmp(&self, other: &Self) -> Ordering {
        if let (Some(a), Some(b)) = (self.as_exact_i128(), other.as_exact_i128()) {
            return a.cmp(&b);
        }

        // NaN sorts above every other number and equals itself.
        self.as_f64().total_cmp(&other.as_f64())
    }
}

impl PartialOrd for Number {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
