// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.
#![allow(clippy::as_conversions, clippy::cast_possible_truncation)]

//! Conversion of untyped values into primitive kinds.
//!
//! Integer destinations follow fixed-width wraparound: the source is first viewed
//! as a 64-bit two's-complement integer and then truncated to the destination
//! width. Each call either yields a value or fails without side effects.

use crate::number::Number;
use crate::value::Value;
use crate::Rc;

use thiserror::Error;

/// Failure to convert a value into a primitive kind.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoercionError {
    #[error("Non-convertible type: cannot convert {found} into {expected}")]
    UnexpectedType {
        expected: &'static str,
        found: &'static str,
    },

    #[error("Cannot parse `{input}` as {expected}")]
    Parse { expected: &'static str, input: Rc<str> },
}

impl CoercionError {
    fn unexpected(expected: &'static str, value: &Value) -> Self {
        CoercionError::UnexpectedType {
            expected,
            found: value.type_name(),
        }
    }

    fn parse(expected: &'static str, input: &str) -> Self {
        CoercionError::Parse {
            expected,
            input: input.into(),
        }
    }
}

/// Primitive kinds an untyped value can be coerced into.
pub trait Coerce: Sized {
    /// Name of the destination kind used in diagnostics.
    const EXPECTED: &'static str;

    fn coerce(value: &Value) -> Result<Self, CoercionError>;
}

/// Parses the boolean literal spellings `1 t T TRUE true True` and
/// `0 f F FALSE false False`.
pub fn parse_bool(s: &str) -> Option<bool> {
    match s {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Some(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Some(false),
        _ => None,
    }
}

impl Coerce for bool {
    const EXPECTED: &'static str = "bool";

    fn coerce(value: &Value) -> Result<Self, CoercionError> {
        match value {
            Value::Null => Ok(false),
            Value::Bool(b) => Ok(*b),
            Value::String(s) => parse_bool(s).ok_or_else(|| CoercionError::parse("bool", s)),
            Value::Number(n) => Ok(!n.is_zero()),
            _ => Err(CoercionError::unexpected("bool", value)),
        }
    }
}

impl Coerce for String {
    const EXPECTED: &'static str = "string";

    fn coerce(value: &Value) -> Result<Self, CoercionError> {
        match value {
            Value::Null => Ok(String::new()),
            Value::Bool(b) => Ok(b.to_string()),
            Value::String(s) => Ok(s.to_string()),
            Value::Number(n) => Ok(n.format_decimal()),
            _ => Err(CoercionError::unexpected("string", value)),
        }
    }
}

impl Coerce for f64 {
    const EXPECTED: &'static str = "f64";

    fn coerce(value: &Value) -> Result<Self, CoercionError> {
        match value {
            Value::Null => Ok(0.0),
            Value::Number(n) => Ok(n.as_f64()),
            Value::String(s) => s
                .parse::<f64>()
                .map_err(|_| CoercionError::parse("f64", s)),
            _ => Err(CoercionError::unexpected("f64", value)),
        }
    }
}

impl Coerce for f32 {
    const EXPECTED: &'static str = "f32";

    fn coerce(value: &Value) -> Result<Self, CoercionError> {
        match value {
            Value::String(s) => s
                .parse::<f64>()
                .map(|f| f as f32)
                .map_err(|_| CoercionError::parse("f32", s)),
            Value::Null | Value::Number(_) => f64::coerce(value).map(|f| f as f32),
            _ => Err(CoercionError::unexpected("f32", value)),
        }
    }
}

/// 64-bit float coercion that reports failures as `NaN`.
pub fn float64_or_nan(value: &Value) -> f64 {
    f64::coerce(value).unwrap_or(f64::NAN)
}

fn signed(expected: &'static str, value: &Value) -> Result<i64, CoercionError> {
    match value {
        Value::Number(n) => Ok(n.wrapping_i64()),
        Value::String(s) => s
            .parse::<i64>()
            .map_err(|_| CoercionError::parse(expected, s)),
        _ => Err(CoercionError::unexpected(expected, value)),
    }
}

fn unsigned(expected: &'static str, value: &Value) -> Result<u64, CoercionError> {
    match value {
        Value::Number(n) => Ok(n.wrapping_u64()),
        // `u64::from_str` tolerates a leading `+`; unsigned literals must be bare digits.
        Value::String(s) if s.starts_with(['+', '-']) => Err(CoercionError::parse(expected, s)),
        Value::String(s) => s
            .parse::<u64>()
            .map_err(|_| CoercionError::parse(expected, s)),
        _ => Err(CoercionError::unexpected(expected, value)),
    }
}

macro_rules! coerce_signed {
    ($($t:ty),*) => {
        $(
            impl Coerce for $t {
                const EXPECTED: &'static str = stringify!($t);

                fn coerce(value: &Value) -> Result<Self, CoercionError> {
                    signed(Self::EXPECTED, value).map(|i| i as $t)
                }
            }
        )*
    };
}

macro_rules! coerce_unsigned {
    ($($t:ty),*) => {
        $(
            impl Coerce for $t {
                const EXPECTED: &'static str = stringify!($t);

                fn coerce(value: &Value) -> Result<Self, CoercionError> {
                    unsigned(Self::EXPECTED, value).map(|u| u as $t)
                }
            }
        )*
    };
}

coerce_signed!(i8, i16, i32, i64, isize);
coerce_unsigned!(u8, u16, u32, u64, usize);

impl Coerce for Number {
    const EXPECTED: &'static str = "number";

    fn coerce(value: &Value) -> Result<Self, CoercionError> {
        match value {
            Value::Number(n) => Ok(*n),
            Value::String(s) => s.parse().map_err(|_| CoercionError::parse("number", s)),
            _ => Err(CoercionError::unexpected("number", value)),
        }
    }
}
