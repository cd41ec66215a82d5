//! # Numeric Coercion
//!
//! The one place where mixed numeric kinds become an `f64`.
//!
//! The accepted inputs are a closed set. Each variant has exactly one
//! widening rule:
//!
//! | Input            | Rule                                                   |
//! |------------------|--------------------------------------------------------|
//! | `I8`..`I32`      | exact, every value fits in the 53-bit mantissa         |
//! | `I64`            | exact when `|v| <= 2^53`, otherwise rejected           |
//! | `U8`..`U32`      | exact                                                  |
//! | `U64`            | exact when `v <= 2^53`, otherwise rejected             |
//! | `F32`            | lossless widening, rejected if NaN or infinite         |
//! | `F64`            | identity, rejected if NaN or infinite                  |
//! | `Str`            | decimal parse of the trimmed text, must be finite      |
//!
//! Anything else (booleans, arbitrary text) is a [`ExprError::Conversion`].
//! Rejecting instead of rounding keeps every validator on the same bits.

use crate::error::{ExprError, ExprResult};
use crate::value::Value;

/// Largest integer magnitude an `f64` represents exactly.
pub const MAX_EXACT_INT: u64 = 1 << 53;

/// Closed set of numeric inputs accepted by [`Numeric::to_f64`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Numeric<'a> {
    /// Signed 8-bit.
    I8(i8),
    /// Signed 16-bit.
    I16(i16),
    /// Signed 32-bit.
    I32(i32),
    /// Signed 64-bit.
    I64(i64),
    /// Unsigned 8-bit.
    U8(u8),
    /// Unsigned 16-bit.
    U16(u16),
    /// Unsigned 32-bit.
    U32(u32),
    /// Unsigned 64-bit.
    U64(u64),
    /// Single precision float.
    F32(f32),
    /// Double precision float.
    F64(f64),
    /// Decimal text such as `"12.5"`.
    Str(&'a str),
}

impl<'a> Numeric<'a> {
    /// Converts a runtime value into the closed numeric set.
    ///
    /// # Errors
    ///
    /// Booleans are not numeric.
    pub fn from_value(value: &'a Value) -> ExprResult<Self> {
        match value {
            Value::Int(v) => Ok(Self::I64(*v)),
            Value::Float(v) => Ok(Self::F64(*v)),
            Value::Str(s) => Ok(Self::Str(s)),
            Value::Bool(_) => Err(ExprError::Conversion {
                from: "bool".into(),
                to: "double",
            }),
        }
    }

    /// Widens to `f64` following the table in the module docs.
    ///
    /// # Errors
    ///
    /// Returns [`ExprError::Conversion`] when the value cannot be represented
    /// exactly or is not a finite number.
    pub fn to_f64(self) -> ExprResult<f64> {
        let out = match self {
            Self::I8(v) => f64::from(v),
            Self::I16(v) => f64::from(v),
            Self::I32(v) => f64::from(v),
            Self::U8(v) => f64::from(v),
            Self::U16(v) => f64::from(v),
            Self::U32(v) => f64::from(v),
            Self::I64(v) => {
                if v.unsigned_abs() > MAX_EXACT_INT {
                    return Err(self.reject());
                }
                #[allow(clippy::cast_precision_loss)]
                let f = v as f64;
                f
            }
            Self::U64(v) => {
                if v > MAX_EXACT_INT {
                    return Err(self.reject());
                }
                #[allow(clippy::cast_precision_loss)]
                let f = v as f64;
                f
            }
            Self::F32(v) => f64::from(v),
            Self::F64(v) => v,
            Self::Str(s) => s.trim().parse::<f64>().map_err(|_| self.reject())?,
        };
        if out.is_finite() {
            Ok(out)
        } else {
            Err(self.reject())
        }
    }

    fn reject(self) -> ExprError {
        let from = match self {
            Self::I8(v) => format!("i8 {v}"),
            Self::I16(v) => format!("i16 {v}"),
            Self::I32(v) => format!("i32 {v}"),
            Self::I64(v) => format!("i64 {v}"),
            Self::U8(v) => format!("u8 {v}"),
            Self::U16(v) => format!("u16 {v}"),
            Self::U32(v) => format!("u32 {v}"),
            Self::U64(v) => format!("u64 {v}"),
            Self::F32(v) => format!("f32 {v}"),
            Self::F64(v) => format!("f64 {v}"),
            Self::Str(s) => format!("string {s:?}"),
        };
        ExprError::Conversion { from, to: "double" }
    }
}

macro_rules! numeric_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Numeric<'_> {
                fn from(v: $ty) -> Self {
                    Self::$variant(v)
                }
            }
        )*
    };
}

numeric_from!(
    i8 => I8, i16 => I16, i32 => I32, i64 => I64,
    u8 => U8, u16 => U16, u32 => U32, u64 => U64,
    f32 => F32, f64 => F64,
);

impl<'a> From<&'a str> for Numeric<'a> {
    fn from(v: &'a str) -> Self {
        Self::Str(v)
    }
}

/// Narrows a float to an integer when it is finite, integral and in range.
///
/// # Errors
///
/// Returns [`ExprError::Conversion`] for fractional or out-of-range input.
pub fn integral_f64_to_i64(v: f64) -> ExprResult<i64> {
    // 2^63 is exactly representable; anything at or beyond it overflows i64.
    const LIMIT: f64 = 9_223_372_036_854_775_808.0;
    if v.is_finite() && v.fract() == 0.0 && v >= -LIMIT && v < LIMIT {
        #[allow(clippy::cast_possible_truncation)]
        let i = v as i64;
        Ok(i)
    } else {
        Err(ExprError::Conversion {
            from: format!("double {v}"),
            to: "int",
        })
    }
}
