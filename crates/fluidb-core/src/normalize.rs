//! Value normalization applied before a record is written.
//!
//! In order:
//! 1. text is trimmed and empty text becomes NULL (when enabled);
//! 2. unsigned and narrow integers become `i64`; `u64` values beyond
//!    `i64::MAX` become decimals;
//! 3. integral floats, integral decimals and canonical integer text become
//!    `i64` when nothing is lost (when enabled);
//! 4. the dialect narrows integers and converts what the driver cannot
//!    take natively.

use fluidb_common::{FluidResult, Record, StoreConfig, Value};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::dialect::Dialect;

/// Value relaxations; all enabled by default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValueRelaxations {
    /// Trim leading and trailing whitespace from text.
    pub trim_strings: bool,
    /// Store empty text as NULL.
    pub empty_string_to_null: bool,
    /// Store integral floats, decimals and canonical integer text as integers.
    pub recognize_integers: bool,
}

impl Default for ValueRelaxations {
    fn default() -> Self {
        Self {
            trim_strings: true,
            empty_string_to_null: true,
            recognize_integers: true,
        }
    }
}

impl From<&StoreConfig> for ValueRelaxations {
    fn from(config: &StoreConfig) -> Self {
        Self {
            trim_strings: config.trim_strings,
            empty_string_to_null: config.empty_string_to_null,
            recognize_integers: config.recognize_integers,
        }
    }
}

/// Parses text as an integer only if formatting the integer reproduces
/// the text exactly, so `"007"`, `"+7"` and `" 7"` stay text.
pub fn recognize_integer_text(text: &str) -> Option<i64> {
    let parsed: i64 = text.parse().ok()?;
    (parsed.to_string() == text).then_some(parsed)
}

/// Converts a float to an integer when it is finite, integral and in range.
pub fn recognize_integer_float(value: f64) -> Option<i64> {
    // 2^63 is exactly representable; every float below it and at or above
    // -2^63 converts without saturating.
    const LIMIT: f64 = 9_223_372_036_854_775_808.0;
    if value.is_finite() && value.fract() == 0.0 && value >= -LIMIT && value < LIMIT {
        Some(value as i64)
    } else {
        None
    }
}

/// Converts a decimal to an integer when it has no fractional part and
/// fits.
pub fn recognize_integer_decimal(value: &Decimal) -> Option<i64> {
    if value.fract().is_zero() {
        value.to_i64()
    } else {
        None
    }
}

/// Normalizes one value for storage.
pub fn normalize_value(
    dialect: &dyn Dialect,
    relax: &ValueRelaxations,
    value: Value,
) -> FluidResult<Value> {
    let value = match value {
        Value::Text(text) => relax_text(relax, text),
        Value::I8(i) => Value::I64(i64::from(i)),
        Value::I16(i) => Value::I64(i64::from(i)),
        Value::I32(i) => Value::I64(i64::from(i)),
        Value::U8(i) => Value::I64(i64::from(i)),
        Value::U16(i) => Value::I64(i64::from(i)),
        Value::U32(i) => Value::I64(i64::from(i)),
        Value::U64(u) => match i64::try_from(u) {
            Ok(i) => Value::I64(i),
            Err(_) => Value::Decimal(Decimal::from(u)),
        },
        Value::F64(f) if relax.recognize_integers => {
            recognize_integer_float(f).map_or(Value::F64(f), Value::I64)
        }
        Value::Decimal(d) if relax.recognize_integers => {
            recognize_integer_decimal(&d).map_or(Value::Decimal(d), Value::I64)
        }
        other => other,
    };

    let value = match value {
        Value::I64(i) => dialect.normalize_integer_for_storage(i),
        other => other,
    };
    dialect.convert_for_storage(value)
}

fn relax_text(relax: &ValueRelaxations, text: String) -> Value {
    let text = if relax.trim_strings {
        let trimmed = text.trim();
        if trimmed.len() == text.len() {
            text
        } else {
            trimmed.to_string()
        }
    } else {
        text
    };

    if text.is_empty() && relax.empty_string_to_null {
        return Value::Null;
    }
    if relax.recognize_integers {
        if let Some(i) = recognize_integer_text(&text) {
            return Value::I64(i);
        }
    }
    Value::Text(text)
}

/// Normalizes every value of a record.
pub fn normalize_record(
    dialect: &dyn Dialect,
    relax: &ValueRelaxations,
    record: &Record,
) -> FluidResult<Record> {
    record
        .iter()
        .map(|(name, value)| Ok((name.clone(), normalize_value(dialect, relax, value.clone())?)))
        .collect()
}
