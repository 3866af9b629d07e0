//! Primitive widening conversions
//!
//! ```text
//! from \ to   Z  B  C  S  I  J  F  D
//! Z           ✓
//! B              ✓     ✓  ✓  ✓  ✓  ✓
//! C                 ✓     ✓  ✓  ✓  ✓
//! S                    ✓  ✓  ✓  ✓  ✓
//! I                       ✓  ✓  ✓  ✓
//! J                          ✓  ✓  ✓
//! F                             ✓  ✓
//! D                                ✓
//! ```

use crate::value::{PrimitiveType, Value};

/// Check if a `from` value converts to `to` without narrowing
pub fn widens_to(from: PrimitiveType, to: PrimitiveType) -> bool {
    use PrimitiveType::*;
    if from == to {
        return from != Void;
    }
    matches!(
        (from, to),
        (Byte, Short | Int | Long | Float | Double)
            | (Char, Int | Long | Float | Double)
            | (Short, Int | Long | Float | Double)
            | (Int, Long | Float | Double)
            | (Long, Float | Double)
            | (Float, Double)
    )
}

/// Convert `value` to `to`, or `None` if no widening path exists
pub fn widen(value: &Value, to: PrimitiveType) -> Option<Value> {
    let from = value.primitive_type()?;
    if !widens_to(from, to) {
        return None;
    }
    if from == to {
        return Some(value.clone());
    }

    let (int, long, float, double) = match *value {
        Value::Byte(v) => (v as i32, v as i64, v as f32, v as f64),
        Value::Char(v) => (v as i32, v as i64, v as f32, v as f64),
        Value::Short(v) => (v as i32, v as i64, v as f32, v as f64),
        Value::Int(v) => (v, v as i64, v as f32, v as f64),
        Value::Long(v) => (0, v, v as f32, v as f64),
        Value::Float(v) => (0, 0, v, v as f64),
        _ => return None,
    };
    Some(match to {
        PrimitiveType::Short => Value::Short(int as i16),
        PrimitiveType::Int => Value::Int(int),
        PrimitiveType::Long => Value::Long(long),
        PrimitiveType::Float => Value::Float(float),
        PrimitiveType::Double => Value::Double(double),
        _ => return None,
    })
}
