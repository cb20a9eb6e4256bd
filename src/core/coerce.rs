//! Rule-driven conversion of a [`Value`] to a declared target type.
//!
//! The target set mirrors what helper parameters may declare: bool, the
//! fixed-width and platform-width integers, the two float widths, string,
//! and string-keyed map. Conversions apply a fixed promotion table; anything
//! outside the table fails with [`CoerceError`].

use std::fmt;

use crate::types::{DataMap, Value};

/// A type a helper parameter (or cell output) may be coerced to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetType {
    Bool,
    I8,
    I16,
    I32,
    I64,
    Isize,
    U8,
    U16,
    U32,
    U64,
    Usize,
    F32,
    F64,
    String,
    Map,
}

impl TargetType {
    fn is_int(self) -> bool {
        matches!(
            self,
            TargetType::I8 | TargetType::I16 | TargetType::I32 | TargetType::I64 | TargetType::Isize
        )
    }

    fn is_uint(self) -> bool {
        matches!(
            self,
            TargetType::U8 | TargetType::U16 | TargetType::U32 | TargetType::U64 | TargetType::Usize
        )
    }

    fn is_float(self) -> bool {
        matches!(self, TargetType::F32 | TargetType::F64)
    }
}

impl fmt::Display for TargetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TargetType::Bool => "bool",
            TargetType::I8 => "i8",
            TargetType::I16 => "i16",
            TargetType::I32 => "i32",
            TargetType::I64 => "i64",
            TargetType::Isize => "isize",
            TargetType::U8 => "u8",
            TargetType::U16 => "u16",
            TargetType::U32 => "u32",
            TargetType::U64 => "u64",
            TargetType::Usize => "usize",
            TargetType::F32 => "f32",
            TargetType::F64 => "f64",
            TargetType::String => "string",
            TargetType::Map => "map",
        };
        f.write_str(name)
    }
}

/// Failure to convert a value to its declared target type.
#[derive(Debug, Clone, PartialEq)]
pub struct CoerceError {
    pub message: String,
}

impl CoerceError {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    fn unsupported(value: &Value, target: TargetType) -> Self {
        Self::new(format!("cannot coerce {} to {}", value.kind(), target))
    }
}

impl fmt::Display for CoerceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "coercion error: {}", self.message)
    }
}

impl std::error::Error for CoerceError {}

/// Coerce `v` to `target` per the promotion table.
///
/// Absent maps to the target's zero value. Integer targets narrower than 64
/// bits truncate with wrapping casts; float-to-integer truncates toward
/// zero. String targets render the canonical textual form, and map targets
/// parse a JSON object out of the string form.
pub fn coerce(v: Value, target: TargetType) -> Result<Value, CoerceError> {
    if matches!(v, Value::Absent) {
        return Ok(zero_value(target));
    }

    if target == TargetType::String {
        return encode_string(&v).map(Value::Str);
    }

    if target == TargetType::Map {
        return coerce_map(v);
    }

    // A map feeding a scalar target first becomes its JSON string.
    let v = if matches!(v, Value::Map(_)) {
        Value::Str(encode_string(&v)?)
    } else {
        v
    };

    if target == TargetType::Bool {
        return match v {
            Value::Bool(b) => Ok(Value::Bool(b)),
            Value::Int(i) => Ok(Value::Bool(i != 0)),
            Value::Uint(u) => Ok(Value::Bool(u != 0)),
            Value::Float(f) => Ok(Value::Bool(f != 0.0)),
            // Documented behavior: empty string is true, anything else false.
            Value::Str(s) => Ok(Value::Bool(s.is_empty())),
            other => Err(CoerceError::unsupported(&other, target)),
        };
    }

    if target.is_int() {
        let wide = match v {
            Value::Bool(b) => b as i64,
            Value::Int(i) => i,
            Value::Uint(u) => u as i64,
            Value::Float(f) => f as i64,
            Value::Str(s) => s
                .parse::<i64>()
                .map_err(|e| CoerceError::new(format!("cannot parse `{s}` as {target}: {e}")))?,
            other => return Err(CoerceError::unsupported(&other, target)),
        };
        return Ok(Value::Int(truncate_int(wide, target)));
    }

    if target.is_uint() {
        let wide = match v {
            Value::Bool(b) => b as u64,
            Value::Int(i) => i as u64,
            Value::Uint(u) => u,
            Value::Float(f) => f as u64,
            Value::Str(s) => s
                .parse::<u64>()
                .map_err(|e| CoerceError::new(format!("cannot parse `{s}` as {target}: {e}")))?,
            other => return Err(CoerceError::unsupported(&other, target)),
        };
        return Ok(Value::Uint(truncate_uint(wide, target)));
    }

    if target.is_float() {
        let wide = match v {
            Value::Bool(b) => b as u8 as f64,
            Value::Int(i) => i as f64,
            Value::Uint(u) => u as f64,
            Value::Float(f) => f,
            Value::Str(s) => s
                .parse::<f64>()
                .map_err(|e| CoerceError::new(format!("cannot parse `{s}` as {target}: {e}")))?,
            other => return Err(CoerceError::unsupported(&other, target)),
        };
        return Ok(Value::Float(if target == TargetType::F32 {
            wide as f32 as f64
        } else {
            wide
        }));
    }

    Err(CoerceError::unsupported(&v, target))
}

/// Shorthand for the string target, unwrapped to `String`.
pub fn to_display_string(v: Value) -> Result<String, CoerceError> {
    match coerce(v, TargetType::String)? {
        Value::Str(s) => Ok(s),
        _ => unreachable!("string coercion always yields a string"),
    }
}

fn coerce_map(v: Value) -> Result<Value, CoerceError> {
    let text = match v {
        Value::Map(_) => return Ok(v),
        Value::Str(s) => s,
        other => return Err(CoerceError::unsupported(&other, TargetType::Map)),
    };
    let parsed: serde_json::Value = serde_json::from_str(&text)
        .map_err(|e| CoerceError::new(format!("cannot parse `{text}` as a JSON map: {e}")))?;
    match Value::from(parsed) {
        Value::Map(m) => Ok(Value::Map(m)),
        other => Err(CoerceError::new(format!(
            "JSON `{text}` is {}, not a map",
            other.kind()
        ))),
    }
}

/// Canonical textual encoding: JSON-shaped, with floats in their natural
/// (shortest integral) form.
fn encode_string(v: &Value) -> Result<String, CoerceError> {
    match v {
        Value::Absent => Ok(String::new()),
        Value::Bool(b) => Ok(if *b { "true" } else { "false" }.to_string()),
        Value::Int(i) => Ok(i.to_string()),
        Value::Uint(u) => Ok(u.to_string()),
        Value::Float(f) => {
            if f.fract() == 0.0 && f.abs() < 1e15 {
                Ok(format!("{}", *f as i64))
            } else {
                Ok(format!("{f}"))
            }
        }
        Value::Str(s) => Ok(s.clone()),
        Value::List(_) | Value::Map(_) => {
            let json = v
                .to_json()
                .ok_or_else(|| CoerceError::unsupported(v, TargetType::String))?;
            serde_json::to_string(&json)
                .map_err(|e| CoerceError::new(format!("cannot encode {}: {e}", v.kind())))
        }
        Value::Stream(_) => Err(CoerceError::unsupported(v, TargetType::String)),
    }
}

fn zero_value(target: TargetType) -> Value {
    match target {
        TargetType::Bool => Value::Bool(false),
        t if t.is_int() => Value::Int(0),
        t if t.is_uint() => Value::Uint(0),
        t if t.is_float() => Value::Float(0.0),
        TargetType::String => Value::Str(String::new()),
        TargetType::Map => Value::Map(DataMap::new()),
        _ => unreachable!(),
    }
}

fn truncate_int(i: i64, target: TargetType) -> i64 {
    match target {
        TargetType::I8 => i as i8 as i64,
        TargetType::I16 => i as i16 as i64,
        TargetType::I32 => i as i32 as i64,
        TargetType::Isize => i as isize as i64,
        _ => i,
    }
}

fn truncate_uint(u: u64, target: TargetType) -> u64 {
    match target {
        TargetType::U8 => u as u8 as u64,
        TargetType::U16 => u as u16 as u64,
        TargetType::U32 => u as u32 as u64,
        TargetType::Usize => u as usize as u64,
        _ => u,
    }
}
