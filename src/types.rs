use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::core::stream::ValueStream;
use crate::error::{FillError, FillResult};

/// String-keyed data scope handed to the evaluator and the row engine.
pub type DataMap = HashMap<String, Value>;

/// Dynamically-typed value flowing through the renderer.
///
/// Every ingress point (entry data, range elements, helper results) produces
/// one of these; runtime type checks are exhaustive matches on the tag.
#[derive(Debug, Clone)]
pub enum Value {
    /// Explicit "no value". Coerces to the target type's zero value.
    Absent,
    Bool(bool),
    Int(i64),
    Uint(u64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
    Map(DataMap),
    /// Bounded, single-pass producer of values. Consumed at most once;
    /// clones share the same underlying channel.
    Stream(ValueStream),
}

impl Value {
    /// Short tag name used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Absent => "absent",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Uint(_) => "uint",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::List(_) => "list",
            Value::Map(_) => "map",
            Value::Stream(_) => "stream",
        }
    }

    /// View this value as a string-keyed map.
    ///
    /// Absent becomes an empty map; anything that is not a map fails with
    /// the stable code 20000.
    pub fn into_data_map(self) -> FillResult<DataMap> {
        match self {
            Value::Absent => Ok(DataMap::new()),
            Value::Map(m) => Ok(m),
            _ => Err(FillError::NotStringKeyMap),
        }
    }

    /// Canonical JSON form, or `None` for values with no textual encoding
    /// (streams).
    pub fn to_json(&self) -> Option<serde_json::Value> {
        match self {
            Value::Absent => Some(serde_json::Value::Null),
            Value::Bool(b) => Some(serde_json::Value::Bool(*b)),
            Value::Int(i) => Some(serde_json::Value::from(*i)),
            Value::Uint(u) => Some(serde_json::Value::from(*u)),
            Value::Float(f) => serde_json::Number::from_f64(*f).map(serde_json::Value::Number),
            Value::Str(s) => Some(serde_json::Value::String(s.clone())),
            Value::List(items) => items
                .iter()
                .map(Value::to_json)
                .collect::<Option<Vec<_>>>()
                .map(serde_json::Value::Array),
            Value::Map(m) => m
                .iter()
                .map(|(k, v)| v.to_json().map(|j| (k.clone(), j)))
                .collect::<Option<serde_json::Map<_, _>>>()
                .map(serde_json::Value::Object),
            Value::Stream(_) => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Absent, Value::Absent) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Uint(a), Value::Uint(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            (Value::Stream(a), Value::Stream(b)) => a.same_channel(b),
            _ => false,
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::Uint(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::List(v)
    }
}

impl From<DataMap> for Value {
    fn from(v: DataMap) -> Self {
        Value::Map(v)
    }
}

impl From<ValueStream> for Value {
    fn from(v: ValueStream) -> Self {
        Value::Stream(v)
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Value::Absent,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else if let Some(u) = n.as_u64() {
                    Value::Uint(u)
                } else {
                    Value::Float(n.as_f64().unwrap_or_default())
                }
            }
            serde_json::Value::String(s) => Value::Str(s),
            serde_json::Value::Array(items) => {
                Value::List(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(entries) => Value::Map(
                entries
                    .into_iter()
                    .map(|(k, v)| (k, Value::from(v)))
                    .collect(),
            ),
        }
    }
}

/// Ambient state threaded through a render: a shared cancellation flag plus
/// caller-attached values readable by helpers that declare a context
/// parameter.
///
/// Cloning shares the cancellation flag, so a context handed to a producer
/// thread observes the same `cancel()`.
#[derive(Debug, Clone, Default)]
pub struct RenderContext {
    cancel: Arc<AtomicBool>,
    values: HashMap<String, Value>,
}

impl RenderContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cooperative cancellation. The engine checks the flag before
    /// every template-row step.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    /// Attach an ambient value under `key`, returning the extended context.
    /// The cancellation flag stays shared with `self`.
    pub fn with_value(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    /// Look up an ambient value attached with [`with_value`](Self::with_value).
    pub fn value(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }
}
