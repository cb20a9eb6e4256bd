//! Helper registration and lookup.
//!
//! A helper is a user-supplied function invoked from a call expression.
//! Its signature (optional leading [`RenderContext`] parameter, typed
//! inputs, optional value output, optional error output) is extracted from
//! the callable's Rust type at registration and recorded next to a
//! type-erased invoker. The invoker takes positional [`Value`]s, coerces
//! each to the declared parameter type, and adapts the return to
//! value-or-error.
//!
//! Shapes the original system rejected at runtime (not a function, more
//! than two outputs, unsupported parameter types) are unrepresentable here:
//! only callables matching one of the [`Helper`] impls can reach
//! [`HelperRegistry::register`]. The single runtime failure left is a
//! duplicate name.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::core::coerce::{coerce, CoerceError, TargetType};
use crate::error::{FillError, FillResult};
use crate::types::{DataMap, RenderContext, Value};

/// Failure surfaced by a helper invocation: either an argument refused its
/// declared type, or the helper returned its error output.
#[derive(Debug)]
pub enum HelperError {
    Coerce(CoerceError),
    Failed(Box<dyn std::error::Error + Send + Sync>),
}

impl From<CoerceError> for HelperError {
    fn from(e: CoerceError) -> Self {
        HelperError::Coerce(e)
    }
}

/// Introspected shape of a registered helper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HelperSignature {
    /// Whether the callable takes a leading `&RenderContext`.
    pub ctx_in: bool,
    /// Declared types of the templated inputs, in order.
    pub inputs: Vec<TargetType>,
    /// Whether the return carries a value output.
    pub returns_value: bool,
    /// Whether the return carries an error output.
    pub returns_error: bool,
}

impl HelperSignature {
    /// Number of arguments a call expression must supply.
    pub fn arity(&self) -> usize {
        self.inputs.len()
    }
}

/// A parameter type a helper may declare.
pub trait FromValue: Sized {
    const TARGET: TargetType;
    fn from_value(v: Value) -> Result<Self, CoerceError>;
}

macro_rules! from_value_signed {
    ($($ty:ty => $target:ident),* $(,)?) => {$(
        impl FromValue for $ty {
            const TARGET: TargetType = TargetType::$target;
            fn from_value(v: Value) -> Result<Self, CoerceError> {
                match coerce(v, Self::TARGET)? {
                    Value::Int(i) => Ok(i as $ty),
                    _ => unreachable!("integer coercion always yields an int"),
                }
            }
        }
    )*};
}

macro_rules! from_value_unsigned {
    ($($ty:ty => $target:ident),* $(,)?) => {$(
        impl FromValue for $ty {
            const TARGET: TargetType = TargetType::$target;
            fn from_value(v: Value) -> Result<Self, CoerceError> {
                match coerce(v, Self::TARGET)? {
                    Value::Uint(u) => Ok(u as $ty),
                    _ => unreachable!("unsigned coercion always yields a uint"),
                }
            }
        }
    )*};
}

from_value_signed! {
    i8 => I8,
    i16 => I16,
    i32 => I32,
    i64 => I64,
    isize => Isize,
}

from_value_unsigned! {
    u8 => U8,
    u16 => U16,
    u32 => U32,
    u64 => U64,
    usize => Usize,
}

impl FromValue for bool {
    const TARGET: TargetType = TargetType::Bool;
    fn from_value(v: Value) -> Result<Self, CoerceError> {
        match coerce(v, Self::TARGET)? {
            Value::Bool(b) => Ok(b),
            _ => unreachable!("bool coercion always yields a bool"),
        }
    }
}

impl FromValue for f32 {
    const TARGET: TargetType = TargetType::F32;
    fn from_value(v: Value) -> Result<Self, CoerceError> {
        match coerce(v, Self::TARGET)? {
            Value::Float(f) => Ok(f as f32),
            _ => unreachable!("float coercion always yields a float"),
        }
    }
}

impl FromValue for f64 {
    const TARGET: TargetType = TargetType::F64;
    fn from_value(v: Value) -> Result<Self, CoerceError> {
        match coerce(v, Self::TARGET)? {
            Value::Float(f) => Ok(f),
            _ => unreachable!("float coercion always yields a float"),
        }
    }
}

impl FromValue for String {
    const TARGET: TargetType = TargetType::String;
    fn from_value(v: Value) -> Result<Self, CoerceError> {
        match coerce(v, Self::TARGET)? {
            Value::Str(s) => Ok(s),
            _ => unreachable!("string coercion always yields a string"),
        }
    }
}

impl FromValue for DataMap {
    const TARGET: TargetType = TargetType::Map;
    fn from_value(v: Value) -> Result<Self, CoerceError> {
        match coerce(v, Self::TARGET)? {
            Value::Map(m) => Ok(m),
            _ => unreachable!("map coercion always yields a map"),
        }
    }
}

/// A value a helper may produce. `()` means "no value output".
pub trait IntoValue {
    const PRODUCES_VALUE: bool = true;
    fn into_value(self) -> Value;
}

macro_rules! into_value {
    ($($ty:ty => $make:expr),* $(,)?) => {$(
        impl IntoValue for $ty {
            fn into_value(self) -> Value {
                let make: fn($ty) -> Value = $make;
                make(self)
            }
        }
    )*};
}

into_value! {
    bool => Value::Bool,
    i8 => |v| Value::Int(v as i64),
    i16 => |v| Value::Int(v as i64),
    i32 => |v| Value::Int(v as i64),
    i64 => Value::Int,
    isize => |v| Value::Int(v as i64),
    u8 => |v| Value::Uint(v as u64),
    u16 => |v| Value::Uint(v as u64),
    u32 => |v| Value::Uint(v as u64),
    u64 => Value::Uint,
    usize => |v| Value::Uint(v as u64),
    f32 => |v| Value::Float(v as f64),
    f64 => Value::Float,
    String => Value::Str,
    &'static str => |v| Value::Str(v.to_string()),
    DataMap => Value::Map,
    Value => |v| v,
}

impl IntoValue for () {
    const PRODUCES_VALUE: bool = false;
    fn into_value(self) -> Value {
        Value::Absent
    }
}

/// A return shape a helper may declare: a plain value output, or a
/// `Result` pairing a value output with an error output (`Result<(), E>`
/// being the error-only shape).
pub trait HelperResult {
    const RETURNS_VALUE: bool;
    const RETURNS_ERROR: bool;
    fn into_helper_result(self) -> Result<Value, HelperError>;
}

macro_rules! helper_result_values {
    ($($ty:ty),* $(,)?) => {$(
        impl HelperResult for $ty {
            const RETURNS_VALUE: bool = <$ty as IntoValue>::PRODUCES_VALUE;
            const RETURNS_ERROR: bool = false;
            fn into_helper_result(self) -> Result<Value, HelperError> {
                Ok(self.into_value())
            }
        }
    )*};
}

helper_result_values! {
    (), bool,
    i8, i16, i32, i64, isize,
    u8, u16, u32, u64, usize,
    f32, f64,
    String, &'static str,
    DataMap, Value,
}

impl<T, E> HelperResult for Result<T, E>
where
    T: IntoValue,
    E: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    const RETURNS_VALUE: bool = T::PRODUCES_VALUE;
    const RETURNS_ERROR: bool = true;
    fn into_helper_result(self) -> Result<Value, HelperError> {
        match self {
            Ok(v) => Ok(v.into_value()),
            Err(e) => Err(HelperError::Failed(e.into())),
        }
    }
}

/// Marker for helper shapes without a context parameter. Appears only in
/// the `Args` tag of [`Helper`] impls, never in user code.
pub struct NoCtx(());

/// Marker for helper shapes whose first parameter is the ambient context.
pub struct WithCtx(());

/// A callable registerable as a helper. Implemented for `Fn` shapes of up
/// to eight typed inputs, with or without a leading `&RenderContext`.
pub trait Helper<Args>: Send + Sync + 'static {
    fn signature(&self) -> HelperSignature;
    fn invoke(&self, ctx: &RenderContext, args: Vec<Value>) -> Result<Value, HelperError>;
}

macro_rules! impl_helper {
    ($($arg:ident),*) => {
        impl<Func, Ret, $($arg),*> Helper<fn(NoCtx, $($arg),*) -> Ret> for Func
        where
            Func: Fn($($arg),*) -> Ret + Send + Sync + 'static,
            Ret: HelperResult,
            $($arg: FromValue + 'static,)*
        {
            fn signature(&self) -> HelperSignature {
                HelperSignature {
                    ctx_in: false,
                    inputs: vec![$(<$arg as FromValue>::TARGET),*],
                    returns_value: Ret::RETURNS_VALUE,
                    returns_error: Ret::RETURNS_ERROR,
                }
            }

            #[allow(non_snake_case, unused_variables, unused_mut)]
            fn invoke(&self, ctx: &RenderContext, args: Vec<Value>) -> Result<Value, HelperError> {
                let mut args = args.into_iter();
                $(let $arg = <$arg as FromValue>::from_value(args.next().unwrap_or(Value::Absent))?;)*
                (self)($($arg),*).into_helper_result()
            }
        }

        impl<Func, Ret, $($arg),*> Helper<fn(WithCtx, $($arg),*) -> Ret> for Func
        where
            Func: Fn(&RenderContext, $($arg),*) -> Ret + Send + Sync + 'static,
            Ret: HelperResult,
            $($arg: FromValue + 'static,)*
        {
            fn signature(&self) -> HelperSignature {
                HelperSignature {
                    ctx_in: true,
                    inputs: vec![$(<$arg as FromValue>::TARGET),*],
                    returns_value: Ret::RETURNS_VALUE,
                    returns_error: Ret::RETURNS_ERROR,
                }
            }

            #[allow(non_snake_case, unused_variables, unused_mut)]
            fn invoke(&self, ctx: &RenderContext, args: Vec<Value>) -> Result<Value, HelperError> {
                let mut args = args.into_iter();
                $(let $arg = <$arg as FromValue>::from_value(args.next().unwrap_or(Value::Absent))?;)*
                (self)(ctx, $($arg),*).into_helper_result()
            }
        }
    };
}

impl_helper!();
impl_helper!(A1);
impl_helper!(A1, A2);
impl_helper!(A1, A2, A3);
impl_helper!(A1, A2, A3, A4);
impl_helper!(A1, A2, A3, A4, A5);
impl_helper!(A1, A2, A3, A4, A5, A6);
impl_helper!(A1, A2, A3, A4, A5, A6, A7);
impl_helper!(A1, A2, A3, A4, A5, A6, A7, A8);

/// A helper as stored in the registry: name, introspected signature, and
/// the type-erased invoker.
pub struct RegisteredHelper {
    name: String,
    signature: HelperSignature,
    invoke: Box<dyn Fn(&RenderContext, Vec<Value>) -> Result<Value, HelperError> + Send + Sync>,
}

impl RegisteredHelper {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn signature(&self) -> &HelperSignature {
        &self.signature
    }

    pub fn invoke(&self, ctx: &RenderContext, args: Vec<Value>) -> Result<Value, HelperError> {
        (self.invoke)(ctx, args)
    }
}

impl fmt::Debug for RegisteredHelper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisteredHelper")
            .field("name", &self.name)
            .field("signature", &self.signature)
            .finish_non_exhaustive()
    }
}

/// Named helper functions available to a renderer.
///
/// Registration happens before rendering starts; the registry is only read
/// afterwards. Handing the registry to the renderer by value (rather than
/// through a process global) keeps that discipline checkable.
#[derive(Debug, Default)]
pub struct HelperRegistry {
    helpers: HashMap<String, Arc<RegisteredHelper>>,
}

impl HelperRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `helper` under `name`. Fails only on a duplicate name.
    pub fn register<Args, H>(&mut self, name: impl Into<String>, helper: H) -> FillResult<()>
    where
        H: Helper<Args>,
    {
        let name = name.into();
        if self.helpers.contains_key(&name) {
            return Err(FillError::DuplicateHelper(name));
        }
        let signature = helper.signature();
        let registered = RegisteredHelper {
            name: name.clone(),
            signature,
            invoke: Box::new(move |ctx, args| helper.invoke(ctx, args)),
        };
        self.helpers.insert(name, Arc::new(registered));
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Arc<RegisteredHelper>> {
        self.helpers.get(name)
    }

    pub fn len(&self) -> usize {
        self.helpers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.helpers.is_empty()
    }
}
