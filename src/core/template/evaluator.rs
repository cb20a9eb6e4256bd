//! Expression evaluation against a data scope.

use std::panic::{catch_unwind, AssertUnwindSafe};

use crate::core::coerce::to_display_string;
use crate::core::helpers::HelperError;
use crate::error::{FillError, FillResult};
use crate::types::{DataMap, RenderContext, Value};

use super::parser::{CallExpr, Expr};

/// Evaluate a parsed expression.
///
/// Sequences render each child to its string form and concatenate; key
/// lookups produce the stored value or absent; calls coerce their evaluated
/// arguments to the helper's declared inputs and invoke it. A panic inside
/// a helper is caught and reported as a code-20002 failure rather than
/// unwinding through the render.
pub fn eval(expr: &Expr, ctx: &RenderContext, data: &DataMap) -> FillResult<Value> {
    match expr {
        Expr::Literal(s) => Ok(Value::Str(s.clone())),
        Expr::KeyRef(key) => Ok(data.get(key).cloned().unwrap_or(Value::Absent)),
        Expr::Sequence(items) => {
            let mut rendered = String::new();
            for item in items {
                let value = eval(item, ctx, data)?;
                rendered.push_str(&to_display_string(value)?);
            }
            Ok(Value::Str(rendered))
        }
        Expr::Call(call) => {
            let mut args = Vec::with_capacity(call.args.len());
            for arg in &call.args {
                args.push(eval(arg, ctx, data)?);
            }
            invoke(call, ctx, args)
        }
    }
}

fn invoke(call: &CallExpr, ctx: &RenderContext, args: Vec<Value>) -> FillResult<Value> {
    let outcome = catch_unwind(AssertUnwindSafe(|| call.helper.invoke(ctx, args)));
    match outcome {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(HelperError::Coerce(e))) => Err(FillError::Coerce(e)),
        Ok(Err(HelperError::Failed(source))) => Err(FillError::Helper {
            name: call.name.clone(),
            source,
        }),
        Err(payload) => Err(FillError::HelperPanic {
            name: call.name.clone(),
            message: panic_message(payload),
        }),
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
