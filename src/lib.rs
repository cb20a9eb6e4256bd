//! sheetfill - template-driven xlsx report generator
//!
//! Templates are ordinary workbooks whose cells may contain templating
//! markers. Rendering applies a data context to those markers and produces
//! a new workbook:
//!
//! - `{{name}}` inserts the value under `name` in the data context.
//! - `{{helper arg "literal" {{nested k}}}}` calls a registered helper.
//!   Arguments are coerced to the helper's declared parameter types.
//! - A row starting with `{{range key}}` repeats the rows up to the
//!   matching `{{end}}` once per element of the data under `key`. Elements
//!   may come from an eager list or a lazy producer
//!   ([`ValueStream`]); range blocks nest.
//!
//! # Example
//!
//! ```no_run
//! use sheetfill::{RenderContext, Renderer, Value};
//!
//! let mut renderer = Renderer::from_path("template.xlsx")?;
//! renderer.register_helper("upper", |s: String| s.to_uppercase())?;
//!
//! let data: serde_json::Value = serde_json::from_str(
//!     r#"{"title": "Report", "rows": [{"item": "a"}, {"item": "b"}]}"#,
//! )?;
//! renderer.render(&RenderContext::new(), Value::from(data))?;
//! std::fs::write("report.xlsx", renderer.result())?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! Rendering is cooperative: a [`RenderContext`] carries a cancellation
//! flag checked before every row, and helpers that declare a leading
//! `&RenderContext` parameter receive the same context, including any
//! values attached with [`RenderContext::with_value`].

pub mod cli;
pub mod core;
pub mod error;
pub mod excel;
pub mod renderer;
pub mod types;

pub use crate::core::coerce::{CoerceError, TargetType};
pub use crate::core::helpers::{
    FromValue, Helper, HelperRegistry, HelperSignature, IntoValue,
};
pub use crate::core::stream::ValueStream;
pub use crate::core::template::parser::ParseError;
pub use crate::error::{FillError, FillResult};
pub use crate::renderer::Renderer;
pub use crate::types::{DataMap, RenderContext, Value};
