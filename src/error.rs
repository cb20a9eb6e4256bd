use thiserror::Error;

use crate::core::coerce::CoerceError;
use crate::core::template::parser::ParseError;

pub type FillResult<T> = Result<T, FillError>;

/// Crate-wide error type.
///
/// The structural failures that callers are expected to dispatch on carry a
/// stable numeric code (see [`FillError::code`]); everything else is
/// descriptive text.
#[derive(Error, Debug)]
pub enum FillError {
    #[error("failed to read template workbook: {0}")]
    TemplateRead(#[from] calamine::XlsxError),

    #[error("failed to write output workbook: {0}")]
    OutputWrite(#[from] rust_xlsxwriter::XlsxError),

    /// Input data (or a sheet-keyed entry) is not a string-keyed map. Code 20000.
    #[error("code: 20000, not a string-keyed map value")]
    NotStringKeyMap,

    /// A `{{range ...}}` row has no matching `{{end}}`. Code 20001.
    #[error("code: 20001, range `{0}` has no matching end")]
    NoMatchRangeEnd(String),

    /// Rendering was cancelled through the [`RenderContext`](crate::RenderContext). Code 20002.
    #[error("code: 20002, render cancelled")]
    Cancelled,

    /// A helper panicked during evaluation. Code 20002.
    #[error("code: 20002, helper `{name}` panicked: {message}")]
    HelperPanic { name: String, message: String },

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Coerce(#[from] CoerceError),

    /// A helper returned its error output.
    #[error("helper `{name}` failed: {source}")]
    Helper {
        name: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Rejected helper registration.
    #[error("helper `{0}` is already registered")]
    DuplicateHelper(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid data file: {0}")]
    Data(#[from] serde_json::Error),
}

impl FillError {
    /// Stable machine-readable code, where the taxonomy defines one.
    pub fn code(&self) -> Option<u32> {
        match self {
            FillError::NotStringKeyMap => Some(20000),
            FillError::NoMatchRangeEnd(_) => Some(20001),
            FillError::Cancelled | FillError::HelperPanic { .. } => Some(20002),
            _ => None,
        }
    }
}
