//! The xlsx boundary: template ingestion and streamed output.
//!
//! The core is format-agnostic; everything workbook-shaped lives here.
//! Reading materialises each sheet as rows of cell text, writing adapts a
//! worksheet to the engine's row sink.

pub(crate) mod reader;
pub(crate) mod writer;
