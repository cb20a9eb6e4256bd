//! Streamed output: the engine's row sink over a worksheet.

use rust_xlsxwriter::Worksheet;

use crate::core::engine::RowSink;
use crate::error::FillResult;

/// Writes rendered rows into one output worksheet. The engine speaks
/// 1-based coordinates, the writer 0-based.
pub(crate) struct SheetSink<'a> {
    worksheet: &'a mut Worksheet,
}

impl<'a> SheetSink<'a> {
    pub fn new(worksheet: &'a mut Worksheet) -> Self {
        Self { worksheet }
    }
}

impl RowSink for SheetSink<'_> {
    fn write_row(&mut self, row: u32, cells: &[String]) -> FillResult<()> {
        let r = row - 1;
        for (c, cell) in cells.iter().enumerate() {
            self.worksheet.write_string(r, c as u16, cell)?;
        }
        Ok(())
    }
}
