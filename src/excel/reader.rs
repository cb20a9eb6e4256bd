//! Template workbook ingestion.

use std::io::Cursor;

use calamine::{Data, Range, Reader, Xlsx};

use crate::error::FillResult;

/// One sheet of the template, read fully into memory: the grid from row 1
/// to the last used row, each row trimmed of trailing empty cells.
#[derive(Debug, Clone)]
pub(crate) struct SheetTemplate {
    pub name: String,
    pub rows: Vec<Vec<String>>,
}

/// Open a workbook from raw bytes and read every sheet in workbook order.
pub(crate) fn read_template(bytes: &[u8]) -> FillResult<Vec<SheetTemplate>> {
    let mut workbook: Xlsx<_> = Xlsx::new(Cursor::new(bytes.to_vec()))?;
    let names = workbook.sheet_names().to_vec();
    let mut sheets = Vec::with_capacity(names.len());
    for name in names {
        let range = workbook.worksheet_range(&name)?;
        sheets.push(SheetTemplate {
            rows: grid_rows(&range),
            name,
        });
    }
    Ok(sheets)
}

fn grid_rows(range: &Range<Data>) -> Vec<Vec<String>> {
    let Some((end_row, end_col)) = range.end() else {
        return Vec::new();
    };
    let mut rows = Vec::with_capacity(end_row as usize + 1);
    for r in 0..=end_row {
        let mut cells: Vec<String> = (0..=end_col)
            .map(|c| range.get_value((r, c)).map(cell_text).unwrap_or_default())
            .collect();
        while cells.last().is_some_and(|c| c.is_empty()) {
            cells.pop();
        }
        rows.push(cells);
    }
    rows
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) => f.to_string(),
        Data::Bool(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
        other => other.to_string(),
    }
}
