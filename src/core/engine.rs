//! Row expansion engine.
//!
//! Walks template rows in order, emitting output rows to a sink. Plain rows
//! render cell by cell; a row whose first cell carries a `{{range key}}`
//! marker opens a block that repeats once per element of the data under
//! `key`, with nested blocks handled by recursion. The absolute output row is always `emitted + 1 + offset`, so
//! expanded blocks push later rows down instead of overwriting them.

use tracing::trace;

use crate::core::coerce::to_display_string;
use crate::core::helpers::HelperRegistry;
use crate::core::stream::row_scopes;
use crate::core::template::evaluator::eval;
use crate::core::template::TemplateCache;
use crate::error::{FillError, FillResult};
use crate::types::{DataMap, RenderContext};

/// One template row: the cell texts left to right. Empty rows are empty
/// vectors.
pub(crate) type TemplateRow = Vec<String>;

/// Receiver for rendered rows. `row` is 1-based; cells start at column 1.
pub(crate) trait RowSink {
    fn write_row(&mut self, row: u32, cells: &[String]) -> FillResult<()>;
}

/// Find a `{{range <key>}}` marker anywhere in `cell`, returning the key
/// (possibly empty). The marker opens a block wherever it sits in the first
/// cell of a row; surrounding text is ignored. The key is a run of word
/// characters that must butt directly against the closing braces.
pub(crate) fn range_key(cell: &str) -> Option<&str> {
    let mut searched = cell;
    while let Some(start) = searched.find("{{range ") {
        let after = &searched[start + 8..];
        let len = after
            .bytes()
            .take_while(|b| b.is_ascii_alphanumeric() || *b == b'_')
            .count();
        if after[len..].starts_with("}}") {
            return Some(&after[..len]);
        }
        searched = &searched[start + 1..];
    }
    None
}

fn is_range_end(cell: &str) -> bool {
    cell == "{{end}}"
}

/// Scan the rows after a range start for its matching `{{end}}`, honoring
/// nesting. Returns the offset such that `rows[offset - 1]` is the end
/// marker, or `None` if the block never closes.
pub(crate) fn find_range_end(rows: &[TemplateRow]) -> Option<usize> {
    let mut depth = 0usize;
    for (index, row) in rows.iter().enumerate() {
        let Some(first) = row.first() else { continue };
        if is_range_end(first) {
            if depth == 0 {
                return Some(index + 1);
            }
            depth -= 1;
        } else if range_key(first).is_some() {
            depth += 1;
        }
    }
    None
}

/// The recursive row walker. Borrows the renderer's registry and compiled
/// cache; one engine instance serves a whole sheet.
pub(crate) struct RowEngine<'a> {
    ctx: &'a RenderContext,
    registry: &'a HelperRegistry,
    cache: &'a mut TemplateCache,
}

impl<'a> RowEngine<'a> {
    pub fn new(
        ctx: &'a RenderContext,
        registry: &'a HelperRegistry,
        cache: &'a mut TemplateCache,
    ) -> Self {
        Self {
            ctx,
            registry,
            cache,
        }
    }

    /// Render `rows` against `data`, emitting at absolute rows
    /// `offset + 1, offset + 2, ...`. Returns the number of output rows
    /// accounted for (a skipped range body still counts, preserving the
    /// downstream offsets templates were authored against).
    pub fn render_rows(
        &mut self,
        sink: &mut dyn RowSink,
        rows: &[TemplateRow],
        data: &DataMap,
        offset: usize,
    ) -> FillResult<usize> {
        let mut emitted = 0usize;
        let mut w = 0usize;
        while w < rows.len() {
            if self.ctx.is_cancelled() {
                return Err(FillError::Cancelled);
            }
            let row = &rows[w];
            let out_row = (emitted + 1 + offset) as u32;

            if row.is_empty() {
                sink.write_row(out_row, &[])?;
                emitted += 1;
                w += 1;
                continue;
            }

            if let Some(key) = range_key(&row[0]) {
                let end = find_range_end(&rows[w + 1..])
                    .ok_or_else(|| FillError::NoMatchRangeEnd(key.to_string()))?;
                if end == 1 {
                    // Nothing between the markers; skip both rows.
                    w += 2;
                    continue;
                }
                let body = &rows[w + 1..w + end];
                emitted += self.expand_range(sink, key, body, data, offset + emitted)?;
                w += end + 1;
                continue;
            }

            let mut cells = Vec::with_capacity(row.len());
            for cell in row {
                cells.push(self.render_cell(cell, data)?);
            }
            sink.write_row(out_row, &cells)?;
            emitted += 1;
            w += 1;
        }
        Ok(emitted)
    }

    /// Expand one range block: one pass over the body per element of the
    /// data under `key`. A missing key emits nothing but still accounts for
    /// the body rows.
    fn expand_range(
        &mut self,
        sink: &mut dyn RowSink,
        key: &str,
        body: &[TemplateRow],
        data: &DataMap,
        offset: usize,
    ) -> FillResult<usize> {
        let Some(source) = data.get(key) else {
            return Ok(body.len());
        };
        trace!(key, body_rows = body.len(), "expanding range");

        // The key naming this range is not visible inside it, so a nested
        // block cannot accidentally re-iterate the parent collection.
        let outer: DataMap = data
            .iter()
            .filter(|(k, _)| k.as_str() != key)
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        let mut emitted = 0usize;
        for element in row_scopes(source.clone()) {
            let mut scope = outer.clone();
            scope.extend(element);
            emitted += self.render_rows(sink, body, &scope, offset + emitted)?;
        }
        Ok(emitted)
    }

    fn render_cell(&mut self, src: &str, data: &DataMap) -> FillResult<String> {
        let expr = self.cache.compile(src, self.registry)?;
        let value = eval(&expr, self.ctx, data)?;
        Ok(to_display_string(value)?)
    }
}
