//! The public entry type: template in, rendered workbook out.

use std::fs;
use std::path::Path;

use rust_xlsxwriter::Workbook;
use tracing::debug;

use crate::core::engine::RowEngine;
use crate::core::helpers::{Helper, HelperRegistry};
use crate::core::template::TemplateCache;
use crate::error::FillResult;
use crate::excel::reader::{read_template, SheetTemplate};
use crate::excel::writer::SheetSink;
use crate::types::{DataMap, RenderContext, Value};

/// A loaded template workbook plus the helpers registered against it.
///
/// Construction parses the template once; each [`render`](Renderer::render)
/// call walks every sheet against fresh data and replaces the stored
/// result. Compiled cell expressions are cached on the renderer, so
/// repeated renders of the same template do no reparsing.
///
/// ```no_run
/// use sheetfill::{RenderContext, Renderer, Value};
///
/// let mut renderer = Renderer::from_path("report-template.xlsx")?;
/// renderer.register_helper("upper", |s: String| s.to_uppercase())?;
///
/// let data: serde_json::Value = serde_json::from_str(r#"{"title": "Q3"}"#)?;
/// renderer.render(&RenderContext::new(), Value::from(data))?;
/// std::fs::write("report.xlsx", renderer.result())?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct Renderer {
    sheets: Vec<SheetTemplate>,
    registry: HelperRegistry,
    cache: TemplateCache,
    output: Vec<u8>,
}

impl Renderer {
    /// Load a template workbook from raw xlsx bytes.
    pub fn from_bytes(bytes: &[u8]) -> FillResult<Self> {
        Ok(Self {
            sheets: read_template(bytes)?,
            registry: HelperRegistry::new(),
            cache: TemplateCache::new(),
            output: Vec::new(),
        })
    }

    /// Load a template workbook from a file.
    pub fn from_path(path: impl AsRef<Path>) -> FillResult<Self> {
        Self::from_bytes(&fs::read(path)?)
    }

    /// Register a helper callable under `name`. Registration happens before
    /// rendering; a duplicate name is rejected.
    pub fn register_helper<Args, H>(&mut self, name: impl Into<String>, helper: H) -> FillResult<()>
    where
        H: Helper<Args>,
    {
        self.registry.register(name, helper)
    }

    pub fn helpers(&self) -> &HelperRegistry {
        &self.registry
    }

    /// Render every sheet against `data`, which must coerce to a
    /// string-keyed map (code 20000 otherwise). The produced workbook
    /// replaces any previous result.
    pub fn render(&mut self, ctx: &RenderContext, data: impl Into<Value>) -> FillResult<()> {
        let mut top = data.into().into_data_map()?;
        let sheet_names: Vec<String> = self.sheets.iter().map(|s| s.name.clone()).collect();

        let mut workbook = Workbook::new();
        for sheet in &self.sheets {
            let scope = sheet_scope(&mut top, &sheet.name, &sheet_names)?;
            let worksheet = workbook.add_worksheet();
            worksheet.set_name(&sheet.name)?;
            let mut sink = SheetSink::new(worksheet);
            let emitted = RowEngine::new(ctx, &self.registry, &mut self.cache).render_rows(
                &mut sink,
                &sheet.rows,
                &scope,
                0,
            )?;
            debug!(sheet = %sheet.name, rows = emitted, "sheet rendered");
        }
        self.output = workbook.save_to_buffer()?;
        Ok(())
    }

    /// The workbook produced by the last successful [`render`](Self::render);
    /// empty before the first one.
    pub fn result(&self) -> &[u8] {
        &self.output
    }

    /// Consume the renderer, keeping only the produced workbook bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.output
    }
}

/// Resolve the data scope one sheet renders against: the sheet-keyed map
/// (if any) merged over the top-level entries, with every sheet-named key
/// stripped from the latter. Sheet-keyed entries win on conflict. The
/// rendered sheet's own key is then removed from the top level so later
/// sheets do not inherit it.
fn sheet_scope(top: &mut DataMap, sheet: &str, all_sheets: &[String]) -> FillResult<DataMap> {
    let base = top
        .get(sheet)
        .cloned()
        .unwrap_or(Value::Absent)
        .into_data_map()?;
    let mut scope: DataMap = top
        .iter()
        .filter(|(key, _)| !all_sheets.iter().any(|name| name == *key))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();
    scope.extend(base);
    top.remove(sheet);
    Ok(scope)
}
