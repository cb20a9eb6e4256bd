use std::fs;
use std::path::PathBuf;

use colored::Colorize;

use crate::core::engine::{find_range_end, range_key};
use crate::core::helpers::HelperRegistry;
use crate::core::template::parser::{parse, ParseErrorKind};
use crate::error::{FillError, FillResult};
use crate::excel::reader::read_template;
use crate::renderer::Renderer;
use crate::types::{RenderContext, Value};

/// Execute the render command: fill `template` with the JSON in `data` and
/// write the result to `out`.
pub fn render(template: PathBuf, data: Option<PathBuf>, out: PathBuf) -> FillResult<()> {
    println!("{}", "Rendering template".bold().green());
    println!("   Template: {}", template.display());

    let data_value = match data {
        Some(path) => {
            println!("   Data: {}", path.display());
            let text = fs::read_to_string(path)?;
            Value::from(serde_json::from_str::<serde_json::Value>(&text)?)
        }
        None => Value::Absent,
    };

    let mut renderer = Renderer::from_path(&template)?;
    renderer.render(&RenderContext::new(), data_value)?;
    fs::write(&out, renderer.result())?;

    println!("   Wrote {}", out.display().to_string().cyan());
    Ok(())
}

/// Execute the check command: validate range pairing and cell-expression
/// syntax across every sheet without rendering anything.
///
/// Helpers are registered programmatically, so an unknown helper name here
/// is a warning, not an error.
pub fn check(template: PathBuf) -> FillResult<()> {
    println!("{}", "Checking template".bold().green());
    println!("   Template: {}", template.display());

    let sheets = read_template(&fs::read(&template)?)?;
    let registry = HelperRegistry::new();
    let mut first_error: Option<FillError> = None;
    let mut errors = 0usize;
    let mut warnings = 0usize;

    for sheet in &sheets {
        // Every range must close before the sheet ends.
        for (index, row) in sheet.rows.iter().enumerate() {
            let Some(first) = row.first() else { continue };
            let Some(key) = range_key(first) else { continue };
            if find_range_end(&sheet.rows[index + 1..]).is_none() {
                errors += 1;
                let err = FillError::NoMatchRangeEnd(key.to_string());
                println!(
                    "   {} {}: row {}: {}",
                    "error:".red().bold(),
                    sheet.name,
                    index + 1,
                    err
                );
                first_error.get_or_insert(err);
            }
        }

        for (r, row) in sheet.rows.iter().enumerate() {
            for (c, cell) in row.iter().enumerate() {
                // Block markers are only markers in the first cell.
                if c == 0 && (range_key(cell).is_some() || cell == "{{end}}") {
                    continue;
                }
                match parse(cell, &registry) {
                    Ok(_) => {}
                    Err(e) if matches!(e.kind, ParseErrorKind::NoHelper(_)) => {
                        warnings += 1;
                        println!(
                            "   {} {}: row {}, column {}: {}",
                            "warning:".yellow().bold(),
                            sheet.name,
                            r + 1,
                            c + 1,
                            e
                        );
                    }
                    Err(e) => {
                        errors += 1;
                        println!(
                            "   {} {}: row {}, column {}: {}",
                            "error:".red().bold(),
                            sheet.name,
                            r + 1,
                            c + 1,
                            e
                        );
                        first_error.get_or_insert(e.into());
                    }
                }
            }
        }
    }

    if let Some(err) = first_error {
        println!(
            "{}",
            format!("Found {errors} error(s), {warnings} warning(s)").red()
        );
        return Err(err);
    }
    println!(
        "{}",
        format!(
            "OK: {} sheet(s), {warnings} warning(s)",
            sheets.len()
        )
        .green()
    );
    Ok(())
}
