//! End-to-end rendering tests through real workbook bytes: build a template
//! with rust_xlsxwriter, render it, read the produced workbook back with
//! calamine, and compare the grid.

use std::collections::HashMap;
use std::io::Cursor;
use std::thread;

use calamine::{Data, Reader, Xlsx};
use rust_xlsxwriter::Workbook;
use sheetfill::{DataMap, FillError, RenderContext, Renderer, Value, ValueStream};

fn template_bytes(rows: &[&[&str]]) -> Vec<u8> {
    sheet_bytes(&[("Sheet1", rows)])
}

fn sheet_bytes(sheets: &[(&str, &[&[&str]])]) -> Vec<u8> {
    let mut workbook = Workbook::new();
    for (name, rows) in sheets {
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(*name).unwrap();
        for (r, row) in rows.iter().enumerate() {
            for (c, cell) in row.iter().enumerate() {
                worksheet.write_string(r as u32, c as u16, *cell).unwrap();
            }
        }
    }
    workbook.save_to_buffer().unwrap()
}

/// Read a sheet of the rendered output as a grid from absolute row 1,
/// trimming trailing empty cells per row and trailing empty rows.
fn read_grid(bytes: &[u8], sheet: &str) -> Vec<Vec<String>> {
    let mut workbook: Xlsx<_> = Xlsx::new(Cursor::new(bytes.to_vec())).unwrap();
    let range = workbook.worksheet_range(sheet).unwrap();
    let Some((end_row, end_col)) = range.end() else {
        return Vec::new();
    };
    let mut rows: Vec<Vec<String>> = (0..=end_row)
        .map(|r| {
            let mut cells: Vec<String> = (0..=end_col)
                .map(|c| match range.get_value((r, c)) {
                    Some(Data::String(s)) => s.clone(),
                    Some(Data::Empty) | None => String::new(),
                    Some(other) => other.to_string(),
                })
                .collect();
            while cells.last().is_some_and(|c| c.is_empty()) {
                cells.pop();
            }
            cells
        })
        .collect();
    while rows.last().is_some_and(|r| r.is_empty()) {
        rows.pop();
    }
    rows
}

fn grid(rows: &[&[&str]]) -> Vec<Vec<String>> {
    rows.iter()
        .map(|row| row.iter().map(|c| c.to_string()).collect())
        .collect()
}

fn rows_of_maps(key: &str, values: &[&str]) -> Value {
    Value::List(
        values
            .iter()
            .map(|v| {
                Value::Map(DataMap::from([(
                    key.to_string(),
                    Value::Str(v.to_string()),
                )]))
            })
            .collect(),
    )
}

// ═══════════════════════════════════════════════════════════════════════════
// RANGE EXPANSION
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_flat_range() {
    let bytes = template_bytes(&[
        &["Test"],
        &["{{range rows}}"],
        &["string", "{{s}}"],
        &["{{end}}"],
    ]);
    let data = DataMap::from([("rows".to_string(), rows_of_maps("s", &["s1", "s2", "s3"]))]);

    let mut renderer = Renderer::from_bytes(&bytes).unwrap();
    renderer.render(&RenderContext::new(), Value::Map(data)).unwrap();

    assert_eq!(
        read_grid(renderer.result(), "Sheet1"),
        grid(&[
            &["Test"],
            &["string", "s1"],
            &["string", "s2"],
            &["string", "s3"],
        ])
    );
}

#[test]
fn test_missing_range_key_skips_block() {
    let bytes = template_bytes(&[
        &["Test"],
        &["{{range rows}}"],
        &["string", "{{s}}"],
        &["{{end}}"],
    ]);
    let mut renderer = Renderer::from_bytes(&bytes).unwrap();
    renderer
        .render(&RenderContext::new(), Value::Map(DataMap::new()))
        .unwrap();

    assert_eq!(read_grid(renderer.result(), "Sheet1"), grid(&[&["Test"]]));
}

#[test]
fn test_unterminated_range_fails() {
    let bytes = template_bytes(&[&[""], &["{{range rows}}"], &["string", "{{s}}"]]);
    let data = DataMap::from([("rows".to_string(), rows_of_maps("s", &["s1"]))]);

    let mut renderer = Renderer::from_bytes(&bytes).unwrap();
    let err = renderer
        .render(&RenderContext::new(), Value::Map(data))
        .unwrap_err();
    assert_eq!(err.code(), Some(20001));
}

#[test]
fn test_nested_ranges() {
    let bytes = template_bytes(&[
        &["T"],
        &["{{range outer}}"],
        &["split"],
        &["{{range inner}}"],
        &["x", "{{v}}"],
        &["{{end}}"],
        &["{{end}}"],
    ]);
    let outer = Value::List(vec![
        Value::Map(DataMap::from([(
            "inner".to_string(),
            rows_of_maps("v", &["a", "b"]),
        )])),
        Value::Map(DataMap::from([(
            "inner".to_string(),
            rows_of_maps("v", &["c"]),
        )])),
    ]);
    let data = DataMap::from([("outer".to_string(), outer)]);

    let mut renderer = Renderer::from_bytes(&bytes).unwrap();
    renderer.render(&RenderContext::new(), Value::Map(data)).unwrap();

    assert_eq!(
        read_grid(renderer.result(), "Sheet1"),
        grid(&[
            &["T"],
            &["split"],
            &["x", "a"],
            &["x", "b"],
            &["split"],
            &["x", "c"],
        ])
    );
}

#[test]
fn test_empty_template_line_is_preserved() {
    let bytes = template_bytes(&[
        &[""],
        &["{{range rows}}"],
        &["string", "{{s}}"],
        &["{{end}}"],
    ]);
    let data = DataMap::from([("rows".to_string(), rows_of_maps("s", &["s1", "s2"]))]);

    let mut renderer = Renderer::from_bytes(&bytes).unwrap();
    renderer.render(&RenderContext::new(), Value::Map(data)).unwrap();

    assert_eq!(
        read_grid(renderer.result(), "Sheet1"),
        grid(&[&[], &["string", "s1"], &["string", "s2"]])
    );
}

#[test]
fn test_range_from_producer_thread() {
    let bytes = template_bytes(&[&["{{range rows}}"], &["{{s}}"], &["{{end}}"]]);
    let (tx, stream) = ValueStream::bounded(2);
    let producer = thread::spawn(move || {
        for i in 1..=4 {
            let element = Value::Map(DataMap::from([(
                "s".to_string(),
                Value::Str(format!("s{i}")),
            )]));
            if tx.send(element).is_err() {
                break;
            }
        }
    });

    let data = DataMap::from([("rows".to_string(), Value::Stream(stream))]);
    let mut renderer = Renderer::from_bytes(&bytes).unwrap();
    renderer.render(&RenderContext::new(), Value::Map(data)).unwrap();
    producer.join().unwrap();

    assert_eq!(
        read_grid(renderer.result(), "Sheet1"),
        grid(&[&["s1"], &["s2"], &["s3"], &["s4"]])
    );
}

#[test]
fn test_bad_range_element_terminates_iteration_silently() {
    let bytes = template_bytes(&[&["{{range rows}}"], &["{{s}}"], &["{{end}}"], &["Done"]]);
    let data = DataMap::from([(
        "rows".to_string(),
        Value::List(vec![
            Value::Map(DataMap::from([(
                "s".to_string(),
                Value::Str("ok".to_string()),
            )])),
            Value::Int(42),
            Value::Map(DataMap::from([(
                "s".to_string(),
                Value::Str("never".to_string()),
            )])),
        ]),
    )]);

    let mut renderer = Renderer::from_bytes(&bytes).unwrap();
    renderer.render(&RenderContext::new(), Value::Map(data)).unwrap();

    assert_eq!(
        read_grid(renderer.result(), "Sheet1"),
        grid(&[&["ok"], &["Done"]])
    );
}

// ═══════════════════════════════════════════════════════════════════════════
// HELPERS
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_helper_with_context_marker() {
    let bytes = template_bytes(&[&["{{ctx k}}"]]);
    let mut renderer = Renderer::from_bytes(&bytes).unwrap();
    renderer
        .register_helper("ctx", |ctx: &RenderContext, _k: String| {
            if ctx.value("marker").is_some() {
                "yes"
            } else {
                "no"
            }
        })
        .unwrap();

    let ctx = RenderContext::new().with_value("marker", true);
    let data = DataMap::from([("k".to_string(), Value::Str("ignored".to_string()))]);
    renderer.render(&ctx, Value::Map(data)).unwrap();

    assert_eq!(read_grid(renderer.result(), "Sheet1"), grid(&[&["yes"]]));
}

#[test]
fn test_helper_arity_mismatch_is_a_render_error() {
    let bytes = template_bytes(&[&["{{h x}}"]]);
    let mut renderer = Renderer::from_bytes(&bytes).unwrap();
    renderer
        .register_helper("h", |a: String, b: String| a + &b)
        .unwrap();

    let err = renderer
        .render(&RenderContext::new(), Value::Map(DataMap::new()))
        .unwrap_err();
    assert!(matches!(err, FillError::Parse(_)));
    assert!(err.to_string().contains("argument"));
}

#[test]
fn test_quoted_literal_keeps_braces() {
    let bytes = template_bytes(&[&[r#"{{h "raw {{text}}" k}}"#]]);
    let mut renderer = Renderer::from_bytes(&bytes).unwrap();
    renderer
        .register_helper("h", |a: String, b: String| a + &b)
        .unwrap();

    let data = DataMap::from([("k".to_string(), Value::Str("!".to_string()))]);
    renderer.render(&RenderContext::new(), Value::Map(data)).unwrap();

    assert_eq!(
        read_grid(renderer.result(), "Sheet1"),
        grid(&[&["raw {{text}}!"]])
    );
}

#[test]
fn test_helper_panic_aborts_render_with_code() {
    let bytes = template_bytes(&[&["{{boom k}}"]]);
    let mut renderer = Renderer::from_bytes(&bytes).unwrap();
    renderer
        .register_helper("boom", |_: String| -> String { panic!("template bug") })
        .unwrap();

    let err = renderer
        .render(&RenderContext::new(), Value::Map(DataMap::new()))
        .unwrap_err();
    assert_eq!(err.code(), Some(20002));
}

#[test]
fn test_helper_inside_range_uses_iteration_scope() {
    let bytes = template_bytes(&[&["{{range rows}}"], &["{{upper s}}"], &["{{end}}"]]);
    let mut renderer = Renderer::from_bytes(&bytes).unwrap();
    renderer
        .register_helper("upper", |s: String| s.to_uppercase())
        .unwrap();

    let data = DataMap::from([("rows".to_string(), rows_of_maps("s", &["ab", "cd"]))]);
    renderer.render(&RenderContext::new(), Value::Map(data)).unwrap();

    assert_eq!(
        read_grid(renderer.result(), "Sheet1"),
        grid(&[&["AB"], &["CD"]])
    );
}

// ═══════════════════════════════════════════════════════════════════════════
// SHEET SCOPING AND DATA SHAPE
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_sheet_keyed_data_and_common_fallback() {
    let bytes = sheet_bytes(&[
        ("First", &[&["{{title}}", "{{shared}}"]]),
        ("Second", &[&["{{title}}", "{{shared}}"]]),
    ]);
    let data = serde_json::json!({
        "First": {"title": "one"},
        "Second": {"title": "two"},
        "shared": "both",
        "title": "common-loses-on-first-two-sheets",
    });

    let mut renderer = Renderer::from_bytes(&bytes).unwrap();
    renderer
        .render(&RenderContext::new(), Value::from(data))
        .unwrap();

    assert_eq!(
        read_grid(renderer.result(), "First"),
        grid(&[&["one", "both"]])
    );
    assert_eq!(
        read_grid(renderer.result(), "Second"),
        grid(&[&["two", "both"]])
    );
}

#[test]
fn test_sibling_sheet_keys_are_not_visible() {
    let bytes = sheet_bytes(&[
        ("First", &[&["{{Second}}"]]),
        ("Second", &[&["x"]]),
    ]);
    let data = serde_json::json!({"Second": {"z": 1}});

    let mut renderer = Renderer::from_bytes(&bytes).unwrap();
    renderer
        .render(&RenderContext::new(), Value::from(data))
        .unwrap();

    // The sibling sheet's entry is stripped from First's scope.
    assert_eq!(read_grid(renderer.result(), "First"), Vec::<Vec<String>>::new());
}

#[test]
fn test_non_map_data_is_rejected_with_code() {
    let bytes = template_bytes(&[&["x"]]);
    let mut renderer = Renderer::from_bytes(&bytes).unwrap();
    let err = renderer
        .render(&RenderContext::new(), Value::Int(3))
        .unwrap_err();
    assert_eq!(err.code(), Some(20000));
}

#[test]
fn test_absent_data_renders_static_template() {
    let bytes = template_bytes(&[&["static", "cells"]]);
    let mut renderer = Renderer::from_bytes(&bytes).unwrap();
    renderer.render(&RenderContext::new(), Value::Absent).unwrap();
    assert_eq!(
        read_grid(renderer.result(), "Sheet1"),
        grid(&[&["static", "cells"]])
    );
}

#[test]
fn test_input_data_is_not_mutated() {
    let bytes = template_bytes(&[&["{{a}}"]]);
    let data = DataMap::from([
        ("a".to_string(), Value::Str("x".to_string())),
        ("b".to_string(), Value::Int(2)),
    ]);
    let snapshot = data.clone();

    let mut renderer = Renderer::from_bytes(&bytes).unwrap();
    renderer
        .render(&RenderContext::new(), Value::Map(data.clone()))
        .unwrap();
    assert_eq!(data, snapshot);
}

#[test]
fn test_marker_free_template_is_bit_equal() {
    let template: &[&[&str]] = &[
        &["plain", "cells", "everywhere"],
        &[],
        &["more", "text"],
    ];
    let bytes = template_bytes(template);
    let mut renderer = Renderer::from_bytes(&bytes).unwrap();
    renderer
        .render(&RenderContext::new(), Value::Map(DataMap::new()))
        .unwrap();
    assert_eq!(read_grid(renderer.result(), "Sheet1"), grid(template));
}

// ═══════════════════════════════════════════════════════════════════════════
// CANCELLATION
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_pre_cancelled_context_aborts() {
    let bytes = template_bytes(&[&["a"]]);
    let ctx = RenderContext::new();
    ctx.cancel();

    let mut renderer = Renderer::from_bytes(&bytes).unwrap();
    let err = renderer
        .render(&ctx, Value::Map(DataMap::new()))
        .unwrap_err();
    assert_eq!(err.code(), Some(20002));
}

#[test]
fn test_helper_driven_cancellation_stops_the_walk() {
    let bytes = template_bytes(&[&["{{range rows}}"], &["{{note s}}"], &["{{end}}"]]);
    let mut renderer = Renderer::from_bytes(&bytes).unwrap();
    // The helper cancels on the first iteration; the engine notices before
    // the next row.
    renderer
        .register_helper("note", |ctx: &RenderContext, s: String| {
            ctx.cancel();
            s
        })
        .unwrap();

    let data = DataMap::from([("rows".to_string(), rows_of_maps("s", &["a", "b", "c"]))]);
    let err = renderer
        .render(&RenderContext::new(), Value::Map(data))
        .unwrap_err();
    assert_eq!(err.code(), Some(20002));
}

// ═══════════════════════════════════════════════════════════════════════════
// RESULT HANDLING
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_result_empty_before_first_render() {
    let bytes = template_bytes(&[&["x"]]);
    let renderer = Renderer::from_bytes(&bytes).unwrap();
    assert!(renderer.result().is_empty());
}

#[test]
fn test_rerender_replaces_result() {
    let bytes = template_bytes(&[&["{{a}}"]]);
    let mut renderer = Renderer::from_bytes(&bytes).unwrap();

    let first = DataMap::from([("a".to_string(), Value::Str("one".to_string()))]);
    renderer.render(&RenderContext::new(), Value::Map(first)).unwrap();
    assert_eq!(read_grid(renderer.result(), "Sheet1"), grid(&[&["one"]]));

    let second = DataMap::from([("a".to_string(), Value::Str("two".to_string()))]);
    renderer.render(&RenderContext::new(), Value::Map(second)).unwrap();
    assert_eq!(read_grid(renderer.result(), "Sheet1"), grid(&[&["two"]]));
}

#[test]
fn test_into_bytes_round_trip() {
    let bytes = template_bytes(&[&["done"]]);
    let mut renderer = Renderer::from_bytes(&bytes).unwrap();
    renderer
        .render(&RenderContext::new(), Value::Map(DataMap::new()))
        .unwrap();
    let produced = renderer.into_bytes();
    assert_eq!(read_grid(&produced, "Sheet1"), grid(&[&["done"]]));
}

#[test]
fn test_json_data_end_to_end() {
    let bytes = template_bytes(&[
        &["Report: {{title}}"],
        &["{{range items}}"],
        &["{{name}}", "{{qty}}"],
        &["{{end}}"],
    ]);
    let data = serde_json::json!({
        "title": "Inventory",
        "items": [
            {"name": "bolt", "qty": 12},
            {"name": "nut", "qty": 7},
        ],
    });

    let mut renderer = Renderer::from_bytes(&bytes).unwrap();
    renderer
        .render(&RenderContext::new(), Value::from(data))
        .unwrap();

    assert_eq!(
        read_grid(renderer.result(), "Sheet1"),
        grid(&[
            &["Report: Inventory"],
            &["bolt", "12"],
            &["nut", "7"],
        ])
    );
}

#[test]
fn test_helper_value_map_compat() {
    // A helper may declare a map parameter and receive the data map as-is.
    let bytes = template_bytes(&[&["{{describe m}}"]]);
    let mut renderer = Renderer::from_bytes(&bytes).unwrap();
    renderer
        .register_helper("describe", |m: HashMap<String, Value>| {
            let mut keys: Vec<&str> = m.keys().map(String::as_str).collect();
            keys.sort_unstable();
            keys.join(",")
        })
        .unwrap();

    let data = serde_json::json!({"m": {"b": 1, "a": 2}});
    renderer
        .render(&RenderContext::new(), Value::from(data))
        .unwrap();
    assert_eq!(read_grid(renderer.result(), "Sheet1"), grid(&[&["a,b"]]));
}
