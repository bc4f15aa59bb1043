pub mod csv_out;
pub mod minimal;
pub mod table;

use crate::OutputFormat;
use serde_json::Value;

/// Result fields that hold row data rather than scalars.
pub const ROW_FIELDS: [&str; 2] = ["entries", "buckets"];

/// Dispatch output to the appropriate formatter.
pub fn format_output(format: &OutputFormat, value: &Value) {
    match format {
        OutputFormat::Json => match serde_json::to_string_pretty(value) {
            Ok(s) => println!("{}", s),
            Err(e) => eprintln!("JSON serialization error: {}", e),
        },
        OutputFormat::Table => table::print_table(value),
        OutputFormat::Csv => csv_out::print_csv(value),
        OutputFormat::Minimal => minimal::print_minimal(value),
    }
}

/// The first row array found in the `result` envelope, if any.
pub fn result_rows(value: &Value) -> Option<(&'static str, &[Value])> {
    let result = value.get("result")?;
    ROW_FIELDS.iter().find_map(|&field| {
        result
            .get(field)
            .and_then(Value::as_array)
            .map(|rows| (field, rows.as_slice()))
    })
}

/// Render a scalar for a table cell or CSV field.
pub fn cell(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        _ => serde_json::to_string(value).unwrap_or_default(),
    }
}
