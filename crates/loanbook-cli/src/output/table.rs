use serde_json::Value;
use tabled::{builder::Builder, Table};

use super::{cell, result_rows, ROW_FIELDS};

/// Format output as tables: scalar result fields, then any schedule or
/// bucket rows, then warnings and methodology.
pub fn print_table(value: &Value) {
    let Some(result) = value.get("result") else {
        println!("{}", value);
        return;
    };

    if let Value::Object(res_map) = result {
        let mut builder = Builder::default();
        builder.push_record(["Field", "Value"]);
        for (key, val) in res_map {
            if ROW_FIELDS.contains(&key.as_str()) {
                continue;
            }
            let rendered = match val {
                Value::Object(_) => "(see below)".to_string(),
                _ => cell(val),
            };
            builder.push_record([key.as_str(), &rendered]);
        }
        println!("{}", Table::from(builder));

        // Nested objects such as `entry` or `next_due` get their own table.
        for (key, val) in res_map {
            if let Value::Object(inner) = val {
                println!("\n{}:", key);
                let mut builder = Builder::default();
                builder.push_record(["Field", "Value"]);
                for (k, v) in inner {
                    builder.push_record([k.as_str(), &cell(v)]);
                }
                println!("{}", Table::from(builder));
            }
        }
    } else {
        println!("{}", cell(result));
    }

    if let Some((name, rows)) = result_rows(value) {
        println!("\n{}:", name);
        print_rows(rows);
    }

    if let Some(Value::Array(warnings)) = value.get("warnings") {
        if !warnings.is_empty() {
            println!("\nWarnings:");
            for w in warnings.iter().filter_map(Value::as_str) {
                println!("  - {}", w);
            }
        }
    }

    if let Some(Value::String(meth)) = value.get("methodology") {
        println!("\nMethodology: {}", meth);
    }
}

fn print_rows(rows: &[Value]) {
    let Some(Value::Object(first)) = rows.first() else {
        println!("(empty)");
        return;
    };
    let headers: Vec<String> = first.keys().cloned().collect();
    let mut builder = Builder::default();
    builder.push_record(&headers);

    for row in rows {
        if let Value::Object(map) = row {
            let record: Vec<String> = headers
                .iter()
                .map(|h| map.get(h.as_str()).map(cell).unwrap_or_default())
                .collect();
            builder.push_record(record);
        }
    }

    println!("{}", Table::from(builder));
}
