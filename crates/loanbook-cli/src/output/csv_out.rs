use serde_json::Value;
use std::io;

use super::{cell, result_rows, ROW_FIELDS};

/// Write output as CSV to stdout.
///
/// Schedules and aging buckets are written one row per entry; any other
/// result becomes a two-column `field,value` listing.
pub fn print_csv(value: &Value) {
    let stdout = io::stdout();
    let mut wtr = csv::Writer::from_writer(stdout.lock());

    if let Some((_, rows)) = result_rows(value) {
        write_rows(&mut wtr, rows);
    } else if let Some(Value::Object(result)) = value.get("result") {
        let _ = wtr.write_record(["field", "value"]);
        for (key, val) in result {
            if !ROW_FIELDS.contains(&key.as_str()) {
                let _ = wtr.write_record([key.as_str(), &cell(val)]);
            }
        }
    } else {
        let _ = wtr.write_record([&cell(value)]);
    }

    let _ = wtr.flush();
}

fn write_rows(wtr: &mut csv::Writer<io::StdoutLock<'_>>, rows: &[Value]) {
    let Some(Value::Object(first)) = rows.first() else {
        return;
    };
    let headers: Vec<&str> = first.keys().map(|k| k.as_str()).collect();
    let _ = wtr.write_record(&headers);

    for row in rows {
        if let Value::Object(map) = row {
            let record: Vec<String> = headers
                .iter()
                .map(|h| map.get(*h).map(cell).unwrap_or_default())
                .collect();
            let _ = wtr.write_record(&record);
        }
    }
}
