use serde_json::Value;
use std::io;

use super::{format_cell, result_body, ROW_FIELDS};

/// Write output as CSV to stdout.
///
/// Results carrying a schedule (cash flows, rungs, positions) are written as
/// one row per element; anything else becomes a field,value listing.
pub fn print_csv(value: &Value) {
    let stdout = io::stdout();
    let mut wtr = csv::Writer::from_writer(stdout.lock());

    match result_body(value) {
        Value::Object(result) => {
            let rows = ROW_FIELDS
                .iter()
                .find_map(|field| result.get(*field).and_then(Value::as_array));
            match rows {
                Some(rows) if !rows.is_empty() => write_rows(&mut wtr, rows),
                _ => {
                    let _ = wtr.write_record(["field", "value"]);
                    for (key, val) in result {
                        let _ = wtr.write_record([key.as_str(), &format_cell(val)]);
                    }
                }
            }
        }
        Value::Array(arr) => write_rows(&mut wtr, arr),
        other => {
            let _ = wtr.write_record([&format_cell(other)]);
        }
    }

    let _ = wtr.flush();
}

fn write_rows(wtr: &mut csv::Writer<io::StdoutLock<'_>>, rows: &[Value]) {
    let Some(Value::Object(first)) = rows.first() else {
        for item in rows {
            let _ = wtr.write_record([&format_cell(item)]);
        }
        return;
    };

    let headers: Vec<&str> = first.keys().map(String::as_str).collect();
    let _ = wtr.write_record(&headers);
    for item in rows {
        if let Value::Object(map) = item {
            let row: Vec<String> = headers
                .iter()
                .map(|h| map.get(*h).map(format_cell).unwrap_or_default())
                .collect();
            let _ = wtr.write_record(&row);
        }
    }
}
