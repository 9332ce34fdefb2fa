use serde_json::{Map, Value};
use tabled::{builder::Builder, Table};

use super::{format_cell, is_object_array, result_body};

/// Format output as tables: scalar result fields first, then one table per
/// nested schedule, then warnings and methodology from the envelope.
pub fn print_table(value: &Value) {
    match result_body(value) {
        Value::Object(result) => print_result(result),
        Value::Array(arr) => print_rows(arr),
        other => println!("{}", format_cell(other)),
    }

    let Some(envelope) = value.as_object() else {
        return;
    };
    if let Some(Value::Array(warnings)) = envelope.get("warnings") {
        if !warnings.is_empty() {
            println!("\nWarnings:");
            for w in warnings.iter().filter_map(Value::as_str) {
                println!("  - {w}");
            }
        }
    }
    if let Some(Value::String(meth)) = envelope.get("methodology") {
        println!("\nMethodology: {meth}");
    }
}

fn print_result(result: &Map<String, Value>) {
    let mut builder = Builder::default();
    builder.push_record(["Field", "Value"]);
    for (key, val) in result.iter().filter(|(_, v)| !is_object_array(v)) {
        let cell = match val {
            Value::Object(inner) => inner
                .iter()
                .map(|(k, v)| format!("{k}={}", format_cell(v)))
                .collect::<Vec<_>>()
                .join(", "),
            other => format_cell(other),
        };
        builder.push_record([key.clone(), cell]);
    }
    println!("{}", Table::from(builder));

    for (key, val) in result.iter().filter(|(_, v)| is_object_array(v)) {
        if let Value::Array(rows) = val {
            println!("\n{key}:");
            print_rows(rows);
        }
    }
}

fn print_rows(rows: &[Value]) {
    let Some(Value::Object(first)) = rows.first() else {
        for item in rows {
            println!("{}", format_cell(item));
        }
        return;
    };

    let headers: Vec<String> = first.keys().cloned().collect();
    let mut builder = Builder::default();
    builder.push_record(headers.clone());
    for item in rows {
        if let Value::Object(map) = item {
            let row: Vec<String> = headers
                .iter()
                .map(|h| map.get(h.as_str()).map(format_cell).unwrap_or_default())
                .collect();
            builder.push_record(row);
        }
    }
    println!("{}", Table::from(builder));
}
