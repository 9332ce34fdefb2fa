use serde_json::Value;

use super::{format_cell, result_body};

/// Headline fields, most specific first.
const PRIORITY_KEYS: [&str; 9] = [
    "yield_pct",
    "price",
    "modified_duration",
    "portfolio_duration",
    "weighted_yield",
    "shape",
    "total_principal",
    "macaulay_duration",
    "allocations",
];

/// Print just the headline value of a result.
pub fn print_minimal(value: &Value) {
    let result = result_body(value);

    if let Value::Object(map) = result {
        let headline = PRIORITY_KEYS
            .iter()
            .find_map(|key| map.get(*key).filter(|v| !v.is_null()));
        if let Some(val) = headline {
            println!("{}", format_cell(val));
            return;
        }
        if let Some((key, val)) = map.iter().next() {
            println!("{key}: {}", format_cell(val));
            return;
        }
    }

    println!("{}", format_cell(result));
}
