use serde_json::Value;

/// Print just the key answer values from the output.
///
/// For a single trajectory that is the cost summary; for a frontier
/// sweep, one compact line per point.
pub fn print_minimal(value: &Value) {
    let result_obj = value
        .as_object()
        .and_then(|m| m.get("result"))
        .unwrap_or(value);

    // Scalar fields worth surfacing, in priority order.
    let priority_keys = [
        "expected_cost",
        "cost_variance",
        "characteristic_time",
        "terminal_residual",
    ];

    match result_obj {
        Value::Object(map) => {
            let mut printed = false;
            for key in &priority_keys {
                if let Some(val) = map.get(*key) {
                    if !val.is_null() {
                        println!("{}: {}", key, format_minimal(val));
                        printed = true;
                    }
                }
            }
            if !printed {
                if let Some((key, val)) = map.iter().next() {
                    println!("{}: {}", key, format_minimal(val));
                }
            }
        }
        Value::Array(points) => {
            for point in points {
                println!("{}", format_minimal(point));
            }
        }
        _ => println!("{}", format_minimal(result_obj)),
    }
}

fn format_minimal(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
        _ => serde_json::to_string(value).unwrap_or_default(),
    }
}
