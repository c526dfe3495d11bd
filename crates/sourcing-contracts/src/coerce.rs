//! Lenient readers for model-produced JSON.
//!
//! Model output is untrusted: fields go missing, numbers arrive as strings and
//! lists arrive as comma-joined text. These helpers never fail; absent or
//! unusable values come back as `None` or an empty list.

use serde_json::Value;

/// Non-blank text for `key`. Numbers and booleans are rendered as text.
pub fn text_field(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(value_as_text)
}

pub fn value_as_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(text) => text.trim().to_string(),
        Value::Number(number) => number.to_string(),
        Value::Bool(flag) => flag.to_string(),
        _ => return None,
    };
    Some(text).filter(|text| !text.is_empty())
}

/// List of non-blank strings for `key`; a bare string is split on commas.
pub fn list_field(value: &Value, key: &str) -> Vec<String> {
    match value.get(key) {
        Some(Value::Array(items)) => items.iter().filter_map(value_as_text).collect(),
        Some(Value::String(text)) => text
            .split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

/// Finite number for `key`. Accepts numeric strings such as `"82"` or `"82%"`.
pub fn number_field(value: &Value, key: &str) -> Option<f64> {
    let parsed = match value.get(key)? {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().trim_end_matches('%').trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|number| number.is_finite())
}

/// Scores are nominally 0-100 but the model does not guarantee it.
pub fn clamp_score(score: f64) -> f64 {
    if score.is_nan() {
        return 0.0;
    }
    score.clamp(0.0, 100.0)
}

pub fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
