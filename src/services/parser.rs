use serde_json::Value;

use crate::models::Candidate;

/// Turns model output into candidates without ever failing
///
/// Accepts a bare array or an object with a `similar` array, optionally
/// wrapped in code fences or surrounded by prose. Anything else yields an
/// empty list. Array items that are not objects are skipped.
pub fn parse_candidates(raw: &str) -> Vec<Candidate> {
    let cleaned = strip_code_fences(raw);
    if cleaned.is_empty() {
        return Vec::new();
    }

    let value = match serde_json::from_str::<Value>(&cleaned) {
        Ok(value) => value,
        Err(e) => match embedded_json(&cleaned) {
            Some(value) => value,
            None => {
                tracing::warn!(error = %e, chars = cleaned.len(), "Unparsable LLM output");
                return Vec::new();
            }
        },
    };

    let items = match value {
        Value::Array(items) => items,
        Value::Object(mut obj) => match obj.remove("similar") {
            Some(Value::Array(items)) => items,
            _ => {
                tracing::warn!("LLM output has no similar array");
                return Vec::new();
            }
        },
        _ => return Vec::new(),
    };

    items
        .into_iter()
        .filter(Value::is_object)
        .filter_map(|item| serde_json::from_value::<Candidate>(item).ok())
        .collect()
}

fn strip_code_fences(raw: &str) -> String {
    raw.replace("```json", "").replace("```", "").trim().to_string()
}

/// Outermost `{...}` or `[...]` span of text that has prose around it
fn embedded_json(text: &str) -> Option<Value> {
    let start = text.find(['{', '['])?;
    let closing = if text[start..].starts_with('{') { '}' } else { ']' };
    let end = text.rfind(closing)?;
    if end <= start {
        return None;
    }
    serde_json::from_str(&text[start..=end]).ok()
}
