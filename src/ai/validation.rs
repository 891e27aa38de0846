//! Response JSON Extraction
//!
//! Pulls the JSON object out of a model reply. Handles:
//! - Markdown code fence wrapping (```json ... ```)
//! - JSON embedded in explanatory text
//!
//! Whether the object matches the target schema is decided later, by
//! deserializing it into the result type.

use serde_json::Value;
use tracing::debug;

/// Extract and parse the JSON value of an LLM reply
pub fn extract_json_from_response(raw: &str) -> Option<Value> {
    let cleaned = strip_code_fence(raw.trim());

    if let Ok(value) = serde_json::from_str::<Value>(cleaned) {
        return Some(value);
    }

    let embedded = find_embedded_object(cleaned)?;
    match serde_json::from_str::<Value>(embedded) {
        Ok(value) => Some(value),
        Err(e) => {
            debug!(error = %e, "Embedded JSON did not parse");
            None
        }
    }
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // Skip the language tag line
    let body = rest.find('\n').map(|i| &rest[i + 1..]).unwrap_or(rest);
    body.trim_end()
        .strip_suffix("```")
        .unwrap_or(body)
        .trim()
}

/// Outermost balanced `{...}` span, ignoring braces inside strings
fn find_embedded_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}
