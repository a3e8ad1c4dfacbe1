//! Robust decoding of JSON emitted by language models
//!
//! Model output is cleaned (code fences, control characters, raw newlines
//! inside strings) and parsed directly; if that fails, the first balanced
//! `{...}` span is extracted and parsed instead.

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum JsonRepairError {
    #[error("model returned empty output")]
    Empty,

    #[error("direct parse failed ({direct}); extracted object parse failed ({extracted})")]
    Unparsable { direct: String, extracted: String },
}

/// Decode model output into `T`
pub fn decode_llm_json<T: DeserializeOwned>(raw: &str) -> Result<T, JsonRepairError> {
    let printable = strip_control_chars(strip_code_fences(raw));
    let cleaned = escape_raw_whitespace_in_strings(&printable);
    if cleaned.is_empty() {
        return Err(JsonRepairError::Empty);
    }

    let direct = match serde_json::from_str::<T>(&cleaned) {
        Ok(value) => return Ok(value),
        Err(e) => e.to_string(),
    };

    // Located on the unescaped text; escaping applies to the span alone
    let extracted = match extract_first_object(&printable) {
        Some(span) => match serde_json::from_str::<T>(&escape_raw_whitespace_in_strings(span)) {
            Ok(value) => {
                log::debug!("Recovered model JSON from embedded object span");
                return Ok(value);
            }
            Err(e) => e.to_string(),
        },
        None => "no balanced JSON object found".to_string(),
    };

    Err(JsonRepairError::Unparsable { direct, extracted })
}

/// Decode model output that must be a JSON object
pub fn decode_llm_object(raw: &str) -> Result<Map<String, Value>, JsonRepairError> {
    decode_llm_json::<Map<String, Value>>(raw)
}

/// Cleanup applied before any parse attempt
pub fn clean_llm_text(raw: &str) -> String {
    escape_raw_whitespace_in_strings(&strip_control_chars(strip_code_fences(raw)))
}

fn strip_control_chars(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_control() || matches!(c, '\n' | '\r' | '\t'))
        .collect()
}

/// Remove a surrounding markdown code fence, with or without a `json` tag
pub fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(body) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = body.strip_suffix("```").unwrap_or(body);
    let body = match body.get(..4) {
        Some(tag) if tag.eq_ignore_ascii_case("json") => &body[4..],
        _ => body,
    };
    body.trim()
}

/// Escape newlines, carriage returns and tabs that sit inside string literals
fn escape_raw_whitespace_in_strings(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut escaped = false;

    for c in text.chars() {
        if in_string {
            match c {
                _ if escaped => {
                    escaped = false;
                    out.push(c);
                }
                '\\' => {
                    escaped = true;
                    out.push(c);
                }
                '"' => {
                    in_string = false;
                    out.push(c);
                }
                '\n' => out.push_str("\\n"),
                '\r' => out.push_str("\\r"),
                '\t' => out.push_str("\\t"),
                _ => out.push(c),
            }
        } else {
            if c == '"' {
                in_string = true;
            }
            out.push(c);
        }
    }

    out.trim().to_string()
}

/// First balanced `{...}` span, ignoring braces inside string literals
pub fn extract_first_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, c) in text[start..].char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..=start + offset]);
                }
            }
            _ => {}
        }
    }

    None
}
