//! Turning untrusted generator text into prompt strings.

use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum DecodeError {
    #[error("no JSON array found in generator output")]
    MissingArray,
    #[error("invalid JSON array: {0}")]
    InvalidJson(String),
    #[error("generator output contained no usable prompt")]
    Empty,
}

/// Finds the first balanced `[...]` span, ignoring brackets inside JSON strings.
fn first_balanced_array(text: &str) -> Option<&str> {
    let start = text.find('[')?;
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
            '[' => depth += 1,
            ']' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

fn item_text(item: &Value) -> Option<&str> {
    match item {
        Value::String(s) => Some(s),
        Value::Object(map) => ["prompt", "text"]
            .iter()
            .find_map(|key| map.get(*key).and_then(Value::as_str)),
        _ => None,
    }
}

/// Extracts the prompt strings from a response that should hold a JSON
/// array like `[{"prompt": "..."}, ...]`, tolerating prose around it.
pub fn extract_prompt_list(text: &str) -> Result<Vec<String>, DecodeError> {
    let span = first_balanced_array(text).ok_or(DecodeError::MissingArray)?;
    let parsed: Value = serde_json::from_str(span).map_err(|e| DecodeError::InvalidJson(e.to_string()))?;
    let items = parsed.as_array().ok_or(DecodeError::MissingArray)?;

    let prompts: Vec<String> = items
        .iter()
        .filter_map(item_text)
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect();

    if prompts.is_empty() {
        return Err(DecodeError::Empty);
    }
    Ok(prompts)
}

const QUOTES: &[char] = &['"', '\'', '\u{201C}', '\u{201D}', '\u{2018}', '\u{2019}'];

fn strip_label(s: &str) -> &str {
    const LABEL: &str = "prompt:";
    match s.get(..LABEL.len()) {
        Some(head) if head.eq_ignore_ascii_case(LABEL) => &s[LABEL.len()..],
        _ => s,
    }
}

fn strip_once(s: &str) -> &str {
    let s = s.trim();
    let s = strip_label(s).trim_start();
    let s = s.strip_prefix("**").unwrap_or(s);
    let s = s.strip_suffix("**").unwrap_or(s);
    let s = s.strip_prefix(QUOTES).unwrap_or(s);
    s.strip_suffix(QUOTES).unwrap_or(s)
}

/// Extracts a single free-text prompt, peeling off surrounding quotes,
/// bold markers and a leading `Prompt:` label in any nesting order.
pub fn extract_single_prompt(text: &str) -> Result<String, DecodeError> {
    let mut current = text;
    loop {
        let next = strip_once(current);
        if next == current {
            break;
        }
        current = next;
    }

    if current.is_empty() {
        return Err(DecodeError::Empty);
    }
    Ok(current.to_string())
}
