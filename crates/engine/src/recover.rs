//! Recovery of a test-case array from free-form model output.
//!
//! Model completions arrive as JSON, JSON wrapped in a code fence, JSON
//! surrounded by prose, or JSON that is broken somewhere outside the array we
//! care about. Each case is handled by one strategy in [`STRATEGIES`]; the
//! first strategy that yields an array wins.

use serde_json::Value;

use crate::error::EngineError;

/// Field names that may hold the test-case array.
pub const ARRAY_FIELDS: [&str; 3] = ["testCases", "tests", "test_cases"];

/// Wrapper objects that may hold one of [`ARRAY_FIELDS`] one level down.
const WRAPPER_FIELDS: [&str; 2] = ["data", "result"];

const FENCE: &str = "```";

type Strategy = fn(&str) -> Result<Vec<Value>, String>;

/// The recovery chain, in the order strategies are tried.
const STRATEGIES: [(&str, Strategy); 4] = [
    ("direct", parse_direct),
    ("code_fence", parse_fenced),
    ("brace_slice", parse_brace_slice),
    ("array_scan", parse_array_scan),
];

/// Extract the raw test-case records from a model completion.
///
/// Deterministic: the same input always yields the same array or the same
/// error. The error names only the input length, never its content.
pub fn recover_test_cases(raw: &str) -> Result<Vec<Value>, EngineError> {
    let mut attempts = Vec::with_capacity(STRATEGIES.len());

    for (name, strategy) in STRATEGIES {
        match strategy(raw) {
            Ok(records) => {
                log::debug!("recovered {} records via {name} strategy", records.len());
                return Ok(records);
            }
            Err(reason) => attempts.push(format!("{name}: {reason}")),
        }
    }

    log::debug!("recovery failed for {} chars: {}", raw.len(), attempts.join("; "));
    Err(EngineError::Unrecoverable {
        input_len: raw.len(),
        attempts,
    })
}

// ---------------------------------------------------------------------------
// Strategies
// ---------------------------------------------------------------------------

/// Step 1: the whole (trimmed) text is JSON.
fn parse_direct(raw: &str) -> Result<Vec<Value>, String> {
    let value: Value = serde_json::from_str(raw.trim()).map_err(|e| e.to_string())?;
    find_case_array(value).ok_or_else(|| "no test case array field".to_string())
}

/// Step 2: the JSON sits inside a code fence. Every fenced block is tried
/// in order, so an unrelated snippet before the answer does not hide it.
fn parse_fenced(raw: &str) -> Result<Vec<Value>, String> {
    let blocks = fenced_blocks(raw);
    if blocks.is_empty() {
        return Err("no code fence".into());
    }
    first_success(&blocks, parse_direct)
}

/// Step 3: the JSON object is surrounded by prose.
fn parse_brace_slice(raw: &str) -> Result<Vec<Value>, String> {
    first_success(&search_texts(raw), |text| {
        let start = text.find('{').ok_or_else(|| "no opening brace".to_string())?;
        let end = text.rfind('}').ok_or_else(|| "no closing brace".to_string())?;
        if end < start {
            return Err("closing brace precedes opening brace".into());
        }
        parse_direct(&text[start..=end])
    })
}

/// Step 4: only the array itself is well-formed.
fn parse_array_scan(raw: &str) -> Result<Vec<Value>, String> {
    first_success(&search_texts(raw), scan_array)
}

/// Find the array after the first test-case field name and parse exactly
/// that slice.
///
/// Brackets inside string literals are counted too; only this one array
/// needs to balance, so a plain depth counter is sufficient.
fn scan_array(text: &str) -> Result<Vec<Value>, String> {
    let field_pos = ARRAY_FIELDS
        .iter()
        .find_map(|field| text.find(&format!("\"{field}\"")))
        .or_else(|| ARRAY_FIELDS.iter().find_map(|field| find_bare_field(text, field)))
        .ok_or_else(|| "no test case array field name".to_string())?;

    let open = text[field_pos..]
        .find('[')
        .map(|offset| field_pos + offset)
        .ok_or_else(|| "no array after field name".to_string())?;

    let mut depth = 0usize;
    let mut close = None;
    for (i, byte) in text.as_bytes()[open..].iter().enumerate() {
        match byte {
            b'[' => depth += 1,
            b']' => {
                depth -= 1;
                if depth == 0 {
                    close = Some(open + i);
                    break;
                }
            }
            _ => {}
        }
    }
    let close = close.ok_or_else(|| "unbalanced array brackets".to_string())?;

    match serde_json::from_str::<Value>(&text[open..=close]).map_err(|e| e.to_string())? {
        Value::Array(records) => Ok(records),
        _ => Err("extracted slice is not an array".into()),
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Locate the test-case array in a parsed JSON value.
fn find_case_array(value: Value) -> Option<Vec<Value>> {
    match value {
        Value::Array(records) => Some(records),
        Value::Object(mut map) => {
            for field in ARRAY_FIELDS {
                if let Some(Value::Array(records)) = map.remove(field) {
                    return Some(records);
                }
            }
            for wrapper in WRAPPER_FIELDS {
                if let Some(Value::Object(mut inner)) = map.remove(wrapper) {
                    for field in ARRAY_FIELDS {
                        if let Some(Value::Array(records)) = inner.remove(field) {
                            return Some(records);
                        }
                    }
                }
            }
            None
        }
        _ => None,
    }
}

/// Unquoted `field:` as written by JavaScript-style output.
fn find_bare_field(text: &str, field: &str) -> Option<usize> {
    text.match_indices(field).map(|(pos, _)| pos).find(|&pos| {
        let starts_word = text[..pos]
            .chars()
            .next_back()
            .map_or(true, |c| !(c.is_alphanumeric() || c == '_'));
        starts_word && text[pos + field.len()..].trim_start().starts_with(':')
    })
}

/// Bodies of every fenced block, in order: the text after each opening fence
/// line (which may carry a language tag) up to its closing fence, or to the
/// end of the text when the closing fence is missing.
fn fenced_blocks(raw: &str) -> Vec<&str> {
    let mut blocks = Vec::new();
    let mut rest = raw;
    while let Some(open) = rest.find(FENCE) {
        let after_open = &rest[open + FENCE.len()..];
        // Single-line fences keep their tag; the brace slice strips it later.
        let body_start = after_open.find('\n').map(|i| i + 1).unwrap_or(0);
        let body = &after_open[body_start..];
        match body.find(FENCE) {
            Some(close) => {
                blocks.push(body[..close].trim());
                rest = &body[close + FENCE.len()..];
            }
            None => {
                blocks.push(body.trim());
                break;
            }
        }
    }
    blocks
}

/// Texts the later strategies search: each fence body, then the whole input.
fn search_texts(raw: &str) -> Vec<&str> {
    let mut texts = fenced_blocks(raw);
    texts.push(raw.trim());
    texts
}

/// Run `parse` over each candidate text; the first success wins, otherwise
/// the first failure is reported.
fn first_success(
    texts: &[&str],
    parse: impl Fn(&str) -> Result<Vec<Value>, String>,
) -> Result<Vec<Value>, String> {
    let mut first_error = None;
    for text in texts {
        match parse(text) {
            Ok(records) => return Ok(records),
            Err(e) => {
                first_error.get_or_insert(e);
            }
        }
    }
    Err(first_error.unwrap_or_else(|| "nothing to search".to_string()))
}
