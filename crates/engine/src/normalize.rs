//! Conversion of loosely-typed model records into canonical [`TestCase`]s.
//!
//! Every rule here is total: any JSON value produces a test case, and only an
//! empty input list is an error.

use serde_json::{Map, Value};

use crate::error::EngineError;
use crate::model::{CaseType, Category, Priority, Step, TestCase};

const ID_KEYS: &[&str] = &["id", "testId", "test_id", "testCaseId"];
const TITLE_KEYS: &[&str] = &["title", "name"];
const DESCRIPTION_KEYS: &[&str] = &["description"];
const CATEGORY_KEYS: &[&str] = &["category"];
const PRIORITY_KEYS: &[&str] = &["priority"];
const TYPE_KEYS: &[&str] = &["type", "testType"];
const PRECONDITION_KEYS: &[&str] = &["preconditions", "preConditions", "pre_conditions"];
const TAG_KEYS: &[&str] = &["tags"];
const FINAL_RESULT_KEYS: &[&str] = &[
    "finalExpectedResult",
    "final_expected_result",
    "expectedResult",
    "expected_result",
];

const STEP_NUMBER_KEYS: &[&str] = &["stepNumber", "step_number", "number", "step"];
const ACTION_KEYS: &[&str] = &["action", "step", "do", "when", "then", "given"];
const EXPECTED_KEYS: &[&str] = &["expectedBehavior", "expected_behavior", "expected", "outcome", "result"];
const TEST_DATA_KEYS: &[&str] = &["testData", "test_data"];
const UI_INTERACTION_KEYS: &[&str] = &["uiInteraction", "ui_interaction"];

pub const DEFAULT_ACTION: &str = "Execute step";
pub const DEFAULT_FINAL_RESULT: &str = "Expected behavior observed";

/// Normalize every raw record. Output length equals input length.
pub fn normalize_test_cases(records: &[Value]) -> Result<Vec<TestCase>, EngineError> {
    if records.is_empty() {
        return Err(EngineError::NoTestCases);
    }

    let cases: Vec<TestCase> = records
        .iter()
        .enumerate()
        .map(|(i, record)| normalize_record(record, i))
        // Defaults always supply both; a record is only dropped without them.
        .filter(|case| !case.title.is_empty() && !case.steps.is_empty())
        .collect();

    if cases.is_empty() {
        return Err(EngineError::NoTestCases);
    }
    Ok(cases)
}

/// Normalize one record found at 0-based `index` in its list.
pub fn normalize_record(record: &Value, index: usize) -> TestCase {
    let empty = Map::new();
    let (fields, bare_title) = match record {
        Value::Object(map) => (map, None),
        // A bare string is the best title we will get.
        other => (&empty, scalar_text(other)),
    };
    let ordinal = index + 1;

    let id = text_field(fields, ID_KEYS).unwrap_or_else(|| format!("test-{ordinal}"));
    let raw_description = text_field(fields, DESCRIPTION_KEYS);
    let title = text_field(fields, TITLE_KEYS)
        .or(bare_title)
        .or_else(|| raw_description.clone())
        .unwrap_or_else(|| format!("Test Case {ordinal}"));
    let description_supplied = raw_description.is_some();
    let description =
        raw_description.unwrap_or_else(|| format!("Validate scenario for {title}"));

    let category = text_field(fields, CATEGORY_KEYS)
        .map(|raw| Category::parse(&raw))
        .unwrap_or_default();
    let priority = text_field(fields, PRIORITY_KEYS)
        .map(|raw| Priority::parse(&raw))
        .unwrap_or_default();
    let case_type = text_field(fields, TYPE_KEYS)
        .map(|raw| CaseType::parse(&raw))
        .unwrap_or_default();

    let preconditions = list_field(fields, PRECONDITION_KEYS);
    let mut tags: Vec<String> = Vec::new();
    for tag in list_field(fields, TAG_KEYS) {
        if !tags.contains(&tag) {
            tags.push(tag);
        }
    }

    let steps = normalize_steps(field(fields, &["steps"]), &title);

    let final_expected_result = text_field(fields, FINAL_RESULT_KEYS)
        .or_else(|| {
            steps
                .iter()
                .rev()
                .find_map(|step| step.expected_behavior.clone())
        })
        .unwrap_or_else(|| DEFAULT_FINAL_RESULT.to_string());

    TestCase {
        id,
        title,
        description,
        category,
        priority,
        case_type,
        preconditions,
        steps,
        final_expected_result,
        tags,
        description_supplied,
    }
}

fn normalize_steps(raw: Option<&Value>, title: &str) -> Vec<Step> {
    match raw {
        Some(Value::Array(entries)) if !entries.is_empty() => entries
            .iter()
            .enumerate()
            .map(|(i, entry)| normalize_step(entry, i + 1))
            .collect(),
        Some(Value::String(text)) if !text.trim().is_empty() => {
            vec![Step::new(1, text.trim())]
        }
        _ => {
            log::debug!("synthesizing placeholder step for '{title}'");
            vec![Step::new(
                1,
                format!("Open the screen and verify element exists for {title}"),
            )]
        }
    }
}

/// Normalize one step entry at 1-based `position` in its list.
pub fn normalize_step(raw: &Value, position: usize) -> Step {
    let fallback_number = u32::try_from(position).unwrap_or(u32::MAX);

    let fields = match raw {
        Value::Object(map) => map,
        other => {
            let action = scalar_text(other).unwrap_or_else(|| DEFAULT_ACTION.to_string());
            return Step::new(fallback_number, action);
        }
    };

    let step_number = STEP_NUMBER_KEYS
        .iter()
        .filter_map(|key| fields.get(*key))
        .find_map(positive_integer)
        .unwrap_or(fallback_number);

    // Only string values count as actions; `"step": 2` is a number, not an action.
    let action = ACTION_KEYS
        .iter()
        .filter_map(|key| fields.get(*key))
        .find_map(|value| match value {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            _ => None,
        })
        .unwrap_or_else(|| DEFAULT_ACTION.to_string());

    Step {
        step_number,
        action,
        expected_behavior: text_field(fields, EXPECTED_KEYS),
        test_data: present(fields, TEST_DATA_KEYS),
        ui_interaction: present(fields, UI_INTERACTION_KEYS),
    }
}

// ---------------------------------------------------------------------------
/// Whether a raw record carries a non-blank id, title or description.
/// Non-object records carry none of them.
pub fn is_identifiable(record: &Value) -> bool {
    match record.as_object() {
        Some(fields) => [ID_KEYS, TITLE_KEYS, DESCRIPTION_KEYS]
            .iter()
            .any(|keys| text_field(fields, keys).is_some()),
        None => false,
    }
}

// Field access
// ---------------------------------------------------------------------------

fn field<'a>(fields: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|key| fields.get(*key))
        .find(|value| !value.is_null())
}

/// First non-null value under any key, passed through untouched.
fn present(fields: &Map<String, Value>, keys: &[&str]) -> Option<Value> {
    field(fields, keys).cloned()
}

/// First key holding a non-blank scalar, as trimmed text.
fn text_field(fields: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| fields.get(*key))
        .find_map(scalar_text)
}

/// List under the first matching key; anything that is not a list yields empty.
fn list_field(fields: &Map<String, Value>, keys: &[&str]) -> Vec<String> {
    match field(fields, keys) {
        Some(Value::Array(items)) => items.iter().filter_map(item_text).collect(),
        _ => Vec::new(),
    }
}

/// Strings, numbers and booleans read as text; blank strings count as absent.
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// List entries: scalars as text, nested structures as compact JSON.
fn item_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::Array(_) | Value::Object(_) => Some(value.to_string()),
        scalar => scalar_text(scalar),
    }
}

fn positive_integer(value: &Value) -> Option<u32> {
    let n = match value {
        Value::Number(n) => n.as_u64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && *f >= 1.0)
                .map(|f| f as u64)
        })?,
        Value::String(s) => s.trim().parse::<u64>().ok()?,
        _ => return None,
    };
    u32::try_from(n).ok().filter(|n| *n > 0)
}
