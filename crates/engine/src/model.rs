use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Enumerations
// ---------------------------------------------------------------------------

/// Normalize a raw enum spelling for lookup: trimmed, lowercase, with
/// spaces and dashes folded to underscores ("Edge-Case" → "edge_case").
fn lookup_key(raw: &str) -> String {
    raw.trim()
        .chars()
        .map(|c| match c {
            ' ' | '-' => '_',
            c => c.to_ascii_lowercase(),
        })
        .collect()
}

/// Capitalize the first character, leaving the rest untouched.
pub(crate) fn capitalize(raw: &str) -> String {
    let trimmed = raw.trim();
    let mut chars = trimmed.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Test category. Unrecognized raw values are kept verbatim in `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Category {
    Visual,
    Functional,
    Integration,
    Performance,
    Security,
    EdgeCase,
    Regression,
    Accessibility,
    UiUx,
    Other(String),
}

impl Category {
    pub fn parse(raw: &str) -> Self {
        match lookup_key(raw).as_str() {
            "visual" => Self::Visual,
            "functional" => Self::Functional,
            "integration" => Self::Integration,
            "performance" => Self::Performance,
            "security" => Self::Security,
            "edge_case" | "edgecase" => Self::EdgeCase,
            "regression" => Self::Regression,
            "accessibility" => Self::Accessibility,
            "ui_ux" | "ui/ux" | "uiux" => Self::UiUx,
            _ => Self::Other(raw.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Visual => "visual",
            Self::Functional => "functional",
            Self::Integration => "integration",
            Self::Performance => "performance",
            Self::Security => "security",
            Self::EdgeCase => "edge_case",
            Self::Regression => "regression",
            Self::Accessibility => "accessibility",
            Self::UiUx => "ui_ux",
            Self::Other(raw) => raw,
        }
    }

    /// Group heading for this category.
    pub fn display_label(&self) -> String {
        match self {
            Self::Visual => "Visual Tests".into(),
            Self::Functional => "Functional Tests".into(),
            Self::Integration => "Integration Tests".into(),
            Self::Performance => "Performance Tests".into(),
            Self::Security => "Security Tests".into(),
            Self::EdgeCase => "Edge Case Tests".into(),
            Self::Regression => "Regression Tests".into(),
            Self::Accessibility => "Accessibility Tests".into(),
            Self::UiUx => "UI/UX Tests".into(),
            Self::Other(raw) => capitalize(raw),
        }
    }
}

impl Default for Category {
    fn default() -> Self {
        Self::Functional
    }
}

impl From<String> for Category {
    fn from(raw: String) -> Self {
        Self::parse(&raw)
    }
}

impl From<Category> for String {
    fn from(category: Category) -> Self {
        category.as_str().to_string()
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Priority {
    Critical,
    High,
    Medium,
    Low,
    Other(String),
}

impl Priority {
    pub fn parse(raw: &str) -> Self {
        match lookup_key(raw).as_str() {
            "critical" => Self::Critical,
            "high" => Self::High,
            "medium" => Self::Medium,
            "low" => Self::Low,
            _ => Self::Other(raw.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Critical => "critical",
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
            Self::Other(raw) => raw,
        }
    }

    pub fn display_label(&self) -> String {
        match self {
            Self::Critical => "Critical Priority".into(),
            Self::High => "High Priority".into(),
            Self::Medium => "Medium Priority".into(),
            Self::Low => "Low Priority".into(),
            Self::Other(raw) => capitalize(raw),
        }
    }
}

impl Default for Priority {
    fn default() -> Self {
        Self::Medium
    }
}

impl From<String> for Priority {
    fn from(raw: String) -> Self {
        Self::parse(&raw)
    }
}

impl From<Priority> for String {
    fn from(priority: Priority) -> Self {
        priority.as_str().to_string()
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Test type (positive/negative/...). Serialized under the `type` key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum CaseType {
    Positive,
    Negative,
    Boundary,
    Exploratory,
    Other(String),
}

impl CaseType {
    pub fn parse(raw: &str) -> Self {
        match lookup_key(raw).as_str() {
            "positive" => Self::Positive,
            "negative" => Self::Negative,
            "boundary" => Self::Boundary,
            "exploratory" => Self::Exploratory,
            _ => Self::Other(raw.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Positive => "positive",
            Self::Negative => "negative",
            Self::Boundary => "boundary",
            Self::Exploratory => "exploratory",
            Self::Other(raw) => raw,
        }
    }
}

impl Default for CaseType {
    fn default() -> Self {
        Self::Positive
    }
}

impl From<String> for CaseType {
    fn from(raw: String) -> Self {
        Self::parse(&raw)
    }
}

impl From<CaseType> for String {
    fn from(case_type: CaseType) -> Self {
        case_type.as_str().to_string()
    }
}

impl std::fmt::Display for CaseType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Canonical records
// ---------------------------------------------------------------------------

/// One step of a test case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    /// 1-based.
    pub step_number: u32,
    pub action: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_behavior: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test_data: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ui_interaction: Option<serde_json::Value>,
}

impl Step {
    pub fn new(step_number: u32, action: impl Into<String>) -> Self {
        Self {
            step_number,
            action: action.into(),
            expected_behavior: None,
            test_data: None,
            ui_interaction: None,
        }
    }

    pub fn with_expected(mut self, expected: impl Into<String>) -> Self {
        self.expected_behavior = Some(expected.into());
        self
    }
}

/// Canonical test case, fully defaulted by the normalizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCase {
    pub id: String,
    pub title: String,
    pub description: String,
    pub category: Category,
    pub priority: Priority,
    #[serde(rename = "type")]
    pub case_type: CaseType,
    pub preconditions: Vec<String>,
    pub steps: Vec<Step>,
    pub final_expected_result: String,
    pub tags: Vec<String>,
    /// False when `description` was synthesized from the title.
    #[serde(skip_serializing, default = "supplied")]
    pub description_supplied: bool,
}

fn supplied() -> bool {
    true
}

impl TestCase {
    /// Text for the Description column: the record's own description, else
    /// the title.
    pub fn description_cell(&self) -> &str {
        if self.description_supplied && !self.description.trim().is_empty() {
            &self.description
        } else if self.title.trim().is_empty() {
            &self.description
        } else {
            &self.title
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_parse_is_lenient_on_spelling() {
        assert_eq!(Category::parse("Edge-Case"), Category::EdgeCase);
        assert_eq!(Category::parse(" UI_UX "), Category::UiUx);
        assert_eq!(Category::parse("FUNCTIONAL"), Category::Functional);
    }

    #[test]
    fn unknown_values_are_preserved_verbatim() {
        let category = Category::parse("smoke test");
        assert_eq!(category, Category::Other("smoke test".into()));
        assert_eq!(category.as_str(), "smoke test");
        assert_eq!(category.display_label(), "Smoke test");

        assert_eq!(Priority::parse("P0").as_str(), "P0");
        assert_eq!(CaseType::parse("stress").as_str(), "stress");
    }

    #[test]
    fn display_labels() {
        assert_eq!(Category::EdgeCase.display_label(), "Edge Case Tests");
        assert_eq!(Priority::High.display_label(), "High Priority");
    }

    #[test]
    fn serde_uses_raw_strings() {
        let case = TestCase {
            id: "T-1".into(),
            title: "Login".into(),
            description: "Login works".into(),
            category: Category::EdgeCase,
            priority: Priority::Critical,
            case_type: CaseType::Negative,
            preconditions: vec![],
            steps: vec![Step::new(1, "Open login")],
            final_expected_result: "Shown".into(),
            tags: vec![],
            description_supplied: true,
        };
        let json = serde_json::to_value(&case).unwrap();
        assert_eq!(json["category"], "edge_case");
        assert_eq!(json["priority"], "critical");
        assert_eq!(json["type"], "negative");
        assert_eq!(json["finalExpectedResult"], "Shown");
        assert_eq!(json["steps"][0]["stepNumber"], 1);
        assert!(json["steps"][0].get("expectedBehavior").is_none());
        assert!(json.get("descriptionSupplied").is_none());

        let back: TestCase = serde_json::from_value(json).unwrap();
        assert_eq!(back, case);
    }

    #[test]
    fn description_cell_prefers_supplied_description() {
        let mut case: TestCase = serde_json::from_value(serde_json::json!({
            "id": "T-1", "title": "Login", "description": "User can log in",
            "category": "functional", "priority": "medium", "type": "positive",
            "preconditions": [], "steps": [], "finalExpectedResult": "ok", "tags": []
        }))
        .unwrap();
        assert!(case.description_supplied);
        assert_eq!(case.description_cell(), "User can log in");

        case.description_supplied = false;
        assert_eq!(case.description_cell(), "Login");
    }
}
