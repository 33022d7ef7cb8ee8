use serde::{Deserialize, Serialize};

use crate::model::TestCase;

/// Label of the single group produced by [`GroupingStrategy::None`].
pub const ALL_TEST_CASES: &str = "All Test Cases";

/// How test cases are partitioned into sections or sheets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupingStrategy {
    Category,
    Priority,
    None,
}

impl Default for GroupingStrategy {
    fn default() -> Self {
        Self::Category
    }
}

impl GroupingStrategy {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "category" => Some(Self::Category),
            "priority" => Some(Self::Priority),
            "none" => Some(Self::None),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Category => "category",
            Self::Priority => "priority",
            Self::None => "none",
        }
    }

    /// Whether formatters print a per-group heading.
    pub fn shows_group_headings(&self) -> bool {
        !matches!(self, Self::None)
    }
}

impl std::fmt::Display for GroupingStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One labelled partition of the input.
#[derive(Debug, Clone, PartialEq)]
pub struct TestGroup {
    pub label: String,
    pub cases: Vec<TestCase>,
}

/// Partition `cases` by `strategy`.
///
/// Groups appear in first-seen order and keep input order within each group.
pub fn group_test_cases(cases: &[TestCase], strategy: GroupingStrategy) -> Vec<TestGroup> {
    let mut groups: Vec<TestGroup> = Vec::new();

    for case in cases {
        let label = match strategy {
            GroupingStrategy::Category => case.category.display_label(),
            GroupingStrategy::Priority => case.priority.display_label(),
            GroupingStrategy::None => ALL_TEST_CASES.to_string(),
        };
        match groups.iter_mut().find(|g| g.label == label) {
            Some(group) => group.cases.push(case.clone()),
            None => groups.push(TestGroup {
                label,
                cases: vec![case.clone()],
            }),
        }
    }

    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CaseType, Category, Priority, Step};

    fn case(id: &str, category: Category, priority: Priority) -> TestCase {
        TestCase {
            id: id.into(),
            title: id.into(),
            description: id.into(),
            category,
            priority,
            case_type: CaseType::Positive,
            preconditions: vec![],
            steps: vec![Step::new(1, "go")],
            final_expected_result: "ok".into(),
            tags: vec![],
            description_supplied: true,
        }
    }

    fn ids(group: &TestGroup) -> Vec<&str> {
        group.cases.iter().map(|c| c.id.as_str()).collect()
    }

    #[test]
    fn category_groups_in_first_seen_order() {
        let cases = vec![
            case("a", Category::Security, Priority::High),
            case("b", Category::Visual, Priority::Low),
            case("c", Category::Security, Priority::Low),
        ];
        let groups = group_test_cases(&cases, GroupingStrategy::Category);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].label, "Security Tests");
        assert_eq!(ids(&groups[0]), vec!["a", "c"]);
        assert_eq!(groups[1].label, "Visual Tests");
        assert_eq!(ids(&groups[1]), vec!["b"]);
    }

    #[test]
    fn priority_groups() {
        let cases = vec![
            case("a", Category::Visual, Priority::Low),
            case("b", Category::Visual, Priority::Critical),
            case("c", Category::Visual, Priority::Low),
        ];
        let groups = group_test_cases(&cases, GroupingStrategy::Priority);
        let labels: Vec<&str> = groups.iter().map(|g| g.label.as_str()).collect();
        assert_eq!(labels, vec!["Low Priority", "Critical Priority"]);
    }

    #[test]
    fn none_yields_one_group() {
        let cases = vec![
            case("a", Category::Visual, Priority::Low),
            case("b", Category::Security, Priority::High),
        ];
        let groups = group_test_cases(&cases, GroupingStrategy::None);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].label, ALL_TEST_CASES);
        assert_eq!(ids(&groups[0]), vec!["a", "b"]);
    }

    #[test]
    fn unknown_category_uses_capitalized_raw_text() {
        let cases = vec![case("a", Category::Other("smoke".into()), Priority::Low)];
        let groups = group_test_cases(&cases, GroupingStrategy::Category);
        assert_eq!(groups[0].label, "Smoke");
    }

    #[test]
    fn empty_input_yields_no_groups() {
        assert!(group_test_cases(&[], GroupingStrategy::Category).is_empty());
    }

    #[test]
    fn strategy_parse_and_serde() {
        assert_eq!(GroupingStrategy::parse(" Priority "), Some(GroupingStrategy::Priority));
        assert_eq!(GroupingStrategy::parse("tags"), None);
        let json = serde_json::to_string(&GroupingStrategy::None).unwrap();
        assert_eq!(json, "\"none\"");
        let back: GroupingStrategy = serde_json::from_str("\"category\"").unwrap();
        assert_eq!(back, GroupingStrategy::Category);
    }
}
