// Property-based tests for the export service.
// CI: 256 cases (default). Soak: PROPTEST_CASES=10000 cargo test --release

use proptest::prelude::*;
use serde_json::{json, Map, Value};

use casegrid_cli::export::{ExportError, Exporter};
use casegrid_config::Settings;
use casegrid_io::template::NoTemplate;
use casegrid_protocol::ExportRequest;

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

fn config_256() -> ProptestConfig {
    ProptestConfig {
        cases: std::env::var("PROPTEST_CASES")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(256),
        failure_persistence: None,
        ..ProptestConfig::default()
    }
}

// ---------------------------------------------------------------------------
// Generators
// ---------------------------------------------------------------------------

/// A record that may lack its id, its title, or both.
fn arb_record() -> impl Strategy<Value = Value> {
    (
        prop::option::of("[A-Z]{2}-[0-9]{2}"),
        prop::option::of("[A-Za-z]{1,12}"),
        prop::collection::vec("[a-z]{1,8}", 0..4),
    )
        .prop_map(|(id, title, steps)| {
            let mut fields = Map::new();
            if let Some(id) = id {
                fields.insert("id".into(), json!(id));
            }
            if let Some(title) = title {
                fields.insert("title".into(), json!(title));
            }
            fields.insert("steps".into(), json!(steps));
            Value::Object(fields)
        })
}

fn markdown_request(records: Vec<Value>) -> ExportRequest {
    ExportRequest {
        test_cases: Some(Value::Array(records)),
        format: Some("markdown".to_string()),
        grouping_strategy: Some("none".to_string()),
        include_steps: Some(true),
        ..Default::default()
    }
}

fn identifiable(record: &Value) -> bool {
    record.get("id").is_some() || record.get("title").is_some()
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(config_256())]

    #[test]
    fn success_iff_every_record_is_identifiable(records in prop::collection::vec(arb_record(), 0..5)) {
        let settings = Settings::default();
        let exporter = Exporter::new(&settings, &NoTemplate);
        let expect_success = !records.is_empty() && records.iter().all(identifiable);

        let (response, error) = exporter.respond(&markdown_request(records.clone()));
        prop_assert_eq!(response.success, expect_success);
        prop_assert_eq!(error.is_none(), expect_success);
        prop_assert_eq!(response.data.is_some(), expect_success);
        if let Some(error) = error {
            prop_assert!(matches!(error, ExportError::Validation(_)));
            prop_assert_eq!(response.message, Some(error.to_string()));
        }
    }

    #[test]
    fn markdown_has_one_line_per_table_row(
        steps in prop::collection::vec(prop::collection::vec("[a-z]{1,8}", 0..4), 1..5),
    ) {
        let records: Vec<Value> = steps
            .iter()
            .enumerate()
            .map(|(i, actions)| json!({ "id": format!("TC-{i}"), "steps": actions }))
            .collect();
        // A record without steps still gets one synthesized step.
        let expected_rows: usize = steps.iter().map(|actions| actions.len().max(1)).sum();

        let settings = Settings::default();
        let data = Exporter::new(&settings, &NoTemplate)
            .export(&markdown_request(records))
            .unwrap();

        prop_assert_eq!(data.total_test_cases, steps.len());
        let lines: Vec<&str> = data.content.lines().collect();
        prop_assert_eq!(lines.len(), expected_rows + 2);
        for (n, line) in lines[2..].iter().enumerate() {
            let prefix = format!("| {} |", n + 1);
            prop_assert!(line.starts_with(&prefix));
        }
    }
}
