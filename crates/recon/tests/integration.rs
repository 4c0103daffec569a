use std::path::PathBuf;

use parcelrec_recon::config::ReconConfig;
use parcelrec_recon::engine::run;
use parcelrec_recon::events::{MemorySink, ReconEvent, SkipReason};
use parcelrec_recon::model::{Dataset, ReconInput, ReconResult, RuleKind, Side, Value};

fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn load(config: &ReconConfig, side: Side) -> Dataset {
    let source = config.sources.get(side);
    let file = source.file.as_deref().expect("fixture config names both files");
    let path = fixtures_dir().join(file);
    let data = std::fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("cannot read {}: {e}", path.display()));
    Dataset::from_csv_str(&source.label, &data).unwrap()
}

fn load_and_run(config_toml: &str) -> (ReconResult, MemorySink) {
    let config = ReconConfig::from_toml(config_toml).unwrap();
    let input = ReconInput {
        a: load(&config, Side::A),
        b: load(&config, Side::B),
    };
    let mut sink = MemorySink::new();
    let result = run(&config, &input, &mut sink).unwrap();
    (result, sink)
}

fn fixture_config() -> String {
    std::fs::read_to_string(fixtures_dir().join("mls-cama.recon.toml")).unwrap()
}

// -------------------------------------------------------------------------
// End-to-end
// -------------------------------------------------------------------------

#[test]
fn mls_cama_summary() {
    let (result, _) = load_and_run(&fixture_config());
    let s = &result.summary;

    assert_eq!(result.meta.config_name, "MLS vs CAMA");
    assert_eq!(result.meta.source_a, "MLS");
    assert_eq!(result.meta.source_b, "CAMA");
    assert_eq!(s.records_a, 6);
    assert_eq!(s.records_b, 5);
    assert_eq!(s.blank_keys_a, 1);
    assert_eq!(s.missing_in_b, 1);
    assert_eq!(s.missing_in_a, 1);
    assert_eq!(s.mismatched_records, 3);
    assert_eq!(s.mismatch_rows, 4);
    assert_eq!(s.perfect_matches, 1);
    assert_eq!(s.skipped, 0);
    assert_eq!(s.matched_pairs, 4);
    assert!(!s.is_clean());

    let fields: Vec<&str> = s.mismatches_by_field.iter().map(|f| f.field.as_str()).collect();
    assert_eq!(
        fields,
        vec![
            "Above Grade Finished Area",
            "Bedrooms Total",
            "Below Grade Finished Area",
            "Cooling",
        ]
    );
}

#[test]
fn mls_cama_mismatch_rows() {
    let (result, _) = load_and_run(&fixture_config());
    let rows: Vec<(&str, &str, String)> = result
        .tables
        .mismatches
        .iter()
        .map(|row| {
            let d = &row.discrepancy;
            let diff = d.difference.map(|x| x.to_string()).unwrap_or_default();
            (d.key.as_str(), d.field_a.as_str(), diff)
        })
        .collect();
    assert_eq!(
        rows,
        vec![
            ("10001", "Below Grade Finished Area", "150.00".to_string()),
            ("10002", "Bedrooms Total", "-1.00".to_string()),
            ("10006", "Above Grade Finished Area", "50.00".to_string()),
            ("10006", "Cooling", String::new()),
        ]
    );

    let sum_row = &result.tables.mismatches[0];
    assert_eq!(sum_row.discrepancy.kind, RuleKind::Sum);
    assert_eq!(sum_row.discrepancy.value_b, Value::Number(350.0));
    assert_eq!(sum_row.passthrough.get("Listing #"), Some(&Value::from("L-501")));
    assert_eq!(sum_row.passthrough.get("SALEKEY"), Some(&Value::from("9001")));

    let cooling = &result.tables.mismatches[3].discrepancy;
    assert_eq!(cooling.expected_b, Some(Value::Number(1.0)));
    assert_eq!(cooling.value_b, Value::from("0"));
}

#[test]
fn mls_cama_missing_and_perfect() {
    let (result, _) = load_and_run(&fixture_config());
    let t = &result.tables;

    assert_eq!(t.missing_in_b[0].key.as_str(), "10004");
    assert_eq!(t.missing_in_b[0].passthrough.get("Listing #"), Some(&Value::from("L-504")));
    assert_eq!(t.missing_in_a[0].key.as_str(), "10005");

    let perfect = &t.perfect_matches[0];
    assert_eq!(perfect.key.as_str(), "10003");
    assert_eq!(perfect.fields_compared_count, 3);
    assert_eq!(
        perfect.fields_compared,
        vec!["Above Grade Finished Area", "Bedrooms Total", "Cooling"]
    );
}

#[test]
fn mls_cama_events() {
    let (_, sink) = load_and_run(&fixture_config());

    assert!(sink.events.contains(&ReconEvent::BlankKey { side: Side::A, row: 4 }));
    assert!(sink
        .events
        .iter()
        .any(|e| matches!(e, ReconEvent::FieldSkipped { reason: SkipReason::Zero, field, .. } if field == "Bedrooms Total")));
    // 4 + 3 + 3 + 3 fields compared across the four matched keys
    assert_eq!(sink.compared(), 13);
}

// -------------------------------------------------------------------------
// Config variations
// -------------------------------------------------------------------------

#[test]
fn zero_suppression_disabled() {
    let toml = fixture_config().replace("name = \"MLS vs CAMA\"", "name = \"t\"\nskip_zero = false");
    let (result, _) = load_and_run(&toml);
    let beds: Vec<_> = result
        .tables
        .mismatches
        .iter()
        .filter(|row| row.discrepancy.field_a == "Bedrooms Total")
        .map(|row| row.discrepancy.key.as_str())
        .collect();
    assert_eq!(beds, vec!["10002", "10006"]);
}

#[test]
fn unknown_rule_column_is_skipped_not_fatal() {
    let toml = format!("{}\n[[direct]]\na = \"Full Baths\"\nb = \"FIXBATH\"\n", fixture_config());
    let (result, sink) = load_and_run(&toml);
    assert_eq!(result.summary.mismatch_rows, 4);
    let missing: Vec<_> = sink
        .events
        .iter()
        .filter(|e| matches!(e, ReconEvent::FieldNotFound { .. }))
        .collect();
    assert_eq!(missing.len(), 2);
}

#[test]
fn tables_stable_across_runs() {
    let (first, _) = load_and_run(&fixture_config());
    let (second, _) = load_and_run(&fixture_config());
    assert_eq!(first.tables, second.tables);
    assert_eq!(
        serde_json::to_string(&first.tables).unwrap(),
        serde_json::to_string(&second.tables).unwrap()
    );
}
