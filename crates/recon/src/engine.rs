use crate::categorical::{categorical_match, describe, expected_value};
use crate::compare::{coerce_number, difference, is_zero, values_equal};
use crate::config::{CategoricalRule, DirectRule, FieldRule, PassthroughConfig, ReconConfig, SumRule};
use crate::error::ReconError;
use crate::events::{EventSink, ReconEvent, SkipReason};
use crate::evidence::compute_summary;
use crate::merger::{check_key_columns, find_duplicates, merge, MergeEntry, MergeOutput};
use crate::model::{
    ComparisonTables, Dataset, DuplicateKey, FieldDiscrepancy, MatchOutcome, MismatchRow,
    MissingRow, Passthrough, PerfectMatchRow, ReconInput, ReconMeta, ReconResult, Record,
    RecordKey, RuleKind, Side, Value,
};

/// Run reconciliation per config. Returns the report tables, a summary and
/// run metadata.
pub fn run(
    config: &ReconConfig,
    input: &ReconInput,
    sink: &mut dyn EventSink,
) -> Result<ReconResult, ReconError> {
    let tables = compare(&input.a, &input.b, config, sink)?;
    let summary = compute_summary(&input.a, &input.b, &tables);

    Ok(ReconResult {
        meta: ReconMeta {
            config_name: config.name.clone(),
            source_a: input.a.label.clone(),
            source_b: input.b.label.clone(),
            tolerance: config.tolerance,
            skip_zero: config.skip_zero,
            engine_version: env!("CARGO_PKG_VERSION").to_string(),
            run_at: chrono::Utc::now().to_rfc3339(),
        },
        summary,
        tables,
    })
}

/// Compare two datasets and fold every outcome into the report tables.
pub fn compare(
    a: &Dataset,
    b: &Dataset,
    config: &ReconConfig,
    sink: &mut dyn EventSink,
) -> Result<ComparisonTables, ReconError> {
    let comparison = Comparison::prepare(a, b, config, sink)?;
    let mut tables = ComparisonTables::collect(comparison.outcomes(sink), &config.passthrough);
    tables.duplicates = comparison.duplicates().to_vec();
    tables.blank_keys_a = comparison.merged.blank_key_count(Side::A);
    tables.blank_keys_b = comparison.merged.blank_key_count(Side::B);
    Ok(tables)
}

// ---------------------------------------------------------------------------
// Comparison
// ---------------------------------------------------------------------------

/// A merged pair of datasets with rules resolved against both schemas.
/// Outcomes are produced on demand; call [`Comparison::outcomes`] again to
/// restart from the first merge entry.
pub struct Comparison<'a> {
    config: &'a ReconConfig,
    merged: MergeOutput<'a>,
    rules: Vec<FieldRule<'a>>,
    duplicates: Vec<DuplicateKey>,
}

/// What happened to one rule for one pair.
enum FieldVerdict {
    Skipped,
    /// Counted as compared, but no values were judged.
    Counted,
    Equal,
    Different(FieldDiscrepancy),
}

impl<'a> Comparison<'a> {
    /// Validate, detect duplicates, merge and resolve rules. Fails only on
    /// configuration problems.
    pub fn prepare(
        a: &'a Dataset,
        b: &'a Dataset,
        config: &'a ReconConfig,
        sink: &mut dyn EventSink,
    ) -> Result<Self, ReconError> {
        if config.rule_count() == 0 {
            return Err(ReconError::ConfigValidation(
                "at least one direct, sum or categorical rule is required".into(),
            ));
        }
        check_key_columns(a, b, &config.key)?;

        let mut duplicates = find_duplicates(a, &config.key.a, Side::A);
        duplicates.extend(find_duplicates(b, &config.key.b, Side::B));
        for dup in &duplicates {
            sink.record(ReconEvent::DuplicateKey {
                side: dup.side,
                key: dup.key.clone(),
                count: dup.count,
            });
        }

        let merged = merge(a, b, &config.key)?;
        for &(side, row) in &merged.blank_keys {
            sink.record(ReconEvent::BlankKey { side, row });
        }

        let rules = resolve_rules(a, b, config, sink);

        Ok(Self {
            config,
            merged,
            rules,
            duplicates,
        })
    }

    pub fn duplicates(&self) -> &[DuplicateKey] {
        &self.duplicates
    }

    /// Rules that survived resolution, in evaluation order.
    pub fn rules(&self) -> &[FieldRule<'a>] {
        &self.rules
    }

    pub fn merged(&self) -> &MergeOutput<'a> {
        &self.merged
    }

    /// Lazily classify every merge entry, in merge order.
    pub fn outcomes<'s>(
        &'s self,
        sink: &'s mut dyn EventSink,
    ) -> impl Iterator<Item = MatchOutcome<'a>> + 's {
        self.merged
            .entries
            .iter()
            .map(move |entry| self.classify(entry, &mut *sink))
    }

    fn classify(&self, entry: &MergeEntry<'a>, sink: &mut dyn EventSink) -> MatchOutcome<'a> {
        match entry {
            MergeEntry::LeftOnly { key, record } => MatchOutcome::MissingInB {
                key: key.clone(),
                record: *record,
            },
            MergeEntry::RightOnly { key, record } => MatchOutcome::MissingInA {
                key: key.clone(),
                record: *record,
            },
            MergeEntry::Both { key, a, b } => self.evaluate_pair(key, *a, *b, sink),
        }
    }

    fn evaluate_pair(
        &self,
        key: &RecordKey,
        a: &'a Record,
        b: &'a Record,
        sink: &mut dyn EventSink,
    ) -> MatchOutcome<'a> {
        let mut fields_compared = Vec::new();
        let mut discrepancies = Vec::new();

        for rule in &self.rules {
            let verdict = match *rule {
                FieldRule::Direct(r) => self.direct(r, key, a, b, sink),
                FieldRule::Sum(r) => self.sum(r, key, a, b, sink),
                FieldRule::Categorical(r) => self.categorical(r, key, a, b, sink),
            };
            match verdict {
                FieldVerdict::Skipped => {}
                FieldVerdict::Counted | FieldVerdict::Equal => {
                    fields_compared.push(rule.field_a().to_string())
                }
                FieldVerdict::Different(d) => {
                    fields_compared.push(rule.field_a().to_string());
                    discrepancies.push(d);
                }
            }
        }

        let key = key.clone();
        if fields_compared.is_empty() {
            MatchOutcome::Skipped { key }
        } else if discrepancies.is_empty() {
            MatchOutcome::PerfectMatch { key, a, b, fields_compared }
        } else {
            MatchOutcome::Mismatched { key, a, b, fields_compared, discrepancies }
        }
    }

    // -----------------------------------------------------------------------
    // Rule evaluation
    // -----------------------------------------------------------------------

    fn direct(
        &self,
        rule: &DirectRule,
        key: &RecordKey,
        a: &Record,
        b: &Record,
        sink: &mut dyn EventSink,
    ) -> FieldVerdict {
        let (value_a, value_b) = (a.get(&rule.a), b.get(&rule.b));
        if let Some(reason) = blank_reason(value_a, value_b) {
            return skip(sink, key, &rule.a, reason);
        }
        if self.config.skip_zero && (is_zero(value_a) || is_zero(value_b)) {
            return skip(sink, key, &rule.a, SkipReason::Zero);
        }

        let equal = values_equal(value_a, value_b, self.config.tolerance);
        compared(sink, key, &rule.a, value_a, value_b, equal);
        if equal {
            return FieldVerdict::Equal;
        }
        FieldVerdict::Different(FieldDiscrepancy {
            key: key.clone(),
            kind: RuleKind::Direct,
            field_a: rule.a.clone(),
            field_b: rule.b.clone(),
            value_a: value_a.clone(),
            value_b: value_b.clone(),
            difference: Some(difference(value_a, value_b)),
            expected_b: None,
            rule_description: None,
        })
    }

    fn sum(
        &self,
        rule: &SumRule,
        key: &RecordKey,
        a: &Record,
        b: &Record,
        sink: &mut dyn EventSink,
    ) -> FieldVerdict {
        let value_a = a.get(&rule.a);
        if value_a.is_blank() {
            return skip(sink, key, &rule.a, SkipReason::BlankA);
        }

        let Some(total) = sum_fields(b, &rule.b) else {
            return skip(sink, key, &rule.a, SkipReason::AllBlank);
        };
        // A present sum counts as compared even when zero suppression applies
        if self.config.skip_zero && (is_zero(value_a) || total == 0.0) {
            skip(sink, key, &rule.a, SkipReason::Zero);
            return FieldVerdict::Counted;
        }

        let value_b = Value::Number(total);
        let equal = values_equal(value_a, &value_b, self.config.tolerance);
        compared(sink, key, &rule.a, value_a, &value_b, equal);
        if equal {
            return FieldVerdict::Equal;
        }
        FieldVerdict::Different(FieldDiscrepancy {
            key: key.clone(),
            kind: RuleKind::Sum,
            field_a: rule.a.clone(),
            field_b: rule.b_label(),
            value_a: value_a.clone(),
            difference: Some(difference(value_a, &value_b)),
            value_b,
            expected_b: None,
            rule_description: None,
        })
    }

    fn categorical(
        &self,
        rule: &CategoricalRule,
        key: &RecordKey,
        a: &Record,
        b: &Record,
        sink: &mut dyn EventSink,
    ) -> FieldVerdict {
        let (value_a, value_b) = (a.get(&rule.a), b.get(&rule.b));
        if let Some(reason) = blank_reason(value_a, value_b) {
            return skip(sink, key, &rule.a, reason);
        }

        let equal = categorical_match(value_a, value_b, rule, self.config.tolerance);
        compared(sink, key, &rule.a, value_a, value_b, equal);
        if equal {
            return FieldVerdict::Equal;
        }
        FieldVerdict::Different(FieldDiscrepancy {
            key: key.clone(),
            kind: RuleKind::Categorical,
            field_a: rule.a.clone(),
            field_b: rule.b.clone(),
            value_a: value_a.clone(),
            value_b: value_b.clone(),
            difference: None,
            expected_b: Some(expected_value(value_a, rule).clone()),
            rule_description: Some(describe(rule)),
        })
    }
}

/// Drop rules that reference a column missing from its side's schema,
/// reporting every missing column once.
fn resolve_rules<'a>(
    a: &Dataset,
    b: &Dataset,
    config: &'a ReconConfig,
    sink: &mut dyn EventSink,
) -> Vec<FieldRule<'a>> {
    config
        .rules()
        .filter(|rule| {
            let mut usable = true;
            for (side, dataset) in [(Side::A, a), (Side::B, b)] {
                for field in rule.fields(side) {
                    if !dataset.has_field(field) {
                        sink.record(ReconEvent::FieldNotFound {
                            side,
                            field: field.to_string(),
                            rule: rule.kind(),
                            rule_field: rule.field_a().to_string(),
                        });
                        usable = false;
                    }
                }
            }
            usable
        })
        .collect()
}

/// Sum of the B fields with blanks counted as 0. `None` when every field is
/// blank; NaN when any non-blank field is not numeric.
fn sum_fields(record: &Record, fields: &[String]) -> Option<f64> {
    let mut total = 0.0;
    let mut any_present = false;
    for field in fields {
        let value = record.get(field);
        if value.is_blank() {
            continue;
        }
        any_present = true;
        total += coerce_number(value).unwrap_or(f64::NAN);
    }
    any_present.then_some(total)
}

fn blank_reason(value_a: &Value, value_b: &Value) -> Option<SkipReason> {
    if value_a.is_blank() {
        Some(SkipReason::BlankA)
    } else if value_b.is_blank() {
        Some(SkipReason::BlankB)
    } else {
        None
    }
}

fn skip(sink: &mut dyn EventSink, key: &RecordKey, field: &str, reason: SkipReason) -> FieldVerdict {
    sink.record(ReconEvent::FieldSkipped {
        key: key.clone(),
        field: field.to_string(),
        reason,
    });
    FieldVerdict::Skipped
}

fn compared(
    sink: &mut dyn EventSink,
    key: &RecordKey,
    field: &str,
    value_a: &Value,
    value_b: &Value,
    equal: bool,
) {
    sink.record(ReconEvent::FieldCompared {
        key: key.clone(),
        field: field.to_string(),
        value_a: value_a.clone(),
        value_b: value_b.clone(),
        different: !equal,
    });
}

// ---------------------------------------------------------------------------
// Tables
// ---------------------------------------------------------------------------

impl ComparisonTables {
    /// Fold outcomes into the four report tables, attaching passthrough
    /// fields. Duplicate and blank-key findings are left for the caller.
    pub fn collect<'a>(
        outcomes: impl IntoIterator<Item = MatchOutcome<'a>>,
        passthrough: &PassthroughConfig,
    ) -> Self {
        let mut tables = Self::default();
        for outcome in outcomes {
            match outcome {
                MatchOutcome::MissingInB { key, record } => tables.missing_in_b.push(MissingRow {
                    key,
                    passthrough: pick(&[(record, &passthrough.a)]),
                }),
                MatchOutcome::MissingInA { key, .. } => tables.missing_in_a.push(MissingRow {
                    key,
                    passthrough: Passthrough::default(),
                }),
                MatchOutcome::Mismatched { a, b, discrepancies, .. } => {
                    tables.mismatched_pairs += 1;
                    let fields = pick(&[(a, &passthrough.a), (b, &passthrough.b)]);
                    tables.mismatches.extend(discrepancies.into_iter().map(|discrepancy| {
                        MismatchRow {
                            discrepancy,
                            passthrough: fields.clone(),
                        }
                    }));
                }
                MatchOutcome::PerfectMatch { key, a, b, fields_compared } => {
                    tables.perfect_matches.push(PerfectMatchRow {
                        key,
                        fields_compared_count: fields_compared.len(),
                        fields_compared,
                        passthrough: pick(&[(a, &passthrough.a), (b, &passthrough.b)]),
                    })
                }
                MatchOutcome::Skipped { key } => tables.skipped.push(key),
            }
        }
        tables
    }
}

fn pick(sources: &[(&Record, &Vec<String>)]) -> Passthrough {
    Passthrough(
        sources
            .iter()
            .flat_map(|(record, fields)| {
                fields.iter().map(|f| (f.clone(), record.get(f).clone()))
            })
            .collect(),
    )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::KeySpec;
    use crate::events::{MemorySink, NullSink};
    use crate::model::{Difference, OutcomeBucket};

    fn dataset(label: &str, fields: &[&str], rows: &[&[Value]]) -> Dataset {
        let mut ds = Dataset::new(label, fields.iter().map(|f| f.to_string()).collect());
        for row in rows {
            ds.push(fields.iter().copied().zip(row.iter().cloned()).collect());
        }
        ds
    }

    fn v(n: f64) -> Value {
        Value::from(n)
    }

    fn direct_config(skip_zero: bool) -> ReconConfig {
        let mut config = ReconConfig::new("test", KeySpec::new("id", "PARID"));
        config.skip_zero = skip_zero;
        config.direct.push(DirectRule {
            a: "Bedrooms Total".into(),
            b: "RMBED".into(),
        });
        config
    }

    fn buckets(a: &Dataset, b: &Dataset, config: &ReconConfig) -> Vec<(String, OutcomeBucket)> {
        let mut sink = NullSink;
        let comparison = Comparison::prepare(a, b, config, &mut sink).unwrap();
        let outcomes: Vec<_> = comparison
            .outcomes(&mut sink)
            .map(|o| (o.key().to_string(), o.bucket()))
            .collect();
        outcomes
    }

    #[test]
    fn tolerance_boundary_in_records() {
        let config = direct_config(true);
        let a = dataset("MLS", &["id", "Bedrooms Total"], &[&["1".into(), v(100.0)], &["2".into(), v(100.0)]]);
        let b = dataset("CAMA", &["PARID", "RMBED"], &[&["1".into(), v(100.01)], &["2".into(), v(100.02)]]);
        let tables = compare(&a, &b, &config, &mut NullSink).unwrap();
        assert_eq!(tables.perfect_matches.len(), 1);
        assert_eq!(tables.perfect_matches[0].key.as_str(), "1");
        assert_eq!(tables.mismatches.len(), 1);
        assert_eq!(tables.mismatches[0].discrepancy.key.as_str(), "2");
    }

    #[test]
    fn skip_zero_on_and_off() {
        let a = dataset("MLS", &["id", "Bedrooms Total"], &[&["k".into(), v(0.0)]]);
        let b = dataset("CAMA", &["PARID", "RMBED"], &[&["k".into(), v(5.0)]]);

        let on = compare(&a, &b, &direct_config(true), &mut NullSink).unwrap();
        assert_eq!(on.skipped.len(), 1);
        assert!(on.mismatches.is_empty());

        let off = compare(&a, &b, &direct_config(false), &mut NullSink).unwrap();
        assert_eq!(off.mismatches.len(), 1);
        let d = &off.mismatches[0].discrepancy;
        assert_eq!(d.difference, Some(Difference::Numeric(-5.0)));
        assert_eq!(d.difference.unwrap().to_string(), "-5.00");
    }

    #[test]
    fn blank_values_are_never_compared() {
        let config = direct_config(false);
        let a = dataset("MLS", &["id", "Bedrooms Total"], &[&["k".into(), Value::Null]]);
        let b = dataset("CAMA", &["PARID", "RMBED"], &[&["k".into(), v(3.0)]]);
        let mut sink = MemorySink::new();
        let tables = compare(&a, &b, &config, &mut sink).unwrap();
        assert_eq!(tables.skipped.len(), 1);
        assert_eq!(sink.compared(), 0);
        assert!(sink.events.contains(&ReconEvent::FieldSkipped {
            key: RecordKey::new("k"),
            field: "Bedrooms Total".into(),
            reason: SkipReason::BlankA,
        }));
    }

    fn sum_config() -> ReconConfig {
        let mut config = ReconConfig::new("test", KeySpec::new("id", "PARID"));
        config.sum.push(SumRule {
            a: "Below Grade Finished Area".into(),
            b: vec!["RECROMAREA".into(), "FINBSMTAREA".into(), "UFEATAREA".into()],
        });
        config
    }

    const SUM_B: &[&str] = &["PARID", "RECROMAREA", "FINBSMTAREA", "UFEATAREA"];

    #[test]
    fn sum_treats_blank_as_zero() {
        let a = dataset("MLS", &["id", "Below Grade Finished Area"], &[&["k".into(), v(500.0)]]);
        let b = dataset("CAMA", SUM_B, &[&["k".into(), v(200.0), v(150.0), Value::Null]]);
        let tables = compare(&a, &b, &sum_config(), &mut NullSink).unwrap();
        assert_eq!(tables.mismatches.len(), 1);
        let d = &tables.mismatches[0].discrepancy;
        assert_eq!(d.kind, RuleKind::Sum);
        assert_eq!(d.field_b, "SUM(RECROMAREA, FINBSMTAREA, UFEATAREA)");
        assert_eq!(d.value_b, v(350.0));
        assert_eq!(d.difference.unwrap().to_string(), "150.00");
    }

    #[test]
    fn sum_all_blank_is_skipped() {
        let a = dataset("MLS", &["id", "Below Grade Finished Area"], &[&["k".into(), v(500.0)]]);
        let b = dataset("CAMA", SUM_B, &[&["k".into(), Value::Null, Value::Null, "  ".into()]]);
        let mut sink = MemorySink::new();
        let tables = compare(&a, &b, &sum_config(), &mut sink).unwrap();
        assert_eq!(tables.skipped.len(), 1);
        assert!(sink.events.iter().any(|e| matches!(
            e,
            ReconEvent::FieldSkipped { reason: SkipReason::AllBlank, .. }
        )));
    }

    #[test]
    fn sum_zero_counts_as_compared_without_mismatch() {
        let a = dataset("MLS", &["id", "Below Grade Finished Area"], &[&["k".into(), v(500.0)]]);
        let b = dataset("CAMA", SUM_B, &[&["k".into(), v(0.0), Value::Null, v(0.0)]]);
        let mut sink = MemorySink::new();
        let tables = compare(&a, &b, &sum_config(), &mut sink).unwrap();
        assert!(tables.mismatches.is_empty());
        assert!(tables.skipped.is_empty());
        assert_eq!(tables.perfect_matches.len(), 1);
        assert_eq!(tables.perfect_matches[0].fields_compared, vec!["Below Grade Finished Area"]);
        assert_eq!(sink.compared(), 0);
        assert!(sink.events.iter().any(|e| matches!(
            e,
            ReconEvent::FieldSkipped { reason: SkipReason::Zero, .. }
        )));
    }

    #[test]
    fn sum_zero_on_listing_side_counts_as_compared() {
        let a = dataset("MLS", &["id", "Below Grade Finished Area"], &[&["k".into(), v(0.0)]]);
        let b = dataset("CAMA", SUM_B, &[&["k".into(), v(200.0), Value::Null, Value::Null]]);
        let tables = compare(&a, &b, &sum_config(), &mut NullSink).unwrap();
        assert_eq!(tables.perfect_matches.len(), 1);

        let mut config = sum_config();
        config.skip_zero = false;
        let tables = compare(&a, &b, &config, &mut NullSink).unwrap();
        assert_eq!(tables.mismatches[0].discrepancy.difference.unwrap().to_string(), "-200.00");
    }

    #[test]
    fn sum_text_poisons_total() {
        let a = dataset("MLS", &["id", "Below Grade Finished Area"], &[&["k".into(), v(500.0)]]);
        let b = dataset("CAMA", SUM_B, &[&["k".into(), v(500.0), "none".into(), Value::Null]]);
        let tables = compare(&a, &b, &sum_config(), &mut NullSink).unwrap();
        assert_eq!(tables.mismatches.len(), 1);
        assert_eq!(tables.mismatches[0].discrepancy.difference, Some(Difference::NotANumber));
    }

    #[test]
    fn categorical_mismatch_carries_expectation() {
        let mut config = ReconConfig::new("test", KeySpec::new("id", "PARID"));
        config.categorical.push(CategoricalRule {
            a: "Cooling".into(),
            b: "HEAT".into(),
            contains: "Central Air".into(),
            if_true: v(1.0),
            if_false: v(0.0),
            case_sensitive: false,
        });
        let a = dataset(
            "MLS",
            &["id", "Cooling"],
            &[&["1".into(), "Central Air and Heat Pump".into()], &["2".into(), "Central Air".into()]],
        );
        let b = dataset("CAMA", &["PARID", "HEAT"], &[&["1".into(), v(1.0)], &["2".into(), v(0.0)]]);
        let tables = compare(&a, &b, &config, &mut NullSink).unwrap();

        assert_eq!(tables.perfect_matches.len(), 1);
        assert_eq!(tables.mismatches.len(), 1);
        let d = &tables.mismatches[0].discrepancy;
        assert_eq!(d.kind, RuleKind::Categorical);
        assert_eq!(d.expected_b, Some(v(1.0)));
        assert_eq!(d.difference, None);
        assert_eq!(
            d.rule_description.as_deref(),
            Some("If 'Central Air' in Cooling, then HEAT should be 1, else 0")
        );
    }

    #[test]
    fn categorical_zero_is_compared() {
        let mut config = ReconConfig::new("test", KeySpec::new("id", "PARID"));
        config.categorical.push(CategoricalRule {
            a: "Cooling".into(),
            b: "HEAT".into(),
            contains: "Central Air".into(),
            if_true: v(1.0),
            if_false: v(0.0),
            case_sensitive: false,
        });
        let a = dataset("MLS", &["id", "Cooling"], &[&["1".into(), "None".into()]]);
        let b = dataset("CAMA", &["PARID", "HEAT"], &[&["1".into(), v(0.0)]]);
        let tables = compare(&a, &b, &config, &mut NullSink).unwrap();
        assert_eq!(tables.perfect_matches.len(), 1);
        assert_eq!(tables.perfect_matches[0].fields_compared, vec!["Cooling"]);
    }

    #[test]
    fn every_key_lands_in_one_bucket() {
        let config = direct_config(true);
        let a = dataset(
            "MLS",
            &["id", "Bedrooms Total"],
            &[&["1".into(), v(3.0)], &["2".into(), v(4.0)], &["3".into(), v(0.0)], &["4".into(), v(2.0)]],
        );
        let b = dataset(
            "CAMA",
            &["PARID", "RMBED"],
            &[&["1".into(), v(3.0)], &["2".into(), v(5.0)], &["3".into(), v(2.0)], &["5".into(), v(1.0)]],
        );
        assert_eq!(
            buckets(&a, &b, &config),
            vec![
                ("1".to_string(), OutcomeBucket::PerfectMatch),
                ("2".to_string(), OutcomeBucket::Mismatched),
                ("3".to_string(), OutcomeBucket::Skipped),
                ("4".to_string(), OutcomeBucket::MissingInB),
                ("5".to_string(), OutcomeBucket::MissingInA),
            ]
        );
    }

    #[test]
    fn outcomes_restart_from_the_beginning() {
        let config = direct_config(true);
        let a = dataset("MLS", &["id", "Bedrooms Total"], &[&["1".into(), v(3.0)], &["2".into(), v(4.0)]]);
        let b = dataset("CAMA", &["PARID", "RMBED"], &[&["1".into(), v(3.0)]]);
        let mut sink = NullSink;
        let comparison = Comparison::prepare(&a, &b, &config, &mut sink).unwrap();
        let first: Vec<_> = comparison.outcomes(&mut sink).map(|o| o.bucket()).collect();
        let second: Vec<_> = comparison.outcomes(&mut sink).map(|o| o.bucket()).collect();
        assert_eq!(first, second);
        assert_eq!(comparison.outcomes(&mut sink).take(1).count(), 1);
    }

    #[test]
    fn missing_rule_field_skips_rule_for_every_record() {
        let mut config = direct_config(true);
        config.direct.push(DirectRule {
            a: "Full Baths".into(),
            b: "FIXBATH".into(),
        });
        let a = dataset("MLS", &["id", "Bedrooms Total", "Full Baths"], &[&["1".into(), v(3.0), v(2.0)]]);
        let b = dataset("CAMA", &["PARID", "RMBED"], &[&["1".into(), v(3.0)]]);
        let mut sink = MemorySink::new();
        let tables = compare(&a, &b, &config, &mut sink).unwrap();

        assert_eq!(tables.perfect_matches[0].fields_compared, vec!["Bedrooms Total"]);
        let not_found: Vec<_> = sink
            .events
            .iter()
            .filter(|e| matches!(e, ReconEvent::FieldNotFound { .. }))
            .collect();
        assert_eq!(
            not_found,
            vec![&ReconEvent::FieldNotFound {
                side: Side::B,
                field: "FIXBATH".into(),
                rule: RuleKind::Direct,
                rule_field: "Full Baths".into(),
            }]
        );
    }

    #[test]
    fn empty_rule_set_is_config_error() {
        let config = ReconConfig::new("test", KeySpec::new("id", "PARID"));
        let a = dataset("MLS", &["id"], &[]);
        let b = dataset("CAMA", &["PARID"], &[]);
        let err = compare(&a, &b, &config, &mut NullSink).unwrap_err();
        assert!(err.is_config_error());
    }

    #[test]
    fn missing_key_column_is_config_error() {
        let config = direct_config(true);
        let a = dataset("MLS", &["Parcel", "Bedrooms Total"], &[]);
        let b = dataset("CAMA", &["PARID", "RMBED"], &[]);
        let err = compare(&a, &b, &config, &mut NullSink).unwrap_err();
        assert!(matches!(err, ReconError::MissingKeyColumn { side: Side::A, .. }));
    }

    #[test]
    fn duplicates_are_reported_and_paired() {
        let config = direct_config(true);
        let a = dataset("MLS", &["id", "Bedrooms Total"], &[&["1".into(), v(3.0)], &["1".into(), v(4.0)]]);
        let b = dataset("CAMA", &["PARID", "RMBED"], &[&["1".into(), v(3.0)]]);
        let mut sink = MemorySink::new();
        let tables = compare(&a, &b, &config, &mut sink).unwrap();

        assert_eq!(tables.duplicates.len(), 1);
        assert_eq!(tables.duplicates[0].side, Side::A);
        assert_eq!(tables.duplicates[0].count, 2);
        assert_eq!(tables.perfect_matches.len(), 1);
        assert_eq!(tables.mismatches.len(), 1);
        assert!(matches!(sink.events[0], ReconEvent::DuplicateKey { count: 2, .. }));
    }

    #[test]
    fn same_named_fields_stay_per_side() {
        let mut config = ReconConfig::new("test", KeySpec::new("id", "id"));
        config.direct.push(DirectRule {
            a: "Area".into(),
            b: "Area".into(),
        });
        let a = dataset("A", &["id", "Area"], &[&["1".into(), v(1000.0)]]);
        let b = dataset("B", &["id", "Area"], &[&["1".into(), v(1200.0)]]);
        let tables = compare(&a, &b, &config, &mut NullSink).unwrap();
        let d = &tables.mismatches[0].discrepancy;
        assert_eq!((d.value_a.clone(), d.value_b.clone()), (v(1000.0), v(1200.0)));
    }

    #[test]
    fn passthrough_fields_follow_rows() {
        let mut config = direct_config(true);
        config.passthrough = PassthroughConfig {
            a: vec!["Listing #".into()],
            b: vec!["SALEKEY".into()],
        };
        let a = dataset(
            "MLS",
            &["id", "Bedrooms Total", "Listing #"],
            &[&["1".into(), v(3.0), "L-1".into()], &["2".into(), v(2.0), "L-2".into()]],
        );
        let b = dataset(
            "CAMA",
            &["PARID", "RMBED", "SALEKEY"],
            &[&["1".into(), v(4.0), v(77.0)], &["3".into(), v(4.0), v(78.0)]],
        );
        let tables = compare(&a, &b, &config, &mut NullSink).unwrap();

        let row = &tables.mismatches[0];
        assert_eq!(row.passthrough.get("Listing #"), Some(&Value::from("L-1")));
        assert_eq!(row.passthrough.get("SALEKEY"), Some(&v(77.0)));
        assert_eq!(tables.missing_in_b[0].passthrough.get("Listing #"), Some(&Value::from("L-2")));
        assert!(tables.missing_in_a[0].passthrough.is_empty());
    }

    #[test]
    fn comparing_twice_gives_identical_tables() {
        let config = direct_config(true);
        let a = dataset("MLS", &["id", "Bedrooms Total"], &[&["1".into(), v(3.0)], &["2".into(), v(4.0)]]);
        let b = dataset("CAMA", &["PARID", "RMBED"], &[&["2".into(), v(5.0)], &["9".into(), v(1.0)]]);
        let first = compare(&a, &b, &config, &mut NullSink).unwrap();
        let second = compare(&a, &b, &config, &mut NullSink).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn run_fills_meta_and_summary() {
        let config = direct_config(true);
        let input = ReconInput {
            a: dataset("MLS", &["id", "Bedrooms Total"], &[&["1".into(), v(3.0)], &["".into(), v(1.0)]]),
            b: dataset("CAMA", &["PARID", "RMBED"], &[&["1".into(), v(4.0)]]),
        };
        let result = run(&config, &input, &mut NullSink).unwrap();
        assert_eq!(result.meta.source_a, "MLS");
        assert_eq!(result.meta.engine_version, env!("CARGO_PKG_VERSION"));
        assert_eq!(result.summary.records_a, 2);
        assert_eq!(result.summary.blank_keys_a, 1);
        assert_eq!(result.summary.mismatch_rows, 1);
        assert!(!result.summary.is_clean());
    }
}
