use std::collections::{HashMap, HashSet};

use crate::model::{ComparisonTables, Dataset, FieldCount, ReconSummary, Side};

/// Compute summary statistics from the report tables.
pub fn compute_summary(a: &Dataset, b: &Dataset, tables: &ComparisonTables) -> ReconSummary {
    let mismatched_records = tables
        .mismatches
        .iter()
        .map(|row| &row.discrepancy.key)
        .collect::<HashSet<_>>()
        .len();

    let mut by_field: HashMap<&str, usize> = HashMap::new();
    for row in &tables.mismatches {
        *by_field.entry(row.discrepancy.field_a.as_str()).or_insert(0) += 1;
    }
    let mut mismatches_by_field: Vec<FieldCount> = by_field
        .into_iter()
        .map(|(field, count)| FieldCount {
            field: field.to_string(),
            count,
        })
        .collect();
    mismatches_by_field.sort_by(|x, y| y.count.cmp(&x.count).then_with(|| x.field.cmp(&y.field)));

    let duplicates_on = |side: Side| tables.duplicates.iter().filter(|d| d.side == side).count();

    ReconSummary {
        records_a: a.len(),
        records_b: b.len(),
        duplicate_keys_a: duplicates_on(Side::A),
        duplicate_keys_b: duplicates_on(Side::B),
        blank_keys_a: tables.blank_keys_a,
        blank_keys_b: tables.blank_keys_b,
        matched_pairs: tables.mismatched_pairs + tables.perfect_matches.len() + tables.skipped.len(),
        missing_in_b: tables.missing_in_b.len(),
        missing_in_a: tables.missing_in_a.len(),
        mismatched_records,
        mismatch_rows: tables.mismatches.len(),
        perfect_matches: tables.perfect_matches.len(),
        skipped: tables.skipped.len(),
        mismatches_by_field,
    }
}
