use std::collections::{HashMap, HashSet};

use crate::config::KeySpec;
use crate::error::ReconError;
use crate::model::{Dataset, DuplicateKey, Record, RecordKey, Side};

/// A pair of records sharing a key. Each side keeps its own record, so
/// same-named non-key fields never shadow each other.
#[derive(Debug, Clone, Copy)]
pub struct MatchedPair<'a> {
    pub key: &'a RecordKey,
    pub a: &'a Record,
    pub b: &'a Record,
}

#[derive(Debug, Clone)]
pub enum MergeEntry<'a> {
    LeftOnly { key: RecordKey, record: &'a Record },
    RightOnly { key: RecordKey, record: &'a Record },
    Both { key: RecordKey, a: &'a Record, b: &'a Record },
}

/// Outer join of two datasets, in merge order: A rows in input order (one
/// `Both` per B row sharing the key), then B rows whose key never occurs in A.
#[derive(Debug, Default)]
pub struct MergeOutput<'a> {
    pub entries: Vec<MergeEntry<'a>>,
    /// (side, row index) of records whose key is blank.
    pub blank_keys: Vec<(Side, usize)>,
}

impl<'a> MergeOutput<'a> {
    pub fn left_only(&self) -> impl Iterator<Item = (&RecordKey, &'a Record)> + '_ {
        self.entries.iter().filter_map(|e| match e {
            MergeEntry::LeftOnly { key, record } => Some((key, *record)),
            _ => None,
        })
    }

    pub fn right_only(&self) -> impl Iterator<Item = (&RecordKey, &'a Record)> + '_ {
        self.entries.iter().filter_map(|e| match e {
            MergeEntry::RightOnly { key, record } => Some((key, *record)),
            _ => None,
        })
    }

    pub fn matched(&self) -> impl Iterator<Item = MatchedPair<'_>> + '_ {
        self.entries.iter().filter_map(|e| match e {
            MergeEntry::Both { key, a, b } => Some(MatchedPair { key, a: *a, b: *b }),
            _ => None,
        })
    }

    pub fn blank_key_count(&self, side: Side) -> usize {
        self.blank_keys.iter().filter(|(s, _)| *s == side).count()
    }
}

/// Fails when either key column is missing from its dataset's schema.
pub fn check_key_columns(a: &Dataset, b: &Dataset, key: &KeySpec) -> Result<(), ReconError> {
    for (side, dataset) in [(Side::A, a), (Side::B, b)] {
        let column = key.field(side);
        if !dataset.has_field(column) {
            return Err(ReconError::MissingKeyColumn {
                side,
                source: dataset.label.clone(),
                column: column.to_string(),
            });
        }
    }
    Ok(())
}

/// Keys occurring more than once, ordered by first occurrence.
pub fn find_duplicates(dataset: &Dataset, key_field: &str, side: Side) -> Vec<DuplicateKey> {
    let mut order: Vec<RecordKey> = Vec::new();
    let mut counts: HashMap<RecordKey, usize> = HashMap::new();
    for record in &dataset.records {
        let Some(key) = RecordKey::from_value(record.get(key_field)) else {
            continue;
        };
        let count = counts.entry(key.clone()).or_insert(0);
        if *count == 0 {
            order.push(key);
        }
        *count += 1;
    }

    order
        .into_iter()
        .filter_map(|key| {
            let count = counts[&key];
            (count > 1).then(|| DuplicateKey {
                side,
                source: dataset.label.clone(),
                key,
                count,
            })
        })
        .collect()
}

/// Join A and B on the key columns. Duplicate keys pair every combination.
pub fn merge<'a>(
    a: &'a Dataset,
    b: &'a Dataset,
    key: &KeySpec,
) -> Result<MergeOutput<'a>, ReconError> {
    check_key_columns(a, b, key)?;

    let mut out = MergeOutput::default();

    let mut b_index: HashMap<RecordKey, Vec<&'a Record>> = HashMap::new();
    for (row, record) in b.records.iter().enumerate() {
        match RecordKey::from_value(record.get(&key.b)) {
            Some(k) => b_index.entry(k).or_default().push(record),
            None => out.blank_keys.push((Side::B, row)),
        }
    }

    let mut a_keys: HashSet<RecordKey> = HashSet::new();
    for (row, record) in a.records.iter().enumerate() {
        let Some(k) = RecordKey::from_value(record.get(&key.a)) else {
            out.blank_keys.push((Side::A, row));
            continue;
        };
        match b_index.get(&k) {
            Some(partners) => {
                for &partner in partners {
                    out.entries.push(MergeEntry::Both {
                        key: k.clone(),
                        a: record,
                        b: partner,
                    });
                }
            }
            None => out.entries.push(MergeEntry::LeftOnly {
                key: k.clone(),
                record,
            }),
        }
        a_keys.insert(k);
    }

    for record in &b.records {
        if let Some(k) = RecordKey::from_value(record.get(&key.b)) {
            if !a_keys.contains(&k) {
                out.entries.push(MergeEntry::RightOnly { key: k, record });
            }
        }
    }

    Ok(out)
}
