use std::collections::HashMap;
use std::fmt;
use std::io;

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

use crate::error::ReconError;

// ---------------------------------------------------------------------------
// Scalar values
// ---------------------------------------------------------------------------

/// A single cell value. The variant is fixed when the dataset is loaded;
/// numeric coercion of text happens at comparison time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Number(f64),
    Text(String),
    Null,
}

static NULL: Value = Value::Null;

impl Value {
    /// Null, NaN, or text that is empty after trimming.
    pub fn is_blank(&self) -> bool {
        match self {
            Self::Null => true,
            Self::Text(s) => s.trim().is_empty(),
            Self::Number(n) => n.is_nan(),
        }
    }

    /// Build a value from a raw text cell: empty cells become `Null`.
    pub fn from_cell(raw: &str) -> Self {
        if raw.is_empty() {
            Self::Null
        } else {
            Self::Text(raw.to_string())
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => {
                // Integers without decimals
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    write!(f, "{}", *n as i64)
                } else {
                    write!(f, "{n}")
                }
            }
            Self::Text(s) => f.write_str(s),
            Self::Null => Ok(()),
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Self::Number(n as f64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

// ---------------------------------------------------------------------------
// Sides + keys
// ---------------------------------------------------------------------------

/// Which dataset a record or field belongs to. A is the listing side, B the
/// assessment side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    A,
    B,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::A => "A",
            Side::B => "B",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalized join key. Integral numbers render without a fractional part so
/// a spreadsheet `1234.0` joins a text `"1234"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct RecordKey(String);

impl RecordKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// `None` for blank values and NaN: such records have no key.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::Text(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    None
                } else {
                    Some(Self(trimmed.to_string()))
                }
            }
            Value::Number(n) if n.is_nan() => None,
            Value::Number(_) => Some(Self(value.to_string())),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// One row: field name → value. Absent fields read as `Null`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    values: HashMap<String, Value>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(field.into(), value.into());
    }

    pub fn get(&self, field: &str) -> &Value {
        self.values.get(field).unwrap_or(&NULL)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.values.contains_key(field)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let values = iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect();
        Self { values }
    }
}

/// Ordered records from one source, with the source's column names.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub label: String,
    pub fields: Vec<String>,
    pub records: Vec<Record>,
}

impl Dataset {
    pub fn new(label: impl Into<String>, fields: Vec<String>) -> Self {
        Self {
            label: label.into(),
            fields,
            records: Vec::new(),
        }
    }

    pub fn push(&mut self, record: Record) {
        self.records.push(record);
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.fields.iter().any(|f| f == field)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Read a headed CSV. Every non-empty cell is `Text`, empty cells are
    /// `Null`; short rows leave the trailing fields absent.
    pub fn from_csv_reader<R: io::Read>(label: &str, reader: R) -> Result<Self, ReconError> {
        let load_err = |e: csv::Error| ReconError::Load {
            source: label.to_string(),
            message: e.to_string(),
        };

        let mut rdr = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
        let headers = rdr.headers().map_err(load_err)?;
        let fields = dedupe_headers(headers.iter());

        let mut dataset = Dataset::new(label, fields);
        for row in rdr.records() {
            let row = row.map_err(load_err)?;
            let record = dataset
                .fields
                .iter()
                .zip(row.iter())
                .map(|(field, cell)| (field.clone(), Value::from_cell(cell)))
                .collect();
            dataset.push(record);
        }
        Ok(dataset)
    }

    pub fn from_csv_str(label: &str, data: &str) -> Result<Self, ReconError> {
        Self::from_csv_reader(label, data.as_bytes())
    }
}

/// Make header names unique: repeats get `.1`, `.2`, ... suffixes and empty
/// names become `Unnamed: <index>`.
pub fn dedupe_headers<'h>(headers: impl IntoIterator<Item = &'h str>) -> Vec<String> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut out: Vec<String> = Vec::new();
    for (i, raw) in headers.into_iter().enumerate() {
        let base = if raw.trim().is_empty() {
            format!("Unnamed: {i}")
        } else {
            raw.to_string()
        };
        let mut name = base.clone();
        while out.contains(&name) {
            let n = seen.entry(base.clone()).or_insert(0);
            *n += 1;
            name = format!("{base}.{n}");
        }
        out.push(name);
    }
    out
}

/// Both pre-loaded datasets.
pub struct ReconInput {
    pub a: Dataset,
    pub b: Dataset,
}

// ---------------------------------------------------------------------------
// Discrepancies
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleKind {
    Direct,
    Sum,
    Categorical,
}

impl fmt::Display for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Direct => write!(f, "direct"),
            Self::Sum => write!(f, "sum"),
            Self::Categorical => write!(f, "categorical"),
        }
    }
}

/// `a - b` for two numeric sides, or the reason no delta exists.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Difference {
    Numeric(f64),
    /// One side coerced to NaN.
    NotANumber,
    /// One side is not a number at all.
    NonNumeric,
}

impl fmt::Display for Difference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Numeric(d) => f.write_str(&format_amount(*d)),
            Self::NotANumber => f.write_str("N/A"),
            Self::NonNumeric => f.write_str("Text difference"),
        }
    }
}

impl Serialize for Difference {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Two decimals with thousands separators: `-1234.5` → `-1,234.50`.
/// Non-finite values render as `N/A`.
pub fn format_amount(value: f64) -> String {
    if !value.is_finite() {
        return "N/A".to_string();
    }
    let fixed = format!("{:.2}", value.abs());
    let (int_part, frac_part) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, c) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }

    let sign = if value < 0.0 { "-" } else { "" };
    format!("{sign}{grouped}.{frac_part}")
}

/// One failing field of one matched record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldDiscrepancy {
    pub key: RecordKey,
    pub kind: RuleKind,
    pub field_a: String,
    /// B field name; `SUM(f1, f2, ...)` for sum rules.
    pub field_b: String,
    pub value_a: Value,
    /// Raw B value; the computed sum for sum rules.
    pub value_b: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub difference: Option<Difference>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_b: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rule_description: Option<String>,
}

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeBucket {
    MissingInB,
    MissingInA,
    Mismatched,
    PerfectMatch,
    Skipped,
}

impl fmt::Display for OutcomeBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingInB => write!(f, "missing_in_b"),
            Self::MissingInA => write!(f, "missing_in_a"),
            Self::Mismatched => write!(f, "mismatched"),
            Self::PerfectMatch => write!(f, "perfect_match"),
            Self::Skipped => write!(f, "skipped"),
        }
    }
}

/// Classification of one merge entry.
#[derive(Debug, Clone)]
pub enum MatchOutcome<'a> {
    MissingInB {
        key: RecordKey,
        record: &'a Record,
    },
    MissingInA {
        key: RecordKey,
        record: &'a Record,
    },
    Mismatched {
        key: RecordKey,
        a: &'a Record,
        b: &'a Record,
        fields_compared: Vec<String>,
        discrepancies: Vec<FieldDiscrepancy>,
    },
    PerfectMatch {
        key: RecordKey,
        a: &'a Record,
        b: &'a Record,
        fields_compared: Vec<String>,
    },
    /// Matched, but every rule was skipped for this pair.
    Skipped {
        key: RecordKey,
    },
}

impl MatchOutcome<'_> {
    pub fn key(&self) -> &RecordKey {
        match self {
            Self::MissingInB { key, .. }
            | Self::MissingInA { key, .. }
            | Self::Mismatched { key, .. }
            | Self::PerfectMatch { key, .. }
            | Self::Skipped { key } => key,
        }
    }

    pub fn bucket(&self) -> OutcomeBucket {
        match self {
            Self::MissingInB { .. } => OutcomeBucket::MissingInB,
            Self::MissingInA { .. } => OutcomeBucket::MissingInA,
            Self::Mismatched { .. } => OutcomeBucket::Mismatched,
            Self::PerfectMatch { .. } => OutcomeBucket::PerfectMatch,
            Self::Skipped { .. } => OutcomeBucket::Skipped,
        }
    }
}

// ---------------------------------------------------------------------------
// Output tables
// ---------------------------------------------------------------------------

/// Identifying fields copied from the source records, in configured order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Passthrough(pub Vec<(String, Value)>);

impl Passthrough {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.iter().find(|(name, _)| name == field).map(|(_, v)| v)
    }
}

impl Serialize for Passthrough {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, value) in &self.0 {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DuplicateKey {
    pub side: Side,
    pub source: String,
    pub key: RecordKey,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MissingRow {
    pub key: RecordKey,
    #[serde(skip_serializing_if = "Passthrough::is_empty")]
    pub passthrough: Passthrough,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MismatchRow {
    #[serde(flatten)]
    pub discrepancy: FieldDiscrepancy,
    #[serde(skip_serializing_if = "Passthrough::is_empty")]
    pub passthrough: Passthrough,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerfectMatchRow {
    pub key: RecordKey,
    pub fields_compared_count: usize,
    pub fields_compared: Vec<String>,
    #[serde(skip_serializing_if = "Passthrough::is_empty")]
    pub passthrough: Passthrough,
}

/// The four report tables plus the pre-merge findings.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ComparisonTables {
    pub duplicates: Vec<DuplicateKey>,
    pub blank_keys_a: usize,
    pub blank_keys_b: usize,
    pub missing_in_b: Vec<MissingRow>,
    pub missing_in_a: Vec<MissingRow>,
    pub mismatches: Vec<MismatchRow>,
    /// Matched A×B pairs with at least one discrepancy.
    pub mismatched_pairs: usize,
    pub perfect_matches: Vec<PerfectMatchRow>,
    pub skipped: Vec<RecordKey>,
}

// ---------------------------------------------------------------------------
// Summary + Output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldCount {
    pub field: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReconSummary {
    pub records_a: usize,
    pub records_b: usize,
    pub duplicate_keys_a: usize,
    pub duplicate_keys_b: usize,
    pub blank_keys_a: usize,
    pub blank_keys_b: usize,
    pub matched_pairs: usize,
    pub missing_in_b: usize,
    pub missing_in_a: usize,
    pub mismatched_records: usize,
    pub mismatch_rows: usize,
    pub perfect_matches: usize,
    pub skipped: usize,
    pub mismatches_by_field: Vec<FieldCount>,
}

impl ReconSummary {
    /// True when nothing is missing on either side and no field disagrees.
    pub fn is_clean(&self) -> bool {
        self.missing_in_a == 0 && self.missing_in_b == 0 && self.mismatch_rows == 0
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReconMeta {
    pub config_name: String,
    pub source_a: String,
    pub source_b: String,
    pub tolerance: f64,
    pub skip_zero: bool,
    pub engine_version: String,
    pub run_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReconResult {
    pub meta: ReconMeta,
    pub summary: ReconSummary,
    pub tables: ComparisonTables,
}
