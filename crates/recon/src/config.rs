use serde::Deserialize;

use crate::compare::DEFAULT_TOLERANCE;
use crate::error::ReconError;
use crate::model::{RuleKind, Side, Value};

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Immutable run configuration. Built once, passed by reference into the
/// engine; nothing is read from ambient state.
#[derive(Debug, Clone, Deserialize)]
pub struct ReconConfig {
    pub name: String,
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
    /// Treat an exact 0 on either side as "no data".
    #[serde(default = "default_skip_zero")]
    pub skip_zero: bool,
    pub key: KeySpec,
    #[serde(default)]
    pub sources: SourcesConfig,
    #[serde(default)]
    pub direct: Vec<DirectRule>,
    #[serde(default)]
    pub sum: Vec<SumRule>,
    #[serde(default)]
    pub categorical: Vec<CategoricalRule>,
    #[serde(default)]
    pub passthrough: PassthroughConfig,
    #[serde(default)]
    pub report: ReportConfig,
}

fn default_tolerance() -> f64 {
    DEFAULT_TOLERANCE
}

fn default_skip_zero() -> bool {
    true
}

// ---------------------------------------------------------------------------
// Key + sources
// ---------------------------------------------------------------------------

/// Key column name on each side.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct KeySpec {
    pub a: String,
    pub b: String,
}

impl KeySpec {
    pub fn new(a: impl Into<String>, b: impl Into<String>) -> Self {
        Self { a: a.into(), b: b.into() }
    }

    pub fn field(&self, side: Side) -> &str {
        match side {
            Side::A => &self.a,
            Side::B => &self.b,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourcesConfig {
    #[serde(default = "SourceConfig::default_a")]
    pub a: SourceConfig,
    #[serde(default = "SourceConfig::default_b")]
    pub b: SourceConfig,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            a: SourceConfig::default_a(),
            b: SourceConfig::default_b(),
        }
    }
}

impl SourcesConfig {
    pub fn get(&self, side: Side) -> &SourceConfig {
        match side {
            Side::A => &self.a,
            Side::B => &self.b,
        }
    }
}

/// Where a dataset comes from. `file` is resolved by the caller relative to
/// the config file.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    pub label: String,
    #[serde(default)]
    pub file: Option<String>,
    /// Worksheet name for spreadsheet inputs (first sheet when absent).
    #[serde(default)]
    pub sheet: Option<String>,
}

impl SourceConfig {
    fn default_a() -> Self {
        Self { label: "A".into(), file: None, sheet: None }
    }

    fn default_b() -> Self {
        Self { label: "B".into(), file: None, sheet: None }
    }
}

// ---------------------------------------------------------------------------
// Rules
// ---------------------------------------------------------------------------

/// Compare one A field against one B field.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DirectRule {
    pub a: String,
    pub b: String,
}

/// Compare one A field against the sum of several B fields.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SumRule {
    pub a: String,
    pub b: Vec<String>,
}

impl SumRule {
    /// Report label for the B side, e.g. `SUM(RECROMAREA, FINBSMTAREA)`.
    pub fn b_label(&self) -> String {
        format!("SUM({})", self.b.join(", "))
    }
}

/// Derive the expected B value from whether the A text contains a marker.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CategoricalRule {
    pub a: String,
    pub b: String,
    #[serde(default)]
    pub contains: String,
    pub if_true: Value,
    pub if_false: Value,
    #[serde(default)]
    pub case_sensitive: bool,
}

/// Borrowed view over any configured rule, in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldRule<'a> {
    Direct(&'a DirectRule),
    Sum(&'a SumRule),
    Categorical(&'a CategoricalRule),
}

impl<'a> FieldRule<'a> {
    pub fn kind(&self) -> RuleKind {
        match self {
            Self::Direct(_) => RuleKind::Direct,
            Self::Sum(_) => RuleKind::Sum,
            Self::Categorical(_) => RuleKind::Categorical,
        }
    }

    pub fn field_a(&self) -> &'a str {
        match *self {
            Self::Direct(r) => &r.a,
            Self::Sum(r) => &r.a,
            Self::Categorical(r) => &r.a,
        }
    }

    pub fn field_b_label(&self) -> String {
        match self {
            Self::Direct(r) => r.b.clone(),
            Self::Sum(r) => r.b_label(),
            Self::Categorical(r) => r.b.clone(),
        }
    }

    /// Every field the rule reads from one side.
    pub fn fields(&self, side: Side) -> Vec<&'a str> {
        match (*self, side) {
            (_, Side::A) => vec![self.field_a()],
            (Self::Direct(r), Side::B) => vec![r.b.as_str()],
            (Self::Sum(r), Side::B) => r.b.iter().map(String::as_str).collect(),
            (Self::Categorical(r), Side::B) => vec![r.b.as_str()],
        }
    }
}

// ---------------------------------------------------------------------------
// Passthrough + report
// ---------------------------------------------------------------------------

/// Identifying fields copied into report rows.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PassthroughConfig {
    #[serde(default)]
    pub a: Vec<String>,
    #[serde(default)]
    pub b: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReportConfig {
    #[serde(default = "default_prefix")]
    pub prefix: String,
    #[serde(default = "default_key_header")]
    pub key_header: String,
    /// Link template for key cells; `{key}` is replaced by the key.
    #[serde(default)]
    pub key_url: Option<String>,
    #[serde(default)]
    pub address: Option<AddressColumns>,
    #[serde(default = "default_address_url_base")]
    pub address_url_base: String,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            prefix: default_prefix(),
            key_header: default_key_header(),
            key_url: None,
            address: None,
            address_url_base: default_address_url_base(),
        }
    }
}

fn default_prefix() -> String {
    "discrepancies".into()
}

fn default_key_header() -> String {
    "Key".into()
}

fn default_address_url_base() -> String {
    "https://www.zillow.com/homes/".into()
}

/// A-side columns holding the property address.
#[derive(Debug, Clone, Deserialize)]
pub struct AddressColumns {
    pub street: String,
    pub city: String,
    #[serde(default)]
    pub state: Option<String>,
    pub zip: String,
}

// ---------------------------------------------------------------------------
// Construction, Parse + Validate
// ---------------------------------------------------------------------------

impl ReconConfig {
    /// Config with defaults and no rules; add rules before running.
    pub fn new(name: impl Into<String>, key: KeySpec) -> Self {
        Self {
            name: name.into(),
            tolerance: DEFAULT_TOLERANCE,
            skip_zero: true,
            key,
            sources: SourcesConfig::default(),
            direct: Vec::new(),
            sum: Vec::new(),
            categorical: Vec::new(),
            passthrough: PassthroughConfig::default(),
            report: ReportConfig::default(),
        }
    }

    pub fn from_toml(input: &str) -> Result<Self, ReconError> {
        let config: ReconConfig =
            toml::from_str(input).map_err(|e| ReconError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// All rules in evaluation order: direct, then sum, then categorical,
    /// each in declared order.
    pub fn rules(&self) -> impl Iterator<Item = FieldRule<'_>> {
        self.direct
            .iter()
            .map(FieldRule::Direct)
            .chain(self.sum.iter().map(FieldRule::Sum))
            .chain(self.categorical.iter().map(FieldRule::Categorical))
    }

    pub fn rule_count(&self) -> usize {
        self.direct.len() + self.sum.len() + self.categorical.len()
    }

    pub fn validate(&self) -> Result<(), ReconError> {
        if self.key.a.trim().is_empty() || self.key.b.trim().is_empty() {
            return Err(ReconError::ConfigValidation(
                "key column names must not be empty".into(),
            ));
        }

        if self.rule_count() == 0 {
            return Err(ReconError::ConfigValidation(
                "at least one direct, sum or categorical rule is required".into(),
            ));
        }

        if !self.tolerance.is_finite() || self.tolerance < 0.0 {
            return Err(ReconError::ConfigValidation(format!(
                "tolerance must be a non-negative number, got {}",
                self.tolerance
            )));
        }

        let (label_a, label_b) = (self.sources.a.label.trim(), self.sources.b.label.trim());
        if label_a.is_empty() || label_b.is_empty() {
            return Err(ReconError::ConfigValidation("source labels must not be empty".into()));
        }
        if label_a == label_b {
            return Err(ReconError::ConfigValidation(format!(
                "source labels must differ, both are '{label_a}'"
            )));
        }

        for (i, rule) in self.rules().enumerate() {
            if let FieldRule::Sum(sum) = rule {
                if sum.b.is_empty() {
                    return Err(ReconError::ConfigValidation(format!(
                        "sum rule for '{}' lists no B fields",
                        sum.a
                    )));
                }
            }
            for side in [Side::A, Side::B] {
                if rule.fields(side).iter().any(|f| f.trim().is_empty()) {
                    return Err(ReconError::ConfigValidation(format!(
                        "rule #{} ({}) has an empty {side} field name",
                        i + 1,
                        rule.kind()
                    )));
                }
            }
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
