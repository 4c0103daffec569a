//! Debug side channel for a reconciliation run.
//!
//! The engine never prints. Everything a verbose run would want to show goes
//! through an [`EventSink`]; tests collect events with [`MemorySink`], the CLI
//! forwards them to the `log` facade with [`LogSink`].

use serde::Serialize;

use crate::model::{RecordKey, RuleKind, Side, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    BlankA,
    BlankB,
    /// Every B field of a sum rule was blank.
    AllBlank,
    Zero,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankA => write!(f, "A value blank"),
            Self::BlankB => write!(f, "B value blank"),
            Self::AllBlank => write!(f, "all B values blank"),
            Self::Zero => write!(f, "zero value"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ReconEvent {
    /// A key occurs more than once within one dataset.
    DuplicateKey {
        side: Side,
        key: RecordKey,
        count: usize,
    },
    /// A record has a blank key and cannot take part in the join.
    BlankKey { side: Side, row: usize },
    /// A rule references a column the dataset does not have; the rule is
    /// skipped for every record.
    FieldNotFound {
        side: Side,
        field: String,
        rule: RuleKind,
        rule_field: String,
    },
    FieldSkipped {
        key: RecordKey,
        field: String,
        reason: SkipReason,
    },
    FieldCompared {
        key: RecordKey,
        field: String,
        value_a: Value,
        value_b: Value,
        different: bool,
    },
}

pub trait EventSink {
    fn record(&mut self, event: ReconEvent);
}

/// Discards everything.
#[derive(Debug, Default)]
pub struct NullSink;

impl EventSink for NullSink {
    fn record(&mut self, _event: ReconEvent) {}
}

/// Keeps every event in order.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub events: Vec<ReconEvent>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn compared(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, ReconEvent::FieldCompared { .. }))
            .count()
    }
}

impl EventSink for MemorySink {
    fn record(&mut self, event: ReconEvent) {
        self.events.push(event);
    }
}

/// Forwards events to the `log` facade: data-quality findings at warn,
/// per-field decisions at debug/trace.
#[derive(Debug, Default)]
pub struct LogSink;

impl EventSink for LogSink {
    fn record(&mut self, event: ReconEvent) {
        match event {
            ReconEvent::DuplicateKey { side, key, count } => {
                log::warn!("source {side}: key {key:?} appears {count} times");
            }
            ReconEvent::BlankKey { side, row } => {
                log::warn!("source {side}: record {row} has a blank key, excluded from matching");
            }
            ReconEvent::FieldNotFound { side, field, rule, rule_field } => {
                log::warn!(
                    "source {side}: column '{field}' not found, skipping {rule} rule for '{rule_field}'"
                );
            }
            ReconEvent::FieldSkipped { key, field, reason } => {
                log::trace!("{key}: {field} skipped ({reason})");
            }
            ReconEvent::FieldCompared { key, field, value_a, value_b, different } => {
                log::debug!(
                    "{key}: {field} A={value_a:?} B={value_b:?} {}",
                    if different { "DIFFERENT" } else { "same" }
                );
            }
        }
    }
}
