//! `parcelrec-recon`: keyed two-source property record reconciliation.
//!
//! Pure engine crate: receives pre-loaded datasets, returns report tables.
//! No CLI or file-format dependencies beyond an in-memory CSV reader.

pub mod categorical;
pub mod compare;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod evidence;
pub mod merger;
pub mod model;

pub use config::ReconConfig;
pub use engine::{compare, run, Comparison};
pub use error::ReconError;
pub use events::{EventSink, LogSink, MemorySink, NullSink, ReconEvent};
pub use model::{ComparisonTables, Dataset, ReconInput, ReconResult, Record, RecordKey, Value};
