use std::fmt;

use crate::model::Side;

#[derive(Debug)]
pub enum ReconError {
    /// TOML parse / deserialization error.
    ConfigParse(String),
    /// Config validation error (empty rule set, blank field name, bad tolerance, etc.).
    ConfigValidation(String),
    /// The configured key column is not part of a dataset's schema.
    MissingKeyColumn { side: Side, source: String, column: String },
    /// A dataset could not be loaded (malformed CSV, unreadable sheet).
    Load { source: String, message: String },
    /// IO error (file read, etc.).
    Io(String),
}

impl ReconError {
    /// Configuration problems abort a run before any record is compared.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            Self::ConfigParse(_) | Self::ConfigValidation(_) | Self::MissingKeyColumn { .. }
        )
    }
}

impl fmt::Display for ReconError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigParse(msg) => write!(f, "config parse error: {msg}"),
            Self::ConfigValidation(msg) => write!(f, "config validation error: {msg}"),
            Self::MissingKeyColumn { side, source, column } => {
                write!(f, "{side} source '{source}': key column '{column}' not found")
            }
            Self::Load { source, message } => write!(f, "cannot load '{source}': {message}"),
            Self::Io(msg) => write!(f, "IO error: {msg}"),
        }
    }
}

impl std::error::Error for ReconError {}
