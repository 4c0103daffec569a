//! Logging setup using `tracing` and `tracing-subscriber`.
//!
//! The engine reports through the `log` facade; the subscriber installed
//! here also captures those records, so one filter governs both.
//!
//! - `warn`: duplicate keys, blank keys, rule columns not found
//! - `info`: load and report progress
//! - `debug`: every field comparison (`-v`)
//! - `trace`: every skipped field (`-vv`)

use tracing::Level;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogConfig {
    pub level: Level,
    pub with_ansi: bool,
}

impl LogConfig {
    /// - `--quiet`: errors only
    /// - 0 (no `-v`): info level
    /// - 1 (`-v`): debug level
    /// - 2+ (`-vv`): trace level
    pub fn from_verbosity(verbosity: u8, quiet: bool) -> Self {
        let level = match (quiet, verbosity) {
            (true, _) => Level::ERROR,
            (false, 0) => Level::INFO,
            (false, 1) => Level::DEBUG,
            (false, _) => Level::TRACE,
        };
        Self {
            level,
            with_ansi: false,
        }
    }
}

/// Install the global subscriber, writing to stderr. A second call is a no-op.
pub fn init_logging(config: &LogConfig) {
    let layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(config.with_ansi)
        .with_target(false)
        .without_time();

    let _ = tracing_subscriber::registry()
        .with(build_env_filter(config.level))
        .with(layer)
        .try_init();
}

/// `RUST_LOG` wins over the verbosity flags.
fn build_env_filter(level: Level) -> EnvFilter {
    let level = level.as_str().to_lowercase();
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "warn,parcelrec={level},parcelrec_recon={level}"
        ))
    })
}
