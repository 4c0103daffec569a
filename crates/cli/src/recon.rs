//! `parcelrec run` / `parcelrec validate`: config-driven two-source reconciliation.

use std::path::{Path, PathBuf};

use parcelrec_recon::config::SourceConfig;
use parcelrec_recon::model::Side;
use parcelrec_recon::{Dataset, LogSink, ReconConfig, ReconError, ReconInput, ReconResult};

use crate::exit_codes::{
    recon_exit_code, EXIT_DISCREPANCIES, EXIT_INVALID_CONFIG, EXIT_RUNTIME, EXIT_USAGE,
};
use crate::load::load_dataset;
use crate::report::{build_tables, include_address_passthrough, write_tables, OutputFormat};
use crate::CliError;

pub struct RunOptions {
    pub config: PathBuf,
    pub format: OutputFormat,
    pub out_dir: PathBuf,
    pub json: bool,
    pub output: Option<PathBuf>,
    pub source_a: Option<PathBuf>,
    pub source_b: Option<PathBuf>,
    pub quiet: bool,
}

fn recon_err(code: u8, msg: impl Into<String>) -> CliError {
    CliError { code, message: msg.into(), hint: None }
}

fn read_config(config_path: &Path) -> Result<ReconConfig, CliError> {
    let config_str = std::fs::read_to_string(config_path).map_err(|e| {
        recon_err(EXIT_RUNTIME, format!("cannot read config {}: {e}", config_path.display()))
    })?;
    ReconConfig::from_toml(&config_str).map_err(|e| recon_err(EXIT_INVALID_CONFIG, e.to_string()))
}

pub fn cmd_run(opts: RunOptions) -> Result<(), CliError> {
    let mut config = read_config(&opts.config)?;
    include_address_passthrough(&mut config);

    // Resolve file paths relative to config file's directory
    let base_dir = opts.config.parent().unwrap_or_else(|| Path::new("."));

    let input = ReconInput {
        a: load_side(&config, Side::A, base_dir, opts.source_a.as_deref())?,
        b: load_side(&config, Side::B, base_dir, opts.source_b.as_deref())?,
    };

    let result = parcelrec_recon::run(&config, &input, &mut LogSink)
        .map_err(|e| engine_err(e, &input))?;

    // JSON output
    if opts.json || opts.output.is_some() {
        let json_str = serde_json::to_string_pretty(&result)
            .map_err(|e| recon_err(EXIT_RUNTIME, format!("JSON serialization error: {e}")))?;

        if let Some(ref path) = opts.output {
            std::fs::write(path, &json_str)
                .map_err(|e| recon_err(EXIT_RUNTIME, format!("cannot write output: {e}")))?;
            if !opts.quiet {
                eprintln!("wrote {}", path.display());
            }
        }

        if opts.json {
            println!("{json_str}");
        }
    }

    // Report tables
    let tables = build_tables(&result, &config).map_err(|e| recon_err(EXIT_RUNTIME, e))?;
    let written = write_tables(&tables, &opts.out_dir, opts.format)
        .map_err(|e| recon_err(EXIT_RUNTIME, e))?;

    if !opts.quiet {
        print_summary(&result, &written);
    }

    if !result.summary.is_clean() {
        return Err(recon_err(EXIT_DISCREPANCIES, "discrepancies found"));
    }
    Ok(())
}

fn load_side(
    config: &ReconConfig,
    side: Side,
    base_dir: &Path,
    override_path: Option<&Path>,
) -> Result<Dataset, CliError> {
    let source: &SourceConfig = config.sources.get(side);
    let path = match (override_path, source.file.as_deref()) {
        (Some(path), _) => path.to_path_buf(),
        (None, Some(file)) => base_dir.join(file),
        (None, None) => {
            let flag = match side {
                Side::A => "--source-a",
                Side::B => "--source-b",
            };
            return Err(recon_err(
                EXIT_USAGE,
                format!("no file configured for source {side} ({})", source.label),
            )
            .with_hint(format!(
                "set `file` under [sources.{}] or pass {flag}",
                side.as_str().to_lowercase()
            )));
        }
    };

    load_dataset(&source.label, &path, source.sheet.as_deref())
        .map_err(|e| recon_err(recon_exit_code(&e), e.to_string()))
}

fn engine_err(err: ReconError, input: &ReconInput) -> CliError {
    let hint = match &err {
        ReconError::MissingKeyColumn { side, .. } => {
            let dataset = match side {
                Side::A => &input.a,
                Side::B => &input.b,
            };
            Some(format!("available columns: {}", dataset.fields.join(", ")))
        }
        _ => None,
    };
    CliError { code: recon_exit_code(&err), message: err.to_string(), hint }
}

fn print_summary(result: &ReconResult, written: &[PathBuf]) {
    let s = &result.summary;
    let (a, b) = (&result.meta.source_a, &result.meta.source_b);

    eprintln!(
        "{}: {} {a} records, {} {b} records, {} matched pairs",
        result.meta.config_name, s.records_a, s.records_b, s.matched_pairs
    );
    eprintln!("  perfect matches:    {}", s.perfect_matches);
    eprintln!(
        "  mismatched records: {} ({} field mismatches)",
        s.mismatched_records, s.mismatch_rows
    );
    eprintln!("  missing in {b}: {}", s.missing_in_b);
    eprintln!("  missing in {a}: {}", s.missing_in_a);
    if s.skipped > 0 {
        eprintln!("  nothing to compare: {}", s.skipped);
    }
    if s.duplicate_keys_a + s.duplicate_keys_b > 0 {
        eprintln!("  duplicate keys:     {a} {}, {b} {}", s.duplicate_keys_a, s.duplicate_keys_b);
    }
    if s.blank_keys_a + s.blank_keys_b > 0 {
        eprintln!("  blank keys:         {a} {}, {b} {}", s.blank_keys_a, s.blank_keys_b);
    }

    if !s.mismatches_by_field.is_empty() {
        eprintln!("mismatches by field:");
        for entry in &s.mismatches_by_field {
            eprintln!("  {}: {}", entry.field, entry.count);
        }
    }

    if s.is_clean() {
        eprintln!("no discrepancies found");
    }
    for path in written {
        eprintln!("wrote {}", path.display());
    }
}

pub fn cmd_validate(config_path: PathBuf) -> Result<(), CliError> {
    let config = read_config(&config_path)?;
    eprintln!(
        "valid: recon '{}' ({} vs {}) with {} rule(s): {} direct, {} sum, {} categorical",
        config.name,
        config.sources.a.label,
        config.sources.b.label,
        config.rule_count(),
        config.direct.len(),
        config.sum.len(),
        config.categorical.len(),
    );
    Ok(())
}
