// parcelrec CLI - reconcile listing exports against assessment records

mod exit_codes;
mod links;
mod load;
mod logging;
mod recon;
mod report;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgAction, Parser, Subcommand};

use exit_codes::EXIT_SUCCESS;
use logging::{init_logging, LogConfig};
use recon::RunOptions;
use report::OutputFormat;

#[derive(Parser)]
#[command(name = "parcelrec")]
#[command(about = "Reconcile property listing data against county assessment records")]
#[command(long_version = long_version())]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Only print errors
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a reconciliation from a TOML config file
    #[command(after_help = "\
Examples:
  parcelrec run mls-cama.recon.toml
  parcelrec run mls-cama.recon.toml --format csv --out-dir reports/
  parcelrec run mls-cama.recon.toml --json > result.json
  parcelrec run mls-cama.recon.toml --source-a march-listings.xlsx

Exit codes:
  0  sources agree
  1  discrepancies found (reports written)
  2  usage error
  6  invalid config or missing key column
  7  input could not be read or reports could not be written")]
    Run {
        /// Path to the .recon.toml config file
        config: PathBuf,

        /// Report file format
        #[arg(long, short = 'f', value_enum, default_value_t = OutputFormat::Xlsx)]
        format: OutputFormat,

        /// Directory for report files
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,

        /// Print the full result as JSON to stdout
        #[arg(long)]
        json: bool,

        /// Write the full JSON result to a file
        #[arg(long)]
        output: Option<PathBuf>,

        /// Listing-side input, overriding `sources.a.file`
        #[arg(long, env = "PARCELREC_SOURCE_A")]
        source_a: Option<PathBuf>,

        /// Assessment-side input, overriding `sources.b.file`
        #[arg(long, env = "PARCELREC_SOURCE_B")]
        source_b: Option<PathBuf>,
    },

    /// Validate a recon config without loading any data
    #[command(after_help = "\
Examples:
  parcelrec validate mls-cama.recon.toml")]
    Validate {
        /// Path to the .recon.toml config file
        config: PathBuf,
    },
}

fn long_version() -> &'static str {
    concat!(
        env!("CARGO_PKG_VERSION"),
        " (", env!("GIT_COMMIT_HASH"), ")",
        "\nengine:  parcelrec-recon ", env!("CARGO_PKG_VERSION"),
        "\ntarget:  ", env!("TARGET"),
    )
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    init_logging(&LogConfig::from_verbosity(cli.verbose, cli.quiet));

    let result = match cli.command {
        Commands::Run {
            config,
            format,
            out_dir,
            json,
            output,
            source_a,
            source_b,
        } => recon::cmd_run(RunOptions {
            config,
            format,
            out_dir,
            json,
            output,
            source_a,
            source_b,
            quiet: cli.quiet,
        }),
        Commands::Validate { config } => recon::cmd_validate(config),
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}
