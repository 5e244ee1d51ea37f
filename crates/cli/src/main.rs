// Larder CLI - catalog and recipe audit

mod audit;
mod exit_codes;
mod report;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use exit_codes::{EXIT_SUCCESS, EXIT_USAGE};

#[derive(Parser)]
#[command(name = "larder")]
#[command(about = "Audit a supplier catalog and its recipes: field checks, duplicates, units, costs")]
#[command(long_version = long_version())]
#[command(version)]
struct Cli {
    /// More diagnostics on stderr (-v info, -vv debug); RUST_LOG overrides
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the audit from a TOML config file
    #[command(after_help = "\
Examples:
  larder audit kitchen.toml
  larder audit kitchen.toml --json
  larder audit kitchen.toml --output result.json
  larder audit kitchen.toml --out-dir reports/
  larder audit kitchen.toml --items items.csv --recipes recipes.csv --strict")]
    Audit(audit::AuditArgs),

    /// Validate an audit config without reading any data
    #[command(after_help = "\
Examples:
  larder validate kitchen.toml")]
    Validate {
        /// Path to the audit .toml config file
        config: PathBuf,
    },

    /// List the unit table a config resolves to
    #[command(after_help = "\
Examples:
  larder units kitchen.toml
  larder units kitchen.toml --json")]
    Units {
        /// Path to the audit .toml config file
        config: PathBuf,

        /// Output JSON instead of a table
        #[arg(long)]
        json: bool,
    },
}

fn long_version() -> &'static str {
    if cfg!(debug_assertions) {
        concat!(
            env!("CARGO_PKG_VERSION"),
            " (", env!("GIT_COMMIT_HASH"), ")",
            "\nbuild:   debug",
            "\ntarget:  ", env!("TARGET"),
        )
    } else {
        concat!(
            env!("CARGO_PKG_VERSION"),
            " (", env!("GIT_COMMIT_HASH"), ")",
            "\nbuild:   release",
            "\ntarget:  ", env!("TARGET"),
        )
    }
}

/// Diagnostics go to stderr so `--json` stdout stays a single value.
fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    // A second init (tests, embedding) is harmless
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        None => {
            // No subcommand = show usage
            eprintln!("Usage: larder <command> [options]");
            eprintln!("       larder --help for more information");
            Err(CliError { code: EXIT_USAGE, message: String::new(), hint: None })
        }
        Some(Commands::Audit(args)) => audit::cmd_audit(args),
        Some(Commands::Validate { config }) => audit::cmd_validate(config),
        Some(Commands::Units { config, json }) => audit::cmd_units(config, json),
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

#[derive(Debug)]
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
