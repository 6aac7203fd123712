// Stockline CLI - vendor sales ingestion against an inventory database

mod exit_codes;
mod ingest;
mod inventory;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgAction, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use exit_codes::EXIT_SUCCESS;
use ingest::{IngestArgs, ModeArg};

#[derive(Parser)]
#[command(name = "stockline")]
#[command(about = "Ingest vendor sales CSVs and reconcile them against inventory")]
#[command(long_version = long_version())]
#[command(version)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace). RUST_LOG overrides.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest a sales CSV and apply it to the inventory database
    #[command(after_help = "\
Examples:
  stockline ingest sales.csv --db inventory.db
  stockline ingest sales.csv --db inventory.db --json
  stockline ingest sales.csv --db inventory.db --config vendor-b.toml --output report.json
  stockline ingest sales.csv --db inventory.db --dry-run
  stockline ingest products.csv --db inventory.db --mode catalog")]
    Ingest {
        /// Path to the vendor CSV export
        csv: PathBuf,

        /// SQLite inventory database
        #[arg(long)]
        db: PathBuf,

        /// Ingestion config (TOML)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Override the config's mode
        #[arg(long, value_enum)]
        mode: Option<ModeArg>,

        /// Output JSON report to stdout
        #[arg(long)]
        json: bool,

        /// Write JSON report to file
        #[arg(long)]
        output: Option<PathBuf>,

        /// Run against an in-memory copy of the database
        #[arg(long)]
        dry_run: bool,
    },

    /// Show how a CSV's header row maps onto canonical fields
    #[command(after_help = "\
Examples:
  stockline headers sales.csv
  stockline headers sales.csv --config vendor-b.toml --json")]
    Headers {
        /// Path to the vendor CSV export
        csv: PathBuf,

        /// Ingestion config (TOML)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output JSON to stdout
        #[arg(long)]
        json: bool,
    },

    /// Validate an ingestion config without running
    #[command(after_help = "\
Examples:
  stockline validate stockline.toml")]
    Validate {
        /// Path to the config file
        config: PathBuf,
    },

    /// List stock levels
    #[command(after_help = "\
Examples:
  stockline inventory inventory.db
  stockline inventory inventory.db --site SW_02 --json")]
    Inventory {
        /// SQLite inventory database
        db: PathBuf,

        /// Only this location
        #[arg(long)]
        site: Option<String>,

        /// Output JSON to stdout
        #[arg(long)]
        json: bool,
    },

    /// Load locations, products and stock levels from a TOML seed file
    #[command(after_help = "\
Examples:
  stockline seed inventory.db seed.toml")]
    Seed {
        /// SQLite inventory database (created if missing)
        db: PathBuf,

        /// Seed file
        seed: PathBuf,
    },
}

fn long_version() -> &'static str {
    concat!(
        env!("CARGO_PKG_VERSION"),
        " (", env!("GIT_COMMIT_HASH"), ")",
        "\ningest:  stockline-ingest ", env!("CARGO_PKG_VERSION"),
        "\ntarget:  ", env!("TARGET"),
    )
}

/// Logs go to stderr so `--json` stdout stays a single JSON value.
fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Ingest {
            csv,
            db,
            config,
            mode,
            json,
            output,
            dry_run,
        } => ingest::cmd_ingest(IngestArgs {
            csv,
            db,
            config,
            mode,
            json,
            output,
            dry_run,
        }),
        Commands::Headers { csv, config, json } => ingest::cmd_headers(csv, config, json),
        Commands::Validate { config } => ingest::cmd_validate(config),
        Commands::Inventory { db, site, json } => inventory::cmd_inventory(db, site, json),
        Commands::Seed { db, seed } => inventory::cmd_seed(db, seed),
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
    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}
