//! `stockline ingest`, `stockline headers`, `stockline validate`.

use std::path::{Path, PathBuf};

use clap::ValueEnum;
use stockline_ingest::config::IngestMode;
use stockline_ingest::model::{CanonicalField, IngestionReport};
use stockline_ingest::{ingest, inspect_headers, IngestConfig};
use stockline_store::SqliteStore;

use crate::exit_codes::{
    ingest_exit_code, EXIT_CONFIG_INVALID, EXIT_ERROR, EXIT_PARTIAL, EXIT_STORE, EXIT_USAGE,
};
use crate::CliError;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ModeArg {
    /// Decrement stock for every (site, product) sold
    Reconcile,
    /// Upsert the products seen in the file into the catalog
    Catalog,
}

impl From<ModeArg> for IngestMode {
    fn from(m: ModeArg) -> Self {
        match m {
            ModeArg::Reconcile => IngestMode::Reconcile,
            ModeArg::Catalog => IngestMode::Catalog,
        }
    }
}

fn ingest_err(code: u8, msg: impl Into<String>) -> CliError {
    CliError { code, message: msg.into(), hint: None }
}

/// Read and validate a config file, or fall back to defaults.
pub fn load_config(path: Option<&Path>) -> Result<IngestConfig, CliError> {
    let Some(path) = path else {
        return Ok(IngestConfig::default());
    };
    let text = std::fs::read_to_string(path).map_err(|e| {
        ingest_err(EXIT_USAGE, format!("cannot read config {}: {e}", path.display()))
    })?;
    IngestConfig::from_toml(&text).map_err(|e| ingest_err(EXIT_CONFIG_INVALID, e.to_string()))
}

fn read_upload(path: &Path) -> Result<Vec<u8>, CliError> {
    std::fs::read(path)
        .map_err(|e| ingest_err(EXIT_USAGE, format!("cannot read {}: {e}", path.display())))
}

// ============================================================================
// ingest
// ============================================================================

pub struct IngestArgs {
    pub csv: PathBuf,
    pub db: PathBuf,
    pub config: Option<PathBuf>,
    pub mode: Option<ModeArg>,
    pub json: bool,
    pub output: Option<PathBuf>,
    pub dry_run: bool,
}

pub fn cmd_ingest(args: IngestArgs) -> Result<(), CliError> {
    let mut config = load_config(args.config.as_deref())?;
    if let Some(mode) = args.mode {
        config.mode = mode.into();
    }
    tracing::debug!(mode = %config.mode, workers = config.workers, dry_run = args.dry_run, "config loaded");

    let bytes = read_upload(&args.csv)?;

    let store = if args.dry_run {
        SqliteStore::snapshot(&args.db)
    } else {
        SqliteStore::open(&args.db)
    }
    .map_err(|e| {
        ingest_err(EXIT_STORE, format!("cannot open {}: {e}", args.db.display()))
            .with_hint("create it with `stockline seed <db> <seed.toml>`")
    })?;

    let report = ingest(&bytes, &store, &config).map_err(|e| {
        let err = ingest_err(ingest_exit_code(&e), e.to_string());
        match e {
            stockline_ingest::IngestError::UnmappedColumns { .. } => {
                err.with_hint("run `stockline headers <csv>` to see how columns were mapped")
            }
            stockline_ingest::IngestError::DuplicateProducts { .. } => {
                err.with_hint("set on_duplicate = \"skip\" or \"overwrite\" in the config")
            }
            _ => err,
        }
    })?;

    let json_str = serde_json::to_string_pretty(&report)
        .map_err(|e| ingest_err(EXIT_ERROR, format!("JSON serialization error: {e}")))?;

    if let Some(ref path) = args.output {
        std::fs::write(path, &json_str)
            .map_err(|e| ingest_err(EXIT_ERROR, format!("cannot write output: {e}")))?;
        eprintln!("wrote {}", path.display());
    }

    if args.json {
        println!("{json_str}");
    }

    print_summary(&report, args.dry_run);

    let s = &report.summary;
    if s.rolled_back {
        return Err(ingest_err(EXIT_STORE, "batch commit rolled back, no stock was changed"));
    }
    if !s.is_clean() {
        return Err(ingest_err(
            EXIT_PARTIAL,
            format!("{} row(s) rejected, {} aggregate(s) not applied", s.rows_rejected, s.skipped()),
        ));
    }
    Ok(())
}

/// Human summary to stderr.
fn print_summary(report: &IngestionReport, dry_run: bool) {
    let s = &report.summary;
    let prefix = if dry_run { "dry run: " } else { "" };

    eprintln!(
        "{prefix}{} rows: {} accepted, {} rejected",
        s.rows_total, s.rows_accepted, s.rows_rejected
    );

    if let Some(ref catalog) = report.catalog {
        eprintln!(
            "{prefix}catalog: {} product(s), {} written, {} already present ({})",
            catalog.products_total,
            catalog.written,
            catalog.duplicates.len(),
            catalog.on_duplicate,
        );
    } else {
        eprintln!(
            "{prefix}{} aggregate(s): {} updated, {} location not found, {} product not found, {} no inventory line, {} store error(s)",
            s.aggregates_total,
            s.updated,
            s.location_not_found,
            s.product_not_found,
            s.inventory_line_not_found,
            s.store_errors,
        );
        if s.shortfall > 0 {
            eprintln!("{prefix}{} unit(s) sold beyond recorded stock", s.shortfall);
        }
    }

    for r in report.rejected.iter().take(10) {
        eprintln!("  line {}: {}", r.line, r.reasons.join("; "));
    }
    if report.rejected.len() > 10 {
        eprintln!("  ... {} more rejected row(s)", report.rejected.len() - 10);
    }
}

// ============================================================================
// headers
// ============================================================================

pub fn cmd_headers(csv: PathBuf, config: Option<PathBuf>, json: bool) -> Result<(), CliError> {
    let config = load_config(config.as_deref())?;
    let bytes = read_upload(&csv)?;

    let inspection = inspect_headers(&bytes, &config)
        .map_err(|e| ingest_err(ingest_exit_code(&e), e.to_string()))?;

    if json {
        let out = serde_json::to_string_pretty(&inspection)
            .map_err(|e| ingest_err(EXIT_ERROR, format!("JSON serialization error: {e}")))?;
        println!("{out}");
        return Ok(());
    }

    match inspection.sniffed {
        Some(g) => println!(
            "delimiter: {:?} ({} columns, {}/{} sampled rows agree)",
            inspection.delimiter, g.columns, g.matching_rows, g.sampled_rows
        ),
        None => println!("delimiter: {:?} (configured)", inspection.delimiter),
    }
    for field in CanonicalField::ALL {
        match inspection.mapping.get(field) {
            Some(header) => println!("{:<13} <- {header}", field.as_str()),
            None => println!("{:<13} (unmapped)", field.as_str()),
        }
    }
    Ok(())
}

// ============================================================================
// validate
// ============================================================================

pub fn cmd_validate(config_path: PathBuf) -> Result<(), CliError> {
    let config = load_config(Some(&config_path))?;
    eprintln!(
        "valid: mode {}, {} worker(s), {:?} headers, {:?} commit",
        config.mode, config.workers, config.header_strategy, config.commit_policy,
    );
    Ok(())
}
