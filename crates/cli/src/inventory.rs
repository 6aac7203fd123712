//! `stockline inventory` and `stockline seed`.

use std::path::PathBuf;

use stockline_store::{apply_seed, SeedError, SeedFile, SqliteStore};

use crate::exit_codes::{EXIT_CONFIG_INVALID, EXIT_ERROR, EXIT_STORE, EXIT_USAGE};
use crate::CliError;

fn store_err(msg: impl Into<String>) -> CliError {
    CliError { code: EXIT_STORE, message: msg.into(), hint: None }
}

pub fn cmd_inventory(db: PathBuf, site: Option<String>, json: bool) -> Result<(), CliError> {
    if !db.exists() {
        return Err(CliError {
            code: EXIT_USAGE,
            message: format!("database not found: {}", db.display()),
            hint: Some("create it with `stockline seed <db> <seed.toml>`".into()),
        });
    }
    let store = SqliteStore::open(&db).map_err(|e| store_err(e.to_string()))?;
    let rows = store
        .list_inventory(site.as_deref())
        .map_err(|e| store_err(e.to_string()))?;

    if json {
        let out = serde_json::to_string_pretty(&rows).map_err(|e| CliError {
            code: EXIT_ERROR,
            message: format!("JSON serialization error: {e}"),
            hint: None,
        })?;
        println!("{out}");
        return Ok(());
    }

    for r in &rows {
        println!(
            "{:<12} {:<16} {:>6}  {}",
            r.site_code,
            r.upc,
            r.stock_level,
            r.product_name.as_deref().unwrap_or("")
        );
    }
    eprintln!("{} inventory line(s)", rows.len());
    Ok(())
}

pub fn cmd_seed(db: PathBuf, seed_path: PathBuf) -> Result<(), CliError> {
    let text = std::fs::read_to_string(&seed_path).map_err(|e| CliError {
        code: EXIT_USAGE,
        message: format!("cannot read {}: {e}", seed_path.display()),
        hint: None,
    })?;

    let seed = SeedFile::from_toml(&text).map_err(|e| CliError {
        code: EXIT_CONFIG_INVALID,
        message: e.to_string(),
        hint: None,
    })?;

    let store = SqliteStore::open(&db).map_err(|e| store_err(e.to_string()))?;
    let summary = apply_seed(&store, &seed).map_err(|e| match e {
        SeedError::Parse(msg) => CliError { code: EXIT_CONFIG_INVALID, message: msg, hint: None },
        SeedError::Store(e) => store_err(e.to_string()),
    })?;

    eprintln!(
        "seeded {}: {} location(s), {} product(s), {} inventory line(s)",
        db.display(),
        summary.locations,
        summary.products,
        summary.lines,
    );
    Ok(())
}
