//! Loading locations, products and stock from a TOML seed file.
//!
//! ```toml
//! locations = ["SW_05"]
//!
//! [[product]]
//! upc = "012345"
//! name = "Cola 12oz"
//!
//! [[inventory]]
//! site_code = "SW_02"
//! upc = "012345"
//! stock = 10
//! ```

use serde::Deserialize;
use tracing::info;

use crate::error::SeedError;
use crate::sqlite::{insert_line, insert_location, insert_product, SqliteStore};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SeedFile {
    /// Locations with no stock yet.
    pub locations: Vec<String>,
    #[serde(rename = "product")]
    pub products: Vec<SeedProduct>,
    pub inventory: Vec<SeedLine>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SeedProduct {
    pub upc: String,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SeedLine {
    pub site_code: String,
    pub upc: String,
    pub stock: i64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct SeedSummary {
    pub locations: usize,
    pub products: usize,
    pub lines: usize,
}

impl SeedFile {
    pub fn from_toml(input: &str) -> Result<Self, SeedError> {
        let seed: SeedFile = toml::from_str(input).map_err(|e| SeedError::Parse(e.to_string()))?;
        if let Some(line) = seed.inventory.iter().find(|l| l.stock < 0) {
            return Err(SeedError::Parse(format!(
                "negative stock {} for {}/{}",
                line.stock, line.site_code, line.upc
            )));
        }
        Ok(seed)
    }
}

/// Apply a seed in one transaction. Existing lines get their stock replaced.
pub fn apply_seed(store: &SqliteStore, seed: &SeedFile) -> Result<SeedSummary, SeedError> {
    let summary = store.with_transaction(|tx| {
        for site in &seed.locations {
            insert_location(tx, site)?;
        }
        for p in &seed.products {
            insert_product(tx, &p.upc, p.name.as_deref())?;
        }
        for l in &seed.inventory {
            insert_line(tx, &l.site_code, &l.upc, l.stock)?;
        }
        Ok(SeedSummary {
            locations: seed.locations.len(),
            products: seed.products.len(),
            lines: seed.inventory.len(),
        })
    })?;

    info!(
        locations = summary.locations,
        products = summary.products,
        lines = summary.lines,
        "seed applied"
    );
    Ok(summary)
}
