// Inventory database using SQLite

use std::path::Path;

use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Transaction};
use serde::Serialize;
use tracing::debug;

use stockline_ingest::model::ProductRecord;
use stockline_ingest::store::{
    InventoryLine, InventoryLineId, InventoryStore, LocationId, ProductId, StockWrite,
};
use stockline_ingest::StoreError;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS locations (
    id INTEGER PRIMARY KEY,
    site_code TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS products (
    id INTEGER PRIMARY KEY,
    upc TEXT NOT NULL UNIQUE,
    name TEXT,
    unit_price_cents INTEGER,   -- NULL until a catalog upload sets it
    last_sale_date TEXT         -- YYYY-MM-DD
);

CREATE TABLE IF NOT EXISTS inventory (
    id INTEGER PRIMARY KEY,
    location_id INTEGER NOT NULL REFERENCES locations(id),
    product_id INTEGER NOT NULL REFERENCES products(id),
    stock_level INTEGER NOT NULL DEFAULT 0 CHECK (stock_level >= 0),
    updated_at TEXT,
    UNIQUE (location_id, product_id)
);
"#;

/// One row of `stockline inventory` output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StockRow {
    pub site_code: String,
    pub upc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_name: Option<String>,
    pub stock_level: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductRow {
    pub upc: String,
    pub name: Option<String>,
    pub unit_price_cents: Option<i64>,
    pub last_sale_date: Option<String>,
}

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

fn backend(e: rusqlite::Error) -> StoreError {
    StoreError::Backend(e.to_string())
}

impl SqliteStore {
    /// Open (or create) a database file and make sure the schema exists.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path).map_err(backend)?;
        conn.execute_batch(SCHEMA).map_err(backend)?;
        debug!(path = %path.display(), "opened inventory database");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().map_err(backend)?;
        conn.execute_batch(SCHEMA).map_err(backend)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// In-memory copy of an existing database. Writes never reach the file.
    pub fn snapshot(path: &Path) -> Result<Self, StoreError> {
        if !path.exists() {
            return Err(StoreError::NotFound(format!("database {}", path.display())));
        }
        // Make sure the source has every table before copying from it
        drop(Self::open(path)?);

        let store = Self::open_in_memory()?;
        {
            let conn = store.conn.lock();
            conn.execute(
                "ATTACH DATABASE ?1 AS src",
                params![path.to_string_lossy().into_owned()],
            )
            .map_err(backend)?;
            conn.execute_batch(
                "INSERT INTO main.locations SELECT id, site_code FROM src.locations;
                 INSERT INTO main.products
                     SELECT id, upc, name, unit_price_cents, last_sale_date FROM src.products;
                 INSERT INTO main.inventory
                     SELECT id, location_id, product_id, stock_level, updated_at FROM src.inventory;
                 DETACH DATABASE src;",
            )
            .map_err(backend)?;
        }
        debug!(path = %path.display(), "loaded in-memory snapshot");
        Ok(store)
    }

    // ---------------------------------------------------------------------
    // Seeding
    // ---------------------------------------------------------------------

    /// Run `f` inside one transaction; nothing is kept if it fails.
    pub(crate) fn with_transaction<T>(
        &self,
        f: impl FnOnce(&Transaction<'_>) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction().map_err(backend)?;
        let out = f(&tx)?;
        tx.commit().map_err(backend)?;
        Ok(out)
    }

    pub fn add_location(&self, site_code: &str) -> Result<LocationId, StoreError> {
        self.with_transaction(|tx| insert_location(tx, site_code))
    }

    pub fn add_product(&self, upc: &str, name: Option<&str>) -> Result<ProductId, StoreError> {
        self.with_transaction(|tx| insert_product(tx, upc, name))
    }

    /// Set stock for (site_code, upc), creating the location, product and
    /// line as needed.
    pub fn add_line(
        &self,
        site_code: &str,
        upc: &str,
        stock_level: i64,
    ) -> Result<InventoryLineId, StoreError> {
        self.with_transaction(|tx| insert_line(tx, site_code, upc, stock_level))
    }

    // ---------------------------------------------------------------------
    // Reporting
    // ---------------------------------------------------------------------

    pub fn list_inventory(&self, site_code: Option<&str>) -> Result<Vec<StockRow>, StoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(
                "SELECT l.site_code, p.upc, p.name, i.stock_level
                 FROM inventory i
                 JOIN locations l ON l.id = i.location_id
                 JOIN products p ON p.id = i.product_id
                 WHERE ?1 IS NULL OR l.site_code = ?1
                 ORDER BY l.site_code, p.upc",
            )
            .map_err(backend)?;
        let rows = stmt
            .query_map(params![site_code], |row| {
                Ok(StockRow {
                    site_code: row.get(0)?,
                    upc: row.get(1)?,
                    product_name: row.get(2)?,
                    stock_level: row.get(3)?,
                })
            })
            .map_err(backend)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(backend)
    }

    pub fn stock(&self, site_code: &str, upc: &str) -> Result<Option<i64>, StoreError> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT i.stock_level
             FROM inventory i
             JOIN locations l ON l.id = i.location_id
             JOIN products p ON p.id = i.product_id
             WHERE l.site_code = ?1 AND p.upc = ?2",
            params![site_code, upc],
            |row| row.get(0),
        )
        .optional()
        .map_err(backend)
    }

    pub fn product(&self, upc: &str) -> Result<Option<ProductRow>, StoreError> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT upc, name, unit_price_cents, last_sale_date FROM products WHERE upc = ?1",
            params![upc],
            |row| {
                Ok(ProductRow {
                    upc: row.get(0)?,
                    name: row.get(1)?,
                    unit_price_cents: row.get(2)?,
                    last_sale_date: row.get(3)?,
                })
            },
        )
        .optional()
        .map_err(backend)
    }
}

// -------------------------------------------------------------------------
// Row helpers (shared by seeding and the trait impl)
// -------------------------------------------------------------------------

pub(crate) fn insert_location(conn: &Connection, site_code: &str) -> Result<LocationId, StoreError> {
    conn.execute(
        "INSERT INTO locations (site_code) VALUES (?1) ON CONFLICT(site_code) DO NOTHING",
        params![site_code],
    )
    .map_err(backend)?;
    conn.query_row(
        "SELECT id FROM locations WHERE site_code = ?1",
        params![site_code],
        |row| row.get(0),
    )
    .map(LocationId)
    .map_err(backend)
}

pub(crate) fn insert_product(
    conn: &Connection,
    upc: &str,
    name: Option<&str>,
) -> Result<ProductId, StoreError> {
    conn.execute(
        "INSERT INTO products (upc, name) VALUES (?1, ?2)
         ON CONFLICT(upc) DO UPDATE SET name = COALESCE(excluded.name, products.name)",
        params![upc, name],
    )
    .map_err(backend)?;
    conn.query_row("SELECT id FROM products WHERE upc = ?1", params![upc], |row| {
        row.get(0)
    })
    .map(ProductId)
    .map_err(backend)
}

pub(crate) fn insert_line(
    conn: &Connection,
    site_code: &str,
    upc: &str,
    stock_level: i64,
) -> Result<InventoryLineId, StoreError> {
    let location = insert_location(conn, site_code)?;
    let product = insert_product(conn, upc, None)?;
    conn.execute(
        "INSERT INTO inventory (location_id, product_id, stock_level, updated_at)
         VALUES (?1, ?2, ?3, datetime('now'))
         ON CONFLICT(location_id, product_id)
         DO UPDATE SET stock_level = excluded.stock_level, updated_at = excluded.updated_at",
        params![location.0, product.0, stock_level],
    )
    .map_err(backend)?;
    conn.query_row(
        "SELECT id FROM inventory WHERE location_id = ?1 AND product_id = ?2",
        params![location.0, product.0],
        |row| row.get(0),
    )
    .map(InventoryLineId)
    .map_err(backend)
}

/// Conditional write: only succeeds while the line still holds `expected`.
fn write_stock(conn: &Connection, w: &StockWrite) -> Result<(), StoreError> {
    let changed = conn
        .execute(
            "UPDATE inventory SET stock_level = ?1, updated_at = datetime('now')
             WHERE id = ?2 AND stock_level = ?3",
            params![w.new_stock, w.line.0, w.expected],
        )
        .map_err(backend)?;
    if changed == 1 {
        return Ok(());
    }

    let exists: Option<i64> = conn
        .query_row(
            "SELECT id FROM inventory WHERE id = ?1",
            params![w.line.0],
            |row| row.get(0),
        )
        .optional()
        .map_err(backend)?;
    match exists {
        Some(_) => Err(StoreError::Conflict { line: w.line.0 }),
        None => Err(StoreError::NotFound(format!("inventory line {}", w.line.0))),
    }
}

// -------------------------------------------------------------------------
// InventoryStore
// -------------------------------------------------------------------------

impl InventoryStore for SqliteStore {
    fn find_location(&self, site_code: &str) -> Result<Option<LocationId>, StoreError> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT id FROM locations WHERE site_code = ?1",
            params![site_code],
            |row| row.get(0),
        )
        .optional()
        .map(|id| id.map(LocationId))
        .map_err(backend)
    }

    fn find_product(&self, upc: &str) -> Result<Option<ProductId>, StoreError> {
        let conn = self.conn.lock();
        conn.query_row("SELECT id FROM products WHERE upc = ?1", params![upc], |row| {
            row.get(0)
        })
        .optional()
        .map(|id| id.map(ProductId))
        .map_err(backend)
    }

    fn find_inventory_line(
        &self,
        location: LocationId,
        product: ProductId,
    ) -> Result<Option<InventoryLine>, StoreError> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT id, stock_level FROM inventory WHERE location_id = ?1 AND product_id = ?2",
            params![location.0, product.0],
            |row| {
                Ok(InventoryLine {
                    id: InventoryLineId(row.get(0)?),
                    stock_level: row.get(1)?,
                })
            },
        )
        .optional()
        .map_err(backend)
    }

    fn set_stock(
        &self,
        line: InventoryLineId,
        expected: i64,
        new_stock: i64,
    ) -> Result<(), StoreError> {
        let conn = self.conn.lock();
        write_stock(
            &conn,
            &StockWrite {
                line,
                expected,
                new_stock,
            },
        )
    }

    fn set_stock_batch(&self, writes: &[StockWrite]) -> Result<(), StoreError> {
        self.with_transaction(|tx| {
            for w in writes {
                write_stock(tx, w)?;
            }
            Ok(())
        })
    }

    fn upsert_products(&self, records: &[ProductRecord]) -> Result<(), StoreError> {
        self.with_transaction(|tx| {
            let mut stmt = tx
                .prepare(
                    "INSERT INTO products (upc, name, unit_price_cents, last_sale_date)
                     VALUES (?1, ?2, ?3, ?4)
                     ON CONFLICT(upc) DO UPDATE SET
                         name = COALESCE(excluded.name, products.name),
                         unit_price_cents = excluded.unit_price_cents,
                         last_sale_date = excluded.last_sale_date",
                )
                .map_err(backend)?;
            for r in records {
                stmt.execute(params![
                    r.upc,
                    r.product_name,
                    r.unit_price_cents,
                    r.last_sale_date.to_string(),
                ])
                .map_err(backend)?;
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("inv.db");
        SqliteStore::open(&path).unwrap().add_line("SW_02", "1", 3).unwrap();
        let reopened = SqliteStore::open(&path).unwrap();
        assert_eq!(reopened.stock("SW_02", "1").unwrap(), Some(3));
    }

    #[test]
    fn negative_stock_is_refused() {
        let store = SqliteStore::open_in_memory().unwrap();
        let err = store.add_line("SW_02", "1", -4).unwrap_err();
        assert!(matches!(err, StoreError::Backend(_)), "{err:?}");
        assert_eq!(store.stock("SW_02", "1").unwrap(), None);
    }

    #[test]
    fn add_line_twice_updates_stock() {
        let store = SqliteStore::open_in_memory().unwrap();
        let a = store.add_line("SW_02", "1", 3).unwrap();
        let b = store.add_line("SW_02", "1", 9).unwrap();
        assert_eq!(a, b);
        assert_eq!(store.stock("SW_02", "1").unwrap(), Some(9));
    }

    #[test]
    fn lookups() {
        let store = SqliteStore::open_in_memory().unwrap();
        let line = store.add_line("SW_02", "012345", 10).unwrap();
        let loc = store.find_location("SW_02").unwrap().unwrap();
        let prod = store.find_product("012345").unwrap().unwrap();
        assert_eq!(
            store.find_inventory_line(loc, prod).unwrap(),
            Some(InventoryLine { id: line, stock_level: 10 })
        );
        assert_eq!(store.find_location("nope").unwrap(), None);
        assert_eq!(store.find_product("nope").unwrap(), None);
    }

    #[test]
    fn conditional_write_conflict_and_missing() {
        let store = SqliteStore::open_in_memory().unwrap();
        let line = store.add_line("S", "U", 10).unwrap();
        store.set_stock(line, 10, 4).unwrap();
        assert_eq!(
            store.set_stock(line, 10, 2).unwrap_err(),
            StoreError::Conflict { line: line.0 }
        );
        assert!(matches!(
            store.set_stock(InventoryLineId(9_999), 0, 0),
            Err(StoreError::NotFound(_))
        ));
        assert_eq!(store.stock("S", "U").unwrap(), Some(4));
    }

    #[test]
    fn batch_rolls_back_on_conflict() {
        let store = SqliteStore::open_in_memory().unwrap();
        let a = store.add_line("S", "A", 10).unwrap();
        let b = store.add_line("S", "B", 10).unwrap();
        let err = store
            .set_stock_batch(&[
                StockWrite { line: a, expected: 10, new_stock: 1 },
                StockWrite { line: b, expected: 7, new_stock: 1 },
            ])
            .unwrap_err();
        assert_eq!(err, StoreError::Conflict { line: b.0 });
        assert_eq!(store.stock("S", "A").unwrap(), Some(10));
    }

    #[test]
    fn list_inventory_filters_by_site() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.add_line("SW_03", "B", 1).unwrap();
        store.add_line("SW_02", "A", 2).unwrap();
        store.add_line("SW_02", "B", 3).unwrap();

        let all = store.list_inventory(None).unwrap();
        let keys: Vec<(String, String)> =
            all.iter().map(|r| (r.site_code.clone(), r.upc.clone())).collect();
        assert_eq!(
            keys,
            vec![
                ("SW_02".to_string(), "A".to_string()),
                ("SW_02".to_string(), "B".to_string()),
                ("SW_03".to_string(), "B".to_string()),
            ]
        );
        assert_eq!(store.list_inventory(Some("SW_03")).unwrap().len(), 1);
    }

    #[test]
    fn snapshot_does_not_write_through() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("inv.db");
        let line = SqliteStore::open(&path).unwrap().add_line("S", "U", 5).unwrap();

        let snap = SqliteStore::snapshot(&path).unwrap();
        snap.set_stock(line, 5, 0).unwrap();
        assert_eq!(snap.stock("S", "U").unwrap(), Some(0));

        let file = SqliteStore::open(&path).unwrap();
        assert_eq!(file.stock("S", "U").unwrap(), Some(5));
    }

    #[test]
    fn snapshot_of_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = SqliteStore::snapshot(&dir.path().join("missing.db")).err().unwrap();
        assert!(matches!(err, StoreError::NotFound(_)));
    }
}
