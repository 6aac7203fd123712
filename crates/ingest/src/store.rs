//! Inventory persistence seam.
//!
//! The pipeline never owns a database handle; callers pass an
//! [`InventoryStore`] into [`crate::ingest`]. [`MemoryStore`] is the
//! in-process implementation used by tests and dry runs.

use std::collections::{BTreeMap, HashMap, HashSet};

use parking_lot::Mutex;

use crate::error::StoreError;
use crate::model::ProductRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LocationId(pub i64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProductId(pub i64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InventoryLineId(pub i64);

/// Stock of one product at one location, as last read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InventoryLine {
    pub id: InventoryLineId,
    pub stock_level: i64,
}

/// A conditional stock write: applies only while the line still holds
/// `expected`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StockWrite {
    pub line: InventoryLineId,
    pub expected: i64,
    pub new_stock: i64,
}

/// Capability the pipeline needs from persistent storage.
///
/// Implementations must make each `set_stock` an atomic
/// compare-and-set on one line, and `set_stock_batch` all-or-nothing.
pub trait InventoryStore: Send + Sync {
    fn find_location(&self, site_code: &str) -> Result<Option<LocationId>, StoreError>;

    fn find_product(&self, upc: &str) -> Result<Option<ProductId>, StoreError>;

    fn find_inventory_line(
        &self,
        location: LocationId,
        product: ProductId,
    ) -> Result<Option<InventoryLine>, StoreError>;

    /// Write `new_stock` if the line still holds `expected`, else
    /// [`StoreError::Conflict`].
    fn set_stock(
        &self,
        line: InventoryLineId,
        expected: i64,
        new_stock: i64,
    ) -> Result<(), StoreError>;

    /// Apply every write or none of them.
    fn set_stock_batch(&self, writes: &[StockWrite]) -> Result<(), StoreError>;

    /// Insert or replace products by UPC.
    fn upsert_products(&self, records: &[ProductRecord]) -> Result<(), StoreError>;
}

// ---------------------------------------------------------------------------
// In-memory store
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredProduct {
    pub id: ProductId,
    pub upc: String,
    pub name: Option<String>,
    pub unit_price_cents: Option<i64>,
}

#[derive(Debug, Default)]
struct MemoryState {
    next_id: i64,
    locations: HashMap<String, LocationId>,
    products: BTreeMap<String, StoredProduct>,
    lines: HashMap<(LocationId, ProductId), InventoryLineId>,
    stock: HashMap<InventoryLineId, i64>,
    failing_lines: HashSet<InventoryLineId>,
    fail_lookups: bool,
}

impl MemoryState {
    fn next(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// Mutex-guarded in-memory store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_location(&self, site_code: &str) -> LocationId {
        let mut st = self.state.lock();
        if let Some(id) = st.locations.get(site_code) {
            return *id;
        }
        let id = LocationId(st.next());
        st.locations.insert(site_code.to_string(), id);
        id
    }

    pub fn add_product(&self, upc: &str, name: Option<&str>) -> ProductId {
        let mut st = self.state.lock();
        if let Some(p) = st.products.get(upc) {
            return p.id;
        }
        let id = ProductId(st.next());
        st.products.insert(
            upc.to_string(),
            StoredProduct {
                id,
                upc: upc.to_string(),
                name: name.map(str::to_string),
                unit_price_cents: None,
            },
        );
        id
    }

    /// Stock a product at a location, creating both if needed.
    pub fn add_line(&self, site_code: &str, upc: &str, stock_level: i64) -> InventoryLineId {
        let location = self.add_location(site_code);
        let product = self.add_product(upc, None);
        let mut st = self.state.lock();
        let id = match st.lines.get(&(location, product)) {
            Some(id) => *id,
            None => {
                let id = InventoryLineId(st.next());
                st.lines.insert((location, product), id);
                id
            }
        };
        st.stock.insert(id, stock_level);
        id
    }

    /// Current stock for (site_code, upc), if the line exists.
    pub fn stock(&self, site_code: &str, upc: &str) -> Option<i64> {
        let st = self.state.lock();
        let location = st.locations.get(site_code)?;
        let product = st.products.get(upc)?.id;
        let line = st.lines.get(&(*location, product))?;
        st.stock.get(line).copied()
    }

    pub fn product(&self, upc: &str) -> Option<StoredProduct> {
        self.state.lock().products.get(upc).cloned()
    }

    pub fn product_count(&self) -> usize {
        self.state.lock().products.len()
    }

    /// Make every write touching this line fail with a backend error.
    pub fn fail_writes_for(&self, line: InventoryLineId) {
        self.state.lock().failing_lines.insert(line);
    }

    /// Make every lookup fail with a backend error.
    pub fn fail_lookups(&self, fail: bool) {
        self.state.lock().fail_lookups = fail;
    }

    /// Change stock behind the pipeline's back, as a concurrent upload would.
    pub fn overwrite_stock(&self, line: InventoryLineId, stock_level: i64) {
        self.state.lock().stock.insert(line, stock_level);
    }
}

impl MemoryState {
    fn check_lookup(&self) -> Result<(), StoreError> {
        if self.fail_lookups {
            return Err(StoreError::Backend("lookup failed".into()));
        }
        Ok(())
    }

    fn check_write(&self, w: &StockWrite) -> Result<(), StoreError> {
        if self.failing_lines.contains(&w.line) {
            return Err(StoreError::Backend(format!(
                "write rejected for inventory line {}",
                w.line.0
            )));
        }
        match self.stock.get(&w.line) {
            None => Err(StoreError::NotFound(format!("inventory line {}", w.line.0))),
            Some(current) if *current != w.expected => {
                Err(StoreError::Conflict { line: w.line.0 })
            }
            Some(_) => Ok(()),
        }
    }
}

impl InventoryStore for MemoryStore {
    fn find_location(&self, site_code: &str) -> Result<Option<LocationId>, StoreError> {
        let st = self.state.lock();
        st.check_lookup()?;
        Ok(st.locations.get(site_code).copied())
    }

    fn find_product(&self, upc: &str) -> Result<Option<ProductId>, StoreError> {
        let st = self.state.lock();
        st.check_lookup()?;
        Ok(st.products.get(upc).map(|p| p.id))
    }

    fn find_inventory_line(
        &self,
        location: LocationId,
        product: ProductId,
    ) -> Result<Option<InventoryLine>, StoreError> {
        let st = self.state.lock();
        st.check_lookup()?;
        Ok(st.lines.get(&(location, product)).and_then(|id| {
            st.stock.get(id).map(|stock_level| InventoryLine {
                id: *id,
                stock_level: *stock_level,
            })
        }))
    }

    fn set_stock(
        &self,
        line: InventoryLineId,
        expected: i64,
        new_stock: i64,
    ) -> Result<(), StoreError> {
        let mut st = self.state.lock();
        let write = StockWrite {
            line,
            expected,
            new_stock,
        };
        st.check_write(&write)?;
        st.stock.insert(line, new_stock);
        Ok(())
    }

    fn set_stock_batch(&self, writes: &[StockWrite]) -> Result<(), StoreError> {
        let mut st = self.state.lock();
        for w in writes {
            st.check_write(w)?;
        }
        for w in writes {
            st.stock.insert(w.line, w.new_stock);
        }
        Ok(())
    }

    fn upsert_products(&self, records: &[ProductRecord]) -> Result<(), StoreError> {
        let mut st = self.state.lock();
        for r in records {
            match st.products.get_mut(&r.upc) {
                Some(existing) => {
                    if r.product_name.is_some() {
                        existing.name = r.product_name.clone();
                    }
                    existing.unit_price_cents = Some(r.unit_price_cents);
                }
                None => {
                    let id = ProductId(st.next());
                    st.products.insert(
                        r.upc.clone(),
                        StoredProduct {
                            id,
                            upc: r.upc.clone(),
                            name: r.product_name.clone(),
                            unit_price_cents: Some(r.unit_price_cents),
                        },
                    );
                }
            }
        }
        Ok(())
    }
}
