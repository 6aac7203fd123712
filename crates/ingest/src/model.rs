use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::ser::{SerializeMap, SerializeStruct};
use serde::{Deserialize, Serialize, Serializer};

// ---------------------------------------------------------------------------
// Canonical fields
// ---------------------------------------------------------------------------

/// Logical columns every vendor format is mapped onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CanonicalField {
    SiteCode,
    Upc,
    ProductName,
    SaleDate,
    UnitPrice,
    FinalTotal,
    Quantity,
}

impl CanonicalField {
    pub const ALL: [CanonicalField; 7] = [
        Self::SiteCode,
        Self::Upc,
        Self::ProductName,
        Self::SaleDate,
        Self::UnitPrice,
        Self::FinalTotal,
        Self::Quantity,
    ];

    /// Fields every row must carry, in reporting order.
    pub const MANDATORY: [CanonicalField; 5] = [
        Self::SiteCode,
        Self::Upc,
        Self::SaleDate,
        Self::UnitPrice,
        Self::FinalTotal,
    ];

    /// Fields whose absence from the header row rejects the whole file.
    pub const IDENTITY: [CanonicalField; 2] = [Self::SiteCode, Self::Upc];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SiteCode => "site_code",
            Self::Upc => "upc",
            Self::ProductName => "product_name",
            Self::SaleDate => "sale_date",
            Self::UnitPrice => "unit_price",
            Self::FinalTotal => "final_total",
            Self::Quantity => "quantity",
        }
    }
}

impl std::fmt::Display for CanonicalField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// One CSV record as read, keyed by the verbatim header names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRow {
    /// Line of the record in the source file (header is line 1).
    pub line: u64,
    pub fields: Vec<(String, String)>,
}

impl RawRow {
    pub fn new(line: u64, fields: Vec<(String, String)>) -> Self {
        Self { line, fields }
    }

    /// Build a row from parallel header/value slices.
    pub fn from_record<'a>(
        line: u64,
        headers: &[String],
        values: impl IntoIterator<Item = &'a str>,
    ) -> Self {
        let fields = headers
            .iter()
            .cloned()
            .zip(values.into_iter().map(str::to_string))
            .collect();
        Self { line, fields }
    }

    /// Value of the first column with this exact header name.
    pub fn get(&self, header: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(h, _)| h == header)
            .map(|(_, v)| v.as_str())
    }
}

struct OrderedFields<'a>(&'a [(String, String)]);

impl Serialize for OrderedFields<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (k, v) in self.0 {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

impl Serialize for RawRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("RawRow", 2)?;
        s.serialize_field("line", &self.line)?;
        s.serialize_field("fields", &OrderedFields(&self.fields))?;
        s.end()
    }
}

/// Canonical field → original header text. Built once per file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct HeaderMapping {
    columns: BTreeMap<CanonicalField, String>,
}

impl HeaderMapping {
    pub fn from_pairs(pairs: impl IntoIterator<Item = (CanonicalField, String)>) -> Self {
        Self {
            columns: pairs.into_iter().collect(),
        }
    }

    pub fn get(&self, field: CanonicalField) -> Option<&str> {
        self.columns.get(&field).map(String::as_str)
    }

    pub fn is_mapped(&self, field: CanonicalField) -> bool {
        self.columns.contains_key(&field)
    }

    pub fn iter(&self) -> impl Iterator<Item = (CanonicalField, &str)> {
        self.columns.iter().map(|(f, h)| (*f, h.as_str()))
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Identity fields that have no header.
    pub fn missing_identity(&self) -> Vec<CanonicalField> {
        CanonicalField::IDENTITY
            .into_iter()
            .filter(|f| !self.is_mapped(*f))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Normalization
// ---------------------------------------------------------------------------

/// A fully validated sale. Amounts are in cents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NormalizedSale {
    pub line: u64,
    pub site_code: String,
    pub upc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_name: Option<String>,
    pub sale_date: NaiveDate,
    pub unit_price_cents: i64,
    pub final_total_cents: i64,
    pub quantity: u64,
}

impl NormalizedSale {
    pub fn key(&self) -> AggregateKey {
        AggregateKey {
            site_code: self.site_code.clone(),
            upc: self.upc.clone(),
        }
    }
}

/// A row that failed validation, with every reason found.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RejectedRow {
    pub line: u64,
    pub original_row: RawRow,
    pub reasons: Vec<String>,
}

// ---------------------------------------------------------------------------
// Aggregation
// ---------------------------------------------------------------------------

/// Aggregate key = (site_code, upc).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct AggregateKey {
    pub site_code: String,
    pub upc: String,
}

impl AggregateKey {
    pub fn new(site_code: impl Into<String>, upc: impl Into<String>) -> Self {
        Self {
            site_code: site_code.into(),
            upc: upc.into(),
        }
    }
}

impl std::fmt::Display for AggregateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.site_code, self.upc)
    }
}

/// Sales sharing the same (site_code, upc) within one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SalesAggregate {
    pub key: AggregateKey,
    pub quantity: u64,
    pub row_count: usize,
    pub revenue_cents: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_name: Option<String>,
    pub first_sale_date: NaiveDate,
    pub last_sale_date: NaiveDate,
}

// ---------------------------------------------------------------------------
// Reconciliation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ReconciliationOutcome {
    Updated {
        previous_stock: i64,
        new_stock: i64,
        /// Units sold beyond the recorded stock.
        shortfall: u64,
    },
    LocationNotFound,
    ProductNotFound,
    InventoryLineNotFound,
    StoreError {
        message: String,
    },
}

impl ReconciliationOutcome {
    pub fn is_updated(&self) -> bool {
        matches!(self, Self::Updated { .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Updated { .. } => "updated",
            Self::LocationNotFound => "location_not_found",
            Self::ProductNotFound => "product_not_found",
            Self::InventoryLineNotFound => "inventory_line_not_found",
            Self::StoreError { .. } => "store_error",
        }
    }
}

impl std::fmt::Display for ReconciliationOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Updated {
                previous_stock,
                new_stock,
                ..
            } => write!(f, "updated {previous_stock} -> {new_stock}"),
            Self::StoreError { message } => write!(f, "store error: {message}"),
            other => f.write_str(other.label()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AggregateOutcome {
    pub key: AggregateKey,
    pub quantity: u64,
    pub outcome: ReconciliationOutcome,
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

/// Product attributes written by a catalog upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductRecord {
    pub upc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_name: Option<String>,
    pub unit_price_cents: i64,
    pub last_sale_date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogSummary {
    pub on_duplicate: crate::config::OnDuplicate,
    pub products_total: usize,
    pub written: usize,
    /// UPCs that already existed in the store.
    pub duplicates: Vec<String>,
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReportSummary {
    pub rows_total: usize,
    pub rows_accepted: usize,
    pub rows_rejected: usize,
    pub aggregates_total: usize,
    pub updated: usize,
    pub location_not_found: usize,
    pub product_not_found: usize,
    pub inventory_line_not_found: usize,
    pub store_errors: usize,
    /// Units across all accepted rows.
    pub units_sold: u64,
    /// Units actually removed from stock (after the zero floor).
    pub units_applied: u64,
    pub shortfall: u64,
    pub revenue_cents: i64,
    pub rolled_back: bool,
}

impl ReportSummary {
    /// Aggregates that did not reach an `Updated` outcome.
    pub fn skipped(&self) -> usize {
        self.aggregates_total - self.updated
    }

    pub fn is_clean(&self) -> bool {
        self.rows_rejected == 0 && self.skipped() == 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportMeta {
    pub engine_version: String,
    pub run_at: String,
    pub mode: crate::config::IngestMode,
    /// SHA-256 of the uploaded bytes.
    pub file_digest: String,
    pub delimiter: char,
}

/// The pipeline's only return value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestionReport {
    pub meta: ReportMeta,
    pub header_mapping: HeaderMapping,
    pub summary: ReportSummary,
    pub rejected: Vec<RejectedRow>,
    pub outcomes: Vec<AggregateOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub catalog: Option<CatalogSummary>,
}
