use serde::{Deserialize, Serialize};

use crate::error::IngestError;
use crate::model::CanonicalField;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IngestConfig {
    pub mode: IngestMode,
    pub header_strategy: HeaderStrategy,
    pub commit_policy: CommitPolicy,
    pub on_duplicate: OnDuplicate,
    /// Size of the worker pool used for normalization and reconciliation.
    pub workers: usize,
    /// Field delimiter. Sniffed from the file when unset.
    pub delimiter: Option<char>,
    /// Prefixes removed from site codes (first match only).
    pub site_code_strip_prefixes: Vec<String>,
    pub keywords: KeywordConfig,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            mode: IngestMode::default(),
            header_strategy: HeaderStrategy::default(),
            commit_policy: CommitPolicy::default(),
            on_duplicate: OnDuplicate::default(),
            workers: 4,
            delimiter: None,
            site_code_strip_prefixes: vec!["2.0_".into()],
            keywords: KeywordConfig::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Policies
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestMode {
    /// Decrement stock for every (site, product) sold.
    #[default]
    Reconcile,
    /// Upsert the products seen in the file into the catalog.
    Catalog,
}

impl std::fmt::Display for IngestMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Reconcile => write!(f, "reconcile"),
            Self::Catalog => write!(f, "catalog"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeaderStrategy {
    /// Each header feeds at most one field; most specific keyword wins.
    #[default]
    Exclusive,
    /// First keyword, first column. Fields may share a header.
    FirstMatch,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitPolicy {
    #[default]
    PerAggregate,
    AllOrNothing,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnDuplicate {
    #[default]
    Reject,
    Skip,
    Overwrite,
}

impl std::fmt::Display for OnDuplicate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Reject => write!(f, "reject"),
            Self::Skip => write!(f, "skip"),
            Self::Overwrite => write!(f, "overwrite"),
        }
    }
}

// ---------------------------------------------------------------------------
// Keywords
// ---------------------------------------------------------------------------

/// Candidate header keywords per canonical field, highest priority first.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct KeywordConfig {
    pub site_code: Vec<String>,
    pub upc: Vec<String>,
    pub product_name: Vec<String>,
    pub sale_date: Vec<String>,
    pub unit_price: Vec<String>,
    pub final_total: Vec<String>,
    pub quantity: Vec<String>,
}

fn words(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

impl Default for KeywordConfig {
    fn default() -> Self {
        Self {
            site_code: words(&["location_id", "site_code", "location", "machine_name"]),
            upc: words(&["upc", "scancode", "barcode", "product_code"]),
            product_name: words(&["product_name", "item_name", "product", "item", "description"]),
            sale_date: words(&["sale_date", "transaction_date", "date"]),
            unit_price: words(&["unit_price", "item_price", "price"]),
            final_total: words(&["final_total", "line_total", "total", "amount"]),
            quantity: words(&["quantity", "qty"]),
        }
    }
}

impl KeywordConfig {
    pub fn for_field(&self, field: CanonicalField) -> &[String] {
        match field {
            CanonicalField::SiteCode => &self.site_code,
            CanonicalField::Upc => &self.upc,
            CanonicalField::ProductName => &self.product_name,
            CanonicalField::SaleDate => &self.sale_date,
            CanonicalField::UnitPrice => &self.unit_price,
            CanonicalField::FinalTotal => &self.final_total,
            CanonicalField::Quantity => &self.quantity,
        }
    }
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl IngestConfig {
    pub fn from_toml(input: &str) -> Result<Self, IngestError> {
        let config: IngestConfig =
            toml::from_str(input).map_err(|e| IngestError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), IngestError> {
        if self.workers == 0 {
            return Err(IngestError::ConfigValidation(
                "workers must be at least 1".into(),
            ));
        }

        if let Some(d) = self.delimiter {
            if !d.is_ascii() || d == '"' || d == '\n' || d == '\r' {
                return Err(IngestError::ConfigValidation(format!(
                    "delimiter must be a single ASCII character other than quote or newline, got {d:?}"
                )));
            }
        }

        // Optional fields may be switched off with an empty list; identity
        // and mandatory fields may not.
        for field in CanonicalField::MANDATORY {
            let list = self.keywords.for_field(field);
            if list.is_empty() {
                return Err(IngestError::ConfigValidation(format!(
                    "keywords.{field} must not be empty"
                )));
            }
        }

        for field in CanonicalField::ALL {
            if self.keywords.for_field(field).iter().any(|k| k.trim().is_empty()) {
                return Err(IngestError::ConfigValidation(format!(
                    "keywords.{field} contains a blank keyword"
                )));
            }
        }

        if self.site_code_strip_prefixes.iter().any(|p| p.is_empty()) {
            return Err(IngestError::ConfigValidation(
                "site_code_strip_prefixes must not contain an empty prefix".into(),
            ));
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let config = IngestConfig::from_toml("").unwrap();
        assert_eq!(config.mode, IngestMode::Reconcile);
        assert_eq!(config.header_strategy, HeaderStrategy::Exclusive);
        assert_eq!(config.commit_policy, CommitPolicy::PerAggregate);
        assert_eq!(config.on_duplicate, OnDuplicate::Reject);
        assert_eq!(config.workers, 4);
        assert_eq!(config.delimiter, None);
        assert_eq!(config.site_code_strip_prefixes, vec!["2.0_"]);
        assert_eq!(config.keywords.upc[0], "upc");
    }

    #[test]
    fn parse_full_config() {
        let input = r#"
mode = "catalog"
header_strategy = "first_match"
commit_policy = "all_or_nothing"
on_duplicate = "overwrite"
workers = 2
delimiter = ";"
site_code_strip_prefixes = ["3.1_", "2.0_"]

[keywords]
upc = ["ean", "upc"]
"#;
        let config = IngestConfig::from_toml(input).unwrap();
        assert_eq!(config.mode, IngestMode::Catalog);
        assert_eq!(config.header_strategy, HeaderStrategy::FirstMatch);
        assert_eq!(config.commit_policy, CommitPolicy::AllOrNothing);
        assert_eq!(config.on_duplicate, OnDuplicate::Overwrite);
        assert_eq!(config.workers, 2);
        assert_eq!(config.delimiter, Some(';'));
        assert_eq!(config.keywords.upc, vec!["ean", "upc"]);
        // Untouched keyword lists keep their defaults
        assert_eq!(config.keywords.site_code[0], "location_id");
    }

    #[test]
    fn reject_zero_workers() {
        let err = IngestConfig::from_toml("workers = 0").unwrap_err();
        assert!(err.to_string().contains("workers must be at least 1"));
    }

    #[test]
    fn reject_empty_mandatory_keywords() {
        let err = IngestConfig::from_toml("[keywords]\nsale_date = []").unwrap_err();
        assert!(err.to_string().contains("keywords.sale_date"));
    }

    #[test]
    fn optional_keywords_may_be_disabled() {
        let config = IngestConfig::from_toml("[keywords]\nquantity = []").unwrap();
        assert!(config.keywords.quantity.is_empty());
    }

    #[test]
    fn reject_unknown_policy() {
        let err = IngestConfig::from_toml(r#"on_duplicate = "ignore""#).unwrap_err();
        assert!(matches!(err, IngestError::ConfigParse(_)));
    }

    #[test]
    fn reject_unknown_key() {
        let err = IngestConfig::from_toml("worker = 3").unwrap_err();
        assert!(matches!(err, IngestError::ConfigParse(_)));
    }

    #[test]
    fn reject_quote_delimiter() {
        let err = IngestConfig::from_toml(r#"delimiter = "\"""#).unwrap_err();
        assert!(err.to_string().contains("delimiter"));
    }
}
