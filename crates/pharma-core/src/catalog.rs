//! # Catalog Import / Export
//!
//! CSV codec for bulk catalog maintenance from a spreadsheet.
//!
//! ## Columns
//! ```text
//! ID | Name | DCI | Therapeutic Class | Cost Price | Selling Price |
//! Is Active | Barcode | Current Stock | Minimum Stock Level
//! ```
//!
//! ## Import Pipeline
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  uploaded bytes                                                         │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  parse_catalog()  ← THIS MODULE                                         │
//! │       │    each row validated on its own; a bad row never stops the     │
//! │       │    rest of the file                                             │
//! │       ▼                                                                 │
//! │  CatalogParse { rows: [(row, ProductRecord)], errors: [RowError] }      │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ProductRepository::upsert_record()  (barcode, else name)               │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ImportSummary { imported, errors } → first 10 messages                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Money columns are decimals (`12.50`); the therapeutic class is written
//! as its code so an export can be re-imported unchanged.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;

use crate::money::Money;
use crate::types::{Product, ProductInput, TherapeuticClass};
use crate::validation::{validate_barcode, validate_product_name};
use crate::DEFAULT_MINIMUM_STOCK_LEVEL;

/// Header row, in export order.
pub const CATALOG_COLUMNS: [&str; 10] = [
    "ID",
    "Name",
    "DCI",
    "Therapeutic Class",
    "Cost Price",
    "Selling Price",
    "Is Active",
    "Barcode",
    "Current Stock",
    "Minimum Stock Level",
];

/// How many row errors an import summary spells out.
pub const MAX_REPORTED_ERRORS: usize = 10;

/// File-level catalog failures (row problems are [`RowError`]s).
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Missing required column: {0}")]
    MissingColumn(String),
}

// =============================================================================
// Records
// =============================================================================

/// One successfully parsed catalog row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductRecord {
    /// Informational; imports match on barcode, then name.
    pub id: Option<String>,
    pub name: String,
    pub dci: Option<String>,
    pub therapeutic_class: TherapeuticClass,
    pub cost_price: Money,
    pub selling_price: Money,
    pub is_active: bool,
    pub barcode: Option<String>,
    pub current_stock: i64,
    pub minimum_stock_level: i64,
}

impl ProductRecord {
    pub fn into_input(self) -> ProductInput {
        ProductInput {
            name: self.name,
            dci: self.dci,
            therapeutic_class: self.therapeutic_class,
            cost_price_cents: self.cost_price.cents(),
            selling_price_cents: self.selling_price.cents(),
            current_stock: self.current_stock,
            minimum_stock_level: self.minimum_stock_level,
            is_active: self.is_active,
            barcode: self.barcode,
        }
    }
}

/// Every problem found on one row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct RowError {
    /// Spreadsheet row number (the header is row 1).
    pub row: usize,
    pub errors: Vec<String>,
}

impl RowError {
    pub fn message(&self) -> String {
        format!("Row {}: {}", self.row, self.errors.join(", "))
    }
}

/// Result of parsing a whole file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogParse {
    pub rows: Vec<(usize, ProductRecord)>,
    pub errors: Vec<RowError>,
}

// =============================================================================
// Parsing
// =============================================================================

struct Columns {
    index: [Option<usize>; 10],
}

impl Columns {
    fn from_headers(headers: &csv::StringRecord) -> Result<Self, CatalogError> {
        let mut index = [None; 10];
        for (slot, name) in index.iter_mut().zip(CATALOG_COLUMNS) {
            *slot = headers.iter().position(|h| h.trim().eq_ignore_ascii_case(name));
        }
        if index[1].is_none() {
            return Err(CatalogError::MissingColumn("Name".to_string()));
        }
        Ok(Columns { index })
    }

    fn get<'r>(&self, record: &'r csv::StringRecord, column: usize) -> &'r str {
        self.index[column]
            .and_then(|i| record.get(i))
            .map(str::trim)
            .unwrap_or("")
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "y" | "oui" | "vrai" => Some(true),
        "false" | "0" | "no" | "n" | "non" | "faux" => Some(false),
        _ => None,
    }
}

fn parse_count(value: &str, default: i64, label: &str, errors: &mut Vec<String>) -> i64 {
    if value.is_empty() {
        return default;
    }
    // spreadsheets like to write whole numbers as "12.0"
    let trimmed = value.strip_suffix(".0").unwrap_or(value);
    match trimmed.parse::<i64>() {
        Ok(n) if n >= 0 => n,
        Ok(_) => {
            errors.push(format!("{} must not be negative", label));
            default
        }
        Err(_) => {
            errors.push(format!("Invalid {}", label.to_lowercase()));
            default
        }
    }
}

fn parse_price(value: &str, label: &str, errors: &mut Vec<String>) -> Money {
    if value.is_empty() {
        return Money::zero();
    }
    match Money::parse_decimal(value) {
        Ok(m) if !m.is_negative() => m,
        Ok(_) => {
            errors.push(format!("{} must not be negative", label));
            Money::zero()
        }
        Err(_) => {
            errors.push(format!("Invalid {}", label.to_lowercase()));
            Money::zero()
        }
    }
}

fn parse_row(columns: &Columns, record: &csv::StringRecord) -> Result<ProductRecord, Vec<String>> {
    let mut errors = Vec::new();

    let name = columns.get(record, 1).to_string();
    if name.is_empty() {
        errors.push("Name is required".to_string());
    } else if let Err(e) = validate_product_name(&name) {
        errors.push(e.to_string());
    }

    let therapeutic_class = match columns.get(record, 3) {
        "" => TherapeuticClass::Other,
        raw => raw.parse().unwrap_or_else(|_| {
            errors.push("Invalid therapeutic class".to_string());
            TherapeuticClass::Other
        }),
    };

    let cost_price = parse_price(columns.get(record, 4), "Cost price", &mut errors);
    let selling_price = parse_price(columns.get(record, 5), "Selling price", &mut errors);

    let is_active = match columns.get(record, 6) {
        "" => true,
        raw => parse_bool(raw).unwrap_or_else(|| {
            errors.push("Invalid active flag".to_string());
            true
        }),
    };

    let barcode = match columns.get(record, 7) {
        "" => None,
        raw => {
            if let Err(e) = validate_barcode(raw) {
                errors.push(e.to_string());
            }
            Some(raw.to_string())
        }
    };

    let current_stock = parse_count(columns.get(record, 8), 0, "Current stock", &mut errors);
    let minimum_stock_level = parse_count(
        columns.get(record, 9),
        DEFAULT_MINIMUM_STOCK_LEVEL,
        "Minimum stock level",
        &mut errors,
    );

    if !errors.is_empty() {
        return Err(errors);
    }

    let optional = |column: usize| {
        let v = columns.get(record, column);
        (!v.is_empty()).then(|| v.to_string())
    };

    Ok(ProductRecord {
        id: optional(0),
        name,
        dci: optional(2),
        therapeutic_class,
        cost_price,
        selling_price,
        is_active,
        barcode,
        current_stock,
        minimum_stock_level,
    })
}

/// Parses an uploaded catalog.
///
/// Columns are matched by header name (case-insensitive); only `Name` is
/// mandatory. Blank lines are skipped. A leading UTF-8 BOM is ignored.
pub fn parse_catalog(bytes: &[u8]) -> Result<CatalogParse, CatalogError> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(bytes);

    let columns = Columns::from_headers(reader.headers()?)?;
    let mut parsed = CatalogParse::default();

    for (i, record) in reader.records().enumerate() {
        let row = i + 2;
        let record = match record {
            Ok(r) => r,
            Err(e) => {
                parsed.errors.push(RowError {
                    row,
                    errors: vec![format!("Unreadable row: {}", e)],
                });
                continue;
            }
        };
        if record.iter().all(|field| field.trim().is_empty()) {
            continue;
        }

        match parse_row(&columns, &record) {
            Ok(product) => parsed.rows.push((row, product)),
            Err(errors) => parsed.errors.push(RowError { row, errors }),
        }
    }

    Ok(parsed)
}

// =============================================================================
// Writing
// =============================================================================

fn write_rows(rows: impl IntoIterator<Item = [String; 10]>) -> Result<Vec<u8>, CatalogError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(CATALOG_COLUMNS)?;
    for row in rows {
        writer.write_record(&row)?;
    }
    writer.into_inner().map_err(|e| CatalogError::Io(e.into_error()))
}

fn product_row(p: &Product) -> [String; 10] {
    [
        p.id.clone(),
        p.name.clone(),
        p.dci.clone().unwrap_or_default(),
        p.therapeutic_class.code().to_string(),
        p.cost_price().to_string(),
        p.selling_price().to_string(),
        p.is_active.to_string(),
        p.barcode.clone().unwrap_or_default(),
        p.current_stock.to_string(),
        p.minimum_stock_level.to_string(),
    ]
}

/// Dumps products in the import format.
pub fn write_catalog(products: &[Product]) -> Result<Vec<u8>, CatalogError> {
    write_rows(products.iter().map(product_row))
}

/// Header plus one example row.
pub fn template() -> Result<Vec<u8>, CatalogError> {
    let example = [
        String::new(),
        "Paracétamol 500mg".to_string(),
        "Paracetamol".to_string(),
        TherapeuticClass::Analgesic.code().to_string(),
        "150.00".to_string(),
        "250.00".to_string(),
        "true".to_string(),
        "3400930000001".to_string(),
        "100".to_string(),
        DEFAULT_MINIMUM_STOCK_LEVEL.to_string(),
    ];
    write_rows([example])
}

// =============================================================================
// Import Summary
// =============================================================================

/// Outcome of an import, as returned to the client.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ImportSummary {
    pub imported: usize,
    pub created: usize,
    pub updated: usize,
    pub errors: Vec<RowError>,
}

impl ImportSummary {
    /// First ten row errors, then a count of the rest.
    ///
    /// ## Example
    /// ```rust
    /// use pharma_core::catalog::{ImportSummary, RowError};
    ///
    /// let summary = ImportSummary {
    ///     errors: (2..15).map(|row| RowError { row, errors: vec!["Name is required".into()] }).collect(),
    ///     ..Default::default()
    /// };
    /// let messages = summary.messages();
    /// assert_eq!(messages.len(), 11);
    /// assert_eq!(messages[0], "Row 2: Name is required");
    /// assert_eq!(messages[10], "...and 3 more errors");
    /// ```
    pub fn messages(&self) -> Vec<String> {
        let mut out: Vec<String> = self
            .errors
            .iter()
            .take(MAX_REPORTED_ERRORS)
            .map(RowError::message)
            .collect();
        if self.errors.len() > MAX_REPORTED_ERRORS {
            out.push(format!(
                "...and {} more errors",
                self.errors.len() - MAX_REPORTED_ERRORS
            ));
        }
        out
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    const HEADER: &str = "ID,Name,DCI,Therapeutic Class,Cost Price,Selling Price,Is Active,Barcode,Current Stock,Minimum Stock Level\n";

    #[test]
    fn test_parse_valid_rows_with_defaults() {
        let csv = format!(
            "{}{}{}",
            HEADER,
            ",Amoxicilline 500mg,Amoxicillin,antibiotic,320.5,450,TRUE,3400931111111,20,\n",
            ",Smecta,,,,,,,,\n"
        );
        let parsed = parse_catalog(csv.as_bytes()).unwrap();

        assert!(parsed.errors.is_empty(), "{:?}", parsed.errors);
        assert_eq!(parsed.rows.len(), 2);

        let (row, amox) = &parsed.rows[0];
        assert_eq!(*row, 2);
        assert_eq!(amox.therapeutic_class, TherapeuticClass::Antibiotic);
        assert_eq!(amox.cost_price.cents(), 32050);
        assert_eq!(amox.selling_price.cents(), 45000);
        assert_eq!(amox.minimum_stock_level, 5);
        assert_eq!(amox.barcode.as_deref(), Some("3400931111111"));

        let (_, smecta) = &parsed.rows[1];
        assert_eq!(smecta.therapeutic_class, TherapeuticClass::Other);
        assert!(smecta.is_active);
        assert_eq!(smecta.current_stock, 0);
        assert_eq!(smecta.dci, None);
    }

    #[test]
    fn test_bad_rows_do_not_stop_import() {
        let csv = format!(
            "{}{}{}{}",
            HEADER,
            ",,,,,,,,,\n",                              // blank: skipped
            ",,Ibuprofen,antiinflammatory,abc,10,,,,\n", // no name + bad cost
            ",Vitamine C,,homeopathy,1,2,,,x,\n"          // bad class + bad stock
        );
        let csv = format!("{}{}", csv, ",Doliprane,,analgesic,1,2,,,3,\n");
        let parsed = parse_catalog(csv.as_bytes()).unwrap();

        assert_eq!(parsed.rows.len(), 1);
        assert_eq!(parsed.rows[0].1.name, "Doliprane");
        assert_eq!(parsed.errors.len(), 2);
        assert_eq!(parsed.errors[0].row, 3);
        assert_eq!(
            parsed.errors[0].errors,
            vec!["Name is required".to_string(), "Invalid cost price".to_string()]
        );
        assert_eq!(
            parsed.errors[1].message(),
            "Row 4: Invalid therapeutic class, Invalid current stock"
        );
    }

    #[test]
    fn test_columns_matched_by_header_and_short_rows() {
        let csv = "name,selling price\nBepanthen,12.90\nEosine\n";
        let parsed = parse_catalog(csv.as_bytes()).unwrap();
        assert_eq!(parsed.rows.len(), 2);
        assert_eq!(parsed.rows[0].1.selling_price.cents(), 1290);
        assert_eq!(parsed.rows[1].1.selling_price, Money::zero());
    }

    #[test]
    fn test_missing_name_column() {
        let err = parse_catalog(b"Barcode,Price\n1,2\n").unwrap_err();
        assert!(matches!(err, CatalogError::MissingColumn(_)));
    }

    #[test]
    fn test_export_reimports_identically() {
        let product = ProductInput {
            name: "Augmentin, 1g".to_string(),
            dci: Some("Amoxicillin/clavulanate".to_string()),
            therapeutic_class: TherapeuticClass::Antibiotic,
            cost_price_cents: 1205,
            selling_price_cents: 1890,
            current_stock: 7,
            minimum_stock_level: 3,
            is_active: false,
            barcode: Some("3400932222222".to_string()),
        }
        .into_product("6f1c0f9e-3f7d-4d8e-9a51-1f0c2c8f6f11".to_string(), Utc::now());

        let bytes = write_catalog(std::slice::from_ref(&product)).unwrap();
        let parsed = parse_catalog(&bytes).unwrap();

        assert!(parsed.errors.is_empty());
        let record = parsed.rows[0].1.clone();
        assert_eq!(record.id.as_deref(), Some(product.id.as_str()));
        let input = record.into_input();
        assert_eq!(input.name, product.name);
        assert_eq!(input.dci, product.dci);
        assert_eq!(input.therapeutic_class, product.therapeutic_class);
        assert_eq!(input.cost_price_cents, 1205);
        assert_eq!(input.selling_price_cents, 1890);
        assert!(!input.is_active);
        assert_eq!(input.current_stock, 7);
        assert_eq!(input.minimum_stock_level, 3);
    }

    #[test]
    fn test_template_parses() {
        let bytes = template().unwrap();
        let text = String::from_utf8(bytes.clone()).unwrap();
        assert!(text.starts_with("ID,Name,DCI"));

        let parsed = parse_catalog(&bytes).unwrap();
        assert_eq!(parsed.rows.len(), 1);
        assert_eq!(parsed.rows[0].1.name, "Paracétamol 500mg");
    }

    #[test]
    fn test_bom_is_ignored() {
        let mut bytes = b"\xEF\xBB\xBF".to_vec();
        bytes.extend_from_slice(b"Name\nBiafine\n");
        let parsed = parse_catalog(&bytes).unwrap();
        assert_eq!(parsed.rows[0].1.name, "Biafine");
    }

    #[test]
    fn test_summary_messages_short() {
        let summary = ImportSummary {
            imported: 3,
            created: 2,
            updated: 1,
            errors: vec![RowError {
                row: 5,
                errors: vec!["Name is required".to_string()],
            }],
        };
        assert_eq!(summary.messages(), vec!["Row 5: Name is required".to_string()]);
    }
}
