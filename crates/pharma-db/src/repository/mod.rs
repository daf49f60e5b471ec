//! # Repository Module
//!
//! Database repository implementations for Pharma POS.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository Layout                                    │
//! │                                                                         │
//! │  HTTP handler                                                           │
//! │       │  db.sales().complete_sale(draft, actor)                         │
//! │       ▼                                                                 │
//! │  ┌───────────────┬───────────────┬───────────────┬───────────────┐      │
//! │  │ ProductRepo   │ StockRepo     │ SaleRepo      │ BatchRepo     │      │
//! │  │ catalog CRUD  │ receive       │ complete_sale │ expiry alerts │      │
//! │  │ search        │ adjust        │ history       │ counts        │      │
//! │  │ import upsert │ movements     │ credit ledger │               │      │
//! │  └───────────────┴───────┬───────┴───────────────┴───────────────┘      │
//! │                          │ every stock change writes one movement       │
//! │                          ▼ in the same transaction                      │
//! │                   stock_movements                                       │
//! │                                                                         │
//! │  AnalyticsRepo: read-only fact rows for pharma-core report builders     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod analytics;
pub mod batch;
pub mod product;
pub mod sale;
pub mod stock;

use uuid::Uuid;

/// Generates a new row ID (UUID v4).
pub fn generate_id() -> String {
    Uuid::new_v4().to_string()
}

/// Escapes `%`, `_` and `\` for a `LIKE ... ESCAPE '\'` pattern.
pub(crate) fn like_pattern(needle: &str) -> String {
    let mut escaped = String::with_capacity(needle.len() + 2);
    escaped.push('%');
    for c in needle.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("dol"), "%dol%");
        assert_eq!(like_pattern("50%_x"), "%50\\%\\_x%");
    }
}
