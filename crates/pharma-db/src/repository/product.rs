//! # Product Repository
//!
//! Database operations for the catalog.
//!
//! ## Key Operations
//! - CRUD with optimistic versioning
//! - POS search on name or barcode
//! - Catalog import upserts
//!
//! ## Stock Is Not Edited Here
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  insert(stock = 20)  → product row + adjustment movement (0 → 20)       │
//! │  update(...)         → every field except current_stock                 │
//! │  upsert_record(...)  → stock taken from the file, logged if it changed  │
//! │                                                                         │
//! │  Any other stock change goes through StockRepository or a sale.         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use pharma_core::catalog::ProductRecord;
use pharma_core::validation::validate_search_query;
use pharma_core::{CoreError, Product, ProductInput};
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::{debug, info};

use super::stock::{correction, insert_movement};
use super::{generate_id, like_pattern};
use crate::error::{DbError, DbResult};

/// Expands to a product `SELECT` followed by the given clause.
macro_rules! select_products {
    ($tail:literal) => {
        concat!(
            "SELECT id, name, dci, therapeutic_class, cost_price_cents, selling_price_cents, ",
            "current_stock, minimum_stock_level, is_active, barcode, created_at, updated_at, version ",
            "FROM products ",
            $tail
        )
    };
}

const INITIAL_STOCK_REASON: &str = "Initial stock";
const IMPORT_REASON: &str = "Catalog import";

/// Whether an import row created a product or updated an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UpsertOutcome {
    Created,
    Updated,
}

/// Repository for product database operations.
///
/// ```rust,ignore
/// let repo = db.products();
/// let hits = repo.search("dolip", POS_SEARCH_LIMIT).await?;
/// let product = repo.get_by_id(&id).await?;
/// ```
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Active products whose name or barcode contains `query`, by name.
    ///
    /// Case-insensitive for ASCII. A blank query returns nothing.
    pub async fn search(&self, query: &str, limit: i64) -> DbResult<Vec<Product>> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }
        validate_search_query(query).map_err(CoreError::from)?;

        debug!(query = %query, limit, "Searching products");

        let pattern = like_pattern(query);
        let products = sqlx::query_as::<_, Product>(select_products!(
            r"WHERE is_active = 1
              AND (name LIKE ?1 ESCAPE '\' OR barcode LIKE ?1 ESCAPE '\')
              ORDER BY name
              LIMIT ?2"
        ))
        .bind(pattern)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        debug!(count = products.len(), "Search returned products");
        Ok(products)
    }

    /// Active products, by name.
    pub async fn list_active(&self) -> DbResult<Vec<Product>> {
        let products =
            sqlx::query_as::<_, Product>(select_products!("WHERE is_active = 1 ORDER BY name"))
                .fetch_all(&self.pool)
                .await?;
        Ok(products)
    }

    /// Every product, inactive ones included (catalog export).
    pub async fn list_all(&self) -> DbResult<Vec<Product>> {
        let products = sqlx::query_as::<_, Product>(select_products!("ORDER BY name"))
            .fetch_all(&self.pool)
            .await?;
        Ok(products)
    }

    /// Gets a product by ID, active or not.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(select_products!("WHERE id = ?1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(product)
    }

    /// Exact barcode lookup among active products.
    pub async fn get_by_barcode(&self, barcode: &str) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(select_products!(
            "WHERE barcode = ?1 AND is_active = 1"
        ))
        .bind(barcode.trim())
        .fetch_optional(&self.pool)
        .await?;
        Ok(product)
    }

    /// First product with exactly this name, active or not.
    pub async fn get_by_name(&self, name: &str) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(select_products!(
            "WHERE name = ?1 ORDER BY created_at LIMIT 1"
        ))
        .bind(name.trim())
        .fetch_optional(&self.pool)
        .await?;
        Ok(product)
    }

    /// Creates a product.
    ///
    /// A non-zero initial stock is logged as an adjustment movement in the
    /// same transaction.
    ///
    /// ## Returns
    /// * `Err(DbError::UniqueViolation)` - barcode already used
    pub async fn insert(&self, input: ProductInput, actor: &str) -> DbResult<Product> {
        let input = input.validate().map_err(CoreError::from)?;
        let now = Utc::now();
        let product = input.into_product(generate_id(), now);

        debug!(id = %product.id, name = %product.name, "Inserting product");

        let mut tx = self.pool.begin().await?;
        insert_row(&mut *tx, &product).await?;
        if product.current_stock > 0 {
            let movement = correction(
                &product.id,
                0,
                product.current_stock,
                INITIAL_STOCK_REASON,
                actor,
                now,
            );
            insert_movement(&mut *tx, &movement).await?;
        }
        tx.commit().await?;

        info!(id = %product.id, name = %product.name, "Product created");
        Ok(product)
    }

    /// Updates a product's details. `current_stock` in the input is ignored.
    ///
    /// `expected_version` is the version the client last saw; when omitted
    /// the current version is used.
    ///
    /// ## Returns
    /// * `Err(DbError::NotFound)` - no such product
    /// * `Err(DbError::Conflict)` - the product changed since `expected_version`
    pub async fn update(
        &self,
        id: &str,
        input: ProductInput,
        expected_version: Option<i64>,
    ) -> DbResult<Product> {
        let input = input.validate().map_err(CoreError::from)?;
        let current = self
            .get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("Product", id))?;
        let expected_version = expected_version.unwrap_or(current.version);

        debug!(id = %id, expected_version, "Updating product");

        let updated = sqlx::query_as::<_, Product>(
            r#"
            UPDATE products SET
                name = ?1,
                dci = ?2,
                therapeutic_class = ?3,
                cost_price_cents = ?4,
                selling_price_cents = ?5,
                minimum_stock_level = ?6,
                is_active = ?7,
                barcode = ?8,
                updated_at = ?9,
                version = version + 1
            WHERE id = ?10 AND version = ?11
            RETURNING id, name, dci, therapeutic_class, cost_price_cents, selling_price_cents,
                      current_stock, minimum_stock_level, is_active, barcode,
                      created_at, updated_at, version
            "#,
        )
        .bind(&input.name)
        .bind(&input.dci)
        .bind(input.therapeutic_class)
        .bind(input.cost_price_cents)
        .bind(input.selling_price_cents)
        .bind(input.minimum_stock_level)
        .bind(input.is_active)
        .bind(&input.barcode)
        .bind(Utc::now())
        .bind(id)
        .bind(expected_version)
        .fetch_optional(&self.pool)
        .await?;

        updated.ok_or_else(|| DbError::conflict("Product", id))
    }

    /// Hides a product from the POS and reports. Sales keep referencing it.
    pub async fn soft_delete(&self, id: &str) -> DbResult<()> {
        debug!(id = %id, "Soft-deleting product");

        let result = sqlx::query(
            r#"
            UPDATE products
            SET is_active = 0, updated_at = ?2, version = version + 1
            WHERE id = ?1 AND is_active = 1
            "#,
        )
        .bind(id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        info!(id = %id, "Product deactivated");
        Ok(())
    }

    /// Number of active products.
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE is_active = 1")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Creates or updates a product from a catalog row.
    ///
    /// ## Matching
    /// ```text
    /// row has barcode?  ── yes ──► existing product with that barcode
    ///        │ no
    ///        ▼
    /// existing product with exactly that name
    /// ```
    /// Importing the same file twice yields the same catalog. A stock change
    /// is logged as an adjustment movement.
    pub async fn upsert_record(&self, record: ProductRecord, actor: &str) -> DbResult<UpsertOutcome> {
        let input = record.into_input().validate().map_err(CoreError::from)?;
        let now = Utc::now();

        let mut tx = self.pool.begin().await?;

        let existing = match &input.barcode {
            Some(barcode) => {
                sqlx::query_as::<_, Product>(select_products!("WHERE barcode = ?1"))
                    .bind(barcode)
                    .fetch_optional(&mut *tx)
                    .await?
            }
            None => {
                sqlx::query_as::<_, Product>(select_products!(
                    "WHERE name = ?1 ORDER BY created_at LIMIT 1"
                ))
                .bind(&input.name)
                .fetch_optional(&mut *tx)
                .await?
            }
        };

        let outcome = match existing {
            None => {
                let product = input.into_product(generate_id(), now);
                insert_row(&mut *tx, &product).await?;
                if product.current_stock > 0 {
                    let movement =
                        correction(&product.id, 0, product.current_stock, IMPORT_REASON, actor, now);
                    insert_movement(&mut *tx, &movement).await?;
                }
                UpsertOutcome::Created
            }
            Some(current) => {
                sqlx::query(
                    r#"
                    UPDATE products SET
                        name = ?1,
                        dci = ?2,
                        therapeutic_class = ?3,
                        cost_price_cents = ?4,
                        selling_price_cents = ?5,
                        current_stock = ?6,
                        minimum_stock_level = ?7,
                        is_active = ?8,
                        barcode = ?9,
                        updated_at = ?10,
                        version = version + 1
                    WHERE id = ?11
                    "#,
                )
                .bind(&input.name)
                .bind(&input.dci)
                .bind(input.therapeutic_class)
                .bind(input.cost_price_cents)
                .bind(input.selling_price_cents)
                .bind(input.current_stock)
                .bind(input.minimum_stock_level)
                .bind(input.is_active)
                .bind(&input.barcode)
                .bind(now)
                .bind(&current.id)
                .execute(&mut *tx)
                .await?;

                if current.current_stock != input.current_stock {
                    let movement = correction(
                        &current.id,
                        current.current_stock,
                        input.current_stock,
                        IMPORT_REASON,
                        actor,
                        now,
                    );
                    insert_movement(&mut *tx, &movement).await?;
                }
                UpsertOutcome::Updated
            }
        };

        tx.commit().await?;
        Ok(outcome)
    }
}

async fn insert_row(conn: &mut sqlx::SqliteConnection, product: &Product) -> DbResult<()> {
    let result = sqlx::query(
        r#"
        INSERT INTO products (
            id, name, dci, therapeutic_class, cost_price_cents, selling_price_cents,
            current_stock, minimum_stock_level, is_active, barcode,
            created_at, updated_at, version
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
        "#,
    )
    .bind(&product.id)
    .bind(&product.name)
    .bind(&product.dci)
    .bind(product.therapeutic_class)
    .bind(product.cost_price_cents)
    .bind(product.selling_price_cents)
    .bind(product.current_stock)
    .bind(product.minimum_stock_level)
    .bind(product.is_active)
    .bind(&product.barcode)
    .bind(product.created_at)
    .bind(product.updated_at)
    .bind(product.version)
    .execute(conn)
    .await;

    match result {
        Ok(_) => Ok(()),
        Err(e) => match DbError::from(e) {
            DbError::UniqueViolation { field, .. } => {
                Err(DbError::duplicate(field, product.barcode.clone().unwrap_or_default()))
            }
            other => Err(other),
        },
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::{db, input, product, ACTOR};
    use pharma_core::catalog::{parse_catalog, write_catalog};
    use pharma_core::{MovementType, TherapeuticClass};

    #[tokio::test]
    async fn test_insert_and_get() {
        let db = db().await;
        let created = product(&db, "Doliprane 1000mg", 20).await;

        let fetched = db.products().get_by_id(&created.id).await.unwrap().unwrap();
        assert_eq!(fetched.name, "Doliprane 1000mg");
        assert_eq!(fetched.current_stock, 20);
        assert_eq!(fetched.version, 1);

        let by_name = db.products().get_by_name(" Doliprane 1000mg ").await.unwrap().unwrap();
        assert_eq!(by_name.id, created.id);

        // initial stock is on the ledger
        let log = db.stock().movements(&created.id, 10).await.unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].movement_type, MovementType::Adjustment);
        assert_eq!((log[0].previous_stock, log[0].new_stock), (0, 20));
    }

    #[tokio::test]
    async fn test_insert_without_stock_writes_no_movement() {
        let db = db().await;
        let created = product(&db, "Spasfon", 0).await;
        assert!(db.stock().movements(&created.id, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_barcode() {
        let db = db().await;
        let mut a = input("Augmentin", 0);
        a.barcode = Some("3400935000001".to_string());
        db.products().insert(a.clone(), ACTOR).await.unwrap();

        a.name = "Augmentin bis".to_string();
        let err = db.products().insert(a, ACTOR).await.unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));
    }

    #[tokio::test]
    async fn test_search_name_or_barcode() {
        let db = db().await;
        let mut with_code = input("Efferalgan", 5);
        with_code.barcode = Some("3400939999999".to_string());
        db.products().insert(with_code, ACTOR).await.unwrap();
        product(&db, "Dafalgan", 5).await;
        let hidden = product(&db, "Algésal", 5).await;
        db.products().soft_delete(&hidden.id).await.unwrap();

        let hits = db.products().search("ALGAN", 10).await.unwrap();
        let names: Vec<_> = hits.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["Dafalgan", "Efferalgan"]);

        let hits = db.products().search("99999", 10).await.unwrap();
        assert_eq!(hits.len(), 1);

        assert!(db.products().search("  ", 10).await.unwrap().is_empty());
        assert_eq!(db.products().search("a", 1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_barcode_lookup_active_only() {
        let db = db().await;
        let mut i = input("Smecta", 5);
        i.barcode = Some("123".to_string());
        let p = db.products().insert(i, ACTOR).await.unwrap();

        assert!(db.products().get_by_barcode("123").await.unwrap().is_some());
        db.products().soft_delete(&p.id).await.unwrap();
        assert!(db.products().get_by_barcode("123").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_ignores_stock_and_checks_version() {
        let db = db().await;
        let p = product(&db, "Motilium", 8).await;

        let mut changes = input("Motilium 10mg", 999);
        changes.selling_price_cents = 500;
        let updated = db.products().update(&p.id, changes.clone(), Some(1)).await.unwrap();
        assert_eq!(updated.name, "Motilium 10mg");
        assert_eq!(updated.selling_price_cents, 500);
        assert_eq!(updated.current_stock, 8);
        assert_eq!(updated.version, 2);

        let stale = db.products().update(&p.id, changes, Some(1)).await.unwrap_err();
        assert!(matches!(stale, DbError::Conflict { .. }));
    }

    #[tokio::test]
    async fn test_update_unknown_is_not_found() {
        let db = db().await;
        let err = db
            .products()
            .update(&generate_id(), input("X", 0), None)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_soft_delete() {
        let db = db().await;
        let p = product(&db, "Gaviscon", 3).await;
        assert_eq!(db.products().count().await.unwrap(), 1);

        db.products().soft_delete(&p.id).await.unwrap();
        assert_eq!(db.products().count().await.unwrap(), 0);
        assert!(db.products().list_active().await.unwrap().is_empty());
        assert_eq!(db.products().list_all().await.unwrap().len(), 1);

        let again = db.products().soft_delete(&p.id).await.unwrap_err();
        assert!(matches!(again, DbError::NotFound { .. }));
    }

    const CATALOG: &str = "\
ID,Name,DCI,Therapeutic Class,Cost Price,Selling Price,Is Active,Barcode,Current Stock,Minimum Stock Level
,Amoxicilline 500mg,Amoxicilline,antibiotic,2.50,4.00,true,3400930000017,40,10
,Vitamine C 500,,vitamin,1.00,2.25,yes,,12,5
";

    #[tokio::test]
    async fn test_import_is_idempotent() {
        let db = db().await;
        let parsed = parse_catalog(CATALOG.as_bytes()).unwrap();
        assert!(parsed.errors.is_empty());

        for (_, record) in parsed.rows.clone() {
            assert_eq!(
                db.products().upsert_record(record, ACTOR).await.unwrap(),
                UpsertOutcome::Created
            );
        }
        let first = db.products().list_all().await.unwrap();

        for (_, record) in parsed.rows {
            assert_eq!(
                db.products().upsert_record(record, ACTOR).await.unwrap(),
                UpsertOutcome::Updated
            );
        }
        let second = db.products().list_all().await.unwrap();

        assert_eq!(first.len(), 2);
        assert_eq!(second.len(), 2);
        for (a, b) in first.iter().zip(second.iter()) {
            assert_eq!(a.id, b.id);
            assert_eq!(a.current_stock, b.current_stock);
            assert_eq!(a.selling_price_cents, b.selling_price_cents);
        }

        // unchanged stock on re-import writes no extra movement
        let amox = db.products().get_by_barcode("3400930000017").await.unwrap().unwrap();
        assert_eq!(amox.therapeutic_class, TherapeuticClass::Antibiotic);
        assert_eq!(db.stock().movements(&amox.id, 10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_export_then_import_round_trips() {
        let db = db().await;
        let parsed = parse_catalog(CATALOG.as_bytes()).unwrap();
        for (_, record) in parsed.rows {
            db.products().upsert_record(record, ACTOR).await.unwrap();
        }
        let before = db.products().list_all().await.unwrap();

        let exported = write_catalog(&before).unwrap();
        let fresh = crate::repository::test_support::db().await;
        let reparsed = parse_catalog(&exported).unwrap();
        assert!(reparsed.errors.is_empty());
        for (_, record) in reparsed.rows {
            fresh.products().upsert_record(record, ACTOR).await.unwrap();
        }
        let after = fresh.products().list_all().await.unwrap();

        assert_eq!(before.len(), after.len());
        for (a, b) in before.iter().zip(after.iter()) {
            assert_eq!(a.name, b.name);
            assert_eq!(a.dci, b.dci);
            assert_eq!(a.therapeutic_class, b.therapeutic_class);
            assert_eq!(a.cost_price_cents, b.cost_price_cents);
            assert_eq!(a.selling_price_cents, b.selling_price_cents);
            assert_eq!(a.is_active, b.is_active);
            assert_eq!(a.barcode, b.barcode);
            assert_eq!(a.current_stock, b.current_stock);
            assert_eq!(a.minimum_stock_level, b.minimum_stock_level);
        }
    }

    #[tokio::test]
    async fn test_import_logs_stock_change() {
        let db = db().await;
        let p = product(&db, "Vitamine C 500", 3).await;

        let parsed = parse_catalog(CATALOG.as_bytes()).unwrap();
        let (_, vit_c) = parsed.rows.into_iter().nth(1).unwrap();
        db.products().upsert_record(vit_c, ACTOR).await.unwrap();

        let stored = db.products().get_by_id(&p.id).await.unwrap().unwrap();
        assert_eq!(stored.current_stock, 12);
        let log = db.stock().movements(&p.id, 10).await.unwrap();
        assert_eq!(log[0].quantity, 9);
        assert_eq!(log[0].reason.as_deref(), Some(IMPORT_REASON));
    }
}
