//! # Product Repository
//!
//! Database operations for products and their sizes.
//!
//! ## Storage Layout
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  products                         product_sizes                        │
//! │  ┌──────────────────────┐         ┌──────────────────────────────────┐ │
//! │  │ id                   │◄────────│ product_id (ON DELETE CASCADE)   │ │
//! │  │ base_price_paise     │         │ size_value  "M" / "UK 9"         │ │
//! │  │ mrp_paise            │         │ display_order                    │ │
//! │  │ gst_rate_bps         │         │ modifier_kind  fixed|percentage| │ │
//! │  │ gst_type             │         │                none              │ │
//! │  │ is_active            │         │ price_paise / modifier_value     │ │
//! │  └──────────────────────┘         └──────────────────────────────────┘ │
//! │                                                                         │
//! │  Product.sizes is always returned in display_order.                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use bazaar_core::money::Money;
use bazaar_core::types::{GstRate, GstType, PriceModifier, PriceModifierKind, Product, Size, SizeType};
use bazaar_core::validation::validate_product;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, SqlitePool};
use std::str::FromStr;
use tracing::debug;

use crate::error::{DbError, DbResult};

// =============================================================================
// Row Mapping
// =============================================================================

#[derive(Debug, FromRow)]
struct ProductRow {
    id: String,
    name: String,
    base_price_paise: i64,
    mrp_paise: Option<i64>,
    gst_rate_bps: i64,
    gst_type: GstType,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ProductRow {
    fn into_product(self, sizes: Vec<Size>) -> DbResult<Product> {
        let gst_rate = u32::try_from(self.gst_rate_bps).map_err(|_| DbError::CorruptRow {
            entity: "Product".to_string(),
            id: self.id.clone(),
            reason: format!("gst_rate_bps {} out of range", self.gst_rate_bps),
        })?;

        Ok(Product {
            id: self.id,
            name: self.name,
            base_price: Money::from_paise(self.base_price_paise),
            mrp: self.mrp_paise.map(Money::from_paise),
            gst_rate: GstRate::from_bps(gst_rate),
            gst_type: self.gst_type,
            sizes,
            is_active: self.is_active,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct SizeRow {
    id: String,
    product_id: String,
    size_type: SizeType,
    size_value: String,
    display_order: i64,
    is_available: bool,
    modifier_kind: PriceModifierKind,
    price_paise: Option<i64>,
    modifier_value: Option<String>,
    mrp_paise: Option<i64>,
}

impl SizeRow {
    fn into_size(self) -> DbResult<Size> {
        let value = self
            .modifier_value
            .as_deref()
            .map(Decimal::from_str)
            .transpose()
            .map_err(|e| DbError::CorruptRow {
                entity: "Size".to_string(),
                id: self.id.clone(),
                reason: format!("modifier_value: {}", e),
            })?;

        let price_modifier = PriceModifier::from_parts(
            self.modifier_kind,
            self.price_paise.map(Money::from_paise),
            value,
        )
        .map_err(|e| DbError::corrupt("Size", &self.id, e))?;

        Ok(Size {
            id: self.id,
            product_id: self.product_id,
            size_type: self.size_type,
            size_value: self.size_value,
            display_order: self.display_order,
            is_available: self.is_available,
            price_modifier,
            mrp: self.mrp_paise.map(Money::from_paise),
        })
    }
}

/// Column values for a modifier: (price_paise, modifier_value).
fn modifier_columns(modifier: &PriceModifier) -> (Option<i64>, Option<String>) {
    match modifier {
        PriceModifier::Fixed { price } => (Some(price.paise()), None),
        PriceModifier::Percentage { value } => (None, Some(value.to_string())),
        PriceModifier::None => (None, None),
    }
}

const PRODUCT_COLUMNS: &str = r#"
    id, name, base_price_paise, mrp_paise, gst_rate_bps, gst_type,
    is_active, created_at, updated_at
"#;

// =============================================================================
// Repository
// =============================================================================

/// Repository for product database operations.
///
/// ## Usage
/// ```rust,ignore
/// let repo = db.products();
/// let tee = repo.get_by_id("uuid-here").await?;
/// let catalog = repo.list_active(50).await?;
/// ```
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    /// Creates a new ProductRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Inserts a product together with its sizes in one transaction.
    ///
    /// ## Returns
    /// * `Err(DbError::UniqueViolation)` - two sizes share a label
    pub async fn insert(&self, product: &Product) -> DbResult<Product> {
        validate_product(product)?;
        debug!(id = %product.id, sizes = product.sizes.len(), "Inserting product");

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO products (
                id, name, base_price_paise, mrp_paise, gst_rate_bps, gst_type,
                is_active, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&product.id)
        .bind(&product.name)
        .bind(product.base_price.paise())
        .bind(product.mrp.map(|m| m.paise()))
        .bind(i64::from(product.gst_rate.bps()))
        .bind(product.gst_type)
        .bind(product.is_active)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&mut *tx)
        .await?;

        for size in &product.sizes {
            let (price_paise, modifier_value) = modifier_columns(&size.price_modifier);

            sqlx::query(
                r#"
                INSERT INTO product_sizes (
                    id, product_id, size_type, size_value, display_order,
                    is_available, modifier_kind, price_paise, modifier_value, mrp_paise
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                "#,
            )
            .bind(&size.id)
            .bind(&product.id)
            .bind(size.size_type)
            .bind(&size.size_value)
            .bind(size.display_order)
            .bind(size.is_available)
            .bind(size.price_modifier.kind())
            .bind(price_paise)
            .bind(modifier_value)
            .bind(size.mrp.map(|m| m.paise()))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        let mut stored = product.clone();
        stored.sort_sizes();
        Ok(stored)
    }

    /// Gets a product by its ID, sizes included.
    ///
    /// Inactive products are returned too; historical orders still point
    /// at them.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Product>> {
        let sql = format!("SELECT {} FROM products WHERE id = ?1", PRODUCT_COLUMNS);
        let row: Option<ProductRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let sizes = self.sizes_for(&row.id).await?;
                row.into_product(sizes).map(Some)
            }
            None => Ok(None),
        }
    }

    /// Lists listed products by name.
    pub async fn list_active(&self, limit: u32) -> DbResult<Vec<Product>> {
        let sql = format!(
            "SELECT {} FROM products WHERE is_active = 1 ORDER BY name LIMIT ?1",
            PRODUCT_COLUMNS
        );
        let rows: Vec<ProductRow> = sqlx::query_as(&sql)
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await?;

        let mut products = Vec::with_capacity(rows.len());
        for row in rows {
            let sizes = self.sizes_for(&row.id).await?;
            products.push(row.into_product(sizes)?);
        }

        debug!(count = products.len(), "Listed active products");
        Ok(products)
    }

    /// Lists or delists a product.
    ///
    /// Delisting is how products leave the catalog; rows referenced by
    /// order items cannot be deleted.
    pub async fn set_active(&self, id: &str, active: bool) -> DbResult<()> {
        debug!(id = %id, active, "Setting product listing");

        let result = sqlx::query("UPDATE products SET is_active = ?2, updated_at = ?3 WHERE id = ?1")
            .bind(id)
            .bind(active)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        Ok(())
    }

    /// Physically deletes a product and its sizes.
    ///
    /// ## Returns
    /// * `Err(DbError::ForeignKeyViolation)` - an order item references it
    pub async fn delete(&self, id: &str) -> DbResult<()> {
        debug!(id = %id, "Deleting product");

        let result = sqlx::query("DELETE FROM products WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        Ok(())
    }

    /// Counts listed products (for diagnostics).
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE is_active = 1")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    async fn sizes_for(&self, product_id: &str) -> DbResult<Vec<Size>> {
        let rows: Vec<SizeRow> = sqlx::query_as(
            r#"
            SELECT
                id, product_id, size_type, size_value, display_order,
                is_available, modifier_kind, price_paise, modifier_value, mrp_paise
            FROM product_sizes
            WHERE product_id = ?1
            ORDER BY display_order, size_value
            "#,
        )
        .bind(product_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(SizeRow::into_size).collect()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::generate_id;
    use crate::{Database, DbConfig};

    fn sized_product() -> Product {
        let id = generate_id();
        let now = Utc::now();
        let size = |label: &str, order: i64, modifier: PriceModifier| Size {
            id: generate_id(),
            product_id: id.clone(),
            size_type: SizeType::Clothing,
            size_value: label.to_string(),
            display_order: order,
            is_available: true,
            price_modifier: modifier,
            mrp: None,
        };

        Product {
            id: id.clone(),
            name: "Kurta".to_string(),
            base_price: Money::from_rupees(1000),
            mrp: Some(Money::from_rupees(1500)),
            gst_rate: GstRate::from_bps(1200),
            gst_type: GstType::Inclusive,
            // inserted out of order on purpose
            sizes: vec![
                size("L", 2, PriceModifier::Percentage { value: Decimal::new(125, 1) }),
                size("S", 0, PriceModifier::None),
                size("M", 1, PriceModifier::Fixed { price: Money::from_rupees(1050) }),
            ],
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_insert_and_get_with_sizes() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.products();
        let product = sized_product();

        repo.insert(&product).await.unwrap();
        let loaded = repo.get_by_id(&product.id).await.unwrap().unwrap();

        assert_eq!(loaded.name, "Kurta");
        assert_eq!(loaded.gst_rate.bps(), 1200);
        assert_eq!(loaded.gst_type, GstType::Inclusive);
        assert_eq!(loaded.mrp, Some(Money::from_rupees(1500)));

        let labels: Vec<&str> = loaded.sizes.iter().map(|s| s.size_value.as_str()).collect();
        assert_eq!(labels, vec!["S", "M", "L"]);
        assert_eq!(
            loaded.sizes[1].price_modifier,
            PriceModifier::Fixed { price: Money::from_rupees(1050) }
        );
        assert_eq!(
            loaded.sizes[2].price_modifier,
            PriceModifier::Percentage { value: Decimal::new(125, 1) }
        );
    }

    #[tokio::test]
    async fn test_get_missing_product() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        assert!(db.products().get_by_id("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_active_skips_delisted() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.products();

        let listed = sized_product();
        let mut delisted = sized_product();
        delisted.name = "Old Kurta".to_string();
        repo.insert(&listed).await.unwrap();
        repo.insert(&delisted).await.unwrap();
        repo.set_active(&delisted.id, false).await.unwrap();

        let active = repo.list_active(10).await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, listed.id);
        assert_eq!(active[0].sizes.len(), 3);
        assert_eq!(repo.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_size_label_not_stored() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.products();

        let mut product = sized_product();
        product.sizes[1].size_value = " L ".to_string();

        let err = repo.insert(&product).await.unwrap_err();
        assert!(matches!(err, DbError::Validation(_)));
        assert!(repo.get_by_id(&product.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_invalid_product_not_stored() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.products();

        let mut blank = sized_product();
        blank.name = "   ".to_string();
        let err = repo.insert(&blank).await.unwrap_err();
        assert!(matches!(err, DbError::Validation(_)));

        let mut negative = sized_product();
        negative.base_price = Money::from_rupees(-10);
        assert!(matches!(repo.insert(&negative).await, Err(DbError::Validation(_))));

        assert_eq!(repo.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_corrupt_size_row_is_reported() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.products();
        let product = sized_product();
        repo.insert(&product).await.unwrap();

        sqlx::query("UPDATE product_sizes SET modifier_value = 'abc' WHERE size_value = 'L'")
            .execute(db.pool())
            .await
            .unwrap();

        let err = repo.get_by_id(&product.id).await.unwrap_err();
        assert!(matches!(err, DbError::CorruptRow { .. }));
    }

    #[tokio::test]
    async fn test_delete_cascades_sizes() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.products();
        let product = sized_product();
        repo.insert(&product).await.unwrap();

        repo.delete(&product.id).await.unwrap();

        let sizes: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM product_sizes")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(sizes, 0);
        assert!(matches!(
            repo.delete(&product.id).await,
            Err(DbError::NotFound { .. })
        ));
    }
}
