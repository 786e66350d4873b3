//! # Order Repository
//!
//! Database operations for orders and order items.
//!
//! ## Order Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Order Lifecycle                                   │
//! │                                                                         │
//! │  1. CHECKOUT                                                           │
//! │     └── insert() → orders row + order_items rows, one transaction      │
//! │                                                                         │
//! │  2. STATUS CHANGE (repeatable until terminal)                          │
//! │     ├── get_by_id()              read order + status it is in          │
//! │     ├── apply_transition()       bazaar-core, pure                     │
//! │     └── commit_transition()      compare-and-swap on the read status   │
//! │                                                                         │
//! │         UPDATE orders SET status = ?new, ..., version = version + 1    │
//! │         WHERE id = ?id AND status = ?expected                          │
//! │                                                                         │
//! │         0 rows → order gone (NotFound) or moved on (StatusConflict)    │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use bazaar_core::money::Money;
use bazaar_core::types::{GstRate, GstSnapshot, GstType, Order, OrderItem, OrderStatus, ShippingAddress};
use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqlitePool};
use tracing::{debug, info, warn};

use crate::error::{DbError, DbResult};

// =============================================================================
// Row Mapping
// =============================================================================

#[derive(Debug, FromRow)]
struct OrderRow {
    id: String,
    user_id: String,
    status: OrderStatus,
    ship_full_name: String,
    ship_phone: String,
    ship_line1: String,
    ship_line2: Option<String>,
    ship_city: String,
    ship_state: String,
    ship_pincode: String,
    tracking_id: Option<String>,
    courier_company: Option<String>,
    reject_reason: Option<String>,
    subtotal_before_gst_paise: i64,
    total_gst_paise: i64,
    shipping_charge_paise: i64,
    grand_total_paise: i64,
    version: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl OrderRow {
    fn into_order(self, items: Vec<OrderItem>) -> Order {
        Order {
            id: self.id,
            user_id: self.user_id,
            status: self.status,
            address: ShippingAddress {
                full_name: self.ship_full_name,
                phone: self.ship_phone,
                line1: self.ship_line1,
                line2: self.ship_line2,
                city: self.ship_city,
                state: self.ship_state,
                pincode: self.ship_pincode,
            },
            tracking_id: self.tracking_id,
            courier_company: self.courier_company,
            reject_reason: self.reject_reason,
            subtotal_before_gst: Money::from_paise(self.subtotal_before_gst_paise),
            total_gst: Money::from_paise(self.total_gst_paise),
            shipping_charge: Money::from_paise(self.shipping_charge_paise),
            grand_total: Money::from_paise(self.grand_total_paise),
            items,
            created_at: self.created_at,
            updated_at: self.updated_at,
            version: self.version,
        }
    }
}

#[derive(Debug, FromRow)]
struct OrderItemRow {
    id: String,
    order_id: String,
    product_id: String,
    product_name: String,
    quantity: i64,
    selected_size: Option<String>,
    price_at_purchase_paise: i64,
    price_before_gst_paise: i64,
    gst_amount_paise: i64,
    final_price_paise: i64,
    gst_rate_bps: i64,
    gst_type: GstType,
}

impl OrderItemRow {
    fn into_item(self) -> DbResult<OrderItem> {
        let out_of_range = |column: &str, value: i64| DbError::CorruptRow {
            entity: "OrderItem".to_string(),
            id: self.id.clone(),
            reason: format!("{} {} out of range", column, value),
        };

        let quantity =
            u32::try_from(self.quantity).map_err(|_| out_of_range("quantity", self.quantity))?;
        let gst_rate = u32::try_from(self.gst_rate_bps)
            .map_err(|_| out_of_range("gst_rate_bps", self.gst_rate_bps))?;

        Ok(OrderItem {
            id: self.id,
            order_id: self.order_id,
            product_id: self.product_id,
            product_name: self.product_name,
            quantity,
            selected_size: self.selected_size,
            price_at_purchase: Money::from_paise(self.price_at_purchase_paise),
            gst: GstSnapshot {
                price_before_gst: Money::from_paise(self.price_before_gst_paise),
                gst_amount: Money::from_paise(self.gst_amount_paise),
                final_price: Money::from_paise(self.final_price_paise),
                gst_rate: GstRate::from_bps(gst_rate),
                gst_type: self.gst_type,
            },
        })
    }
}

const ORDER_COLUMNS: &str = r#"
    id, user_id, status,
    ship_full_name, ship_phone, ship_line1, ship_line2, ship_city, ship_state, ship_pincode,
    tracking_id, courier_company, reject_reason,
    subtotal_before_gst_paise, total_gst_paise, shipping_charge_paise, grand_total_paise,
    version, created_at, updated_at
"#;

// =============================================================================
// Repository
// =============================================================================

/// Repository for order database operations.
#[derive(Debug, Clone)]
pub struct OrderRepository {
    pool: SqlitePool,
}

impl OrderRepository {
    /// Creates a new OrderRepository.
    pub fn new(pool: SqlitePool) -> Self {
        OrderRepository { pool }
    }

    /// Inserts an order and all of its items in one transaction.
    ///
    /// ## Snapshot Pattern
    /// Item names, unit prices and GST figures are stored as given. Later
    /// catalog edits never reach them.
    pub async fn insert(&self, order: &Order) -> DbResult<()> {
        debug!(id = %order.id, items = order.items.len(), "Inserting order");

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO orders (
                id, user_id, status,
                ship_full_name, ship_phone, ship_line1, ship_line2,
                ship_city, ship_state, ship_pincode,
                tracking_id, courier_company, reject_reason,
                subtotal_before_gst_paise, total_gst_paise,
                shipping_charge_paise, grand_total_paise,
                version, created_at, updated_at
            ) VALUES (
                ?1, ?2, ?3,
                ?4, ?5, ?6, ?7,
                ?8, ?9, ?10,
                ?11, ?12, ?13,
                ?14, ?15,
                ?16, ?17,
                ?18, ?19, ?20
            )
            "#,
        )
        .bind(&order.id)
        .bind(&order.user_id)
        .bind(order.status)
        .bind(&order.address.full_name)
        .bind(&order.address.phone)
        .bind(&order.address.line1)
        .bind(&order.address.line2)
        .bind(&order.address.city)
        .bind(&order.address.state)
        .bind(&order.address.pincode)
        .bind(&order.tracking_id)
        .bind(&order.courier_company)
        .bind(&order.reject_reason)
        .bind(order.subtotal_before_gst.paise())
        .bind(order.total_gst.paise())
        .bind(order.shipping_charge.paise())
        .bind(order.grand_total.paise())
        .bind(order.version)
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&mut *tx)
        .await?;

        for (position, item) in order.items.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO order_items (
                    id, order_id, product_id, product_name, quantity, selected_size,
                    price_at_purchase_paise, price_before_gst_paise, gst_amount_paise,
                    final_price_paise, gst_rate_bps, gst_type, line_position
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
                "#,
            )
            .bind(&item.id)
            .bind(&order.id)
            .bind(&item.product_id)
            .bind(&item.product_name)
            .bind(i64::from(item.quantity))
            .bind(&item.selected_size)
            .bind(item.price_at_purchase.paise())
            .bind(item.gst.price_before_gst.paise())
            .bind(item.gst.gst_amount.paise())
            .bind(item.gst.final_price.paise())
            .bind(i64::from(item.gst.gst_rate.bps()))
            .bind(item.gst.gst_type)
            .bind(position as i64)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        info!(id = %order.id, grand_total = %order.grand_total, "Order stored");
        Ok(())
    }

    /// Gets an order by ID, items included in checkout order.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Order>> {
        let sql = format!("SELECT {} FROM orders WHERE id = ?1", ORDER_COLUMNS);
        let row: Option<OrderRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let items = self.items_for(&row.id).await?;
                Ok(Some(row.into_order(items)))
            }
            None => Ok(None),
        }
    }

    /// Lists a customer's orders, newest first.
    pub async fn list_by_user(&self, user_id: &str) -> DbResult<Vec<Order>> {
        let sql = format!(
            "SELECT {} FROM orders WHERE user_id = ?1 ORDER BY created_at DESC, id",
            ORDER_COLUMNS
        );
        let rows: Vec<OrderRow> = sqlx::query_as(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;

        let mut orders = Vec::with_capacity(rows.len());
        for row in rows {
            let items = self.items_for(&row.id).await?;
            orders.push(row.into_order(items));
        }

        Ok(orders)
    }

    /// Reads only the stored status of an order.
    pub async fn current_status(&self, id: &str) -> DbResult<Option<OrderStatus>> {
        let status: Option<OrderStatus> = sqlx::query_scalar("SELECT status FROM orders WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(status)
    }

    /// Commits a status change produced by `apply_transition`.
    ///
    /// The write only lands when the stored status still equals
    /// `expected`, the status the caller read before deciding. Tracking,
    /// courier and reject reason are written with it; the version is
    /// incremented.
    ///
    /// ## Returns
    /// * `Ok(Order)` - `updated` with the stored version
    /// * `Err(DbError::NotFound)` - the order does not exist
    /// * `Err(DbError::StatusConflict)` - the order moved on since it was read
    pub async fn commit_transition(&self, updated: &Order, expected: OrderStatus) -> DbResult<Order> {
        debug!(
            id = %updated.id,
            from = %expected,
            to = %updated.status,
            "Committing status change"
        );

        let version: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE orders SET
                status = ?3,
                tracking_id = ?4,
                courier_company = ?5,
                reject_reason = ?6,
                updated_at = ?7,
                version = version + 1
            WHERE id = ?1 AND status = ?2
            RETURNING version
            "#,
        )
        .bind(&updated.id)
        .bind(expected)
        .bind(updated.status)
        .bind(&updated.tracking_id)
        .bind(&updated.courier_company)
        .bind(&updated.reject_reason)
        .bind(updated.updated_at)
        .fetch_optional(&self.pool)
        .await?;

        match version {
            Some(version) => {
                let mut stored = updated.clone();
                stored.version = version;
                Ok(stored)
            }
            None => match self.current_status(&updated.id).await? {
                Some(actual) => {
                    warn!(
                        id = %updated.id,
                        expected = %expected,
                        actual = %actual,
                        "Status changed concurrently"
                    );
                    Err(DbError::StatusConflict {
                        order_id: updated.id.clone(),
                        expected,
                        actual,
                    })
                }
                None => Err(DbError::not_found("Order", &updated.id)),
            },
        }
    }

    /// Physically deletes an order; its items go with it.
    pub async fn delete(&self, id: &str) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM orders WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Order", id));
        }

        Ok(())
    }

    async fn items_for(&self, order_id: &str) -> DbResult<Vec<OrderItem>> {
        let rows: Vec<OrderItemRow> = sqlx::query_as(
            r#"
            SELECT
                id, order_id, product_id, product_name, quantity, selected_size,
                price_at_purchase_paise, price_before_gst_paise, gst_amount_paise,
                final_price_paise, gst_rate_bps, gst_type
            FROM order_items
            WHERE order_id = ?1
            ORDER BY line_position
            "#,
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(OrderItemRow::into_item).collect()
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
    use bazaar_core::pricing::breakdown_for;
    use bazaar_core::types::Product;
    use chrono::Duration;

    async fn setup() -> (Database, Product) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let now = Utc::now();
        let product = Product {
            id: generate_id(),
            name: "Brass Diya".to_string(),
            base_price: Money::from_rupees(1000),
            mrp: Some(Money::from_rupees(1200)),
            gst_rate: GstRate::from_bps(1800),
            gst_type: GstType::Exclusive,
            sizes: vec![],
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        db.products().insert(&product).await.unwrap();
        (db, product)
    }

    fn order_for(product: &Product, user_id: &str) -> Order {
        let id = generate_id();
        let unit = breakdown_for(product, None).unwrap();
        let item = OrderItem {
            id: generate_id(),
            order_id: id.clone(),
            product_id: product.id.clone(),
            product_name: product.name.clone(),
            quantity: 2,
            selected_size: None,
            price_at_purchase: unit.final_price,
            gst: unit.snapshot(product.gst_rate, product.gst_type),
        };
        let now = Utc::now();

        Order {
            id,
            user_id: user_id.to_string(),
            status: OrderStatus::Pending,
            address: ShippingAddress {
                full_name: "Asha Rao".to_string(),
                phone: "9876543210".to_string(),
                line1: "12 MG Road".to_string(),
                line2: Some("Flat 4".to_string()),
                city: "Bengaluru".to_string(),
                state: "Karnataka".to_string(),
                pincode: "560001".to_string(),
            },
            tracking_id: None,
            courier_company: None,
            reject_reason: None,
            subtotal_before_gst: Money::from_rupees(2000),
            total_gst: Money::from_rupees(360),
            shipping_charge: Money::zero(),
            grand_total: Money::from_rupees(2360),
            items: vec![item],
            created_at: now,
            updated_at: now,
            version: 0,
        }
    }

    fn dispatched(order: &Order) -> Order {
        let mut next = order.clone();
        next.status = OrderStatus::Dispatched;
        next.tracking_id = Some("AWB123".to_string());
        next.courier_company = Some("BlueDart".to_string());
        next.updated_at = Utc::now();
        next
    }

    #[tokio::test]
    async fn test_insert_and_get_order() {
        let (db, product) = setup().await;
        let order = order_for(&product, "user-1");
        db.orders().insert(&order).await.unwrap();

        let loaded = db.orders().get_by_id(&order.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, OrderStatus::Pending);
        assert_eq!(loaded.address, order.address);
        assert_eq!(loaded.grand_total, Money::from_rupees(2360));
        assert_eq!(loaded.items.len(), 1);

        let item = &loaded.items[0];
        assert_eq!(item.quantity, 2);
        assert_eq!(item.gst.price_before_gst, Money::from_rupees(1000));
        assert_eq!(item.gst.gst_amount, Money::from_rupees(180));
        assert_eq!(item.gst.final_price, Money::from_rupees(1180));
        assert_eq!(item.gst.gst_rate.bps(), 1800);
        assert_eq!(item.gst.gst_type, GstType::Exclusive);
    }

    #[tokio::test]
    async fn test_commit_transition_bumps_version() {
        let (db, product) = setup().await;
        let order = order_for(&product, "user-1");
        db.orders().insert(&order).await.unwrap();

        let stored = db
            .orders()
            .commit_transition(&dispatched(&order), OrderStatus::Pending)
            .await
            .unwrap();
        assert_eq!(stored.version, 1);

        let loaded = db.orders().get_by_id(&order.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, OrderStatus::Dispatched);
        assert_eq!(loaded.tracking_id.as_deref(), Some("AWB123"));
        assert_eq!(loaded.courier_company.as_deref(), Some("BlueDart"));
        assert_eq!(loaded.version, 1);
    }

    #[tokio::test]
    async fn test_stale_commit_reports_conflict() {
        let (db, product) = setup().await;
        let order = order_for(&product, "user-1");
        db.orders().insert(&order).await.unwrap();

        // first admin dispatches
        db.orders()
            .commit_transition(&dispatched(&order), OrderStatus::Pending)
            .await
            .unwrap();

        // second admin still holds the pending copy and cancels it
        let mut cancelled = order.clone();
        cancelled.status = OrderStatus::Cancelled;
        cancelled.reject_reason = Some("damaged".to_string());

        let err = db
            .orders()
            .commit_transition(&cancelled, OrderStatus::Pending)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            DbError::StatusConflict {
                expected: OrderStatus::Pending,
                actual: OrderStatus::Dispatched,
                ..
            }
        ));

        let loaded = db.orders().get_by_id(&order.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, OrderStatus::Dispatched);
        assert!(loaded.reject_reason.is_none());
    }

    #[tokio::test]
    async fn test_commit_missing_order() {
        let (db, product) = setup().await;
        let order = order_for(&product, "user-1");

        let err = db
            .orders()
            .commit_transition(&dispatched(&order), OrderStatus::Pending)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_list_by_user_newest_first() {
        let (db, product) = setup().await;

        let mut older = order_for(&product, "user-1");
        older.created_at = Utc::now() - Duration::hours(1);
        let newer = order_for(&product, "user-1");
        let other = order_for(&product, "user-2");

        for order in [&older, &newer, &other] {
            db.orders().insert(order).await.unwrap();
        }

        let orders = db.orders().list_by_user("user-1").await.unwrap();
        let ids: Vec<&str> = orders.iter().map(|o| o.id.as_str()).collect();
        assert_eq!(ids, vec![newer.id.as_str(), older.id.as_str()]);
    }

    #[tokio::test]
    async fn test_items_cascade_and_products_restrict() {
        let (db, product) = setup().await;
        let order = order_for(&product, "user-1");
        db.orders().insert(&order).await.unwrap();

        let err = db.products().delete(&product.id).await.unwrap_err();
        assert!(matches!(err, DbError::ForeignKeyViolation { .. }));

        db.orders().delete(&order.id).await.unwrap();
        let items: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM order_items")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(items, 0);

        // nothing references the product any more
        db.products().delete(&product.id).await.unwrap();
    }

    #[tokio::test]
    async fn test_item_for_unknown_product_rejected() {
        let (db, product) = setup().await;
        let mut order = order_for(&product, "user-1");
        order.items[0].product_id = "ghost".to_string();

        let err = db.orders().insert(&order).await.unwrap_err();
        assert!(matches!(err, DbError::ForeignKeyViolation { .. }));
        assert!(db.orders().get_by_id(&order.id).await.unwrap().is_none());
    }
}
