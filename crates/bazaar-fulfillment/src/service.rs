//! # Fulfillment Service
//!
//! Entry point for the HTTP layer: pricing, checkout and admin status
//! changes, each call self-contained.
//!
//! ## Status Change Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  change_status(request)                                                │
//! │       │                                                                 │
//! │       ├── 1. orders().get_by_id        (read, remember status)         │
//! │       ├── 2. apply_transition          (table, fields, step-up flag)   │
//! │       └── 3. orders().commit_transition(updated, status read in 1)     │
//! │                 │                                                       │
//! │                 ├── row matched  → committed order, version + 1        │
//! │                 └── row moved on → CoreError::Conflict (re-read)       │
//! │                                                                         │
//! │  Cancellation                                                           │
//! │  stage_cancellation ──► PendingCancellations                           │
//! │  confirm_cancellation ──► StepUpGate::authorize ──► steps 2 + 3        │
//! │  dismiss_cancellation ──► entry dropped                                │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Nothing is retried. A `Conflict` means another admin got there first and
//! the caller should re-read the order.

use crate::config::FulfillmentConfig;
use crate::error::{ServiceError, ServiceResult};
use crate::pending::{PendingCancellation, PendingCancellations};
use crate::step_up::{AccountVerifier, AdminSession, StepUpGate};
use bazaar_core::money::Money;
use bazaar_core::order_flow::{allowed_targets, requires_step_up, transition_rule};
use bazaar_core::pricing::{breakdown_for, LineTotal};
use bazaar_core::types::{Order, OrderStatus, ShippingAddress};
use bazaar_core::{
    apply_transition, compute_breakdown, AuthContext, Cart, CoreError, PriceBreakdown, PriceInput,
    ShippingPolicy, TransitionPayload,
};
use bazaar_db::Database;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

// =============================================================================
// Contracts
// =============================================================================

/// A status change as submitted by the admin client.
///
/// ```json
/// {
///   "orderId": "9f1c…",
///   "targetStatus": "dispatched",
///   "trackingId": "AWB123",
///   "courierCompany": "BlueDart",
///   "authContext": {"verified": false, "adminEmail": "ops@bazaar.in"}
/// }
/// ```
///
/// `auth_context` names the acting admin only. Its `verified` flag is
/// ignored by [`FulfillmentService::change_status`]; cancellations go
/// through [`FulfillmentService::confirm_cancellation`], which verifies
/// the password itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionRequest {
    pub order_id: String,
    pub target_status: OrderStatus,
    #[serde(default)]
    pub tracking_id: Option<String>,
    #[serde(default)]
    pub courier_company: Option<String>,
    #[serde(default)]
    pub reject_reason: Option<String>,
    pub auth_context: AuthContext,
}

impl TransitionRequest {
    fn payload(&self) -> TransitionPayload {
        TransitionPayload {
            tracking_id: self.tracking_id.clone(),
            courier_company: self.courier_company.clone(),
            reject_reason: self.reject_reason.clone(),
        }
    }
}

/// Order totals recomputed from the stored line snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderSummary {
    pub order_id: String,
    pub status: OrderStatus,
    pub lines: Vec<LineTotal>,
    #[serde(rename = "subtotalBeforeGST")]
    pub subtotal_before_gst: Money,
    #[serde(rename = "totalGST")]
    pub total_gst: Money,
    pub shipping: Money,
    pub grand_total: Money,
    /// True when the recomputed figures equal the stored order totals.
    pub reconciles: bool,
    /// Statuses the admin menu may offer next.
    pub allowed_targets: Vec<OrderStatus>,
    /// Subset of `allowed_targets` that needs step-up verification.
    pub step_up_targets: Vec<OrderStatus>,
    pub version: i64,
}

// =============================================================================
// Service
// =============================================================================

/// Pricing, checkout and order status operations over one database.
#[derive(Debug)]
pub struct FulfillmentService {
    db: Database,
    gate: StepUpGate,
    shipping: ShippingPolicy,
    pending: PendingCancellations,
}

impl FulfillmentService {
    /// Opens the configured database and verifies step-up credentials
    /// against its admin accounts.
    pub async fn connect(config: &FulfillmentConfig) -> ServiceResult<Self> {
        config.validate()?;

        let db = Database::new(config.db_config()).await?;
        let gate = StepUpGate::new(
            Arc::new(AccountVerifier::new(db.admins())),
            config.step_up_timeout(),
        );

        info!(
            path = %config.database_path.display(),
            step_up_timeout = ?config.step_up_timeout(),
            pending_ttl = ?config.pending_ttl(),
            "Fulfillment service ready"
        );

        Ok(Self::new(db, gate, config.shipping_policy()).with_pending_ttl(config.pending_ttl()))
    }

    pub fn new(db: Database, gate: StepUpGate, shipping: ShippingPolicy) -> Self {
        FulfillmentService {
            db,
            gate,
            shipping,
            pending: PendingCancellations::new(),
        }
    }

    /// Replaces the pending-cancellation store with one that expires
    /// entries after `ttl`.
    pub fn with_pending_ttl(mut self, ttl: Duration) -> Self {
        self.pending = PendingCancellations::with_ttl(ttl);
        self
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn shipping_policy(&self) -> ShippingPolicy {
        self.shipping
    }

    // -------------------------------------------------------------------------
    // Pricing
    // -------------------------------------------------------------------------

    /// Breakdown for raw pricing input.
    pub fn price_breakdown(&self, input: &PriceInput) -> ServiceResult<PriceBreakdown> {
        Ok(compute_breakdown(input)?)
    }

    /// Breakdown for a catalog product, in a size when one is given.
    ///
    /// Used by listings; checkout arrives at the same figures through
    /// [`Cart::add_item`].
    pub async fn product_breakdown(
        &self,
        product_id: &str,
        size: Option<&str>,
    ) -> ServiceResult<PriceBreakdown> {
        let product = self
            .db
            .products()
            .get_by_id(product_id)
            .await?
            .ok_or_else(|| CoreError::ProductNotFound(product_id.to_string()))?;

        let size = match size {
            Some(label) => Some(product.size(label).ok_or_else(|| CoreError::SizeUnavailable {
                product_id: product_id.to_string(),
                size: label.to_string(),
            })?),
            None => None,
        };

        Ok(breakdown_for(&product, size)?)
    }

    // -------------------------------------------------------------------------
    // Checkout
    // -------------------------------------------------------------------------

    /// Places an order for the cart's lines.
    ///
    /// Every line is re-priced against the current catalog, so the stored
    /// GST snapshots never depend on figures the client sent. A product
    /// that was delisted or a size that became unavailable fails the whole
    /// checkout.
    pub async fn checkout(
        &self,
        user_id: &str,
        address: ShippingAddress,
        cart: &Cart,
    ) -> ServiceResult<Order> {
        if cart.is_empty() {
            return Err(CoreError::EmptyCart.into());
        }

        let products = self.db.products();
        let mut priced = Cart::new();

        for line in &cart.lines {
            let product = products
                .get_by_id(&line.product_id)
                .await?
                .ok_or_else(|| CoreError::ProductNotFound(line.product_id.clone()))?;

            priced.add_item(&product, line.selected_size.as_deref(), line.quantity)?;
        }

        let order = priced.place_order(user_id, address, &self.shipping)?;
        self.db.orders().insert(&order).await?;

        info!(
            order_id = %order.id,
            user_id = %user_id,
            lines = order.items.len(),
            grand_total = %order.grand_total,
            "Order placed"
        );

        Ok(order)
    }

    // -------------------------------------------------------------------------
    // Status Changes
    // -------------------------------------------------------------------------

    /// Loads an order with its items.
    pub async fn order(&self, order_id: &str) -> ServiceResult<Order> {
        self.db
            .orders()
            .get_by_id(order_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Order", order_id))
    }

    /// Applies a status change and commits it if the order has not moved
    /// since it was read.
    ///
    /// The request is always evaluated as unverified, so edges that need
    /// step-up fail with `UnauthorizedTransition`.
    pub async fn change_status(&self, request: &TransitionRequest) -> ServiceResult<Order> {
        let order = self.order(&request.order_id).await?;
        let auth = AuthContext::unverified(request.auth_context.admin_email.clone());

        debug!(
            order_id = %order.id,
            from = %order.status,
            to = %request.target_status,
            admin = %request.auth_context.admin_email,
            "Status change requested"
        );

        self.apply_and_commit(&order, request.target_status, &request.payload(), &auth)
            .await
    }

    async fn apply_and_commit(
        &self,
        order: &Order,
        target: OrderStatus,
        payload: &TransitionPayload,
        auth: &AuthContext,
    ) -> ServiceResult<Order> {
        let updated = apply_transition(order, target, payload, auth)?;
        let committed = self
            .db
            .orders()
            .commit_transition(&updated, order.status)
            .await?;

        info!(
            order_id = %committed.id,
            from = %order.status,
            to = %committed.status,
            version = committed.version,
            admin = %auth.admin_email,
            "Order status changed"
        );

        Ok(committed)
    }

    // -------------------------------------------------------------------------
    // Cancellation
    // -------------------------------------------------------------------------

    /// Records a cancellation request for confirmation.
    ///
    /// The order must currently allow cancellation; nothing is written to
    /// the order until [`FulfillmentService::confirm_cancellation`].
    pub async fn stage_cancellation(
        &self,
        order_id: &str,
        reason: &str,
        session: &AdminSession,
    ) -> ServiceResult<PendingCancellation> {
        let order = self.order(order_id).await?;

        if transition_rule(order.status, OrderStatus::Cancelled).is_none() {
            return Err(CoreError::InvalidTransition {
                from: order.status,
                to: OrderStatus::Cancelled,
            }
            .into());
        }

        let entry = self.pending.stage(order_id, reason, &session.email).await?;
        info!(order_id = %order_id, admin = %session.email, "Cancellation staged");

        Ok(entry)
    }

    /// Drops a staged cancellation. Returns whether one was pending.
    pub async fn dismiss_cancellation(&self, order_id: &str) -> bool {
        let dismissed = self.pending.dismiss(order_id).await;
        if dismissed {
            info!(order_id = %order_id, "Cancellation dismissed");
        }
        dismissed
    }

    /// The staged cancellation for an order, if any.
    pub async fn pending_cancellation(&self, order_id: &str) -> Option<PendingCancellation> {
        self.pending.get(order_id).await
    }

    /// Verifies the session's password and, on success, cancels the order
    /// with the staged reason.
    ///
    /// The staged entry is consumed by any verification outcome; a failed
    /// check leaves the order untouched and the admin has to stage again.
    /// Only the admin who staged the cancellation may confirm it, and an
    /// entry re-staged by another admin during verification is left alone.
    ///
    /// ## Errors
    /// - `NoPendingCancellation` when nothing is staged for the order, the
    ///   entry expired, or it was re-staged by another admin meanwhile
    /// - `Core(UnauthorizedTransition)` when the session did not stage this
    ///   cancellation
    /// - `StepUp(_)` when verification fails or times out
    /// - `Core(Conflict)` when the order moved on in the meantime
    pub async fn confirm_cancellation(
        &self,
        order_id: &str,
        session: &AdminSession,
        password: &str,
    ) -> ServiceResult<Order> {
        let staged = self
            .pending
            .get(order_id)
            .await
            .ok_or_else(|| ServiceError::NoPendingCancellation(order_id.to_string()))?;

        if staged.staged_by != session.email {
            warn!(
                order_id = %order_id,
                staged_by = %staged.staged_by,
                admin = %session.email,
                "Cancellation confirmed by a different admin"
            );
            return Err(CoreError::UnauthorizedTransition {
                to: OrderStatus::Cancelled,
            }
            .into());
        }

        let verification = self.gate.authorize(session, password).await;

        // Consumed whatever the outcome, but only while it is still ours.
        let taken = self.pending.take_staged_by(order_id, &session.email).await;
        let auth = verification?;
        let staged = taken.ok_or_else(|| {
            warn!(
                order_id = %order_id,
                admin = %session.email,
                "Cancellation re-staged during verification"
            );
            ServiceError::NoPendingCancellation(order_id.to_string())
        })?;

        let order = self.order(order_id).await?;
        self.apply_and_commit(
            &order,
            OrderStatus::Cancelled,
            &TransitionPayload::rejection(staged.reject_reason),
            &auth,
        )
        .await
    }

    // -------------------------------------------------------------------------
    // Summary
    // -------------------------------------------------------------------------

    /// Recomputes an order's totals from its frozen line snapshots.
    ///
    /// Shipping is the stored charge; the policy in force today may differ
    /// from the one at checkout.
    pub async fn order_summary(&self, order_id: &str) -> ServiceResult<OrderSummary> {
        let order = self.order(order_id).await?;

        let lines: Vec<LineTotal> = order
            .items
            .iter()
            .map(|item| {
                let before_gst = item.line_before_gst();
                let gst = item.line_gst();
                LineTotal {
                    before_gst,
                    gst,
                    total: before_gst + gst,
                }
            })
            .collect();

        let subtotal_before_gst: Money = lines.iter().map(|l| l.before_gst).sum();
        let total_gst: Money = lines.iter().map(|l| l.gst).sum();
        let shipping = order.shipping_charge;
        let grand_total = subtotal_before_gst + total_gst + shipping;

        let reconciles = subtotal_before_gst == order.subtotal_before_gst
            && total_gst == order.total_gst
            && grand_total == order.grand_total;
        if !reconciles {
            warn!(order_id = %order.id, "Stored totals do not match line snapshots");
        }

        let allowed = allowed_targets(order.status);
        let step_up_targets = allowed
            .iter()
            .copied()
            .filter(|to| requires_step_up(order.status, *to))
            .collect();

        Ok(OrderSummary {
            order_id: order.id,
            status: order.status,
            lines,
            subtotal_before_gst,
            total_gst,
            shipping,
            grand_total,
            reconciles,
            allowed_targets: allowed,
            step_up_targets,
            version: order.version,
        })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::step_up::tests::ScriptedVerifier;
    use crate::step_up::StepUpError;
    use bazaar_core::types::{GstRate, GstType, PriceModifier, Product, Role, Size, SizeType};
    use bazaar_db::DbConfig;
    use chrono::Utc;
    use rust_decimal::Decimal;
    use std::time::Duration;

    const ADMIN: &str = "ops@bazaar.in";
    const PASSWORD: &str = "s3cret";

    fn admins() -> ScriptedVerifier {
        ScriptedVerifier::new()
            .with(ADMIN, PASSWORD, Role::Admin)
            .with("lead@bazaar.in", "lead-pw", Role::Admin)
    }

    async fn service_with(verifier: ScriptedVerifier) -> FulfillmentService {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let gate = StepUpGate::new(Arc::new(verifier), Duration::from_secs(5));
        FulfillmentService::new(db, gate, ShippingPolicy::default())
    }

    async fn service() -> FulfillmentService {
        service_with(admins()).await
    }

    fn product(id: &str, rupees: i64, gst_type: GstType) -> Product {
        Product {
            id: id.to_string(),
            name: format!("Product {}", id),
            base_price: Money::from_rupees(rupees),
            mrp: None,
            gst_rate: GstRate::from_bps(1800),
            gst_type,
            sizes: vec![],
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn sized(id: &str) -> Product {
        let mut p = product(id, 500, GstType::Exclusive);
        p.gst_rate = GstRate::from_bps(500);
        p.sizes = vec![
            Size {
                id: format!("{}-m", id),
                product_id: id.to_string(),
                size_type: SizeType::Clothing,
                size_value: "M".to_string(),
                display_order: 1,
                is_available: true,
                price_modifier: PriceModifier::None,
                mrp: None,
            },
            Size {
                id: format!("{}-xl", id),
                product_id: id.to_string(),
                size_type: SizeType::Clothing,
                size_value: "XL".to_string(),
                display_order: 2,
                is_available: true,
                price_modifier: PriceModifier::Fixed {
                    price: Money::from_rupees(600),
                },
                mrp: Some(Money::from_rupees(800)),
            },
        ];
        p
    }

    fn address() -> ShippingAddress {
        ShippingAddress {
            full_name: "Asha Rao".to_string(),
            phone: "9876543210".to_string(),
            line1: "12 MG Road".to_string(),
            line2: None,
            city: "Bengaluru".to_string(),
            state: "Karnataka".to_string(),
            pincode: "560001".to_string(),
        }
    }

    async fn placed(svc: &FulfillmentService) -> Order {
        let p = svc
            .database()
            .products()
            .insert(&product("p1", 1000, GstType::Exclusive))
            .await
            .unwrap();
        let mut cart = Cart::new();
        cart.add_item(&p, None, 1).unwrap();
        svc.checkout("u1", address(), &cart).await.unwrap()
    }

    fn request(order_id: &str, target: OrderStatus) -> TransitionRequest {
        TransitionRequest {
            order_id: order_id.to_string(),
            target_status: target,
            tracking_id: None,
            courier_company: None,
            reject_reason: None,
            auth_context: AuthContext::unverified(ADMIN),
        }
    }

    fn dispatch(order_id: &str) -> TransitionRequest {
        TransitionRequest {
            tracking_id: Some("AWB123".to_string()),
            courier_company: Some("BlueDart".to_string()),
            ..request(order_id, OrderStatus::Dispatched)
        }
    }

    #[tokio::test]
    async fn test_price_breakdown_example() {
        let svc = service().await;
        let b = svc
            .price_breakdown(&PriceInput {
                base_price: Decimal::from(1000),
                mrp: Some(Decimal::from(1200)),
                gst_rate_percent: Decimal::from(18),
                gst_type: GstType::Exclusive,
            })
            .unwrap();

        assert_eq!(b.price_before_gst, Money::from_rupees(1000));
        assert_eq!(b.gst_amount, Money::from_rupees(180));
        assert_eq!(b.final_price, Money::from_rupees(1180));
        assert_eq!(b.discount_percent, 2);

        let err = svc
            .price_breakdown(&PriceInput {
                base_price: Decimal::from(-1),
                mrp: None,
                gst_rate_percent: Decimal::from(18),
                gst_type: GstType::Exclusive,
            })
            .unwrap_err();
        assert_eq!(err.code(), crate::ErrorCode::InvalidPriceInput);
    }

    #[tokio::test]
    async fn test_product_breakdown_uses_size_price() {
        let svc = service().await;
        svc.database().products().insert(&sized("kurta")).await.unwrap();

        let xl = svc.product_breakdown("kurta", Some("XL")).await.unwrap();
        assert_eq!(xl.price_before_gst, Money::from_rupees(600));
        assert_eq!(xl.gst_amount, Money::from_rupees(30));
        assert_eq!(xl.mrp, Money::from_rupees(800));

        let base = svc.product_breakdown("kurta", Some("M")).await.unwrap();
        assert_eq!(base.price_before_gst, Money::from_rupees(500));

        assert!(matches!(
            svc.product_breakdown("kurta", Some("XXS")).await,
            Err(ServiceError::Core(CoreError::SizeUnavailable { .. }))
        ));
        assert!(matches!(
            svc.product_breakdown("missing", None).await,
            Err(ServiceError::Core(CoreError::ProductNotFound(_)))
        ));
    }

    #[tokio::test]
    async fn test_checkout_reprices_against_catalog() {
        let svc = service().await;
        let p = svc
            .database()
            .products()
            .insert(&product("p1", 400, GstType::Exclusive))
            .await
            .unwrap();

        let mut cart = Cart::new();
        cart.add_item(&p, None, 2).unwrap();
        cart.lines[0].unit.final_price = Money::from_rupees(1);
        cart.lines[0].unit.gst_amount = Money::zero();

        let order = svc.checkout("u1", address(), &cart).await.unwrap();

        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.items[0].price_at_purchase, Money::from_rupees(472));
        assert_eq!(order.subtotal_before_gst, Money::from_rupees(800));
        assert_eq!(order.total_gst, Money::from_rupees(144));
        assert_eq!(order.shipping_charge, Money::from_rupees(150));
        assert_eq!(order.grand_total, Money::from_rupees(1094));

        let stored = svc.order(&order.id).await.unwrap();
        assert_eq!(stored.grand_total, order.grand_total);
        assert_eq!(stored.items.len(), 1);
    }

    #[tokio::test]
    async fn test_checkout_rejects_delisted_product() {
        let svc = service().await;
        let p = svc
            .database()
            .products()
            .insert(&product("p1", 400, GstType::Inclusive))
            .await
            .unwrap();

        let mut cart = Cart::new();
        cart.add_item(&p, None, 1).unwrap();
        svc.database().products().set_active("p1", false).await.unwrap();

        assert!(matches!(
            svc.checkout("u1", address(), &cart).await,
            Err(ServiceError::Core(CoreError::ProductNotFound(id))) if id == "p1"
        ));
        assert!(matches!(
            svc.checkout("u1", address(), &Cart::new()).await,
            Err(ServiceError::Core(CoreError::EmptyCart))
        ));
    }

    #[tokio::test]
    async fn test_dispatch_then_deliver() {
        let svc = service().await;
        let order = placed(&svc).await;

        let dispatched = svc.change_status(&dispatch(&order.id)).await.unwrap();
        assert_eq!(dispatched.status, OrderStatus::Dispatched);
        assert_eq!(dispatched.tracking_id.as_deref(), Some("AWB123"));
        assert_eq!(dispatched.version, 1);

        let delivered = svc
            .change_status(&request(&order.id, OrderStatus::Delivered))
            .await
            .unwrap();
        assert_eq!(delivered.status, OrderStatus::Delivered);
        assert_eq!(delivered.courier_company.as_deref(), Some("BlueDart"));
        assert_eq!(delivered.version, 2);
    }

    #[tokio::test]
    async fn test_rejected_changes_leave_order_untouched() {
        let svc = service().await;
        let order = placed(&svc).await;

        let skip = svc
            .change_status(&request(&order.id, OrderStatus::Delivered))
            .await
            .unwrap_err();
        assert_eq!(skip.code(), crate::ErrorCode::InvalidTransition);

        let blank = TransitionRequest {
            tracking_id: Some("   ".to_string()),
            ..dispatch(&order.id)
        };
        let missing = svc.change_status(&blank).await.unwrap_err();
        assert!(matches!(
            missing,
            ServiceError::Core(CoreError::MissingField { ref field }) if field == "tracking_id"
        ));

        let cancel = TransitionRequest {
            reject_reason: Some("damaged".to_string()),
            ..request(&order.id, OrderStatus::Cancelled)
        };
        let unauthorized = svc.change_status(&cancel).await.unwrap_err();
        assert_eq!(unauthorized.code(), crate::ErrorCode::Unauthorized);

        let stored = svc.order(&order.id).await.unwrap();
        assert_eq!(stored.status, OrderStatus::Pending);
        assert_eq!(stored.tracking_id, None);
        assert_eq!(stored.version, 0);
    }

    #[tokio::test]
    async fn test_stale_commit_reports_conflict() {
        let svc = service().await;
        let order = placed(&svc).await;

        // Admin B read the order while it was still pending.
        let stale = order.clone();
        svc.change_status(&dispatch(&order.id)).await.unwrap();

        let cancelled = apply_transition(
            &stale,
            OrderStatus::Cancelled,
            &TransitionPayload::rejection("duplicate"),
            &AuthContext::verified(ADMIN),
        )
        .unwrap();
        let err: ServiceError = svc
            .database()
            .orders()
            .commit_transition(&cancelled, stale.status)
            .await
            .unwrap_err()
            .into();

        assert!(matches!(
            err,
            ServiceError::Core(CoreError::Conflict {
                expected: OrderStatus::Pending,
                actual: OrderStatus::Dispatched,
                ..
            })
        ));
        assert_eq!(svc.order(&order.id).await.unwrap().status, OrderStatus::Dispatched);
    }

    #[tokio::test]
    async fn test_client_verified_flag_cannot_cancel() {
        let svc = service().await;
        let order = placed(&svc).await;

        let json = format!(
            r#"{{
                "orderId": "{}",
                "targetStatus": "cancelled",
                "rejectReason": "customer asked",
                "authContext": {{"verified": true, "adminEmail": "{}"}}
            }}"#,
            order.id, ADMIN
        );
        let req: TransitionRequest = serde_json::from_str(&json).unwrap();

        let err = svc.change_status(&req).await.unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Core(CoreError::UnauthorizedTransition { to: OrderStatus::Cancelled })
        ));

        // A verified context built in code is not trusted either.
        let forged = TransitionRequest {
            auth_context: AuthContext::verified(ADMIN),
            ..req
        };
        assert!(svc.change_status(&forged).await.is_err());

        let stored = svc.order(&order.id).await.unwrap();
        assert_eq!(stored.status, OrderStatus::Pending);
        assert_eq!(stored.version, 0);
    }

    #[tokio::test]
    async fn test_change_status_unknown_order() {
        let svc = service().await;
        let err = svc
            .change_status(&request("nope", OrderStatus::Delivered))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_confirm_cancellation_with_password() {
        let svc = service().await;
        let order = placed(&svc).await;
        let session = AdminSession::new(ADMIN);

        svc.stage_cancellation(&order.id, " out of stock ", &session)
            .await
            .unwrap();
        let cancelled = svc
            .confirm_cancellation(&order.id, &session, PASSWORD)
            .await
            .unwrap();

        assert_eq!(cancelled.status, OrderStatus::Cancelled);
        assert_eq!(cancelled.reject_reason.as_deref(), Some("out of stock"));
        assert!(svc.pending_cancellation(&order.id).await.is_none());
    }

    #[tokio::test]
    async fn test_failed_verification_discards_pending() {
        let svc = service().await;
        let order = placed(&svc).await;
        let session = AdminSession::new(ADMIN);

        svc.stage_cancellation(&order.id, "damaged", &session).await.unwrap();
        let err = svc
            .confirm_cancellation(&order.id, &session, "wrong")
            .await
            .unwrap_err();

        assert!(matches!(err, ServiceError::StepUp(StepUpError::InvalidCredentials)));
        assert_eq!(err.code(), crate::ErrorCode::Unauthorized);
        assert!(svc.pending_cancellation(&order.id).await.is_none());
        assert_eq!(svc.order(&order.id).await.unwrap().status, OrderStatus::Pending);

        assert!(matches!(
            svc.confirm_cancellation(&order.id, &session, PASSWORD).await,
            Err(ServiceError::NoPendingCancellation(_))
        ));
    }

    #[tokio::test]
    async fn test_other_admin_cannot_confirm() {
        let svc = service().await;
        let order = placed(&svc).await;

        svc.stage_cancellation(&order.id, "damaged", &AdminSession::new(ADMIN))
            .await
            .unwrap();
        let err = svc
            .confirm_cancellation(&order.id, &AdminSession::new("lead@bazaar.in"), "lead-pw")
            .await
            .unwrap_err();

        assert_eq!(err.code(), crate::ErrorCode::Unauthorized);
        assert!(svc.pending_cancellation(&order.id).await.is_some());
        assert_eq!(svc.order(&order.id).await.unwrap().status, OrderStatus::Pending);
    }

    #[tokio::test]
    async fn test_restage_during_verification_is_not_applied() {
        let svc = service_with(admins().slow(Duration::from_millis(300))).await;
        let order = placed(&svc).await;
        let ops = AdminSession::new(ADMIN);
        let lead = AdminSession::new("lead@bazaar.in");

        svc.stage_cancellation(&order.id, "damaged", &ops).await.unwrap();

        let restage = async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            svc.stage_cancellation(&order.id, "wrong address", &lead).await
        };
        let (confirmed, restaged) =
            tokio::join!(svc.confirm_cancellation(&order.id, &ops, PASSWORD), restage);

        restaged.unwrap();
        assert!(matches!(confirmed, Err(ServiceError::NoPendingCancellation(_))));

        let pending = svc.pending_cancellation(&order.id).await.unwrap();
        assert_eq!(pending.staged_by, "lead@bazaar.in");
        assert_eq!(pending.reject_reason, "wrong address");
        assert_eq!(svc.order(&order.id).await.unwrap().status, OrderStatus::Pending);
    }

    #[tokio::test]
    async fn test_step_up_timeout_surfaces() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let verifier = admins().slow(Duration::from_millis(500));
        let gate = StepUpGate::new(Arc::new(verifier), Duration::from_millis(50));
        let svc = FulfillmentService::new(db, gate, ShippingPolicy::default());
        let order = placed(&svc).await;
        let session = AdminSession::new(ADMIN);

        svc.stage_cancellation(&order.id, "damaged", &session).await.unwrap();
        let err = svc
            .confirm_cancellation(&order.id, &session, PASSWORD)
            .await
            .unwrap_err();

        assert!(matches!(err, ServiceError::StepUp(StepUpError::TimedOut { .. })));
        assert_eq!(svc.order(&order.id).await.unwrap().status, OrderStatus::Pending);
    }

    #[tokio::test]
    async fn test_expired_cancellation_cannot_be_confirmed() {
        let svc = service().await.with_pending_ttl(Duration::from_millis(20));
        let order = placed(&svc).await;
        let session = AdminSession::new(ADMIN);

        svc.stage_cancellation(&order.id, "damaged", &session).await.unwrap();
        tokio::time::sleep(Duration::from_millis(60)).await;

        assert!(svc.pending_cancellation(&order.id).await.is_none());
        assert!(matches!(
            svc.confirm_cancellation(&order.id, &session, PASSWORD).await,
            Err(ServiceError::NoPendingCancellation(_))
        ));
        assert_eq!(svc.order(&order.id).await.unwrap().status, OrderStatus::Pending);
    }

    #[tokio::test]
    async fn test_stage_and_dismiss() {
        let svc = service().await;
        let order = placed(&svc).await;
        let session = AdminSession::new(ADMIN);

        assert!(matches!(
            svc.stage_cancellation(&order.id, "  ", &session).await,
            Err(ServiceError::Core(CoreError::MissingField { .. }))
        ));

        svc.stage_cancellation(&order.id, "damaged", &session).await.unwrap();
        assert!(svc.dismiss_cancellation(&order.id).await);
        assert!(!svc.dismiss_cancellation(&order.id).await);
        assert_eq!(svc.order(&order.id).await.unwrap().status, OrderStatus::Pending);
    }

    #[tokio::test]
    async fn test_cannot_stage_cancellation_of_delivered_order() {
        let svc = service().await;
        let order = placed(&svc).await;
        svc.change_status(&dispatch(&order.id)).await.unwrap();
        svc.change_status(&request(&order.id, OrderStatus::Delivered))
            .await
            .unwrap();

        let err = svc
            .stage_cancellation(&order.id, "late", &AdminSession::new(ADMIN))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Core(CoreError::InvalidTransition {
                from: OrderStatus::Delivered,
                to: OrderStatus::Cancelled,
            })
        ));
    }

    #[tokio::test]
    async fn test_order_summary_reconciles() {
        let svc = service().await;
        let order = placed(&svc).await;

        let summary = svc.order_summary(&order.id).await.unwrap();
        assert!(summary.reconciles);
        assert_eq!(summary.subtotal_before_gst, Money::from_rupees(1000));
        assert_eq!(summary.total_gst, Money::from_rupees(180));
        assert_eq!(summary.shipping, Money::zero());
        assert_eq!(summary.grand_total, Money::from_rupees(1180));
        assert_eq!(
            summary.allowed_targets,
            vec![OrderStatus::Dispatched, OrderStatus::Cancelled]
        );
        assert_eq!(summary.step_up_targets, vec![OrderStatus::Cancelled]);
    }

    #[test]
    fn test_transition_request_json() {
        let json = r#"{
            "orderId": "o1",
            "targetStatus": "shipped",
            "trackingId": "AWB1",
            "courierCompany": "Delhivery",
            "authContext": {"verified": false, "adminEmail": "ops@bazaar.in"}
        }"#;

        let req: TransitionRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.target_status, OrderStatus::Dispatched);
        assert_eq!(req.reject_reason, None);
        assert!(!req.auth_context.verified);
    }
}
