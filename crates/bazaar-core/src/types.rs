//! # Domain Types
//!
//! Core domain types used throughout Bazaar.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Product      │   │      Order      │   │   OrderItem     │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (UUID)      │   │  id (UUID)      │   │  order_id (FK)  │       │
//! │  │  base_price     │◄──│  status         │──►│  quantity       │       │
//! │  │  gst_rate/type  │   │  address (flat) │   │  GST snapshot   │       │
//! │  │  sizes[]        │   │  shipping       │   │  selected_size  │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    GstRate      │   │  OrderStatus    │   │ PriceModifier   │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  bps (u32)      │   │  Pending        │   │  Fixed          │       │
//! │  │  1800 = 18%     │   │  Dispatched     │   │  Percentage     │       │
//! │  └─────────────────┘   │  Delivered      │   │  None           │       │
//! │                        │  Cancelled      │   └─────────────────┘       │
//! │                        └─────────────────┘                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Snapshot Pattern
//! Order items freeze the product name, unit price and GST breakdown at
//! checkout. Later catalog edits never alter historical orders.

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{CoreError, CoreResult};
use crate::money::Money;

// =============================================================================
// GST Rate
// =============================================================================

/// GST rate represented in basis points (bps).
///
/// ## Why Basis Points?
/// 1 basis point = 0.01%. Indian GST slabs (0.25%, 3%, 5%, 12%, 18%, 28%)
/// all fit exactly, and the value stores as a plain INTEGER column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GstRate(u32);

impl GstRate {
    /// Creates a GST rate from basis points.
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        GstRate(bps)
    }

    /// Creates a GST rate from a percentage such as `18` or `0.25`.
    ///
    /// Negative percentages are rejected. Precision beyond basis points is
    /// rounded half away from zero.
    pub fn from_percent(percent: Decimal) -> CoreResult<Self> {
        if percent.is_sign_negative() && !percent.is_zero() {
            return Err(CoreError::invalid_price("gst_rate_percent", "must not be negative"));
        }

        crate::money::round_currency(percent)
            .checked_mul(Decimal::from(100))
            .and_then(|bps| bps.to_u32())
            .map(GstRate)
            .ok_or_else(|| CoreError::invalid_price("gst_rate_percent", "out of range"))
    }

    /// Returns the rate in basis points.
    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Returns the rate as an exact decimal percentage (1800 bps → 18.00).
    #[inline]
    pub fn percent(&self) -> Decimal {
        Decimal::new(self.0 as i64, 2)
    }

    /// Zero GST (exempt goods).
    #[inline]
    pub const fn zero() -> Self {
        GstRate(0)
    }
}

impl Default for GstRate {
    fn default() -> Self {
        GstRate::zero()
    }
}

// =============================================================================
// GST Type
// =============================================================================

/// Whether a listed price already contains GST.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
pub enum GstType {
    /// Listed price contains GST; the tax is backed out of it.
    Inclusive,
    /// GST is added on top of the listed price.
    Exclusive,
}

impl Default for GstType {
    fn default() -> Self {
        GstType::Inclusive
    }
}

// =============================================================================
// Sizes
// =============================================================================

/// The kind of size label a product uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
pub enum SizeType {
    /// S, M, L, XL ...
    Clothing,
    /// UK/EU shoe sizes.
    Shoes,
    /// 250g, 1kg ...
    Weight,
    /// Free-form label.
    Custom,
}

/// Column-level discriminant for [`PriceModifier`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
pub enum PriceModifierKind {
    Fixed,
    Percentage,
    None,
}

/// How a size derives its price from the product's base price.
///
/// ## Invariants
/// Encoded in the variants themselves: a fixed modifier always carries a
/// price, a percentage modifier always carries a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum PriceModifier {
    /// The size has its own explicit price.
    Fixed { price: Money },
    /// `base_price × (1 + value/100)`; negative values are markdowns.
    Percentage { value: Decimal },
    /// Inherits the product's base price.
    None,
}

impl PriceModifier {
    /// Builds a modifier from the nullable columns it is stored as.
    ///
    /// ## Errors
    /// `InvalidSizeConfiguration` when the kind's required column is NULL.
    pub fn from_parts(
        kind: PriceModifierKind,
        price: Option<Money>,
        value: Option<Decimal>,
    ) -> CoreResult<Self> {
        match kind {
            PriceModifierKind::Fixed => price
                .map(|price| PriceModifier::Fixed { price })
                .ok_or_else(|| CoreError::InvalidSizeConfiguration {
                    reason: "fixed price modifier requires an explicit price".to_string(),
                }),
            PriceModifierKind::Percentage => value
                .map(|value| PriceModifier::Percentage { value })
                .ok_or_else(|| CoreError::InvalidSizeConfiguration {
                    reason: "percentage price modifier requires a value".to_string(),
                }),
            PriceModifierKind::None => Ok(PriceModifier::None),
        }
    }

    /// Returns the column discriminant.
    pub fn kind(&self) -> PriceModifierKind {
        match self {
            PriceModifier::Fixed { .. } => PriceModifierKind::Fixed,
            PriceModifier::Percentage { .. } => PriceModifierKind::Percentage,
            PriceModifier::None => PriceModifierKind::None,
        }
    }
}

impl Default for PriceModifier {
    fn default() -> Self {
        PriceModifier::None
    }
}

/// A purchasable size of a product.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Size {
    pub id: String,
    pub product_id: String,
    pub size_type: SizeType,
    /// Display label ("M", "UK 9", "500g").
    pub size_value: String,
    /// Presentation order within the product, ascending.
    pub display_order: i64,
    pub is_available: bool,
    pub price_modifier: PriceModifier,
    /// MRP override for this size; falls back to the product MRP.
    pub mrp: Option<Money>,
}

// =============================================================================
// Product
// =============================================================================

/// A product in the catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Display name; snapshotted onto order items.
    pub name: String,

    /// Listed price. Contains GST when `gst_type` is inclusive.
    pub base_price: Money,

    /// Maximum retail price used for the discount badge.
    pub mrp: Option<Money>,

    pub gst_rate: GstRate,

    pub gst_type: GstType,

    /// Sizes ordered by `display_order`. Empty for unsized products.
    pub sizes: Vec<Size>,

    /// Whether product is listed (soft delete).
    pub is_active: bool,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Finds a size by its label.
    pub fn size(&self, size_value: &str) -> Option<&Size> {
        self.sizes.iter().find(|s| s.size_value == size_value)
    }

    /// Returns true when the product is sold in sizes.
    #[inline]
    pub fn has_sizes(&self) -> bool {
        !self.sizes.is_empty()
    }

    /// Sorts sizes into presentation order.
    pub fn sort_sizes(&mut self) {
        self.sizes.sort_by_key(|s| s.display_order);
    }
}

// =============================================================================
// Accounts
// =============================================================================

/// Role carried by an account in the credential store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Customer,
}

// =============================================================================
// Order Status
// =============================================================================

/// Lifecycle status of an order.
///
/// ```text
///   Pending ──► Dispatched ──► Delivered
///      │            │
///      └────────────┴────────► Cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    /// Placed at checkout, awaiting dispatch.
    Pending,
    /// Handed to a courier. Shown as "Shipped".
    #[serde(alias = "shipped")]
    Dispatched,
    /// Terminal.
    Delivered,
    /// Terminal.
    Cancelled,
}

impl OrderStatus {
    /// Stored/wire representation.
    pub const fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Dispatched => "dispatched",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    /// Customer-facing label.
    pub const fn display_label(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "Pending",
            OrderStatus::Dispatched => "Shipped",
            OrderStatus::Delivered => "Delivered",
            OrderStatus::Cancelled => "Cancelled",
        }
    }

    /// No transition leaves a terminal status.
    pub const fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }
}

impl Default for OrderStatus {
    fn default() -> Self {
        OrderStatus::Pending
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(OrderStatus::Pending),
            "dispatched" | "shipped" => Ok(OrderStatus::Dispatched),
            "delivered" => Ok(OrderStatus::Delivered),
            "cancelled" => Ok(OrderStatus::Cancelled),
            other => Err(CoreError::Validation(
                crate::error::ValidationError::NotAllowed {
                    field: format!("status '{}'", other),
                    allowed: vec![
                        "pending".to_string(),
                        "dispatched".to_string(),
                        "delivered".to_string(),
                        "cancelled".to_string(),
                    ],
                },
            )),
        }
    }
}

// =============================================================================
// Address
// =============================================================================

/// Delivery address copied onto the order at checkout.
///
/// Flat and denormalized: editing the customer's saved address later does
/// not move an order that is already placed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingAddress {
    pub full_name: String,
    pub phone: String,
    pub line1: String,
    pub line2: Option<String>,
    pub city: String,
    pub state: String,
    pub pincode: String,
}

// =============================================================================
// Order Item
// =============================================================================

/// GST breakdown frozen onto an order line at purchase time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GstSnapshot {
    #[serde(rename = "priceBeforeGST")]
    pub price_before_gst: Money,
    pub gst_amount: Money,
    pub final_price: Money,
    pub gst_rate: GstRate,
    pub gst_type: GstType,
}

/// A line item in an order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub id: String,
    pub order_id: String,
    pub product_id: String,
    /// Product name at time of purchase (frozen).
    pub product_name: String,
    pub quantity: u32,
    pub selected_size: Option<String>,
    /// Unit price charged (frozen). Equals `gst.final_price`.
    pub price_at_purchase: Money,
    pub gst: GstSnapshot,
}

impl OrderItem {
    /// Pre-GST amount for the whole line.
    #[inline]
    pub fn line_before_gst(&self) -> Money {
        self.gst.price_before_gst.multiply_quantity(self.quantity)
    }

    /// GST for the whole line.
    #[inline]
    pub fn line_gst(&self) -> Money {
        self.gst.gst_amount.multiply_quantity(self.quantity)
    }

    /// Amount charged for the whole line.
    #[inline]
    pub fn line_total(&self) -> Money {
        self.price_at_purchase.multiply_quantity(self.quantity)
    }
}

// =============================================================================
// Order
// =============================================================================

/// A customer order.
///
/// Created at checkout with status `Pending` and mutated only through
/// [`crate::order_flow::apply_transition`]. Never physically deleted in
/// normal operation; cancellation is a status.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: String,
    pub user_id: String,
    pub status: OrderStatus,
    pub address: ShippingAddress,
    /// Set on dispatch.
    pub tracking_id: Option<String>,
    /// Set on dispatch.
    pub courier_company: Option<String>,
    /// Set on cancellation.
    pub reject_reason: Option<String>,
    #[serde(rename = "subtotalBeforeGST")]
    pub subtotal_before_gst: Money,
    #[serde(rename = "totalGST")]
    pub total_gst: Money,
    pub shipping_charge: Money,
    pub grand_total: Money,
    pub items: Vec<OrderItem>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Incremented on every committed status change.
    pub version: i64,
}

impl Order {
    /// Total number of units across all lines.
    pub fn total_quantity(&self) -> u32 {
        self.items.iter().map(|i| i.quantity).sum()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
