//! # Cart
//!
//! The checkout cart. Each line freezes the unit breakdown at the moment it
//! was added, and the cart quotes totals through the same price engine used
//! by order listings.
//!
//! ## Cart Operations Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  add_item(product, size, qty)                                          │
//! │       │                                                                 │
//! │       ├── same product + size already in cart? → merge quantity        │
//! │       └── new line → breakdown_for(product, size) frozen on the line   │
//! │                                                                         │
//! │  update_quantity(product, size, 0) → removes the line                  │
//! │                                                                         │
//! │  quote(policy) → OrderTotals (subtotal, GST, shipping, grand total)    │
//! │                                                                         │
//! │  place_order(user, address, policy) → pending Order with frozen lines  │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::pricing::{breakdown_for, quote_order, OrderTotals, PriceBreakdown, PricedLine, ShippingPolicy};
use crate::types::{GstRate, GstType, Order, OrderItem, OrderStatus, Product, ShippingAddress};
use crate::validation::{validate_address, validate_cart_size, validate_quantity};
use crate::MAX_CART_LINES;

/// A line in the cart.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    pub product_id: String,

    /// Product name at time of adding (frozen)
    pub product_name: String,

    pub selected_size: Option<String>,

    pub quantity: u32,

    /// Unit breakdown at time of adding (frozen)
    pub unit: PriceBreakdown,

    pub gst_rate: GstRate,

    pub gst_type: GstType,

    pub added_at: DateTime<Utc>,
}

impl CartLine {
    fn priced(&self) -> PricedLine {
        PricedLine {
            unit: self.unit,
            quantity: self.quantity,
        }
    }

    fn matches(&self, product_id: &str, size: Option<&str>) -> bool {
        self.product_id == product_id && self.selected_size.as_deref() == size
    }
}

/// The shopping cart.
///
/// ## Invariants
/// - Lines are unique by (product_id, selected_size)
/// - Quantity is 1..=MAX_LINE_QUANTITY
/// - At most MAX_CART_LINES lines
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    pub lines: Vec<CartLine>,
    pub created_at: DateTime<Utc>,
}

impl Cart {
    /// Creates a new empty cart.
    pub fn new() -> Self {
        Cart {
            lines: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// Adds a product (in a size, when it is sold in sizes).
    ///
    /// ## Errors
    /// - `ProductNotFound` for an unlisted product
    /// - `SizeRequired` / `SizeUnavailable` for a bad size selection
    /// - `Validation` when the merged quantity or line count is out of range
    pub fn add_item(&mut self, product: &Product, size: Option<&str>, quantity: u32) -> CoreResult<()> {
        validate_quantity(quantity)?;

        if !product.is_active {
            return Err(CoreError::ProductNotFound(product.id.clone()));
        }

        let size = match (product.has_sizes(), size) {
            (true, None) => return Err(CoreError::SizeRequired(product.id.clone())),
            (true, Some(label)) => match product.size(label) {
                Some(s) if s.is_available => Some(s),
                _ => {
                    return Err(CoreError::SizeUnavailable {
                        product_id: product.id.clone(),
                        size: label.to_string(),
                    })
                }
            },
            (false, Some(label)) => {
                return Err(CoreError::SizeUnavailable {
                    product_id: product.id.clone(),
                    size: label.to_string(),
                })
            }
            (false, None) => None,
        };

        let size_label = size.map(|s| s.size_value.as_str());

        if let Some(line) = self.lines.iter_mut().find(|l| l.matches(&product.id, size_label)) {
            let merged = line.quantity.saturating_add(quantity);
            validate_quantity(merged)?;
            line.quantity = merged;
            return Ok(());
        }

        validate_cart_size(self.lines.len())
            .map_err(|_| CoreError::CartTooLarge { max: MAX_CART_LINES })?;

        self.lines.push(CartLine {
            product_id: product.id.clone(),
            product_name: product.name.clone(),
            selected_size: size_label.map(str::to_string),
            quantity,
            unit: breakdown_for(product, size)?,
            gst_rate: product.gst_rate,
            gst_type: product.gst_type,
            added_at: Utc::now(),
        });
        Ok(())
    }

    /// Sets a line's quantity. Zero removes the line.
    pub fn update_quantity(&mut self, product_id: &str, size: Option<&str>, quantity: u32) -> CoreResult<()> {
        if quantity == 0 {
            return self.remove_item(product_id, size);
        }

        validate_quantity(quantity)?;

        match self.lines.iter_mut().find(|l| l.matches(product_id, size)) {
            Some(line) => {
                line.quantity = quantity;
                Ok(())
            }
            None => Err(CoreError::ProductNotFound(product_id.to_string())),
        }
    }

    /// Removes a line.
    pub fn remove_item(&mut self, product_id: &str, size: Option<&str>) -> CoreResult<()> {
        let before = self.lines.len();
        self.lines.retain(|l| !l.matches(product_id, size));

        if self.lines.len() == before {
            Err(CoreError::ProductNotFound(product_id.to_string()))
        } else {
            Ok(())
        }
    }

    /// Clears all lines.
    pub fn clear(&mut self) {
        self.lines.clear();
        self.created_at = Utc::now();
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Total units across all lines.
    pub fn total_quantity(&self) -> u32 {
        self.lines.iter().map(|l| l.quantity).sum()
    }

    /// Checkout totals for the cart as it stands.
    pub fn quote(&self, policy: &ShippingPolicy) -> OrderTotals {
        let priced: Vec<PricedLine> = self.lines.iter().map(CartLine::priced).collect();
        quote_order(&priced, policy)
    }

    /// Freezes the cart into a new pending order.
    ///
    /// Every line's unit breakdown becomes the item's GST snapshot, and the
    /// order totals come from [`Cart::quote`]. Ids are fresh UUIDs.
    ///
    /// ## Errors
    /// - `EmptyCart` when there is nothing to order
    /// - `Validation` when the delivery address is incomplete
    pub fn place_order(
        &self,
        user_id: &str,
        address: ShippingAddress,
        policy: &ShippingPolicy,
    ) -> CoreResult<Order> {
        if self.is_empty() {
            return Err(CoreError::EmptyCart);
        }
        validate_address(&address)?;

        let order_id = uuid::Uuid::new_v4().to_string();
        let totals = self.quote(policy);
        let now = Utc::now();

        let items = self
            .lines
            .iter()
            .map(|line| OrderItem {
                id: uuid::Uuid::new_v4().to_string(),
                order_id: order_id.clone(),
                product_id: line.product_id.clone(),
                product_name: line.product_name.clone(),
                quantity: line.quantity,
                selected_size: line.selected_size.clone(),
                price_at_purchase: line.unit.final_price,
                gst: line.unit.snapshot(line.gst_rate, line.gst_type),
            })
            .collect();

        Ok(Order {
            id: order_id,
            user_id: user_id.to_string(),
            status: OrderStatus::Pending,
            address,
            tracking_id: None,
            courier_company: None,
            reject_reason: None,
            subtotal_before_gst: totals.subtotal_before_gst,
            total_gst: totals.total_gst,
            shipping_charge: totals.shipping,
            grand_total: totals.grand_total,
            items,
            created_at: now,
            updated_at: now,
            version: 0,
        })
    }
}

impl Default for Cart {
    fn default() -> Self {
        Cart::new()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
