//! # Price Engine
//!
//! Deterministic GST breakdowns, per-size price resolution, shipping and
//! order totals. Checkout, cart display and order listings all go through
//! these functions, so every screen shows the same figures.
//!
//! ## Breakdown Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  Product.base_price ──┐                                                 │
//! │  Size.price_modifier ─┴─► resolve_size_price ──► PriceInput             │
//! │                                                     │                   │
//! │                                                     ▼                   │
//! │                                          compute_breakdown              │
//! │                                                     │                   │
//! │        ┌────────────────────────────────────────────┘                   │
//! │        ▼                                                                │
//! │  PriceBreakdown { price_before_gst, gst_amount, final_price,            │
//! │                   discount_percent, mrp }                               │
//! │        │                                                                │
//! │        ▼  × quantity, per line                                          │
//! │  quote_order ──► subtotal + GST + shipping = grand total                │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Rounding
//! All arithmetic is done in `Decimal`; every monetary output is rounded to
//! 2 places half away from zero. Line totals multiply already-rounded unit
//! figures, so summed lines equal the grand total to the paisa.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::{GstRate, GstSnapshot, GstType, PriceModifier, Product, Size};

// =============================================================================
// Breakdown
// =============================================================================

/// Largest unit price (after GST) or MRP the engine accepts: ₹100 crore.
///
/// Keeps every line and order total of a full cart inside `i64` paise.
pub const MAX_UNIT_PRICE: Money = Money::from_rupees(1_000_000_000);

/// Raw pricing input, as received from the HTTP layer.
///
/// ```json
/// {"basePrice": 1000, "mrp": 1200, "gstRatePercent": 18, "gstType": "exclusive"}
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceInput {
    pub base_price: Decimal,
    #[serde(default)]
    pub mrp: Option<Decimal>,
    pub gst_rate_percent: Decimal,
    pub gst_type: GstType,
}

/// Complete price breakdown for one unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceBreakdown {
    #[serde(rename = "priceBeforeGST")]
    pub price_before_gst: Money,
    pub gst_amount: Money,
    pub final_price: Money,
    /// Whole percent off MRP, 0 when MRP does not exceed the final price.
    pub discount_percent: u32,
    pub mrp: Money,
}

impl PriceBreakdown {
    /// Freezes this breakdown for an order line.
    pub fn snapshot(&self, gst_rate: GstRate, gst_type: GstType) -> GstSnapshot {
        GstSnapshot {
            price_before_gst: self.price_before_gst,
            gst_amount: self.gst_amount,
            final_price: self.final_price,
            gst_rate,
            gst_type,
        }
    }
}

/// Computes the GST breakdown for a single unit.
///
/// ## Algorithm
/// ```text
/// inclusive:  price_before_gst = base / (1 + r/100)
///             gst_amount       = final - price_before_gst
///             final_price      = base
///
/// exclusive:  price_before_gst = base
///             gst_amount       = base × r/100
///             final_price      = price_before_gst + gst_amount
///
/// discount    = mrp > final ? round((mrp - final) / mrp × 100) : 0
/// ```
/// MRP defaults to the base price when absent or zero.
///
/// ## Errors
/// `InvalidPriceInput` for a negative base price, GST rate or MRP.
///
/// ## Example
/// ```rust
/// use bazaar_core::pricing::{compute_breakdown, PriceInput};
/// use bazaar_core::types::GstType;
/// use rust_decimal::Decimal;
///
/// let b = compute_breakdown(&PriceInput {
///     base_price: Decimal::from(1180),
///     mrp: None,
///     gst_rate_percent: Decimal::from(18),
///     gst_type: GstType::Inclusive,
/// })
/// .unwrap();
///
/// assert_eq!(b.price_before_gst.paise(), 100_000);
/// assert_eq!(b.gst_amount.paise(), 18_000);
/// assert_eq!(b.final_price.paise(), 118_000);
/// ```
pub fn compute_breakdown(input: &PriceInput) -> CoreResult<PriceBreakdown> {
    if input.base_price < Decimal::ZERO {
        return Err(CoreError::invalid_price("base_price", "must not be negative"));
    }
    if input.gst_rate_percent < Decimal::ZERO {
        return Err(CoreError::invalid_price("gst_rate_percent", "must not be negative"));
    }
    if matches!(input.mrp, Some(mrp) if mrp < Decimal::ZERO) {
        return Err(CoreError::invalid_price("mrp", "must not be negative"));
    }

    let rate = input.gst_rate_percent / Decimal::from(100);

    let (price_before_gst, final_price) = match input.gst_type {
        GstType::Inclusive => {
            // 1 + rate >= 1, so the divisor is never zero
            let divisor = Decimal::ONE
                .checked_add(rate)
                .ok_or_else(|| CoreError::invalid_price("gst_rate_percent", "out of range"))?;
            let before = input
                .base_price
                .checked_div(divisor)
                .ok_or_else(|| CoreError::invalid_price("base_price", "out of range"))?;
            (to_money(before, "base_price")?, to_money(input.base_price, "base_price")?)
        }
        GstType::Exclusive => {
            let before = to_money(input.base_price, "base_price")?;
            let gst = input
                .base_price
                .checked_mul(rate)
                .ok_or_else(|| CoreError::invalid_price("base_price", "out of range"))?;
            let final_price = before
                .checked_add(to_money(gst, "base_price")?)
                .ok_or_else(|| CoreError::invalid_price("base_price", "out of range"))?;
            (before, final_price)
        }
    };

    let mrp = match input.mrp {
        Some(mrp) if mrp > Decimal::ZERO => to_money(mrp, "mrp")?,
        _ => to_money(input.base_price, "base_price")?,
    };

    if final_price > MAX_UNIT_PRICE {
        return Err(CoreError::invalid_price("base_price", "exceeds the maximum unit price"));
    }
    if mrp > MAX_UNIT_PRICE {
        return Err(CoreError::invalid_price("mrp", "exceeds the maximum unit price"));
    }

    Ok(PriceBreakdown {
        price_before_gst,
        gst_amount: final_price - price_before_gst,
        final_price,
        discount_percent: discount_percent(mrp, final_price),
        mrp,
    })
}

/// Whole percent off MRP, rounded half up.
fn discount_percent(mrp: Money, final_price: Money) -> u32 {
    if mrp <= final_price {
        return 0;
    }

    let off = (mrp - final_price).to_decimal() / mrp.to_decimal() * Decimal::from(100);
    off.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_u32()
        .unwrap_or(0)
}

fn to_money(amount: Decimal, field: &str) -> CoreResult<Money> {
    Money::from_decimal(amount).ok_or_else(|| CoreError::invalid_price(field, "out of range"))
}

// =============================================================================
// Sizes
// =============================================================================

/// Resolves the unit price of a size before GST handling.
///
/// ## Rules
/// - `Fixed`: the size's own price
/// - `Percentage`: `base × (1 + value/100)`, rounded to paise
/// - `None`: the product's base price
///
/// ## Errors
/// `InvalidPriceInput` when a markdown takes the price below zero.
pub fn resolve_size_price(product: &Product, size: &Size) -> CoreResult<Money> {
    let price = match size.price_modifier {
        PriceModifier::Fixed { price } => price,
        PriceModifier::Percentage { value } => {
            let factor = Decimal::ONE + value / Decimal::from(100);
            let scaled = product
                .base_price
                .to_decimal()
                .checked_mul(factor)
                .ok_or_else(|| CoreError::invalid_price("price_modifier_value", "out of range"))?;
            to_money(scaled, "price_modifier_value")?
        }
        PriceModifier::None => product.base_price,
    };

    if price.is_negative() {
        return Err(CoreError::invalid_price("size_price", "must not be negative"));
    }

    Ok(price)
}

/// Breakdown for a product, optionally in a specific size.
///
/// The size's price feeds in as the base price; GST rate and type always
/// come from the product. MRP is the size override when set, else the
/// product's MRP.
pub fn breakdown_for(product: &Product, size: Option<&Size>) -> CoreResult<PriceBreakdown> {
    let (price, mrp) = match size {
        Some(size) => (resolve_size_price(product, size)?, size.mrp.or(product.mrp)),
        None => (product.base_price, product.mrp),
    };

    compute_breakdown(&PriceInput {
        base_price: price.to_decimal(),
        mrp: mrp.map(|m| m.to_decimal()),
        gst_rate_percent: product.gst_rate.percent(),
        gst_type: product.gst_type,
    })
}

// =============================================================================
// Shipping
// =============================================================================

/// Order-level shipping rule.
///
/// A step function: orders whose pre-GST subtotal is above zero and below
/// `free_threshold` pay `flat_charge`; empty orders and orders at or above
/// the threshold ship free.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingPolicy {
    pub free_threshold: Money,
    pub flat_charge: Money,
}

impl ShippingPolicy {
    /// Shipping charge for a pre-GST subtotal.
    ///
    /// ## Example
    /// ```rust
    /// use bazaar_core::money::Money;
    /// use bazaar_core::pricing::ShippingPolicy;
    ///
    /// let policy = ShippingPolicy::default();
    /// assert_eq!(policy.charge_for(Money::from_paise(99_999)), Money::from_rupees(150));
    /// assert_eq!(policy.charge_for(Money::from_rupees(1000)), Money::zero());
    /// assert_eq!(policy.charge_for(Money::zero()), Money::zero());
    /// ```
    pub fn charge_for(&self, subtotal_before_gst: Money) -> Money {
        if subtotal_before_gst.is_positive() && subtotal_before_gst < self.free_threshold {
            self.flat_charge
        } else {
            Money::zero()
        }
    }
}

impl Default for ShippingPolicy {
    fn default() -> Self {
        ShippingPolicy {
            free_threshold: Money::from_rupees(1000),
            flat_charge: Money::from_rupees(150),
        }
    }
}

// =============================================================================
// Order Totals
// =============================================================================

/// One priced line of a cart or order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PricedLine {
    pub unit: PriceBreakdown,
    pub quantity: u32,
}

/// Totals for one line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineTotal {
    #[serde(rename = "beforeGST")]
    pub before_gst: Money,
    pub gst: Money,
    pub total: Money,
}

/// Order-level figures shown at checkout and stored on the order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderTotals {
    pub lines: Vec<LineTotal>,
    #[serde(rename = "subtotalBeforeGST")]
    pub subtotal_before_gst: Money,
    #[serde(rename = "totalGST")]
    pub total_gst: Money,
    pub shipping: Money,
    pub grand_total: Money,
}

/// Sums priced lines into order totals.
///
/// `grand_total = subtotal_before_gst + total_gst + shipping`, where the
/// subtotal and GST are sums of unit figures × quantity.
pub fn quote_order(lines: &[PricedLine], policy: &ShippingPolicy) -> OrderTotals {
    let lines: Vec<LineTotal> = lines
        .iter()
        .map(|line| {
            let before_gst = line.unit.price_before_gst.multiply_quantity(line.quantity);
            let gst = line.unit.gst_amount.multiply_quantity(line.quantity);
            LineTotal {
                before_gst,
                gst,
                total: before_gst + gst,
            }
        })
        .collect();

    let subtotal_before_gst: Money = lines.iter().map(|l| l.before_gst).sum();
    let total_gst: Money = lines.iter().map(|l| l.gst).sum();
    let shipping = policy.charge_for(subtotal_before_gst);

    OrderTotals {
        lines,
        subtotal_before_gst,
        total_gst,
        shipping,
        grand_total: subtotal_before_gst + total_gst + shipping,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
