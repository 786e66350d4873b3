//! # bazaar-core: Pure Business Logic for Bazaar
//!
//! This crate is the **heart** of Bazaar. It contains the pricing and order
//! fulfillment rules as pure functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Bazaar Architecture                              │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │              HTTP layer (external to this workspace)            │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    bazaar-fulfillment                           │   │
//! │  │   checkout, change_status, step-up verification                 │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ bazaar-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │  pricing  │  │ order_flow│  │ validation│  │   │
//! │  │   │  Product  │  │ Breakdown │  │ Transition│  │   rules   │  │   │
//! │  │   │   Order   │  │ Shipping  │  │   table   │  │  checks   │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    bazaar-db (Database Layer)                   │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Product, Size, Order, OrderItem, ...)
//! - [`money`] - Money in integer paise, decimal rounding helpers
//! - [`pricing`] - GST breakdowns, size prices, shipping, order totals
//! - [`cart`] - Checkout cart with frozen line prices
//! - [`order_flow`] - Order status transition table
//! - [`error`] - Domain error types
//! - [`validation`] - Business rule validation
//!
//! ## Example Usage
//!
//! ```rust
//! use bazaar_core::pricing::{compute_breakdown, PriceInput};
//! use bazaar_core::types::GstType;
//! use rust_decimal::Decimal;
//!
//! let breakdown = compute_breakdown(&PriceInput {
//!     base_price: Decimal::from(1000),
//!     mrp: Some(Decimal::from(1200)),
//!     gst_rate_percent: Decimal::from(18),
//!     gst_type: GstType::Exclusive,
//! })
//! .unwrap();
//!
//! assert_eq!(breakdown.final_price.paise(), 118_000);
//! assert_eq!(breakdown.discount_percent, 2);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod cart;
pub mod error;
pub mod money;
pub mod order_flow;
pub mod pricing;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use cart::{Cart, CartLine};
pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use order_flow::{apply_transition, AuthContext, TransitionPayload};
pub use pricing::{compute_breakdown, OrderTotals, PriceBreakdown, PriceInput, ShippingPolicy};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum lines allowed in a single cart.
pub const MAX_CART_LINES: usize = 50;

/// Maximum quantity of a single line.
pub const MAX_LINE_QUANTITY: u32 = 99;
