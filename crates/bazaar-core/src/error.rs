//! # Error Types
//!
//! Domain-specific error types for bazaar-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  bazaar-core errors (this file)                                        │
//! │  ├── CoreError        - Pricing and order-flow rule violations         │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  bazaar-db errors (separate crate)                                     │
//! │  └── DbError          - Database failures, status conflicts            │
//! │                                                                         │
//! │  bazaar-fulfillment errors                                             │
//! │  └── ServiceError     - What the HTTP layer sees (code + message)      │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → ServiceError → ApiError           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every variant is locally recoverable: the caller surfaces a message and
//! the order or price state is left as it was.

use thiserror::Error;

use crate::types::OrderStatus;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Bad numeric input to the price engine (negative price, rate or MRP).
    #[error("Invalid price input: {field} {reason}")]
    InvalidPriceInput { field: String, reason: String },

    /// The requested status change is not an edge of the transition table.
    ///
    /// ## When This Occurs
    /// - Skipping a step (pending → delivered)
    /// - Moving backwards (dispatched → pending)
    /// - Anything out of delivered or cancelled
    #[error("Cannot move order from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    /// A field the transition needs is absent or blank.
    #[error("{field} is required for this status change")]
    MissingField { field: String },

    /// A destructive transition was attempted without a verified step-up.
    #[error("Re-authentication required to move order to {to}")]
    UnauthorizedTransition { to: OrderStatus },

    /// The order's status changed between read and commit.
    ///
    /// ## User Workflow
    /// ```text
    /// Admin A reads order (pending) ──► dispatches ──► commit OK
    /// Admin B reads order (pending) ──► cancels   ──► commit: status is
    ///                                                 now dispatched
    ///                                                      │
    ///                                                      ▼
    ///                                     Conflict { expected: pending,
    ///                                                actual: dispatched }
    /// ```
    #[error("Order {order_id} changed concurrently: expected {expected}, found {actual}")]
    Conflict {
        order_id: String,
        expected: OrderStatus,
        actual: OrderStatus,
    },

    /// A stored size violates its price-modifier invariant.
    #[error("Invalid size configuration: {reason}")]
    InvalidSizeConfiguration { reason: String },

    /// The selected size does not exist or is not currently available.
    #[error("Size '{size}' is not available for product {product_id}")]
    SizeUnavailable { product_id: String, size: String },

    /// A sized product was added without choosing a size.
    #[error("Product {0} requires a size selection")]
    SizeRequired(String),

    /// Product cannot be found or is no longer listed.
    #[error("Product not found: {0}")]
    ProductNotFound(String),

    /// Checkout attempted with nothing in the cart.
    #[error("Cart is empty")]
    EmptyCart,

    /// Cart has exceeded maximum allowed lines.
    #[error("Cart cannot have more than {max} lines")]
    CartTooLarge { max: usize },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// Creates an InvalidPriceInput error.
    pub fn invalid_price(field: impl Into<String>, reason: impl Into<String>) -> Self {
        CoreError::InvalidPriceInput {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Creates a MissingField error.
    pub fn missing(field: impl Into<String>) -> Self {
        CoreError::MissingField {
            field: field.into(),
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These errors occur when user input doesn't meet requirements.
/// Used for early validation before business logic runs.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Invalid format (e.g., invalid UUID, invalid pincode).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value is not in allowed set.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
