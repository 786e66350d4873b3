//! # Service Errors
//!
//! Error type for fulfillment operations, and its client-facing form.
//!
//! ## Error Handling Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Flow in Bazaar Fulfillment                     │
//! │                                                                         │
//! │  FulfillmentService::change_status                                     │
//! │         │                                                               │
//! │         ├── CoreError (transition table, fields, step-up) ──┐          │
//! │         │                                                    │          │
//! │         ├── DbError::StatusConflict ── CoreError::Conflict ──┤          │
//! │         │                                                    ▼          │
//! │         ├── DbError (everything else) ───────────────► ServiceError    │
//! │         │                                                    │          │
//! │         └── StepUpError / ConfigError ───────────────────────┤          │
//! │                                                              ▼          │
//! │                                              ApiError { code, message } │
//! │                                                                         │
//! │  {"code": "CONFLICT",                                                   │
//! │   "message": "Order 9f1c… changed concurrently: expected pending, …"}  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Storage internals never reach the client: database failures are logged
//! and replaced by a generic message.

use crate::config::ConfigError;
use crate::step_up::StepUpError;
use bazaar_core::CoreError;
use bazaar_db::DbError;
use serde::Serialize;
use thiserror::Error;

/// Result type for fulfillment operations.
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Errors returned by [`crate::FulfillmentService`].
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Pricing, cart or transition rule failure.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Storage failure other than a lost status race.
    #[error(transparent)]
    Db(DbError),

    /// Step-up verification could not run.
    #[error(transparent)]
    StepUp(#[from] StepUpError),

    /// Configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Confirm was called for an order with nothing staged.
    #[error("No cancellation is pending for order {0}")]
    NoPendingCancellation(String),

    /// A referenced record does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },
}

impl ServiceError {
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        ServiceError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Machine-readable code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            ServiceError::Core(err) => match err {
                CoreError::InvalidPriceInput { .. } => ErrorCode::InvalidPriceInput,
                CoreError::InvalidTransition { .. } => ErrorCode::InvalidTransition,
                CoreError::MissingField { .. } => ErrorCode::MissingField,
                CoreError::UnauthorizedTransition { .. } => ErrorCode::Unauthorized,
                CoreError::Conflict { .. } => ErrorCode::Conflict,
                CoreError::ProductNotFound(_) => ErrorCode::NotFound,
                CoreError::InvalidSizeConfiguration { .. } => ErrorCode::Internal,
                CoreError::SizeUnavailable { .. }
                | CoreError::SizeRequired(_)
                | CoreError::EmptyCart
                | CoreError::CartTooLarge { .. }
                | CoreError::Validation(_) => ErrorCode::ValidationError,
            },
            ServiceError::Db(DbError::NotFound { .. }) | ServiceError::NotFound { .. } => {
                ErrorCode::NotFound
            }
            ServiceError::Db(DbError::UniqueViolation { .. } | DbError::Validation(_)) => {
                ErrorCode::ValidationError
            }
            ServiceError::Db(_) => ErrorCode::DatabaseError,
            ServiceError::StepUp(_) => ErrorCode::Unauthorized,
            ServiceError::Config(_) => ErrorCode::Internal,
            ServiceError::NoPendingCancellation(_) => ErrorCode::NotFound,
        }
    }
}

/// Lost status races surface as `CoreError::Conflict`, the same error the
/// rule layer uses, so callers match one variant.
impl From<DbError> for ServiceError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::StatusConflict {
                order_id,
                expected,
                actual,
            } => ServiceError::Core(CoreError::Conflict {
                order_id,
                expected,
                actual,
            }),
            other => ServiceError::Db(other),
        }
    }
}

// =============================================================================
// Client-facing Error
// =============================================================================

/// Error body returned to clients.
///
/// ```json
/// {
///   "code": "MISSING_FIELD",
///   "message": "tracking_id is required for this status change"
/// }
/// ```
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiError {
    pub code: ErrorCode,
    pub message: String,
}

/// Error codes for API responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Negative price, rate or MRP (400)
    InvalidPriceInput,

    /// Status change not in the transition table (409)
    InvalidTransition,

    /// Tracking, courier or reject reason absent (400)
    MissingField,

    /// Step-up verification missing or failed (401)
    Unauthorized,

    /// Order changed since it was read (409)
    Conflict,

    /// Resource not found (404)
    NotFound,

    /// Input validation failed (400)
    ValidationError,

    /// Database operation failed (500)
    DatabaseError,

    /// Internal server error (500)
    Internal,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        ApiError {
            code,
            message: message.into(),
        }
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        let code = err.code();
        match err {
            ServiceError::Db(db) => match db {
                DbError::NotFound { .. }
                | DbError::UniqueViolation { .. }
                | DbError::Validation(_) => ApiError::new(code, db.to_string()),
                DbError::ForeignKeyViolation { message } => {
                    tracing::error!("Foreign key violation: {}", message);
                    ApiError::new(ErrorCode::ValidationError, "Invalid reference")
                }
                other => {
                    tracing::error!("Database operation failed: {}", other);
                    ApiError::new(code, "Database operation failed")
                }
            },
            ServiceError::StepUp(StepUpError::TimedOut { after }) => {
                tracing::warn!(after_ms = after.as_millis() as u64, "Step-up timed out");
                ApiError::new(code, "Re-authentication timed out, please try again")
            }
            ServiceError::StepUp(e) => {
                tracing::warn!("Step-up failed: {}", e);
                ApiError::new(code, "Re-authentication failed")
            }
            ServiceError::Config(e) => {
                tracing::error!("Configuration error: {}", e);
                ApiError::new(code, "Service misconfigured")
            }
            ServiceError::Core(CoreError::InvalidSizeConfiguration { reason }) => {
                tracing::error!("Invalid stored size configuration: {}", reason);
                ApiError::new(code, "Product configuration error")
            }
            other => ApiError::new(code, other.to_string()),
        }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{:?}] {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use bazaar_core::types::OrderStatus;
    use bazaar_core::ValidationError;
    use std::time::Duration;

    #[test]
    fn test_status_conflict_becomes_core_conflict() {
        let err: ServiceError = DbError::StatusConflict {
            order_id: "o1".into(),
            expected: OrderStatus::Pending,
            actual: OrderStatus::Dispatched,
        }
        .into();

        assert!(matches!(
            err,
            ServiceError::Core(CoreError::Conflict { actual: OrderStatus::Dispatched, .. })
        ));
        assert_eq!(err.code(), ErrorCode::Conflict);
    }

    #[test]
    fn test_codes_for_transition_errors() {
        let invalid = ServiceError::from(CoreError::InvalidTransition {
            from: OrderStatus::Delivered,
            to: OrderStatus::Cancelled,
        });
        let missing = ServiceError::from(CoreError::missing("tracking_id"));
        let unauthorized = ServiceError::from(CoreError::UnauthorizedTransition {
            to: OrderStatus::Cancelled,
        });

        assert_eq!(invalid.code(), ErrorCode::InvalidTransition);
        assert_eq!(missing.code(), ErrorCode::MissingField);
        assert_eq!(unauthorized.code(), ErrorCode::Unauthorized);
    }

    #[test]
    fn test_api_error_serialization() {
        let api: ApiError = ServiceError::from(CoreError::missing("tracking_id")).into();
        let json = serde_json::to_value(&api).unwrap();

        assert_eq!(json["code"], "MISSING_FIELD");
        assert_eq!(json["message"], "tracking_id is required for this status change");
    }

    #[test]
    fn test_rejected_input_is_a_validation_error() {
        let err = ServiceError::from(DbError::Validation(ValidationError::Required {
            field: "name".to_string(),
        }));
        let api: ApiError = err.into();

        assert_eq!(api.code, ErrorCode::ValidationError);
        assert!(api.message.contains("name"));
    }

    #[test]
    fn test_step_up_timeout_is_told_apart() {
        let timed_out: ApiError = ServiceError::from(StepUpError::TimedOut {
            after: Duration::from_secs(5),
        })
        .into();
        let refused: ApiError = ServiceError::from(StepUpError::InvalidCredentials).into();

        assert_eq!(timed_out.code, ErrorCode::Unauthorized);
        assert_eq!(refused.code, ErrorCode::Unauthorized);
        assert!(timed_out.message.contains("timed out"));
        assert_eq!(refused.message, "Re-authentication failed");
    }

    #[test]
    fn test_database_details_are_hidden() {
        let api: ApiError = ServiceError::from(DbError::QueryFailed("disk I/O error at page 7".into())).into();

        assert_eq!(api.code, ErrorCode::DatabaseError);
        assert_eq!(api.message, "Database operation failed");
        assert_eq!(api.to_string(), "[DatabaseError] Database operation failed");
    }
}
