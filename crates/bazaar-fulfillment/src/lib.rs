//! # bazaar-fulfillment: Order Fulfillment Service
//!
//! Composes the price engine and the order state machine with persistence
//! and step-up verification of the acting admin.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  HTTP layer (storefront + admin panel)                                 │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │               bazaar-fulfillment (THIS CRATE)                   │   │
//! │  │                                                                 │   │
//! │  │  FulfillmentService ──► StepUpGate ──► CredentialVerifier       │   │
//! │  │         │                                                       │   │
//! │  │         ├──► PendingCancellations                               │   │
//! │  │         │                                                       │   │
//! │  │         └──► ServiceError ──► ApiError { code, message }        │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                         │                                       │
//! │       ▼                         ▼                                       │
//! │  bazaar-core               bazaar-db                                    │
//! │  (pricing, order_flow)     (SQLite, CAS commit, admin accounts)        │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use bazaar_fulfillment::{telemetry, AdminSession, FulfillmentConfig, FulfillmentService};
//!
//! telemetry::init();
//! let service = FulfillmentService::connect(&FulfillmentConfig::load()?).await?;
//!
//! let session = AdminSession::new("ops@bazaar.in");
//! service.stage_cancellation(&order_id, "Out of stock", &session).await?;
//! let cancelled = service.confirm_cancellation(&order_id, &session, &password).await?;
//! ```

pub mod config;
pub mod error;
pub mod pending;
pub mod service;
pub mod step_up;
pub mod telemetry;

pub use config::{ConfigError, FulfillmentConfig};
pub use error::{ApiError, ErrorCode, ServiceError, ServiceResult};
pub use pending::{PendingCancellation, PendingCancellations, DEFAULT_PENDING_TTL};
pub use service::{FulfillmentService, OrderSummary, TransitionRequest};
pub use step_up::{
    AccountVerifier, AdminSession, CredentialVerifier, StepUpError, StepUpGate, VerifiedIdentity,
};
