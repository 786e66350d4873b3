//! # Order Flow
//!
//! The order status state machine: an explicit transition table over
//! [`OrderStatus`], checked exhaustively.
//!
//! ## Transition Table
//! ```text
//! ┌──────────────┬──────────────┬─────────────────────────────┬──────────┐
//! │ From         │ To           │ Required extra data         │ Step-up  │
//! ├──────────────┼──────────────┼─────────────────────────────┼──────────┤
//! │ pending      │ dispatched   │ tracking_id, courier_company│ no       │
//! │ pending      │ cancelled    │ reject_reason               │ yes      │
//! │ dispatched   │ delivered    │ -                           │ no       │
//! │ dispatched   │ cancelled    │ reject_reason               │ yes      │
//! └──────────────┴──────────────┴─────────────────────────────┴──────────┘
//! ```
//! Delivered and cancelled are terminal.
//!
//! ## Check Order
//! ```text
//! apply_transition(order, target, payload, auth)
//!      │
//!      ├── edge not in table?       → InvalidTransition
//!      ├── required field blank?    → MissingField
//!      ├── step-up edge, !verified? → UnauthorizedTransition
//!      │
//!      └── OK → new Order value (input untouched)
//! ```
//! The returned order is committed by the persistence layer with a
//! compare-and-swap on the status it was read with.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::types::{Order, OrderStatus};
use crate::validation::required_text;

/// Maximum length of tracking ids, courier names and reject reasons.
const MAX_FIELD_LEN: usize = 500;

// =============================================================================
// Transition Rules
// =============================================================================

/// Extra data a transition must carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequiredFields {
    None,
    /// tracking_id and courier_company.
    Dispatch,
    /// reject_reason.
    Rejection,
}

/// One edge of the transition table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionRule {
    pub from: OrderStatus,
    pub to: OrderStatus,
    pub requires: RequiredFields,
    /// Destructive edges need the acting admin to re-enter their password.
    pub requires_step_up: bool,
}

/// Looks up the edge `from → to`.
///
/// Returns `None` when the edge does not exist.
pub fn transition_rule(from: OrderStatus, to: OrderStatus) -> Option<TransitionRule> {
    use OrderStatus::*;

    let (requires, requires_step_up) = match (from, to) {
        (Pending, Dispatched) => (RequiredFields::Dispatch, false),
        (Pending, Cancelled) => (RequiredFields::Rejection, true),
        (Dispatched, Delivered) => (RequiredFields::None, false),
        (Dispatched, Cancelled) => (RequiredFields::Rejection, true),
        (Pending, Pending | Delivered)
        | (Dispatched, Pending | Dispatched)
        | (Delivered, _)
        | (Cancelled, _) => return None,
    };

    Some(TransitionRule {
        from,
        to,
        requires,
        requires_step_up,
    })
}

/// Statuses reachable from `from`, for rendering the admin's action menu.
pub fn allowed_targets(from: OrderStatus) -> Vec<OrderStatus> {
    [
        OrderStatus::Pending,
        OrderStatus::Dispatched,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
    ]
    .into_iter()
    .filter(|to| transition_rule(from, *to).is_some())
    .collect()
}

/// Returns true when moving to `to` from `from` needs a step-up check.
pub fn requires_step_up(from: OrderStatus, to: OrderStatus) -> bool {
    transition_rule(from, to).is_some_and(|rule| rule.requires_step_up)
}

// =============================================================================
// Inputs
// =============================================================================

/// Extra data supplied with a status change.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionPayload {
    pub tracking_id: Option<String>,
    pub courier_company: Option<String>,
    pub reject_reason: Option<String>,
}

impl TransitionPayload {
    /// Payload for a dispatch.
    pub fn dispatch(tracking_id: impl Into<String>, courier_company: impl Into<String>) -> Self {
        TransitionPayload {
            tracking_id: Some(tracking_id.into()),
            courier_company: Some(courier_company.into()),
            reject_reason: None,
        }
    }

    /// Payload for a cancellation.
    pub fn rejection(reason: impl Into<String>) -> Self {
        TransitionPayload {
            reject_reason: Some(reason.into()),
            ..Default::default()
        }
    }
}

/// Who is acting, and whether they passed step-up verification.
///
/// Passed explicitly by the caller; `verified` is only ever set after the
/// credential check for `admin_email` succeeded with the admin role. It is
/// never read from wire input: a deserialized context is always unverified.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthContext {
    #[serde(skip_deserializing)]
    pub verified: bool,
    pub admin_email: String,
}

impl AuthContext {
    /// Context for an admin who has not re-entered their password.
    pub fn unverified(admin_email: impl Into<String>) -> Self {
        AuthContext {
            verified: false,
            admin_email: admin_email.into(),
        }
    }

    /// Context after a successful step-up check.
    pub fn verified(admin_email: impl Into<String>) -> Self {
        AuthContext {
            verified: true,
            admin_email: admin_email.into(),
        }
    }
}

// =============================================================================
// Apply
// =============================================================================

/// Validates and applies a status change.
///
/// ## Returns
/// A new `Order` with the target status, the transition's extra fields and
/// a fresh `updated_at`. The input order is never modified, so a failed
/// call leaves no partial state behind.
///
/// ## Errors
/// - `InvalidTransition` when `order.status → target` is not in the table
/// - `MissingField` when a required payload field is absent or blank
/// - `UnauthorizedTransition` for cancellations without `auth.verified`
///
/// ## Example
/// ```rust,ignore
/// let dispatched = apply_transition(
///     &order,
///     OrderStatus::Dispatched,
///     &TransitionPayload::dispatch("AWB123", "BlueDart"),
///     &AuthContext::unverified("ops@bazaar.in"),
/// )?;
/// ```
pub fn apply_transition(
    order: &Order,
    target: OrderStatus,
    payload: &TransitionPayload,
    auth: &AuthContext,
) -> CoreResult<Order> {
    let rule = transition_rule(order.status, target).ok_or(CoreError::InvalidTransition {
        from: order.status,
        to: target,
    })?;

    let mut updated = order.clone();

    match rule.requires {
        RequiredFields::None => {}
        RequiredFields::Dispatch => {
            updated.tracking_id = Some(required_field("tracking_id", &payload.tracking_id)?);
            updated.courier_company =
                Some(required_field("courier_company", &payload.courier_company)?);
        }
        RequiredFields::Rejection => {
            updated.reject_reason = Some(required_field("reject_reason", &payload.reject_reason)?);
        }
    }

    if rule.requires_step_up && !auth.verified {
        return Err(CoreError::UnauthorizedTransition { to: target });
    }

    updated.status = target;
    updated.updated_at = Utc::now();

    Ok(updated)
}

fn required_field(field: &str, value: &Option<String>) -> CoreResult<String> {
    let value = value.as_deref().unwrap_or_default();
    if value.trim().is_empty() {
        return Err(CoreError::missing(field));
    }
    Ok(required_text(field, value, MAX_FIELD_LEN)?)
}

// =============================================================================
// Unit Tests
// =============================================================================
