//! # Pending Cancellations
//!
//! Holding area for cancellations that were requested but not yet
//! confirmed by step-up verification.
//!
//! ## Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  stage(order, reason) ──► { order_id → PendingCancellation }           │
//! │                                  │                                      │
//! │              ┌───────────────────┼────────────────────┐                 │
//! │              ▼                   ▼                    ▼                 │
//! │         dismiss()          take() + verified     take() + not verified  │
//! │         entry dropped,     order cancelled       entry dropped,         │
//! │         order untouched                          order untouched        │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Staging the same order twice replaces the earlier entry. Entries live in
//! memory only; nothing here is persisted. An entry older than the
//! configured time-to-live is dropped the next time the map is touched.

use bazaar_core::{CoreError, CoreResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::debug;

/// How long a staged cancellation waits for confirmation by default.
pub const DEFAULT_PENDING_TTL: Duration = Duration::from_secs(600);

/// A cancellation waiting for the acting admin to re-authenticate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingCancellation {
    pub order_id: String,
    pub reject_reason: String,
    /// Admin who staged it; only this session may confirm.
    pub staged_by: String,
    pub staged_at: DateTime<Utc>,
}

/// Pending cancellations keyed by order id.
#[derive(Debug)]
pub struct PendingCancellations {
    entries: Mutex<HashMap<String, PendingCancellation>>,
    ttl: Duration,
}

impl Default for PendingCancellations {
    fn default() -> Self {
        Self::with_ttl(DEFAULT_PENDING_TTL)
    }
}

impl PendingCancellations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        PendingCancellations {
            entries: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Records a cancellation request.
    ///
    /// The reason is trimmed; a blank reason is rejected before anything
    /// is stored.
    pub async fn stage(
        &self,
        order_id: &str,
        reason: &str,
        staged_by: &str,
    ) -> CoreResult<PendingCancellation> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(CoreError::missing("reject_reason"));
        }

        let entry = PendingCancellation {
            order_id: order_id.to_string(),
            reject_reason: reason.to_string(),
            staged_by: staged_by.to_string(),
            staged_at: Utc::now(),
        };

        let mut entries = self.entries.lock().await;
        self.purge_expired(&mut entries);
        entries.insert(order_id.to_string(), entry.clone());

        Ok(entry)
    }

    pub async fn get(&self, order_id: &str) -> Option<PendingCancellation> {
        let mut entries = self.entries.lock().await;
        self.purge_expired(&mut entries);
        entries.get(order_id).cloned()
    }

    /// Removes and returns the entry for `order_id`.
    pub async fn take(&self, order_id: &str) -> Option<PendingCancellation> {
        let mut entries = self.entries.lock().await;
        self.purge_expired(&mut entries);
        entries.remove(order_id)
    }

    /// Removes and returns the entry for `order_id` only if `email` staged
    /// it. An entry staged by someone else stays in place.
    pub async fn take_staged_by(&self, order_id: &str, email: &str) -> Option<PendingCancellation> {
        let mut entries = self.entries.lock().await;
        self.purge_expired(&mut entries);
        match entries.get(order_id) {
            Some(entry) if entry.staged_by == email => entries.remove(order_id),
            _ => None,
        }
    }

    /// Drops the entry for `order_id`. Returns whether one existed.
    pub async fn dismiss(&self, order_id: &str) -> bool {
        self.take(order_id).await.is_some()
    }

    pub async fn len(&self) -> usize {
        let mut entries = self.entries.lock().await;
        self.purge_expired(&mut entries);
        entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    fn purge_expired(&self, entries: &mut HashMap<String, PendingCancellation>) {
        let now = Utc::now();
        let before = entries.len();
        // A staged_at ahead of the clock counts as fresh.
        entries.retain(|_, entry| match (now - entry.staged_at).to_std() {
            Ok(age) => age <= self.ttl,
            Err(_) => true,
        });

        let expired = before - entries.len();
        if expired > 0 {
            debug!(expired, ttl = ?self.ttl, "Expired pending cancellations dropped");
        }
    }
}
