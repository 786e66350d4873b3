//! # Step-up Verification
//!
//! Re-confirms the signed-in admin's identity before a destructive status
//! change, without issuing a new session.
//!
//! ## Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  AdminSession { email }  +  freshly entered password                   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  StepUpGate::authorize                                                 │
//! │       │                                                                 │
//! │       ├── tokio::time::timeout(step_up_timeout, ...)                   │
//! │       │        │                                                        │
//! │       │        ▼                                                        │
//! │       │   CredentialVerifier::verify(session.email, password)          │
//! │       │        │                                                        │
//! │       │        └── AccountVerifier: admin_accounts + argon2            │
//! │       │                                                                 │
//! │       ├── Ok + role admin      → Ok(AuthContext { verified: true })    │
//! │       └── error / timeout /    → Err(StepUpError), logged              │
//! │           non-admin role                                                │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The email checked is always the session's own; a password for some other
//! account never verifies the current session.

use async_trait::async_trait;
use bazaar_core::types::Role;
use bazaar_core::AuthContext;
use bazaar_db::repository::admin::verify_password;
use bazaar_db::AdminRepository;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

// =============================================================================
// Types
// =============================================================================

/// The admin currently signed in, as established by the session layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminSession {
    pub email: String,
}

impl AdminSession {
    pub fn new(email: impl Into<String>) -> Self {
        AdminSession { email: email.into() }
    }
}

/// Identity confirmed by a credential check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifiedIdentity {
    pub email: String,
    pub role: Role,
}

/// Why a step-up check did not verify.
#[derive(Debug, Error)]
pub enum StepUpError {
    /// Unknown email or wrong password.
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// Credentials are right but the account cannot act on orders.
    #[error("Account {email} is not an admin")]
    NotAdmin { email: String },

    /// The verifier did not answer in time.
    #[error("Verification timed out after {after:?}")]
    TimedOut { after: Duration },

    /// The credential store failed.
    #[error("Verification backend error: {0}")]
    Backend(String),
}

// =============================================================================
// Verifier
// =============================================================================

/// Checks an email/password pair against a credential store.
///
/// Implementations answer with the account's role; role policy is applied
/// by [`StepUpGate`].
#[async_trait]
pub trait CredentialVerifier: Send + Sync {
    async fn verify(&self, email: &str, password: &str) -> Result<VerifiedIdentity, StepUpError>;
}

/// Verifier backed by the `admin_accounts` table.
#[derive(Debug, Clone)]
pub struct AccountVerifier {
    admins: AdminRepository,
}

impl AccountVerifier {
    pub fn new(admins: AdminRepository) -> Self {
        AccountVerifier { admins }
    }
}

#[async_trait]
impl CredentialVerifier for AccountVerifier {
    async fn verify(&self, email: &str, password: &str) -> Result<VerifiedIdentity, StepUpError> {
        let account = self
            .admins
            .find_by_email(email)
            .await
            .map_err(|e| StepUpError::Backend(e.to_string()))?
            .ok_or(StepUpError::InvalidCredentials)?;

        if !verify_password(password, &account.password_hash) {
            return Err(StepUpError::InvalidCredentials);
        }

        Ok(VerifiedIdentity {
            email: account.email,
            role: account.role,
        })
    }
}

// =============================================================================
// Gate
// =============================================================================

/// Bounded step-up check in front of destructive transitions.
#[derive(Clone)]
pub struct StepUpGate {
    verifier: Arc<dyn CredentialVerifier>,
    timeout: Duration,
}

impl std::fmt::Debug for StepUpGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StepUpGate")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl StepUpGate {
    pub fn new(verifier: Arc<dyn CredentialVerifier>, timeout: Duration) -> Self {
        StepUpGate { verifier, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Verifies `password` for the session's admin.
    ///
    /// ## Errors
    /// - `InvalidCredentials` for a blank password or a failed check
    /// - `NotAdmin` when the account's role is not `admin`
    /// - `TimedOut` when the verifier exceeds the configured timeout
    pub async fn check(
        &self,
        session: &AdminSession,
        password: &str,
    ) -> Result<VerifiedIdentity, StepUpError> {
        if password.is_empty() {
            return Err(StepUpError::InvalidCredentials);
        }

        let identity = tokio::time::timeout(self.timeout, self.verifier.verify(&session.email, password))
            .await
            .map_err(|_| StepUpError::TimedOut { after: self.timeout })??;

        if identity.role != Role::Admin {
            return Err(StepUpError::NotAdmin {
                email: identity.email,
            });
        }

        Ok(identity)
    }

    /// Runs [`StepUpGate::check`] and turns a confirmed admin into a
    /// verified [`AuthContext`] for the state machine.
    ///
    /// This is the only constructor of a verified context outside tests.
    pub async fn authorize(
        &self,
        session: &AdminSession,
        password: &str,
    ) -> Result<AuthContext, StepUpError> {
        debug!(email = %session.email, "Step-up verification requested");

        match self.check(session, password).await {
            Ok(_) => {
                info!(email = %session.email, "Step-up verified");
                Ok(AuthContext::verified(session.email.clone()))
            }
            Err(err) => {
                warn!(email = %session.email, error = %err, "Step-up verification failed");
                Err(err)
            }
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use bazaar_db::{Database, DbConfig};
    use std::collections::HashMap;

    /// Verifier answering from a fixed table, optionally after a delay.
    pub(crate) struct ScriptedVerifier {
        accounts: HashMap<String, (String, Role)>,
        delay: Option<Duration>,
    }

    impl ScriptedVerifier {
        pub(crate) fn new() -> Self {
            ScriptedVerifier {
                accounts: HashMap::new(),
                delay: None,
            }
        }

        pub(crate) fn with(mut self, email: &str, password: &str, role: Role) -> Self {
            self.accounts
                .insert(email.to_string(), (password.to_string(), role));
            self
        }

        pub(crate) fn slow(mut self, delay: Duration) -> Self {
            self.delay = Some(delay);
            self
        }
    }

    #[async_trait]
    impl CredentialVerifier for ScriptedVerifier {
        async fn verify(&self, email: &str, password: &str) -> Result<VerifiedIdentity, StepUpError> {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            match self.accounts.get(email) {
                Some((expected, role)) if expected == password => Ok(VerifiedIdentity {
                    email: email.to_string(),
                    role: *role,
                }),
                _ => Err(StepUpError::InvalidCredentials),
            }
        }
    }

    fn gate(verifier: ScriptedVerifier) -> StepUpGate {
        StepUpGate::new(Arc::new(verifier), Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_admin_with_right_password_verifies() {
        let gate = gate(ScriptedVerifier::new().with("ops@bazaar.in", "s3cret", Role::Admin));
        let ctx = gate
            .authorize(&AdminSession::new("ops@bazaar.in"), "s3cret")
            .await
            .unwrap();

        assert!(ctx.verified);
        assert_eq!(ctx.admin_email, "ops@bazaar.in");
    }

    #[tokio::test]
    async fn test_wrong_password_or_blank_is_rejected() {
        let gate = gate(ScriptedVerifier::new().with("ops@bazaar.in", "s3cret", Role::Admin));
        let session = AdminSession::new("ops@bazaar.in");

        assert!(matches!(
            gate.authorize(&session, "guess").await,
            Err(StepUpError::InvalidCredentials)
        ));
        assert!(matches!(
            gate.check(&session, "").await,
            Err(StepUpError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn test_non_admin_role_is_rejected() {
        let gate = gate(ScriptedVerifier::new().with("shopper@bazaar.in", "pw", Role::Customer));
        let session = AdminSession::new("shopper@bazaar.in");

        assert!(matches!(
            gate.check(&session, "pw").await,
            Err(StepUpError::NotAdmin { .. })
        ));
        assert!(gate.authorize(&session, "pw").await.is_err());
    }

    #[tokio::test]
    async fn test_other_accounts_password_does_not_verify_session() {
        let gate = gate(
            ScriptedVerifier::new()
                .with("ops@bazaar.in", "s3cret", Role::Admin)
                .with("lead@bazaar.in", "other", Role::Admin),
        );

        let result = gate.authorize(&AdminSession::new("ops@bazaar.in"), "other").await;
        assert!(matches!(result, Err(StepUpError::InvalidCredentials)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_verifier_times_out() {
        let verifier = ScriptedVerifier::new()
            .with("ops@bazaar.in", "s3cret", Role::Admin)
            .slow(Duration::from_secs(30));
        let gate = StepUpGate::new(Arc::new(verifier), Duration::from_secs(5));

        let result = gate.check(&AdminSession::new("ops@bazaar.in"), "s3cret").await;
        assert!(matches!(result, Err(StepUpError::TimedOut { after }) if after == Duration::from_secs(5)));
    }

    #[tokio::test]
    async fn test_account_verifier_against_store() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.admins().create("ops@bazaar.in", "s3cret", Role::Admin).await.unwrap();
        db.admins().create("shopper@bazaar.in", "pw", Role::Customer).await.unwrap();

        let gate = StepUpGate::new(
            Arc::new(AccountVerifier::new(db.admins())),
            Duration::from_secs(5),
        );

        assert!(gate.authorize(&AdminSession::new("ops@bazaar.in"), "s3cret").await.is_ok());
        assert!(gate.authorize(&AdminSession::new("ops@bazaar.in"), "nope").await.is_err());
        assert!(gate.authorize(&AdminSession::new("ghost@bazaar.in"), "s3cret").await.is_err());
        assert!(matches!(
            gate.authorize(&AdminSession::new("shopper@bazaar.in"), "pw").await,
            Err(StepUpError::NotAdmin { .. })
        ));
    }
}
