//! # Admin Repository
//!
//! The credential store consulted by step-up verification.
//!
//! Passwords are stored as argon2 PHC strings and checked with
//! [`verify_password`]; neither the password nor the hash is ever logged.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use bazaar_core::types::Role;
use bazaar_core::validation::validate_email;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqlitePool};
use std::fmt;
use tracing::debug;

use crate::error::{DbError, DbResult};
use crate::repository::generate_id;

/// A stored account that can act on orders.
#[derive(Clone, FromRow)]
pub struct AdminAccount {
    pub id: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

impl fmt::Debug for AdminAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdminAccount")
            .field("id", &self.id)
            .field("email", &self.email)
            .field("password_hash", &"<redacted>")
            .field("role", &self.role)
            .field("created_at", &self.created_at)
            .finish()
    }
}

/// Hashes a password with argon2 and a fresh random salt.
pub fn hash_password(password: &str) -> DbResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default().hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

/// Checks a password against a stored argon2 hash.
///
/// A malformed hash never verifies.
pub fn verify_password(password: &str, hash: &str) -> bool {
    let parsed = match PasswordHash::new(hash) {
        Ok(h) => h,
        Err(_) => return false,
    };

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

/// Repository for admin accounts.
#[derive(Debug, Clone)]
pub struct AdminRepository {
    pool: SqlitePool,
}

impl AdminRepository {
    /// Creates a new AdminRepository.
    pub fn new(pool: SqlitePool) -> Self {
        AdminRepository { pool }
    }

    /// Creates an account, hashing the password.
    ///
    /// ## Returns
    /// * `Err(DbError::Validation)` - the email is not an address
    /// * `Err(DbError::UniqueViolation)` - the email is already registered
    pub async fn create(&self, email: &str, password: &str, role: Role) -> DbResult<AdminAccount> {
        validate_email(email)?;
        let email = email.trim();
        debug!(email = %email, role = ?role, "Creating account");

        let account = AdminAccount {
            id: generate_id(),
            email: email.to_string(),
            password_hash: hash_password(password)?,
            role,
            created_at: Utc::now(),
        };

        sqlx::query(
            r#"
            INSERT INTO admin_accounts (id, email, password_hash, role, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(&account.id)
        .bind(&account.email)
        .bind(&account.password_hash)
        .bind(account.role)
        .bind(account.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { .. } => DbError::duplicate("email", email),
            other => other,
        })?;

        Ok(account)
    }

    /// Finds an account by email (case-insensitive).
    pub async fn find_by_email(&self, email: &str) -> DbResult<Option<AdminAccount>> {
        let account: Option<AdminAccount> = sqlx::query_as(
            r#"
            SELECT id, email, password_hash, role, created_at
            FROM admin_accounts
            WHERE email = ?1
            "#,
        )
        .bind(email.trim())
        .fetch_optional(&self.pool)
        .await?;

        Ok(account)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_password("s3cret").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("s3cret", &hash));
        assert!(!verify_password("wrong", &hash));
        assert!(!verify_password("s3cret", "not-a-hash"));
    }

    #[tokio::test]
    async fn test_create_and_find() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.admins();

        repo.create("ops@bazaar.in", "s3cret", Role::Admin).await.unwrap();

        let found = repo.find_by_email("OPS@bazaar.in").await.unwrap().unwrap();
        assert_eq!(found.role, Role::Admin);
        assert!(verify_password("s3cret", &found.password_hash));
        assert!(repo.find_by_email("nobody@bazaar.in").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_email() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.admins();

        repo.create("ops@bazaar.in", "a", Role::Admin).await.unwrap();
        let err = repo.create("ops@bazaar.in", "b", Role::Customer).await.unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { field, .. } if field == "email"));
    }

    #[tokio::test]
    async fn test_malformed_email_not_stored() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.admins();

        let err = repo.create("ops-at-bazaar", "pw", Role::Admin).await.unwrap_err();
        assert!(matches!(err, DbError::Validation(_)));
        assert!(repo.create("   ", "pw", Role::Admin).await.is_err());
        assert!(repo.find_by_email("ops-at-bazaar").await.unwrap().is_none());
    }

    #[test]
    fn test_debug_redacts_hash() {
        let account = AdminAccount {
            id: "a-1".to_string(),
            email: "ops@bazaar.in".to_string(),
            password_hash: "$argon2id$secret".to_string(),
            role: Role::Admin,
            created_at: Utc::now(),
        };
        let rendered = format!("{:?}", account);
        assert!(!rendered.contains("secret"));
        assert!(rendered.contains("<redacted>"));
    }
}
