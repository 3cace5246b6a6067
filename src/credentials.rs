//! Credential store adapter.
//!
//! Single-row lookups against the authentication store. Every call opens a
//! fresh scoped connection with no caching, so credential changes take
//! effect immediately at the cost of a connection per lookup.
//!
//! Passwords are stored as salted argon2 hashes and verified in constant
//! time. The store never holds a raw password.

use anyhow::Result;
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use chrono::Utc;
use sqlx::{Connection, Row};
use std::path::PathBuf;

use crate::db;
use crate::models::User;
use crate::token::AuthError;

/// Hash a raw password for storage (PHC string format).
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("password hashing failed: {}", e))?;
    Ok(hash.to_string())
}

/// Verify a raw password against a stored hash. Constant-time.
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(stored_hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

#[derive(Clone)]
pub struct CredentialStore {
    database: PathBuf,
}

impl CredentialStore {
    pub fn new(database: PathBuf) -> Self {
        Self { database }
    }

    /// Exact-match single-row lookup by username.
    pub async fn find_user(&self, username: &str) -> Result<Option<User>> {
        let mut conn = db::open(&self.database).await?;
        let row = sqlx::query("SELECT username, password_hash FROM users WHERE username = ?")
            .bind(username)
            .fetch_optional(&mut conn)
            .await?;
        conn.close().await?;

        Ok(row.map(|r| User {
            username: r.get("username"),
            password_hash: r.get("password_hash"),
        }))
    }

    /// Look up the user and check the supplied password against the stored
    /// hash. `UserNotFound` and `BadPassword` stay distinguishable for
    /// logging; the gateway collapses both into one client-visible message.
    pub async fn authenticate(&self, username: &str, password: &str) -> Result<User, AuthError> {
        let user = self
            .find_user(username)
            .await
            .map_err(|e| AuthError::Store(e.to_string()))?
            .ok_or(AuthError::UserNotFound)?;

        if !verify_password(password, &user.password_hash) {
            return Err(AuthError::BadPassword);
        }
        Ok(user)
    }

    /// Provision a user (operator CLI only; the serving path never writes).
    pub async fn add_user(&self, username: &str, password: &str) -> Result<()> {
        let password_hash = hash_password(password)?;
        let mut conn = db::open(&self.database).await?;
        sqlx::query(
            "INSERT INTO users (username, password_hash, created_at) VALUES (?, ?, ?)
             ON CONFLICT(username) DO UPDATE SET password_hash = excluded.password_hash",
        )
        .bind(username)
        .bind(&password_hash)
        .bind(Utc::now().timestamp())
        .execute(&mut conn)
        .await?;
        conn.close().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrate;

    async fn store_with_user(username: &str, password: &str) -> (tempfile::TempDir, CredentialStore) {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("auth.sqlite");
        migrate::migrate_auth_store(&path).await.unwrap();
        let store = CredentialStore::new(path);
        store.add_user(username, password).await.unwrap();
        (tmp, store)
    }

    #[test]
    fn hash_and_verify_roundtrip() {
        let hash = hash_password("s3cret").unwrap();
        assert_ne!(hash, "s3cret");
        assert!(verify_password("s3cret", &hash));
        assert!(!verify_password("other", &hash));
    }

    #[test]
    fn verify_rejects_garbage_hash() {
        assert!(!verify_password("s3cret", "not-a-phc-string"));
    }

    #[tokio::test]
    async fn unknown_user_is_user_not_found() {
        let (_tmp, store) = store_with_user("alice", "wonderland").await;
        let err = store.authenticate("bob", "anything").await.unwrap_err();
        assert_eq!(err, AuthError::UserNotFound);
    }

    #[tokio::test]
    async fn correct_password_authenticates() {
        let (_tmp, store) = store_with_user("alice", "wonderland").await;
        let user = store.authenticate("alice", "wonderland").await.unwrap();
        assert_eq!(user.username, "alice");
    }

    #[tokio::test]
    async fn wrong_password_is_bad_password() {
        let (_tmp, store) = store_with_user("alice", "wonderland").await;
        let err = store.authenticate("alice", "looking-glass").await.unwrap_err();
        assert_eq!(err, AuthError::BadPassword);
    }

    #[tokio::test]
    async fn find_user_returns_typed_record() {
        let (_tmp, store) = store_with_user("alice", "wonderland").await;
        let user = store.find_user("alice").await.unwrap().unwrap();
        assert_eq!(user.username, "alice");
        assert!(user.password_hash.starts_with("$argon2"));
    }
}
