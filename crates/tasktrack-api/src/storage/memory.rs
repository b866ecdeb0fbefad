// In-memory storage implementation for dev mode
// Decision: Use parking_lot for thread-safe access
// Decision: Each operation holds one lock for its whole duration, so every
// write is atomic the same way a single SQL statement is
//
// This implementation mirrors the PostgreSQL API backed by in-memory HashMaps,
// allowing the server (and the test suite) to run without a database.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use uuid::Uuid;

use super::error::{StoreError, StoreResult};
use super::models::*;

/// In-memory database for dev mode
/// All data is stored in memory and lost on restart
pub struct InMemoryDatabase {
    users: RwLock<HashMap<i64, UserRow>>,
    refresh_tokens: RwLock<HashMap<Uuid, RefreshTokenRow>>,
    next_user_id: AtomicI64,
}

impl Default for InMemoryDatabase {
    fn default() -> Self {
        Self {
            users: RwLock::new(HashMap::new()),
            refresh_tokens: RwLock::new(HashMap::new()),
            next_user_id: AtomicI64::new(1),
        }
    }
}

impl InMemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    fn now() -> DateTime<Utc> {
        Utc::now()
    }

    // ============================================
    // Users
    // ============================================

    pub async fn create_user(&self, input: CreateUserRow) -> StoreResult<UserRow> {
        let email = normalize_email(&input.email);
        let mut users = self.users.write();
        if users.values().any(|u| u.email == email) {
            return Err(StoreError::Conflict(format!("email {email} already exists")));
        }

        let now = Self::now();
        let id = self.next_user_id.fetch_add(1, Ordering::SeqCst);
        let row = UserRow {
            id,
            first_name: input.first_name,
            last_name: input.last_name,
            email,
            password_hash: input.password_hash,
            email_verified: input.email_verified,
            created_at: now,
            updated_at: now,
        };
        users.insert(id, row.clone());
        Ok(row)
    }

    pub async fn get_user_by_email(&self, email: &str) -> StoreResult<Option<UserRow>> {
        let email = normalize_email(email);
        Ok(self
            .users
            .read()
            .values()
            .find(|u| u.email == email)
            .cloned())
    }

    pub async fn get_user(&self, id: i64) -> StoreResult<Option<UserRow>> {
        Ok(self.users.read().get(&id).cloned())
    }

    // ============================================
    // Refresh Tokens
    // ============================================

    pub async fn create_refresh_token(
        &self,
        input: CreateRefreshTokenRow,
    ) -> StoreResult<RefreshTokenRow> {
        let mut tokens = self.refresh_tokens.write();
        if tokens.values().any(|t| t.token_hash == input.token_hash) {
            return Err(StoreError::Conflict("refresh token already exists".to_string()));
        }

        let id = Uuid::now_v7();
        let row = RefreshTokenRow {
            id,
            user_id: input.user_id,
            token_hash: input.token_hash,
            expires_at: input.expires_at,
            revoked: false,
            created_at: Self::now(),
        };
        tokens.insert(id, row.clone());
        Ok(row)
    }

    /// Only non-revoked rows are visible to this lookup.
    pub async fn get_refresh_token_by_hash(&self, token_hash: &str) -> StoreResult<RefreshTokenRow> {
        self.refresh_tokens
            .read()
            .values()
            .find(|t| t.token_hash == token_hash && !t.revoked)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    pub async fn revoke_user_refresh_tokens(&self, user_id: i64) -> StoreResult<u64> {
        let mut tokens = self.refresh_tokens.write();
        let mut count = 0;
        for token in tokens.values_mut().filter(|t| t.user_id == user_id) {
            token.revoked = true;
            count += 1;
        }
        Ok(count)
    }

    pub async fn delete_expired_refresh_tokens(&self) -> StoreResult<u64> {
        let now = Self::now();
        let mut tokens = self.refresh_tokens.write();
        let before = tokens.len();
        tokens.retain(|_, t| t.expires_at >= now);
        Ok((before - tokens.len()) as u64)
    }

    /// Every stored record for a user, revoked ones included.
    #[cfg(test)]
    pub(crate) fn refresh_tokens_for_user(&self, user_id: i64) -> Vec<RefreshTokenRow> {
        self.refresh_tokens
            .read()
            .values()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn user_input(email: &str) -> CreateUserRow {
        CreateUserRow {
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            email: email.to_string(),
            password_hash: "hash".to_string(),
            email_verified: true,
        }
    }

    fn token_input(user_id: i64, hash: &str, expires_at: DateTime<Utc>) -> CreateRefreshTokenRow {
        CreateRefreshTokenRow {
            user_id,
            token_hash: hash.to_string(),
            expires_at,
        }
    }

    #[tokio::test]
    async fn test_create_and_find_user_case_insensitive() {
        let db = InMemoryDatabase::new();
        let user = db.create_user(user_input("Ada@Example.com")).await.unwrap();
        assert_eq!(user.email, "ada@example.com");

        let found = db.get_user_by_email("ADA@example.COM").await.unwrap();
        assert_eq!(found.unwrap().id, user.id);
        assert!(db.get_user(user.id + 100).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_email_conflicts() {
        let db = InMemoryDatabase::new();
        db.create_user(user_input("a@b.com")).await.unwrap();
        let err = db.create_user(user_input("A@B.com")).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_duplicate_refresh_token_conflicts() {
        let db = InMemoryDatabase::new();
        let exp = Utc::now() + Duration::days(1);
        db.create_refresh_token(token_input(1, "h1", exp)).await.unwrap();
        let err = db
            .create_refresh_token(token_input(2, "h1", exp))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_revoked_token_is_not_found() {
        let db = InMemoryDatabase::new();
        let exp = Utc::now() + Duration::days(1);
        db.create_refresh_token(token_input(1, "h1", exp)).await.unwrap();
        assert!(db.get_refresh_token_by_hash("h1").await.is_ok());

        assert_eq!(db.revoke_user_refresh_tokens(1).await.unwrap(), 1);
        let err = db.get_refresh_token_by_hash("h1").await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound));
    }

    #[tokio::test]
    async fn test_revoke_is_idempotent() {
        let db = InMemoryDatabase::new();
        let exp = Utc::now() + Duration::days(1);
        db.create_refresh_token(token_input(7, "a", exp)).await.unwrap();
        db.create_refresh_token(token_input(7, "b", exp)).await.unwrap();
        db.create_refresh_token(token_input(8, "c", exp)).await.unwrap();

        db.revoke_user_refresh_tokens(7).await.unwrap();
        db.revoke_user_refresh_tokens(7).await.unwrap();

        assert!(db.refresh_tokens_for_user(7).iter().all(|t| t.revoked));
        assert!(db.refresh_tokens_for_user(8).iter().all(|t| !t.revoked));
        // No rows for this user is still success
        assert_eq!(db.revoke_user_refresh_tokens(99).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_delete_expired_only_removes_expired() {
        let db = InMemoryDatabase::new();
        let now = Utc::now();
        db.create_refresh_token(token_input(1, "old", now - Duration::hours(1)))
            .await
            .unwrap();
        db.create_refresh_token(token_input(1, "new", now + Duration::hours(1)))
            .await
            .unwrap();

        assert_eq!(db.delete_expired_refresh_tokens().await.unwrap(), 1);
        assert!(db.get_refresh_token_by_hash("new").await.is_ok());
        assert!(db.get_refresh_token_by_hash("old").await.is_err());
    }
}
