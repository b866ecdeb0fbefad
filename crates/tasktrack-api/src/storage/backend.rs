// Storage backend abstraction
// Decision: Use enum dispatch for simplicity over trait objects
//
// This module provides a unified StorageBackend enum that can work with
// either PostgreSQL (production) or in-memory (dev mode) storage. It is the
// Credential Store (refresh records) and the Identity Store (users) in one handle.

use anyhow::Result;
use std::sync::Arc;

use super::error::StoreResult;
use super::memory::InMemoryDatabase;
use super::models::*;
use super::repositories::Database;

/// Storage backend that can be either PostgreSQL or in-memory
#[derive(Clone)]
pub enum StorageBackend {
    /// PostgreSQL database (production)
    Postgres(Database),
    /// In-memory database (dev mode)
    InMemory(Arc<InMemoryDatabase>),
}

impl StorageBackend {
    /// Create a PostgreSQL storage backend from a database URL and apply migrations
    pub async fn postgres(database_url: &str) -> Result<Self> {
        let db = Database::from_url(database_url).await?;
        db.migrate().await?;
        Ok(Self::Postgres(db))
    }

    /// Create an in-memory storage backend
    pub fn in_memory() -> Self {
        Self::InMemory(Arc::new(InMemoryDatabase::new()))
    }

    /// Check if this is dev mode (in-memory)
    pub fn is_dev_mode(&self) -> bool {
        matches!(self, Self::InMemory(_))
    }

    // ============================================
    // Users
    // ============================================

    pub async fn create_user(&self, input: CreateUserRow) -> StoreResult<UserRow> {
        match self {
            Self::Postgres(db) => db.create_user(input).await,
            Self::InMemory(db) => db.create_user(input).await,
        }
    }

    pub async fn get_user_by_email(&self, email: &str) -> StoreResult<Option<UserRow>> {
        match self {
            Self::Postgres(db) => db.get_user_by_email(email).await,
            Self::InMemory(db) => db.get_user_by_email(email).await,
        }
    }

    pub async fn get_user(&self, id: i64) -> StoreResult<Option<UserRow>> {
        match self {
            Self::Postgres(db) => db.get_user(id).await,
            Self::InMemory(db) => db.get_user(id).await,
        }
    }

    // ============================================
    // Refresh Tokens
    // ============================================

    /// Save a refresh record; `Conflict` if the token hash is already stored
    pub async fn create_refresh_token(
        &self,
        input: CreateRefreshTokenRow,
    ) -> StoreResult<RefreshTokenRow> {
        match self {
            Self::Postgres(db) => db.create_refresh_token(input).await,
            Self::InMemory(db) => db.create_refresh_token(input).await,
        }
    }

    /// Find a non-revoked record; revoked and absent rows both yield `NotFound`
    pub async fn get_refresh_token_by_hash(&self, token_hash: &str) -> StoreResult<RefreshTokenRow> {
        match self {
            Self::Postgres(db) => db.get_refresh_token_by_hash(token_hash).await,
            Self::InMemory(db) => db.get_refresh_token_by_hash(token_hash).await,
        }
    }

    /// Revoke every refresh record of a user. Idempotent.
    pub async fn revoke_user_refresh_tokens(&self, user_id: i64) -> StoreResult<u64> {
        match self {
            Self::Postgres(db) => db.revoke_user_refresh_tokens(user_id).await,
            Self::InMemory(db) => db.revoke_user_refresh_tokens(user_id).await,
        }
    }

    pub async fn delete_expired_refresh_tokens(&self) -> StoreResult<u64> {
        match self {
            Self::Postgres(db) => db.delete_expired_refresh_tokens().await,
            Self::InMemory(db) => db.delete_expired_refresh_tokens().await,
        }
    }
}
