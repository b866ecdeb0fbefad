// Database models (internal, may differ from public DTOs)

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

// ============================================
// Users (identity collaborator)
// ============================================

#[derive(Debug, Clone, FromRow)]
pub struct UserRow {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password_hash: String,
    pub email_verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateUserRow {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password_hash: String,
    pub email_verified: bool,
}

// ============================================
// Refresh tokens
// ============================================

/// Stored refresh record. Only the SHA-256 digest of the opaque value is kept.
#[derive(Debug, Clone, FromRow)]
pub struct RefreshTokenRow {
    pub id: Uuid,
    pub user_id: i64,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub revoked: bool,
    pub created_at: DateTime<Utc>,
}

impl RefreshTokenRow {
    /// A record can mint bearer tokens only while it is neither revoked nor expired.
    pub fn is_usable_at(&self, now: DateTime<Utc>) -> bool {
        !self.revoked && now < self.expires_at
    }
}

#[derive(Debug, Clone)]
pub struct CreateRefreshTokenRow {
    pub user_id: i64,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
}

/// Normalize an email for storage and lookup (trimmed, lowercase).
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn row(revoked: bool, expires_at: DateTime<Utc>) -> RefreshTokenRow {
        RefreshTokenRow {
            id: Uuid::now_v7(),
            user_id: 1,
            token_hash: "hash".to_string(),
            expires_at,
            revoked,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_refresh_row_usability() {
        let now = Utc::now();
        assert!(row(false, now + Duration::hours(1)).is_usable_at(now));
        assert!(!row(true, now + Duration::hours(1)).is_usable_at(now));
        assert!(!row(false, now - Duration::hours(1)).is_usable_at(now));
        // Expiry boundary is exclusive
        assert!(!row(false, now).is_usable_at(now));
    }

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email("  A@B.Com "), "a@b.com");
        assert_eq!(normalize_email("a@b.com"), "a@b.com");
    }
}
