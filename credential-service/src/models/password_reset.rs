//! Password reset model - single-use credential reset tickets.

use chrono::{DateTime, Duration, Utc};
use sqlx::FromRow;
use uuid::Uuid;

/// How long a reset token stays valid.
pub const RESET_EXPIRY_HOURS: i64 = 1;

/// Password reset entity. There is no status enum; a ticket is live until
/// its `used` flag is set or its expiry passes.
#[derive(Debug, Clone, FromRow)]
pub struct PasswordReset {
    pub reset_id: Uuid,
    pub email: String,
    pub token: String,
    pub used: bool,
    pub created_utc: DateTime<Utc>,
    pub expires_utc: DateTime<Utc>,
}

impl PasswordReset {
    /// Create a new unused reset ticket expiring after the fixed window.
    pub fn new(email: String, token: String) -> Self {
        let now = Utc::now();
        Self {
            reset_id: Uuid::new_v4(),
            email,
            token,
            used: false,
            created_utc: now,
            expires_utc: now + Duration::hours(RESET_EXPIRY_HOURS),
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_utc
    }
}
