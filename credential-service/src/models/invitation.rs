//! Invitation model - pending offers of account creation.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::UserRole;

/// How long an invitation stays valid.
pub const INVITATION_EXPIRY_DAYS: i64 = 7;

/// Invitation lifecycle states. `Accepted`, `Expired` and `Revoked` are
/// terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InvitationStatus {
    Pending,
    Accepted,
    Expired,
    Revoked,
}

impl InvitationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvitationStatus::Pending => "PENDING",
            InvitationStatus::Accepted => "ACCEPTED",
            InvitationStatus::Expired => "EXPIRED",
            InvitationStatus::Revoked => "REVOKED",
        }
    }
}

impl TryFrom<String> for InvitationStatus {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "PENDING" => Ok(InvitationStatus::Pending),
            "ACCEPTED" => Ok(InvitationStatus::Accepted),
            "EXPIRED" => Ok(InvitationStatus::Expired),
            "REVOKED" => Ok(InvitationStatus::Revoked),
            other => Err(format!("Unknown invitation status: {}", other)),
        }
    }
}

/// Invitation entity.
#[derive(Debug, Clone, FromRow)]
pub struct Invitation {
    pub invitation_id: Uuid,
    pub email: String,
    pub token: String,
    #[sqlx(try_from = "String")]
    pub role: UserRole,
    pub invited_by_user_id: Uuid,
    #[sqlx(try_from = "String")]
    pub status: InvitationStatus,
    pub created_utc: DateTime<Utc>,
    pub expires_utc: DateTime<Utc>,
}

impl Invitation {
    /// Create a new pending invitation expiring after the fixed window.
    pub fn new(email: String, token: String, role: UserRole, invited_by_user_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            invitation_id: Uuid::new_v4(),
            email,
            token,
            role,
            invited_by_user_id,
            status: InvitationStatus::Pending,
            created_utc: now,
            expires_utc: now + Duration::days(INVITATION_EXPIRY_DAYS),
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_utc
    }
}

/// Invitation response for the API (the token is only returned to the
/// invitee, out of band).
#[derive(Debug, Serialize)]
pub struct InvitationResponse {
    pub invitation_id: Uuid,
    pub email: String,
    pub role: UserRole,
    pub status: InvitationStatus,
    pub expires_utc: DateTime<Utc>,
    pub created_utc: DateTime<Utc>,
}

impl From<Invitation> for InvitationResponse {
    fn from(i: Invitation) -> Self {
        Self {
            invitation_id: i.invitation_id,
            email: i.email,
            role: i.role,
            status: i.status,
            expires_utc: i.expires_utc,
            created_utc: i.created_utc,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_invitation_is_pending_for_seven_days() {
        let invitation = Invitation::new(
            "new.user@example.com".to_string(),
            "token".to_string(),
            UserRole::User,
            Uuid::new_v4(),
        );
        assert_eq!(invitation.status, InvitationStatus::Pending);
        assert!(!invitation.is_expired());

        let window = invitation.expires_utc - invitation.created_utc;
        assert_eq!(window.num_days(), INVITATION_EXPIRY_DAYS);
    }

    #[test]
    fn test_status_codes_round_trip() {
        for status in [
            InvitationStatus::Pending,
            InvitationStatus::Accepted,
            InvitationStatus::Expired,
            InvitationStatus::Revoked,
        ] {
            let parsed = InvitationStatus::try_from(status.as_str().to_string()).unwrap();
            assert_eq!(parsed, status);
        }
    }
}
