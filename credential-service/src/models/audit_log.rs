//! Audit log model - append-only workflow event records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Audited workflow actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    InviteUser,
    InvitationRevoked,
    AccountCreated,
    PasswordResetRequest,
    PasswordResetComplete,
    Login,
    Logout,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::InviteUser => "INVITE_USER",
            AuditAction::InvitationRevoked => "INVITATION_REVOKED",
            AuditAction::AccountCreated => "ACCOUNT_CREATED",
            AuditAction::PasswordResetRequest => "PASSWORD_RESET_REQUEST",
            AuditAction::PasswordResetComplete => "PASSWORD_RESET_COMPLETE",
            AuditAction::Login => "LOGIN",
            AuditAction::Logout => "LOGOUT",
        }
    }
}

impl TryFrom<String> for AuditAction {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "INVITE_USER" => Ok(AuditAction::InviteUser),
            "INVITATION_REVOKED" => Ok(AuditAction::InvitationRevoked),
            "ACCOUNT_CREATED" => Ok(AuditAction::AccountCreated),
            "PASSWORD_RESET_REQUEST" => Ok(AuditAction::PasswordResetRequest),
            "PASSWORD_RESET_COMPLETE" => Ok(AuditAction::PasswordResetComplete),
            "LOGIN" => Ok(AuditAction::Login),
            "LOGOUT" => Ok(AuditAction::Logout),
            other => Err(format!("Unknown audit action: {}", other)),
        }
    }
}

/// Network/client metadata attached to audit entries.
#[derive(Debug, Clone, Default)]
pub struct ClientMeta {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

/// Audit log entry. Write-only from the workflows' perspective; failures to
/// persist one must never fail the workflow that produced it.
#[derive(Debug, Clone, FromRow)]
pub struct AuditLogEntry {
    pub audit_id: Uuid,
    pub actor_user_id: Option<Uuid>,
    #[sqlx(try_from = "String")]
    pub action: AuditAction,
    pub resource: Option<String>,
    pub details: Option<serde_json::Value>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub created_utc: DateTime<Utc>,
}

impl AuditLogEntry {
    pub fn new(
        action: AuditAction,
        actor_user_id: Option<Uuid>,
        resource: Option<&str>,
        details: Option<serde_json::Value>,
        meta: &ClientMeta,
    ) -> Self {
        Self {
            audit_id: Uuid::new_v4(),
            actor_user_id,
            action,
            resource: resource.map(|r| r.to_string()),
            details,
            ip_address: meta.ip_address.clone(),
            user_agent: meta.user_agent.clone(),
            created_utc: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_codes_round_trip() {
        for action in [
            AuditAction::InviteUser,
            AuditAction::InvitationRevoked,
            AuditAction::AccountCreated,
            AuditAction::PasswordResetRequest,
            AuditAction::PasswordResetComplete,
            AuditAction::Login,
            AuditAction::Logout,
        ] {
            let parsed = AuditAction::try_from(action.as_str().to_string()).unwrap();
            assert_eq!(parsed, action);
        }
    }
}
