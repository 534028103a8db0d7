//! Password reset workflow: request, validate and consume reset tickets.

use std::sync::Arc;

use crate::models::{AuditAction, AuditLogEntry, AuthType, ClientMeta, PasswordReset};
use crate::services::{issue_token, AuditSink, CredentialStore, Notifier, WorkflowError};
use crate::utils::{hash_password, normalize_email, password_policy_violations, Password};

#[derive(Clone)]
pub struct PasswordResetService {
    store: CredentialStore,
    notifier: Arc<dyn Notifier>,
    audit: AuditSink,
}

impl PasswordResetService {
    pub fn new(store: CredentialStore, notifier: Arc<dyn Notifier>, audit: AuditSink) -> Self {
        Self {
            store,
            notifier,
            audit,
        }
    }

    /// Request a password reset for an email.
    ///
    /// Succeeds observably whether or not the email matches an account, so
    /// callers cannot enumerate users. The audit entry records only the
    /// submitted email, never whether it matched. Issuing a new ticket
    /// invalidates every earlier unused one for the same email.
    pub async fn request_reset(&self, email: &str, meta: &ClientMeta) -> Result<(), WorkflowError> {
        let email = normalize_email(email)
            .ok_or_else(|| WorkflowError::BadInput("Invalid email format".to_string()))?;

        self.audit.record(AuditLogEntry::new(
            AuditAction::PasswordResetRequest,
            None,
            Some("AUTH"),
            Some(serde_json::json!({ "email": email })),
            meta,
        ));

        let user = match self.store.find_user_by_email(&email).await? {
            Some(user) if user.auth_type == AuthType::Password && user.is_active() => user,
            _ => return Ok(()),
        };

        self.store.invalidate_unused_resets(&email).await?;

        let token = issue_token()?;
        let reset = PasswordReset::new(email.clone(), token.clone());
        self.store.insert_password_reset(&reset).await?;

        tracing::info!(user_id = %user.user_id, "Password reset requested");

        if let Err(e) = self.notifier.send_password_reset(&email, &token).await {
            tracing::warn!(
                error = %e,
                "Password reset email delivery failed; ticket remains valid"
            );
        }

        Ok(())
    }

    /// Validate a reset token without consuming it. Checked in order:
    /// unknown token, already used, expired. No state is mutated; the ticket
    /// has no status enum, only the used flag and the timestamp comparison.
    pub async fn validate_reset_token(&self, token: &str) -> Result<PasswordReset, WorkflowError> {
        let reset = self
            .store
            .find_password_reset_by_token(token)
            .await?
            .ok_or(WorkflowError::ResetTokenNotFound)?;

        if reset.used {
            return Err(WorkflowError::ResetTokenUsed);
        }

        if reset.is_expired() {
            return Err(WorkflowError::ResetTokenExpired);
        }

        Ok(reset)
    }

    /// Consume a reset ticket and install the new password, atomically.
    ///
    /// The ticket is re-read under a row lock and its used/expiry state
    /// re-checked inside the transaction; of two racing callers exactly one
    /// commits, the other sees `used = true` and fails with `AlreadyUsed`.
    pub async fn reset_password(
        &self,
        token: &str,
        new_password: &str,
        meta: &ClientMeta,
    ) -> Result<(), WorkflowError> {
        let violations = password_policy_violations(new_password);
        if !violations.is_empty() {
            return Err(WorkflowError::WeakPassword(violations));
        }

        // Cheap pre-validation before the expensive hash; authoritative
        // checks happen again under the row lock below.
        self.validate_reset_token(token).await?;

        let password_hash = hash_password(Password::new(new_password.to_string())).await?;

        let mut tx = self.store.begin().await?;

        let reset = self
            .store
            .lock_password_reset_by_token(&mut tx, token)
            .await?
            .ok_or(WorkflowError::ResetTokenNotFound)?;

        if reset.used {
            return Err(WorkflowError::ResetTokenUsed);
        }

        if reset.is_expired() {
            return Err(WorkflowError::ResetTokenExpired);
        }

        let user_id = self
            .store
            .update_user_password_by_email_tx(&mut tx, &reset.email, password_hash.as_str())
            .await?
            .ok_or(WorkflowError::ResetTokenNotFound)?;

        self.store
            .mark_password_reset_used_tx(&mut tx, reset.reset_id)
            .await?;

        tx.commit().await?;

        tracing::info!(user_id = %user_id, "Password reset completed");

        self.audit.record(AuditLogEntry::new(
            AuditAction::PasswordResetComplete,
            Some(user_id),
            Some("AUTH"),
            Some(serde_json::json!({ "email": reset.email })),
            meta,
        ));

        Ok(())
    }
}
