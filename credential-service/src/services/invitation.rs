//! Invitation workflow: create, validate, accept and revoke invitations.

use std::sync::Arc;
use uuid::Uuid;

use crate::models::{
    AuditAction, AuditLogEntry, ClientMeta, Invitation, InvitationStatus, User, UserRole,
};
use crate::services::error::is_unique_violation;
use crate::services::{issue_token, AuditSink, AuthContext, CredentialStore, Notifier, WorkflowError};
use crate::utils::{hash_password, normalize_email, password_policy_violations, Password};

#[derive(Clone)]
pub struct InvitationService {
    store: CredentialStore,
    notifier: Arc<dyn Notifier>,
    audit: AuditSink,
}

impl InvitationService {
    pub fn new(store: CredentialStore, notifier: Arc<dyn Notifier>, audit: AuditSink) -> Self {
        Self {
            store,
            notifier,
            audit,
        }
    }

    /// Create a pending invitation and ask the notifier to deliver it.
    ///
    /// The invitation row is committed before the notifier runs, so a failed
    /// delivery never leaves workflow state inconsistent. The one-pending-
    /// invitation-per-email rule is pre-checked for a friendly error and
    /// backed by the partial unique index for racing writers.
    pub async fn create_invitation(
        &self,
        email: &str,
        role: UserRole,
        issuer: &AuthContext,
        meta: &ClientMeta,
    ) -> Result<Invitation, WorkflowError> {
        let email = normalize_email(email)
            .ok_or_else(|| WorkflowError::BadInput("Invalid email format".to_string()))?;

        if !issuer.role.can_manage_invitations() {
            return Err(WorkflowError::Forbidden(
                "Only administrators can invite users".to_string(),
            ));
        }

        if role == UserRole::SuperAdmin && issuer.role != UserRole::SuperAdmin {
            return Err(WorkflowError::Forbidden(
                "Only super admins can create super admin accounts".to_string(),
            ));
        }

        if self.store.find_user_by_email(&email).await?.is_some() {
            return Err(WorkflowError::UserAlreadyExists);
        }

        if self
            .store
            .find_pending_invitation_by_email(&email)
            .await?
            .is_some()
        {
            return Err(WorkflowError::PendingInvitationExists);
        }

        let token = issue_token()?;
        let invitation = Invitation::new(email.clone(), token.clone(), role, issuer.user_id);

        match self.store.insert_invitation(&invitation).await {
            Ok(()) => {}
            Err(e) if is_unique_violation(&e) => {
                return Err(WorkflowError::PendingInvitationExists)
            }
            Err(e) => return Err(e.into()),
        }

        tracing::info!(
            invitation_id = %invitation.invitation_id,
            role = %role.as_str(),
            "Invitation created"
        );

        self.audit.record(AuditLogEntry::new(
            AuditAction::InviteUser,
            Some(issuer.user_id),
            Some("USER"),
            Some(serde_json::json!({
                "invited_email": email,
                "role": role.as_str(),
                "invitation_id": invitation.invitation_id,
            })),
            meta,
        ));

        if let Err(e) = self
            .notifier
            .send_invitation(&invitation.email, &token, issuer.display_label())
            .await
        {
            tracing::warn!(
                error = %e,
                invitation_id = %invitation.invitation_id,
                "Invitation email delivery failed; invitation remains valid"
            );
        }

        Ok(invitation)
    }

    /// Validate an invitation token without consuming it.
    ///
    /// A pending invitation past its expiry is transitioned to EXPIRED here,
    /// lazily; the conditional update makes repeated validations idempotent,
    /// and every later call keeps reporting `InvitationExpired`.
    pub async fn validate_token(&self, token: &str) -> Result<Invitation, WorkflowError> {
        let invitation = self
            .store
            .find_invitation_by_token(token)
            .await?
            .ok_or(WorkflowError::InvitationNotFound)?;

        match invitation.status {
            InvitationStatus::Pending => {
                if invitation.is_expired() {
                    self.store
                        .mark_invitation_expired(invitation.invitation_id)
                        .await?;
                    return Err(WorkflowError::InvitationExpired);
                }
                Ok(invitation)
            }
            InvitationStatus::Expired => Err(WorkflowError::InvitationExpired),
            InvitationStatus::Accepted | InvitationStatus::Revoked => {
                Err(WorkflowError::InvitationNotPending)
            }
        }
    }

    /// Accept an invitation: create the user and consume the invitation in
    /// one transaction.
    ///
    /// The invitation row is re-read under a row lock inside the transaction
    /// and its expiry re-checked there, so a token that was still pending
    /// when pre-validated cannot be accepted after it lapsed. Of two racing
    /// acceptors exactly one commits; the other observes the terminal status
    /// and fails cleanly.
    pub async fn accept_invitation(
        &self,
        token: &str,
        name: &str,
        password: &str,
        meta: &ClientMeta,
    ) -> Result<User, WorkflowError> {
        let name = name.trim();
        if name.is_empty() || name.len() > 100 {
            return Err(WorkflowError::BadInput(
                "Name must be between 1 and 100 characters".to_string(),
            ));
        }

        let violations = password_policy_violations(password);
        if !violations.is_empty() {
            return Err(WorkflowError::WeakPassword(violations));
        }

        // Cheap pre-validation before the expensive hash; authoritative
        // checks happen again under the row lock below.
        self.validate_token(token).await?;

        let password_hash = hash_password(Password::new(password.to_string())).await?;

        let mut tx = self.store.begin().await?;

        let invitation = self
            .store
            .lock_invitation_by_token(&mut tx, token)
            .await?
            .ok_or(WorkflowError::InvitationNotFound)?;

        match invitation.status {
            InvitationStatus::Pending => {}
            InvitationStatus::Expired => return Err(WorkflowError::InvitationExpired),
            InvitationStatus::Accepted | InvitationStatus::Revoked => {
                return Err(WorkflowError::InvitationNotPending)
            }
        }

        if invitation.is_expired() {
            self.store
                .mark_invitation_expired_tx(&mut tx, invitation.invitation_id)
                .await?;
            tx.commit().await?;
            return Err(WorkflowError::InvitationExpired);
        }

        let user = User::new_invited(
            invitation.email.clone(),
            Some(name.to_string()),
            password_hash.into_string(),
            invitation.role,
        );

        match self.store.insert_user_tx(&mut tx, &user).await {
            Ok(()) => {}
            Err(e) if is_unique_violation(&e) => return Err(WorkflowError::UserAlreadyExists),
            Err(e) => return Err(e.into()),
        }

        let updated = self
            .store
            .mark_invitation_accepted_tx(&mut tx, invitation.invitation_id)
            .await?;
        if updated == 0 {
            // Unreachable while we hold the row lock; backstop anyway.
            return Err(WorkflowError::InvitationNotPending);
        }

        tx.commit().await?;

        tracing::info!(
            user_id = %user.user_id,
            invitation_id = %invitation.invitation_id,
            "Invitation accepted"
        );

        self.audit.record(AuditLogEntry::new(
            AuditAction::AccountCreated,
            Some(user.user_id),
            Some("USER"),
            Some(serde_json::json!({
                "email": user.email,
                "auth_type": user.auth_type.as_str(),
                "via": "invitation",
            })),
            meta,
        ));

        Ok(user)
    }

    /// Revoke a pending invitation.
    pub async fn revoke_invitation(
        &self,
        invitation_id: Uuid,
        caller: &AuthContext,
        meta: &ClientMeta,
    ) -> Result<(), WorkflowError> {
        if !caller.role.can_manage_invitations() {
            return Err(WorkflowError::Forbidden(
                "Only administrators can revoke invitations".to_string(),
            ));
        }

        let updated = self.store.revoke_invitation(invitation_id).await?;
        if updated == 0 {
            return Err(WorkflowError::InvitationNotPending);
        }

        tracing::info!(invitation_id = %invitation_id, "Invitation revoked");

        self.audit.record(AuditLogEntry::new(
            AuditAction::InvitationRevoked,
            Some(caller.user_id),
            Some("USER"),
            Some(serde_json::json!({ "invitation_id": invitation_id })),
            meta,
        ));

        Ok(())
    }
}
