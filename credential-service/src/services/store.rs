//! Credential store - PostgreSQL persistence for users, invitations,
//! password resets and audit records.
//!
//! All state shared between concurrent requests lives here. The store hands
//! out explicit transactions for the multi-record writes; `*_tx` methods run
//! inside one and commit (or roll back) together. Single-record status
//! transitions are conditional updates so they stay idempotent under
//! concurrent callers.

use sqlx::postgres::PgPool;
use sqlx::{Postgres, Transaction};
use uuid::Uuid;

use crate::models::{
    AuditLogEntry, Invitation, InvitationStatus, PasswordReset, User, UserStatus,
};

/// PostgreSQL store wrapper.
#[derive(Clone)]
pub struct CredentialStore {
    pool: PgPool,
}

impl CredentialStore {
    /// Create a new store from a connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Health check - ping the database.
    pub async fn health_check(&self) -> Result<(), sqlx::Error> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// Open a transaction for an all-or-nothing multi-record write.
    pub async fn begin(&self) -> Result<Transaction<'static, Postgres>, sqlx::Error> {
        self.pool.begin().await
    }

    // ==================== User Operations ====================

    /// Find user by ID.
    pub async fn find_user_by_id(&self, user_id: Uuid) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
    }

    /// Find user by email. Emails are stored lowercased; callers normalize
    /// before looking up.
    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await
    }

    /// Insert a new user.
    pub async fn insert_user(&self, user: &User) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO users (user_id, email, display_name, password_hash, role, status, auth_type, last_login_utc, created_utc, updated_utc)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(user.user_id)
        .bind(&user.email)
        .bind(&user.display_name)
        .bind(&user.password_hash)
        .bind(user.role.as_str())
        .bind(user.status.as_str())
        .bind(user.auth_type.as_str())
        .bind(user.last_login_utc)
        .bind(user.created_utc)
        .bind(user.updated_utc)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Insert a new user inside an open transaction.
    pub async fn insert_user_tx(
        &self,
        tx: &mut Transaction<'static, Postgres>,
        user: &User,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO users (user_id, email, display_name, password_hash, role, status, auth_type, last_login_utc, created_utc, updated_utc)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(user.user_id)
        .bind(&user.email)
        .bind(&user.display_name)
        .bind(&user.password_hash)
        .bind(user.role.as_str())
        .bind(user.status.as_str())
        .bind(user.auth_type.as_str())
        .bind(user.last_login_utc)
        .bind(user.created_utc)
        .bind(user.updated_utc)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    /// Stamp a successful login.
    pub async fn update_user_last_login(&self, user_id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE users SET last_login_utc = NOW(), updated_utc = NOW() WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Refresh profile data on a repeat SSO sign-in.
    pub async fn update_user_sso_profile(
        &self,
        user_id: Uuid,
        display_name: Option<&str>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE users
            SET display_name = COALESCE($1, display_name), last_login_utc = NOW(), updated_utc = NOW()
            WHERE user_id = $2
            "#,
        )
        .bind(display_name)
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Replace a password-authenticated user's hash inside an open
    /// transaction. Returns the user id when a matching active password
    /// account existed.
    pub async fn update_user_password_by_email_tx(
        &self,
        tx: &mut Transaction<'static, Postgres>,
        email: &str,
        password_hash: &str,
    ) -> Result<Option<Uuid>, sqlx::Error> {
        let row: Option<(Uuid,)> = sqlx::query_as(
            r#"
            UPDATE users
            SET password_hash = $1, updated_utc = NOW()
            WHERE email = $2 AND auth_type = 'PASSWORD' AND status = $3
            RETURNING user_id
            "#,
        )
        .bind(password_hash)
        .bind(email)
        .bind(UserStatus::Active.as_str())
        .fetch_optional(&mut **tx)
        .await?;
        Ok(row.map(|(user_id,)| user_id))
    }

    /// Whether any user exists at all. Used for first-run bootstrap.
    pub async fn any_user_exists(&self) -> Result<bool, sqlx::Error> {
        let row: (bool,) = sqlx::query_as("SELECT EXISTS (SELECT 1 FROM users)")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.0)
    }

    // ==================== Invitation Operations ====================

    /// Insert a new invitation. A unique-violation error here means another
    /// writer created a PENDING invitation for the same email first.
    pub async fn insert_invitation(&self, invitation: &Invitation) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO invitations (invitation_id, email, token, role, invited_by_user_id, status, created_utc, expires_utc)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(invitation.invitation_id)
        .bind(&invitation.email)
        .bind(&invitation.token)
        .bind(invitation.role.as_str())
        .bind(invitation.invited_by_user_id)
        .bind(invitation.status.as_str())
        .bind(invitation.created_utc)
        .bind(invitation.expires_utc)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Find invitation by token.
    pub async fn find_invitation_by_token(
        &self,
        token: &str,
    ) -> Result<Option<Invitation>, sqlx::Error> {
        sqlx::query_as::<_, Invitation>("SELECT * FROM invitations WHERE token = $1")
            .bind(token)
            .fetch_optional(&self.pool)
            .await
    }

    /// Find the PENDING invitation for an email, if any.
    pub async fn find_pending_invitation_by_email(
        &self,
        email: &str,
    ) -> Result<Option<Invitation>, sqlx::Error> {
        sqlx::query_as::<_, Invitation>(
            "SELECT * FROM invitations WHERE email = $1 AND status = $2",
        )
        .bind(email)
        .bind(InvitationStatus::Pending.as_str())
        .fetch_optional(&self.pool)
        .await
    }

    /// Lazily transition PENDING -> EXPIRED. Conditional on the current
    /// status, so repeated calls are no-ops. Returns affected rows.
    pub async fn mark_invitation_expired(&self, invitation_id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE invitations SET status = $1 WHERE invitation_id = $2 AND status = $3",
        )
        .bind(InvitationStatus::Expired.as_str())
        .bind(invitation_id)
        .bind(InvitationStatus::Pending.as_str())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Transition PENDING -> REVOKED. Returns affected rows; zero means the
    /// invitation was unknown or no longer pending.
    pub async fn revoke_invitation(&self, invitation_id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE invitations SET status = $1 WHERE invitation_id = $2 AND status = $3",
        )
        .bind(InvitationStatus::Revoked.as_str())
        .bind(invitation_id)
        .bind(InvitationStatus::Pending.as_str())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Load and row-lock an invitation by token inside an open transaction.
    /// Concurrent acceptors of the same token serialize here; the loser
    /// observes the winner's terminal status after the lock is released.
    pub async fn lock_invitation_by_token(
        &self,
        tx: &mut Transaction<'static, Postgres>,
        token: &str,
    ) -> Result<Option<Invitation>, sqlx::Error> {
        sqlx::query_as::<_, Invitation>("SELECT * FROM invitations WHERE token = $1 FOR UPDATE")
            .bind(token)
            .fetch_optional(&mut **tx)
            .await
    }

    /// Transition PENDING -> EXPIRED inside an open transaction.
    pub async fn mark_invitation_expired_tx(
        &self,
        tx: &mut Transaction<'static, Postgres>,
        invitation_id: Uuid,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE invitations SET status = $1 WHERE invitation_id = $2 AND status = $3",
        )
        .bind(InvitationStatus::Expired.as_str())
        .bind(invitation_id)
        .bind(InvitationStatus::Pending.as_str())
        .execute(&mut **tx)
        .await?;
        Ok(result.rows_affected())
    }

    /// Transition PENDING -> ACCEPTED inside an open transaction.
    pub async fn mark_invitation_accepted_tx(
        &self,
        tx: &mut Transaction<'static, Postgres>,
        invitation_id: Uuid,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE invitations SET status = $1 WHERE invitation_id = $2 AND status = $3",
        )
        .bind(InvitationStatus::Accepted.as_str())
        .bind(invitation_id)
        .bind(InvitationStatus::Pending.as_str())
        .execute(&mut **tx)
        .await?;
        Ok(result.rows_affected())
    }

    // ==================== Password Reset Operations ====================

    /// Insert a new password reset ticket.
    pub async fn insert_password_reset(&self, reset: &PasswordReset) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO password_resets (reset_id, email, token, used, created_utc, expires_utc)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(reset.reset_id)
        .bind(&reset.email)
        .bind(&reset.token)
        .bind(reset.used)
        .bind(reset.created_utc)
        .bind(reset.expires_utc)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Find a reset ticket by token.
    pub async fn find_password_reset_by_token(
        &self,
        token: &str,
    ) -> Result<Option<PasswordReset>, sqlx::Error> {
        sqlx::query_as::<_, PasswordReset>("SELECT * FROM password_resets WHERE token = $1")
            .bind(token)
            .fetch_optional(&self.pool)
            .await
    }

    /// Mark every unused reset ticket for an email as used. Only the newest
    /// ticket is ever redeemable. Returns affected rows.
    pub async fn invalidate_unused_resets(&self, email: &str) -> Result<u64, sqlx::Error> {
        let result =
            sqlx::query("UPDATE password_resets SET used = TRUE WHERE email = $1 AND NOT used")
                .bind(email)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected())
    }

    /// Load and row-lock a reset ticket by token inside an open transaction.
    pub async fn lock_password_reset_by_token(
        &self,
        tx: &mut Transaction<'static, Postgres>,
        token: &str,
    ) -> Result<Option<PasswordReset>, sqlx::Error> {
        sqlx::query_as::<_, PasswordReset>(
            "SELECT * FROM password_resets WHERE token = $1 FOR UPDATE",
        )
        .bind(token)
        .fetch_optional(&mut **tx)
        .await
    }

    /// Consume a reset ticket inside an open transaction.
    pub async fn mark_password_reset_used_tx(
        &self,
        tx: &mut Transaction<'static, Postgres>,
        reset_id: Uuid,
    ) -> Result<u64, sqlx::Error> {
        let result =
            sqlx::query("UPDATE password_resets SET used = TRUE WHERE reset_id = $1 AND NOT used")
                .bind(reset_id)
                .execute(&mut **tx)
                .await?;
        Ok(result.rows_affected())
    }

    // ==================== Audit Operations ====================

    /// Append an audit log entry.
    pub async fn insert_audit_log(&self, entry: &AuditLogEntry) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO audit_logs (audit_id, actor_user_id, action, resource, details, ip_address, user_agent, created_utc)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(entry.audit_id)
        .bind(entry.actor_user_id)
        .bind(entry.action.as_str())
        .bind(&entry.resource)
        .bind(&entry.details)
        .bind(&entry.ip_address)
        .bind(&entry.user_agent)
        .bind(entry.created_utc)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Audit entries for an action, newest first. Used by tests and
    /// operational queries.
    pub async fn find_audit_logs_by_action(
        &self,
        action: &str,
    ) -> Result<Vec<AuditLogEntry>, sqlx::Error> {
        sqlx::query_as::<_, AuditLogEntry>(
            "SELECT * FROM audit_logs WHERE action = $1 ORDER BY created_utc DESC",
        )
        .bind(action)
        .fetch_all(&self.pool)
        .await
    }
}
