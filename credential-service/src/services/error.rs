use service_core::error::AppError;
use thiserror::Error;

/// Typed failures of the invitation and credential workflows.
///
/// Notifier and audit-sink failures are intentionally absent: those are
/// caught at their call sites and never surface as workflow failures.
#[derive(Error, Debug)]
pub enum WorkflowError {
    #[error("{0}")]
    BadInput(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("User with this email already exists")]
    UserAlreadyExists,

    #[error("Pending invitation already exists for this email")]
    PendingInvitationExists,

    #[error("Invalid invitation token")]
    InvitationNotFound,

    #[error("Invitation is no longer valid")]
    InvitationNotPending,

    #[error("Invitation has expired")]
    InvitationExpired,

    #[error("Invalid reset token")]
    ResetTokenNotFound,

    #[error("Reset token has already been used")]
    ResetTokenUsed,

    #[error("Reset token has expired")]
    ResetTokenExpired,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Account is not active")]
    AccountInactive,

    #[error("Password does not meet the strength policy")]
    WeakPassword(Vec<String>),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<WorkflowError> for AppError {
    fn from(err: WorkflowError) -> Self {
        match err {
            WorkflowError::BadInput(msg) => AppError::BadRequest(anyhow::anyhow!(msg)),
            WorkflowError::Forbidden(msg) => AppError::Forbidden(anyhow::anyhow!(msg)),
            WorkflowError::UserAlreadyExists => {
                AppError::Conflict(anyhow::anyhow!("User with this email already exists"))
            }
            WorkflowError::PendingInvitationExists => AppError::Conflict(anyhow::anyhow!(
                "Pending invitation already exists for this email"
            )),
            WorkflowError::InvitationNotFound => {
                AppError::NotFound(anyhow::anyhow!("Invalid invitation token"))
            }
            WorkflowError::ResetTokenNotFound => {
                AppError::NotFound(anyhow::anyhow!("Invalid reset token"))
            }
            WorkflowError::InvitationNotPending => {
                AppError::BadRequest(anyhow::anyhow!("Invitation is no longer valid"))
            }
            WorkflowError::InvitationExpired => {
                AppError::BadRequest(anyhow::anyhow!("Invitation has expired"))
            }
            WorkflowError::ResetTokenUsed => {
                AppError::BadRequest(anyhow::anyhow!("Reset token has already been used"))
            }
            WorkflowError::ResetTokenExpired => {
                AppError::BadRequest(anyhow::anyhow!("Reset token has expired"))
            }
            WorkflowError::InvalidCredentials => {
                AppError::AuthError(anyhow::anyhow!("Invalid credentials"))
            }
            WorkflowError::AccountInactive => {
                AppError::Forbidden(anyhow::anyhow!("Account is not active"))
            }
            WorkflowError::WeakPassword(violations) => AppError::PolicyViolation(violations),
            WorkflowError::Database(sqlx::Error::PoolTimedOut) => AppError::ServiceUnavailable,
            WorkflowError::Database(e) => AppError::DatabaseError(anyhow::Error::new(e)),
            WorkflowError::Internal(e) => AppError::InternalError(e),
        }
    }
}

/// Whether a database error is a unique-constraint violation. The store
/// relies on unique indexes to close check-then-insert races; callers map
/// this onto the conflict variant for the record at hand.
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .map(|db| db.is_unique_violation())
        .unwrap_or(false)
}
