//! Account service: credential login, SSO provisioning and session
//! resolution.

use uuid::Uuid;

use crate::models::{
    AuditAction, AuditLogEntry, AuthType, ClientMeta, User, UserRole, UserStatus,
};
use crate::services::{AuditSink, CredentialStore, JwtService, WorkflowError};
use crate::utils::{hash_password, normalize_email, verify_password, Password, PasswordHashString};

/// The caller identity resolved for the current request.
///
/// Populated by the auth middleware from a verified access token plus a
/// fresh read of the user row; workflow operations receive it as an explicit
/// parameter instead of consulting any ambient state.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user_id: Uuid,
    pub email: String,
    pub display_name: Option<String>,
    pub role: UserRole,
    pub status: UserStatus,
}

impl AuthContext {
    pub fn from_user(user: &User) -> Self {
        Self {
            user_id: user.user_id,
            email: user.email.clone(),
            display_name: user.display_name.clone(),
            role: user.role,
            status: user.status,
        }
    }

    /// Human-readable identity shown to invitees.
    pub fn display_label(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.email)
    }
}

#[derive(Clone)]
pub struct AccountService {
    store: CredentialStore,
    jwt: JwtService,
    audit: AuditSink,
    sso_allowed_domains: Vec<String>,
}

impl AccountService {
    pub fn new(
        store: CredentialStore,
        jwt: JwtService,
        audit: AuditSink,
        sso_allowed_domains: Vec<String>,
    ) -> Self {
        Self {
            store,
            jwt,
            audit,
            sso_allowed_domains,
        }
    }

    /// Authenticate with email and password and mint an access token.
    ///
    /// Wrong email, wrong password and non-password accounts are all
    /// reported as the same `InvalidCredentials`.
    pub async fn login(
        &self,
        email: &str,
        password: &str,
        meta: &ClientMeta,
    ) -> Result<(User, String), WorkflowError> {
        let email = normalize_email(email).ok_or(WorkflowError::InvalidCredentials)?;

        let user = self
            .store
            .find_user_by_email(&email)
            .await?
            .ok_or(WorkflowError::InvalidCredentials)?;

        if user.auth_type != AuthType::Password {
            return Err(WorkflowError::InvalidCredentials);
        }

        if !user.is_active() {
            return Err(WorkflowError::AccountInactive);
        }

        let hash = user
            .password_hash
            .clone()
            .ok_or(WorkflowError::InvalidCredentials)?;

        let matches = verify_password(
            Password::new(password.to_string()),
            PasswordHashString::new(hash),
        )
        .await?;
        if !matches {
            return Err(WorkflowError::InvalidCredentials);
        }

        self.store.update_user_last_login(user.user_id).await?;

        tracing::info!(user_id = %user.user_id, "User logged in");

        self.audit.record(AuditLogEntry::new(
            AuditAction::Login,
            Some(user.user_id),
            Some("AUTH"),
            Some(serde_json::json!({ "provider": "credentials" })),
            meta,
        ));

        let token = self
            .jwt
            .generate_access_token(&user.user_id.to_string(), &user.email)?;

        Ok((user, token))
    }

    /// Complete a Google SSO sign-in for a verified email.
    ///
    /// The email's domain must be on the allow-list. A first sign-in
    /// provisions an ACTIVE `GOOGLE_SSO` user with the USER role; later
    /// sign-ins refresh the display name and login stamp.
    pub async fn sso_sign_in(
        &self,
        email: &str,
        display_name: Option<String>,
        meta: &ClientMeta,
    ) -> Result<(User, String), WorkflowError> {
        let email = normalize_email(email)
            .ok_or_else(|| WorkflowError::BadInput("Invalid email format".to_string()))?;

        let domain = email.rsplit('@').next().unwrap_or_default().to_string();
        if !self.sso_allowed_domains.iter().any(|d| d == &domain) {
            return Err(WorkflowError::Forbidden(
                "Email domain is not allowed for single sign-on".to_string(),
            ));
        }

        let user = match self.store.find_user_by_email(&email).await? {
            Some(user) => {
                if !user.is_active() {
                    return Err(WorkflowError::AccountInactive);
                }
                self.store
                    .update_user_sso_profile(user.user_id, display_name.as_deref())
                    .await?;
                user
            }
            None => {
                let user = User::new_sso(email.clone(), display_name);
                self.store.insert_user(&user).await?;
                tracing::info!(user_id = %user.user_id, "SSO user provisioned");
                user
            }
        };

        self.audit.record(AuditLogEntry::new(
            AuditAction::Login,
            Some(user.user_id),
            Some("AUTH"),
            Some(serde_json::json!({ "provider": "google", "domain": domain })),
            meta,
        ));

        let token = self
            .jwt
            .generate_access_token(&user.user_id.to_string(), &user.email)?;

        Ok((user, token))
    }

    /// Resolve a bearer token into the caller's current identity.
    ///
    /// Verifies signature and expiry, then loads the CURRENT user row so a
    /// deactivation or role change takes effect immediately, not at token
    /// expiry.
    pub async fn resolve_session(&self, token: &str) -> Result<AuthContext, WorkflowError> {
        let claims = self
            .jwt
            .validate_access_token(token)
            .map_err(|_| WorkflowError::InvalidCredentials)?;

        let user_id =
            Uuid::parse_str(&claims.sub).map_err(|_| WorkflowError::InvalidCredentials)?;

        let user = self
            .store
            .find_user_by_id(user_id)
            .await?
            .ok_or(WorkflowError::InvalidCredentials)?;

        if !user.is_active() {
            return Err(WorkflowError::AccountInactive);
        }

        Ok(AuthContext::from_user(&user))
    }

    /// Record a logout for the resolved caller. Sessions are stateless
    /// JWTs, so this is purely an audit event; the client discards the
    /// token.
    pub fn logout(&self, caller: &AuthContext, meta: &ClientMeta) {
        tracing::info!(user_id = %caller.user_id, "User logged out");
        self.audit.record(AuditLogEntry::new(
            AuditAction::Logout,
            Some(caller.user_id),
            Some("AUTH"),
            None,
            meta,
        ));
    }

    /// Create the first SUPER_ADMIN account on an empty user table.
    /// Idempotent: does nothing once any user exists.
    pub async fn bootstrap_super_admin(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Option<User>, WorkflowError> {
        if self.store.any_user_exists().await? {
            return Ok(None);
        }

        let email = normalize_email(email)
            .ok_or_else(|| WorkflowError::BadInput("Invalid bootstrap admin email".to_string()))?;

        let violations = crate::utils::password_policy_violations(password);
        if !violations.is_empty() {
            return Err(WorkflowError::WeakPassword(violations));
        }

        let password_hash = hash_password(Password::new(password.to_string())).await?;
        let user = User::new_invited(email, None, password_hash.into_string(), UserRole::SuperAdmin);

        self.store.insert_user(&user).await?;

        tracing::info!(user_id = %user.user_id, "Bootstrap super admin created");

        Ok(Some(user))
    }
}
