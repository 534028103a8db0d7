//! Notifier - out-of-band delivery of invitation and reset tokens.
//!
//! The workflows treat delivery as fire-and-forget: the durable state
//! transition always happens first, and a failed send is logged by the
//! caller, never bubbled up.

use lettre::{
    message::header::ContentType, transport::smtp::authentication::Credentials, Message,
    SmtpTransport, Transport,
};
use service_core::axum::async_trait;
use service_core::error::AppError;
use std::time::Duration;

use crate::config::SmtpConfig;
use crate::models::{INVITATION_EXPIRY_DAYS, RESET_EXPIRY_HOURS};

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_invitation(
        &self,
        to_email: &str,
        token: &str,
        invited_by: &str,
    ) -> Result<(), AppError>;

    async fn send_password_reset(&self, to_email: &str, token: &str) -> Result<(), AppError>;
}

#[derive(Clone)]
pub struct SmtpNotifier {
    mailer: SmtpTransport,
    from_address: String,
    base_url: String,
}

impl SmtpNotifier {
    pub fn new(config: &SmtpConfig, base_url: &str) -> Result<Self, AppError> {
        let creds = Credentials::new(config.user.clone(), config.password.clone());

        let mailer = SmtpTransport::relay(&config.host)
            .map_err(|e| AppError::InternalError(anyhow::anyhow!(e.to_string())))?
            .credentials(creds)
            .port(config.port)
            .timeout(Some(Duration::from_secs(10)))
            .build();

        tracing::info!(host = %config.host, "SMTP notifier initialized");

        Ok(Self {
            mailer,
            from_address: config.from_address.clone(),
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn send_email(
        &self,
        to_email: &str,
        subject: &str,
        plain_body: &str,
        html_body: &str,
    ) -> Result<(), AppError> {
        let email = Message::builder()
            .from(self.from_address.parse().map_err(
                |e: lettre::address::AddressError| AppError::InternalError(e.into()),
            )?)
            .to(to_email.parse().map_err(
                |e: lettre::address::AddressError| AppError::InternalError(e.into()),
            )?)
            .subject(subject)
            .multipart(
                lettre::message::MultiPart::alternative()
                    .singlepart(
                        lettre::message::SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(plain_body.to_string()),
                    )
                    .singlepart(
                        lettre::message::SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(html_body.to_string()),
                    ),
            )
            .map_err(|e| AppError::InternalError(e.into()))?;

        // Send on the blocking pool to avoid stalling the async runtime.
        let mailer = self.mailer.clone();
        let result = tokio::task::spawn_blocking(move || mailer.send(&email))
            .await
            .map_err(|e| AppError::InternalError(e.into()))?;

        match result {
            Ok(_) => {
                tracing::info!(to = %to_email, subject = %subject, "Email sent");
                Ok(())
            }
            Err(e) => {
                tracing::error!(error = %e.to_string(), to = %to_email, "Failed to send email");
                Err(AppError::EmailError(e.to_string()))
            }
        }
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn send_invitation(
        &self,
        to_email: &str,
        token: &str,
        invited_by: &str,
    ) -> Result<(), AppError> {
        let invite_link = format!("{}/auth/invite?token={}", self.base_url, token);

        let html_body = format!(
            r###"            <html>
                <body style="font-family: Arial, sans-serif;">
                    <h2>You've been invited</h2>
                    <p><strong>{}</strong> has invited you to join the dashboard platform.</p>
                    <p>
                        <a href="{}" style="background-color: #0ea5e9; color: white; padding: 14px 20px; text-decoration: none; border-radius: 4px;">
                            Accept Invitation
                        </a>
                    </p>
                    <p style="color: #666; font-size: 12px;">
                        This invitation will expire in {} days. If you didn't expect it, you can safely ignore this email.
                    </p>
                </body>
            </html>
            "###,
            invited_by, invite_link, INVITATION_EXPIRY_DAYS
        );

        let plain_body = format!(
            "You've been invited\n\n{} has invited you to join the dashboard platform. Visit the following link to set up your account:\n\n{}\n\nThis invitation will expire in {} days. If you didn't expect it, you can safely ignore this email.",
            invited_by, invite_link, INVITATION_EXPIRY_DAYS
        );

        self.send_email(to_email, "You've been invited", &plain_body, &html_body)
            .await
    }

    async fn send_password_reset(&self, to_email: &str, token: &str) -> Result<(), AppError> {
        let reset_link = format!("{}/auth/reset-password?token={}", self.base_url, token);

        let html_body = format!(
            r###"            <html>
                <body style="font-family: Arial, sans-serif;">
                    <h2>Password Reset Request</h2>
                    <p>We received a request to reset your password. Click the link below to set a new one:</p>
                    <p>
                        <a href="{}" style="background-color: #0ea5e9; color: white; padding: 14px 20px; text-decoration: none; border-radius: 4px;">
                            Reset Password
                        </a>
                    </p>
                    <p style="color: #666; font-size: 12px;">
                        This link will expire in {} hour and can only be used once. If you didn't request a reset, please ignore this email.
                    </p>
                </body>
            </html>
            "###,
            reset_link, RESET_EXPIRY_HOURS
        );

        let plain_body = format!(
            "Password Reset Request\n\nWe received a request to reset your password. Visit the following link to set a new one:\n\n{}\n\nThis link will expire in {} hour and can only be used once. If you didn't request a reset, please ignore this email.",
            reset_link, RESET_EXPIRY_HOURS
        );

        self.send_email(to_email, "Reset Your Password", &plain_body, &html_body)
            .await
    }
}

/// What a mock notifier captured, for assertions in tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SentNotification {
    Invitation {
        to_email: String,
        token: String,
        invited_by: String,
    },
    PasswordReset {
        to_email: String,
        token: String,
    },
}

/// In-memory notifier that records what would have been delivered.
#[derive(Clone, Default)]
pub struct MockNotifier {
    sent: std::sync::Arc<std::sync::Mutex<Vec<SentNotification>>>,
}

impl MockNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<SentNotification> {
        self.sent.lock().expect("notifier mutex poisoned").clone()
    }
}

#[async_trait]
impl Notifier for MockNotifier {
    async fn send_invitation(
        &self,
        to_email: &str,
        token: &str,
        invited_by: &str,
    ) -> Result<(), AppError> {
        self.sent
            .lock()
            .expect("notifier mutex poisoned")
            .push(SentNotification::Invitation {
                to_email: to_email.to_string(),
                token: token.to_string(),
                invited_by: invited_by.to_string(),
            });
        Ok(())
    }

    async fn send_password_reset(&self, to_email: &str, token: &str) -> Result<(), AppError> {
        self.sent
            .lock()
            .expect("notifier mutex poisoned")
            .push(SentNotification::PasswordReset {
                to_email: to_email.to_string(),
                token: token.to_string(),
            });
        Ok(())
    }
}
