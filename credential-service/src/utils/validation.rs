//! Input validation: email normalization, the password strength policy, and
//! a JSON extractor that runs `validator` rules before handlers see a body.

use axum::{
    extract::{FromRequest, Request},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::de::DeserializeOwned;
use validator::Validate;

use crate::dtos::ErrorResponse;

const EMAIL_MAX_LEN: usize = 254;

pub const PASSWORD_MIN_LEN: usize = 12;
pub const PASSWORD_MAX_LEN: usize = 128;

const SPECIAL_CHARS: &str = "@$!%*?&";

/// Substrings of known-weak passwords, matched case-insensitively.
const WEAK_SUBSTRINGS: &[&str] = &[
    "password123",
    "123456789012",
    "qwertyuiopas",
    "admin1234567",
];

/// Validate an email address and return it lowercased, as stored.
pub fn normalize_email(email: &str) -> Option<String> {
    let email = email.trim();
    if email.is_empty() || email.len() > EMAIL_MAX_LEN || !is_valid_email(email) {
        return None;
    }
    Some(email.to_lowercase())
}

/// Shape check: one `@`, non-empty local part, dotted domain, no
/// whitespace. Deliverability is the notifier's problem.
fn is_valid_email(email: &str) -> bool {
    let mut parts = email.split('@');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(local), Some(domain), None) => {
            !local.is_empty()
                && !local.chars().any(char::is_whitespace)
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !domain.chars().any(char::is_whitespace)
        }
        _ => false,
    }
}

/// Check a candidate password against the strength policy.
///
/// Every violated rule is reported, not just the first one, so a caller can
/// show the complete list in one round trip. An empty vector means the
/// password passes.
pub fn password_policy_violations(password: &str) -> Vec<String> {
    let mut violations = Vec::new();

    if password.len() < PASSWORD_MIN_LEN {
        violations.push(format!(
            "Password must be at least {} characters long",
            PASSWORD_MIN_LEN
        ));
    }

    if password.len() > PASSWORD_MAX_LEN {
        violations.push(format!(
            "Password must be at most {} characters long",
            PASSWORD_MAX_LEN
        ));
    }

    if !password.chars().any(|c| c.is_ascii_lowercase()) {
        violations.push("Password must contain at least one lowercase letter".to_string());
    }

    if !password.chars().any(|c| c.is_ascii_uppercase()) {
        violations.push("Password must contain at least one uppercase letter".to_string());
    }

    if !password.chars().any(|c| c.is_ascii_digit()) {
        violations.push("Password must contain at least one number".to_string());
    }

    if !password.chars().any(|c| SPECIAL_CHARS.contains(c)) {
        violations.push(format!(
            "Password must contain at least one special character ({})",
            SPECIAL_CHARS
        ));
    }

    let lowered = password.to_lowercase();
    if WEAK_SUBSTRINGS.iter().any(|weak| lowered.contains(weak)) {
        violations.push("Password contains common patterns and is not secure".to_string());
    }

    violations
}

pub struct ValidatedJson<T>(pub T);

#[axum::async_trait]
impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate + 'static,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await.map_err(|e| {
            let err_resp = ErrorResponse {
                error: format!("Json parse error: {}", e),
            };
            (StatusCode::BAD_REQUEST, Json(err_resp)).into_response()
        })?;

        value.validate().map_err(|e| {
            let err_resp = ErrorResponse {
                error: format!("Validation error: {}", e),
            };
            (StatusCode::UNPROCESSABLE_ENTITY, Json(err_resp)).into_response()
        })?;

        Ok(ValidatedJson(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_email_lowercases() {
        assert_eq!(
            normalize_email("New.User@Example.COM"),
            Some("new.user@example.com".to_string())
        );
    }

    #[test]
    fn test_normalize_email_rejects_malformed() {
        assert_eq!(normalize_email("not-an-email"), None);
        assert_eq!(normalize_email("missing@tld@double.com"), None);
        assert_eq!(normalize_email(""), None);

        let oversized = format!("{}@example.com", "a".repeat(EMAIL_MAX_LEN));
        assert_eq!(normalize_email(&oversized), None);
    }

    #[test]
    fn test_policy_reports_short_password() {
        let violations = password_policy_violations("short1!");
        assert!(violations
            .iter()
            .any(|v| v.contains("at least 12 characters")));
    }

    #[test]
    fn test_policy_reports_missing_uppercase() {
        let violations = password_policy_violations("alllowercase123!");
        assert!(violations.iter().any(|v| v.contains("uppercase")));
    }

    #[test]
    fn test_policy_reports_missing_special_character() {
        let violations = password_policy_violations("NoSpecialChar123");
        assert!(violations.iter().any(|v| v.contains("special character")));
    }

    #[test]
    fn test_policy_accepts_valid_password() {
        assert!(password_policy_violations("ValidPass123!").is_empty());
    }

    #[test]
    fn test_policy_reports_all_violations_together() {
        // Too short, no uppercase, no digit, no special character.
        let violations = password_policy_violations("abc");
        assert_eq!(violations.len(), 4);
    }

    #[test]
    fn test_policy_rejects_weak_substrings() {
        let violations = password_policy_violations("XyPassword123!zz");
        assert!(violations.iter().any(|v| v.contains("common patterns")));
    }

    #[test]
    fn test_policy_rejects_oversized_password() {
        let long = format!("Aa1!{}", "x".repeat(PASSWORD_MAX_LEN));
        let violations = password_policy_violations(&long);
        assert!(violations
            .iter()
            .any(|v| v.contains("at most 128 characters")));
    }
}
