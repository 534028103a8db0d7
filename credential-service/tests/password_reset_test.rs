//! Password reset workflow integration tests.
//!
//! Run against PostgreSQL: `TEST_DATABASE_URL=... cargo test -- --ignored`

mod common;

use common::TestHarness;
use credential_service::models::{AuditAction, ClientMeta, UserRole};
use credential_service::services::notifier::SentNotification;
use credential_service::services::WorkflowError;
use std::time::Duration;

fn reset_token_for(harness: &TestHarness, email: &str) -> Option<String> {
    harness.notifier.sent().iter().rev().find_map(|n| match n {
        SentNotification::PasswordReset { to_email, token } if to_email == email => {
            Some(token.clone())
        }
        _ => None,
    })
}

#[tokio::test]
#[ignore] // Requires running PostgreSQL
async fn test_request_for_unknown_email_is_indistinguishable() {
    let harness = TestHarness::spawn().await;
    let meta = ClientMeta::default();
    let email = TestHarness::unique_email("ghost");

    // Succeeds observably, sends nothing.
    harness
        .password_resets
        .request_reset(&email, &meta)
        .await
        .expect("Reset request for unknown email must succeed");
    assert!(reset_token_for(&harness, &email).is_none());

    // The audit trail still records the attempt, with the email only.
    tokio::time::sleep(Duration::from_millis(200)).await;
    let entries = harness
        .store
        .find_audit_logs_by_action(AuditAction::PasswordResetRequest.as_str())
        .await
        .unwrap();
    let entry = entries
        .iter()
        .find(|e| {
            e.details
                .as_ref()
                .and_then(|d| d.get("email"))
                .and_then(|v| v.as_str())
                == Some(email.as_str())
        })
        .expect("Audit entry for unknown-email request not found");
    assert!(entry.actor_user_id.is_none());
}

#[tokio::test]
#[ignore] // Requires running PostgreSQL
async fn test_reset_flow_end_to_end() {
    let harness = TestHarness::spawn().await;
    let meta = ClientMeta::default();
    let email = TestHarness::unique_email("resetter");
    harness
        .create_user(&email, "Or1ginal!Passw0rd", UserRole::User)
        .await;

    harness
        .password_resets
        .request_reset(&email, &meta)
        .await
        .expect("Failed to request reset");
    let token = reset_token_for(&harness, &email).expect("Reset notification not recorded");
    assert_eq!(token.len(), 64);

    // Validate does not consume the ticket.
    let reset = harness
        .password_resets
        .validate_reset_token(&token)
        .await
        .expect("Failed to validate reset token");
    assert_eq!(reset.email, email);
    assert!(!reset.used);

    harness
        .password_resets
        .reset_password(&token, "Replac3d!Passw0rd", &meta)
        .await
        .expect("Failed to reset password");

    // New password works, the old one does not.
    harness
        .accounts
        .login(&email, "Replac3d!Passw0rd", &meta)
        .await
        .expect("Login with new password failed");
    let err = harness
        .accounts
        .login(&email, "Or1ginal!Passw0rd", &meta)
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::InvalidCredentials));

    // The ticket is single-use, before and after its expiry window.
    let err = harness
        .password_resets
        .reset_password(&token, "Anoth3r!Passw0rd", &meta)
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::ResetTokenUsed));
    let err = harness
        .password_resets
        .validate_reset_token(&token)
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::ResetTokenUsed));
}

#[tokio::test]
#[ignore] // Requires running PostgreSQL
async fn test_new_request_invalidates_prior_tickets() {
    let harness = TestHarness::spawn().await;
    let meta = ClientMeta::default();
    let email = TestHarness::unique_email("impatient");
    harness
        .create_user(&email, "Or1ginal!Passw0rd", UserRole::User)
        .await;

    harness
        .password_resets
        .request_reset(&email, &meta)
        .await
        .unwrap();
    let first_token = reset_token_for(&harness, &email).expect("First token not recorded");

    harness
        .password_resets
        .request_reset(&email, &meta)
        .await
        .unwrap();
    let second_token = reset_token_for(&harness, &email).expect("Second token not recorded");
    assert_ne!(first_token, second_token);

    // Only the newest ticket is redeemable; the first reports AlreadyUsed,
    // not Expired.
    let err = harness
        .password_resets
        .validate_reset_token(&first_token)
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::ResetTokenUsed));

    harness
        .password_resets
        .validate_reset_token(&second_token)
        .await
        .expect("Newest ticket must stay valid");
}

#[tokio::test]
#[ignore] // Requires running PostgreSQL
async fn test_expired_reset_token_is_rejected() {
    let harness = TestHarness::spawn().await;
    let meta = ClientMeta::default();
    let email = TestHarness::unique_email("slow");
    harness
        .create_user(&email, "Or1ginal!Passw0rd", UserRole::User)
        .await;

    harness
        .password_resets
        .request_reset(&email, &meta)
        .await
        .unwrap();
    let token = reset_token_for(&harness, &email).expect("Token not recorded");

    let reset = harness
        .store
        .find_password_reset_by_token(&token)
        .await
        .unwrap()
        .unwrap();
    harness.expire_password_reset(reset.reset_id).await;

    let err = harness
        .password_resets
        .validate_reset_token(&token)
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::ResetTokenExpired));

    let err = harness
        .password_resets
        .reset_password(&token, "Replac3d!Passw0rd", &meta)
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::ResetTokenExpired));

    // The old password still works; nothing was half-applied.
    harness
        .accounts
        .login(&email, "Or1ginal!Passw0rd", &meta)
        .await
        .expect("Original password must survive a failed reset");
}

#[tokio::test]
#[ignore] // Requires running PostgreSQL
async fn test_sso_account_gets_no_reset_ticket() {
    let harness = TestHarness::spawn().await;
    let meta = ClientMeta::default();
    let email = TestHarness::unique_sso_email("sso");

    harness
        .accounts
        .sso_sign_in(&email, Some("SSO User".to_string()), &meta)
        .await
        .expect("SSO provisioning failed");

    harness
        .password_resets
        .request_reset(&email, &meta)
        .await
        .expect("Request must still report success");
    assert!(reset_token_for(&harness, &email).is_none());
}

#[tokio::test]
#[ignore] // Requires running PostgreSQL
async fn test_weak_replacement_password_is_rejected() {
    let harness = TestHarness::spawn().await;
    let meta = ClientMeta::default();
    let email = TestHarness::unique_email("weak.reset");
    harness
        .create_user(&email, "Or1ginal!Passw0rd", UserRole::User)
        .await;

    harness
        .password_resets
        .request_reset(&email, &meta)
        .await
        .unwrap();
    let token = reset_token_for(&harness, &email).expect("Token not recorded");

    let err = harness
        .password_resets
        .reset_password(&token, "alllowercase123!", &meta)
        .await
        .unwrap_err();
    match err {
        WorkflowError::WeakPassword(violations) => {
            assert!(violations.iter().any(|v| v.contains("uppercase")));
        }
        other => panic!("Expected WeakPassword, got {:?}", other),
    }

    // The ticket survives a rejected attempt.
    harness
        .password_resets
        .validate_reset_token(&token)
        .await
        .expect("Ticket must remain valid after a policy rejection");
}
