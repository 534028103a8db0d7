//! Invitation workflow integration tests.
//!
//! Run against PostgreSQL: `TEST_DATABASE_URL=... cargo test -- --ignored`

mod common;

use common::TestHarness;
use credential_service::models::{ClientMeta, InvitationStatus, UserRole, UserStatus};
use credential_service::services::notifier::SentNotification;
use credential_service::services::WorkflowError;

#[tokio::test]
#[ignore] // Requires running PostgreSQL
async fn test_invitation_lifecycle_end_to_end() {
    let harness = TestHarness::spawn().await;
    let admin = harness.create_admin().await;
    let email = TestHarness::unique_email("new.user");
    let meta = ClientMeta::default();

    // Create
    let invitation = harness
        .invitations
        .create_invitation(&email, UserRole::User, &admin, &meta)
        .await
        .expect("Failed to create invitation");
    assert_eq!(invitation.status, InvitationStatus::Pending);
    assert_eq!(invitation.email, email);

    // The notifier saw the token and the inviter's display identity.
    let sent = harness.notifier.sent();
    let token = sent
        .iter()
        .find_map(|n| match n {
            SentNotification::Invitation {
                to_email,
                token,
                invited_by,
            } if to_email == &email => {
                assert_eq!(invited_by, "Test User");
                Some(token.clone())
            }
            _ => None,
        })
        .expect("Invitation notification not recorded");
    assert_eq!(token.len(), 64);

    // Validate returns the same email and role without consuming anything.
    let validated = harness
        .invitations
        .validate_token(&token)
        .await
        .expect("Failed to validate token");
    assert_eq!(validated.email, email);
    assert_eq!(validated.role, UserRole::User);

    // Accept creates the account and consumes the invitation.
    let user = harness
        .invitations
        .accept_invitation(&token, "New User", "Str0ng!Passw0rd", &meta)
        .await
        .expect("Failed to accept invitation");
    assert_eq!(user.email, email);
    assert_eq!(user.role, UserRole::User);
    assert_eq!(user.status, UserStatus::Active);

    // A second accept observes the terminal state.
    let err = harness
        .invitations
        .accept_invitation(&token, "Imposter", "0ther!Passw0rd", &meta)
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::InvitationNotPending));

    // The fresh credentials work for login.
    let (logged_in, access_token) = harness
        .accounts
        .login(&email, "Str0ng!Passw0rd", &meta)
        .await
        .expect("Login with invited credentials failed");
    assert_eq!(logged_in.user_id, user.user_id);

    // And the session resolves back to the same user.
    let ctx = harness
        .accounts
        .resolve_session(&access_token)
        .await
        .expect("Failed to resolve session");
    assert_eq!(ctx.user_id, user.user_id);
    assert_eq!(ctx.role, UserRole::User);
}

#[tokio::test]
#[ignore] // Requires running PostgreSQL
async fn test_second_pending_invitation_is_rejected() {
    let harness = TestHarness::spawn().await;
    let admin = harness.create_admin().await;
    let email = TestHarness::unique_email("pending.twice");
    let meta = ClientMeta::default();

    harness
        .invitations
        .create_invitation(&email, UserRole::User, &admin, &meta)
        .await
        .expect("Failed to create first invitation");

    let err = harness
        .invitations
        .create_invitation(&email, UserRole::User, &admin, &meta)
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::PendingInvitationExists));
}

#[tokio::test]
#[ignore] // Requires running PostgreSQL
async fn test_inviting_existing_user_is_rejected() {
    let harness = TestHarness::spawn().await;
    let admin = harness.create_admin().await;
    let email = TestHarness::unique_email("already.here");
    let meta = ClientMeta::default();

    harness
        .create_user(&email, "Exist1ng!Passw0rd", UserRole::User)
        .await;

    let err = harness
        .invitations
        .create_invitation(&email, UserRole::User, &admin, &meta)
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::UserAlreadyExists));
}

#[tokio::test]
#[ignore] // Requires running PostgreSQL
async fn test_invitation_requires_admin_issuer() {
    let harness = TestHarness::spawn().await;
    let meta = ClientMeta::default();
    let plain_user = harness
        .create_user(
            &TestHarness::unique_email("plain"),
            "Plain!Passw0rd1",
            UserRole::User,
        )
        .await;

    let err = harness
        .invitations
        .create_invitation(
            &TestHarness::unique_email("target"),
            UserRole::User,
            &plain_user,
            &meta,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::Forbidden(_)));
}

#[tokio::test]
#[ignore] // Requires running PostgreSQL
async fn test_only_super_admin_mints_super_admin() {
    let harness = TestHarness::spawn().await;
    let meta = ClientMeta::default();
    let admin = harness.create_admin().await;

    let err = harness
        .invitations
        .create_invitation(
            &TestHarness::unique_email("escalation"),
            UserRole::SuperAdmin,
            &admin,
            &meta,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::Forbidden(_)));

    let super_admin = harness
        .create_user(
            &TestHarness::unique_email("root"),
            "Sup3r!Passw0rd",
            UserRole::SuperAdmin,
        )
        .await;

    let invitation = harness
        .invitations
        .create_invitation(
            &TestHarness::unique_email("new.super"),
            UserRole::SuperAdmin,
            &super_admin,
            &meta,
        )
        .await
        .expect("Super admin failed to mint super admin invitation");
    assert_eq!(invitation.role, UserRole::SuperAdmin);
}

#[tokio::test]
#[ignore] // Requires running PostgreSQL
async fn test_expired_invitation_reports_expired_idempotently() {
    let harness = TestHarness::spawn().await;
    let admin = harness.create_admin().await;
    let email = TestHarness::unique_email("late");
    let meta = ClientMeta::default();

    let invitation = harness
        .invitations
        .create_invitation(&email, UserRole::User, &admin, &meta)
        .await
        .expect("Failed to create invitation");
    harness.expire_invitation(invitation.invitation_id).await;

    // First validation performs the lazy PENDING -> EXPIRED transition.
    let err = harness
        .invitations
        .validate_token(&invitation.token)
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::InvitationExpired));

    let stored = harness
        .store
        .find_invitation_by_token(&invitation.token)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, InvitationStatus::Expired);

    // Every later validation keeps reporting Expired.
    for _ in 0..2 {
        let err = harness
            .invitations
            .validate_token(&invitation.token)
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::InvitationExpired));
    }
}

#[tokio::test]
#[ignore] // Requires running PostgreSQL
async fn test_accept_rechecks_expiry_inside_transaction() {
    let harness = TestHarness::spawn().await;
    let admin = harness.create_admin().await;
    let email = TestHarness::unique_email("expired.accept");
    let meta = ClientMeta::default();

    let invitation = harness
        .invitations
        .create_invitation(&email, UserRole::User, &admin, &meta)
        .await
        .expect("Failed to create invitation");
    harness.expire_invitation(invitation.invitation_id).await;

    let err = harness
        .invitations
        .accept_invitation(&invitation.token, "Too Late", "Str0ng!Passw0rd", &meta)
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::InvitationExpired));

    // No account was created and the invitation is terminally expired.
    assert!(harness
        .store
        .find_user_by_email(&email)
        .await
        .unwrap()
        .is_none());
    let stored = harness
        .store
        .find_invitation_by_token(&invitation.token)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, InvitationStatus::Expired);
}

#[tokio::test]
#[ignore] // Requires running PostgreSQL
async fn test_concurrent_accepts_have_single_winner() {
    let harness = TestHarness::spawn().await;
    let admin = harness.create_admin().await;
    let email = TestHarness::unique_email("race");
    let meta = ClientMeta::default();

    let invitation = harness
        .invitations
        .create_invitation(&email, UserRole::User, &admin, &meta)
        .await
        .expect("Failed to create invitation");

    let (a, b) = tokio::join!(
        harness
            .invitations
            .accept_invitation(&invitation.token, "Racer A", "Str0ng!Passw0rdA", &meta),
        harness
            .invitations
            .accept_invitation(&invitation.token, "Racer B", "Str0ng!Passw0rdB", &meta),
    );

    let winners = [a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count();
    assert_eq!(winners, 1, "exactly one concurrent accept must win");

    for result in [a, b] {
        if let Err(err) = result {
            assert!(matches!(
                err,
                WorkflowError::InvitationNotPending | WorkflowError::UserAlreadyExists
            ));
        }
    }

    // No duplicate account.
    let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users WHERE email = $1")
        .bind(&email)
        .fetch_one(harness.store.pool())
        .await
        .unwrap();
    assert_eq!(count.0, 1);
}

#[tokio::test]
#[ignore] // Requires running PostgreSQL
async fn test_revoked_invitation_cannot_be_accepted() {
    let harness = TestHarness::spawn().await;
    let admin = harness.create_admin().await;
    let email = TestHarness::unique_email("revoked");
    let meta = ClientMeta::default();

    let invitation = harness
        .invitations
        .create_invitation(&email, UserRole::User, &admin, &meta)
        .await
        .expect("Failed to create invitation");

    harness
        .invitations
        .revoke_invitation(invitation.invitation_id, &admin, &meta)
        .await
        .expect("Failed to revoke invitation");

    let err = harness
        .invitations
        .accept_invitation(&invitation.token, "Late Comer", "Str0ng!Passw0rd", &meta)
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::InvitationNotPending));

    // Revoking again reports the terminal state.
    let err = harness
        .invitations
        .revoke_invitation(invitation.invitation_id, &admin, &meta)
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::InvitationNotPending));
}

#[tokio::test]
#[ignore] // Requires running PostgreSQL
async fn test_weak_password_lists_every_violation() {
    let harness = TestHarness::spawn().await;
    let admin = harness.create_admin().await;
    let email = TestHarness::unique_email("weak");
    let meta = ClientMeta::default();

    let invitation = harness
        .invitations
        .create_invitation(&email, UserRole::User, &admin, &meta)
        .await
        .expect("Failed to create invitation");

    let err = harness
        .invitations
        .accept_invitation(&invitation.token, "Weak Pass", "short", &meta)
        .await
        .unwrap_err();

    match err {
        WorkflowError::WeakPassword(violations) => {
            // Too short, no uppercase, no digit, no special character.
            assert!(violations.len() >= 4);
        }
        other => panic!("Expected WeakPassword, got {:?}", other),
    }

    // The invitation is still pending and redeemable.
    let validated = harness
        .invitations
        .validate_token(&invitation.token)
        .await
        .expect("Invitation should still be valid");
    assert_eq!(validated.status, InvitationStatus::Pending);
}
