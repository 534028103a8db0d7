//! Login, SSO provisioning and session resolution integration tests.
//!
//! Run against PostgreSQL: `TEST_DATABASE_URL=... cargo test -- --ignored`

mod common;

use common::TestHarness;
use credential_service::models::{AuthType, ClientMeta, UserRole, UserStatus};
use credential_service::services::WorkflowError;

#[tokio::test]
#[ignore] // Requires running PostgreSQL
async fn test_login_rejects_wrong_password_and_unknown_email_alike() {
    let harness = TestHarness::spawn().await;
    let meta = ClientMeta::default();
    let email = TestHarness::unique_email("login");
    harness
        .create_user(&email, "C0rrect!Passw0rd", UserRole::User)
        .await;

    let wrong_password = harness
        .accounts
        .login(&email, "Wr0ng!Passw0rd22", &meta)
        .await
        .unwrap_err();
    let unknown_email = harness
        .accounts
        .login(
            &TestHarness::unique_email("nobody"),
            "C0rrect!Passw0rd",
            &meta,
        )
        .await
        .unwrap_err();

    // Indistinguishable failures; no account enumeration through login.
    assert!(matches!(wrong_password, WorkflowError::InvalidCredentials));
    assert!(matches!(unknown_email, WorkflowError::InvalidCredentials));
}

#[tokio::test]
#[ignore] // Requires running PostgreSQL
async fn test_login_stamps_last_login() {
    let harness = TestHarness::spawn().await;
    let meta = ClientMeta::default();
    let email = TestHarness::unique_email("stamp");
    let ctx = harness
        .create_user(&email, "C0rrect!Passw0rd", UserRole::User)
        .await;

    assert!(harness
        .store
        .find_user_by_id(ctx.user_id)
        .await
        .unwrap()
        .unwrap()
        .last_login_utc
        .is_none());

    harness
        .accounts
        .login(&email, "C0rrect!Passw0rd", &meta)
        .await
        .expect("Login failed");

    assert!(harness
        .store
        .find_user_by_id(ctx.user_id)
        .await
        .unwrap()
        .unwrap()
        .last_login_utc
        .is_some());
}

#[tokio::test]
#[ignore] // Requires running PostgreSQL
async fn test_inactive_account_cannot_login_or_resolve() {
    let harness = TestHarness::spawn().await;
    let meta = ClientMeta::default();
    let email = TestHarness::unique_email("benched");
    let ctx = harness
        .create_user(&email, "C0rrect!Passw0rd", UserRole::User)
        .await;

    let (_user, token) = harness
        .accounts
        .login(&email, "C0rrect!Passw0rd", &meta)
        .await
        .expect("Login failed");

    harness.deactivate_user(ctx.user_id).await;

    // Deactivation takes effect immediately, not at token expiry.
    let err = harness.accounts.resolve_session(&token).await.unwrap_err();
    assert!(matches!(err, WorkflowError::AccountInactive));

    let err = harness
        .accounts
        .login(&email, "C0rrect!Passw0rd", &meta)
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::AccountInactive));
}

#[tokio::test]
#[ignore] // Requires running PostgreSQL
async fn test_sso_first_sign_in_provisions_user() {
    let harness = TestHarness::spawn().await;
    let meta = ClientMeta::default();
    let email = TestHarness::unique_sso_email("fresh");

    let (user, token) = harness
        .accounts
        .sso_sign_in(&email, Some("Fresh Signer".to_string()), &meta)
        .await
        .expect("First SSO sign-in failed");

    assert_eq!(user.auth_type, AuthType::GoogleSso);
    assert_eq!(user.role, UserRole::User);
    assert_eq!(user.status, UserStatus::Active);
    assert!(user.password_hash.is_none());

    let ctx = harness
        .accounts
        .resolve_session(&token)
        .await
        .expect("SSO session did not resolve");
    assert_eq!(ctx.user_id, user.user_id);

    // A later sign-in reuses the account and refreshes the profile.
    let (again, _token) = harness
        .accounts
        .sso_sign_in(&email, Some("Renamed Signer".to_string()), &meta)
        .await
        .expect("Repeat SSO sign-in failed");
    assert_eq!(again.user_id, user.user_id);

    let stored = harness
        .store
        .find_user_by_id(user.user_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.display_name.as_deref(), Some("Renamed Signer"));
}

#[tokio::test]
#[ignore] // Requires running PostgreSQL
async fn test_sso_rejects_unlisted_domain() {
    let harness = TestHarness::spawn().await;
    let meta = ClientMeta::default();

    let err = harness
        .accounts
        .sso_sign_in("intruder@elsewhere.test", None, &meta)
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::Forbidden(_)));
}

#[tokio::test]
#[ignore] // Requires running PostgreSQL
async fn test_sso_users_cannot_login_with_password() {
    let harness = TestHarness::spawn().await;
    let meta = ClientMeta::default();
    let email = TestHarness::unique_sso_email("nopass");

    harness
        .accounts
        .sso_sign_in(&email, None, &meta)
        .await
        .expect("SSO provisioning failed");

    let err = harness
        .accounts
        .login(&email, "AnyGuess!Passw0rd1", &meta)
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::InvalidCredentials));
}

#[tokio::test]
#[ignore] // Requires running PostgreSQL
async fn test_bootstrap_super_admin_only_on_empty_database() {
    let harness = TestHarness::spawn().await;
    let email = TestHarness::unique_email("bootstrap");

    // The shared test database virtually always has rows from other tests;
    // bootstrap must then be a no-op.
    harness
        .create_user(
            &TestHarness::unique_email("existing"),
            "Ex1sting!Passw0rd",
            UserRole::User,
        )
        .await;

    let seeded = harness
        .accounts
        .bootstrap_super_admin(&email, "B00tstrap!Passw0rd")
        .await
        .expect("Bootstrap check failed");
    assert!(seeded.is_none());
    assert!(harness
        .store
        .find_user_by_email(&email)
        .await
        .unwrap()
        .is_none());
}
