use std::sync::{Arc, Once};

use futures_util::StreamExt;
use petcare::{db, AccountError, AccountService, AppConfig, UserStore};

static TRACING: Once = Once::new();

fn init_tracing() {
    TRACING.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("petcare=debug")),
            )
            .with_test_writer()
            .try_init()
            .ok();
    });
}

async fn service() -> AccountService {
    init_tracing();
    let config = Arc::new(AppConfig {
        database_url: "sqlite::memory:".into(),
        // Low work factor to keep the suite fast; production defaults to 12.
        bcrypt_cost: 4,
        min_username_len: 3,
        min_password_len: 6,
    });
    let pool = db::connect(&config.database_url)
        .await
        .expect("in-memory pool");
    AccountService::new(UserStore::new(pool), config)
}

#[tokio::test]
async fn register_then_login_with_normalized_fields() {
    let accounts = service().await;
    let id = accounts
        .register("alice", "Alice@Example.COM", "secret1")
        .await
        .expect("register");
    assert_eq!(id, 1);

    let user = accounts
        .login("alice@example.com", "secret1")
        .await
        .expect("login with lowercased email");
    assert_eq!(user.username, "alice");
    assert_eq!(user.email, "alice@example.com");
}

#[tokio::test]
async fn login_works_with_username_as_credential() {
    let accounts = service().await;
    accounts
        .register("alice", "alice@example.com", "secret1")
        .await
        .expect("register");
    let user = accounts.login("alice", "secret1").await.expect("login");
    assert_eq!(user.email, "alice@example.com");
}

#[tokio::test]
async fn register_rejects_bad_input() {
    let accounts = service().await;
    let err = accounts
        .register("al", "alice@example.com", "secret1")
        .await
        .unwrap_err();
    assert!(matches!(err, AccountError::Validation(_)));

    let err = accounts
        .register("alice", "not-an-email", "secret1")
        .await
        .unwrap_err();
    assert!(matches!(err, AccountError::Validation(_)));

    let err = accounts
        .register("alice", "alice@example.com", "short")
        .await
        .unwrap_err();
    assert!(matches!(err, AccountError::Validation(_)));

    // Nothing was inserted along the way.
    let err = accounts.login("alice", "secret1").await.unwrap_err();
    assert!(matches!(err, AccountError::NotFound(_)));
}

#[tokio::test]
async fn duplicate_email_and_username_are_rejected() {
    let accounts = service().await;
    accounts
        .register("alice", "alice@example.com", "secret1")
        .await
        .expect("first register");

    let err = accounts
        .register("alice2", "alice@example.com", "secret2")
        .await
        .unwrap_err();
    assert!(matches!(err, AccountError::Duplicate(_)));

    let err = accounts
        .register("alice", "alice2@example.com", "secret2")
        .await
        .unwrap_err();
    assert!(matches!(err, AccountError::Duplicate(_)));
}

#[tokio::test]
async fn duplicate_email_is_caught_case_insensitively() {
    let accounts = service().await;
    accounts
        .register("alice", "alice@example.com", "secret1")
        .await
        .expect("first register");

    // The exists-check sees a different string, but the insert normalizes
    // to the stored lowercased form and hits the unique index.
    let err = accounts
        .register("alice2", "Alice@Example.com", "secret2")
        .await
        .unwrap_err();
    assert!(matches!(err, AccountError::Duplicate(_)));
}

#[tokio::test]
async fn login_failures_are_typed() {
    let accounts = service().await;
    accounts
        .register("alice", "alice@example.com", "secret1")
        .await
        .expect("register");

    let err = accounts.login("alice", "wrong").await.unwrap_err();
    assert!(matches!(err, AccountError::Authentication(_)));

    let err = accounts.login("nobody", "secret1").await.unwrap_err();
    assert!(matches!(err, AccountError::NotFound(_)));
}

#[tokio::test]
async fn stored_hash_is_never_the_plaintext() {
    let accounts = service().await;
    accounts
        .register("alice", "alice@example.com", "secret1")
        .await
        .expect("register");
    let user = accounts
        .current_user_once()
        .await
        .expect("read")
        .expect("session user");
    assert_ne!(user.password_hash, "secret1");
    assert!(user.password_hash.starts_with("$2"));
}

#[tokio::test]
async fn session_follows_register_login_logout() {
    let accounts = service().await;
    assert!(accounts.current_user_once().await.expect("read").is_none());
    assert!(!accounts.is_authenticated().await);

    accounts
        .register("alice", "alice@example.com", "secret1")
        .await
        .expect("register");
    assert!(accounts.is_authenticated().await);
    let user = accounts
        .current_user_once()
        .await
        .expect("read")
        .expect("session user");
    assert_eq!(user.username, "alice");

    accounts.logout();
    assert!(accounts.current_user_once().await.expect("read").is_none());
    // Logging out twice is safe and leaves the session unchanged.
    accounts.logout();
    assert!(accounts.current_user_once().await.expect("read").is_none());
    assert!(!accounts.is_authenticated().await);
}

#[tokio::test]
async fn login_updates_last_login() {
    let accounts = service().await;
    accounts
        .register("alice", "alice@example.com", "secret1")
        .await
        .expect("register");
    let before = accounts
        .current_user_once()
        .await
        .expect("read")
        .expect("user");
    assert!(before.last_login.is_none());

    accounts.login("alice", "secret1").await.expect("login");
    let after = accounts
        .current_user_once()
        .await
        .expect("read")
        .expect("user");
    assert!(after.last_login.is_some());
}

#[tokio::test]
async fn profile_updates_require_a_session() {
    let accounts = service().await;
    let err = accounts.update_full_name("Alice Smith").await.unwrap_err();
    assert!(matches!(err, AccountError::Authentication(_)));
    let err = accounts.update_phone("+15550100").await.unwrap_err();
    assert!(matches!(err, AccountError::Authentication(_)));
    let err = accounts
        .update_profile(Some("Alice Smith"), Some("+15550100"))
        .await
        .unwrap_err();
    assert!(matches!(err, AccountError::Authentication(_)));
}

#[tokio::test]
async fn profile_updates_are_visible_on_the_next_read() {
    let accounts = service().await;
    accounts
        .register("alice", "alice@example.com", "secret1")
        .await
        .expect("register");

    assert!(accounts.update_full_name("Alice Smith").await.expect("update"));
    assert!(accounts.update_phone("+15550100").await.expect("update"));

    let user = accounts
        .current_user_once()
        .await
        .expect("read")
        .expect("user");
    assert_eq!(user.full_name.as_deref(), Some("Alice Smith"));
    assert_eq!(user.phone.as_deref(), Some("+15550100"));

    assert!(accounts
        .update_profile(Some("Alice B. Smith"), None)
        .await
        .expect("update"));
    let user = accounts
        .current_user_once()
        .await
        .expect("read")
        .expect("user");
    assert_eq!(user.full_name.as_deref(), Some("Alice B. Smith"));
    assert_eq!(user.phone, None);
}

#[tokio::test]
async fn current_user_stream_tracks_profile_changes() {
    let accounts = service().await;
    accounts
        .register("alice", "alice@example.com", "secret1")
        .await
        .expect("register");

    let mut updates = Box::pin(accounts.current_user());
    let first = updates.next().await.expect("initial emission");
    assert_eq!(first.expect("user").full_name.as_deref(), Some("alice"));

    accounts.update_full_name("Alice Smith").await.expect("update");
    let second = updates.next().await.expect("emission after update");
    assert_eq!(
        second.expect("user").full_name.as_deref(),
        Some("Alice Smith")
    );
}

#[tokio::test]
async fn current_user_stream_without_session_emits_none() {
    let accounts = service().await;
    let mut updates = Box::pin(accounts.current_user());
    assert_eq!(updates.next().await, Some(None));
}

#[tokio::test]
async fn change_password_takes_effect_on_next_login() {
    let accounts = service().await;
    accounts
        .register("alice", "alice@example.com", "secret1")
        .await
        .expect("register");

    assert!(accounts
        .change_password("secret1", "evenbettersecret")
        .await
        .expect("change password"));

    accounts.logout();
    let err = accounts.login("alice", "secret1").await.unwrap_err();
    assert!(matches!(err, AccountError::Authentication(_)));
    accounts
        .login("alice", "evenbettersecret")
        .await
        .expect("login with new password");
}

#[tokio::test]
async fn change_password_guards() {
    let accounts = service().await;
    let err = accounts.change_password("a", "b").await.unwrap_err();
    assert!(matches!(err, AccountError::Authentication(_)));

    accounts
        .register("alice", "alice@example.com", "secret1")
        .await
        .expect("register");

    let err = accounts
        .change_password("wrong", "evenbettersecret")
        .await
        .unwrap_err();
    assert!(matches!(err, AccountError::Authentication(msg) if msg.contains("current password")));

    let err = accounts.change_password("secret1", "short").await.unwrap_err();
    assert!(matches!(err, AccountError::Validation(_)));

    // The stored hash is untouched after the failed attempts.
    accounts.logout();
    accounts.login("alice", "secret1").await.expect("old password still valid");
}

#[tokio::test]
async fn delete_account_soft_deletes_and_ends_the_session() {
    let accounts = service().await;
    accounts
        .register("alice", "alice@example.com", "secret1")
        .await
        .expect("register");

    assert!(accounts.delete_account().await.expect("delete"));
    assert!(accounts.current_user_once().await.expect("read").is_none());

    // The record is inactive, so the credential no longer resolves...
    let err = accounts.login("alice", "secret1").await.unwrap_err();
    assert!(matches!(err, AccountError::NotFound(_)));

    // ...but the unique indexes still hold the email and username.
    let err = accounts
        .register("alice", "alice@example.com", "secret2")
        .await
        .unwrap_err();
    assert!(matches!(err, AccountError::Duplicate(_)));
}

#[tokio::test]
async fn profile_data_projects_the_current_user() {
    let accounts = service().await;
    assert!(accounts.profile_data().await.is_none());

    accounts
        .register("alice", "alice@example.com", "secret1")
        .await
        .expect("register");
    accounts
        .update_profile(Some("Alice Smith"), None)
        .await
        .expect("update");

    let data = accounts.profile_data().await.expect("profile data");
    assert_eq!(data.full_name, "Alice Smith");
    assert_eq!(data.avatar_initials, "AS");
    assert_eq!(data.email, "alice@example.com");
    assert_eq!(data.phone, "not provided");
    assert!(!data.registration_date.is_empty());
}

// The worked scenario from the design discussion, end to end.
#[tokio::test]
async fn reference_scenario() {
    let accounts = service().await;

    let id = accounts
        .register("alice", "alice@example.com", "secret1")
        .await
        .expect("register");
    assert_eq!(id, 1);

    let user = accounts.login("alice", "secret1").await.expect("login");
    assert_eq!(user.username, "alice");

    let err = accounts.login("alice", "wrong").await.unwrap_err();
    assert!(matches!(err, AccountError::Authentication(_)));

    let err = accounts
        .register("alice2", "alice@example.com", "secret2")
        .await
        .unwrap_err();
    assert!(matches!(err, AccountError::Duplicate(_)));
}
