use std::sync::Arc;

use futures_util::{stream, Stream};
use sqlx::sqlite::SqlitePool;
use time::OffsetDateTime;
use tokio::sync::watch;
use tracing::warn;

use crate::account::model::{NewUser, User};

/// True when an insert ran into one of the unique indexes on `users`.
/// Exists-checks before insert are advisory only; this is the authoritative
/// signal and must be translated into a duplicate error by the caller.
pub(crate) fn is_unique_violation(error: &sqlx::Error) -> bool {
    matches!(
        error,
        sqlx::Error::Database(db) if db.kind() == sqlx::error::ErrorKind::UniqueViolation
    )
}

/// Persistent CRUD over user records, plus a reactive read for UI binding.
///
/// Every mutation commits before returning and bumps a revision counter
/// that wakes the [`UserStore::observe`] streams.
#[derive(Clone)]
pub struct UserStore {
    pool: SqlitePool,
    revision: Arc<watch::Sender<u64>>,
}

impl UserStore {
    pub fn new(pool: SqlitePool) -> Self {
        let (revision, _) = watch::channel(0u64);
        Self {
            pool,
            revision: Arc::new(revision),
        }
    }

    fn touch(&self) {
        self.revision.send_modify(|rev| *rev = rev.wrapping_add(1));
    }

    /// Insert a new record and return its assigned id. Fails with a
    /// unique-violation database error if username or email is taken.
    pub async fn insert(&self, user: &NewUser) -> sqlx::Result<i64> {
        let created_at = OffsetDateTime::now_utc();
        let result = sqlx::query(
            r#"
            INSERT INTO users (username, email, password_hash, created_at, full_name)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(created_at)
        .bind(&user.full_name)
        .execute(&self.pool)
        .await?;
        self.touch();
        Ok(result.last_insert_rowid())
    }

    pub async fn find_by_email(&self, email: &str) -> sqlx::Result<Option<User>> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, email, password_hash, created_at, last_login,
                   is_active, full_name, phone
            FROM users
            WHERE email = ? AND is_active = 1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
    }

    pub async fn find_by_username(&self, username: &str) -> sqlx::Result<Option<User>> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, email, password_hash, created_at, last_login,
                   is_active, full_name, phone
            FROM users
            WHERE username = ? AND is_active = 1
            "#,
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await
    }

    /// Resolve a login credential against either the email or username
    /// column, among active records only.
    pub async fn find_by_email_or_username(&self, credential: &str) -> sqlx::Result<Option<User>> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, email, password_hash, created_at, last_login,
                   is_active, full_name, phone
            FROM users
            WHERE (email = ? OR username = ?) AND is_active = 1
            "#,
        )
        .bind(credential)
        .bind(credential)
        .fetch_optional(&self.pool)
        .await
    }

    /// Unrestricted by the active flag; used by the session layer.
    pub async fn find_by_id(&self, id: i64) -> sqlx::Result<Option<User>> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, email, password_hash, created_at, last_login,
                   is_active, full_name, phone
            FROM users
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    pub async fn exists_by_email(&self, email: &str) -> sqlx::Result<bool> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE email = ?")
            .bind(email)
            .fetch_one(&self.pool)
            .await?;
        Ok(count > 0)
    }

    pub async fn exists_by_username(&self, username: &str) -> sqlx::Result<bool> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE username = ?")
            .bind(username)
            .fetch_one(&self.pool)
            .await?;
        Ok(count > 0)
    }

    pub async fn update_last_login(&self, id: i64, timestamp: OffsetDateTime) -> sqlx::Result<()> {
        sqlx::query("UPDATE users SET last_login = ? WHERE id = ?")
            .bind(timestamp)
            .bind(id)
            .execute(&self.pool)
            .await?;
        self.touch();
        Ok(())
    }

    pub async fn update_full_name(&self, id: i64, full_name: Option<&str>) -> sqlx::Result<()> {
        sqlx::query("UPDATE users SET full_name = ? WHERE id = ?")
            .bind(full_name)
            .bind(id)
            .execute(&self.pool)
            .await?;
        self.touch();
        Ok(())
    }

    pub async fn update_phone(&self, id: i64, phone: Option<&str>) -> sqlx::Result<()> {
        sqlx::query("UPDATE users SET phone = ? WHERE id = ?")
            .bind(phone)
            .bind(id)
            .execute(&self.pool)
            .await?;
        self.touch();
        Ok(())
    }

    pub async fn update_profile(
        &self,
        id: i64,
        full_name: Option<&str>,
        phone: Option<&str>,
    ) -> sqlx::Result<()> {
        sqlx::query("UPDATE users SET full_name = ?, phone = ? WHERE id = ?")
            .bind(full_name)
            .bind(phone)
            .bind(id)
            .execute(&self.pool)
            .await?;
        self.touch();
        Ok(())
    }

    pub async fn update_password_hash(&self, id: i64, password_hash: &str) -> sqlx::Result<()> {
        sqlx::query("UPDATE users SET password_hash = ? WHERE id = ?")
            .bind(password_hash)
            .bind(id)
            .execute(&self.pool)
            .await?;
        self.touch();
        Ok(())
    }

    /// Soft delete: the record stays behind the unique indexes but drops
    /// out of every active-only query.
    pub async fn deactivate(&self, id: i64) -> sqlx::Result<()> {
        sqlx::query("UPDATE users SET is_active = 0 WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        self.touch();
        Ok(())
    }

    /// Live view of a single record: emits its current state on subscribe
    /// and again after every committed change, skipping writes that left it
    /// untouched. Ends when the store is dropped; dropping the stream stops
    /// all background polling.
    pub fn observe(&self, id: i64) -> impl Stream<Item = Option<User>> + Send {
        let pool = self.pool.clone();
        let revision = self.revision.subscribe();

        stream::unfold(
            (pool, revision, None::<Option<User>>),
            move |(pool, mut revision, mut last)| async move {
                loop {
                    // The first poll emits without waiting for a write.
                    if last.is_some() && revision.changed().await.is_err() {
                        return None;
                    }

                    let current = match Self::fetch_by_id(&pool, id).await {
                        Ok(row) => row,
                        Err(error) => {
                            warn!(user_id = id, %error, "observe query failed");
                            if revision.changed().await.is_err() {
                                return None;
                            }
                            continue;
                        }
                    };

                    match &last {
                        Some(prev) if *prev == current => continue,
                        _ => {
                            last = Some(current.clone());
                            return Some((current, (pool, revision, last)));
                        }
                    }
                }
            },
        )
    }

    async fn fetch_by_id(pool: &SqlitePool, id: i64) -> sqlx::Result<Option<User>> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, email, password_hash, created_at, last_login,
                   is_active, full_name, phone
            FROM users
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }
}
