use std::sync::Arc;

use futures_util::Stream;
use lazy_static::lazy_static;
use regex::Regex;
use time::OffsetDateTime;
use tracing::{info, instrument, warn};

use crate::account::model::{NewUser, User};
use crate::account::password::{hash_password, verify_password};
use crate::account::profile::ProfileData;
use crate::account::session::Session;
use crate::account::store::{is_unique_violation, UserStore};
use crate::config::AppConfig;
use crate::error::AccountError;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Business rules around account creation, authentication and profile
/// maintenance. Owns the in-process [`Session`]; clones share both the
/// store and the session.
#[derive(Clone)]
pub struct AccountService {
    store: UserStore,
    config: Arc<AppConfig>,
    session: Session,
}

impl AccountService {
    pub fn new(store: UserStore, config: Arc<AppConfig>) -> Self {
        Self {
            store,
            config,
            session: Session::new(),
        }
    }

    /// Validate, check for collisions, then insert. The exists-checks are
    /// best-effort; a unique violation at insert time still surfaces as a
    /// duplicate error, not an internal one. On success the new user
    /// becomes the current session.
    #[instrument(skip(self, password))]
    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<i64, AccountError> {
        if username.chars().count() < self.config.min_username_len {
            return Err(AccountError::Validation(format!(
                "username must be at least {} characters",
                self.config.min_username_len
            )));
        }
        if !is_valid_email(email) {
            warn!(email, "invalid email");
            return Err(AccountError::Validation(
                "enter a valid email address".into(),
            ));
        }
        if password.chars().count() < self.config.min_password_len {
            return Err(AccountError::Validation(format!(
                "password must be at least {} characters",
                self.config.min_password_len
            )));
        }

        if self
            .store
            .exists_by_email(email)
            .await
            .map_err(AccountError::unknown)?
        {
            warn!(email, "email already registered");
            return Err(AccountError::Duplicate("this email is already in use".into()));
        }
        if self
            .store
            .exists_by_username(username)
            .await
            .map_err(AccountError::unknown)?
        {
            warn!(username, "username already taken");
            return Err(AccountError::Duplicate(
                "this username is already taken".into(),
            ));
        }

        let username = username.trim().to_string();
        let email = email.trim().to_lowercase();
        let password_hash =
            hash_password(password, self.config.bcrypt_cost).map_err(AccountError::unknown)?;

        let user = NewUser {
            full_name: Some(username.clone()),
            username,
            email,
            password_hash,
        };
        let id = match self.store.insert(&user).await {
            Ok(id) => id,
            // Lost the race between exists-check and insert; the unique
            // index is the authoritative guarantee.
            Err(error) if is_unique_violation(&error) => {
                warn!(%error, "insert hit a unique index after exists-checks passed");
                return Err(AccountError::Duplicate(
                    "this email or username is already in use".into(),
                ));
            }
            Err(error) => return Err(AccountError::unknown(error)),
        };

        self.session.set(id);
        info!(user_id = id, "user registered");
        Ok(id)
    }

    /// Authenticate by email or username and start a session.
    #[instrument(skip(self, password))]
    pub async fn login(&self, credential: &str, password: &str) -> Result<User, AccountError> {
        let user = self
            .store
            .find_by_email_or_username(credential.trim())
            .await
            .map_err(AccountError::unknown)?
            .ok_or_else(|| AccountError::NotFound("user not found".into()))?;

        let valid =
            verify_password(password, &user.password_hash).map_err(AccountError::unknown)?;
        if !valid {
            warn!(user_id = user.id, "login with wrong password");
            return Err(AccountError::Authentication("wrong password".into()));
        }

        self.store
            .update_last_login(user.id, OffsetDateTime::now_utc())
            .await
            .map_err(AccountError::unknown)?;
        self.session.set(user.id);
        info!(user_id = user.id, "user logged in");
        Ok(user)
    }

    pub fn logout(&self) {
        self.session.clear();
        info!("session cleared");
    }

    /// Live view of the current session's record. The session id is read
    /// once at call time; with no session the stream observes id 0, which
    /// never matches a row (rowids start at 1) and so yields `None`.
    pub fn current_user(&self) -> impl Stream<Item = Option<User>> + Send {
        self.store.observe(self.session.get().unwrap_or(0))
    }

    /// One-shot read of the session's record; `None` when no session.
    pub async fn current_user_once(&self) -> Result<Option<User>, AccountError> {
        match self.session.get() {
            Some(id) => self.store.find_by_id(id).await.map_err(AccountError::unknown),
            None => Ok(None),
        }
    }

    /// Session set and the record it points at still present.
    pub async fn is_authenticated(&self) -> bool {
        match self.current_user_once().await {
            Ok(user) => user.is_some(),
            Err(error) => {
                warn!(%error, "session check failed");
                false
            }
        }
    }

    fn require_session(&self) -> Result<i64, AccountError> {
        self.session
            .get()
            .ok_or_else(|| AccountError::Authentication("not authenticated".into()))
    }

    #[instrument(skip(self))]
    pub async fn update_profile(
        &self,
        full_name: Option<&str>,
        phone: Option<&str>,
    ) -> Result<bool, AccountError> {
        let id = self.require_session()?;
        self.store
            .update_profile(id, full_name, phone)
            .await
            .map_err(AccountError::unknown)?;
        info!(user_id = id, "profile updated");
        Ok(true)
    }

    #[instrument(skip(self))]
    pub async fn update_full_name(&self, full_name: &str) -> Result<bool, AccountError> {
        let id = self.require_session()?;
        self.store
            .update_full_name(id, Some(full_name))
            .await
            .map_err(AccountError::unknown)?;
        Ok(true)
    }

    #[instrument(skip(self))]
    pub async fn update_phone(&self, phone: &str) -> Result<bool, AccountError> {
        let id = self.require_session()?;
        self.store
            .update_phone(id, Some(phone))
            .await
            .map_err(AccountError::unknown)?;
        Ok(true)
    }

    /// Re-verifies the current password before storing a new hash, so a
    /// stolen session alone is not enough to take over the account.
    #[instrument(skip(self, current_password, new_password))]
    pub async fn change_password(
        &self,
        current_password: &str,
        new_password: &str,
    ) -> Result<bool, AccountError> {
        let id = self.require_session()?;
        let user = self
            .store
            .find_by_id(id)
            .await
            .map_err(AccountError::unknown)?
            .ok_or_else(|| AccountError::NotFound("user not found".into()))?;

        let valid = verify_password(current_password, &user.password_hash)
            .map_err(AccountError::unknown)?;
        if !valid {
            warn!(user_id = id, "change password with wrong current password");
            return Err(AccountError::Authentication(
                "current password is incorrect".into(),
            ));
        }
        if new_password.chars().count() < self.config.min_password_len {
            return Err(AccountError::Validation(format!(
                "password must be at least {} characters",
                self.config.min_password_len
            )));
        }

        let password_hash =
            hash_password(new_password, self.config.bcrypt_cost).map_err(AccountError::unknown)?;
        self.store
            .update_password_hash(id, &password_hash)
            .await
            .map_err(AccountError::unknown)?;
        info!(user_id = id, "password changed");
        Ok(true)
    }

    /// Soft-deletes the current account and ends the session. The row stays
    /// behind the unique indexes, so the email and username are not freed.
    #[instrument(skip(self))]
    pub async fn delete_account(&self) -> Result<bool, AccountError> {
        let id = self.require_session()?;
        self.store
            .deactivate(id)
            .await
            .map_err(AccountError::unknown)?;
        self.session.clear();
        info!(user_id = id, "account deactivated");
        Ok(true)
    }

    /// Profile-screen projection of the current user; `None` when there is
    /// no session or the read fails.
    pub async fn profile_data(&self) -> Option<ProfileData> {
        match self.current_user_once().await {
            Ok(user) => user.as_ref().map(ProfileData::from),
            Err(error) => {
                warn!(%error, "profile read failed");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_shape_check() {
        assert!(is_valid_email("alice@example.com"));
        assert!(is_valid_email("a.b+c@sub.domain.org"));
        assert!(!is_valid_email("alice"));
        assert!(!is_valid_email("alice@example"));
        assert!(!is_valid_email("alice @example.com"));
        assert!(!is_valid_email("@example.com"));
    }
}
