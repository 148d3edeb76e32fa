//! Account core of the petcare app: a credential store over a local SQLite
//! database, and the account service that drives registration, login,
//! sessions and profile maintenance on top of it.
//!
//! The UI layer consumes [`AccountService`] directly; every call returns
//! either a value or a typed [`AccountError`] whose message is safe to
//! render verbatim.

pub mod account;
pub mod config;
pub mod db;
pub mod error;
pub mod state;

pub use account::model::User;
pub use account::profile::ProfileData;
pub use account::service::AccountService;
pub use account::store::UserStore;
pub use config::AppConfig;
pub use error::AccountError;
pub use state::AppState;
