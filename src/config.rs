use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    /// bcrypt work factor for every newly stored hash. Existing hashes embed
    /// their own cost, so changing this never invalidates old records.
    pub bcrypt_cost: u32,
    pub min_username_len: usize,
    pub min_password_len: usize,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let database_url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://petcare.db?mode=rwc".into());
        let bcrypt_cost = std::env::var("BCRYPT_COST")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(bcrypt::DEFAULT_COST);
        let min_username_len = std::env::var("MIN_USERNAME_LEN")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(3);
        let min_password_len = std::env::var("MIN_PASSWORD_LEN")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(6);
        Self {
            database_url,
            bcrypt_cost,
            min_username_len,
            min_password_len,
        }
    }
}
