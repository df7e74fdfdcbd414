use chrono::Duration;
use secrecy::Secret;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database_url: String,
    pub host: String,
    pub port: u16,

    // Token signing and lifetimes
    pub jwt_secret: Secret<String>,
    pub access_token_ttl_minutes: i64,
    pub refresh_token_ttl_days: i64,

    // Pre-built admin frontend bundle
    pub static_dir: Option<String>,

    // First administrator, created only when no accounts exist
    pub bootstrap_admin_name: String,
    pub bootstrap_admin_password: Option<Secret<String>>,
}

impl Config {
    pub fn from_env() -> Result<Self, config::ConfigError> {
        // Load .env file if it exists (for local development)
        let _ = dotenvy::dotenv();

        let config = config::Config::builder()
            .add_source(config::Environment::default().separator("__"))
            .build()?;

        Ok(Self {
            database_url: config.get("database_url")?,
            host: config.get("host").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: config.get("port")?,

            jwt_secret: Secret::new(config.get("jwt_secret")?),
            access_token_ttl_minutes: config.get("access_token_ttl_minutes").unwrap_or(15),
            refresh_token_ttl_days: config.get("refresh_token_ttl_days").unwrap_or(7),

            static_dir: config.get("static_dir").ok(),

            bootstrap_admin_name: config
                .get("bootstrap_admin_name")
                .unwrap_or_else(|_| "admin".to_string()),
            bootstrap_admin_password: config
                .get::<String>("bootstrap_admin_password")
                .ok()
                .map(Secret::new),
        })
    }

    pub fn access_token_ttl(&self) -> Duration {
        Duration::minutes(self.access_token_ttl_minutes)
    }

    pub fn refresh_token_ttl(&self) -> Duration {
        Duration::days(self.refresh_token_ttl_days)
    }
}
