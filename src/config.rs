use std::time::Duration;

pub struct Config {
    pub port: u16,
    pub database_url: String,
    /// How long a fresh connection may take to send its auth frame.
    /// `None` waits indefinitely.
    pub auth_timeout: Option<Duration>,
    pub token_reap_interval: Duration,
}

impl Config {
    pub fn from_env() -> Self {
        let auth_timeout = std::env::var("TALENTTRADE_AUTH_TIMEOUT")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs);

        let token_reap_interval = std::env::var("TALENTTRADE_TOKEN_REAP_INTERVAL")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .unwrap_or(600);

        Self {
            port: std::env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(5000),
            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite:talenttrade.db?mode=rwc".to_string()),
            auth_timeout,
            token_reap_interval: Duration::from_secs(token_reap_interval),
        }
    }
}
