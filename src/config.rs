use anyhow::{Context, Result};

#[derive(Debug, Clone)]
pub struct Config {
    // Storage
    pub database_path: String,

    // HTTP server
    pub port: u16,

    // Operator key guarding the token-seeding endpoint
    pub admin_api_key: String,

    // Review workflow
    pub review_sla_hours: i64,
    pub overdue_check_minutes: u32,

    // Listings cache
    pub listing_cache_ttl_secs: u64,

    // Fixed-window rate limiting for mutating endpoints
    pub rate_limit_max_requests: u32,
    pub rate_limit_window_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            database_path: std::env::var("DATABASE_PATH")
                .unwrap_or_else(|_| "crowd_translate.db".to_string()),

            port: std::env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(8080),

            admin_api_key: std::env::var("ADMIN_API_KEY").context("ADMIN_API_KEY not set")?,

            review_sla_hours: std::env::var("REVIEW_SLA_HOURS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(72),
            overdue_check_minutes: std::env::var("OVERDUE_CHECK_MINUTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(60),

            listing_cache_ttl_secs: std::env::var("LISTING_CACHE_TTL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(300),

            rate_limit_max_requests: std::env::var("RATE_LIMIT_MAX_REQUESTS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(60),
            rate_limit_window_secs: std::env::var("RATE_LIMIT_WINDOW_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(60),
        })
    }
}
