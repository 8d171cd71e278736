use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, TimeZone, Utc};
use tracing::warn;

/// Result of one fixed-window check.
#[derive(Debug, Clone)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub remaining: u32,
    pub reset_at: DateTime<Utc>,
}

/// Fixed-window request counter keyed by identifier + window index.
///
/// A limiter that cannot do its job admits the request: its own outage must
/// never turn into a denial of service.
#[derive(Clone, Default)]
pub struct RateLimiter {
    windows: Arc<Mutex<HashMap<(String, i64), u32>>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn check(&self, identifier: &str, limit: u32, window_secs: u64) -> RateLimitDecision {
        self.check_at(identifier, limit, window_secs, Utc::now().timestamp())
    }

    fn check_at(
        &self,
        identifier: &str,
        limit: u32,
        window_secs: u64,
        now_unix: i64,
    ) -> RateLimitDecision {
        let window_secs = window_secs.max(1) as i64;
        let window = now_unix.div_euclid(window_secs);
        let reset_at = Utc
            .timestamp_opt((window + 1) * window_secs, 0)
            .single()
            .unwrap_or_else(Utc::now);

        let mut windows = match self.windows.lock() {
            Ok(windows) => windows,
            Err(e) => {
                // Fail open
                warn!("Rate limiter lock unavailable, allowing request: {}", e);
                return RateLimitDecision {
                    allowed: true,
                    remaining: limit,
                    reset_at,
                };
            }
        };

        // Drop counters from windows that can no longer matter
        windows.retain(|(_, w), _| *w + 1 >= window);

        let count = windows
            .entry((identifier.to_string(), window))
            .or_insert(0);
        if *count >= limit {
            return RateLimitDecision {
                allowed: false,
                remaining: 0,
                reset_at,
            };
        }
        *count += 1;
        RateLimitDecision {
            allowed: true,
            remaining: limit - *count,
            reset_at,
        }
    }
}
