use anyhow::{Context, Result};
use tracing::debug;

use crate::retry::{with_retry_if, RetryConfig};

/// Count whitespace-delimited tokens. This is the word-count rule used
/// everywhere a count has to be derived from raw text.
pub fn count_words(text: &str) -> i64 {
    text.split_whitespace().count() as i64
}

/// Client for the external store holding originals too large to inline.
/// Only the word-count fallback reaches for it.
#[derive(Clone)]
pub struct ContentStore {
    client: reqwest::Client,
}

impl Default for ContentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ContentStore {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    /// Fetch the original document body by URL, with bounded retries for
    /// transient failures.
    pub async fn fetch_original(&self, url: &str) -> Result<String> {
        let body = with_retry_if(
            &RetryConfig::content_fetch(),
            &format!("Content fetch {}", url),
            || async {
                let response = self
                    .client
                    .get(url)
                    .send()
                    .await
                    .context("Failed to reach content store")?;

                if !response.status().is_success() {
                    let status = response.status();
                    let body = response
                        .text()
                        .await
                        .unwrap_or_else(|e| format!("<failed to read body: {}>", e));
                    anyhow::bail!("Content store error ({}): {}", status, body);
                }

                response
                    .text()
                    .await
                    .context("Failed to read content store response body")
            },
            is_retryable_error,
        )
        .await?;

        debug!("Fetched {} bytes from {}", body.len(), url);
        Ok(body)
    }
}

/// Retry 429 and 5xx responses plus network-level failures; other 4xx
/// client errors fail immediately.
fn is_retryable_error(error: &anyhow::Error) -> bool {
    let error_str = error.to_string();

    // Error format: "Content store error (503 Service Unavailable): ..."
    if error_str.contains("Content store error") {
        if let Some(start) = error_str.find('(') {
            if let Some(end) = error_str[start..].find(')') {
                let status_str = &error_str[start + 1..start + end];
                let status_num = status_str.split_whitespace().next().unwrap_or("");
                if let Ok(status) = status_num.parse::<u16>() {
                    return status == 429 || status >= 500;
                }
            }
        }
    }

    // Network errors, timeouts, and other transient failures
    true
}
