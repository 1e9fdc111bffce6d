use crate::error::{AppError, Result};
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, warn};

const BASE_BACKOFF_MS: u64 = 250;

/// Pause before retry number `retry`, counting from 1.
pub fn backoff_delay(retry: u32) -> Duration {
    let factor = 2u64
        .checked_pow(retry.saturating_sub(1))
        .unwrap_or(u64::MAX);
    Duration::from_millis(BASE_BACKOFF_MS.saturating_mul(factor))
}

/// Shared HTTP client for forecast providers.
#[derive(Clone)]
pub struct Fetcher {
    client: Client,
    max_retries: u32,
}

impl Fetcher {
    pub fn new(timeout: Duration, max_retries: u32) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("swell-forecast/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            max_retries,
        })
    }

    pub async fn get_text(&self, url: &str) -> Result<String> {
        self.get_text_with_query(url, &[]).await
    }

    pub async fn get_text_with_query(&self, url: &str, query: &[(&str, String)]) -> Result<String> {
        debug!("Fetching {}", url);

        retry_with_backoff(self.max_retries, || async {
            let response = self.client.get(url).query(query).send().await?;
            let response = response.error_for_status()?;
            let content = response.text().await?;
            Ok(content)
        })
        .await
    }

    /// GET a JSON document and decode it into `T`.
    ///
    /// Decoding failures are reported as [`AppError::Parse`] so they are never
    /// retried.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let body = self.get_text_with_query(url, query).await?;
        serde_json::from_str(&body)
            .map_err(|e| AppError::Parse(format!("Unexpected JSON payload from {}: {}", url, e)))
    }
}

/// Retry a future with exponential backoff
async fn retry_with_backoff<F, Fut, T>(max_retries: u32, mut f: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    let mut retries = 0;
    loop {
        match f().await {
            Ok(result) => return Ok(result),
            Err(e) => {
                retries += 1;

                if retries > max_retries {
                    return Err(e);
                }

                if !is_transient(&e) {
                    return Err(e);
                }

                let delay = backoff_delay(retries);
                warn!(
                    "Request failed (attempt {}/{}): {}. Retrying in {:?}...",
                    retries, max_retries, e, delay
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}

/// Connection errors, timeouts and 5xx responses are worth another attempt.
fn is_transient(e: &AppError) -> bool {
    match e {
        AppError::Http(reqwest_err) => {
            reqwest_err.is_timeout()
                || reqwest_err.is_connect()
                || reqwest_err
                    .status()
                    .map(|s| s.is_server_error())
                    .unwrap_or(false)
        }
        AppError::Io(_) => true,
        _ => false,
    }
}
