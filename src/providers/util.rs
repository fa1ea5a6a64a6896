use crate::core::config::NetworkConfig;
use crate::core::error::RateError;
use serde::de::DeserializeOwned;
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// Retries an async operation with configurable attempts and delays
///
/// # Parameters
/// - `operation`: Closure returning a future
/// - `retries`: Number of retry attempts (total runs = 1 initial + retries)
/// - `delay_ms`: Milliseconds between retry attempts
///
/// # Returns
/// Either the successful result or the error from the last attempt
pub async fn with_retry<F, Fut, T, E>(
    mut operation: F,
    retries: usize,
    delay_ms: u64,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let mut attempt = 1;
    loop {
        match operation().await {
            Ok(val) => return Ok(val),
            Err(err) => {
                if attempt > retries {
                    return Err(err);
                }
                debug!(
                    "Attempt {}/{} failed: {}. Retrying...",
                    attempt, retries, err
                );
                attempt += 1;
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }
        }
    }
}

/// HTTP client shared by one provider. Every request is bounded by the
/// configured timeout.
pub fn build_client(network: &NetworkConfig) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent("xconv/0.1")
        .timeout(network.timeout())
        .build()
}

/// GETs `url` and decodes the JSON body. Any transport failure, timeout,
/// non-success status or undecodable body is `UpstreamUnavailable`.
pub async fn get_json<T: DeserializeOwned>(
    client: &reqwest::Client,
    url: &str,
    network: &NetworkConfig,
    service: &str,
) -> Result<T, RateError> {
    debug!("Requesting {} data from {}", service, url);

    let response = with_retry(
        || client.get(url).send(),
        network.retries,
        network.retry_delay_ms,
    )
    .await
    .map_err(|e| {
        if e.is_timeout() {
            RateError::upstream(service, format!("Request timed out: {url}"))
        } else {
            RateError::upstream(service, format!("Request error: {e}"))
        }
    })?;

    if !response.status().is_success() {
        return Err(RateError::upstream(
            service,
            format!("HTTP error: {}", response.status()),
        ));
    }

    let text = response
        .text()
        .await
        .map_err(|e| RateError::upstream(service, format!("Failed to read response: {e}")))?;

    serde_json::from_str(&text).map_err(|e| {
        debug!(response = %text, "Failed to parse {} response", service);
        RateError::upstream(service, format!("Failed to parse JSON response: {e}"))
    })
}
