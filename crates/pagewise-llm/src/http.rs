//! Shared HTTP client construction for consistent timeout and TLS configuration.

use std::time::Duration;

use crate::error::LlmError;

/// Default whole-request timeout for inference calls.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Create an HTTP client with the standard pagewise configuration.
///
/// Config: 30s connect timeout, `request_timeout` for the whole request, rustls TLS,
/// `pagewise/{version}` user-agent, redirect limit 10.
///
/// # Errors
///
/// Returns an error if the TLS backend cannot be initialized.
pub fn client_with_timeout(request_timeout: Duration) -> Result<reqwest::Client, LlmError> {
    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(30))
        .timeout(request_timeout)
        .user_agent(concat!("pagewise/", env!("CARGO_PKG_VERSION")))
        .redirect(reqwest::redirect::Policy::limited(10))
        .build()
        .map_err(LlmError::Http)
}

/// Create an HTTP client using [`DEFAULT_REQUEST_TIMEOUT`].
///
/// # Errors
///
/// Returns an error if the TLS backend cannot be initialized.
pub fn default_client() -> Result<reqwest::Client, LlmError> {
    client_with_timeout(DEFAULT_REQUEST_TIMEOUT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_builds_successfully() {
        assert!(default_client().is_ok());
    }

    #[test]
    fn client_with_short_timeout_builds() {
        assert!(client_with_timeout(Duration::from_millis(50)).is_ok());
    }
}
