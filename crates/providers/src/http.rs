//! HTTP plumbing shared by the provider implementations.

use std::time::Duration;

use serde::de::DeserializeOwned;

use crate::provider::ProviderError;

/// Build a [`reqwest::Client`] whose requests give up after `timeout`.
pub(crate) fn build_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Falling back to default HTTP client");
            reqwest::Client::new()
        })
}

/// Ensure the response has a success status code, then decode its JSON body.
///
/// Non-2xx responses become [`ProviderError::Api`] carrying the status and
/// body text; undecodable bodies become [`ProviderError::MalformedResponse`].
pub(crate) async fn parse_response<T: DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, ProviderError> {
    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<unreadable body>".to_string());
        return Err(ProviderError::Api {
            status: status.as_u16(),
            body,
        });
    }

    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes)
        .map_err(|e| ProviderError::MalformedResponse(format!("invalid response body: {e}")))
}
