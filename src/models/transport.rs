use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use tracing::warn;

use crate::utils::{BackendError, ConfigError};

/// Shared HTTP client for one adapter.
/// No request timeout: callers that need a deadline wrap the call themselves.
pub(super) fn build_client() -> Result<Client, ConfigError> {
    Ok(Client::builder()
        .user_agent(concat!("fitcoach/", env!("CARGO_PKG_VERSION")))
        .build()?)
}

/// Send a request and decode a JSON body, mapping non-2xx to `BackendError::Status`
pub(super) async fn send_json<T: DeserializeOwned>(
    request: RequestBuilder,
    provider: &str,
) -> Result<T, BackendError> {
    let response = request.send().await?;
    let status = response.status();

    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        warn!("{} backend returned HTTP {}", provider, status.as_u16());
        return Err(BackendError::Status {
            status: status.as_u16(),
            body,
        });
    }

    let body = response.text().await?;
    serde_json::from_str(&body).map_err(|e| {
        BackendError::InvalidResponse(format!("{} response did not parse: {}", provider, e))
    })
}
