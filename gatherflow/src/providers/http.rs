//! Shared response handling for HTTP collaborators.

use crate::errors::UpstreamError;
use reqwest::{RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tracing::warn;

/// Sends a request, mapping transport failures to [`UpstreamError::Request`].
pub(crate) async fn send(service: &str, request: RequestBuilder) -> Result<Response, UpstreamError> {
    let response = match request.send().await {
        Ok(response) => response,
        Err(e) => {
            let err = UpstreamError::request(service, e);
            if err.is_timeout() {
                warn!(service, "Upstream request timed out");
            }
            return Err(err);
        }
    };
    ensure_success(service, response).await
}

/// Fails with [`UpstreamError::Status`] unless the response is 2xx.
pub(crate) async fn ensure_success(
    service: &str,
    response: Response,
) -> Result<Response, UpstreamError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    warn!(
        service,
        status = status.as_u16(),
        body = %body.chars().take(200).collect::<String>(),
        "Upstream returned an error status"
    );
    Err(UpstreamError::status(service, status.as_u16()))
}

/// Reads the whole body as text.
pub(crate) async fn read_text(service: &str, response: Response) -> Result<String, UpstreamError> {
    response
        .text()
        .await
        .map_err(|e| UpstreamError::request(service, e))
}

/// Reads the whole body and decodes it as JSON.
pub(crate) async fn read_json<T: DeserializeOwned>(
    service: &str,
    response: Response,
) -> Result<T, UpstreamError> {
    let body = read_text(service, response).await?;
    serde_json::from_str(&body).map_err(|e| UpstreamError::decode(service, e.to_string()))
}

/// Sends a request and decodes a JSON response.
pub(crate) async fn get_json<T: DeserializeOwned>(
    service: &str,
    request: RequestBuilder,
) -> Result<T, UpstreamError> {
    let response = send(service, request).await?;
    read_json(service, response).await
}
