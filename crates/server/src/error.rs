//! Errors surfaced at the HTTP edge.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use squall_core::Error;

/// Failures the gateway reports to its own callers.
///
/// Upstream errors are the fetch mechanism's, passed through with a status
/// that says whose fault it was; the gateway adds nothing else.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// The inbound request could not be mapped onto an origin resource.
    #[error("BAD_REQUEST: {0}")]
    BadRequest(String),

    /// The fetch mechanism failed on the miss path.
    #[error("UPSTREAM: {0}")]
    Upstream(#[source] Error),
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = match &self {
            GatewayError::BadRequest(_) => StatusCode::BAD_REQUEST,
            GatewayError::Upstream(e) => match e {
                Error::FetchTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
                Error::InvalidUrl(_) | Error::InvalidInput(_) => StatusCode::BAD_REQUEST,
                _ => StatusCode::BAD_GATEWAY,
            },
        };

        (status, self.to_string()).into_response()
    }
}
