use crate::auth::AuthError;
use crate::proxy::{full_body, ProxyBody};
use http::{HeaderValue, Response, StatusCode};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("{0}")]
    Auth(#[from] AuthError),

    #[error("Missing 'url' parameter (query or JSON body)")]
    MissingTarget,

    #[error("Invalid 'url' parameter: {0}")]
    InvalidTarget(String),

    #[error("Host not allowed by proxy configuration")]
    HostNotAllowed,

    #[error("No handler for this path")]
    RouteNotFound,

    #[error("Request body exceeds limit of {limit} bytes")]
    BodyTooLarge { limit: usize },

    #[error("Failed to read request body: {0}")]
    BodyRead(String),

    #[error("Upstream request timed out")]
    UpstreamTimeout,

    #[error("Upstream request failed")]
    UpstreamNetwork(String),
}

impl From<reqwest::Error> for ProxyError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ProxyError::UpstreamTimeout
        } else {
            ProxyError::UpstreamNetwork(err.to_string())
        }
    }
}

impl ProxyError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ProxyError::Auth(_) => StatusCode::UNAUTHORIZED,
            ProxyError::MissingTarget | ProxyError::InvalidTarget(_) | ProxyError::BodyRead(_) => {
                StatusCode::BAD_REQUEST
            }
            ProxyError::HostNotAllowed => StatusCode::FORBIDDEN,
            ProxyError::RouteNotFound => StatusCode::NOT_FOUND,
            ProxyError::BodyTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            ProxyError::UpstreamTimeout => StatusCode::GATEWAY_TIMEOUT,
            ProxyError::UpstreamNetwork(_) => StatusCode::BAD_GATEWAY,
        }
    }

    /// Build the client-facing JSON error response. Network errors carry
    /// the underlying transport message under `details` for diagnostics.
    pub fn to_response(&self, request_id: &str) -> Response<ProxyBody> {
        let body_json = match self {
            ProxyError::UpstreamNetwork(details) => json!({
                "error": self.to_string(),
                "details": details,
            }),
            _ => json!({ "error": self.to_string() }),
        };

        let mut response = Response::builder()
            .status(self.status_code())
            .header("content-type", "application/json")
            .body(full_body(serde_json::to_vec(&body_json).unwrap_or_default()))
            .unwrap_or_else(|_| Response::new(full_body(Vec::new())));

        if let Ok(id) = HeaderValue::from_str(request_id) {
            response.headers_mut().insert("x-request-id", id);
        }

        response
    }
}
