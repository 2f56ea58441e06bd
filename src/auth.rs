use http::HeaderMap;
use thiserror::Error;

pub const API_KEY_HEADER: &str = "x-api-key";
pub const AUTHORIZATION_HEADER: &str = "authorization";

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Missing API key")]
    MissingApiKey,

    #[error("Invalid API key")]
    InvalidApiKey,
}

/// Shared-secret check. A request passes when either `X-API-KEY: <key>`
/// or `Authorization: Bearer <key>` carries the configured secret.
pub struct ApiKeyGuard {
    key: Option<String>,
}

impl ApiKeyGuard {
    pub fn new(key: Option<String>) -> Self {
        Self { key }
    }

    /// The check is skipped entirely when no key is configured.
    pub fn check(&self, headers: &HeaderMap) -> Result<(), AuthError> {
        let Some(expected) = self.key.as_deref() else {
            return Ok(());
        };

        let mut presented = false;

        if let Some(value) = headers.get(API_KEY_HEADER).and_then(|v| v.to_str().ok()) {
            presented = true;
            if value == expected {
                return Ok(());
            }
        }

        if let Some(value) = headers
            .get(AUTHORIZATION_HEADER)
            .and_then(|v| v.to_str().ok())
        {
            if let Some(token) = value.strip_prefix("Bearer ") {
                presented = true;
                if token == expected {
                    return Ok(());
                }
            }
        }

        if presented {
            Err(AuthError::InvalidApiKey)
        } else {
            Err(AuthError::MissingApiKey)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    fn headers(pairs: &[(&str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.append(
                http::HeaderName::from_bytes(name.as_bytes()).unwrap(),
                HeaderValue::from_str(value).unwrap(),
            );
        }
        map
    }

    #[test]
    fn no_configured_key_passes_everything() {
        let guard = ApiKeyGuard::new(None);
        assert!(guard.check(&HeaderMap::new()).is_ok());
        assert!(guard.check(&headers(&[("x-api-key", "anything")])).is_ok());
    }

    #[test]
    fn api_key_header_satisfies_check() {
        let guard = ApiKeyGuard::new(Some("secret".to_string()));
        assert!(guard.check(&headers(&[("x-api-key", "secret")])).is_ok());
    }

    #[test]
    fn bearer_token_satisfies_check() {
        let guard = ApiKeyGuard::new(Some("secret".to_string()));
        assert!(guard
            .check(&headers(&[("authorization", "Bearer secret")]))
            .is_ok());
    }

    #[test]
    fn missing_credentials_are_rejected() {
        let guard = ApiKeyGuard::new(Some("secret".to_string()));
        assert!(matches!(
            guard.check(&HeaderMap::new()),
            Err(AuthError::MissingApiKey)
        ));
    }

    #[test]
    fn wrong_key_is_rejected() {
        let guard = ApiKeyGuard::new(Some("secret".to_string()));
        assert!(matches!(
            guard.check(&headers(&[("x-api-key", "wrong")])),
            Err(AuthError::InvalidApiKey)
        ));
        assert!(matches!(
            guard.check(&headers(&[("authorization", "Bearer wrong")])),
            Err(AuthError::InvalidApiKey)
        ));
    }

    #[test]
    fn non_bearer_authorization_counts_as_missing() {
        let guard = ApiKeyGuard::new(Some("secret".to_string()));
        assert!(matches!(
            guard.check(&headers(&[("authorization", "Basic abc")])),
            Err(AuthError::MissingApiKey)
        ));
    }
}
