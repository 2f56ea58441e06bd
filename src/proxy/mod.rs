mod error;
pub(crate) mod handler;
mod translate;
mod upstream;

pub use error::ProxyError;
pub use handler::ProxyHandler;
pub use translate::{OutboundBody, OutboundRequest};
pub use upstream::UpstreamClient;

use crate::allowlist::{compile_patterns, HostPattern};
use crate::auth::ApiKeyGuard;
use crate::config::ProxyConfig;
use bytes::Bytes;
use http_body_util::combinators::BoxBody;
use http_body_util::{BodyExt, Full};
use std::sync::Arc;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Client-facing body type: either a buffered error/empty body or the
/// streamed upstream payload.
pub type ProxyBody = BoxBody<Bytes, BoxError>;

pub fn full_body(bytes: impl Into<Bytes>) -> ProxyBody {
    Full::new(bytes.into())
        .map_err(|never| match never {})
        .boxed()
}

/// Per-process wiring, shared read-only across request tasks.
pub struct ProxyState {
    pub config: Arc<ProxyConfig>,
    pub patterns: Vec<HostPattern>,
    pub auth: ApiKeyGuard,
    pub upstream_client: UpstreamClient,
}

impl ProxyState {
    pub fn new(config: ProxyConfig) -> anyhow::Result<Self> {
        let patterns = compile_patterns(&config.allowed_hosts);
        let auth = ApiKeyGuard::new(config.api_key.clone());
        let upstream_client = UpstreamClient::new(config.follow_redirects)?;

        Ok(Self {
            config: Arc::new(config),
            patterns,
            auth,
            upstream_client,
        })
    }
}
