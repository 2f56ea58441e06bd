use super::{OutboundBody, OutboundRequest, ProxyError};
use http_body_util::BodyExt;
use reqwest::redirect::Policy;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, instrument};

pub struct UpstreamClient {
    http_client: Client,
}

impl UpstreamClient {
    /// The client follows redirects (when configured) and transparently
    /// decompresses response bodies; reqwest drops the `content-encoding`
    /// and `content-length` headers of anything it decompresses, so the
    /// relay never advertises a stale encoding to the caller.
    pub fn new(follow_redirects: bool) -> anyhow::Result<Self> {
        let redirect = if follow_redirects {
            Policy::default()
        } else {
            Policy::none()
        };

        let http_client = Client::builder()
            .redirect(redirect)
            .gzip(true)
            .pool_max_idle_per_host(20)
            .build()?;

        Ok(Self { http_client })
    }

    /// Issue the outbound request with a deadline armed at dispatch
    /// start. The deadline covers connection, upload and download;
    /// exceeding it aborts the in-flight exchange.
    #[instrument(
        skip(self, outbound),
        fields(method = %outbound.method, host = outbound.url.host_str().unwrap_or("-"))
    )]
    pub async fn dispatch(
        &self,
        outbound: OutboundRequest,
        deadline: Duration,
    ) -> Result<reqwest::Response, ProxyError> {
        let mut request = self
            .http_client
            .request(outbound.method, outbound.url)
            .timeout(deadline)
            .headers(outbound.headers);

        request = match outbound.body {
            OutboundBody::Empty => request,
            OutboundBody::Json(value) => {
                let bytes = serde_json::to_vec(&value)
                    .map_err(|e| ProxyError::BodyRead(e.to_string()))?;
                request.body(bytes)
            }
            OutboundBody::Buffered(bytes) => request.body(bytes),
            OutboundBody::Stream(incoming) => {
                request.body(reqwest::Body::wrap_stream(incoming.into_data_stream()))
            }
        };

        let start = std::time::Instant::now();

        let response = request.send().await.map_err(ProxyError::from)?;

        debug!(
            status = response.status().as_u16(),
            latency_ms = start.elapsed().as_millis() as u64,
            "Upstream response received"
        );

        Ok(response)
    }
}
