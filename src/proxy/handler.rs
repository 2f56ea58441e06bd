use super::{translate, BoxError, ProxyBody, ProxyError, ProxyState};
use crate::allowlist;
use crate::config::ProxyConfig;
use crate::headers;
use futures_util::StreamExt;
use http::{HeaderValue, Request, Response};
use http_body_util::{BodyExt, StreamBody};
use hyper::body::{Frame, Incoming};
use std::net::SocketAddr;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

pub const PROXY_ROUTE: &str = "/proxy";

pub struct ProxyHandler {
    state: ProxyState,
}

impl ProxyHandler {
    pub fn new(config: ProxyConfig) -> anyhow::Result<Self> {
        let state = ProxyState::new(config)?;
        Ok(Self { state })
    }

    /// Run the per-request pipeline and always produce a response; every
    /// stage failure maps to its status code via `ProxyError`.
    #[instrument(
        skip(self, req),
        fields(request_id, method = %req.method(), path = req.uri().path())
    )]
    pub async fn handle_request(
        &self,
        req: Request<Incoming>,
        client_addr: SocketAddr,
    ) -> Response<ProxyBody> {
        let request_id = Uuid::new_v4().to_string();
        tracing::Span::current().record("request_id", request_id.as_str());

        match self.run_pipeline(req, client_addr, &request_id).await {
            Ok(response) => response,
            Err(e) => {
                info!(
                    error = %e,
                    status = e.status_code().as_u16(),
                    "Request rejected"
                );
                e.to_response(&request_id)
            }
        }
    }

    /// AuthCheck -> TargetExtract -> HostValidate -> Translate ->
    /// Dispatch -> Relay, strictly sequential; the first failing stage
    /// short-circuits. No retries: upstream failures are forwarded.
    async fn run_pipeline(
        &self,
        req: Request<Incoming>,
        client_addr: SocketAddr,
        request_id: &str,
    ) -> Result<Response<ProxyBody>, ProxyError> {
        if req.uri().path() != PROXY_ROUTE {
            return Err(ProxyError::RouteNotFound);
        }

        self.state.auth.check(req.headers())?;

        let (parts, body) = req.into_parts();

        // A target named in the query is checked against the allowlist
        // before any body is read, so a disallowed host is rejected
        // ahead of body buffering. A target carried in a JSON body can
        // only be checked after translation below.
        if let Some(target) = translate::target_from_query(parts.uri.query()) {
            let url = translate::parse_target(&target)?;
            if !allowlist::host_allowed(&url, &self.state.patterns) {
                return Err(ProxyError::HostNotAllowed);
            }
        }

        let outbound = translate::translate(
            parts,
            body,
            client_addr.ip(),
            "http",
            self.state.config.max_json_body_bytes,
        )
        .await?;

        if !allowlist::host_allowed(&outbound.url, &self.state.patterns) {
            return Err(ProxyError::HostNotAllowed);
        }

        debug!(target = %outbound.url, "Target allowed, dispatching upstream");

        let start = std::time::Instant::now();
        let upstream_response = self
            .state
            .upstream_client
            .dispatch(outbound, self.state.config.request_timeout())
            .await?;

        info!(
            status = upstream_response.status().as_u16(),
            upstream_latency_ms = start.elapsed().as_millis() as u64,
            "Relaying upstream response"
        );

        Ok(relay(upstream_response, request_id))
    }
}

/// Mirror the upstream status, copy its headers through the hop-by-hop
/// filter, and stream the body through without buffering. A body error
/// after this point cannot change the status line; it is logged and the
/// client stream is terminated.
fn relay(upstream: reqwest::Response, request_id: &str) -> Response<ProxyBody> {
    let status = upstream.status();
    let relayed_headers = headers::strip_hop_by_hop(upstream.headers());

    let id = request_id.to_string();
    let stream = upstream.bytes_stream().map(move |chunk| match chunk {
        Ok(data) => Ok(Frame::data(data)),
        Err(e) => {
            warn!(
                request_id = %id,
                error = %e,
                "Upstream body failed mid-relay, terminating client stream"
            );
            Err(BoxError::from(e))
        }
    });

    let mut response = Response::new(BodyExt::boxed(StreamBody::new(stream)));
    *response.status_mut() = status;
    *response.headers_mut() = relayed_headers;

    if let Ok(id) = HeaderValue::from_str(request_id) {
        response.headers_mut().insert("x-request-id", id);
    }

    response
}
