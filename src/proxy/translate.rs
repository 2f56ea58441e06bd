use super::ProxyError;
use crate::headers;
use bytes::Bytes;
use http::header::{CONTENT_LENGTH, CONTENT_TYPE, HOST};
use http::{request::Parts, HeaderMap, HeaderValue, Method};
use http_body_util::{BodyExt, LengthLimitError, Limited};
use hyper::body::Incoming;
use serde_json::Value;
use std::net::IpAddr;
use url::Url;

/// Body disposition, decided once here and never re-inspected downstream.
pub enum OutboundBody {
    Empty,
    /// Parsed JSON payload, re-serialized canonically at dispatch.
    Json(Value),
    /// JSON content-type whose payload did not parse; the buffered bytes
    /// are forwarded verbatim.
    Buffered(Bytes),
    /// Any other payload passes through without buffering.
    Stream(Incoming),
}

pub struct OutboundRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: OutboundBody,
}

/// Map an inbound request onto an upstream request: extract the target
/// URL (query parameter first, then a `url` field in a JSON body),
/// sanitize headers, and pick the body path.
///
/// GET and HEAD never forward a body, whatever the caller sent. Only
/// JSON payloads are buffered, bounded by `max_json_body_bytes`;
/// everything else streams.
pub async fn translate(
    parts: Parts,
    body: Incoming,
    client_ip: IpAddr,
    scheme: &str,
    max_json_body_bytes: usize,
) -> Result<OutboundRequest, ProxyError> {
    let query_target = target_from_query(parts.uri.query());
    let is_json = is_json_content_type(&parts.headers);
    let forwards_body = !matches!(parts.method, Method::GET | Method::HEAD);

    let (target, outbound_body) = if is_json {
        let bytes = read_buffered_body(body, max_json_body_bytes).await?;

        match serde_json::from_slice::<Value>(&bytes) {
            Ok(value) => {
                let target = query_target.or_else(|| {
                    value
                        .get("url")
                        .and_then(|v| v.as_str())
                        .map(str::to_string)
                });
                let outbound_body = if forwards_body {
                    OutboundBody::Json(value)
                } else {
                    OutboundBody::Empty
                };
                (target, outbound_body)
            }
            Err(_) => {
                let outbound_body = if forwards_body {
                    OutboundBody::Buffered(bytes)
                } else {
                    OutboundBody::Empty
                };
                (query_target, outbound_body)
            }
        }
    } else if forwards_body {
        (query_target, OutboundBody::Stream(body))
    } else {
        (query_target, OutboundBody::Empty)
    };

    let target = target.ok_or(ProxyError::MissingTarget)?;
    let url = parse_target(&target)?;

    let inbound_host = parts.headers.get(HOST).cloned();
    let mut outbound_headers = headers::sanitize_request(&parts.headers);
    headers::inject_forwarded(&mut outbound_headers, client_ip, scheme, inbound_host.as_ref());

    match &outbound_body {
        // The transport sets an exact content-length for sized bodies;
        // the inbound value may no longer match after re-serialization
        // or body removal.
        OutboundBody::Empty | OutboundBody::Json(_) | OutboundBody::Buffered(_) => {
            outbound_headers.remove(CONTENT_LENGTH);
        }
        // Streamed bytes pass through verbatim, so the inbound framing
        // headers stay untouched.
        OutboundBody::Stream(_) => {}
    }

    if matches!(outbound_body, OutboundBody::Json(_))
        && !outbound_headers.contains_key(CONTENT_TYPE)
    {
        outbound_headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    }

    Ok(OutboundRequest {
        method: parts.method,
        url,
        headers: outbound_headers,
        body: outbound_body,
    })
}

async fn read_buffered_body(body: Incoming, limit: usize) -> Result<Bytes, ProxyError> {
    match Limited::new(body, limit).collect().await {
        Ok(collected) => Ok(collected.to_bytes()),
        Err(err) if err.is::<LengthLimitError>() => Err(ProxyError::BodyTooLarge { limit }),
        Err(err) => Err(ProxyError::BodyRead(err.to_string())),
    }
}

pub(crate) fn target_from_query(query: Option<&str>) -> Option<String> {
    let query = query?;
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(name, _)| name == "url")
        .map(|(_, value)| value.into_owned())
}

pub(crate) fn parse_target(target: &str) -> Result<Url, ProxyError> {
    Url::parse(target).map_err(|e| ProxyError::InvalidTarget(e.to_string()))
}

fn is_json_content_type(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_ascii_lowercase().contains("application/json"))
        .unwrap_or(false)
}
