use http::header::{HeaderMap, HeaderName, HeaderValue};
use std::net::IpAddr;
use tracing::warn;

/// Headers meaningful only for a single transport leg. Stripped from
/// both the outbound request and the relayed response.
const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Request-only removals. `host` is set by the upstream transport for the
/// target URL; `origin` is dropped so the upstream sees this proxy's
/// origin context rather than the caller's.
const REQUEST_ONLY: &[&str] = &["host", "origin"];

pub const X_FORWARDED_FOR: &str = "x-forwarded-for";
pub const X_FORWARDED_PROTO: &str = "x-forwarded-proto";
pub const X_FORWARDED_HOST: &str = "x-forwarded-host";

/// Remove the fixed hop-by-hop set, case-insensitively. Used on both
/// directions of the relay.
pub fn strip_hop_by_hop(headers: &HeaderMap) -> HeaderMap {
    let mut sanitized = HeaderMap::new();

    for (name, value) in headers.iter() {
        if HOP_BY_HOP.contains(&name.as_str()) {
            continue;
        }
        sanitized.append(name.clone(), value.clone());
    }

    sanitized
}

/// Request-path sanitization: hop-by-hop plus `host` and `origin`.
pub fn sanitize_request(headers: &HeaderMap) -> HeaderMap {
    let mut sanitized = HeaderMap::new();

    for (name, value) in headers.iter() {
        let name_str = name.as_str();

        if HOP_BY_HOP.contains(&name_str) || REQUEST_ONLY.contains(&name_str) {
            continue;
        }

        sanitized.append(name.clone(), value.clone());
    }

    sanitized
}

/// Inject forwarding metadata onto an outbound header map. The caller's
/// address is appended to any pre-existing `x-forwarded-for` chain,
/// comma-joined; proto and host are overwritten with the inbound values.
pub fn inject_forwarded(
    headers: &mut HeaderMap,
    client_ip: IpAddr,
    scheme: &str,
    inbound_host: Option<&HeaderValue>,
) {
    let forwarded_for = match headers
        .get(X_FORWARDED_FOR)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
    {
        Some(existing) => format!("{}, {}", existing, client_ip),
        None => client_ip.to_string(),
    };

    set_header(headers, X_FORWARDED_FOR, &forwarded_for);
    set_header(headers, X_FORWARDED_PROTO, scheme);

    if let Some(host) = inbound_host {
        headers.insert(HeaderName::from_static(X_FORWARDED_HOST), host.clone());
    }
}

fn set_header(headers: &mut HeaderMap, name: &'static str, value: &str) {
    match HeaderValue::from_str(value) {
        Ok(v) => {
            headers.insert(HeaderName::from_static(name), v);
        }
        Err(_) => {
            warn!(header = name, "Skipping forwarding header with invalid value");
        }
    }
}
