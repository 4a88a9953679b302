use axum::http::{header, HeaderMap};
use url::Url;

pub const X_FORWARDED_HOST: &str = "x-forwarded-host";
pub const X_FORWARDED_PROTO: &str = "x-forwarded-proto";

fn first_header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Externally visible `<scheme>://<host>` of this service for a request.
///
/// Forwarded headers from the reverse proxy win over `Host`; without either,
/// the configured public base URL is used.
pub fn resolve_public_origin(headers: &HeaderMap, fallback: &str) -> String {
    let fallback = fallback.trim_end_matches('/');
    let host = first_header_value(headers, X_FORWARDED_HOST)
        .or_else(|| first_header_value(headers, header::HOST.as_str()));

    match host {
        Some(host) => {
            let proto = first_header_value(headers, X_FORWARDED_PROTO).unwrap_or(
                if fallback.starts_with("https://") {
                    "https"
                } else {
                    "http"
                },
            );
            format!("{}://{}", proto, host)
        }
        None => fallback.to_string(),
    }
}

/// Scheme, host and effective port must all match
pub fn same_origin(a: &Url, b: &Url) -> bool {
    a.scheme().eq_ignore_ascii_case(b.scheme())
        && a.host_str().map(str::to_ascii_lowercase) == b.host_str().map(str::to_ascii_lowercase)
        && a.port_or_known_default() == b.port_or_known_default()
}

/// `<scheme>://<host>[:port]` used for Referer/Origin on upstream requests
pub fn origin_of(url: &Url) -> String {
    match url.host_str() {
        Some(host) => match url.port() {
            Some(port) => format!("{}://{}:{}", url.scheme(), host, port),
            None => format!("{}://{}", url.scheme(), host),
        },
        None => url.scheme().to_string(),
    }
}
