//! `http_request` host function: an outbound HTTP client hardened
//! against SSRF via DNS pinning — the hostname is resolved exactly
//! once, the resolved address is validated, and the connection is
//! dialed against that validated address while the original hostname
//! is preserved for the `Host` header and TLS SNI.

use std::net::SocketAddr;
use std::time::Duration;

use hickory_resolver::config::{ResolverConfig, ResolverOpts};
use hickory_resolver::TokioAsyncResolver;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use cce_capability::{is_granted, Capability, Kind};

use super::ssrf::is_private_or_reserved;
use crate::error::{Error, Result};

const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;
const MAX_REDIRECTS: usize = 10;
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

fn user_agent() -> String {
    format!("cce-runtime/{} ({})", env!("CARGO_PKG_VERSION"), std::env::consts::OS)
}

#[derive(Debug, Deserialize)]
pub struct HttpRequest {
    #[serde(default = "default_method")]
    pub method: String,
    pub url: String,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default)]
    pub body: Option<String>,
}

fn default_method() -> String {
    "GET".to_string()
}

#[derive(Debug, Serialize)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: String,
    pub truncated: bool,
}

/// Derive the `network:outbound:<port>` capability this request needs.
pub fn required_capability(url: &str) -> Result<(String, u16)> {
    let parsed = url::Url::parse(url).map_err(|e| Error::malformed_payload(format!("invalid URL: {e}")))?;
    let host = parsed
        .host_str()
        .ok_or_else(|| Error::malformed_payload("URL has no host"))?
        .to_string();
    let port = parsed.port_or_known_default().unwrap_or(80);
    Ok((host, port))
}

async fn resolve_pinned(host: &str) -> Result<std::net::IpAddr> {
    if let Ok(ip) = host.parse::<std::net::IpAddr>() {
        if is_private_or_reserved(ip) {
            return Err(Error::execution(format!(
                "SSRF protection blocked {host}: a private/reserved address"
            )));
        }
        return Ok(ip);
    }

    let resolver = TokioAsyncResolver::tokio(ResolverConfig::default(), ResolverOpts::default());
    let response = resolver
        .lookup_ip(host)
        .await
        .map_err(|e| Error::execution(format!("DNS resolution failed for {host}: {e}")))?;

    response
        .iter()
        .find(|ip| !is_private_or_reserved(*ip))
        .ok_or_else(|| {
            Error::execution(format!(
                "SSRF protection blocked {host}: every resolved address is private/reserved"
            ))
        })
}

/// Issue the request. The capability check is the caller's
/// responsibility (it needs the plugin's grant, which this function
/// doesn't receive); this only performs the pinned, bounded fetch.
pub async fn send(request: &HttpRequest) -> Result<HttpResponse> {
    let (host, port) = required_capability(&request.url)?;
    let pinned_ip = resolve_pinned(&host).await?;
    let socket_addr = SocketAddr::new(pinned_ip, port);

    let method: reqwest::Method = request
        .method
        .parse()
        .map_err(|_| Error::malformed_payload(format!("invalid HTTP method '{}'", request.method)))?;

    let client = reqwest::Client::builder()
        .user_agent(user_agent())
        .connect_timeout(CONNECT_TIMEOUT)
        .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
        .resolve(&host, socket_addr)
        .build()
        .map_err(|e| Error::execution(format!("building HTTP client: {e}")))?;

    let mut builder = client.request(method, &request.url);
    for (key, value) in &request.headers {
        builder = builder.header(key, value);
    }
    if let Some(body) = &request.body {
        builder = builder.body(body.clone());
    }

    let response = builder
        .send()
        .await
        .map_err(|e| Error::execution(format!("HTTP request failed: {e}")))?;

    let status = response.status().as_u16();
    let headers = response
        .headers()
        .iter()
        .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.to_string(), v.to_string())))
        .collect();

    let full_body = response
        .bytes()
        .await
        .map_err(|e| Error::execution(format!("reading response body: {e}")))?;
    let truncated = full_body.len() > MAX_BODY_BYTES;
    let body = if truncated { &full_body[..MAX_BODY_BYTES] } else { &full_body[..] };

    Ok(HttpResponse {
        status,
        headers,
        body: String::from_utf8_lossy(body).into_owned(),
        truncated,
    })
}

/// Build the capability this request requires, for the caller's gate.
#[must_use]
pub fn capability_for(host_port: &(String, u16)) -> Capability {
    Capability::of(Kind::Network, format!("outbound:{}", host_port.1))
}

/// Whether `grant` authorizes this request's derived capability.
#[must_use]
pub fn is_authorized(grant: &cce_capability::Grant, host_port: &(String, u16)) -> bool {
    is_granted(grant, &capability_for(host_port))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn required_capability_defaults_to_scheme_port() {
        assert_eq!(required_capability("https://example.com/x").unwrap().1, 443);
        assert_eq!(required_capability("http://example.com/x").unwrap().1, 80);
        assert_eq!(required_capability("http://example.com:8080/x").unwrap().1, 8080);
    }

    #[test]
    fn malformed_url_is_rejected() {
        assert!(required_capability("not a url").is_err());
    }
}
