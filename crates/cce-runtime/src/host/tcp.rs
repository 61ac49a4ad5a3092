//! `tcp_connect` host function: a raw or TLS-wrapped TCP dial with an
//! optional minimum negotiated TLS version assertion.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_rustls::rustls::pki_types::ServerName;
use tokio_rustls::rustls::{ClientConfig, RootCertStore};
use tokio_rustls::TlsConnector;

use cce_capability::{is_granted, Capability, Kind};

use super::ssrf::is_private_or_reserved;
use crate::error::{Error, Result};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
pub struct TcpConnectRequest {
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub tls: bool,
    #[serde(default)]
    pub min_tls_version: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TcpConnectResponse {
    pub connected: bool,
    pub negotiated_tls_version: Option<String>,
}

/// Capability this connection requires.
#[must_use]
pub fn capability_for(request: &TcpConnectRequest) -> Capability {
    Capability::of(Kind::Network, format!("outbound:{}", request.port))
}

/// Whether `grant` authorizes this connection.
#[must_use]
pub fn is_authorized(grant: &cce_capability::Grant, request: &TcpConnectRequest) -> bool {
    is_granted(grant, &capability_for(request))
}

/// Parse a TLS version label the request may assert as a minimum.
/// Any value outside the known set compares as not meeting whatever
/// minimum was requested, never panicking on an unrecognized string.
fn tls_version_rank(label: &str) -> Option<u8> {
    match label {
        "TLS 1.0" => Some(0),
        "TLS 1.1" => Some(1),
        "TLS 1.2" => Some(2),
        "TLS 1.3" => Some(3),
        _ => None,
    }
}

async fn resolve_one(host: &str) -> Result<std::net::IpAddr> {
    if let Ok(ip) = host.parse::<std::net::IpAddr>() {
        return if is_private_or_reserved(ip) {
            Err(Error::execution(format!("SSRF blocked: {host} is private/reserved")))
        } else {
            Ok(ip)
        };
    }
    let mut addrs = tokio::net::lookup_host((host, 0))
        .await
        .map_err(|e| Error::execution(format!("DNS resolution failed for {host}: {e}")))?;
    addrs
        .find(|a| !is_private_or_reserved(a.ip()))
        .map(|a| a.ip())
        .ok_or_else(|| Error::execution(format!("SSRF blocked: every address for {host} is private/reserved")))
}

pub async fn connect(request: &TcpConnectRequest) -> Result<TcpConnectResponse> {
    if request.host.is_empty() {
        return Err(Error::malformed_payload("host must not be empty"));
    }

    let ip = resolve_one(&request.host).await?;
    let addr = SocketAddr::new(ip, request.port);

    let stream = timeout(CONNECT_TIMEOUT, TcpStream::connect(addr))
        .await
        .map_err(|_| Error::execution(format!("connecting to {addr} timed out")))?
        .map_err(|e| Error::execution(format!("connecting to {addr}: {e}")))?;

    if !request.tls {
        return Ok(TcpConnectResponse {
            connected: true,
            negotiated_tls_version: None,
        });
    }

    let mut roots = RootCertStore::empty();
    roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    let config = ClientConfig::builder()
        .with_root_certificates(roots)
        .with_no_client_auth();
    let connector = TlsConnector::from(Arc::new(config));

    let server_name = ServerName::try_from(request.host.clone())
        .map_err(|e| Error::malformed_payload(format!("invalid TLS server name '{}': {e}", request.host)))?;

    let tls_stream = connector
        .connect(server_name, stream)
        .await
        .map_err(|e| Error::execution(format!("TLS handshake with {} failed: {e}", request.host)))?;

    let (_, session) = tls_stream.get_ref();
    let negotiated = session.protocol_version().map(|v| format!("{v:?}"));

    if let Some(min) = &request.min_tls_version {
        let Some(min_rank) = tls_version_rank(min) else {
            return Err(Error::execution(format!("unrecognized minimum TLS version '{min}'")));
        };
        let negotiated_rank = negotiated
            .as_deref()
            .and_then(tls_version_rank)
            .unwrap_or(0);
        if negotiated_rank < min_rank {
            return Err(Error::execution(format!(
                "negotiated TLS version below required minimum '{min}'"
            )));
        }
    }

    Ok(TcpConnectResponse {
        connected: true,
        negotiated_tls_version: negotiated,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tls_version_rank_orders_known_versions() {
        assert!(tls_version_rank("TLS 1.3").unwrap() > tls_version_rank("TLS 1.0").unwrap());
    }

    #[test]
    fn unknown_tls_version_label_has_no_rank() {
        assert_eq!(tls_version_rank("TLS 9.9"), None);
    }

    #[test]
    fn capability_derived_from_port() {
        let request = TcpConnectRequest {
            host: "example.com".into(),
            port: 8443,
            tls: true,
            min_tls_version: None,
        };
        assert_eq!(capability_for(&request).pattern, "outbound:8443");
    }
}
