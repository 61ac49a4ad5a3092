//! `smtp_connect` host function: opens a connection, captures the
//! server's greeting banner and the capabilities advertised in
//! response to `EHLO`.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::time::timeout;

use cce_capability::{is_granted, Capability, Kind};

use super::ssrf::is_private_or_reserved;
use crate::error::{Error, Result};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const READ_TIMEOUT: Duration = Duration::from_secs(5);
const EHLO_HOSTNAME: &str = "cce-runtime.local";

#[derive(Debug, Deserialize)]
pub struct SmtpConnectRequest {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Serialize)]
pub struct SmtpConnectResponse {
    pub banner: String,
    pub capabilities: Vec<String>,
}

#[must_use]
pub fn capability_for(request: &SmtpConnectRequest) -> Capability {
    Capability::of(Kind::Network, format!("outbound:{}", request.port))
}

#[must_use]
pub fn is_authorized(grant: &cce_capability::Grant, request: &SmtpConnectRequest) -> bool {
    is_granted(grant, &capability_for(request))
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

/// Read one multi-line SMTP reply (lines are `code-text` until a line
/// with `code text` — no hyphen — terminates it).
async fn read_reply<R: AsyncBufReadExt + Unpin>(reader: &mut R) -> Result<Vec<String>> {
    let mut lines = Vec::new();
    loop {
        let mut line = String::new();
        let bytes_read = timeout(READ_TIMEOUT, reader.read_line(&mut line))
            .await
            .map_err(|_| Error::execution("SMTP server did not respond before the deadline"))?
            .map_err(|e| Error::execution(format!("reading SMTP reply: {e}")))?;
        if bytes_read == 0 {
            return Err(Error::execution("SMTP connection closed unexpectedly"));
        }
        let trimmed = line.trim_end().to_string();
        let is_final = trimmed.as_bytes().get(3) != Some(&b'-');
        lines.push(trimmed);
        if is_final {
            break;
        }
    }
    Ok(lines)
}

pub async fn connect(request: &SmtpConnectRequest) -> Result<SmtpConnectResponse> {
    if request.host.is_empty() {
        return Err(Error::malformed_payload("host must not be empty"));
    }

    let ip = resolve_one(&request.host).await?;
    let addr = std::net::SocketAddr::new(ip, request.port);

    let stream = timeout(CONNECT_TIMEOUT, TcpStream::connect(addr))
        .await
        .map_err(|_| Error::execution(format!("connecting to {addr} timed out")))?
        .map_err(|e| Error::execution(format!("connecting to {addr}: {e}")))?;

    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    let banner_lines = read_reply(&mut reader).await?;
    let banner = banner_lines.join("\n");

    write_half
        .write_all(format!("EHLO {EHLO_HOSTNAME}\r\n").as_bytes())
        .await
        .map_err(|e| Error::execution(format!("sending EHLO: {e}")))?;

    let ehlo_lines = read_reply(&mut reader).await?;
    let capabilities = ehlo_lines
        .iter()
        .filter_map(|l| l.get(4..).map(str::to_string))
        .filter(|s| !s.is_empty())
        .collect();

    Ok(SmtpConnectResponse { banner, capabilities })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capability_derived_from_port() {
        let request = SmtpConnectRequest { host: "mail.example.com".into(), port: 25 };
        assert_eq!(capability_for(&request).pattern, "outbound:25");
    }

    #[tokio::test]
    async fn read_reply_collects_multiline_response() {
        let raw = b"250-FIRST\r\n250 SECOND\r\n".to_vec();
        let mut reader = BufReader::new(&raw[..]);
        let lines = read_reply(&mut reader).await.unwrap();
        assert_eq!(lines, vec!["250-FIRST".to_string(), "250 SECOND".to_string()]);
    }
}
