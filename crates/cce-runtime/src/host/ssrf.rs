//! IP-level checks shared by `http_request` and `tcp_connect`'s
//! DNS-pinning defense: block resolution results that land on private,
//! loopback, link-local, or cloud-metadata addresses.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

/// The well-known cloud metadata endpoint IP, blocked regardless of
/// its `is_private`/`is_link_local` classification (it's link-local,
/// but callers rely on this function naming the reason explicitly).
const CLOUD_METADATA_IP: Ipv4Addr = Ipv4Addr::new(169, 254, 169, 254);

/// Whether `addr` is a private, reserved, or otherwise internal
/// address that outbound plugin traffic must never reach.
#[must_use]
pub fn is_private_or_reserved(addr: IpAddr) -> bool {
    match addr {
        IpAddr::V4(v4) => is_private_ipv4(v4),
        IpAddr::V6(v6) => is_private_ipv6(v6),
    }
}

fn is_private_ipv4(addr: Ipv4Addr) -> bool {
    addr == CLOUD_METADATA_IP
        || addr.is_loopback()
        || addr.is_private()
        || addr.is_link_local()
        || addr.is_broadcast()
        || addr.is_unspecified()
        || is_shared_address(addr)
}

/// 100.64.0.0/10, carrier-grade NAT space.
fn is_shared_address(addr: Ipv4Addr) -> bool {
    let o = addr.octets();
    o[0] == 100 && (o[1] & 0xC0) == 64
}

#[allow(clippy::cast_possible_truncation)]
fn is_private_ipv6(addr: Ipv6Addr) -> bool {
    if addr.is_loopback() || addr.is_unspecified() {
        return true;
    }
    let segments = addr.segments();

    // Link-local fe80::/10
    if segments[0] & 0xFFC0 == 0xFE80 {
        return true;
    }
    // Unique local fc00::/7
    if segments[0] & 0xFE00 == 0xFC00 {
        return true;
    }
    if let Some(v4) = extract_ipv4_mapped(&addr) {
        return is_private_ipv4(v4);
    }
    false
}

/// `::ffff:a.b.c.d` — the canonical SSRF-filter bypass vector.
#[allow(clippy::cast_possible_truncation)]
fn extract_ipv4_mapped(addr: &Ipv6Addr) -> Option<Ipv4Addr> {
    let s = addr.segments();
    if s[0] == 0 && s[1] == 0 && s[2] == 0 && s[3] == 0 && s[4] == 0 && s[5] == 0xFFFF {
        Some(Ipv4Addr::new((s[6] >> 8) as u8, s[6] as u8, (s[7] >> 8) as u8, s[7] as u8))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocks_loopback_and_rfc1918() {
        assert!(is_private_or_reserved(IpAddr::V4(Ipv4Addr::LOCALHOST)));
        assert!(is_private_or_reserved(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1))));
        assert!(is_private_or_reserved(IpAddr::V4(Ipv4Addr::new(192, 168, 1, 1))));
    }

    #[test]
    fn blocks_cloud_metadata() {
        assert!(is_private_or_reserved(IpAddr::V4(CLOUD_METADATA_IP)));
    }

    #[test]
    fn blocks_ipv4_mapped_ipv6_private() {
        let addr: Ipv6Addr = "::ffff:127.0.0.1".parse().unwrap();
        assert!(is_private_or_reserved(IpAddr::V6(addr)));
    }

    #[test]
    fn blocks_ipv6_unique_local() {
        let addr: Ipv6Addr = "fd00::1".parse().unwrap();
        assert!(is_private_or_reserved(IpAddr::V6(addr)));
    }

    #[test]
    fn allows_public_addresses() {
        assert!(!is_private_or_reserved(IpAddr::V4(Ipv4Addr::new(8, 8, 8, 8))));
        let addr: Ipv6Addr = "2001:4860:4860::8888".parse().unwrap();
        assert!(!is_private_or_reserved(IpAddr::V6(addr)));
    }
}
