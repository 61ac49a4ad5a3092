//! `dns_lookup` host function: resolves a hostname using the system
//! resolver or an explicit nameserver, returning the requested record
//! types.

use std::net::SocketAddr;
use std::time::Duration;

use hickory_resolver::config::{NameServerConfigGroup, ResolverConfig, ResolverOpts};
use hickory_resolver::proto::rr::{RData, RecordType};
use hickory_resolver::TokioAsyncResolver;
use serde::{Deserialize, Serialize};

use cce_capability::{is_granted, Capability, Kind};

use crate::error::{Error, Result};

const DNS_CAPABILITY_PATTERN: &str = "outbound:53";
const CUSTOM_NAMESERVER_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Deserialize)]
pub struct DnsLookupRequest {
    pub hostname: String,
    #[serde(default)]
    pub record_types: Vec<String>,
    #[serde(default)]
    pub nameserver: Option<String>,
}

#[derive(Debug, Serialize, Default)]
pub struct DnsLookupResponse {
    pub records: Vec<DnsRecord>,
}

#[derive(Debug, Serialize)]
pub struct DnsRecord {
    #[serde(rename = "type")]
    pub record_type: String,
    pub value: String,
}

/// Does the grant authorize DNS resolution at all.
#[must_use]
pub fn capability_granted(grant: &cce_capability::Grant) -> bool {
    is_granted(grant, &Capability::of(Kind::Network, DNS_CAPABILITY_PATTERN))
}

fn build_resolver(nameserver: Option<&str>) -> Result<TokioAsyncResolver> {
    match nameserver {
        None => Ok(TokioAsyncResolver::tokio(
            ResolverConfig::default(),
            ResolverOpts::default(),
        )),
        Some(ns) => {
            let addr: SocketAddr = format!("{ns}:53")
                .parse()
                .map_err(|e| Error::malformed_payload(format!("invalid nameserver '{ns}': {e}")))?;
            let group = NameServerConfigGroup::from_ips_clear(&[addr.ip()], addr.port(), true);
            let config = ResolverConfig::from_parts(None, vec![], group);
            let mut opts = ResolverOpts::default();
            opts.timeout = CUSTOM_NAMESERVER_TIMEOUT;
            Ok(TokioAsyncResolver::tokio(config, opts))
        }
    }
}

fn record_type_of(s: &str) -> Option<RecordType> {
    match s.to_ascii_uppercase().as_str() {
        "A" => Some(RecordType::A),
        "AAAA" => Some(RecordType::AAAA),
        "CNAME" => Some(RecordType::CNAME),
        "TXT" => Some(RecordType::TXT),
        "NS" => Some(RecordType::NS),
        "MX" => Some(RecordType::MX),
        _ => None,
    }
}

fn rdata_to_record(rtype: &str, rdata: &RData) -> Option<DnsRecord> {
    let value = match rdata {
        RData::A(ip) => ip.0.to_string(),
        RData::AAAA(ip) => ip.0.to_string(),
        RData::CNAME(name) => name.to_string(),
        RData::TXT(txt) => txt
            .txt_data()
            .iter()
            .map(|b| String::from_utf8_lossy(b).into_owned())
            .collect::<Vec<_>>()
            .join(""),
        RData::NS(name) => name.to_string(),
        RData::MX(mx) => format!("{} {}", mx.preference(), mx.exchange()),
        _ => return None,
    };
    Some(DnsRecord {
        record_type: rtype.to_string(),
        value,
    })
}

/// Perform the resolution. Never panics: malformed input, unresolvable
/// names, and resolver failures are reported back as errors, not
/// propagated as traps.
pub async fn lookup(request: &DnsLookupRequest) -> Result<DnsLookupResponse> {
    if request.hostname.is_empty() {
        return Err(Error::malformed_payload("hostname must not be empty"));
    }

    let wanted: Vec<RecordType> = if request.record_types.is_empty() {
        vec![RecordType::A, RecordType::AAAA]
    } else {
        request
            .record_types
            .iter()
            .filter_map(|s| record_type_of(s))
            .collect()
    };

    let resolver = build_resolver(request.nameserver.as_deref())?;
    let mut records = Vec::new();

    for rtype in wanted {
        let Ok(lookup) = resolver.lookup(request.hostname.as_str(), rtype).await else {
            continue;
        };
        for rdata in lookup.record_iter().filter_map(|r| r.data()) {
            if let Some(record) = rdata_to_record(&rtype.to_string(), rdata) {
                records.push(record);
            }
        }
    }

    Ok(DnsLookupResponse { records })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_type_parsing_is_case_insensitive() {
        assert_eq!(record_type_of("a"), Some(RecordType::A));
        assert_eq!(record_type_of("MX"), Some(RecordType::MX));
        assert_eq!(record_type_of("bogus"), None);
    }

    #[tokio::test]
    async fn empty_hostname_is_config_error() {
        let request = DnsLookupRequest {
            hostname: String::new(),
            record_types: vec![],
            nameserver: None,
        };
        assert!(lookup(&request).await.is_err());
    }
}
