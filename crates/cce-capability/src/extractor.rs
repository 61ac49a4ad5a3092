//! Extractor registry: maps a plugin's observation config to the
//! capability set that executing it will require.

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use serde_json::Value;

use crate::capability::{Capability, Kind};
use crate::grant::Grant;

/// Produces the capabilities an observation's config implies for a
/// given plugin. Implementations must be pure and panic-free.
pub trait Extractor: Send + Sync {
    /// Extract the capability set implied by `config`.
    fn extract(&self, config: &HashMap<String, Value>) -> Grant;
}

fn string_field<'a>(config: &'a HashMap<String, Value>, key: &str) -> Option<&'a str> {
    config.get(key).and_then(Value::as_str)
}

/// `file`: if config has string `path`, emit `fs:read:<path>`.
pub struct FileExtractor;

impl Extractor for FileExtractor {
    fn extract(&self, config: &HashMap<String, Value>) -> Grant {
        let mut grant = Grant::new();
        if let Some(path) = string_field(config, "path") {
            grant.insert(Capability::of(Kind::Fs, format!("read:{path}")));
        }
        grant
    }
}

/// `command`: if config has string `command`, emit `exec:<command>`;
/// if `run` (a shell string), emit `exec:/bin/sh`.
pub struct CommandExtractor;

impl Extractor for CommandExtractor {
    fn extract(&self, config: &HashMap<String, Value>) -> Grant {
        let mut grant = Grant::new();
        if let Some(command) = string_field(config, "command") {
            grant.insert(Capability::of(Kind::Exec, command));
        }
        if string_field(config, "run").is_some() {
            grant.insert(Capability::of(Kind::Exec, "/bin/sh"));
        }
        grant
    }
}

/// `http`: emit `network:outbound:<url>` when `url` present.
pub struct HttpExtractor;

impl Extractor for HttpExtractor {
    fn extract(&self, config: &HashMap<String, Value>) -> Grant {
        let mut grant = Grant::new();
        if let Some(url) = string_field(config, "url") {
            grant.insert(Capability::of(Kind::Network, format!("outbound:{url}")));
        }
        grant
    }
}

/// `tcp`: emit `network:outbound:<host>` when `host` present.
pub struct TcpExtractor;

impl Extractor for TcpExtractor {
    fn extract(&self, config: &HashMap<String, Value>) -> Grant {
        let mut grant = Grant::new();
        if let Some(host) = string_field(config, "host") {
            grant.insert(Capability::of(Kind::Network, format!("outbound:{host}")));
        }
        grant
    }
}

/// `dns`: emit `network:outbound:<host>` (or `outbound:53`) when
/// `host` is present.
pub struct DnsExtractor;

impl Extractor for DnsExtractor {
    fn extract(&self, config: &HashMap<String, Value>) -> Grant {
        let mut grant = Grant::new();
        if let Some(host) = string_field(config, "host") {
            grant.insert(Capability::of(Kind::Network, format!("outbound:{host}")));
        }
        grant.insert(Capability::of(Kind::Network, "outbound:53"));
        grant
    }
}

/// Concurrent-safe, read-mostly registry mapping plugin name to its
/// `Extractor`. Cloning is cheap; internal state is shared.
#[derive(Clone, Default)]
pub struct ExtractorRegistry {
    extractors: Arc<DashMap<String, Arc<dyn Extractor>>>,
}

impl ExtractorRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry preloaded with the builtin extractors.
    #[must_use]
    pub fn with_builtins() -> Self {
        let registry = Self::new();
        registry.register("file", Arc::new(FileExtractor));
        registry.register("command", Arc::new(CommandExtractor));
        registry.register("http", Arc::new(HttpExtractor));
        registry.register("tcp", Arc::new(TcpExtractor));
        registry.register("dns", Arc::new(DnsExtractor));
        registry
    }

    /// Register (or replace) the extractor for `plugin_name`.
    pub fn register(&self, plugin_name: impl Into<String>, extractor: Arc<dyn Extractor>) {
        self.extractors.insert(plugin_name.into(), extractor);
    }

    /// Extract the capability set for a plugin's observation config.
    /// Plugins without a registered extractor imply no capabilities.
    #[must_use]
    pub fn extract(&self, plugin_name: &str, config: &HashMap<String, Value>) -> Grant {
        match self.extractors.get(plugin_name) {
            Some(extractor) => extractor.extract(config),
            None => Grant::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg(pairs: &[(&str, Value)]) -> HashMap<String, Value> {
        pairs.iter().map(|(k, v)| ((*k).to_string(), v.clone())).collect()
    }

    #[test]
    fn file_extractor_emits_read_capability() {
        let registry = ExtractorRegistry::with_builtins();
        let grant = registry.extract("file", &cfg(&[("path", Value::String("/tmp/a".into()))]));
        assert_eq!(grant.len(), 1);
        assert!(grant.contains(&Capability::of(Kind::Fs, "read:/tmp/a")));
    }

    #[test]
    fn command_extractor_covers_both_fields() {
        let registry = ExtractorRegistry::with_builtins();
        let grant = registry.extract(
            "command",
            &cfg(&[
                ("command", Value::String("rg".into())),
                ("run", Value::String("echo hi".into())),
            ]),
        );
        assert!(grant.contains(&Capability::of(Kind::Exec, "rg")));
        assert!(grant.contains(&Capability::of(Kind::Exec, "/bin/sh")));
    }

    #[test]
    fn dns_extractor_always_emits_port_53() {
        let registry = ExtractorRegistry::with_builtins();
        let grant = registry.extract("dns", &cfg(&[]));
        assert!(grant.contains(&Capability::of(Kind::Network, "outbound:53")));
    }

    #[test]
    fn unknown_plugin_implies_nothing() {
        let registry = ExtractorRegistry::with_builtins();
        let grant = registry.extract("unknown", &cfg(&[]));
        assert!(grant.is_empty());
    }

    #[test]
    fn dedup_by_capability_equality() {
        let registry = ExtractorRegistry::new();
        registry.register("dns", Arc::new(DnsExtractor));
        let grant = registry.extract("dns", &cfg(&[("host", Value::String("53".into()))]));
        assert_eq!(grant.len(), 1);
    }
}
