//! A `RegistryClient` that fetches plugin artifacts over HTTP. Bridges
//! the synchronous `RegistryClient::fetch` contract onto an async
//! `reqwest` call the same way the sandbox's mediated host functions
//! bridge their own blocking call sites (`tokio::task::block_in_place`
//! plus the current runtime handle) — the CLI, unlike a plugin host
//! function, has no SSRF surface to guard since the registry URL is
//! operator-configured, not plugin-supplied.

use std::time::Duration;

use cce_plugin::resolver::{RegistryClient, RegistryFetch};
use cce_plugin::{Error, PluginReference, Result};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

fn block_on<F: std::future::Future>(fut: F) -> F::Output {
    tokio::task::block_in_place(|| tokio::runtime::Handle::current().block_on(fut))
}

/// Fetches `<base_url>/<org>/<repo>/<name>-<version>.wasm` as raw
/// bytecode. Registries that also serve a detached signature are out
/// of scope for this client; signed fetches require a registry
/// implementation that understands that registry's own manifest
/// format.
pub struct HttpRegistryClient {
    base_url: String,
    client: reqwest::Client,
}

impl HttpRegistryClient {
    /// Build a client fetching from `base_url`.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { base_url: base_url.into(), client }
    }

    fn artifact_url(&self, reference: &PluginReference) -> String {
        let version = if reference.version.is_empty() { "latest" } else { &reference.version };
        format!(
            "{}/{}/{}/{}-{version}.wasm",
            self.base_url.trim_end_matches('/'),
            reference.org,
            reference.repo,
            reference.name
        )
    }
}

impl RegistryClient for HttpRegistryClient {
    fn fetch(&self, reference: &PluginReference) -> Result<RegistryFetch> {
        let url = self.artifact_url(reference);
        block_on(async {
            let response = self
                .client
                .get(&url)
                .send()
                .await
                .map_err(|e| Error::registry(format!("fetching {url}: {e}")))?;

            if !response.status().is_success() {
                return Err(Error::registry(format!("fetching {url}: HTTP {}", response.status())));
            }

            let bytecode =
                response.bytes().await.map_err(|e| Error::registry(format!("reading {url}: {e}")))?.to_vec();

            Ok(RegistryFetch { reference: reference.clone(), bytecode, signature: None })
        })
    }
}

/// A registry client for when no registry URL is configured. Always
/// reports the reference not-resolvable so the standard chain defers
/// to the local plugin directory instead of failing the whole run.
pub struct NullRegistryClient;

impl RegistryClient for NullRegistryClient {
    fn fetch(&self, reference: &PluginReference) -> Result<RegistryFetch> {
        Err(Error::not_resolvable(reference.name.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn artifact_url_falls_back_to_latest() {
        let client = HttpRegistryClient::new("https://registry.example.com");
        let reference =
            PluginReference { registry: "r".into(), org: "acme".into(), repo: "plugins".into(), name: "file".into(), version: String::new() };
        assert_eq!(client.artifact_url(&reference), "https://registry.example.com/acme/plugins/file-latest.wasm");
    }

    #[test]
    fn artifact_url_uses_pinned_version() {
        let client = HttpRegistryClient::new("https://registry.example.com/");
        let reference = PluginReference {
            registry: "r".into(),
            org: "acme".into(),
            repo: "plugins".into(),
            name: "file".into(),
            version: "1.2.0".into(),
        };
        assert_eq!(client.artifact_url(&reference), "https://registry.example.com/acme/plugins/file-1.2.0.wasm");
    }
}
