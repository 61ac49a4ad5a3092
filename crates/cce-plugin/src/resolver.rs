//! The plugin resolution chain: embedded → cache → registry.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use crate::cache::CacheRepository;
use crate::digest::Digest;
use crate::error::{Error, Result};
use crate::reference::PluginReference;
use crate::signature::{Signature, SignatureVerifier};

/// The outcome of a successful resolution.
#[derive(Debug, Clone)]
pub struct ResolvedPlugin {
    /// The reference actually resolved (may be more specific than
    /// what was requested, e.g. a pinned version).
    pub reference: PluginReference,
    /// The resolved artifact's digest.
    pub digest: Digest,
    /// Raw plugin bytecode.
    pub bytecode: Vec<u8>,
    /// Which resolver served this result (`embedded`, `cache`,
    /// `registry`).
    pub source: &'static str,
}

/// One stage in the resolution chain. Returns `Ok(None)` to delegate
/// to the next resolver, not an error.
pub trait Resolver: Send + Sync {
    /// Attempt to resolve `reference`.
    fn resolve(&self, reference: &PluginReference) -> Result<Option<ResolvedPlugin>>;
}

/// Resolves references against a fixed set of built-in plugins
/// compiled into the binary.
pub struct EmbeddedResolver {
    builtins: HashMap<String, Vec<u8>>,
}

impl EmbeddedResolver {
    /// Build an embedded resolver over `builtins` (plugin name →
    /// bytecode).
    #[must_use]
    pub fn new(builtins: HashMap<String, Vec<u8>>) -> Self {
        Self { builtins }
    }
}

impl Resolver for EmbeddedResolver {
    fn resolve(&self, reference: &PluginReference) -> Result<Option<ResolvedPlugin>> {
        if !reference.is_embedded() {
            return Ok(None);
        }
        let Some(bytecode) = self.builtins.get(&reference.name) else {
            return Ok(None);
        };
        Ok(Some(ResolvedPlugin {
            reference: reference.clone(),
            digest: Digest::sha256_of(bytecode),
            bytecode: bytecode.clone(),
            source: "embedded",
        }))
    }
}

/// Resolves references against a local content-addressed cache.
pub struct CacheResolver {
    repository: Arc<CacheRepository>,
}

impl CacheResolver {
    /// Build a cache resolver over `repository`.
    #[must_use]
    pub fn new(repository: Arc<CacheRepository>) -> Self {
        Self { repository }
    }
}

impl Resolver for CacheResolver {
    fn resolve(&self, reference: &PluginReference) -> Result<Option<ResolvedPlugin>> {
        match self.repository.get(reference)? {
            Some((digest, bytecode)) => Ok(Some(ResolvedPlugin {
                reference: reference.clone(),
                digest,
                bytecode,
                source: "cache",
            })),
            None => Ok(None),
        }
    }
}

/// A fetch performed against a remote registry.
pub struct RegistryFetch {
    /// The reference actually delivered (e.g. a resolved version).
    pub reference: PluginReference,
    /// Fetched bytecode.
    pub bytecode: Vec<u8>,
    /// Detached signature, if the registry provided one.
    pub signature: Option<Signature>,
}

/// A remote plugin registry client. Network transport is intentionally
/// abstracted behind this trait; the resolver only needs a fetch.
pub trait RegistryClient: Send + Sync {
    /// Pull the artifact for `reference`.
    fn fetch(&self, reference: &PluginReference) -> Result<RegistryFetch>;
}

/// Resolves references by pulling from a remote registry, storing the
/// result into the cache, and verifying any signature policy
/// requires.
pub struct RegistryResolver {
    client: Arc<dyn RegistryClient>,
    cache: Arc<CacheRepository>,
    verifier: Arc<dyn SignatureVerifier>,
    require_signed: bool,
}

impl RegistryResolver {
    /// Build a registry resolver. When `require_signed` is set, a
    /// fetch without a signature, or one that fails verification,
    /// errors rather than returning an unsigned artifact.
    #[must_use]
    pub fn new(
        client: Arc<dyn RegistryClient>,
        cache: Arc<CacheRepository>,
        verifier: Arc<dyn SignatureVerifier>,
        require_signed: bool,
    ) -> Self {
        Self {
            client,
            cache,
            verifier,
            require_signed,
        }
    }
}

impl Resolver for RegistryResolver {
    fn resolve(&self, reference: &PluginReference) -> Result<Option<ResolvedPlugin>> {
        if reference.is_embedded() {
            return Ok(None);
        }
        let fetch = self.client.fetch(reference)?;

        if self.require_signed {
            let signature = fetch.signature.as_ref().ok_or_else(|| {
                Error::SignatureInvalid(reference.to_string(), "artifact is unsigned".to_string())
            })?;
            let signer = self.verifier.verify(&fetch.bytecode, signature)?;
            info!(
                signer = %signer.signer,
                timestamp = %signer.timestamp,
                plugin = %fetch.reference,
                "verified plugin signature"
            );
        }

        let digest = Digest::sha256_of(&fetch.bytecode);
        self.cache.put(&fetch.reference, &digest, &fetch.bytecode)?;

        Ok(Some(ResolvedPlugin {
            reference: fetch.reference,
            digest,
            bytecode: fetch.bytecode,
            source: "registry",
        }))
    }
}

/// Runs resolvers in order, stopping at the first hit, and enforces
/// digest integrity when the caller supplies an expected digest (from
/// the lockfile).
pub struct ResolverChain {
    resolvers: Vec<Box<dyn Resolver>>,
}

impl ResolverChain {
    /// Build a chain from resolvers in priority order.
    #[must_use]
    pub fn new(resolvers: Vec<Box<dyn Resolver>>) -> Self {
        Self { resolvers }
    }

    /// The standard embedded → cache → registry chain.
    #[must_use]
    pub fn standard(
        embedded: EmbeddedResolver,
        cache: CacheResolver,
        registry: RegistryResolver,
    ) -> Self {
        Self::new(vec![Box::new(embedded), Box::new(cache), Box::new(registry)])
    }

    /// Resolve `reference`, verifying against `expected_digest` if
    /// supplied.
    pub fn resolve(
        &self,
        reference: &PluginReference,
        expected_digest: Option<&Digest>,
    ) -> Result<ResolvedPlugin> {
        for resolver in &self.resolvers {
            if let Some(resolved) = resolver.resolve(reference)? {
                if let Some(expected) = expected_digest
                    && !expected.is_unknown()
                    && !expected.verify(&resolved.bytecode)
                {
                    return Err(Error::DigestMismatch {
                        name: reference.name.clone(),
                        expected: expected.to_string(),
                        actual: resolved.digest.to_string(),
                    });
                }
                return Ok(resolved);
            }
        }
        Err(Error::not_resolvable(reference.to_string()))
    }
}

/// A stamp of "now" for recording lockfile `fetched_at` timestamps.
#[must_use]
pub fn now() -> chrono::DateTime<Utc> {
    Utc::now()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedRegistry {
        bytecode: Vec<u8>,
    }

    impl RegistryClient for FixedRegistry {
        fn fetch(&self, reference: &PluginReference) -> Result<RegistryFetch> {
            Ok(RegistryFetch {
                reference: reference.clone(),
                bytecode: self.bytecode.clone(),
                signature: None,
            })
        }
    }

    fn reference(s: &str) -> PluginReference {
        PluginReference::parse(s).unwrap()
    }

    #[test]
    fn embedded_hit_short_circuits_chain() {
        let mut builtins = HashMap::new();
        builtins.insert("file".to_string(), b"embedded-bytecode".to_vec());
        let embedded = EmbeddedResolver::new(builtins);
        let dir = tempfile::tempdir().unwrap();
        let cache = Arc::new(CacheRepository::new(dir.path()));
        let registry = RegistryResolver::new(
            Arc::new(FixedRegistry {
                bytecode: b"should-not-be-used".to_vec(),
            }),
            cache.clone(),
            Arc::new(crate::signature::RejectAllVerifier),
            false,
        );
        let chain = ResolverChain::standard(embedded, CacheResolver::new(cache), registry);

        let resolved = chain.resolve(&reference("file"), None).unwrap();
        assert_eq!(resolved.source, "embedded");
        assert_eq!(resolved.bytecode, b"embedded-bytecode");
    }

    #[test]
    fn registry_hit_populates_cache() {
        let embedded = EmbeddedResolver::new(HashMap::new());
        let dir = tempfile::tempdir().unwrap();
        let cache = Arc::new(CacheRepository::new(dir.path()));
        let registry = RegistryResolver::new(
            Arc::new(FixedRegistry {
                bytecode: b"fresh-bytecode".to_vec(),
            }),
            cache.clone(),
            Arc::new(crate::signature::RejectAllVerifier),
            false,
        );
        let chain = ResolverChain::standard(embedded, CacheResolver::new(cache.clone()), registry);

        let reference = reference("acme/org/widgets:1.0.0");
        let resolved = chain.resolve(&reference, None).unwrap();
        assert_eq!(resolved.source, "registry");

        assert!(cache.get(&reference).unwrap().is_some());
    }

    #[test]
    fn digest_mismatch_is_rejected() {
        let mut builtins = HashMap::new();
        builtins.insert("file".to_string(), b"embedded-bytecode".to_vec());
        let embedded = EmbeddedResolver::new(builtins);
        let dir = tempfile::tempdir().unwrap();
        let cache = Arc::new(CacheRepository::new(dir.path()));
        let registry = RegistryResolver::new(
            Arc::new(FixedRegistry { bytecode: vec![] }),
            cache.clone(),
            Arc::new(crate::signature::RejectAllVerifier),
            false,
        );
        let chain = ResolverChain::standard(embedded, CacheResolver::new(cache), registry);

        let wrong = Digest::sha256_of(b"not-the-bytecode");
        let err = chain.resolve(&reference("file"), Some(&wrong)).unwrap_err();
        assert!(matches!(err, Error::DigestMismatch { .. }));
    }

    #[test]
    fn unresolvable_reference_errors() {
        let embedded = EmbeddedResolver::new(HashMap::new());
        let dir = tempfile::tempdir().unwrap();
        let cache = Arc::new(CacheRepository::new(dir.path()));
        let registry = RegistryResolver::new(
            Arc::new(FixedRegistry { bytecode: vec![] }),
            cache.clone(),
            Arc::new(crate::signature::RejectAllVerifier),
            false,
        );
        // `file` is embedded-shaped but registry returns empty bytes
        // successfully, so force a genuine miss with no resolvers at all.
        let empty_chain = ResolverChain::new(vec![]);
        let err = empty_chain.resolve(&reference("file"), None).unwrap_err();
        assert!(matches!(err, Error::NotResolvable(_)));
        let _ = (embedded, registry); // constructed above only to exercise builders
    }
}
