//! # CCE Plugin
//!
//! Plugin reference parsing, content digests, the lockfile, and the
//! embedded → cache → registry resolution chain.

pub mod cache;
pub mod digest;
pub mod error;
pub mod lockfile;
pub mod manifest;
pub mod reference;
pub mod resolver;
pub mod signature;

pub use cache::CacheRepository;
pub use digest::{Algorithm, Digest};
pub use error::{Error, Result};
pub use lockfile::{LockEntry, Lockfile};
pub use manifest::{DeclaredCapability, PluginManifest};
pub use reference::PluginReference;
pub use resolver::{
    CacheResolver, EmbeddedResolver, RegistryClient, RegistryFetch, RegistryResolver,
    ResolvedPlugin, Resolver, ResolverChain,
};
pub use signature::{Ed25519Verifier, RejectAllVerifier, SignatureVerifier, SignerInfo};
