//! Vector store abstraction.
//!
//! The [`VectorStore`] trait covers the three calls the service makes against
//! its collection: make sure it exists, query it, and upsert into it.
//! Backends:
//!
//! - [`PineconeStore`]: the hosted Pinecone REST API (control plane + index host).
//! - [`InMemoryStore`]: brute-force cosine search in process memory, for
//!   development and tests.
//!
//! Implementations must be `Send + Sync` to be shared across request handlers.

pub mod memory;
pub mod pinecone;

use anyhow::Result;
use async_trait::async_trait;

use crate::config::StoreConfig;
use crate::models::{RetrievalMatch, VectorRecord};

pub use memory::InMemoryStore;
pub use pinecone::PineconeStore;

/// Shape of the collection the service reads from and writes to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionSpec {
    pub name: String,
    pub dims: usize,
    pub metric: String,
}

impl CollectionSpec {
    pub fn from_config(config: &StoreConfig) -> Self {
        Self {
            name: config.collection.clone(),
            dims: config.dims,
            metric: config.metric.clone(),
        }
    }
}

#[async_trait]
pub trait VectorStore: Send + Sync {
    /// The collection this store is bound to.
    fn collection(&self) -> &CollectionSpec;

    /// Creates the collection if it does not exist.
    ///
    /// Returns `true` when the collection was created by this call.
    async fn ensure_collection(&self) -> Result<bool>;

    /// Returns up to `top_k` records nearest to `vector`, best first.
    ///
    /// With `include_metadata = false` the matches carry empty metadata and
    /// no text.
    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        include_metadata: bool,
    ) -> Result<Vec<RetrievalMatch>>;

    /// Inserts or overwrites records by id.
    async fn upsert(&self, records: Vec<VectorRecord>) -> Result<()>;
}

/// Builds the store named by `store.provider`.
///
/// Returns `Ok(None)` when the provider needs a credential that is not set;
/// the caller treats that as "no store configured".
pub fn create_store(config: &StoreConfig) -> Result<Option<Box<dyn VectorStore>>> {
    match config.provider.as_str() {
        "memory" => Ok(Some(Box::new(InMemoryStore::new(CollectionSpec::from_config(
            config,
        ))))),
        "pinecone" => match config.api_key() {
            Some(api_key) => Ok(Some(Box::new(PineconeStore::new(config, api_key)?))),
            None => Ok(None),
        },
        other => anyhow::bail!("Unknown store provider: {}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_provider_needs_no_credential() {
        let config = StoreConfig {
            provider: "memory".to_string(),
            ..StoreConfig::default()
        };
        let store = create_store(&config).unwrap().unwrap();
        assert_eq!(store.collection().name, "personal-assistant");
        assert_eq!(store.collection().dims, 384);
    }

    #[test]
    fn pinecone_without_credential_is_absent() {
        let config = StoreConfig {
            api_key_env: "PA_TEST_UNSET_PINECONE_KEY".to_string(),
            ..StoreConfig::default()
        };
        assert!(create_store(&config).unwrap().is_none());
    }
}
