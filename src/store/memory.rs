//! In-memory [`VectorStore`] implementation for development and tests.
//!
//! Records live in a `HashMap` behind `std::sync::RwLock`. Query is
//! brute-force cosine similarity over every stored vector.

use std::collections::HashMap;
use std::sync::RwLock;

use anyhow::{bail, Result};
use async_trait::async_trait;

use super::{CollectionSpec, VectorStore};
use crate::embedding::cosine_similarity;
use crate::models::{Metadata, RetrievalMatch, VectorRecord};

struct StoredRecord {
    values: Vec<f32>,
    metadata: Metadata,
}

pub struct InMemoryStore {
    spec: CollectionSpec,
    records: RwLock<HashMap<String, StoredRecord>>,
}

impl InMemoryStore {
    pub fn new(spec: CollectionSpec) -> Self {
        Self {
            spec,
            records: RwLock::new(HashMap::new()),
        }
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.records.read().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Metadata of the record with `id`, if present.
    pub fn metadata(&self, id: &str) -> Option<Metadata> {
        let records = self.records.read().ok()?;
        records.get(id).map(|r| r.metadata.clone())
    }
}

#[async_trait]
impl VectorStore for InMemoryStore {
    fn collection(&self) -> &CollectionSpec {
        &self.spec
    }

    async fn ensure_collection(&self) -> Result<bool> {
        Ok(false)
    }

    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        include_metadata: bool,
    ) -> Result<Vec<RetrievalMatch>> {
        if vector.len() != self.spec.dims {
            bail!(
                "Query vector has {} dimensions, collection '{}' expects {}",
                vector.len(),
                self.spec.name,
                self.spec.dims
            );
        }

        let records = self
            .records
            .read()
            .map_err(|_| anyhow::anyhow!("in-memory store lock poisoned"))?;

        let mut matches: Vec<RetrievalMatch> = records
            .iter()
            .map(|(id, record)| {
                let score = cosine_similarity(vector, &record.values);
                if include_metadata {
                    RetrievalMatch::from_metadata(id.clone(), score, record.metadata.clone())
                } else {
                    RetrievalMatch::from_metadata(id.clone(), score, Metadata::new())
                }
            })
            .collect();

        matches.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        matches.truncate(top_k);
        Ok(matches)
    }

    async fn upsert(&self, records: Vec<VectorRecord>) -> Result<()> {
        if let Some(bad) = records.iter().find(|r| r.values.len() != self.spec.dims) {
            bail!(
                "Vector dimension {} does not match the dimension of the index {}",
                bad.values.len(),
                self.spec.dims
            );
        }

        let mut stored = self
            .records
            .write()
            .map_err(|_| anyhow::anyhow!("in-memory store lock poisoned"))?;
        for record in records {
            stored.insert(
                record.id,
                StoredRecord {
                    values: record.values,
                    metadata: record.metadata,
                },
            );
        }
        Ok(())
    }
}
