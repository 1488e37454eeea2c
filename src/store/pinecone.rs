//! Pinecone REST backend.
//!
//! Two endpoints are involved:
//!
//! | Plane | Base | Calls |
//! |-------|------|-------|
//! | control | `store.control_url` | `GET /indexes`, `POST /indexes`, `GET /indexes/{name}` |
//! | data | the index host reported by the control plane | `POST /query`, `POST /vectors/upsert` |
//!
//! The data-plane host is resolved on first use and cached for the lifetime
//! of the store. Every request carries the `Api-Key` header and a pinned
//! `X-Pinecone-API-Version`.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;

use super::{CollectionSpec, VectorStore};
use crate::config::StoreConfig;
use crate::models::{Metadata, RetrievalMatch, VectorRecord};

const API_VERSION: &str = "2024-07";

pub struct PineconeStore {
    client: reqwest::Client,
    api_key: String,
    control_url: String,
    cloud: String,
    region: String,
    spec: CollectionSpec,
    host: OnceCell<String>,
}

impl PineconeStore {
    pub fn new(config: &StoreConfig, api_key: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            control_url: config.control_url.trim_end_matches('/').to_string(),
            cloud: config.cloud.clone(),
            region: config.region.clone(),
            spec: CollectionSpec::from_config(config),
            host: OnceCell::new(),
        })
    }

    fn get(&self, url: String) -> reqwest::RequestBuilder {
        self.client
            .get(url)
            .header("Api-Key", &self.api_key)
            .header("X-Pinecone-API-Version", API_VERSION)
    }

    fn post(&self, url: String) -> reqwest::RequestBuilder {
        self.client
            .post(url)
            .header("Api-Key", &self.api_key)
            .header("X-Pinecone-API-Version", API_VERSION)
    }

    async fn list_index_names(&self) -> Result<Vec<String>> {
        let response = self
            .get(format!("{}/indexes", self.control_url))
            .send()
            .await
            .context("Pinecone list indexes request failed")?;
        let list: IndexList = read_json(response, "list indexes").await?;
        Ok(list.indexes.into_iter().map(|i| i.name).collect())
    }

    async fn create_index(&self) -> Result<()> {
        let body = CreateIndexRequest {
            name: &self.spec.name,
            dimension: self.spec.dims,
            metric: &self.spec.metric,
            spec: IndexSpec {
                serverless: ServerlessSpec {
                    cloud: &self.cloud,
                    region: &self.region,
                },
            },
        };
        let response = self
            .post(format!("{}/indexes", self.control_url))
            .json(&body)
            .send()
            .await
            .context("Pinecone create index request failed")?;
        let _: serde_json::Value = read_json(response, "create index").await?;
        Ok(())
    }

    async fn describe_host(&self) -> Result<String> {
        let response = self
            .get(format!("{}/indexes/{}", self.control_url, self.spec.name))
            .send()
            .await
            .context("Pinecone describe index request failed")?;
        let index: IndexDescription = read_json(response, "describe index").await?;
        match index.host {
            Some(host) if !host.is_empty() => Ok(normalize_host(&host)),
            _ => bail!("Pinecone index '{}' has no host yet", self.spec.name),
        }
    }

    async fn host(&self) -> Result<&str> {
        let host = self.host.get_or_try_init(|| self.describe_host()).await?;
        Ok(host.as_str())
    }
}

#[async_trait]
impl VectorStore for PineconeStore {
    fn collection(&self) -> &CollectionSpec {
        &self.spec
    }

    async fn ensure_collection(&self) -> Result<bool> {
        let names = self.list_index_names().await?;
        if names.iter().any(|n| n == &self.spec.name) {
            return Ok(false);
        }
        tracing::info!(
            index = %self.spec.name,
            dims = self.spec.dims,
            metric = %self.spec.metric,
            "creating Pinecone index"
        );
        self.create_index().await?;
        Ok(true)
    }

    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        include_metadata: bool,
    ) -> Result<Vec<RetrievalMatch>> {
        let host = self.host().await?;
        let body = QueryRequest {
            vector,
            top_k,
            include_metadata,
            include_values: false,
        };
        let response = self
            .post(format!("{}/query", host))
            .json(&body)
            .send()
            .await
            .context("Pinecone query request failed")?;
        let parsed: QueryResponse = read_json(response, "query").await?;
        Ok(parsed
            .matches
            .into_iter()
            .map(|m| RetrievalMatch::from_metadata(m.id, m.score, m.metadata.unwrap_or_default()))
            .collect())
    }

    async fn upsert(&self, records: Vec<VectorRecord>) -> Result<()> {
        let host = self.host().await?;
        let body = UpsertRequest { vectors: &records };
        let response = self
            .post(format!("{}/vectors/upsert", host))
            .json(&body)
            .send()
            .await
            .context("Pinecone upsert request failed")?;
        let parsed: UpsertResponse = read_json(response, "upsert").await?;
        if parsed.upserted_count != records.len() {
            bail!(
                "Pinecone upserted {} of {} vectors",
                parsed.upserted_count,
                records.len()
            );
        }
        Ok(())
    }
}

/// Reads a JSON body, turning non-2xx statuses into errors with the body text.
async fn read_json<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
    op: &str,
) -> Result<T> {
    let status = response.status();
    if !status.is_success() {
        let body_text = response.text().await.unwrap_or_default();
        bail!("Pinecone {} failed ({}): {}", op, status, body_text);
    }
    response
        .json()
        .await
        .with_context(|| format!("Invalid Pinecone {} response", op))
}

/// The control plane reports bare hostnames; local fakes report full URLs.
fn normalize_host(host: &str) -> String {
    let host = host.trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("https://{}", host)
    }
}

// ============ Wire types ============

#[derive(Deserialize)]
struct IndexList {
    #[serde(default)]
    indexes: Vec<IndexDescription>,
}

#[derive(Deserialize)]
struct IndexDescription {
    name: String,
    #[serde(default)]
    host: Option<String>,
}

#[derive(Serialize)]
struct CreateIndexRequest<'a> {
    name: &'a str,
    dimension: usize,
    metric: &'a str,
    spec: IndexSpec<'a>,
}

#[derive(Serialize)]
struct IndexSpec<'a> {
    serverless: ServerlessSpec<'a>,
}

#[derive(Serialize)]
struct ServerlessSpec<'a> {
    cloud: &'a str,
    region: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    vector: &'a [f32],
    top_k: usize,
    include_metadata: bool,
    include_values: bool,
}

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<QueryMatch>,
}

#[derive(Deserialize)]
struct QueryMatch {
    id: String,
    #[serde(default)]
    score: f32,
    #[serde(default)]
    metadata: Option<Metadata>,
}

#[derive(Serialize)]
struct UpsertRequest<'a> {
    vectors: &'a [VectorRecord],
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpsertResponse {
    #[serde(default)]
    upserted_count: usize,
}
