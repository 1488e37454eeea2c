//! Process startup: turn configuration and environment into a [`ChatService`].
//!
//! Nothing here is fatal. Each collaborator that cannot be built is logged
//! and left out, and the service runs with whatever it has:
//!
//! | Missing | Effect |
//! |---------|--------|
//! | completion credential | `/chat` answers 500 |
//! | store credential | no retrieval; `/add_knowledge` answers 500 |
//! | embedder (model load failed) | no retrieval; `/add_knowledge` answers 500 |
//!
//! A store whose index setup fails is kept. Its calls fail until the index
//! becomes reachable, and each failure degrades that one request.

use std::sync::Arc;

use crate::completion::create_completion_client;
use crate::config::Config;
use crate::embedding::{create_embedder, DisabledEmbedder, Embedder};
use crate::service::{ChatService, ChatSettings};
use crate::store::{create_store, VectorStore};

pub async fn build_service(config: &Config) -> ChatService {
    let embedder = init_embedder(config).await;
    let settings = ChatSettings {
        model: config.completion.model.clone(),
        top_k: config.retrieval.top_k,
    };
    let mut service = ChatService::new(embedder, settings);

    match create_completion_client(&config.completion) {
        Ok(Some(client)) => {
            tracing::info!(
                provider = %config.completion.provider,
                model = %config.completion.model,
                "completion client initialized"
            );
            service = service.with_completion(Arc::from(client));
        }
        Ok(None) => tracing::warn!(
            env = %config.completion.api_key_env,
            "Completion API key not set; /chat will be unavailable"
        ),
        Err(err) => tracing::error!(error = %err, "failed to build completion client"),
    }

    if let Some(store) = init_store(config).await {
        service = service.with_store(store);
    }

    service
}

async fn init_embedder(config: &Config) -> Arc<dyn Embedder> {
    let embedding = config.embedding.clone();
    let built = tokio::task::spawn_blocking(move || create_embedder(&embedding)).await;
    match built {
        Ok(Ok(embedder)) => {
            tracing::info!(
                model = %embedder.model_name(),
                dims = embedder.dims(),
                "embedder ready"
            );
            Arc::from(embedder)
        }
        Ok(Err(err)) => {
            tracing::error!(error = %err, "embedder unavailable");
            Arc::new(DisabledEmbedder::new(err.to_string()))
        }
        Err(err) => {
            tracing::error!(error = %err, "embedder initialization panicked");
            Arc::new(DisabledEmbedder::new(err.to_string()))
        }
    }
}

async fn init_store(config: &Config) -> Option<Arc<dyn VectorStore>> {
    let store: Arc<dyn VectorStore> = match create_store(&config.store) {
        Ok(Some(store)) => Arc::from(store),
        Ok(None) => {
            tracing::warn!(
                env = %config.store.api_key_env,
                "Vector store API key not set; retrieval and ingestion disabled"
            );
            return None;
        }
        Err(err) => {
            tracing::error!(error = %err, "failed to build vector store client");
            return None;
        }
    };

    match store.ensure_collection().await {
        Ok(created) => {
            tracing::info!(
                provider = %config.store.provider,
                collection = %store.collection().name,
                created,
                "vector store ready"
            );
        }
        Err(err) => {
            tracing::error!(
                error = %err,
                collection = %store.collection().name,
                "vector store setup failed; requests will retry the index"
            );
        }
    }
    Some(store)
}
