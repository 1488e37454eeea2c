//! Chat orchestration.
//!
//! [`ChatService`] owns one handle per external collaborator and implements
//! the two operations exposed over HTTP:
//!
//! ```text
//! chat:           message ─▶ embed ─▶ query(top_k) ─▶ context
//!                 context ─▶ prompt ─▶ complete ─▶ trim
//! add_knowledge:  text    ─▶ embed ─▶ upsert({id, values, {text, ..metadata}})
//! ```
//!
//! Retrieval and completion are best-effort during chat: their failures come
//! back as [`ChatError::RetrievalDegraded`] / [`ChatError::CompletionDegraded`]
//! and are resolved here by falling back to an empty context or the fixed
//! [`LLM_FALLBACK`] reply. Missing clients are hard errors.

use std::sync::Arc;

use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::completion::{CompletionClient, PromptMessage};
use crate::embedding::Embedder;
use crate::error::{ChatError, ChatResult};
use crate::models::{
    ChatRequest, ChatResponse, KnowledgeItem, KnowledgeRequest, KnowledgeResponse, Metadata,
    RetrievalMatch, VectorRecord,
};
use crate::store::VectorStore;

/// Reply substituted when the completion call fails.
pub const LLM_FALLBACK: &str = "Error connecting to LLM service.";

pub const KNOWLEDGE_ADDED: &str = "Knowledge added successfully";

const COMPLETION_MISSING: &str = "Groq client not initialized";
const STORE_MISSING: &str = "Pinecone not initialized";

/// Tunables that shape a chat call.
#[derive(Debug, Clone)]
pub struct ChatSettings {
    pub model: String,
    pub top_k: usize,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            model: "llama2-70b-4096".to_string(),
            top_k: 3,
        }
    }
}

/// Explicit service context, built once at startup and shared by every handler.
#[derive(Clone)]
pub struct ChatService {
    completion: Option<Arc<dyn CompletionClient>>,
    store: Option<Arc<dyn VectorStore>>,
    embedder: Arc<dyn Embedder>,
    settings: ChatSettings,
}

impl ChatService {
    pub fn new(embedder: Arc<dyn Embedder>, settings: ChatSettings) -> Self {
        Self {
            completion: None,
            store: None,
            embedder,
            settings,
        }
    }

    pub fn with_completion(mut self, completion: Arc<dyn CompletionClient>) -> Self {
        self.completion = Some(completion);
        self
    }

    pub fn with_store(mut self, store: Arc<dyn VectorStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn has_completion(&self) -> bool {
        self.completion.is_some()
    }

    pub fn has_store(&self) -> bool {
        self.store.is_some()
    }

    pub fn settings(&self) -> &ChatSettings {
        &self.settings
    }

    #[tracing::instrument(skip_all, fields(user_id = %request.user_id))]
    pub async fn chat(&self, request: &ChatRequest) -> ChatResult<ChatResponse> {
        let completion = self
            .completion
            .as_ref()
            .ok_or_else(|| ChatError::ServiceUnavailable(COMPLETION_MISSING.to_string()))?;

        let context = match self.retrieve_context(&request.message).await {
            Ok(context) => context,
            Err(err) => {
                tracing::warn!(error = %err, "Error retrieving from vector store");
                String::new()
            }
        };

        let prompt = build_prompt(&context, &request.message);
        let response = match self.generate(completion.as_ref(), &prompt).await {
            Ok(text) => text,
            Err(err) => {
                tracing::warn!(error = %err, "Error calling completion service");
                LLM_FALLBACK.to_string()
            }
        };

        Ok(ChatResponse { response })
    }

    /// Looks up the context for `message`.
    ///
    /// Returns an empty context when no store is configured.
    pub async fn retrieve_context(&self, message: &str) -> ChatResult<String> {
        let Some(store) = self.store.as_ref() else {
            return Ok(String::new());
        };

        let vector = self
            .embedder
            .encode(message)
            .await
            .map_err(|e| ChatError::RetrievalDegraded(e.to_string()))?;
        let matches = store
            .query(&vector, self.settings.top_k, true)
            .await
            .map_err(|e| ChatError::RetrievalDegraded(e.to_string()))?;

        tracing::debug!(matches = matches.len(), "retrieved context");
        join_context(&matches)
    }

    async fn generate(
        &self,
        completion: &dyn CompletionClient,
        prompt: &str,
    ) -> ChatResult<String> {
        let messages = [PromptMessage::user(prompt)];
        completion
            .complete(&messages, &self.settings.model)
            .await
            .map(|text| text.trim().to_string())
            .map_err(|e| ChatError::CompletionDegraded(e.to_string()))
    }

    #[tracing::instrument(skip_all, fields(chars = request.text.len()))]
    pub async fn add_knowledge(&self, request: &KnowledgeRequest) -> ChatResult<KnowledgeResponse> {
        let store = self
            .store
            .as_ref()
            .ok_or_else(|| ChatError::ServiceUnavailable(STORE_MISSING.to_string()))?;

        let item = knowledge_item(request);
        let values = self
            .embedder
            .encode(&item.text)
            .await
            .map_err(|e| ChatError::Store(e.to_string()))?;

        store
            .upsert(vec![VectorRecord {
                id: item.id.clone(),
                values,
                metadata: item.metadata,
            }])
            .await
            .map_err(|e| ChatError::Store(e.to_string()))?;

        tracing::info!(id = %item.id, "knowledge stored");
        Ok(KnowledgeResponse {
            message: KNOWLEDGE_ADDED.to_string(),
        })
    }
}

/// `"Context: {context}\n\nUser: {message}\nAssistant:"`
pub fn build_prompt(context: &str, message: &str) -> String {
    format!("Context: {}\n\nUser: {}\nAssistant:", context, message)
}

/// Joins match texts with `\n`, in rank order.
///
/// A match without a `text` field makes the whole response unusable.
pub fn join_context(matches: &[RetrievalMatch]) -> ChatResult<String> {
    let texts = matches
        .iter()
        .map(|m| {
            m.text.as_deref().ok_or_else(|| {
                ChatError::RetrievalDegraded(format!("match '{}' has no text", m.id))
            })
        })
        .collect::<ChatResult<Vec<_>>>()?;
    Ok(texts.join("\n"))
}

/// Deterministic record id: hex SHA-256 of the UTF-8 text.
///
/// Identical text always maps to the same id, so re-adding it overwrites the
/// previous record.
pub fn knowledge_id(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}

/// Builds `{text, **metadata}`.
///
/// Caller keys are applied last, so a caller-supplied `text` replaces the
/// stored one. The id and the embedding always come from `request.text`.
pub fn knowledge_item(request: &KnowledgeRequest) -> KnowledgeItem {
    let mut metadata = Metadata::new();
    metadata.insert("text".to_string(), Value::String(request.text.clone()));
    metadata.extend(request.metadata.clone());
    KnowledgeItem {
        id: knowledge_id(&request.text),
        text: request.text.clone(),
        metadata,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{CollectionSpec, InMemoryStore};
    use anyhow::Result;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    struct ConstEmbedder;

    #[async_trait]
    impl Embedder for ConstEmbedder {
        fn model_name(&self) -> &str {
            "const"
        }
        fn dims(&self) -> usize {
            2
        }
        async fn encode(&self, _text: &str) -> Result<Vec<f32>> {
            Ok(vec![1.0, 0.0])
        }
    }

    struct BrokenEmbedder;

    #[async_trait]
    impl Embedder for BrokenEmbedder {
        fn model_name(&self) -> &str {
            "broken"
        }
        fn dims(&self) -> usize {
            2
        }
        async fn encode(&self, _text: &str) -> Result<Vec<f32>> {
            anyhow::bail!("model not loaded")
        }
    }

    #[derive(Default)]
    struct RecordingCompletion {
        prompts: Mutex<Vec<(Vec<PromptMessage>, String)>>,
    }

    #[async_trait]
    impl CompletionClient for RecordingCompletion {
        async fn complete(&self, messages: &[PromptMessage], model: &str) -> Result<String> {
            self.prompts
                .lock()
                .unwrap()
                .push((messages.to_vec(), model.to_string()));
            Ok("  the answer\n".to_string())
        }
    }

    struct FailingCompletion;

    #[async_trait]
    impl CompletionClient for FailingCompletion {
        async fn complete(&self, _messages: &[PromptMessage], _model: &str) -> Result<String> {
            anyhow::bail!("connection refused")
        }
    }

    /// Returns a fixed ranked list regardless of the query.
    struct FixedStore {
        spec: CollectionSpec,
        texts: Vec<&'static str>,
    }

    #[async_trait]
    impl VectorStore for FixedStore {
        fn collection(&self) -> &CollectionSpec {
            &self.spec
        }
        async fn ensure_collection(&self) -> Result<bool> {
            Ok(false)
        }
        async fn query(
            &self,
            _vector: &[f32],
            top_k: usize,
            _include_metadata: bool,
        ) -> Result<Vec<RetrievalMatch>> {
            Ok(self
                .texts
                .iter()
                .take(top_k)
                .enumerate()
                .map(|(i, t)| {
                    let meta = json!({ "text": t }).as_object().unwrap().clone();
                    RetrievalMatch::from_metadata(i.to_string(), 1.0 - i as f32 * 0.1, meta)
                })
                .collect())
        }
        async fn upsert(&self, _records: Vec<VectorRecord>) -> Result<()> {
            Ok(())
        }
    }

    struct DownStore {
        spec: CollectionSpec,
    }

    #[async_trait]
    impl VectorStore for DownStore {
        fn collection(&self) -> &CollectionSpec {
            &self.spec
        }
        async fn ensure_collection(&self) -> Result<bool> {
            anyhow::bail!("unreachable")
        }
        async fn query(
            &self,
            _vector: &[f32],
            _top_k: usize,
            _include_metadata: bool,
        ) -> Result<Vec<RetrievalMatch>> {
            anyhow::bail!("store unreachable")
        }
        async fn upsert(&self, _records: Vec<VectorRecord>) -> Result<()> {
            anyhow::bail!("index is read-only")
        }
    }

    fn spec() -> CollectionSpec {
        CollectionSpec {
            name: "test".to_string(),
            dims: 2,
            metric: "cosine".to_string(),
        }
    }

    fn service() -> ChatService {
        ChatService::new(Arc::new(ConstEmbedder), ChatSettings::default())
    }

    fn text_match(text: &str) -> RetrievalMatch {
        let meta = json!({ "text": text }).as_object().unwrap().clone();
        RetrievalMatch::from_metadata("1", 0.5, meta)
    }

    fn last_prompt(completion: &RecordingCompletion) -> String {
        let prompts = completion.prompts.lock().unwrap();
        prompts.last().unwrap().0[0].content.clone()
    }

    #[tokio::test]
    async fn chat_without_completion_is_unavailable() {
        let err = service().chat(&ChatRequest::new("hello")).await.unwrap_err();
        assert!(matches!(err, ChatError::ServiceUnavailable(_)));
    }

    #[tokio::test]
    async fn chat_without_store_uses_empty_context() {
        let completion = Arc::new(RecordingCompletion::default());
        let svc = service().with_completion(completion.clone());

        let resp = svc.chat(&ChatRequest::new("What is up?")).await.unwrap();
        assert_eq!(resp.response, "the answer");
        assert_eq!(
            last_prompt(&completion),
            "Context: \n\nUser: What is up?\nAssistant:"
        );

        let prompts = completion.prompts.lock().unwrap();
        assert_eq!(prompts[0].0.len(), 1);
        assert_eq!(prompts[0].0[0].role, crate::models::Role::User);
        assert_eq!(prompts[0].1, "llama2-70b-4096");
    }

    #[tokio::test]
    async fn chat_joins_three_matches_with_newlines() {
        let completion = Arc::new(RecordingCompletion::default());
        let store = Arc::new(FixedStore {
            spec: spec(),
            texts: vec!["a", "b", "c", "d"],
        });
        let svc = service().with_completion(completion.clone()).with_store(store);

        svc.chat(&ChatRequest::new("q")).await.unwrap();
        assert_eq!(
            last_prompt(&completion),
            "Context: a\nb\nc\n\nUser: q\nAssistant:"
        );
        assert_eq!(svc.retrieve_context("q").await.unwrap(), "a\nb\nc");
    }

    #[tokio::test]
    async fn retrieval_failure_degrades_to_empty_context() {
        let completion = Arc::new(RecordingCompletion::default());
        let svc = service()
            .with_completion(completion.clone())
            .with_store(Arc::new(DownStore { spec: spec() }));

        let resp = svc.chat(&ChatRequest::new("hi")).await.unwrap();
        assert_eq!(resp.response, "the answer");
        assert_eq!(last_prompt(&completion), "Context: \n\nUser: hi\nAssistant:");
    }

    #[tokio::test]
    async fn embedding_failure_degrades_to_empty_context() {
        let completion = Arc::new(RecordingCompletion::default());
        let store = Arc::new(FixedStore {
            spec: spec(),
            texts: vec!["a"],
        });
        let svc = ChatService::new(Arc::new(BrokenEmbedder), ChatSettings::default())
            .with_completion(completion.clone())
            .with_store(store);

        let err = svc.retrieve_context("hi").await.unwrap_err();
        assert!(matches!(err, ChatError::RetrievalDegraded(_)));

        svc.chat(&ChatRequest::new("hi")).await.unwrap();
        assert_eq!(last_prompt(&completion), "Context: \n\nUser: hi\nAssistant:");
    }

    #[tokio::test]
    async fn completion_failure_returns_fallback_text() {
        let svc = service().with_completion(Arc::new(FailingCompletion));
        let resp = svc.chat(&ChatRequest::new("hi")).await.unwrap();
        assert_eq!(resp.response, LLM_FALLBACK);
        assert_eq!(resp.response, "Error connecting to LLM service.");
    }

    #[tokio::test]
    async fn add_knowledge_without_store_is_unavailable() {
        let err = service()
            .add_knowledge(&KnowledgeRequest::new("fact"))
            .await
            .unwrap_err();
        assert!(matches!(err, ChatError::ServiceUnavailable(_)));
    }

    #[tokio::test]
    async fn add_knowledge_upsert_failure_is_store_error() {
        let svc = service().with_store(Arc::new(DownStore { spec: spec() }));
        let err = svc
            .add_knowledge(&KnowledgeRequest::new("fact"))
            .await
            .unwrap_err();
        match err {
            ChatError::Store(msg) => assert!(msg.contains("read-only")),
            other => panic!("expected store error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn add_knowledge_embedding_failure_is_store_error() {
        let svc = ChatService::new(Arc::new(BrokenEmbedder), ChatSettings::default())
            .with_store(Arc::new(InMemoryStore::new(spec())));
        let err = svc
            .add_knowledge(&KnowledgeRequest::new("fact"))
            .await
            .unwrap_err();
        assert!(matches!(err, ChatError::Store(_)));
    }

    #[tokio::test]
    async fn re_adding_text_overwrites_single_record() {
        let store = Arc::new(InMemoryStore::new(spec()));
        let svc = service().with_store(store.clone());

        let mut first = KnowledgeRequest::new("The sky is blue.");
        first.metadata.insert("source".into(), json!("first"));
        let mut second = KnowledgeRequest::new("The sky is blue.");
        second.metadata.insert("source".into(), json!("second"));

        let resp = svc.add_knowledge(&first).await.unwrap();
        assert_eq!(resp.message, KNOWLEDGE_ADDED);
        svc.add_knowledge(&second).await.unwrap();

        assert_eq!(store.len(), 1);
        let meta = store.metadata(&knowledge_id("The sky is blue.")).unwrap();
        assert_eq!(meta["source"], json!("second"));
        assert_eq!(meta["text"], json!("The sky is blue."));
    }

    #[test]
    fn knowledge_id_is_stable_sha256() {
        assert_eq!(
            knowledge_id("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(knowledge_id("x"), knowledge_id("x"));
        assert_ne!(knowledge_id("x"), knowledge_id("y"));
    }

    #[test]
    fn caller_metadata_text_overrides_stored_text() {
        let mut metadata = Metadata::new();
        metadata.insert("text".into(), json!("spoofed"));
        metadata.insert("tag".into(), json!("t"));
        let item = knowledge_item(&KnowledgeRequest {
            text: "real".to_string(),
            metadata,
        });
        assert_eq!(item.metadata["text"], json!("spoofed"));
        assert_eq!(item.metadata["tag"], json!("t"));
        assert_eq!(item.text, "real");
        assert_eq!(item.id, knowledge_id("real"));
    }

    #[test]
    fn join_context_rejects_textless_matches() {
        let matches = vec![
            text_match("a"),
            RetrievalMatch::from_metadata("2", 0.4, Metadata::new()),
            text_match("c"),
        ];
        let err = join_context(&matches).unwrap_err();
        assert!(matches!(err, ChatError::RetrievalDegraded(_)));
        assert_eq!(join_context(&[text_match("a"), text_match("b")]).unwrap(), "a\nb");
        assert_eq!(join_context(&[]).unwrap(), "");
    }

    #[tokio::test]
    async fn textless_match_empties_the_whole_context() {
        struct PartialStore {
            spec: CollectionSpec,
        }

        #[async_trait]
        impl VectorStore for PartialStore {
            fn collection(&self) -> &CollectionSpec {
                &self.spec
            }
            async fn ensure_collection(&self) -> Result<bool> {
                Ok(false)
            }
            async fn query(
                &self,
                _vector: &[f32],
                _top_k: usize,
                _include_metadata: bool,
            ) -> Result<Vec<RetrievalMatch>> {
                Ok(vec![
                    text_match("a"),
                    RetrievalMatch::from_metadata("2", 0.4, Metadata::new()),
                    text_match("c"),
                ])
            }
            async fn upsert(&self, _records: Vec<VectorRecord>) -> Result<()> {
                Ok(())
            }
        }

        let completion = Arc::new(RecordingCompletion::default());
        let svc = service()
            .with_completion(completion.clone())
            .with_store(Arc::new(PartialStore { spec: spec() }));

        let resp = svc.chat(&ChatRequest::new("q")).await.unwrap();
        assert_eq!(resp.response, "the answer");
        assert_eq!(last_prompt(&completion), "Context: \n\nUser: q\nAssistant:");
    }
}
