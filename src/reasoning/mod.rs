//! Tenant-scoped memory of reasoning chains.
//!
//! [`ReasoningBank`] embeds the reasoning behind each decision and stores it
//! in a per-tenant vector collection named `<prefix>-<tenantId>`, so later
//! decisions can retrieve the chains behind similar past decisions.
//!
//! The bank never fails outward. A missing capability, an embedding error or
//! a vector-store error is logged and answered with a no-op, `None`, or an
//! empty list.

pub mod memory;

pub use memory::{HashingEmbeddingProvider, InMemoryVectorStore};

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::{ReasoningConfig, RequestConfig};
use crate::error::{EmbeddingError, EmbeddingResult, VectorStoreError, VectorStoreResult};
use crate::lifecycle::{InitState, LazyInit};

/// A generated embedding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Embedding {
    /// The embedding vector.
    pub vector: Vec<f32>,
    /// Provider that produced it.
    pub provider: String,
    /// Vector length.
    pub dimensions: usize,
    /// Generation time.
    pub duration_ms: u64,
}

/// Text embedding capability.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a piece of text.
    async fn generate_embedding(&self, text: &str) -> EmbeddingResult<Embedding>;
}

/// A vector with its identifier and metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorEntry {
    /// Entry identifier, unique within a collection.
    pub id: String,
    /// Embedding vector.
    pub vector: Vec<f32>,
    /// Arbitrary JSON metadata.
    pub metadata: Value,
}

/// Exact-match condition on a metadata field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataFilter {
    /// Metadata field name.
    pub field: String,
    /// Required value.
    pub equals: Value,
}

/// A search against one collection.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorQuery {
    /// Collection to search.
    pub collection: String,
    /// Query vector. `None` means a filter-only lookup.
    pub vector: Option<Vec<f32>>,
    /// Optional metadata filter.
    pub filter: Option<MetadataFilter>,
    /// Maximum hits.
    pub limit: usize,
}

/// One search result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorHit {
    /// Entry identifier.
    pub id: String,
    /// Similarity score (higher is closer).
    pub score: f64,
    /// Entry metadata.
    pub metadata: Value,
}

/// Vector storage capability.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Prepare the store for use.
    async fn initialize(&self) -> VectorStoreResult<()>;

    /// Insert or replace an entry.
    async fn insert(&self, collection: &str, entry: VectorEntry) -> VectorStoreResult<()>;

    /// Nearest neighbours (or filtered entries) in a collection.
    async fn search(&self, query: &VectorQuery) -> VectorStoreResult<Vec<VectorHit>>;
}

/// The external capabilities the bank depends on.
#[derive(Clone)]
pub struct ReasoningCapabilities {
    /// Embedding provider.
    pub embeddings: Arc<dyn EmbeddingProvider>,
    /// Vector store.
    pub store: Arc<dyn VectorStore>,
}

/// Request to remember the reasoning behind a decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreReasoning {
    /// Decision the chain explains.
    pub decision_id: String,
    /// Reasoning chain, as text or structured JSON.
    pub chain: Value,
    /// Owning tenant.
    pub tenant_id: String,
}

/// Metadata stored alongside each chain vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReasoningRecord {
    /// Decision identifier.
    pub decision_id: String,
    /// Chain text.
    pub chain: String,
    /// Owning tenant.
    pub tenant_id: String,
    /// RFC 3339 storage time.
    pub stored_at: String,
}

/// A past reasoning chain similar to a query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimilarReasoning {
    /// Decision identifier.
    pub decision_id: String,
    /// Chain text.
    pub chain: String,
    /// Similarity to the query.
    pub similarity: f64,
    /// When the chain was stored, if recorded.
    pub stored_at: Option<String>,
}

/// Stores and retrieves reasoning chains per tenant.
pub struct ReasoningBank {
    capabilities: Option<ReasoningCapabilities>,
    ready: LazyInit<ReasoningCapabilities>,
    config: ReasoningConfig,
    timeout: Duration,
}

impl ReasoningBank {
    /// Create a bank. With `None` capabilities every call is a no-op.
    pub fn new(
        capabilities: Option<ReasoningCapabilities>,
        config: ReasoningConfig,
        request: &RequestConfig,
    ) -> Self {
        Self {
            capabilities,
            ready: LazyInit::new("reasoning_bank"),
            config,
            timeout: request.timeout(),
        }
    }

    /// Current initialization state.
    pub async fn state(&self) -> InitState {
        self.ready.state().await
    }

    /// Collection holding a tenant's chains.
    pub fn collection_name(&self, tenant_id: &str) -> String {
        format!("{}-{}", self.config.collection_prefix, tenant_id)
    }

    /// Embed and store a reasoning chain. Failures are logged and dropped.
    pub async fn store(&self, request: &StoreReasoning) {
        let Some(caps) = self.capabilities().await else {
            debug!(
                decision_id = %request.decision_id,
                "Reasoning bank unavailable; chain not stored"
            );
            return;
        };

        let chain = chain_text(&request.chain);
        let collection = self.collection_name(&request.tenant_id);

        let embedding = match self.embed(&caps, &chain).await {
            Ok(embedding) => embedding,
            Err(e) => {
                warn!(
                    decision_id = %request.decision_id,
                    tenant_id = %request.tenant_id,
                    error = %e,
                    "Failed to embed reasoning chain"
                );
                return;
            }
        };

        let record = ReasoningRecord {
            decision_id: request.decision_id.clone(),
            chain,
            tenant_id: request.tenant_id.clone(),
            stored_at: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        };
        let metadata = match serde_json::to_value(&record) {
            Ok(metadata) => metadata,
            Err(e) => {
                warn!(
                    decision_id = %request.decision_id,
                    error = %e,
                    "Failed to encode reasoning metadata"
                );
                return;
            }
        };

        let entry = VectorEntry {
            id: request.decision_id.clone(),
            vector: embedding.vector,
            metadata,
        };

        match self
            .vector_call("insert", caps.store.insert(&collection, entry))
            .await
        {
            Ok(()) => debug!(
                decision_id = %request.decision_id,
                collection = %collection,
                "Reasoning chain stored"
            ),
            Err(e) => warn!(
                decision_id = %request.decision_id,
                collection = %collection,
                error = %e,
                "Failed to store reasoning chain"
            ),
        }
    }

    /// Store a chain on a background task.
    pub fn store_detached(self: &Arc<Self>, request: StoreReasoning) -> JoinHandle<()> {
        let bank = Arc::clone(self);
        tokio::spawn(async move { bank.store(&request).await })
    }

    /// The stored chain for a decision, looked up by exact id.
    pub async fn get(&self, tenant_id: &str, decision_id: &str) -> Option<String> {
        let caps = self.capabilities().await?;
        let collection = self.collection_name(tenant_id);

        let query = VectorQuery {
            collection: collection.clone(),
            vector: None,
            filter: Some(MetadataFilter {
                field: "decisionId".to_string(),
                equals: Value::String(decision_id.to_string()),
            }),
            limit: 1,
        };

        match self.vector_call("search", caps.store.search(&query)).await {
            Ok(hits) => hits.into_iter().next().and_then(|hit| {
                hit.metadata
                    .get("chain")
                    .and_then(Value::as_str)
                    .map(str::to_string)
            }),
            Err(e) => {
                warn!(
                    decision_id = %decision_id,
                    collection = %collection,
                    error = %e,
                    "Reasoning lookup failed"
                );
                None
            }
        }
    }

    /// Chains most similar to `query`, closest first.
    ///
    /// `limit` defaults to the configured similarity limit.
    pub async fn find_similar_reasoning(
        &self,
        query: &str,
        tenant_id: &str,
        limit: Option<usize>,
    ) -> Vec<SimilarReasoning> {
        let Some(caps) = self.capabilities().await else {
            return Vec::new();
        };
        let collection = self.collection_name(tenant_id);

        let embedding = match self.embed(&caps, query).await {
            Ok(embedding) => embedding,
            Err(e) => {
                warn!(tenant_id = %tenant_id, error = %e, "Failed to embed similarity query");
                return Vec::new();
            }
        };

        let search = VectorQuery {
            collection: collection.clone(),
            vector: Some(embedding.vector),
            filter: None,
            limit: limit.unwrap_or(self.config.similar_limit),
        };

        match self.vector_call("search", caps.store.search(&search)).await {
            Ok(hits) => hits.into_iter().map(SimilarReasoning::from).collect(),
            Err(e) => {
                warn!(collection = %collection, error = %e, "Similarity search failed");
                Vec::new()
            }
        }
    }

    async fn capabilities(&self) -> Option<ReasoningCapabilities> {
        self.ready.get_or_init(|| self.connect()).await
    }

    async fn connect(&self) -> VectorStoreResult<ReasoningCapabilities> {
        let caps = self
            .capabilities
            .clone()
            .ok_or_else(|| VectorStoreError::Unavailable {
                message: "no embedding provider or vector store configured".to_string(),
            })?;

        self.vector_call("initialize", caps.store.initialize()).await?;
        info!(prefix = %self.config.collection_prefix, "Reasoning bank initialized");
        Ok(caps)
    }

    async fn embed(&self, caps: &ReasoningCapabilities, text: &str) -> EmbeddingResult<Embedding> {
        match tokio::time::timeout(self.timeout, caps.embeddings.generate_embedding(text)).await {
            Ok(result) => result,
            Err(_) => Err(EmbeddingError::Timeout {
                timeout_ms: self.timeout.as_millis() as u64,
            }),
        }
    }

    async fn vector_call<T>(
        &self,
        operation: &str,
        fut: impl Future<Output = VectorStoreResult<T>>,
    ) -> VectorStoreResult<T> {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(VectorStoreError::Timeout {
                operation: operation.to_string(),
                timeout_ms: self.timeout.as_millis() as u64,
            }),
        }
    }
}

impl From<VectorHit> for SimilarReasoning {
    fn from(hit: VectorHit) -> Self {
        let text = |field: &str| {
            hit.metadata
                .get(field)
                .and_then(Value::as_str)
                .map(str::to_string)
        };
        Self {
            decision_id: text("decisionId").unwrap_or_else(|| hit.id.clone()),
            chain: text("chain").unwrap_or_default(),
            similarity: hit.score,
            stored_at: text("storedAt"),
        }
    }
}

/// Canonical text form of a chain: strings verbatim, anything else as
/// compact JSON with sorted keys.
fn chain_text(chain: &Value) -> String {
    match chain {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn embedding(vector: Vec<f32>) -> Embedding {
        Embedding {
            dimensions: vector.len(),
            vector,
            provider: "mock".to_string(),
            duration_ms: 1,
        }
    }

    fn bank(embeddings: MockEmbeddingProvider, store: MockVectorStore) -> ReasoningBank {
        ReasoningBank::new(
            Some(ReasoningCapabilities {
                embeddings: Arc::new(embeddings),
                store: Arc::new(store),
            }),
            ReasoningConfig::default(),
            &RequestConfig::default(),
        )
    }

    fn ready_store() -> MockVectorStore {
        let mut store = MockVectorStore::new();
        store.expect_initialize().times(1).returning(|| Ok(()));
        store
    }

    #[test]
    fn test_chain_text() {
        assert_eq!(chain_text(&json!("step one")), "step one");
        assert_eq!(chain_text(&json!({"b": 1, "a": [2]})), r#"{"a":[2],"b":1}"#);
    }

    #[tokio::test]
    async fn test_collection_name_is_tenant_scoped() {
        let bank = ReasoningBank::new(None, ReasoningConfig::default(), &RequestConfig::default());
        assert_eq!(bank.collection_name("acme"), "reasoning-chains-acme");
    }

    #[tokio::test]
    async fn test_store_inserts_embedded_chain() {
        let mut embeddings = MockEmbeddingProvider::new();
        embeddings
            .expect_generate_embedding()
            .times(1)
            .returning(|_| Ok(embedding(vec![0.6, 0.8])));

        let mut store = ready_store();
        store
            .expect_insert()
            .times(1)
            .withf(|collection, entry| {
                collection == "reasoning-chains-t1"
                    && entry.id == "d-1"
                    && entry.vector == vec![0.6, 0.8]
                    && entry.metadata["decisionId"] == "d-1"
                    && entry.metadata["tenantId"] == "t1"
                    && entry.metadata["chain"] == r#"{"steps":["a","b"]}"#
                    && entry.metadata["storedAt"].is_string()
            })
            .returning(|_, _| Ok(()));

        let bank = bank(embeddings, store);
        bank.store(&StoreReasoning {
            decision_id: "d-1".to_string(),
            chain: json!({"steps": ["a", "b"]}),
            tenant_id: "t1".to_string(),
        })
        .await;
        assert_eq!(bank.state().await, InitState::Ready);
    }

    #[tokio::test]
    async fn test_store_swallows_embedding_failure() {
        let mut embeddings = MockEmbeddingProvider::new();
        embeddings.expect_generate_embedding().returning(|_| {
            Err(EmbeddingError::Failed {
                message: "model offline".to_string(),
            })
        });
        let mut store = ready_store();
        store.expect_insert().times(0);

        bank(embeddings, store)
            .store(&StoreReasoning {
                decision_id: "d-1".to_string(),
                chain: json!("because"),
                tenant_id: "t1".to_string(),
            })
            .await;
    }

    #[tokio::test]
    async fn test_store_detached_swallows_insert_failure() {
        let mut embeddings = MockEmbeddingProvider::new();
        embeddings
            .expect_generate_embedding()
            .returning(|_| Ok(embedding(vec![1.0])));
        let mut store = ready_store();
        store.expect_insert().returning(|collection, _| {
            Err(VectorStoreError::Insert {
                collection: collection.to_string(),
                message: "full".to_string(),
            })
        });

        let bank = Arc::new(bank(embeddings, store));
        let handle = bank.store_detached(StoreReasoning {
            decision_id: "d-1".to_string(),
            chain: json!("because"),
            tenant_id: "t1".to_string(),
        });
        assert!(handle.await.is_ok());
    }

    #[tokio::test]
    async fn test_get_uses_exact_filter() {
        let embeddings = MockEmbeddingProvider::new();
        let mut store = ready_store();
        store
            .expect_search()
            .times(1)
            .withf(|query| {
                query.collection == "reasoning-chains-t1"
                    && query.vector.is_none()
                    && query.limit == 1
                    && query.filter
                        == Some(MetadataFilter {
                            field: "decisionId".to_string(),
                            equals: json!("d-7"),
                        })
            })
            .returning(|_| {
                Ok(vec![VectorHit {
                    id: "d-7".to_string(),
                    score: 1.0,
                    metadata: json!({"decisionId": "d-7", "chain": "rule matched"}),
                }])
            });

        let bank = bank(embeddings, store);
        assert_eq!(bank.get("t1", "d-7").await, Some("rule matched".to_string()));
    }

    #[tokio::test]
    async fn test_get_miss_and_error_return_none() {
        let mut store = ready_store();
        let mut calls = 0;
        store.expect_search().times(2).returning(move |_| {
            calls += 1;
            if calls == 1 {
                Ok(Vec::new())
            } else {
                Err(VectorStoreError::Search {
                    message: "index corrupt".to_string(),
                })
            }
        });

        let bank = bank(MockEmbeddingProvider::new(), store);
        assert!(bank.get("t1", "missing").await.is_none());
        assert!(bank.get("t1", "missing").await.is_none());
    }

    #[tokio::test]
    async fn test_find_similar_maps_hits_and_falls_back_to_hit_id() {
        let mut embeddings = MockEmbeddingProvider::new();
        embeddings
            .expect_generate_embedding()
            .returning(|_| Ok(embedding(vec![1.0, 0.0])));
        let mut store = ready_store();
        store
            .expect_search()
            .withf(|query| query.limit == 5 && query.vector.is_some())
            .returning(|_| {
                Ok(vec![
                    VectorHit {
                        id: "d-1".to_string(),
                        score: 0.93,
                        metadata: json!({
                            "decisionId": "d-1",
                            "chain": "matched vendor",
                            "storedAt": "2026-01-01T00:00:00.000Z"
                        }),
                    },
                    VectorHit {
                        id: "raw-id".to_string(),
                        score: 0.41,
                        metadata: json!({"chain": "legacy"}),
                    },
                ])
            });

        let bank = bank(embeddings, store);
        let similar = bank.find_similar_reasoning("vendor lookup", "t1", None).await;
        assert_eq!(similar.len(), 2);
        assert_eq!(similar[0].decision_id, "d-1");
        assert_eq!(similar[0].similarity, 0.93);
        assert_eq!(similar[0].stored_at.as_deref(), Some("2026-01-01T00:00:00.000Z"));
        assert_eq!(similar[1].decision_id, "raw-id");
        assert!(similar[1].stored_at.is_none());
    }

    #[tokio::test]
    async fn test_find_similar_returns_empty_on_failure() {
        let mut embeddings = MockEmbeddingProvider::new();
        embeddings.expect_generate_embedding().returning(|_| {
            Err(EmbeddingError::Unavailable {
                message: "down".to_string(),
            })
        });
        let mut store = ready_store();
        store.expect_search().times(0);

        let bank = bank(embeddings, store);
        assert!(bank.find_similar_reasoning("q", "t1", Some(3)).await.is_empty());
    }

    #[tokio::test]
    async fn test_without_capabilities_everything_degrades() {
        let bank = ReasoningBank::new(None, ReasoningConfig::default(), &RequestConfig::default());
        bank.store(&StoreReasoning {
            decision_id: "d-1".to_string(),
            chain: json!("x"),
            tenant_id: "t1".to_string(),
        })
        .await;
        assert!(bank.get("t1", "d-1").await.is_none());
        assert!(bank.find_similar_reasoning("x", "t1", None).await.is_empty());
        assert_eq!(bank.state().await, InitState::Failed);
    }

    #[tokio::test]
    async fn test_failed_initialization_is_not_retried() {
        let mut store = MockVectorStore::new();
        store.expect_initialize().times(1).returning(|| {
            Err(VectorStoreError::Unavailable {
                message: "refused".to_string(),
            })
        });
        store.expect_search().times(0);

        let bank = bank(MockEmbeddingProvider::new(), store);
        assert!(bank.get("t1", "d-1").await.is_none());
        assert!(bank.get("t1", "d-1").await.is_none());
        assert_eq!(bank.state().await, InitState::Failed);
    }
}
