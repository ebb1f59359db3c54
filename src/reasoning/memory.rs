//! In-process backends for the reasoning bank.

use std::collections::HashMap;
use std::time::Instant;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use super::{Embedding, EmbeddingProvider, VectorEntry, VectorHit, VectorQuery, VectorStore};
use crate::error::{EmbeddingError, EmbeddingResult, VectorStoreError, VectorStoreResult};

/// Default embedding width.
pub const DEFAULT_DIMENSIONS: usize = 128;

/// Deterministic bag-of-words embedder.
///
/// Each distinct lowercase alphanumeric term is hashed into one of
/// `dimensions` buckets weighted by its count, then the vector is
/// L2-normalized. Texts sharing vocabulary land close together, which is
/// enough for local runs and tests.
#[derive(Debug, Clone)]
pub struct HashingEmbeddingProvider {
    dimensions: usize,
}

impl HashingEmbeddingProvider {
    /// Create an embedder producing vectors of the given width.
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }

    /// Vector width.
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn embed(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];

        let lowered = text.to_lowercase();
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for term in lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            *counts.entry(term).or_insert(0) += 1;
        }

        for (term, count) in counts {
            vector[djb2(term) % self.dimensions] += count as f32;
        }

        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        vector
    }
}

impl Default for HashingEmbeddingProvider {
    fn default() -> Self {
        Self::new(DEFAULT_DIMENSIONS)
    }
}

fn djb2(s: &str) -> usize {
    s.bytes()
        .fold(5381usize, |hash, b| hash.wrapping_mul(33).wrapping_add(b as usize))
}

#[async_trait]
impl EmbeddingProvider for HashingEmbeddingProvider {
    async fn generate_embedding(&self, text: &str) -> EmbeddingResult<Embedding> {
        if self.dimensions == 0 {
            return Err(EmbeddingError::Failed {
                message: "embedding dimensions must be positive".to_string(),
            });
        }

        let start = Instant::now();
        let vector = self.embed(text);
        Ok(Embedding {
            vector,
            provider: "hashing".to_string(),
            dimensions: self.dimensions,
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }
}

/// Vector store held in process memory, one entry list per collection.
#[derive(Default)]
pub struct InMemoryVectorStore {
    collections: RwLock<HashMap<String, Vec<VectorEntry>>>,
}

impl InMemoryVectorStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries in a collection.
    pub async fn len(&self, collection: &str) -> usize {
        self.collections
            .read()
            .await
            .get(collection)
            .map_or(0, Vec::len)
    }

    /// Whether a collection is empty or absent.
    pub async fn is_empty(&self, collection: &str) -> bool {
        self.len(collection).await == 0
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn initialize(&self) -> VectorStoreResult<()> {
        Ok(())
    }

    async fn insert(&self, collection: &str, entry: VectorEntry) -> VectorStoreResult<()> {
        let mut collections = self.collections.write().await;
        let entries = collections.entry(collection.to_string()).or_default();

        if let Some(first) = entries.first() {
            if first.vector.len() != entry.vector.len() {
                return Err(VectorStoreError::Insert {
                    collection: collection.to_string(),
                    message: format!(
                        "dimension mismatch: collection has {}, entry has {}",
                        first.vector.len(),
                        entry.vector.len()
                    ),
                });
            }
        }

        match entries.iter_mut().find(|e| e.id == entry.id) {
            Some(existing) => *existing = entry,
            None => entries.push(entry),
        }
        debug!(collection = %collection, size = entries.len(), "Vector inserted");
        Ok(())
    }

    async fn search(&self, query: &VectorQuery) -> VectorStoreResult<Vec<VectorHit>> {
        let collections = self.collections.read().await;
        let Some(entries) = collections.get(&query.collection) else {
            return Ok(Vec::new());
        };

        let matching = entries.iter().filter(|entry| match &query.filter {
            Some(filter) => entry.metadata.get(&filter.field) == Some(&filter.equals),
            None => true,
        });

        let mut hits = Vec::new();
        for entry in matching {
            let score = match &query.vector {
                Some(vector) => {
                    if vector.len() != entry.vector.len() {
                        return Err(VectorStoreError::Search {
                            message: format!(
                                "query has {} dimensions, collection {} has {}",
                                vector.len(),
                                query.collection,
                                entry.vector.len()
                            ),
                        });
                    }
                    cosine_similarity(vector, &entry.vector)
                }
                None => 1.0,
            };
            hits.push(VectorHit {
                id: entry.id.clone(),
                score,
                metadata: entry.metadata.clone(),
            });
        }

        // Stable sort keeps insertion order for filter-only lookups.
        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(query.limit);
        Ok(hits)
    }
}

/// Cosine similarity; zero when either vector has no magnitude.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (f64::from(*x), f64::from(*y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}
