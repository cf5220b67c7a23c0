//! In-memory vector store.
//!
//! Holds unit-normalized embedding vectors and their source passages as two
//! positionally aligned sequences behind a single `std::sync::RwLock`, so
//! concurrent readers can never observe the index and the passage list at
//! different lengths. Searches take the read lock and run in parallel;
//! `append` and `clear` take the write lock.
//!
//! Vector search is brute-force inner product over all stored vectors —
//! exact, no recall loss. Corpora here are hundreds to low thousands of
//! passages, well inside what a linear scan handles.
//!
//! Because every stored and query vector is unit-normalized, the inner
//! product equals cosine similarity and scores lie in `[-1.0, 1.0]`.

use std::sync::RwLock;

use crate::error::StoreError;

/// An immutable unit of indexed text.
#[derive(Debug, Clone, PartialEq)]
pub struct Passage {
    /// Insertion ordinal, 0-based and dense. Equals the store row index at
    /// insertion time and is never reused or reassigned; the only deletion
    /// is a whole-store [`VectorStore::clear`].
    pub id: usize,
    /// The chunk content. Non-empty.
    pub text: String,
    /// Originating file or column, for diagnostics only.
    pub source: Option<String>,
}

/// A single search hit: the passage plus its inner-product score.
#[derive(Debug, Clone)]
pub struct ScoredPassage {
    pub passage: Passage,
    pub score: f32,
}

struct Inner {
    vectors: Vec<Vec<f32>>,
    passages: Vec<Passage>,
}

/// Append-only store of embedding vectors aligned 1:1 with passages.
pub struct VectorStore {
    dimension: usize,
    inner: RwLock<Inner>,
}

impl VectorStore {
    /// Create an empty store. `dimension` is fixed for the store's lifetime.
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            inner: RwLock::new(Inner {
                vectors: Vec::new(),
                passages: Vec::new(),
            }),
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Append a batch of vectors and their texts, in order.
    ///
    /// Requires `vectors.len() == texts.len()` and every vector of length
    /// [`Self::dimension`]. Unit norm is the caller's responsibility —
    /// providers normalize on receipt; the store only debug-asserts it.
    ///
    /// The append is atomic: all validation happens before the write lock
    /// is taken, so either both sequences grow by the full batch or the
    /// store is unchanged.
    pub fn append(
        &self,
        vectors: Vec<Vec<f32>>,
        texts: Vec<String>,
        source: Option<&str>,
    ) -> Result<(), StoreError> {
        if vectors.len() != texts.len() {
            return Err(StoreError::LengthMismatch {
                vectors: vectors.len(),
                texts: texts.len(),
            });
        }
        for v in &vectors {
            if v.len() != self.dimension {
                return Err(StoreError::DimensionMismatch {
                    expected: self.dimension,
                    got: v.len(),
                });
            }
            debug_assert!(
                (v.iter().map(|x| x * x).sum::<f32>().sqrt() - 1.0).abs() < 1e-3,
                "appended vector is not unit-normalized"
            );
        }

        let mut inner = self.inner.write().unwrap();
        let base = inner.passages.len();
        inner
            .passages
            .extend(texts.into_iter().enumerate().map(|(i, text)| Passage {
                id: base + i,
                text,
                source: source.map(str::to_string),
            }));
        inner.vectors.extend(vectors);
        Ok(())
    }

    /// Exact nearest-neighbor search by inner product.
    ///
    /// Returns the `min(k, size)` best-scoring passages, sorted by score
    /// descending; equal scores are broken by ascending insertion id, so
    /// results are deterministic. An empty store returns an empty result,
    /// never an error.
    pub fn search(&self, query: &[f32], k: usize) -> Vec<ScoredPassage> {
        debug_assert_eq!(query.len(), self.dimension);

        let inner = self.inner.read().unwrap();
        let mut hits: Vec<ScoredPassage> = inner
            .vectors
            .iter()
            .zip(inner.passages.iter())
            .map(|(v, p)| ScoredPassage {
                passage: p.clone(),
                score: inner_product(query, v),
            })
            .collect();

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.passage.id.cmp(&b.passage.id))
        });
        hits.truncate(k);
        hits
    }

    /// Drop all vectors and passages together. Dimension is unchanged.
    pub fn clear(&self) {
        let mut inner = self.inner.write().unwrap();
        inner.vectors.clear();
        inner.passages.clear();
    }

    /// Current passage count.
    pub fn size(&self) -> usize {
        self.inner.read().unwrap().passages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }
}

fn inner_product(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}
