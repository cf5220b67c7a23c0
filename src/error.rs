//! Typed error taxonomy.
//!
//! Three error kinds flow through the crate:
//!
//! * [`ProviderError`] — an embedding or generation provider call failed.
//!   Carries the provider name and a human-readable detail; never fatal.
//! * [`StoreError`] — a vector store `append` rejected a whole batch.
//! * [`IngestError`] — an ingestion failed, wrapping the provider/store
//!   errors above or reporting malformed input.

use thiserror::Error;

/// An embedding or generation provider call failed.
#[derive(Debug, Clone, Error)]
#[error("{provider} provider error: {detail}")]
pub struct ProviderError {
    /// Provider identifier (e.g. `"hf"`, `"openai"`, `"disabled"`).
    pub provider: String,
    /// Human-readable failure detail.
    pub detail: String,
}

impl ProviderError {
    /// Construct a provider error from a provider name and a detail message.
    pub fn new(provider: impl Into<String>, detail: impl Into<String>) -> Self {
        ProviderError {
            provider: provider.into(),
            detail: detail.into(),
        }
    }
}

/// A vector store `append` was rejected; the store is left unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The vector and text batches had different lengths.
    #[error("vectors ({vectors}) and texts ({texts}) length mismatch")]
    LengthMismatch { vectors: usize, texts: usize },
    /// A vector did not match the store's dimension.
    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },
}

/// An ingestion failed.
#[derive(Debug, Error)]
pub enum IngestError {
    /// Input could not be parsed or contained no usable text.
    #[error("malformed input: {0}")]
    MalformedInput(String),
    /// An embedding provider call failed.
    #[error(transparent)]
    Provider(#[from] ProviderError),
    /// A vector store append failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}
