//! Ingestion pipeline orchestration.
//!
//! Coordinates the flow raw text → chunker → embedding provider → vector
//! store. Batches embed as few provider calls as `batch_size` allows, and
//! every ingestion performs exactly one store append at the end — a failed
//! provider call or malformed input leaves the store untouched, and no
//! partially ingested batch is ever observable by concurrent queries.

use std::path::Path;

use crate::chunk::chunk_words;
use crate::config::{ChunkingConfig, EmbeddingConfig};
use crate::embedding::Embedder;
use crate::error::IngestError;
use crate::store::VectorStore;

/// Counters reported back to the caller after a batch ingestion.
#[derive(Debug, Clone, Copy, Default)]
pub struct IngestReport {
    pub documents_processed: usize,
    pub chunks_created: usize,
}

/// Ingest a single raw text: chunk, embed, append. Returns the number of
/// chunks created.
pub async fn ingest_text(
    store: &VectorStore,
    embedder: &dyn Embedder,
    chunking: &ChunkingConfig,
    embedding: &EmbeddingConfig,
    text: &str,
    source: Option<&str>,
) -> Result<usize, IngestError> {
    let rows = [text.to_string()];
    let report = ingest_rows(store, embedder, chunking, embedding, &rows, source).await?;
    Ok(report.chunks_created)
}

/// Ingest a batch of raw texts (e.g. the rows of a CSV column).
///
/// All rows are chunked up front, embedded in `batch_size` slices, and
/// appended to the store in one atomic call.
pub async fn ingest_rows(
    store: &VectorStore,
    embedder: &dyn Embedder,
    chunking: &ChunkingConfig,
    embedding: &EmbeddingConfig,
    rows: &[String],
    source: Option<&str>,
) -> Result<IngestReport, IngestError> {
    let mut chunks: Vec<String> = Vec::new();
    let mut documents_processed = 0;

    for row in rows {
        let row_chunks = chunk_words(row, chunking.max_words, chunking.overlap_words);
        if !row_chunks.is_empty() {
            documents_processed += 1;
            chunks.extend(row_chunks);
        }
    }

    if chunks.is_empty() {
        return Ok(IngestReport::default());
    }

    let mut vectors: Vec<Vec<f32>> = Vec::with_capacity(chunks.len());
    for batch in chunks.chunks(embedding.batch_size.max(1)) {
        vectors.extend(embedder.embed(batch).await?);
    }

    let chunks_created = chunks.len();
    store.append(vectors, chunks, source)?;

    tracing::info!(documents_processed, chunks_created, "ingested batch");
    Ok(IngestReport {
        documents_processed,
        chunks_created,
    })
}

/// Extract the text column from raw CSV bytes.
///
/// The `context` column is used when the header has one; otherwise the
/// first column. Returns the non-empty cell values plus the chosen column
/// name. Unreadable CSV or a header without columns is malformed input and
/// has no side effects.
pub fn extract_csv_column(data: &[u8]) -> Result<(Vec<String>, String), IngestError> {
    let mut reader = csv::Reader::from_reader(data);

    let headers = reader
        .headers()
        .map_err(|e| IngestError::MalformedInput(format!("unreadable CSV header: {}", e)))?
        .clone();

    if headers.is_empty() {
        return Err(IngestError::MalformedInput(
            "CSV has no columns".to_string(),
        ));
    }

    let (column_index, column_name) = headers
        .iter()
        .position(|h| h == "context")
        .map(|i| (i, "context".to_string()))
        .unwrap_or_else(|| (0, headers[0].to_string()));

    let mut texts = Vec::new();
    for record in reader.records() {
        let record =
            record.map_err(|e| IngestError::MalformedInput(format!("unreadable CSV row: {}", e)))?;
        if let Some(cell) = record.get(column_index) {
            let cell = cell.trim();
            if !cell.is_empty() {
                texts.push(cell.to_string());
            }
        }
    }

    if texts.is_empty() {
        return Err(IngestError::MalformedInput(format!(
            "no text found in column '{}'",
            column_name
        )));
    }

    Ok((texts, column_name))
}

/// Load every `*.csv` file in `dir` into the store at startup.
///
/// Per-file failures are logged and skipped; a missing directory loads
/// nothing. Returns the total counters across all files.
pub async fn load_context_dir(
    store: &VectorStore,
    embedder: &dyn Embedder,
    chunking: &ChunkingConfig,
    embedding: &EmbeddingConfig,
    dir: &Path,
) -> IngestReport {
    let mut total = IngestReport::default();

    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!(dir = %dir.display(), error = %e, "context directory not readable");
            return total;
        }
    };

    let mut paths: Vec<_> = entries
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| p.extension().is_some_and(|ext| ext == "csv"))
        .collect();
    paths.sort();

    for path in paths {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let outcome = async {
            let data = std::fs::read(&path)
                .map_err(|e| IngestError::MalformedInput(e.to_string()))?;
            let (texts, column) = extract_csv_column(&data)?;
            tracing::info!(file = %file_name, column = %column, rows = texts.len(), "loading context file");
            ingest_rows(store, embedder, chunking, embedding, &texts, Some(&file_name)).await
        }
        .await;

        match outcome {
            Ok(report) => {
                total.documents_processed += report.documents_processed;
                total.chunks_created += report.chunks_created;
            }
            Err(e) => {
                tracing::warn!(file = %file_name, error = %e, "skipping context file");
            }
        }
    }

    if total.chunks_created > 0 {
        tracing::info!(
            documents = total.documents_processed,
            chunks = total.chunks_created,
            "context directory loaded"
        );
    }

    total
}
