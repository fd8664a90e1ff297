//! Knowledge Retriever: read-only similarity search over a pre-chunked
//! policy corpus.
//!
//! The corpus is built once, offline, from a plain-text policy document
//! split into overlapping chunks. Consumers see only the `top_k` contract;
//! the ranking internals are replaceable. The orchestrator never triggers
//! reindexing.

pub mod chunker;
pub mod lexical;

use std::fs;
use std::path::Path;

use thiserror::Error;

pub use chunker::{split_into_chunks, ChunkingParams};
pub use lexical::LexicalRetriever;

#[derive(Debug, Error)]
pub enum CorpusError {
    #[error("could not read corpus file `{path}`: {source}")]
    ReadFile { path: String, source: std::io::Error },
    #[error("corpus document is empty")]
    EmptyDocument,
}

/// Similarity-ranked chunk lookup, best-first. No score threshold is
/// applied: a non-empty corpus always yields up to `k` results.
pub trait Retriever: Send + Sync {
    fn top_k(&self, query: &str, k: usize) -> Vec<String>;
}

/// Builds the default retriever from a policy document on disk.
pub fn build_from_file(
    path: &Path,
    params: ChunkingParams,
) -> Result<LexicalRetriever, CorpusError> {
    let text = fs::read_to_string(path)
        .map_err(|source| CorpusError::ReadFile { path: path.display().to_string(), source })?;
    build_from_text(&text, params)
}

pub fn build_from_text(
    text: &str,
    params: ChunkingParams,
) -> Result<LexicalRetriever, CorpusError> {
    if text.trim().is_empty() {
        return Err(CorpusError::EmptyDocument);
    }

    let chunks = split_into_chunks(text, params);
    tracing::info!(
        event_name = "retrieval.corpus.built",
        chunk_count = chunks.len(),
        "policy corpus chunked and indexed"
    );
    Ok(LexicalRetriever::new(chunks))
}
