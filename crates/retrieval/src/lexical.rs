//! Lexical ranking over the chunked corpus.
//!
//! Chunks and queries are reduced to lowercase token frequency vectors and
//! compared by cosine similarity. Ties break toward earlier chunks so
//! ranking is deterministic.

use std::collections::HashMap;

use crate::Retriever;

pub struct LexicalRetriever {
    chunks: Vec<IndexedChunk>,
}

struct IndexedChunk {
    text: String,
    terms: HashMap<String, f64>,
    norm: f64,
}

impl LexicalRetriever {
    pub fn new(chunks: Vec<String>) -> Self {
        let chunks = chunks
            .into_iter()
            .map(|text| {
                let terms = term_frequencies(&text);
                let norm = vector_norm(&terms);
                IndexedChunk { text, terms, norm }
            })
            .collect();
        Self { chunks }
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

impl Retriever for LexicalRetriever {
    fn top_k(&self, query: &str, k: usize) -> Vec<String> {
        if k == 0 || self.chunks.is_empty() {
            return Vec::new();
        }

        let query_terms = term_frequencies(query);
        let query_norm = vector_norm(&query_terms);

        let mut scored: Vec<(usize, f64)> = self
            .chunks
            .iter()
            .enumerate()
            .map(|(index, chunk)| (index, cosine(&query_terms, query_norm, chunk)))
            .collect();

        // Best-first, index as the deterministic tiebreak.
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal)
            .then(a.0.cmp(&b.0)));

        scored.into_iter().take(k).map(|(index, _)| self.chunks[index].text.clone()).collect()
    }
}

fn term_frequencies(text: &str) -> HashMap<String, f64> {
    let mut terms: HashMap<String, f64> = HashMap::new();
    for token in text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
    {
        *terms.entry(token).or_insert(0.0) += 1.0;
    }
    terms
}

fn vector_norm(terms: &HashMap<String, f64>) -> f64 {
    terms.values().map(|v| v * v).sum::<f64>().sqrt()
}

fn cosine(query: &HashMap<String, f64>, query_norm: f64, chunk: &IndexedChunk) -> f64 {
    if query_norm == 0.0 || chunk.norm == 0.0 {
        return 0.0;
    }

    let dot: f64 = query
        .iter()
        .filter_map(|(term, weight)| chunk.terms.get(term).map(|other| weight * other))
        .sum();

    dot / (query_norm * chunk.norm)
}
