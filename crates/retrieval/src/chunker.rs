//! Overlapping character chunking of the policy document.
//!
//! Chunks are cut at a target size with a fixed overlap so that a clause
//! straddling a boundary still appears whole in at least one chunk. Cut
//! points snap back to the nearest whitespace when one is close enough,
//! keeping words intact.

#[derive(Clone, Copy, Debug)]
pub struct ChunkingParams {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for ChunkingParams {
    fn default() -> Self {
        Self { chunk_size: 500, chunk_overlap: 50 }
    }
}

pub fn split_into_chunks(text: &str, params: ChunkingParams) -> Vec<String> {
    let chunk_size = params.chunk_size.max(1);
    let overlap = params.chunk_overlap.min(chunk_size - 1);

    let chars: Vec<char> = text.chars().collect();
    let mut chunks = Vec::new();
    let mut start = 0;

    while start < chars.len() {
        let hard_end = (start + chunk_size).min(chars.len());
        let end = if hard_end < chars.len() { snap_to_whitespace(&chars, start, hard_end) } else {
            hard_end
        };

        let chunk: String = chars[start..end].iter().collect();
        let trimmed = chunk.trim();
        if !trimmed.is_empty() {
            chunks.push(trimmed.to_string());
        }

        if end >= chars.len() {
            break;
        }
        start = end.saturating_sub(overlap).max(start + 1);
    }

    chunks
}

/// Walk back from `hard_end` looking for whitespace, but never give up
/// more than a quarter of the chunk.
fn snap_to_whitespace(chars: &[char], start: usize, hard_end: usize) -> usize {
    let window = (hard_end - start) / 4;
    let floor = hard_end - window;

    (floor..hard_end)
        .rev()
        .find(|&i| chars[i].is_whitespace())
        .map(|i| i + 1)
        .unwrap_or(hard_end)
}
