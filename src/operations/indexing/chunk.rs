//! Deterministic chunk identity and a reference paragraph chunker.
//!
//! A real deployment swaps in a richer markdown-aware parser; the pipeline
//! only depends on the `Chunker` trait.

use std::path::Path;

/// `hash(collection, relative_path, chunk_index)`, stable across reindexes
/// so the same logical chunk always upserts to the same vector id.
pub fn chunk_id(collection: &str, relative_path: &Path, chunk_index: usize) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(collection.as_bytes());
    hasher.update(b"\0");
    hasher.update(relative_path.to_string_lossy().as_bytes());
    hasher.update(b"\0");
    hasher.update(&chunk_index.to_le_bytes());
    hasher.finalize().to_hex().to_string()
}

pub trait Chunker: Send + Sync {
    /// `chunk_size` and `chunk_overlap` come from the collection's own
    /// config rather than the chunker's construction, since one chunker
    /// instance is shared across every collection.
    fn chunk(&self, content: &str, chunk_size: usize, chunk_overlap: usize) -> Vec<String>;
}

/// Splits on blank lines, then folds consecutive short paragraphs together
/// until each chunk is close to `chunk_size`, stitching `chunk_overlap`
/// trailing characters of the previous chunk onto the front of the next.
#[derive(Default)]
pub struct ParagraphChunker;

impl Chunker for ParagraphChunker {
    fn chunk(&self, content: &str, chunk_size: usize, chunk_overlap: usize) -> Vec<String> {
        let paragraphs: Vec<&str> = content.split("\n\n").map(str::trim).filter(|p| !p.is_empty()).collect();
        if paragraphs.is_empty() {
            return Vec::new();
        }

        let target = chunk_size.max(1);
        let overlap = chunk_overlap.min(target.saturating_sub(1));

        let mut raw = Vec::new();
        let mut current = String::new();
        for paragraph in paragraphs {
            if !current.is_empty() && current.len() + paragraph.len() > target {
                raw.push(std::mem::take(&mut current));
            }
            if !current.is_empty() {
                current.push_str("\n\n");
            }
            current.push_str(paragraph);
        }
        if !current.is_empty() {
            raw.push(current);
        }

        if overlap == 0 || raw.len() < 2 {
            return raw;
        }

        let mut out = Vec::with_capacity(raw.len());
        for (i, chunk) in raw.iter().enumerate() {
            if i == 0 {
                out.push(chunk.clone());
                continue;
            }
            let prev = &raw[i - 1];
            let mut tail_start = prev.len().saturating_sub(overlap);
            while tail_start < prev.len() && !prev.is_char_boundary(tail_start) {
                tail_start += 1;
            }
            out.push(format!("{}\n\n{}", &prev[tail_start..], chunk));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn chunk_id_is_stable() {
        let path = PathBuf::from("notes/today.md");
        let a = chunk_id("demo", &path, 0);
        let b = chunk_id("demo", &path, 0);
        assert_eq!(a, b);
        assert_ne!(a, chunk_id("demo", &path, 1));
        assert_ne!(a, chunk_id("other", &path, 0));
    }

    #[test]
    fn paragraph_chunker_groups_to_target_size() {
        let chunker = ParagraphChunker::default();
        let chunks = chunker.chunk("one\n\ntwo\n\nthree long paragraph here", 10, 0);
        assert!(chunks.len() >= 2);
    }

    #[test]
    fn paragraph_chunker_stitches_overlap_onto_next_chunk() {
        let chunker = ParagraphChunker::default();
        let chunks = chunker.chunk("one\n\ntwo\n\nthree long paragraph here", 10, 4);
        assert!(chunks.len() >= 2);
        let prev_tail = &chunks[0][chunks[0].len().saturating_sub(4)..];
        assert!(chunks[1].starts_with(prev_tail));
    }

    #[test]
    fn zero_overlap_matches_plain_split() {
        let chunker = ParagraphChunker::default();
        let with = chunker.chunk("one\n\ntwo\n\nthree long paragraph here", 10, 0);
        assert_eq!(with[0], "one");
    }
}
