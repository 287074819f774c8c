//! Index/reindex/incremental_update handlers sharing one per-file pipeline.

pub mod chunk;
pub mod filters;
pub mod pipeline;

pub use chunk::{Chunker, ParagraphChunker};
pub use pipeline::IndexingPipeline;
