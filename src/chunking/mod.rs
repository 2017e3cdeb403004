pub mod chunker;
pub mod metadata;

pub use chunker::LegalChunker;
pub use metadata::build_chunk_metadata;
