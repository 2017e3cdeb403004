pub mod chunking;
pub mod config;
pub mod domain;
pub mod engine;
pub mod error;
pub mod providers;
pub mod query;
pub mod response;
pub mod retrieval;
pub mod types;

// Re-export primary types for convenience
pub use config::RetrievalConfig;
pub use engine::{IngestReport, QueryAnalysis, QueryOptions, RagEngine};
pub use error::RagError;
pub use response::schema::StructuredResponse;
pub use types::{
    Chunk, ChunkingMethod, IndexRecord, MetadataFilter, MetadataValue, QueryContext, QueryIntent,
    RetrievalMethod, RetrievalResult,
};

// Re-export common types
pub use anyhow::Result;
