pub mod assembler;
pub mod schema;

pub use assembler::{ResponseAssembler, RetrievalMeta};
pub use schema::StructuredResponse;
