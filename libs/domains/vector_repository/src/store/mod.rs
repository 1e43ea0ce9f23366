//! Store-native operations.
//!
//! [`CollectionStore`] is synchronous and implementations may block on
//! network I/O. [`crate::VectorRepository`] runs every call on Tokio's
//! blocking pool.

pub mod filter;
mod memory;
mod milvus;

pub use memory::MemoryStore;
pub use milvus::MilvusStore;

use crate::error::VectorResult;
use crate::models::{CollectionSchema, IndexSpec, Record, SearchHit, SearchRequest};

#[cfg_attr(test, mockall::automock)]
pub trait CollectionStore: Send + Sync {
    // ===== Collection Management =====

    fn has_collection(&self, name: &str) -> VectorResult<bool>;

    fn list_collections(&self) -> VectorResult<Vec<String>>;

    /// Create the collection; a collection that already exists is left as is
    fn create_collection(&self, schema: &CollectionSchema) -> VectorResult<()>;

    fn drop_collection(&self, name: &str) -> VectorResult<()>;

    fn create_index(&self, collection: &str, index: &IndexSpec) -> VectorResult<()>;

    /// Make the collection servable for searches and queries
    fn load_collection(&self, name: &str) -> VectorResult<()>;

    // ===== Entity Operations =====

    /// Write records, returning how many were accepted
    fn insert(&self, collection: &str, records: Vec<Record>) -> VectorResult<usize>;

    /// Make prior writes visible to subsequent reads
    fn flush(&self, collection: &str) -> VectorResult<()>;

    /// Records matching `filter`, restricted to `output_fields`
    fn query(
        &self,
        collection: &str,
        filter: &str,
        output_fields: &[String],
    ) -> VectorResult<Vec<Record>>;

    /// Ranked similarity search, closest first
    fn search(&self, collection: &str, request: &SearchRequest) -> VectorResult<Vec<SearchHit>>;

    fn delete(&self, collection: &str, filter: &str) -> VectorResult<()>;
}
