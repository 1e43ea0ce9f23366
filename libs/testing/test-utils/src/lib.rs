//! Shared test utilities for the vector repository
//!
//! - `HashEmbedder`: deterministic, offline `EmbeddingProvider`
//! - `TestDataBuilder`: deterministic collection names and records
//! - `assertions`: record comparison helpers
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use domain_vector_repository::{MemoryStore, RepositoryConfig, VectorRepository};
//! use test_utils::{HashEmbedder, TestDataBuilder};
//!
//! #[tokio::test]
//! async fn my_repository_test() {
//!     let builder = TestDataBuilder::from_test_name("my_test");
//!     let repository = VectorRepository::with_components(
//!         RepositoryConfig::new(32),
//!         Arc::new(MemoryStore::new()),
//!         Arc::new(HashEmbedder::new(32)),
//!     )
//!     .unwrap();
//!
//!     let collection = builder.collection("preferences");
//! }
//! ```

mod embedder;

pub use embedder::HashEmbedder;

use domain_vector_repository::Record;
use serde_json::Value;

/// Builder for test data with deterministic values
///
/// The same seed always yields the same names, so reruns of a test touch the
/// same collections.
pub struct TestDataBuilder {
    seed: u64,
}

impl TestDataBuilder {
    /// Create a new builder with a seed (for deterministic tests)
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    /// Create from test name (generates seed from test name hash)
    ///
    /// # Example
    ///
    /// ```
    /// use test_utils::TestDataBuilder;
    ///
    /// let builder = TestDataBuilder::from_test_name("test_insert_batch");
    /// ```
    pub fn from_test_name(name: &str) -> Self {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let mut hasher = DefaultHasher::new();
        name.hash(&mut hasher);
        Self::new(hasher.finish())
    }

    /// Collection name safe for Milvus (letters, digits, underscores)
    ///
    /// # Example
    ///
    /// ```
    /// use test_utils::TestDataBuilder;
    ///
    /// let builder = TestDataBuilder::new(7);
    /// assert_eq!(builder.collection("docs"), "test_docs_7");
    /// ```
    pub fn collection(&self, prefix: &str) -> String {
        format!("test_{}_{}", prefix, self.seed)
    }

    /// Record built from string pairs
    pub fn record(&self, pairs: &[(&str, &str)]) -> Record {
        pairs
            .iter()
            .map(|(key, value)| (key.to_string(), Value::String(value.to_string())))
            .collect()
    }
}

/// Test assertion helpers
pub mod assertions {
    use domain_vector_repository::Record;
    use domain_vector_repository::record::IDENTITY_FIELD;

    /// Assert both slices hold the same records, ignoring order
    pub fn assert_same_records(actual: &[Record], expected: &[Record], context: &str) {
        assert_eq!(
            actual.len(),
            expected.len(),
            "{}: expected {} records, got {}: {:?}",
            context,
            expected.len(),
            actual.len(),
            actual
        );

        let mut remaining: Vec<&Record> = actual.iter().collect();
        for record in expected {
            match remaining.iter().position(|r| *r == record) {
                Some(pos) => {
                    remaining.remove(pos);
                }
                None => panic!("{}: missing {:?} in {:?}", context, record, actual),
            }
        }
    }

    /// Assert no record exposes the identity or the embedding
    pub fn assert_no_internal_fields(records: &[Record], vector_field: &str, context: &str) {
        for record in records {
            assert!(
                !record.contains_key(IDENTITY_FIELD) && !record.contains_key(vector_field),
                "{}: internal field leaked in {:?}",
                context,
                record
            );
        }
    }

    /// Assert that an optional value is Some
    pub fn assert_some<T>(value: Option<T>, context: &str) -> T {
        value.unwrap_or_else(|| panic!("{}: expected Some, got None", context))
    }
}
