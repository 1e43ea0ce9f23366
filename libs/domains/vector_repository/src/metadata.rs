use std::collections::HashMap;

use crate::error::{VectorError, VectorResult};

/// What the repository remembers about a provisioned collection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionMetadata {
    pub vector_field: String,
    /// Non-vector field names in declaration order (identity excluded)
    pub fields: Vec<String>,
}

/// Collection name to metadata, owned by one repository instance
#[derive(Debug, Default)]
pub struct MetadataRegistry {
    entries: HashMap<String, CollectionMetadata>,
}

impl MetadataRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record metadata for `name`, returning whatever was registered before
    pub fn register(
        &mut self,
        name: &str,
        vector_field: impl Into<String>,
        fields: Vec<String>,
    ) -> Option<CollectionMetadata> {
        self.entries.insert(
            name.to_string(),
            CollectionMetadata {
                vector_field: vector_field.into(),
                fields,
            },
        )
    }

    pub fn lookup(&self, name: &str) -> VectorResult<CollectionMetadata> {
        self.entries
            .get(name)
            .cloned()
            .ok_or_else(|| VectorError::UnknownCollection(name.to_string()))
    }

    pub fn remove(&mut self, name: &str) -> Option<CollectionMetadata> {
        self.entries.remove(name)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_unknown_collection() {
        let registry = MetadataRegistry::new();
        let err = registry.lookup("missing").unwrap_err();
        assert!(matches!(err, VectorError::UnknownCollection(name) if name == "missing"));
    }

    #[test]
    fn test_register_overwrites() {
        let mut registry = MetadataRegistry::new();
        assert!(
            registry
                .register("docs", "embedding", vec!["user_id".to_string()])
                .is_none()
        );

        let previous = registry.register("docs", "vec", vec!["group_id".to_string()]);
        assert_eq!(previous.unwrap().vector_field, "embedding");

        let metadata = registry.lookup("docs").unwrap();
        assert_eq!(metadata.vector_field, "vec");
        assert_eq!(metadata.fields, vec!["group_id".to_string()]);
    }

    #[test]
    fn test_remove() {
        let mut registry = MetadataRegistry::new();
        registry.register("docs", "embedding", vec![]);
        assert!(registry.remove("docs").is_some());
        assert!(registry.lookup("docs").is_err());
        assert!(registry.remove("docs").is_none());
    }
}
