//! Field and index declarations.
//!
//! These are plain values describing a collection's schema. Nothing here
//! talks to the store; [`crate::VectorRepository::provision`] consumes them.

use serde::{Deserialize, Serialize};

use crate::error::{VectorError, VectorResult};

pub const DEFAULT_STRING_MAX_LENGTH: u32 = 256;
pub const DEFAULT_SCALAR_INDEX_TYPE: &str = "Trie";

/// One column of a collection schema
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FieldDeclaration {
    String { name: String, max_length: u32 },
    Vector { name: String },
}

impl FieldDeclaration {
    /// Variable-length string field with the default maximum length (256)
    pub fn string(name: impl Into<String>) -> VectorResult<Self> {
        Self::string_with_max_length(name, DEFAULT_STRING_MAX_LENGTH)
    }

    pub fn string_with_max_length(name: impl Into<String>, max_length: u32) -> VectorResult<Self> {
        let name = non_empty_name(name.into())?;
        if max_length == 0 {
            return Err(VectorError::InvalidField(format!(
                "field '{}' must have a positive max_length",
                name
            )));
        }
        Ok(FieldDeclaration::String { name, max_length })
    }

    /// Float vector field; its width comes from the repository configuration
    pub fn vector(name: impl Into<String>) -> VectorResult<Self> {
        Ok(FieldDeclaration::Vector {
            name: non_empty_name(name.into())?,
        })
    }

    pub fn name(&self) -> &str {
        match self {
            FieldDeclaration::String { name, .. } | FieldDeclaration::Vector { name } => name,
        }
    }

    pub fn is_vector(&self) -> bool {
        matches!(self, FieldDeclaration::Vector { .. })
    }
}

/// Secondary index on a declared field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDeclaration {
    pub name: String,
    pub index_type: String,
}

impl IndexDeclaration {
    /// Index with the default scalar index type ("Trie")
    pub fn new(name: impl Into<String>) -> VectorResult<Self> {
        Self::with_type(name, DEFAULT_SCALAR_INDEX_TYPE)
    }

    pub fn with_type(name: impl Into<String>, index_type: impl Into<String>) -> VectorResult<Self> {
        let name = non_empty_name(name.into())?;
        let index_type = index_type.into();
        if index_type.trim().is_empty() {
            return Err(VectorError::InvalidField(format!(
                "index on '{}' must name an index type",
                name
            )));
        }
        Ok(Self { name, index_type })
    }
}

fn non_empty_name(name: String) -> VectorResult<String> {
    if name.trim().is_empty() {
        return Err(VectorError::InvalidField(
            "field name must not be empty".to_string(),
        ));
    }
    Ok(name)
}
