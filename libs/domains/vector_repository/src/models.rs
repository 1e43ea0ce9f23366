use serde::{Deserialize, Serialize};

use crate::config::MetricType;

/// A record as seen by callers and by the store: field name to value
pub type Record = serde_json::Map<String, serde_json::Value>;

/// Either a single item or a batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    pub fn len(&self) -> usize {
        match self {
            OneOrMany::One(_) => 1,
            OneOrMany::Many(items) => items.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::One(item) => vec![item],
            OneOrMany::Many(items) => items,
        }
    }
}

impl From<&str> for OneOrMany<String> {
    fn from(value: &str) -> Self {
        OneOrMany::One(value.to_string())
    }
}

impl From<String> for OneOrMany<String> {
    fn from(value: String) -> Self {
        OneOrMany::One(value)
    }
}

impl From<Vec<String>> for OneOrMany<String> {
    fn from(values: Vec<String>) -> Self {
        OneOrMany::Many(values)
    }
}

impl From<Vec<&str>> for OneOrMany<String> {
    fn from(values: Vec<&str>) -> Self {
        OneOrMany::Many(values.into_iter().map(str::to_string).collect())
    }
}

impl From<Record> for OneOrMany<Record> {
    fn from(value: Record) -> Self {
        OneOrMany::One(value)
    }
}

impl From<Vec<Record>> for OneOrMany<Record> {
    fn from(values: Vec<Record>) -> Self {
        OneOrMany::Many(values)
    }
}

/// Which insert shape the caller intends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InsertMode {
    Single,
    Batch,
}

/// Store-native field type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataType {
    VarChar { max_length: u32 },
    FloatVector { dim: u32 },
}

impl DataType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::VarChar { .. } => "VarChar",
            DataType::FloatVector { .. } => "FloatVector",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSchema {
    pub name: String,
    pub data_type: DataType,
    pub is_primary: bool,
}

/// Store-native schema built from field declarations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionSchema {
    pub name: String,
    pub fields: Vec<FieldSchema>,
}

impl CollectionSchema {
    pub fn field(&self, name: &str) -> Option<&FieldSchema> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn primary_field(&self) -> Option<&FieldSchema> {
        self.fields.iter().find(|f| f.is_primary)
    }
}

/// Index creation parameters for one field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexSpec {
    pub field_name: String,
    pub index_type: String,
    /// Only set for indexes on the vector field
    pub metric_type: Option<MetricType>,
    pub params: serde_json::Map<String, serde_json::Value>,
}

/// Similarity search request against one collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchRequest {
    pub vector: Vec<f32>,
    pub anns_field: String,
    pub filter: String,
    pub limit: u32,
    pub output_fields: Vec<String>,
    pub metric_type: MetricType,
    pub params: serde_json::Map<String, serde_json::Value>,
}

/// Key under which the store reports a hit's score; unavailable as a field name
pub const DISTANCE_FIELD: &str = "distance";

/// One ranked search hit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub distance: f32,
    pub entity: Record,
}
