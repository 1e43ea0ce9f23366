use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde_json::Value;
use tracing::debug;

use super::CollectionStore;
use super::filter::{self, Expr};
use crate::config::MetricType;
use crate::error::{VectorError, VectorResult};
use crate::models::{CollectionSchema, DataType, IndexSpec, Record, SearchHit, SearchRequest};

/// In-process [`CollectionStore`] that enforces the same schema rules as Milvus
///
/// Rows live in insertion order. Reads require the collection to be loaded,
/// writes do not. Filters are evaluated with [`filter`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, MemoryCollection>>,
}

#[derive(Debug)]
struct MemoryCollection {
    schema: CollectionSchema,
    indexes: Vec<IndexSpec>,
    loaded: bool,
    rows: Vec<Record>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Indexes created on `collection`, in creation order
    pub fn indexes(&self, collection: &str) -> VectorResult<Vec<IndexSpec>> {
        let collections = self.read()?;
        Ok(existing(&collections, collection)?.indexes.clone())
    }

    pub fn is_loaded(&self, collection: &str) -> VectorResult<bool> {
        let collections = self.read()?;
        Ok(existing(&collections, collection)?.loaded)
    }

    /// Number of stored rows, regardless of load state
    pub fn row_count(&self, collection: &str) -> VectorResult<usize> {
        let collections = self.read()?;
        Ok(existing(&collections, collection)?.rows.len())
    }

    fn read(&self) -> VectorResult<RwLockReadGuard<'_, HashMap<String, MemoryCollection>>> {
        self.collections
            .read()
            .map_err(|_| VectorError::Internal("memory store lock poisoned".to_string()))
    }

    fn write(&self) -> VectorResult<RwLockWriteGuard<'_, HashMap<String, MemoryCollection>>> {
        self.collections
            .write()
            .map_err(|_| VectorError::Internal("memory store lock poisoned".to_string()))
    }
}

fn existing<'a>(
    collections: &'a HashMap<String, MemoryCollection>,
    name: &str,
) -> VectorResult<&'a MemoryCollection> {
    collections
        .get(name)
        .ok_or_else(|| VectorError::Store(format!("collection not found: {}", name)))
}

fn existing_mut<'a>(
    collections: &'a mut HashMap<String, MemoryCollection>,
    name: &str,
) -> VectorResult<&'a mut MemoryCollection> {
    collections
        .get_mut(name)
        .ok_or_else(|| VectorError::Store(format!("collection not found: {}", name)))
}

impl MemoryCollection {
    fn ensure_loaded(&self) -> VectorResult<()> {
        if self.loaded {
            Ok(())
        } else {
            Err(VectorError::Store(format!(
                "collection not loaded: {}",
                self.schema.name
            )))
        }
    }

    fn compile(&self, expression: &str) -> VectorResult<Expr> {
        let expr = filter::parse(expression)?;
        for field in expr.fields() {
            if self.schema.field(field).is_none() {
                return Err(VectorError::InvalidFilter(format!(
                    "field '{}' does not exist in collection {}",
                    field, self.schema.name
                )));
            }
        }
        Ok(expr)
    }

    fn validate_row(&self, row: &Record) -> VectorResult<()> {
        for key in row.keys() {
            if self.schema.field(key).is_none() {
                return Err(VectorError::Store(format!(
                    "field '{}' is not part of collection {}",
                    key, self.schema.name
                )));
            }
        }

        for field in &self.schema.fields {
            let value = row.get(&field.name).ok_or_else(|| {
                VectorError::Store(format!("missing field '{}'", field.name))
            })?;

            match (&field.data_type, value) {
                (DataType::VarChar { max_length }, Value::String(s)) => {
                    if s.chars().count() > *max_length as usize {
                        return Err(VectorError::Store(format!(
                            "value of '{}' exceeds max length {}",
                            field.name, max_length
                        )));
                    }
                }
                (DataType::FloatVector { dim }, Value::Array(items)) => {
                    if items.len() != *dim as usize || items.iter().any(|v| !v.is_number()) {
                        return Err(VectorError::Store(format!(
                            "'{}' must be a float vector of dimension {}",
                            field.name, dim
                        )));
                    }
                }
                (data_type, _) => {
                    return Err(VectorError::Store(format!(
                        "'{}' expects {}",
                        field.name,
                        data_type.as_str()
                    )));
                }
            }
        }

        Ok(())
    }

    /// Keep `output_fields` plus the primary key, which Milvus always returns
    fn output(&self, row: &Record, output_fields: &[String]) -> Record {
        if output_fields.is_empty() {
            return row.clone();
        }
        let primary = self.schema.primary_field().map(|f| f.name.as_str());
        row.iter()
            .filter(|(key, _)| {
                Some(key.as_str()) == primary || output_fields.iter().any(|f| f == *key)
            })
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }
}

fn as_vector(value: Option<&Value>) -> Vec<f32> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|v| v.as_f64().map(|f| f as f32))
            .collect(),
        _ => Vec::new(),
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot = inner_product(a, b);
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

fn inner_product(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Squared euclidean distance, as Milvus reports for L2
fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum()
}

fn score(metric: MetricType, a: &[f32], b: &[f32]) -> f32 {
    match metric {
        MetricType::Cosine => cosine_similarity(a, b),
        MetricType::Ip => inner_product(a, b),
        MetricType::L2 => squared_l2(a, b),
    }
}

impl CollectionStore for MemoryStore {
    fn has_collection(&self, name: &str) -> VectorResult<bool> {
        Ok(self.read()?.contains_key(name))
    }

    fn list_collections(&self) -> VectorResult<Vec<String>> {
        let mut names: Vec<String> = self.read()?.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    fn create_collection(&self, schema: &CollectionSchema) -> VectorResult<()> {
        if schema.primary_field().is_none() {
            return Err(VectorError::Store(format!(
                "collection {} has no primary field",
                schema.name
            )));
        }

        let mut collections = self.write()?;
        if collections.contains_key(&schema.name) {
            debug!(collection = %schema.name, "Collection already exists");
            return Ok(());
        }

        collections.insert(
            schema.name.clone(),
            MemoryCollection {
                schema: schema.clone(),
                indexes: Vec::new(),
                loaded: false,
                rows: Vec::new(),
            },
        );
        Ok(())
    }

    fn drop_collection(&self, name: &str) -> VectorResult<()> {
        self.write()?.remove(name);
        Ok(())
    }

    fn create_index(&self, collection: &str, index: &IndexSpec) -> VectorResult<()> {
        let mut collections = self.write()?;
        let entry = existing_mut(&mut collections, collection)?;

        if entry.schema.field(&index.field_name).is_none() {
            return Err(VectorError::Store(format!(
                "cannot index unknown field '{}'",
                index.field_name
            )));
        }

        entry.indexes.retain(|i| i.field_name != index.field_name);
        entry.indexes.push(index.clone());
        Ok(())
    }

    fn load_collection(&self, name: &str) -> VectorResult<()> {
        let mut collections = self.write()?;
        existing_mut(&mut collections, name)?.loaded = true;
        Ok(())
    }

    fn insert(&self, collection: &str, records: Vec<Record>) -> VectorResult<usize> {
        let mut collections = self.write()?;
        let entry = existing_mut(&mut collections, collection)?;

        for row in &records {
            entry.validate_row(row)?;
        }

        let count = records.len();
        entry.rows.extend(records);
        Ok(count)
    }

    fn flush(&self, collection: &str) -> VectorResult<()> {
        let collections = self.read()?;
        existing(&collections, collection).map(|_| ())
    }

    fn query(
        &self,
        collection: &str,
        filter: &str,
        output_fields: &[String],
    ) -> VectorResult<Vec<Record>> {
        let collections = self.read()?;
        let entry = existing(&collections, collection)?;
        entry.ensure_loaded()?;
        let expr = entry.compile(filter)?;

        Ok(entry
            .rows
            .iter()
            .filter(|row| expr.matches(row))
            .map(|row| entry.output(row, output_fields))
            .collect())
    }

    fn search(&self, collection: &str, request: &SearchRequest) -> VectorResult<Vec<SearchHit>> {
        let collections = self.read()?;
        let entry = existing(&collections, collection)?;
        entry.ensure_loaded()?;

        match entry.schema.field(&request.anns_field).map(|f| &f.data_type) {
            Some(DataType::FloatVector { dim }) if *dim as usize == request.vector.len() => {}
            Some(DataType::FloatVector { dim }) => {
                return Err(VectorError::Store(format!(
                    "query vector has dimension {}, expected {}",
                    request.vector.len(),
                    dim
                )));
            }
            _ => {
                return Err(VectorError::Store(format!(
                    "'{}' is not a vector field",
                    request.anns_field
                )));
            }
        }

        let expr = entry.compile(&request.filter)?;

        let mut hits: Vec<SearchHit> = entry
            .rows
            .iter()
            .filter(|row| expr.matches(row))
            .map(|row| SearchHit {
                distance: score(
                    request.metric_type,
                    &request.vector,
                    &as_vector(row.get(&request.anns_field)),
                ),
                entity: entry.output(row, &request.output_fields),
            })
            .collect();

        let closer_first = request.metric_type.higher_is_closer();
        hits.sort_by(|a, b| {
            let ordering = a.distance.partial_cmp(&b.distance).unwrap_or(Ordering::Equal);
            if closer_first { ordering.reverse() } else { ordering }
        });
        hits.truncate(request.limit as usize);

        Ok(hits)
    }

    fn delete(&self, collection: &str, filter: &str) -> VectorResult<()> {
        let mut collections = self.write()?;
        let entry = existing_mut(&mut collections, collection)?;
        let expr = entry.compile(filter)?;
        entry.rows.retain(|row| !expr.matches(row));
        Ok(())
    }
}
