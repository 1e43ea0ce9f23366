use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde_json::{Map, Value, json};
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

use crate::config::RepositoryConfig;
use crate::embedding::{EmbeddingClient, EmbeddingProvider};
use crate::error::{VectorError, VectorResult};
use crate::fields::{FieldDeclaration, IndexDeclaration};
use crate::metadata::{CollectionMetadata, MetadataRegistry};
use crate::models::{
    CollectionSchema, DISTANCE_FIELD, DataType, FieldSchema, IndexSpec, InsertMode, OneOrMany,
    Record, SearchRequest,
};
use crate::record::{
    IDENTITY_FIELD, IDENTITY_MAX_LENGTH, generate_record_id, match_all_filter, project,
    strip_internal, with_identity,
};
use crate::store::{CollectionStore, MilvusStore};

/// CRUD and similarity search over vector collections
///
/// Owns the collection metadata registry and the cache of provisioned
/// collection handles. Text is embedded through the [`EmbeddingProvider`]
/// before any store call; store calls run on Tokio's blocking pool.
///
/// Concurrent `provision` calls for the same name race: the last one to
/// register its metadata wins.
pub struct VectorRepository {
    config: RepositoryConfig,
    store: Arc<dyn CollectionStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    registry: RwLock<MetadataRegistry>,
    handles: RwLock<HashMap<String, CollectionSchema>>,
}

impl VectorRepository {
    /// Repository backed by Milvus and the HTTP embedding service
    pub fn new(config: RepositoryConfig) -> VectorResult<Self> {
        let store = Arc::new(MilvusStore::new(config.milvus.clone()));
        let embedder = Arc::new(EmbeddingClient::new(config.embedding.clone()));
        Self::with_components(config, store, embedder)
    }

    pub fn with_components(
        config: RepositoryConfig,
        store: Arc<dyn CollectionStore>,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> VectorResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            store,
            embedder,
            registry: RwLock::new(MetadataRegistry::new()),
            handles: RwLock::new(HashMap::new()),
        })
    }

    pub fn config(&self) -> &RepositoryConfig {
        &self.config
    }

    /// Run a store call on the blocking pool
    async fn on_store<T, F>(&self, call: F) -> VectorResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&dyn CollectionStore) -> VectorResult<T> + Send + 'static,
    {
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || call(store.as_ref())).await?
    }

    async fn metadata(&self, collection: &str) -> VectorResult<CollectionMetadata> {
        self.registry.read().await.lookup(collection)
    }

    fn check_dimension(&self, embedding: &[f32]) -> VectorResult<()> {
        let expected = self.config.embedding_dimension as usize;
        if embedding.len() != expected {
            return Err(VectorError::DimensionMismatch {
                expected,
                got: embedding.len(),
            });
        }
        Ok(())
    }

    // ===== Collection Management =====

    /// Declare a collection and make it ready for reads and writes
    ///
    /// The collection is created in the store only the first time this
    /// repository provisions `name`; indexes are (re)created and the
    /// collection loaded on every call.
    #[instrument(skip(self, fields, indexes), fields(collection = %name))]
    pub async fn provision(
        &self,
        name: &str,
        fields: &[FieldDeclaration],
        indexes: &[IndexDeclaration],
    ) -> VectorResult<()> {
        let vector_field = validate_declarations(name, fields, indexes)?;
        let schema = build_schema(name, fields, self.config.embedding_dimension);
        let index_specs = self.index_specs(&vector_field, indexes);

        let scalar_fields: Vec<String> = fields
            .iter()
            .filter(|f| !f.is_vector())
            .map(|f| f.name().to_string())
            .collect();

        let cached = self.handles.read().await.contains_key(name);
        if !cached {
            let to_create = schema.clone();
            self.on_store(move |store| store.create_collection(&to_create))
                .await?;
            self.handles.write().await.insert(name.to_string(), schema);
        }

        let collection = name.to_string();
        let index_count = index_specs.len();
        self.on_store(move |store| {
            for spec in &index_specs {
                store.create_index(&collection, spec)?;
            }
            store.load_collection(&collection)
        })
        .await?;

        let previous = self
            .registry
            .write()
            .await
            .register(name, vector_field.as_str(), scalar_fields);
        if let Some(previous) = previous {
            warn!(
                previous_vector_field = %previous.vector_field,
                "Collection re-provisioned, metadata overwritten"
            );
        }

        info!(
            vector_field = %vector_field,
            indexes = index_count,
            reused_handle = cached,
            "Collection provisioned"
        );
        Ok(())
    }

    fn index_specs(&self, vector_field: &str, indexes: &[IndexDeclaration]) -> Vec<IndexSpec> {
        let vector_params = || {
            let mut params = Map::new();
            params.insert("nlist".to_string(), json!(self.config.embedding_dimension));
            params
        };

        let mut specs: Vec<IndexSpec> = indexes
            .iter()
            .map(|index| {
                let on_vector = index.name == vector_field;
                IndexSpec {
                    field_name: index.name.clone(),
                    index_type: index.index_type.clone(),
                    metric_type: on_vector.then_some(self.config.metric_type),
                    params: if on_vector { vector_params() } else { Map::new() },
                }
            })
            .collect();

        if !indexes.iter().any(|index| index.name == vector_field) {
            specs.push(IndexSpec {
                field_name: vector_field.to_string(),
                index_type: self.config.index_type.clone(),
                metric_type: Some(self.config.metric_type),
                params: vector_params(),
            });
        }

        specs
    }

    /// Drop every collection (`None`) or the named ones, returning what was dropped
    ///
    /// Names that do not exist are skipped. Dropped collections are forgotten
    /// by this repository and must be provisioned again before use.
    #[instrument(skip(self, names))]
    pub async fn clear_collections(
        &self,
        names: Option<OneOrMany<String>>,
    ) -> VectorResult<Vec<String>> {
        let requested = names.map(OneOrMany::into_vec);
        let drop_all = requested.is_none();

        let dropped = self
            .on_store(move |store| {
                let targets = match requested {
                    None => store.list_collections()?,
                    Some(names) => {
                        let mut existing = Vec::new();
                        for name in names {
                            if store.has_collection(&name)? && !existing.contains(&name) {
                                existing.push(name);
                            }
                        }
                        existing
                    }
                };

                for name in &targets {
                    store.drop_collection(name)?;
                }
                Ok(targets)
            })
            .await?;

        let mut registry = self.registry.write().await;
        let mut handles = self.handles.write().await;
        if drop_all {
            registry.clear();
            handles.clear();
        } else {
            for name in &dropped {
                registry.remove(name);
                handles.remove(name);
            }
        }

        info!(count = dropped.len(), "Collections dropped");
        Ok(dropped)
    }

    // ===== Reads =====

    /// Records closest to `text`, closest first
    ///
    /// `limit` defaults to the configured retrieval limit.
    #[instrument(skip(self, text, filter), fields(collection = %collection))]
    pub async fn retrieval(
        &self,
        collection: &str,
        text: &str,
        filter: Option<&str>,
        limit: Option<u32>,
    ) -> VectorResult<Vec<Record>> {
        let metadata = self.metadata(collection).await?;
        let limit = limit.unwrap_or(self.config.limit);
        if limit == 0 {
            return Err(VectorError::Validation(
                "retrieval limit must be positive".to_string(),
            ));
        }

        let vector = self.embedder.embed(text).await?;
        self.check_dimension(&vector)?;

        let request = SearchRequest {
            vector,
            anns_field: metadata.vector_field.clone(),
            filter: filter.map_or_else(match_all_filter, str::to_string),
            limit,
            output_fields: metadata.fields.clone(),
            metric_type: self.config.metric_type,
            params: Map::new(),
        };

        let name = collection.to_string();
        let hits = self
            .on_store(move |store| store.search(&name, &request))
            .await?;

        debug!(hits = hits.len(), "Retrieval finished");
        Ok(hits
            .iter()
            .map(|hit| project(&hit.entity, &metadata.fields))
            .collect())
    }

    /// Every record matching `filter`; `None` matches all records
    #[instrument(skip(self, filter), fields(collection = %collection))]
    pub async fn find(&self, collection: &str, filter: Option<&str>) -> VectorResult<Vec<Record>> {
        let metadata = self.metadata(collection).await?;
        let filter = filter.map_or_else(match_all_filter, str::to_string);

        let name = collection.to_string();
        let output_fields = metadata.fields.clone();
        let rows = self
            .on_store(move |store| store.query(&name, &filter, &output_fields))
            .await?;

        debug!(rows = rows.len(), "Find finished");
        Ok(rows
            .iter()
            .map(|row| project(&strip_internal(row, &metadata.vector_field), &metadata.fields))
            .collect())
    }

    /// First record matching `filter`, or `None` when nothing matches
    pub async fn find_one(
        &self,
        collection: &str,
        filter: Option<&str>,
    ) -> VectorResult<Option<Record>> {
        Ok(self.find(collection, filter).await?.into_iter().next())
    }

    // ===== Writes =====

    /// Insert one record (`InsertMode::Single`) or a batch (`InsertMode::Batch`)
    ///
    /// The shape of `texts` and `data` must match the mode.
    pub async fn insert(
        &self,
        collection: &str,
        texts: OneOrMany<String>,
        data: OneOrMany<Record>,
        mode: InsertMode,
    ) -> VectorResult<OneOrMany<Record>> {
        match (mode, texts, data) {
            (InsertMode::Single, OneOrMany::One(text), OneOrMany::One(record)) => self
                .insert_single(collection, &text, &record)
                .await
                .map(OneOrMany::One),
            (InsertMode::Batch, OneOrMany::Many(texts), OneOrMany::Many(records)) => self
                .insert_batch(collection, &texts, &records)
                .await
                .map(OneOrMany::Many),
            (InsertMode::Single, _, _) => Err(VectorError::Validation(
                "single insert expects one text and one record".to_string(),
            )),
            (InsertMode::Batch, _, _) => Err(VectorError::Validation(
                "batch insert expects a list of texts and a list of records".to_string(),
            )),
        }
    }

    /// Embed `text`, store `data` under a fresh identity, and return `data`
    #[instrument(skip(self, text, data), fields(collection = %collection))]
    pub async fn insert_single(
        &self,
        collection: &str,
        text: &str,
        data: &Record,
    ) -> VectorResult<Record> {
        let metadata = self.metadata(collection).await?;
        validate_caller_record(data, &metadata)?;

        let embedding = self.embedder.embed(text).await?;
        self.check_dimension(&embedding)?;

        let row = with_identity(data, generate_record_id(), &metadata.vector_field, &embedding);
        self.write_rows(collection, vec![row]).await?;

        Ok(data.clone())
    }

    /// Embed all `texts` in one call and store each record under its own identity
    ///
    /// Output order matches input order.
    #[instrument(skip(self, texts, data), fields(collection = %collection, count = data.len()))]
    pub async fn insert_batch(
        &self,
        collection: &str,
        texts: &[String],
        data: &[Record],
    ) -> VectorResult<Vec<Record>> {
        let metadata = self.metadata(collection).await?;

        if texts.len() != data.len() {
            return Err(VectorError::Validation(format!(
                "got {} texts for {} records",
                texts.len(),
                data.len()
            )));
        }
        if data.is_empty() {
            return Ok(Vec::new());
        }
        for record in data {
            validate_caller_record(record, &metadata)?;
        }

        let embeddings = self.embedder.embed_batch(texts).await?;
        if embeddings.len() != data.len() {
            return Err(VectorError::Decode(format!(
                "expected {} embeddings, got {}",
                data.len(),
                embeddings.len()
            )));
        }
        for embedding in &embeddings {
            self.check_dimension(embedding)?;
        }

        let rows: Vec<Record> = data
            .iter()
            .zip(&embeddings)
            .map(|(record, embedding)| {
                with_identity(record, generate_record_id(), &metadata.vector_field, embedding)
            })
            .collect();

        let stored: Vec<Record> = rows
            .iter()
            .map(|row| strip_internal(row, &metadata.vector_field))
            .collect();
        self.write_rows(collection, rows).await?;

        Ok(stored)
    }

    async fn write_rows(&self, collection: &str, rows: Vec<Record>) -> VectorResult<()> {
        let name = collection.to_string();
        let written = self
            .on_store(move |store| {
                let count = store.insert(&name, rows)?;
                store.flush(&name)?;
                Ok(count)
            })
            .await?;

        info!(collection = %collection, count = written, "Records written");
        Ok(())
    }

    /// Delete records matching `filter`, returning what they looked like
    ///
    /// `None` deletes every record. The snapshot is read before the delete;
    /// writes landing in between are not reflected in it.
    #[instrument(skip(self), fields(collection = %collection))]
    pub async fn delete(
        &self,
        collection: &str,
        filter: Option<&str>,
    ) -> VectorResult<Vec<Record>> {
        if filter.is_some_and(|f| f.trim().is_empty()) {
            return Err(VectorError::Validation(
                "delete filter must not be blank".to_string(),
            ));
        }
        let expression = filter.map_or_else(match_all_filter, str::to_string);

        let snapshot = self.find(collection, Some(&expression)).await?;

        let name = collection.to_string();
        self.on_store(move |store| {
            store.delete(&name, &expression)?;
            store.flush(&name)
        })
        .await?;

        info!(count = snapshot.len(), "Records deleted");
        Ok(snapshot)
    }
}

/// Check a field list and its indexes, returning the vector field name
fn validate_declarations(
    name: &str,
    fields: &[FieldDeclaration],
    indexes: &[IndexDeclaration],
) -> VectorResult<String> {
    if name.trim().is_empty() {
        return Err(VectorError::Schema(
            "collection name must not be empty".to_string(),
        ));
    }

    let vectors: Vec<&FieldDeclaration> = fields.iter().filter(|f| f.is_vector()).collect();
    let vector_field = match vectors.as_slice() {
        [single] => single.name().to_string(),
        [] => {
            return Err(VectorError::Schema(format!(
                "collection {} needs exactly one vector field, found none",
                name
            )));
        }
        many => {
            return Err(VectorError::Schema(format!(
                "collection {} needs exactly one vector field, found {}",
                name,
                many.len()
            )));
        }
    };

    let mut seen = HashSet::new();
    for field in fields {
        if field.name() == IDENTITY_FIELD {
            return Err(VectorError::Schema(format!(
                "'{}' is reserved for record identity",
                IDENTITY_FIELD
            )));
        }
        if field.name() == DISTANCE_FIELD {
            return Err(VectorError::Schema(format!(
                "'{}' is reserved for search scores",
                DISTANCE_FIELD
            )));
        }
        if !seen.insert(field.name()) {
            return Err(VectorError::Schema(format!(
                "field '{}' declared more than once",
                field.name()
            )));
        }
    }

    for index in indexes {
        if !seen.contains(index.name.as_str()) {
            return Err(VectorError::Schema(format!(
                "index references undeclared field '{}'",
                index.name
            )));
        }
    }

    Ok(vector_field)
}

/// Store schema: identity primary key first, then fields in declaration order
fn build_schema(name: &str, fields: &[FieldDeclaration], dimension: u32) -> CollectionSchema {
    let mut schema_fields = vec![FieldSchema {
        name: IDENTITY_FIELD.to_string(),
        data_type: DataType::VarChar {
            max_length: IDENTITY_MAX_LENGTH,
        },
        is_primary: true,
    }];

    schema_fields.extend(fields.iter().map(|field| FieldSchema {
        name: field.name().to_string(),
        data_type: match field {
            FieldDeclaration::String { max_length, .. } => DataType::VarChar {
                max_length: *max_length,
            },
            FieldDeclaration::Vector { .. } => DataType::FloatVector { dim: dimension },
        },
        is_primary: false,
    }));

    CollectionSchema {
        name: name.to_string(),
        fields: schema_fields,
    }
}

fn validate_caller_record(record: &Record, metadata: &CollectionMetadata) -> VectorResult<()> {
    for reserved in [IDENTITY_FIELD, metadata.vector_field.as_str()] {
        if record.contains_key(reserved) {
            return Err(VectorError::Validation(format!(
                "record must not set '{}'",
                reserved
            )));
        }
    }
    for (key, value) in record {
        if !metadata.fields.contains(key) {
            return Err(VectorError::Validation(format!(
                "field '{}' is not declared on this collection",
                key
            )));
        }
        if !matches!(value, Value::String(_)) {
            return Err(VectorError::Validation(format!(
                "field '{}' must be a string",
                key
            )));
        }
    }
    if let Some(missing) = metadata.fields.iter().find(|f| !record.contains_key(*f)) {
        return Err(VectorError::Validation(format!(
            "record is missing field '{}'",
            missing
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MetricType;
    use crate::embedding::MockEmbeddingProvider;
    use crate::store::{MemoryStore, MockCollectionStore};

    const DIM: u32 = 4;

    fn config() -> RepositoryConfig {
        RepositoryConfig::new(DIM)
    }

    fn fields() -> Vec<FieldDeclaration> {
        vec![
            FieldDeclaration::string("user_id").unwrap(),
            FieldDeclaration::string("group_id").unwrap(),
            FieldDeclaration::vector("embedding").unwrap(),
        ]
    }

    fn record(value: Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    fn embedder() -> MockEmbeddingProvider {
        let mut embedder = MockEmbeddingProvider::new();
        embedder
            .expect_embed()
            .returning(|text| Ok(fake_vector(text)));
        embedder
            .expect_embed_batch()
            .returning(|texts| Ok(texts.iter().map(|t| fake_vector(t)).collect()));
        embedder
    }

    fn fake_vector(text: &str) -> Vec<f32> {
        let len = text.len() as f32;
        vec![1.0, len, 0.5, 0.25]
    }

    fn repository_on(store: Arc<dyn CollectionStore>, embedder: MockEmbeddingProvider) -> VectorRepository {
        VectorRepository::with_components(config(), store, Arc::new(embedder)).unwrap()
    }

    async fn provisioned_memory_repository() -> (VectorRepository, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let repository = repository_on(store.clone(), embedder());
        repository
            .provision("docs", &fields(), &[IndexDeclaration::new("user_id").unwrap()])
            .await
            .unwrap();
        (repository, store)
    }

    #[test]
    fn test_rejects_invalid_config() {
        let result = VectorRepository::with_components(
            RepositoryConfig::new(0),
            Arc::new(MockCollectionStore::new()),
            Arc::new(MockEmbeddingProvider::new()),
        );
        assert!(matches!(result, Err(VectorError::Config(_))));
    }

    #[test]
    fn test_build_schema_puts_identity_first() {
        let schema = build_schema("docs", &fields(), 768);
        let names: Vec<_> = schema.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["record_id", "user_id", "group_id", "embedding"]);
        assert_eq!(schema.primary_field().unwrap().name, "record_id");
        assert_eq!(
            schema.field("embedding").unwrap().data_type,
            DataType::FloatVector { dim: 768 }
        );
        assert_eq!(
            schema.field("user_id").unwrap().data_type,
            DataType::VarChar { max_length: 256 }
        );
    }

    #[tokio::test]
    async fn test_provision_requires_exactly_one_vector_field() {
        // No store expectations: validation must fail before any store call.
        let repository = repository_on(
            Arc::new(MockCollectionStore::new()),
            MockEmbeddingProvider::new(),
        );

        let none = vec![FieldDeclaration::string("user_id").unwrap()];
        let err = repository.provision("docs", &none, &[]).await.unwrap_err();
        assert!(matches!(err, VectorError::Schema(_)));

        let two = vec![
            FieldDeclaration::vector("a").unwrap(),
            FieldDeclaration::vector("b").unwrap(),
        ];
        let err = repository.provision("docs", &two, &[]).await.unwrap_err();
        assert!(matches!(err, VectorError::Schema(_)));
    }

    #[tokio::test]
    async fn test_provision_rejects_bad_declarations() {
        let repository = repository_on(
            Arc::new(MockCollectionStore::new()),
            MockEmbeddingProvider::new(),
        );

        let mut duplicate = fields();
        duplicate.push(FieldDeclaration::string("user_id").unwrap());
        assert!(matches!(
            repository.provision("docs", &duplicate, &[]).await,
            Err(VectorError::Schema(_))
        ));

        for name in ["record_id", "distance"] {
            let mut reserved = fields();
            reserved.push(FieldDeclaration::string(name).unwrap());
            assert!(matches!(
                repository.provision("docs", &reserved, &[]).await,
                Err(VectorError::Schema(_))
            ));
        }

        let stray_index = [IndexDeclaration::new("color").unwrap()];
        assert!(matches!(
            repository.provision("docs", &fields(), &stray_index).await,
            Err(VectorError::Schema(_))
        ));
    }

    #[tokio::test]
    async fn test_provision_adds_default_vector_index() {
        let (_, store) = provisioned_memory_repository().await;

        let indexes = store.indexes("docs").unwrap();
        assert_eq!(indexes.len(), 2);

        assert_eq!(indexes[0].field_name, "user_id");
        assert_eq!(indexes[0].index_type, "Trie");
        assert_eq!(indexes[0].metric_type, None);

        assert_eq!(indexes[1].field_name, "embedding");
        assert_eq!(indexes[1].index_type, "IVF_FLAT");
        assert_eq!(indexes[1].metric_type, Some(MetricType::Cosine));
        assert_eq!(indexes[1].params["nlist"], json!(DIM));

        assert!(store.is_loaded("docs").unwrap());
    }

    #[tokio::test]
    async fn test_declared_vector_index_replaces_default() {
        let store = Arc::new(MemoryStore::new());
        let repository = repository_on(store.clone(), embedder());
        repository
            .provision(
                "docs",
                &fields(),
                &[IndexDeclaration::with_type("embedding", "HNSW").unwrap()],
            )
            .await
            .unwrap();

        let indexes = store.indexes("docs").unwrap();
        assert_eq!(indexes.len(), 1);
        assert_eq!(indexes[0].index_type, "HNSW");
        assert_eq!(indexes[0].metric_type, Some(MetricType::Cosine));
    }

    #[tokio::test]
    async fn test_reprovision_reuses_cached_handle() {
        let mut store = MockCollectionStore::new();
        store.expect_create_collection().times(1).returning(|_| Ok(()));
        store.expect_create_index().times(2).returning(|_, _| Ok(()));
        store.expect_load_collection().times(2).returning(|_| Ok(()));

        let repository = repository_on(Arc::new(store), MockEmbeddingProvider::new());
        repository.provision("docs", &fields(), &[]).await.unwrap();
        repository.provision("docs", &fields(), &[]).await.unwrap();
    }

    #[tokio::test]
    async fn test_unknown_collection_fails_before_embedding() {
        let repository = repository_on(
            Arc::new(MockCollectionStore::new()),
            MockEmbeddingProvider::new(),
        );

        let err = repository
            .retrieval("missing", "hello", None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, VectorError::UnknownCollection(_)));

        let err = repository
            .insert_single("missing", "hello", &record(json!({"user_id": "a"})))
            .await
            .unwrap_err();
        assert!(matches!(err, VectorError::UnknownCollection(_)));

        assert!(matches!(
            repository.find("missing", None).await,
            Err(VectorError::UnknownCollection(_))
        ));
        assert!(matches!(
            repository.delete("missing", Some("user_id == 'a'")).await,
            Err(VectorError::UnknownCollection(_))
        ));
    }

    #[tokio::test]
    async fn test_insert_mode_shape_mismatch() {
        let (repository, _) = provisioned_memory_repository().await;

        let err = repository
            .insert(
                "docs",
                vec!["a", "b"].into(),
                vec![record(json!({"user_id": "a"}))].into(),
                InsertMode::Single,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, VectorError::Validation(_)));

        let err = repository
            .insert(
                "docs",
                "a".into(),
                record(json!({"user_id": "a"})).into(),
                InsertMode::Batch,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, VectorError::Validation(_)));
    }

    #[tokio::test]
    async fn test_insert_single_returns_caller_data() {
        let (repository, store) = provisioned_memory_repository().await;
        let data = record(json!({"user_id": "a", "group_id": "g1"}));

        let inserted = repository
            .insert("docs", "I like soccer.".into(), data.clone().into(), InsertMode::Single)
            .await
            .unwrap();

        assert_eq!(inserted, OneOrMany::One(data));
        assert_eq!(store.row_count("docs").unwrap(), 1);
    }

    #[tokio::test]
    async fn test_insert_rejects_reserved_keys() {
        let (repository, _) = provisioned_memory_repository().await;

        for reserved in ["record_id", "embedding"] {
            let mut data = record(json!({"user_id": "a", "group_id": "g1"}));
            data.insert(reserved.to_string(), json!("x"));
            let err = repository.insert_single("docs", "t", &data).await.unwrap_err();
            assert!(matches!(err, VectorError::Validation(_)));
        }
    }

    #[tokio::test]
    async fn test_dimension_mismatch_stops_write() {
        let mut embedder = MockEmbeddingProvider::new();
        embedder.expect_embed().returning(|_| Ok(vec![1.0, 2.0]));

        let mut store = MockCollectionStore::new();
        store.expect_create_collection().returning(|_| Ok(()));
        store.expect_create_index().returning(|_, _| Ok(()));
        store.expect_load_collection().returning(|_| Ok(()));
        store.expect_insert().never();

        let repository = repository_on(Arc::new(store), embedder);
        repository.provision("docs", &fields(), &[]).await.unwrap();

        let err = repository
            .insert_single("docs", "text", &record(json!({"user_id": "a", "group_id": "g"})))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            VectorError::DimensionMismatch { expected: 4, got: 2 }
        ));
    }

    #[tokio::test]
    async fn test_batch_insert_validation() {
        let (repository, store) = provisioned_memory_repository().await;

        let err = repository
            .insert_batch("docs", &["only one".to_string()], &[])
            .await
            .unwrap_err();
        assert!(matches!(err, VectorError::Validation(_)));

        let empty = repository.insert_batch("docs", &[], &[]).await.unwrap();
        assert!(empty.is_empty());
        assert_eq!(store.row_count("docs").unwrap(), 0);
    }

    #[tokio::test]
    async fn test_batch_insert_preserves_order_and_assigns_distinct_ids() {
        let (repository, store) = provisioned_memory_repository().await;
        let data = vec![
            record(json!({"user_id": "b", "group_id": "g1"})),
            record(json!({"user_id": "c", "group_id": "g2"})),
            record(json!({"user_id": "d", "group_id": "g1"})),
        ];
        let texts = vec!["one".to_string(), "two".to_string(), "three".to_string()];

        let inserted = repository.insert_batch("docs", &texts, &data).await.unwrap();
        assert_eq!(inserted, data);

        let rows = store.query("docs", "record_id != ''", &[]).unwrap();
        let ids: HashSet<_> = rows.iter().map(|r| r["record_id"].clone()).collect();
        assert_eq!(ids.len(), 3);
    }

    #[tokio::test]
    async fn test_retrieval_uses_config_limit_and_match_all_filter() {
        let mut store = MockCollectionStore::new();
        store.expect_create_collection().returning(|_| Ok(()));
        store.expect_create_index().returning(|_, _| Ok(()));
        store.expect_load_collection().returning(|_| Ok(()));
        store
            .expect_search()
            .withf(|collection, request| {
                collection == "docs"
                    && request.limit == 3
                    && request.filter == "record_id != ''"
                    && request.anns_field == "embedding"
                    && request.output_fields == vec!["user_id".to_string(), "group_id".to_string()]
            })
            .returning(|_, _| {
                Ok(vec![crate::models::SearchHit {
                    distance: 0.9,
                    entity: json!({"record_id": "x", "user_id": "a", "group_id": "g1"})
                        .as_object()
                        .cloned()
                        .unwrap(),
                }])
            });

        let repository = repository_on(Arc::new(store), embedder());
        repository.provision("docs", &fields(), &[]).await.unwrap();

        let results = repository
            .retrieval("docs", "soccer", None, None)
            .await
            .unwrap();
        assert_eq!(results, vec![record(json!({"user_id": "a", "group_id": "g1"}))]);
    }

    #[tokio::test]
    async fn test_retrieval_rejects_zero_limit() {
        let (repository, _) = provisioned_memory_repository().await;
        let err = repository
            .retrieval("docs", "soccer", None, Some(0))
            .await
            .unwrap_err();
        assert!(matches!(err, VectorError::Validation(_)));
    }

    #[tokio::test]
    async fn test_store_unavailable_propagates() {
        let mut store = MockCollectionStore::new();
        store
            .expect_create_collection()
            .returning(|_| Err(VectorError::StoreUnavailable("connection refused".to_string())));

        let repository = repository_on(Arc::new(store), MockEmbeddingProvider::new());
        let err = repository.provision("docs", &fields(), &[]).await.unwrap_err();
        assert!(matches!(err, VectorError::StoreUnavailable(_)));
    }

    #[tokio::test]
    async fn test_clear_collections_evicts_handles() {
        let (repository, store) = provisioned_memory_repository().await;

        let dropped = repository
            .clear_collections(Some(vec!["docs", "never-created"].into()))
            .await
            .unwrap();
        assert_eq!(dropped, vec!["docs".to_string()]);
        assert!(!store.has_collection("docs").unwrap());
        assert!(matches!(
            repository.find("docs", None).await,
            Err(VectorError::UnknownCollection(_))
        ));

        repository.provision("docs", &fields(), &[]).await.unwrap();
        assert!(store.has_collection("docs").unwrap());
    }

    #[tokio::test]
    async fn test_clear_all_collections() {
        let (repository, store) = provisioned_memory_repository().await;
        repository.provision("notes", &fields(), &[]).await.unwrap();

        let mut dropped = repository.clear_collections(None).await.unwrap();
        dropped.sort();
        assert_eq!(dropped, vec!["docs".to_string(), "notes".to_string()]);
        assert!(store.list_collections().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_rejects_blank_filter() {
        let (repository, _) = provisioned_memory_repository().await;
        let err = repository.delete("docs", Some("  ")).await.unwrap_err();
        assert!(matches!(err, VectorError::Validation(_)));
    }

    #[tokio::test]
    async fn test_delete_without_filter_removes_everything() {
        let (repository, store) = provisioned_memory_repository().await;
        let data = vec![
            record(json!({"user_id": "a", "group_id": "g1"})),
            record(json!({"user_id": "b", "group_id": "g2"})),
        ];
        let texts = vec!["one".to_string(), "two".to_string()];
        repository.insert_batch("docs", &texts, &data).await.unwrap();

        let deleted = repository.delete("docs", None).await.unwrap();
        assert_eq!(deleted.len(), 2);
        for item in &data {
            assert!(deleted.contains(item));
        }
        assert_eq!(store.row_count("docs").unwrap(), 0);
        assert!(repository.find("docs", None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_insert_rejects_attribute_mismatch_before_embedding() {
        let mut store = MockCollectionStore::new();
        store.expect_create_collection().returning(|_| Ok(()));
        store.expect_create_index().returning(|_, _| Ok(()));
        store.expect_load_collection().returning(|_| Ok(()));
        store.expect_insert().never();

        let mut embedder = MockEmbeddingProvider::new();
        embedder.expect_embed().never();
        embedder.expect_embed_batch().never();

        let repository = repository_on(Arc::new(store), embedder);
        repository.provision("docs", &fields(), &[]).await.unwrap();

        let missing = record(json!({"user_id": "a"}));
        let err = repository.insert_single("docs", "t", &missing).await.unwrap_err();
        assert!(matches!(err, VectorError::Validation(_)));

        let extra = record(json!({"user_id": "a", "group_id": "g", "color": "red"}));
        let err = repository
            .insert_batch("docs", &["t".to_string()], &[extra])
            .await
            .unwrap_err();
        assert!(matches!(err, VectorError::Validation(_)));
    }

    #[tokio::test]
    async fn test_failed_provision_leaves_collection_unknown() {
        let mut store = MockCollectionStore::new();
        store
            .expect_create_collection()
            .returning(|_| Err(VectorError::Store("quota exceeded".to_string())));

        let repository = repository_on(Arc::new(store), MockEmbeddingProvider::new());
        let err = repository.provision("docs", &fields(), &[]).await.unwrap_err();
        assert!(matches!(err, VectorError::Store(_)));

        assert!(matches!(
            repository.find("docs", None).await,
            Err(VectorError::UnknownCollection(_))
        ));
    }
}
