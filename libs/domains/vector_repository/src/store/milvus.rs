//! Milvus REST v2 store.
//!
//! Talks to `/v2/vectordb/...` over HTTP with a blocking client. Every
//! response is wrapped as `{code, data, message}`; `code == 0` is success.

use std::sync::OnceLock;
use std::time::Duration;

use reqwest::blocking::Client;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::{debug, info};

use super::CollectionStore;
use crate::config::MilvusConfig;
use crate::error::{VectorError, VectorResult};
use crate::models::{
    CollectionSchema, DISTANCE_FIELD, DataType, IndexSpec, Record, SearchHit, SearchRequest,
};

const CONSISTENCY_LEVEL: &str = "Strong";

/// Milvus REST API response wrapper
#[derive(Debug, Deserialize)]
struct MilvusResponse<T> {
    code: i32,
    data: Option<T>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct HasCollection {
    has: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InsertResult {
    insert_count: usize,
}

pub struct MilvusStore {
    config: MilvusConfig,
    base_url: String,
    client: OnceLock<Client>,
}

impl MilvusStore {
    pub fn new(config: MilvusConfig) -> Self {
        let base_url = config.base_url();
        Self {
            config,
            base_url,
            client: OnceLock::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Blocking client, built on the first call. Must run off the async runtime.
    fn http(&self) -> VectorResult<&Client> {
        if let Some(client) = self.client.get() {
            return Ok(client);
        }

        debug!(base_url = %self.base_url, "Building Milvus HTTP client");
        let client = Client::builder()
            .timeout(Duration::from_secs(self.config.timeout_secs))
            .build()
            .map_err(|e| VectorError::StoreUnavailable(e.to_string()))?;

        Ok(self.client.get_or_init(|| client))
    }

    fn post<T: DeserializeOwned>(&self, path: &str, body: &Value) -> VectorResult<Option<T>> {
        let url = format!("{}/v2/vectordb/{}", self.base_url, path);

        let response = self
            .http()?
            .post(&url)
            .json(body)
            .send()
            .map_err(|e| VectorError::StoreUnavailable(format!("{}: {}", url, e)))?;

        let status = response.status();
        let text = response
            .text()
            .map_err(|e| VectorError::StoreUnavailable(format!("{}: {}", url, e)))?;

        if !status.is_success() {
            return Err(VectorError::Store(format!("{} returned HTTP {}: {}", path, status, text)));
        }

        let parsed: MilvusResponse<T> = serde_json::from_str(&text).map_err(|e| {
            VectorError::Store(format!("unexpected response from {}: {}", path, e))
        })?;

        if parsed.code != 0 {
            return Err(VectorError::Store(format!(
                "{} failed with code {}: {}",
                path,
                parsed.code,
                parsed.message.unwrap_or_else(|| "Unknown error".to_string())
            )));
        }

        Ok(parsed.data)
    }

    fn call(&self, path: &str, body: &Value) -> VectorResult<()> {
        self.post::<Value>(path, body).map(|_| ())
    }
}

/// Schema body for `collections/create`
fn schema_body(schema: &CollectionSchema) -> Value {
    let fields: Vec<Value> = schema
        .fields
        .iter()
        .map(|field| {
            let params = match &field.data_type {
                DataType::VarChar { max_length } => json!({"max_length": max_length}),
                DataType::FloatVector { dim } => json!({"dim": dim.to_string()}),
            };
            json!({
                "fieldName": field.name,
                "dataType": field.data_type.as_str(),
                "isPrimary": field.is_primary,
                "elementTypeParams": params,
            })
        })
        .collect();

    json!({
        "collectionName": schema.name,
        "schema": {
            "autoId": false,
            "enableDynamicField": false,
            "fields": fields,
        },
    })
}

fn index_body(collection: &str, index: &IndexSpec) -> Value {
    let mut params = json!({
        "fieldName": index.field_name,
        "indexName": index.field_name,
        "indexType": index.index_type,
        "params": index.params,
    });
    if let Some(metric) = index.metric_type {
        params["metricType"] = json!(metric);
    }

    json!({
        "collectionName": collection,
        "indexParams": [params],
    })
}

fn search_body(collection: &str, request: &SearchRequest) -> Value {
    json!({
        "collectionName": collection,
        "data": [request.vector],
        "annsField": request.anns_field,
        "filter": request.filter,
        "limit": request.limit,
        "outputFields": request.output_fields,
        "searchParams": {
            "metricType": request.metric_type,
            "params": request.params,
        },
        "consistencyLevel": CONSISTENCY_LEVEL,
    })
}

/// Split the `distance` Milvus mixes into each hit from the entity fields
fn into_hit(mut entity: Record) -> SearchHit {
    let distance = entity
        .remove(DISTANCE_FIELD)
        .and_then(|v| v.as_f64())
        .unwrap_or_default() as f32;
    SearchHit { distance, entity }
}

impl CollectionStore for MilvusStore {
    fn has_collection(&self, name: &str) -> VectorResult<bool> {
        let data: Option<HasCollection> =
            self.post("collections/has", &json!({"collectionName": name}))?;
        Ok(data.is_some_and(|d| d.has))
    }

    fn list_collections(&self) -> VectorResult<Vec<String>> {
        let data: Option<Vec<String>> = self.post("collections/list", &json!({}))?;
        Ok(data.unwrap_or_default())
    }

    fn create_collection(&self, schema: &CollectionSchema) -> VectorResult<()> {
        if self.has_collection(&schema.name)? {
            debug!(collection = %schema.name, "Collection already exists");
            return Ok(());
        }

        self.call("collections/create", &schema_body(schema))?;
        info!(collection = %schema.name, "Created Milvus collection");
        Ok(())
    }

    fn drop_collection(&self, name: &str) -> VectorResult<()> {
        self.call("collections/drop", &json!({"collectionName": name}))?;
        info!(collection = %name, "Dropped Milvus collection");
        Ok(())
    }

    fn create_index(&self, collection: &str, index: &IndexSpec) -> VectorResult<()> {
        self.call("indexes/create", &index_body(collection, index))?;
        debug!(
            collection = %collection,
            field = %index.field_name,
            index_type = %index.index_type,
            "Created index"
        );
        Ok(())
    }

    fn load_collection(&self, name: &str) -> VectorResult<()> {
        self.call("collections/load", &json!({"collectionName": name}))
    }

    fn insert(&self, collection: &str, records: Vec<Record>) -> VectorResult<usize> {
        let sent = records.len();
        let data: Option<InsertResult> = self.post(
            "entities/insert",
            &json!({"collectionName": collection, "data": records}),
        )?;

        let count = data.map(|d| d.insert_count).unwrap_or(sent);
        info!(collection = %collection, count, "Inserted entities");
        Ok(count)
    }

    fn flush(&self, collection: &str) -> VectorResult<()> {
        self.call("collections/flush", &json!({"collectionName": collection}))
    }

    fn query(
        &self,
        collection: &str,
        filter: &str,
        output_fields: &[String],
    ) -> VectorResult<Vec<Record>> {
        let data: Option<Vec<Record>> = self.post(
            "entities/query",
            &json!({
                "collectionName": collection,
                "filter": filter,
                "outputFields": output_fields,
                "limit": self.config.query_limit,
                "consistencyLevel": CONSISTENCY_LEVEL,
            }),
        )?;

        let rows = data.unwrap_or_default();
        debug!(collection = %collection, rows = rows.len(), "Query finished");
        Ok(rows)
    }

    fn search(&self, collection: &str, request: &SearchRequest) -> VectorResult<Vec<SearchHit>> {
        let data: Option<Vec<Record>> =
            self.post("entities/search", &search_body(collection, request))?;

        let hits: Vec<SearchHit> = data.unwrap_or_default().into_iter().map(into_hit).collect();
        debug!(collection = %collection, hits = hits.len(), "Search finished");
        Ok(hits)
    }

    fn delete(&self, collection: &str, filter: &str) -> VectorResult<()> {
        self.call(
            "entities/delete",
            &json!({"collectionName": collection, "filter": filter}),
        )?;
        info!(collection = %collection, filter = %filter, "Deleted entities");
        Ok(())
    }
}
