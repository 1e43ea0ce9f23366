//! Vector Repository Domain Library
//!
//! CRUD-style access to Milvus collections where every record is indexed by
//! the embedding of a piece of text. Callers declare fields, insert
//! `(text, attributes)` pairs, and read records back by filter expression or
//! by semantic similarity to a query text.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐
//! │ VectorRepository │  ← provision / find / insert / delete / retrieval
//! └───┬──────────┬───┘
//!     │          │
//!     │   ┌──────▼────────────┐
//!     │   │ EmbeddingProvider │  ← text → vector (async)
//!     │   │ (EmbeddingClient) │
//!     │   └───────────────────┘
//!     │
//! ┌───▼──────────────┐
//! │ CollectionStore  │  ← blocking, run via spawn_blocking
//! │   (trait)        │
//! └───┬──────────┬───┘
//!     │          │
//! ┌───▼────────┐ ┌▼────────────┐
//! │ MilvusStore│ │ MemoryStore │
//! │ (REST v2)  │ │ (in-process)│
//! └────────────┘ └─────────────┘
//! ```
//!
//! Each stored record carries a generated `record_id` primary key and its
//! embedding. Neither is ever returned to callers.
//!
//! # Usage
//!
//! ```rust,no_run
//! use domain_vector_repository::{
//!     FieldDeclaration, FromEnv, IndexDeclaration, InsertMode, RepositoryConfig,
//!     VectorRepository,
//! };
//! use serde_json::json;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let repository = VectorRepository::new(RepositoryConfig::from_env()?)?;
//!
//! repository
//!     .provision(
//!         "preferences",
//!         &[
//!             FieldDeclaration::string("user_id")?,
//!             FieldDeclaration::string("group_id")?,
//!             FieldDeclaration::vector("embedding")?,
//!         ],
//!         &[IndexDeclaration::new("user_id")?],
//!     )
//!     .await?;
//!
//! let data = json!({"user_id": "a", "group_id": "g1"});
//! let data = data.as_object().cloned().unwrap_or_default();
//! repository
//!     .insert("preferences", "I like soccer.".into(), data.into(), InsertMode::Single)
//!     .await?;
//!
//! let similar = repository
//!     .retrieval("preferences", "football", Some("group_id == 'g1'"), None)
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod embedding;
pub mod error;
pub mod fields;
pub mod metadata;
pub mod models;
pub mod record;
pub mod repository;
pub mod store;
pub mod telemetry;

// Re-export commonly used types
pub use config::{
    EmbeddingConfig, Environment, FromEnv, MetricType, MilvusConfig, RepositoryConfig,
};
pub use embedding::{EmbeddingClient, EmbeddingProvider};
pub use error::{VectorError, VectorResult};
pub use fields::{FieldDeclaration, IndexDeclaration};
pub use metadata::{CollectionMetadata, MetadataRegistry};
pub use models::{InsertMode, OneOrMany, Record};
pub use repository::VectorRepository;
pub use store::{CollectionStore, MemoryStore, MilvusStore};
pub use telemetry::init_tracing;
