//! Repository configuration.
//!
//! Every setting has a builder method and an environment variable. Only the
//! embedding dimension is required; everything else falls back to the
//! defaults below.

use std::env;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{VectorError, VectorResult};

pub const DEFAULT_MILVUS_HOST: &str = "127.0.0.1";
pub const DEFAULT_MILVUS_PORT: u16 = 19530;
pub const DEFAULT_EMBEDDING_HOST: &str = "127.0.0.1";
pub const DEFAULT_EMBEDDING_PORT: u16 = 7777;
pub const DEFAULT_EMBEDDING_PATH: &str = "/api/v1/embedding";
pub const DEFAULT_INDEX_TYPE: &str = "IVF_FLAT";
pub const DEFAULT_RETRIEVAL_LIMIT: u32 = 3;
/// Largest result window a Milvus query accepts.
pub const DEFAULT_QUERY_LIMIT: u32 = 16384;

/// Trait for configuration that can be loaded from environment variables
pub trait FromEnv: Sized {
    fn from_env() -> VectorResult<Self>;
}

/// Read an environment variable, falling back to `default` when unset
pub fn env_or_default(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Read an environment variable or fail with a configuration error
pub fn env_required(key: &str) -> VectorResult<String> {
    env::var(key).map_err(|_| {
        VectorError::Config(format!(
            "Environment variable '{}' is required but not set",
            key
        ))
    })
}

/// Parse an optional environment variable, using `default` when unset
pub fn env_parse<T>(key: &str, default: T) -> VectorResult<T>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    match env::var(key) {
        Ok(raw) => parse_value(key, &raw),
        Err(_) => Ok(default),
    }
}

fn parse_value<T>(key: &str, raw: &str) -> VectorResult<T>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    raw.trim().parse::<T>().map_err(|e| {
        VectorError::Config(format!(
            "Failed to parse environment variable '{}': {}",
            key, e
        ))
    })
}

/// Similarity metric used for vector indexes and searches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MetricType {
    #[default]
    Cosine,
    L2,
    Ip,
}

impl MetricType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricType::Cosine => "COSINE",
            MetricType::L2 => "L2",
            MetricType::Ip => "IP",
        }
    }

    /// Whether larger scores mean closer vectors
    pub fn higher_is_closer(&self) -> bool {
        !matches!(self, MetricType::L2)
    }
}

impl fmt::Display for MetricType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MetricType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "COSINE" => Ok(MetricType::Cosine),
            "L2" => Ok(MetricType::L2),
            "IP" => Ok(MetricType::Ip),
            other => Err(format!("unknown metric type '{}'", other)),
        }
    }
}

/// Milvus connection settings
#[derive(Debug, Clone)]
pub struct MilvusConfig {
    pub host: String,
    pub port: u16,
    pub timeout_secs: u64,
    pub query_limit: u32,
}

impl MilvusConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Self::default()
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    pub fn with_query_limit(mut self, limit: u32) -> Self {
        self.query_limit = limit;
        self
    }

    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

impl Default for MilvusConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_MILVUS_HOST.to_string(),
            port: DEFAULT_MILVUS_PORT,
            timeout_secs: 30,
            query_limit: DEFAULT_QUERY_LIMIT,
        }
    }
}

impl FromEnv for MilvusConfig {
    fn from_env() -> VectorResult<Self> {
        Ok(Self {
            host: env_or_default("MILVUS_HOST", DEFAULT_MILVUS_HOST),
            port: env_parse("MILVUS_PORT", DEFAULT_MILVUS_PORT)?,
            timeout_secs: env_parse("MILVUS_TIMEOUT_SECS", 30)?,
            query_limit: env_parse("MILVUS_QUERY_LIMIT", DEFAULT_QUERY_LIMIT)?,
        })
    }
}

/// Embedding service settings
#[derive(Debug, Clone)]
pub struct EmbeddingConfig {
    pub host: String,
    pub port: u16,
    pub path: String,
    pub timeout_secs: u64,
}

impl EmbeddingConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Self::default()
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    pub fn endpoint(&self) -> String {
        format!("http://{}:{}{}", self.host, self.port, self.path)
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_EMBEDDING_HOST.to_string(),
            port: DEFAULT_EMBEDDING_PORT,
            path: DEFAULT_EMBEDDING_PATH.to_string(),
            timeout_secs: 60,
        }
    }
}

impl FromEnv for EmbeddingConfig {
    fn from_env() -> VectorResult<Self> {
        Ok(Self {
            host: env_or_default("EMBEDDING_SERVER_HOST", DEFAULT_EMBEDDING_HOST),
            port: env_parse("EMBEDDING_SERVER_PORT", DEFAULT_EMBEDDING_PORT)?,
            path: DEFAULT_EMBEDDING_PATH.to_string(),
            timeout_secs: env_parse("EMBEDDING_TIMEOUT_SECS", 60)?,
        })
    }
}

/// Top-level configuration consumed by [`crate::VectorRepository`]
#[derive(Debug, Clone)]
pub struct RepositoryConfig {
    pub embedding_dimension: u32,
    pub milvus: MilvusConfig,
    pub metric_type: MetricType,
    pub index_type: String,
    pub limit: u32,
    pub embedding: EmbeddingConfig,
}

impl RepositoryConfig {
    pub fn new(embedding_dimension: u32) -> Self {
        Self {
            embedding_dimension,
            milvus: MilvusConfig::default(),
            metric_type: MetricType::default(),
            index_type: DEFAULT_INDEX_TYPE.to_string(),
            limit: DEFAULT_RETRIEVAL_LIMIT,
            embedding: EmbeddingConfig::default(),
        }
    }

    pub fn with_milvus(mut self, milvus: MilvusConfig) -> Self {
        self.milvus = milvus;
        self
    }

    pub fn with_metric_type(mut self, metric_type: MetricType) -> Self {
        self.metric_type = metric_type;
        self
    }

    pub fn with_index_type(mut self, index_type: impl Into<String>) -> Self {
        self.index_type = index_type.into();
        self
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_embedding(mut self, embedding: EmbeddingConfig) -> Self {
        self.embedding = embedding;
        self
    }

    pub fn validate(&self) -> VectorResult<()> {
        if self.embedding_dimension == 0 {
            return Err(VectorError::Config(
                "embedding dimension must be positive".to_string(),
            ));
        }
        if self.limit == 0 {
            return Err(VectorError::Config(
                "retrieval limit must be positive".to_string(),
            ));
        }
        if self.index_type.trim().is_empty() {
            return Err(VectorError::Config("index type must not be empty".to_string()));
        }
        Ok(())
    }
}

impl FromEnv for RepositoryConfig {
    /// Requires EMBEDDING_DIMENSION to be set (no default)
    fn from_env() -> VectorResult<Self> {
        let embedding_dimension = parse_value(
            "EMBEDDING_DIMENSION",
            &env_required("EMBEDDING_DIMENSION")?,
        )?;

        let config = Self {
            embedding_dimension,
            milvus: MilvusConfig::from_env()?,
            metric_type: env_parse("MILVUS_METRIC_TYPE", MetricType::default())?,
            index_type: env_or_default("MILVUS_INDEX_TYPE", DEFAULT_INDEX_TYPE),
            limit: env_parse("RETRIEVAL_LIMIT", DEFAULT_RETRIEVAL_LIMIT)?,
            embedding: EmbeddingConfig::from_env()?,
        };
        config.validate()?;
        Ok(config)
    }
}

/// Runtime environment, selected by `APP_ENV`
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    pub fn from_env() -> Self {
        let app_env = env_or_default("APP_ENV", "development");

        if app_env.eq_ignore_ascii_case("production") {
            Environment::Production
        } else {
            Environment::Development
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }
}
