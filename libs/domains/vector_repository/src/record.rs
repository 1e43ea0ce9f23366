//! Identity handling for stored records.
//!
//! Every record in the store carries a generated primary key under
//! [`IDENTITY_FIELD`]. Callers never see it: it is added on the way in and
//! removed (together with the embedding) on the way out. All helpers here
//! return new records and leave their input untouched.

use rand::Rng;
use serde_json::Value;

use crate::models::Record;

pub const IDENTITY_FIELD: &str = "record_id";
pub const IDENTITY_LENGTH: usize = 50;
/// Width of the primary-key column; leaves headroom over [`IDENTITY_LENGTH`].
pub const IDENTITY_MAX_LENGTH: u32 = 64;

const IDENTITY_CHARSET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Random `[0-9a-z]{50}` token.
///
/// Uniqueness is probabilistic (36^50 possibilities); nothing checks the
/// store for collisions.
pub fn generate_record_id() -> String {
    let mut rng = rand::rng();
    (0..IDENTITY_LENGTH)
        .map(|_| IDENTITY_CHARSET[rng.random_range(0..IDENTITY_CHARSET.len())] as char)
        .collect()
}

/// Filter expression matching every stored record
pub fn match_all_filter() -> String {
    format!("{} != ''", IDENTITY_FIELD)
}

/// Copy of `data` with the identity and embedding attached, ready for the store
pub fn with_identity(data: &Record, record_id: String, vector_field: &str, embedding: &[f32]) -> Record {
    let mut stored = data.clone();
    stored.insert(IDENTITY_FIELD.to_string(), Value::String(record_id));
    stored.insert(
        vector_field.to_string(),
        Value::Array(embedding.iter().map(|v| Value::from(*v)).collect()),
    );
    stored
}

/// Copy of `record` without the identity and embedding
pub fn strip_internal(record: &Record, vector_field: &str) -> Record {
    record
        .iter()
        .filter(|(key, _)| key.as_str() != IDENTITY_FIELD && key.as_str() != vector_field)
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

/// Copy of `record` restricted to `fields`, in the order the record holds them
pub fn project(record: &Record, fields: &[String]) -> Record {
    record
        .iter()
        .filter(|(key, _)| fields.iter().any(|f| f == *key))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}
