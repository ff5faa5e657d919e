//! Business data access behind the built-in tools.
//!
//! The tools speak a tiny record-oriented protocol: find ids with a domain
//! filter, read fields of those ids, write values, create a record. Records
//! are JSON objects. Relational (many-to-one) fields are `[id, "display name"]`
//! pairs, or `false` when unset.

pub mod jsonrpc;
pub mod memory;

use async_trait::async_trait;
use serde_json::{Map, Value};

pub use jsonrpc::JsonRpcBackend;
pub use memory::InMemoryBackend;

/// A record as returned by [`DataBackend::read`].
pub type Record = Map<String, Value>;

/// One term of a search domain. Terms are ANDed.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// Field equals value. For relational fields, compares the id.
    Eq(String, Value),
    /// Case-insensitive substring match on a text field.
    ILike(String, String),
    /// Numeric field strictly greater than value.
    Gt(String, f64),
}

impl Condition {
    pub fn eq(field: &str, value: impl Into<Value>) -> Self {
        Self::Eq(field.to_string(), value.into())
    }

    pub fn ilike(field: &str, pattern: &str) -> Self {
        Self::ILike(field.to_string(), pattern.to_string())
    }

    pub fn gt(field: &str, value: f64) -> Self {
        Self::Gt(field.to_string(), value)
    }

    /// Wire form: `[field, operator, value]`.
    pub fn to_domain_term(&self) -> Value {
        match self {
            Self::Eq(f, v) => serde_json::json!([f, "=", v]),
            Self::ILike(f, p) => serde_json::json!([f, "ilike", p]),
            Self::Gt(f, v) => serde_json::json!([f, ">", v]),
        }
    }
}

/// Backend errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum BackendError {
    #[error("Unknown model: {0}")]
    UnknownModel(String),

    #[error("Record {model}({id}) does not exist")]
    MissingRecord { model: String, id: i64 },

    #[error("Backend misconfigured: {0}")]
    Misconfigured(String),

    #[error("Backend authentication failed: {0}")]
    Authentication(String),

    #[error("Backend call failed: {0}")]
    Remote(String),

    #[error("Backend unreachable: {0}")]
    Transport(String),
}

/// Record store the tools read from and write to.
///
/// Implementations may be shared across concurrent turns; no locking is added
/// on top of whatever the store itself provides.
#[async_trait]
pub trait DataBackend: Send + Sync {
    /// Ids of records of `model` matching every condition, in store order.
    async fn search(
        &self,
        model: &str,
        domain: &[Condition],
        limit: Option<usize>,
    ) -> Result<Vec<i64>, BackendError>;

    /// Read `fields` (all fields when empty) of the given ids. Ids that do not
    /// exist are skipped.
    async fn read(&self, model: &str, ids: &[i64], fields: &[&str]) -> Result<Vec<Record>, BackendError>;

    /// Update one record.
    async fn write(&self, model: &str, id: i64, values: Record) -> Result<(), BackendError>;

    /// Create a record and return its id.
    async fn create(&self, model: &str, values: Record) -> Result<i64, BackendError>;

    /// Search then read.
    async fn search_read(
        &self,
        model: &str,
        domain: &[Condition],
        fields: &[&str],
        limit: Option<usize>,
    ) -> Result<Vec<Record>, BackendError> {
        let ids = self.search(model, domain, limit).await?;
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        self.read(model, &ids, fields).await
    }
}
