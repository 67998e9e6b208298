//! Raw transport to the ERP backend.
//!
//! Everything behind this trait speaks the backend's untyped record format
//! (JSON objects, `false` for empty values, `[id, "name"]` for references).
//! Only the version adapter consumes it.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue, json};

use stockval_core::BackendError;

/// One backend record as returned by `search_read`.
pub type Record = Map<String, JsonValue>;

/// Comparison operator of a domain condition.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operator {
    Eq,
    Ne,
    In,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl Operator {
    pub fn as_str(self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::Ne => "!=",
            Operator::In => "in",
            Operator::Gt => ">",
            Operator::Gte => ">=",
            Operator::Lt => "<",
            Operator::Lte => "<=",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub field: String,
    pub operator: Operator,
    pub value: JsonValue,
}

/// Conjunction of conditions (the backend's search domain).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Domain {
    conditions: Vec<Condition>,
}

impl Domain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, field: impl Into<String>, operator: Operator, value: impl Into<JsonValue>) -> Self {
        self.conditions.push(Condition {
            field: field.into(),
            operator,
            value: value.into(),
        });
        self
    }

    pub fn field_eq(self, field: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.with(field, Operator::Eq, value)
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    /// Wire form: `[[field, op, value], ...]`.
    pub fn to_json(&self) -> JsonValue {
        JsonValue::Array(
            self.conditions
                .iter()
                .map(|c| json!([c.field, c.operator.as_str(), c.value]))
                .collect(),
        )
    }
}

/// Async access to backend models.
///
/// Implementations must map every failure to a [`BackendError`] with an
/// accurate `retryable` flag and must not retry internally.
#[async_trait::async_trait]
pub trait BackendTransport: Send + Sync {
    /// Backend server version string, e.g. `"17.0"` or `"saas~17.2"`.
    async fn server_version(&self) -> Result<String, BackendError>;

    async fn search_read(
        &self,
        model: &str,
        domain: &Domain,
        fields: &[String],
        limit: Option<u32>,
    ) -> Result<Vec<Record>, BackendError>;

    /// Create one record and return its id.
    async fn create(&self, model: &str, values: Record) -> Result<i64, BackendError>;

    async fn write(&self, model: &str, ids: &[i64], values: Record) -> Result<(), BackendError>;

    /// Invoke a model method on `ids` (workflow actions such as validating a move).
    async fn call_method(&self, model: &str, method: &str, ids: &[i64]) -> Result<JsonValue, BackendError>;
}

#[async_trait::async_trait]
impl<T> BackendTransport for Arc<T>
where
    T: BackendTransport + ?Sized,
{
    async fn server_version(&self) -> Result<String, BackendError> {
        (**self).server_version().await
    }

    async fn search_read(
        &self,
        model: &str,
        domain: &Domain,
        fields: &[String],
        limit: Option<u32>,
    ) -> Result<Vec<Record>, BackendError> {
        (**self).search_read(model, domain, fields, limit).await
    }

    async fn create(&self, model: &str, values: Record) -> Result<i64, BackendError> {
        (**self).create(model, values).await
    }

    async fn write(&self, model: &str, ids: &[i64], values: Record) -> Result<(), BackendError> {
        (**self).write(model, ids, values).await
    }

    async fn call_method(&self, model: &str, method: &str, ids: &[i64]) -> Result<JsonValue, BackendError> {
        (**self).call_method(model, method, ids).await
    }
}
