//! Deterministic in-process backend.
//!
//! Understands just enough of the backend's record conventions for the
//! adapter: `search_read` with conjunctive domains, `create`, `write`, and the
//! move validation action. Failures can be injected per model and operation.

use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use serde_json::{Value as JsonValue, json};

use stockval_core::BackendError;

use crate::backend::transport::{BackendTransport, Condition, Domain, Operator, Record};

/// Kind of call, used to target injected failures.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Operation {
    Version,
    SearchRead,
    Create,
    Write,
    CallMethod,
}

/// A write observed by the backend, in call order.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteLog {
    pub model: String,
    pub ids: Vec<i64>,
    pub values: Record,
}

#[derive(Debug, Default)]
struct State {
    models: HashMap<String, BTreeMap<i64, Record>>,
    next_id: i64,
    writes: Vec<WriteLog>,
    /// Injected failures; the flag marks one-shot entries.
    failures: HashMap<(Operation, String), (BackendError, bool)>,
}

#[derive(Debug)]
pub struct InMemoryBackend {
    version: String,
    inner: RwLock<State>,
}

impl InMemoryBackend {
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            inner: RwLock::new(State {
                next_id: 1,
                ..State::default()
            }),
        }
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, State> {
        self.inner.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_state(&self) -> std::sync::RwLockWriteGuard<'_, State> {
        self.inner.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Seed a record, honoring its `id` when present. Returns the id.
    pub fn insert(&self, model: &str, mut record: Record) -> i64 {
        let mut state = self.write_state();
        let id = match record.get("id").and_then(JsonValue::as_i64) {
            Some(id) => id,
            None => state.next_id,
        };
        state.next_id = state.next_id.max(id + 1);
        record.insert("id".to_string(), json!(id));
        state.models.entry(model.to_string()).or_default().insert(id, record);
        id
    }

    /// Overwrite one field of a seeded record without logging a write.
    pub fn set_field(&self, model: &str, id: i64, field: &str, value: JsonValue) {
        if let Some(row) = self.write_state().models.get_mut(model).and_then(|m| m.get_mut(&id)) {
            row.insert(field.to_string(), value);
        }
    }

    pub fn record(&self, model: &str, id: i64) -> Option<Record> {
        self.read().models.get(model).and_then(|m| m.get(&id)).cloned()
    }

    pub fn records(&self, model: &str) -> Vec<Record> {
        self.read()
            .models
            .get(model)
            .map(|m| m.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Writes received so far.
    pub fn writes(&self) -> Vec<WriteLog> {
        self.read().writes.clone()
    }

    /// Make every subsequent `operation` on `model` fail with `error`.
    pub fn fail_on(&self, operation: Operation, model: &str, error: BackendError) {
        self.write_state()
            .failures
            .insert((operation, model.to_string()), (error, false));
    }

    /// Make only the next `operation` on `model` fail.
    pub fn fail_next(&self, operation: Operation, model: &str, error: BackendError) {
        self.write_state()
            .failures
            .insert((operation, model.to_string()), (error, true));
    }

    pub fn clear_failures(&self) {
        self.write_state().failures.clear();
    }

    fn check(&self, operation: Operation, model: &str) -> Result<(), BackendError> {
        let key = (operation, model.to_string());
        let mut state = self.write_state();
        match state.failures.get(&key) {
            Some((err, true)) => {
                let err = err.clone();
                state.failures.remove(&key);
                Err(err)
            }
            Some((err, false)) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

/// References are stored as `[id, "name"]`; domains compare against the id.
fn comparable(value: &JsonValue) -> &JsonValue {
    match value {
        JsonValue::Array(items) if items.len() == 2 && items[0].is_i64() && items[1].is_string() => &items[0],
        other => other,
    }
}

fn ordering(left: &JsonValue, right: &JsonValue) -> Option<std::cmp::Ordering> {
    match (left, right) {
        (JsonValue::Number(a), JsonValue::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (JsonValue::String(a), JsonValue::String(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

fn loosely_equal(left: &JsonValue, right: &JsonValue) -> bool {
    ordering(left, right).map_or(left == right, |o| o.is_eq())
}

fn matches(record: &Record, condition: &Condition) -> bool {
    let value = comparable(record.get(&condition.field).unwrap_or(&JsonValue::Bool(false)));
    let target = &condition.value;
    use std::cmp::Ordering::*;
    match condition.operator {
        Operator::Eq => loosely_equal(value, target),
        Operator::Ne => !loosely_equal(value, target),
        Operator::In => target
            .as_array()
            .is_some_and(|items| items.iter().any(|t| loosely_equal(value, t))),
        Operator::Gt => ordering(value, target) == Some(Greater),
        Operator::Gte => matches!(ordering(value, target), Some(Greater | Equal)),
        Operator::Lt => ordering(value, target) == Some(Less),
        Operator::Lte => matches!(ordering(value, target), Some(Less | Equal)),
    }
}

#[async_trait::async_trait]
impl BackendTransport for InMemoryBackend {
    async fn server_version(&self) -> Result<String, BackendError> {
        self.check(Operation::Version, "")?;
        Ok(self.version.clone())
    }

    async fn search_read(
        &self,
        model: &str,
        domain: &Domain,
        fields: &[String],
        limit: Option<u32>,
    ) -> Result<Vec<Record>, BackendError> {
        self.check(Operation::SearchRead, model)?;
        let state = self.read();
        let Some(rows) = state.models.get(model) else {
            return Ok(Vec::new());
        };

        let limit = limit.map_or(usize::MAX, |l| l as usize);
        Ok(rows
            .values()
            .filter(|r| domain.conditions().iter().all(|c| matches(r, c)))
            .take(limit)
            .map(|r| {
                let mut projected = Record::new();
                projected.insert("id".to_string(), r["id"].clone());
                for field in fields {
                    // Missing fields read as `false`, like the real backend's empty values.
                    let v = r.get(field).cloned().unwrap_or(JsonValue::Bool(false));
                    projected.insert(field.clone(), v);
                }
                projected
            })
            .collect())
    }

    async fn create(&self, model: &str, values: Record) -> Result<i64, BackendError> {
        self.check(Operation::Create, model)?;
        Ok(self.insert(model, values))
    }

    async fn write(&self, model: &str, ids: &[i64], values: Record) -> Result<(), BackendError> {
        self.check(Operation::Write, model)?;
        let mut state = self.write_state();
        let rows = state.models.entry(model.to_string()).or_default();
        for id in ids {
            let row = rows
                .get_mut(id)
                .ok_or_else(|| BackendError::rpc(format!("{model} {id} does not exist")))?;
            for (k, v) in &values {
                row.insert(k.clone(), v.clone());
            }
        }
        state.writes.push(WriteLog {
            model: model.to_string(),
            ids: ids.to_vec(),
            values,
        });
        Ok(())
    }

    async fn call_method(&self, model: &str, method: &str, ids: &[i64]) -> Result<JsonValue, BackendError> {
        self.check(Operation::CallMethod, model)?;
        match method {
            "_action_done" | "action_done" => {
                let mut state = self.write_state();
                let rows = state.models.entry(model.to_string()).or_default();
                for id in ids {
                    if let Some(row) = rows.get_mut(id) {
                        row.insert("state".to_string(), json!("done"));
                    }
                }
                Ok(json!(ids))
            }
            other => Err(BackendError::rpc(format!("{model} has no method {other}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(value: JsonValue) -> Record {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn search_read_filters_and_projects() {
        let backend = InMemoryBackend::new("17.0");
        backend.insert(
            "stock.move",
            record(json!({"product_id": [7, "Widget"], "state": "done", "date": "2024-01-02 10:00:00"})),
        );
        backend.insert(
            "stock.move",
            record(json!({"product_id": [8, "Gadget"], "state": "done", "date": "2024-01-03 10:00:00"})),
        );
        backend.insert(
            "stock.move",
            record(json!({"product_id": [7, "Widget"], "state": "draft", "date": "2024-01-04 10:00:00"})),
        );

        let domain = Domain::new()
            .field_eq("product_id", 7)
            .field_eq("state", "done")
            .with("date", Operator::Lte, "2024-01-31 00:00:00");
        let rows = backend
            .search_read("stock.move", &domain, &["state".to_string(), "picked".to_string()], None)
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["id"], json!(1));
        assert_eq!(rows[0]["picked"], json!(false));
        assert!(rows[0].get("date").is_none());
    }

    #[tokio::test]
    async fn injected_failures_surface_unchanged() {
        let backend = InMemoryBackend::new("17.0");
        let id = backend.insert("product.product", record(json!({"standard_price": 1.0})));
        backend.fail_on(Operation::Write, "product.product", BackendError::timeout("slow"));

        let err = backend
            .write("product.product", &[id], record(json!({"standard_price": 2.0})))
            .await
            .unwrap_err();
        assert_eq!(err, BackendError::timeout("slow"));
        assert_eq!(backend.record("product.product", id).unwrap()["standard_price"], json!(1.0));
        assert!(backend.writes().is_empty());

        backend.clear_failures();
        backend
            .write("product.product", &[id], record(json!({"standard_price": 2.0})))
            .await
            .unwrap();
        assert_eq!(backend.writes().len(), 1);
    }

    #[tokio::test]
    async fn one_shot_failures_clear_themselves() {
        let backend = InMemoryBackend::new("17.0");
        backend.fail_next(Operation::Create, "stock.move", BackendError::rpc("locked"));
        assert!(backend.create("stock.move", Record::new()).await.is_err());
        assert!(backend.create("stock.move", Record::new()).await.is_ok());
    }

    #[tokio::test]
    async fn action_done_validates_moves() {
        let backend = InMemoryBackend::new("16.0");
        let id = backend
            .create("stock.move", record(json!({"state": "draft"})))
            .await
            .unwrap();
        backend.call_method("stock.move", "_action_done", &[id]).await.unwrap();
        assert_eq!(backend.record("stock.move", id).unwrap()["state"], json!("done"));
    }
}
