//! HTTP client for the backend relay.
//!
//! The relay owns backend authentication and session caching; this client
//! only forwards model calls:
//!
//! - `GET  {base}/api/version`  -> `{"server_version": "17.0"}`
//! - `POST {base}/api/execute`  -> `{"result": ...}` or `{"error": {"message": ...}}`
//!
//! Every request carries the same fixed timeout. Failures are classified
//! into retryable (timeouts, connection errors, 5xx) and permanent ones.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{Value as JsonValue, json};
use tracing::debug;

use stockval_core::BackendError;

use crate::backend::transport::{BackendTransport, Domain, Record};

#[derive(Debug, Serialize)]
struct ExecuteRequest<'a> {
    model: &'a str,
    method: &'a str,
    args: JsonValue,
    kwargs: JsonValue,
}

#[derive(Debug, Deserialize)]
struct ExecuteResponse {
    #[serde(default)]
    result: Option<JsonValue>,
    #[serde(default)]
    error: Option<RelayFault>,
}

#[derive(Debug, Deserialize)]
struct RelayFault {
    message: String,
    #[serde(default)]
    retryable: bool,
}

#[derive(Debug, Deserialize)]
struct VersionResponse {
    server_version: String,
}

#[derive(Debug, Clone)]
pub struct RelayTransport {
    client: Client,
    base_url: String,
}

impl RelayTransport {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, BackendError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BackendError::unreachable(format!("failed to build http client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    async fn execute(&self, model: &str, method: &str, args: JsonValue, kwargs: JsonValue) -> Result<JsonValue, BackendError> {
        let url = format!("{}/api/execute", self.base_url);
        debug!(%model, %method, "relay execute");

        let resp = self
            .client
            .post(&url)
            .json(&ExecuteRequest {
                model,
                method,
                args,
                kwargs,
            })
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(map_status(status, &body));
        }

        let body: ExecuteResponse = resp
            .json()
            .await
            .map_err(|e| BackendError::malformed(format!("{model}.{method}: {e}")))?;

        if let Some(fault) = body.error {
            return Err(BackendError::new(
                stockval_core::BackendErrorKind::Rpc,
                format!("{model}.{method}: {}", fault.message),
                fault.retryable,
            ));
        }

        body.result
            .ok_or_else(|| BackendError::malformed(format!("{model}.{method}: response has no result")))
    }
}

fn map_transport_error(e: reqwest::Error) -> BackendError {
    if e.is_timeout() {
        BackendError::timeout(e.to_string())
    } else if e.is_connect() || e.is_request() {
        BackendError::unreachable(e.to_string())
    } else if e.is_decode() {
        BackendError::malformed(e.to_string())
    } else {
        BackendError::rpc(e.to_string())
    }
}

fn map_status(status: StatusCode, body: &str) -> BackendError {
    let message = format!("relay answered {status}: {body}");
    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        BackendError::new(stockval_core::BackendErrorKind::Rpc, message, true)
    } else {
        BackendError::rpc(message)
    }
}

/// `create` answers a bare id on older backends and `[id]` on newer ones.
fn created_id(result: &JsonValue) -> Option<i64> {
    match result {
        JsonValue::Number(n) => n.as_i64(),
        JsonValue::Array(items) => items.first().and_then(JsonValue::as_i64),
        _ => None,
    }
}

#[async_trait::async_trait]
impl BackendTransport for RelayTransport {
    async fn server_version(&self) -> Result<String, BackendError> {
        let url = format!("{}/api/version", self.base_url);
        let resp = self.client.get(&url).send().await.map_err(map_transport_error)?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(map_status(status, &body));
        }
        let body: VersionResponse = resp
            .json()
            .await
            .map_err(|e| BackendError::malformed(format!("version: {e}")))?;
        Ok(body.server_version)
    }

    async fn search_read(
        &self,
        model: &str,
        domain: &Domain,
        fields: &[String],
        limit: Option<u32>,
    ) -> Result<Vec<Record>, BackendError> {
        let mut kwargs = json!({ "fields": fields });
        if let Some(limit) = limit {
            kwargs["limit"] = json!(limit);
        }
        let result = self
            .execute(model, "search_read", json!([domain.to_json()]), kwargs)
            .await?;

        let JsonValue::Array(rows) = result else {
            return Err(BackendError::malformed(format!("{model}.search_read: expected a list")));
        };
        rows.into_iter()
            .map(|row| match row {
                JsonValue::Object(record) => Ok(record),
                other => Err(BackendError::malformed(format!(
                    "{model}.search_read: expected objects, got {other}"
                ))),
            })
            .collect()
    }

    async fn create(&self, model: &str, values: Record) -> Result<i64, BackendError> {
        let result = self
            .execute(model, "create", json!([values]), json!({}))
            .await?;
        created_id(&result)
            .ok_or_else(|| BackendError::malformed(format!("{model}.create: no id in {result}")))
    }

    async fn write(&self, model: &str, ids: &[i64], values: Record) -> Result<(), BackendError> {
        let result = self
            .execute(model, "write", json!([ids, values]), json!({}))
            .await?;
        match result {
            JsonValue::Bool(true) => Ok(()),
            other => Err(BackendError::rpc(format!("{model}.write refused: {other}"))),
        }
    }

    async fn call_method(&self, model: &str, method: &str, ids: &[i64]) -> Result<JsonValue, BackendError> {
        self.execute(model, method, json!([ids]), json!({})).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn created_id_accepts_both_shapes() {
        assert_eq!(created_id(&json!(42)), Some(42));
        assert_eq!(created_id(&json!([43])), Some(43));
        assert_eq!(created_id(&json!("x")), None);
    }

    #[test]
    fn server_errors_are_retryable() {
        assert!(map_status(StatusCode::BAD_GATEWAY, "").retryable);
        assert!(map_status(StatusCode::TOO_MANY_REQUESTS, "").retryable);
        assert!(!map_status(StatusCode::BAD_REQUEST, "bad domain").retryable);
    }

    #[tokio::test]
    async fn unreachable_relay_is_a_retryable_backend_error() {
        // Port 9 (discard) on localhost is not expected to accept HTTP.
        let relay = RelayTransport::new("http://127.0.0.1:9/", Duration::from_millis(500)).unwrap();
        let err = relay.server_version().await.unwrap_err();
        assert!(err.retryable, "{err:?}");
    }

    #[test]
    fn trailing_slash_is_trimmed() {
        let relay = RelayTransport::new("http://relay.local/", Duration::from_secs(1)).unwrap();
        assert_eq!(relay.base_url, "http://relay.local");
    }
}
