//! REST calls for configuration records.
//!
//! Reads (`get_config`, `list`) go through the retry policy. Writes are sent
//! exactly once.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info};
use tradedesk_core::{validation, ConfigRecord, ResourceKind, ValidationErrors};

use crate::error::{field_errors_from_body, ApiError};
use crate::retry::RetryPolicy;
use crate::transport::{ApiRequest, ApiResponse, Transport};

/// Result of a server-side dry-run validation.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckReport {
    pub valid: bool,
    pub message: Option<String>,
    pub field_errors: ValidationErrors,
}

#[derive(Clone)]
pub struct ConfigApi {
    transport: Arc<dyn Transport>,
    retry: RetryPolicy,
}

impl ConfigApi {
    pub fn new(transport: Arc<dyn Transport>, retry: RetryPolicy) -> Self {
        Self { transport, retry }
    }

    /// `GET /{collection}/{id}/config`.
    pub fn get_config(&self, kind: ResourceKind, owner_id: &str) -> Result<ConfigRecord, ApiError> {
        let request = ApiRequest::get(kind.config_path(owner_id));
        let body = self.retry.run(&request.path, || self.expect_body(&request))?;
        Ok(ConfigRecord::from_json(kind, with_owner(kind, owner_id, body))?)
    }

    /// `POST /{collection}/{id}/config`.
    pub fn create_config(&self, kind: ResourceKind, record: &ConfigRecord) -> Result<ConfigRecord, ApiError> {
        let request = ApiRequest::post(kind.config_path(&record.owner_id), record.request_body(kind));
        let body = self.expect_body(&request)?;
        info!(%kind, owner = %record.owner_id, "configuration created");
        Ok(ConfigRecord::from_json(kind, with_owner(kind, &record.owner_id, body))?)
    }

    /// `PUT /{collection}/{id}/config`.
    pub fn update_config(&self, kind: ResourceKind, record: &ConfigRecord) -> Result<ConfigRecord, ApiError> {
        let request = ApiRequest::put(kind.config_path(&record.owner_id), record.request_body(kind));
        let body = self.expect_body(&request)?;
        info!(%kind, owner = %record.owner_id, "configuration updated");
        Ok(ConfigRecord::from_json(kind, with_owner(kind, &record.owner_id, body))?)
    }

    /// `DELETE /{collection}/{id}/config`.
    pub fn delete_config(&self, kind: ResourceKind, owner_id: &str) -> Result<(), ApiError> {
        let request = ApiRequest::delete(kind.config_path(owner_id));
        self.send_checked(&request)?;
        info!(%kind, owner = %owner_id, "configuration deleted");
        Ok(())
    }

    /// `GET /{collection}`. Items are keyed by the owner field, or `id`.
    pub fn list(&self, kind: ResourceKind) -> Result<Vec<ConfigRecord>, ApiError> {
        let request = ApiRequest::get(kind.collection_path());
        let body = self.retry.run(&request.path, || self.expect_body(&request))?;
        let items = match body {
            Value::Array(items) => items,
            Value::Object(mut map) => match map.remove("content").or_else(|| map.remove("items")) {
                Some(Value::Array(items)) => items,
                _ => return Err(ApiError::Decode(tradedesk_core::RecordError::NotAnObject)),
            },
            _ => return Err(ApiError::Decode(tradedesk_core::RecordError::NotAnObject)),
        };
        debug!(%kind, count = items.len(), "list fetched");

        items
            .into_iter()
            .map(|item| {
                let item = promote_id(kind, item);
                ConfigRecord::from_json(kind, item).map_err(ApiError::from)
            })
            .collect()
    }

    /// Server-side dry-run validation. A 400 is a report, not an error.
    pub fn check_config(&self, kind: ResourceKind, record: &ConfigRecord) -> Result<CheckReport, ApiError> {
        let path = kind
            .check_path(&record.owner_id)
            .ok_or(ApiError::Unsupported(kind))?;
        let response = self.send(&ApiRequest::post(path, record.request_body(kind)))?;

        let message = response
            .body
            .as_ref()
            .and_then(|b| b.get("message"))
            .and_then(Value::as_str)
            .map(str::to_string);

        match response.status {
            200..=299 => {
                let valid = response
                    .body
                    .as_ref()
                    .and_then(|b| match b {
                        Value::Bool(v) => Some(*v),
                        other => other.get("valid").and_then(Value::as_bool),
                    })
                    .unwrap_or(true);
                Ok(CheckReport {
                    valid,
                    message,
                    field_errors: ValidationErrors::new(),
                })
            }
            400 => Ok(CheckReport {
                valid: false,
                message,
                field_errors: response
                    .body
                    .as_ref()
                    .map(field_errors_from_body)
                    .unwrap_or_default(),
            }),
            status => Err(ApiError::Status {
                status,
                body: response.body,
            }),
        }
    }

    /// Local and server checks combined: local rule failures first.
    pub fn check_locally_then_remote(
        &self,
        kind: ResourceKind,
        record: &ConfigRecord,
    ) -> Result<CheckReport, ApiError> {
        let local = validation::validate(record, kind.rules());
        if !local.is_empty() || kind.check_path(&record.owner_id).is_none() {
            return Ok(CheckReport {
                valid: local.is_empty(),
                message: None,
                field_errors: local,
            });
        }
        self.check_config(kind, record)
    }

    fn send(&self, request: &ApiRequest) -> Result<ApiResponse, ApiError> {
        debug!(method = %request.method, path = %request.path, "request");
        Ok(self.transport.send(request)?)
    }

    fn send_checked(&self, request: &ApiRequest) -> Result<ApiResponse, ApiError> {
        let response = self.send(request)?;
        if response.is_success() {
            Ok(response)
        } else {
            Err(ApiError::Status {
                status: response.status,
                body: response.body,
            })
        }
    }

    fn expect_body(&self, request: &ApiRequest) -> Result<Value, ApiError> {
        let response = self.send_checked(request)?;
        response
            .body
            .ok_or(ApiError::Decode(tradedesk_core::RecordError::NotAnObject))
    }
}

/// Fill in the owner field when the backend omits it from a config payload.
fn with_owner(kind: ResourceKind, owner_id: &str, mut body: Value) -> Value {
    if let Value::Object(map) = &mut body {
        map.entry(kind.owner_field())
            .or_insert_with(|| Value::String(owner_id.to_string()));
    }
    body
}

/// Collection items carry their own id as `id`; expose it as the owner field.
fn promote_id(kind: ResourceKind, mut item: Value) -> Value {
    if let Value::Object(map) = &mut item {
        if !map.contains_key(kind.owner_field()) {
            if let Some(id) = map.remove("id") {
                map.insert(kind.owner_field().to_string(), id);
            }
        }
    }
    item
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorKind, TransportError};
    use crate::testing::ScriptedTransport;
    use crate::transport::Method;
    use serde_json::json;
    use std::time::Duration;

    fn api(t: &Arc<ScriptedTransport>, retries: u32) -> ConfigApi {
        ConfigApi::new(
            t.clone(),
            RetryPolicy { max_retries: retries, base_delay: Duration::ZERO },
        )
    }

    #[test]
    fn get_retries_once_on_network_failure() {
        let t = Arc::new(ScriptedTransport::new());
        t.fail(TransportError::Connect("refused".into()))
            .respond_ok(json!({"portfolioId": "P1", "tradingMode": "live"}));

        let record = api(&t, 1).get_config(ResourceKind::Portfolio, "P1").unwrap();
        assert_eq!(record.owner_id, "P1");
        assert_eq!(t.request_count(), 2);
    }

    #[test]
    fn garbled_success_body_is_not_retried() {
        let t = Arc::new(ScriptedTransport::new());
        t.fail(TransportError::Body("invalid JSON from /portfolio/P1/config".into()))
            .respond_ok(json!({"portfolioId": "P1"}));

        let err = api(&t, 3).get_config(ResourceKind::Portfolio, "P1").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unexpected);
        assert_eq!(t.request_count(), 1);
    }

    #[test]
    fn writes_are_not_retried() {
        let t = Arc::new(ScriptedTransport::new());
        t.respond(503, None).respond_ok(json!({}));

        let record = ResourceKind::Strategy.default_record("S1");
        let err = api(&t, 3).update_config(ResourceKind::Strategy, &record).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Server);
        assert_eq!(t.request_count(), 1);
        assert_eq!(t.methods(), vec![Method::Put]);
    }

    #[test]
    fn create_posts_editable_fields_only() {
        let t = Arc::new(ScriptedTransport::new());
        t.respond(201, Some(json!({"id": "cfg-1", "cashReserve": 5, "createdAt": "2024-03-01T00:00:00Z"})));

        let record = ConfigRecord::new("S1").with("id", "stale").with("cashReserve", 5_i64);
        let saved = api(&t, 0).create_config(ResourceKind::Strategy, &record).unwrap();

        let sent = t.last_request().unwrap();
        assert_eq!(sent.method, Method::Post);
        assert_eq!(sent.path, "/strategies/S1/config");
        let body = sent.body.as_ref().unwrap();
        assert_eq!(body["allocations"], json!({"cashReserve": 5}));
        assert!(body.get("id").is_none());
        assert_eq!(saved.owner_id, "S1");
        assert!(saved.created_at.is_some());
    }

    #[test]
    fn delete_accepts_no_content() {
        let t = Arc::new(ScriptedTransport::new());
        t.respond(204, None);
        api(&t, 0).delete_config(ResourceKind::Portfolio, "P9").unwrap();
        assert_eq!(t.last_request().unwrap().path, "/portfolio/P9/config");
    }

    #[test]
    fn list_promotes_item_ids() {
        let t = Arc::new(ScriptedTransport::new());
        t.respond_ok(json!([
            {"id": "P1", "name": "Core", "tradingMode": "paper"},
            {"id": "P2", "name": "Momentum", "tradingMode": "live"}
        ]));
        let rows = api(&t, 0).list(ResourceKind::Portfolio).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].owner_id, "P2");
        assert!(rows[1].get("id").is_none());
    }

    #[test]
    fn check_reports_server_rejection() {
        let t = Arc::new(ScriptedTransport::new());
        t.respond(400, Some(json!({"valid": false, "message": "Max position size exceeds allocation"})));

        let record = ResourceKind::Strategy.default_record("S1");
        let report = api(&t, 0).check_config(ResourceKind::Strategy, &record).unwrap();
        assert!(!report.valid);
        assert_eq!(report.message.as_deref(), Some("Max position size exceeds allocation"));
        assert_eq!(t.last_request().unwrap().path, "/strategies/S1/validate-config");
    }

    #[test]
    fn check_is_unsupported_for_portfolios() {
        let t = Arc::new(ScriptedTransport::new());
        let record = ResourceKind::Portfolio.default_record("P1");
        assert!(matches!(
            api(&t, 0).check_config(ResourceKind::Portfolio, &record),
            Err(ApiError::Unsupported(ResourceKind::Portfolio))
        ));

        // Falls back to the local rules without a request.
        let report = api(&t, 0)
            .check_locally_then_remote(ResourceKind::Portfolio, &record)
            .unwrap();
        assert!(report.valid);
        assert_eq!(t.request_count(), 0);
    }
}
