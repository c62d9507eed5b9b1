//! Execution engine trait and its HTTP implementation.
//!
//! The orchestrator and sync engine only see `ExecutionEngine`. Tests swap in
//! fakes; production uses `EngineClient`.

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::types::{ConnectionStatus, DeployedWorkflow, EngineExecution, HealthStatus, id_to_string};
use async_trait::async_trait;
use autoflow_workflow::{WorkflowDocument, WorkflowValidator};
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, RequestBuilder};
use serde::Deserialize;
use serde_json::{Value as JsonValue, json};
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;

/// Operations the platform needs from the execution engine.
#[async_trait]
pub trait ExecutionEngine: Send + Sync {
    /// Verifies the engine is reachable and the credentials are accepted.
    async fn test_connection(&self) -> Result<ConnectionStatus, EngineError>;

    /// Returns the engine's own node type catalog, unmodified.
    async fn node_types(&self) -> Result<JsonValue, EngineError>;

    /// Validates `doc` and creates it on the engine.
    ///
    /// Invalid documents fail with `EngineError::ValidationFailed` and are
    /// never sent.
    async fn deploy(
        &self,
        doc: &WorkflowDocument,
        activate: bool,
    ) -> Result<DeployedWorkflow, EngineError>;

    /// Lists recent executions, newest first, optionally for one workflow.
    async fn executions(
        &self,
        workflow_id: Option<&str>,
        limit: u32,
    ) -> Result<Vec<EngineExecution>, EngineError>;

    async fn activate(&self, engine_workflow_id: &str) -> Result<JsonValue, EngineError>;

    async fn deactivate(&self, engine_workflow_id: &str) -> Result<JsonValue, EngineError>;

    async fn delete(&self, engine_workflow_id: &str) -> Result<JsonValue, EngineError>;

    /// Checks the engine's health endpoint. Failures are reported in the
    /// returned status.
    async fn health(&self) -> HealthStatus;
}

#[async_trait]
impl<T: ExecutionEngine + ?Sized> ExecutionEngine for Arc<T> {
    async fn test_connection(&self) -> Result<ConnectionStatus, EngineError> {
        (**self).test_connection().await
    }

    async fn node_types(&self) -> Result<JsonValue, EngineError> {
        (**self).node_types().await
    }

    async fn deploy(
        &self,
        doc: &WorkflowDocument,
        activate: bool,
    ) -> Result<DeployedWorkflow, EngineError> {
        (**self).deploy(doc, activate).await
    }

    async fn executions(
        &self,
        workflow_id: Option<&str>,
        limit: u32,
    ) -> Result<Vec<EngineExecution>, EngineError> {
        (**self).executions(workflow_id, limit).await
    }

    async fn activate(&self, engine_workflow_id: &str) -> Result<JsonValue, EngineError> {
        (**self).activate(engine_workflow_id).await
    }

    async fn deactivate(&self, engine_workflow_id: &str) -> Result<JsonValue, EngineError> {
        (**self).deactivate(engine_workflow_id).await
    }

    async fn delete(&self, engine_workflow_id: &str) -> Result<JsonValue, EngineError> {
        (**self).delete(engine_workflow_id).await
    }

    async fn health(&self) -> HealthStatus {
        (**self).health().await
    }
}

/// HTTP client for an n8n-compatible engine API.
#[derive(Debug, Clone)]
pub struct EngineClient {
    http: reqwest::Client,
    config: EngineConfig,
    validator: WorkflowValidator,
    health_timeout: Duration,
}

impl EngineClient {
    /// Creates a client.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::InvalidConfig` if the API key header cannot be
    /// used as an HTTP header or the HTTP client cannot be built.
    pub fn new(config: EngineConfig, validator: WorkflowValidator) -> Result<Self, EngineError> {
        let header_name = HeaderName::from_bytes(config.api_key_header.as_bytes()).map_err(|e| {
            EngineError::InvalidConfig {
                reason: format!("api key header '{}': {e}", config.api_key_header),
            }
        })?;
        let mut api_key =
            HeaderValue::from_str(&config.api_key).map_err(|e| EngineError::InvalidConfig {
                reason: format!("api key: {e}"),
            })?;
        api_key.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(header_name, api_key);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .default_headers(headers)
            .build()
            .map_err(|e| EngineError::InvalidConfig {
                reason: e.to_string(),
            })?;

        Ok(Self {
            http,
            health_timeout: config.health_timeout(),
            config,
            validator,
        })
    }

    #[cfg(test)]
    fn with_health_timeout(mut self, timeout: Duration) -> Self {
        self.health_timeout = timeout;
        self
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http.request(method, self.config.api_url(path))
    }

    /// Sends a request and decodes the JSON body.
    ///
    /// Empty success bodies decode to `null`.
    async fn send(&self, request: RequestBuilder) -> Result<JsonValue, EngineError> {
        let response = request.send().await.map_err(translate)?;
        let status = response.status();
        let body = response.text().await.map_err(translate)?;

        if !status.is_success() {
            let message = error_message(&body);
            tracing::warn!(status = status.as_u16(), message = %message, "engine request failed");
            return Err(EngineError::Http {
                status: status.as_u16(),
                message,
            });
        }

        if body.trim().is_empty() {
            return Ok(JsonValue::Null);
        }
        serde_json::from_str(&body).map_err(|e| EngineError::Decode {
            reason: e.to_string(),
        })
    }
}

/// Maps reqwest failures onto the engine's error taxonomy.
fn translate(error: reqwest::Error) -> EngineError {
    if error.is_timeout() {
        EngineError::Timeout
    } else if error.is_decode() {
        EngineError::Decode {
            reason: error.to_string(),
        }
    } else {
        EngineError::Connection {
            reason: error.to_string(),
        }
    }
}

/// The `message` field of a JSON error body, else the raw body.
fn error_message(body: &str) -> String {
    serde_json::from_str::<JsonValue>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(JsonValue::as_str).map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string())
}

#[derive(Deserialize)]
struct Page<T> {
    #[serde(default = "Vec::new")]
    data: Vec<T>,
}

#[async_trait]
impl ExecutionEngine for EngineClient {
    #[instrument(skip(self))]
    async fn test_connection(&self) -> Result<ConnectionStatus, EngineError> {
        let body = self
            .send(self.request(Method::GET, "/workflows").query(&[("limit", "1")]))
            .await?;
        let workflow_count = body
            .get("data")
            .and_then(JsonValue::as_array)
            .map_or(0, Vec::len);
        Ok(ConnectionStatus { workflow_count })
    }

    #[instrument(skip(self))]
    async fn node_types(&self) -> Result<JsonValue, EngineError> {
        self.send(self.request(Method::GET, "/node-types")).await
    }

    #[instrument(skip(self, doc), fields(workflow_name = %doc.name, nodes = doc.nodes.len()))]
    async fn deploy(
        &self,
        doc: &WorkflowDocument,
        activate: bool,
    ) -> Result<DeployedWorkflow, EngineError> {
        let validation = self.validator.validate(doc);
        if !validation.valid {
            tracing::info!(
                errors = validation.errors.len(),
                "workflow rejected by validation, not sending to engine"
            );
            return Err(EngineError::ValidationFailed { validation });
        }

        let body = json!({
            "name": doc.name,
            "nodes": doc.nodes,
            "connections": doc.connections,
            "active": activate,
            "settings": doc.settings.clone().unwrap_or_else(|| json!({})),
            "staticData": doc.static_data,
        });
        let response = self
            .send(self.request(Method::POST, "/workflows").json(&body))
            .await?;

        let engine_workflow_id = response
            .get("id")
            .and_then(id_to_string)
            .ok_or_else(|| EngineError::Decode {
                reason: "create response has no workflow id".to_string(),
            })?;
        let mut active = response.get("active").and_then(JsonValue::as_bool) == Some(true);
        let mut activation_error = None;

        if activate && !active {
            // The workflow exists at this point; a failed activation leaves
            // it deployed but inactive.
            match self.activate(&engine_workflow_id).await {
                Ok(_) => active = true,
                Err(e) => {
                    tracing::warn!(
                        engine_workflow_id = %engine_workflow_id,
                        error = %e,
                        "workflow created but activation failed"
                    );
                    activation_error = Some(e.to_string());
                }
            }
        }

        tracing::info!(
            engine_workflow_id = %engine_workflow_id,
            active,
            "workflow created on engine"
        );
        Ok(DeployedWorkflow {
            engine_workflow_id,
            active,
            activation_error,
            response,
            validation,
        })
    }

    #[instrument(skip(self))]
    async fn executions(
        &self,
        workflow_id: Option<&str>,
        limit: u32,
    ) -> Result<Vec<EngineExecution>, EngineError> {
        let mut request = self
            .request(Method::GET, "/executions")
            .query(&[("limit", limit.to_string())]);
        if let Some(id) = workflow_id {
            request = request.query(&[("workflowId", id)]);
        }

        let body = self.send(request).await?;
        let page: Page<EngineExecution> =
            serde_json::from_value(body).map_err(|e| EngineError::Decode {
                reason: e.to_string(),
            })?;
        Ok(page.data)
    }

    #[instrument(skip(self))]
    async fn activate(&self, engine_workflow_id: &str) -> Result<JsonValue, EngineError> {
        self.send(self.request(
            Method::POST,
            &format!("/workflows/{engine_workflow_id}/activate"),
        ))
        .await
    }

    #[instrument(skip(self))]
    async fn deactivate(&self, engine_workflow_id: &str) -> Result<JsonValue, EngineError> {
        self.send(self.request(
            Method::POST,
            &format!("/workflows/{engine_workflow_id}/deactivate"),
        ))
        .await
    }

    #[instrument(skip(self))]
    async fn delete(&self, engine_workflow_id: &str) -> Result<JsonValue, EngineError> {
        self.send(self.request(
            Method::DELETE,
            &format!("/workflows/{engine_workflow_id}"),
        ))
        .await
    }

    #[instrument(skip(self))]
    async fn health(&self) -> HealthStatus {
        let result = self
            .http
            .get(self.config.health_url())
            .timeout(self.health_timeout)
            .send()
            .await;

        match result {
            Ok(response) if response.status().is_success() => HealthStatus::healthy(),
            Ok(response) => {
                HealthStatus::unhealthy(format!("health check returned HTTP {}", response.status()))
            }
            Err(e) => {
                let error = translate(e);
                tracing::debug!(error = %error, "engine health check failed");
                HealthStatus::unhealthy(error.to_string())
            }
        }
    }
}
