// AutoClipper Model Gateway
// Copyright (c) 2026 Xing_The_Creator | AutoClipper
//
// The boundary to the generative backend. Given a prompt and a JSON hint,
// a gateway returns parsed structured data or a typed failure carrying the
// raw text. Two variants: a workflow proxy that is never called directly,
// and an OpenAI-compatible chat completions client.

use crate::agent::router::Strategy;
use crate::agent::supervisor::{AntifragileSupervisor, RetryPolicy};
use crate::config::{BackendKind, PipelineConfig};
use crate::error::{ClipError, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

const SYSTEM_PROMPT: &str = "You are AutoClipper, an editor that finds short viral clips in long-form video transcripts. Respond with JSON only.";

pub const DISCOVERY_TEMPERATURE: f32 = 0.3;
pub const RERANK_TEMPERATURE: f32 = 0.2;
pub const REPAIR_TEMPERATURE: f32 = 0.0;

#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub prompt: String,
    pub expect_json: bool,
    pub temperature: f32,
}

impl GenerationRequest {
    pub fn discovery(prompt: String) -> Self {
        Self {
            prompt,
            expect_json: true,
            temperature: DISCOVERY_TEMPERATURE,
        }
    }

    pub fn rerank(prompt: String) -> Self {
        Self {
            prompt,
            expect_json: true,
            temperature: RERANK_TEMPERATURE,
        }
    }

    pub fn repair(prompt: String) -> Self {
        Self {
            prompt,
            expect_json: true,
            temperature: REPAIR_TEMPERATURE,
        }
    }
}

#[async_trait]
pub trait ModelGateway: Send + Sync {
    fn name(&self) -> &str;

    /// Proxies answer `false`; calling them is a configuration error.
    fn is_callable(&self) -> bool {
        true
    }

    async fn generate(
        &self,
        request: &GenerationRequest,
        cancel: &CancellationToken,
    ) -> Result<Value>;
}

/// One generation call, with transport failures retried under `policy`.
pub async fn generate_supervised(
    gateway: &dyn ModelGateway,
    task_name: &str,
    request: &GenerationRequest,
    policy: RetryPolicy,
    cancel: &CancellationToken,
) -> Result<Value> {
    AntifragileSupervisor::execute_with_retry(task_name, policy, cancel, || {
        gateway.generate(request, cancel)
    })
    .await
}

/// Parse model text as JSON, tolerating a markdown code fence around it.
pub fn extract_json(text: &str) -> std::result::Result<Value, serde_json::Error> {
    let trimmed = text.trim();
    let body = match trimmed.strip_prefix("```") {
        Some(rest) => {
            let rest = rest.trim_start_matches(|c: char| c.is_ascii_alphabetic());
            rest.trim_end().strip_suffix("```").unwrap_or(rest)
        }
        None => trimmed,
    };
    serde_json::from_str(body.trim())
}

// ---------------------------------------------------------------------------
// WorkflowProxy
// ---------------------------------------------------------------------------

/// Stands in for generation that runs inside an external workflow engine.
pub struct WorkflowProxy {
    name: String,
}

impl WorkflowProxy {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
        }
    }
}

#[async_trait]
impl ModelGateway for WorkflowProxy {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_callable(&self) -> bool {
        false
    }

    async fn generate(
        &self,
        _request: &GenerationRequest,
        _cancel: &CancellationToken,
    ) -> Result<Value> {
        Err(ClipError::Configuration(format!(
            "backend '{}' is a workflow proxy; generation runs inside the workflow engine",
            self.name
        )))
    }
}

// ---------------------------------------------------------------------------
// ChatCompletionsGateway
// ---------------------------------------------------------------------------

pub struct ChatCompletionsGateway {
    client: reqwest::Client,
    api_url: String,
    model: String,
    api_key: Option<String>,
}

impl ChatCompletionsGateway {
    pub fn new(
        api_url: &str,
        model: &str,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ClipError::Configuration(format!("HTTP client: {}", e)))?;
        Ok(Self {
            client,
            api_url: api_url.to_string(),
            model: model.to_string(),
            api_key,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.api_url.trim_end_matches('/'))
    }

    async fn send(&self, request: &GenerationRequest) -> Result<Value> {
        debug!(
            "[GATEWAY] {} <- {} chars (temperature {})",
            self.model,
            request.prompt.len(),
            request.temperature
        );

        let mut payload = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": request.prompt }
            ],
            "temperature": request.temperature
        });
        if request.expect_json {
            payload["response_format"] = json!({ "type": "json_object" });
        }

        let mut http = self.client.post(self.endpoint()).json(&payload);
        if let Some(key) = &self.api_key {
            http = http.bearer_auth(key);
        }

        let resp = http.send().await.map_err(|e| {
            error!("[GATEWAY] {} connection failed: {}", self.model, e);
            ClipError::transient(&self.model, e.to_string())
        })?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| ClipError::transient(&self.model, e.to_string()))?;

        if status.is_server_error() || status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(ClipError::transient(
                &self.model,
                format!("API Error: {}", status),
            ));
        }
        if !status.is_success() {
            return Err(ClipError::Configuration(format!(
                "backend '{}' rejected the request ({}): {}",
                self.model,
                status,
                body.chars().take(200).collect::<String>()
            )));
        }

        let envelope: Value = serde_json::from_str(&body)
            .map_err(|e| ClipError::malformed(body.clone(), format!("response envelope: {}", e)))?;
        let content = envelope["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| {
                ClipError::malformed(body.clone(), "missing choices[0].message.content")
            })?;

        if !request.expect_json {
            return Ok(Value::String(content.to_string()));
        }
        extract_json(content).map_err(|e| ClipError::malformed(content, e.to_string()))
    }
}

#[async_trait]
impl ModelGateway for ChatCompletionsGateway {
    fn name(&self) -> &str {
        &self.model
    }

    async fn generate(
        &self,
        request: &GenerationRequest,
        cancel: &CancellationToken,
    ) -> Result<Value> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ClipError::Cancelled(format!(
                "generation on '{}' aborted",
                self.model
            ))),
            result = self.send(request) => result,
        }
    }
}

// ---------------------------------------------------------------------------
// Backends
// ---------------------------------------------------------------------------

/// Gateway per routing strategy. Selection is by tag, never by inspecting
/// the gateway type.
#[derive(Clone)]
pub struct Backends {
    primary: Arc<dyn ModelGateway>,
    long_context: Arc<dyn ModelGateway>,
}

impl Backends {
    pub fn new(primary: Arc<dyn ModelGateway>, long_context: Arc<dyn ModelGateway>) -> Self {
        Self {
            primary,
            long_context,
        }
    }

    /// Same gateway for both strategies.
    pub fn single(gateway: Arc<dyn ModelGateway>) -> Self {
        Self {
            primary: gateway.clone(),
            long_context: gateway,
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Result<Self> {
        let timeout = Duration::from_secs(config.request_timeout_secs);
        let primary: Arc<dyn ModelGateway> = match config.primary_backend {
            BackendKind::Workflow => Arc::new(WorkflowProxy::new(&config.primary_model)),
            BackendKind::Chat => Arc::new(ChatCompletionsGateway::new(
                &config.api_url,
                &config.primary_model,
                config.api_key.clone(),
                timeout,
            )?),
        };
        let long_context = Arc::new(ChatCompletionsGateway::new(
            &config.api_url,
            &config.long_context_model,
            config.api_key.clone(),
            timeout,
        )?);
        info!(
            "[GATEWAY] primary='{}' ({:?}), long-context='{}'",
            config.primary_model, config.primary_backend, config.long_context_model
        );
        Ok(Self::new(primary, long_context))
    }

    pub fn for_strategy(&self, strategy: Strategy) -> Arc<dyn ModelGateway> {
        match strategy {
            Strategy::Primary => self.primary.clone(),
            Strategy::LongContextFallback => self.long_context.clone(),
        }
    }
}
