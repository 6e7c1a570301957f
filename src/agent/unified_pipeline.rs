// AutoClipper Unified Pipeline - Clip Selection Orchestrator
// Copyright (c) 2026 Xing_The_Creator | AutoClipper
//
// Route -> Discover -> Select -> Validate -> Repair, driven by an explicit
// context object. Only the cache outlives a run, and the caller owns it.

use crate::agent::cache::{CacheKey, ClipCache};
use crate::agent::discovery::CandidateDiscoverer;
use crate::agent::edl::{Constraints, Edl};
use crate::agent::gpt_oss_bridge::Backends;
use crate::agent::repair::{RepairLoop, Repairer};
use crate::agent::router::{route, RoutingDecision};
use crate::agent::selector::GlobalSelector;
use crate::agent::supervisor::RetryPolicy;
use crate::agent::transcription::Transcript;
use crate::agent::validation_gate::ValidationGate;
use crate::config::PipelineConfig;
use crate::error::{ClipError, Result};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Route,
    Discover,
    Select,
    Validate,
    Done,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineStage::Route => "route",
            PipelineStage::Discover => "discover",
            PipelineStage::Select => "select",
            PipelineStage::Validate => "validate",
            PipelineStage::Done => "done",
        };
        f.write_str(name)
    }
}

pub type ProgressCallback = Arc<dyn Fn(PipelineStage, &str) + Send + Sync>;

/// Everything one run needs besides the transcript.
#[derive(Debug, Clone)]
pub struct PipelineContext {
    pub duration_sec: f64,
    pub constraints: Constraints,
    pub cancel: CancellationToken,
    /// Wall-clock limit for the whole run.
    pub deadline: Option<Duration>,
    /// Stable identity of the source media; enables the cache.
    pub source_id: Option<String>,
}

impl PipelineContext {
    pub fn new(duration_sec: f64, constraints: Constraints) -> Self {
        Self {
            duration_sec,
            constraints,
            cancel: CancellationToken::new(),
            deadline: None,
            source_id: None,
        }
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_source(mut self, source_id: impl Into<String>) -> Self {
        self.source_id = Some(source_id.into());
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    pub decision: RoutingDecision,
    pub candidate_count: usize,
    pub failed_chunks: usize,
    pub total_chunks: usize,
    pub repair_attempts: u32,
    pub edl: Edl,
    pub from_cache: bool,
}

pub struct ClipPipeline {
    config: PipelineConfig,
    backends: Backends,
    cache: Option<Arc<dyn ClipCache>>,
    retry: RetryPolicy,
    progress_callback: Option<ProgressCallback>,
}

impl ClipPipeline {
    pub fn new(config: PipelineConfig, backends: Backends) -> Self {
        let retry = RetryPolicy::with_attempts(config.transport_retries);
        Self {
            config,
            backends,
            cache: None,
            retry,
            progress_callback: None,
        }
    }

    /// Validate `config` and build the HTTP backends it names.
    pub fn from_config(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        let backends = Backends::from_config(&config)?;
        Ok(Self::new(config, backends))
    }

    pub fn with_cache(mut self, cache: Arc<dyn ClipCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    fn report_progress(&self, stage: PipelineStage, msg: &str) {
        info!("[PIPELINE] {}: {}", stage, msg);
        if let Some(cb) = &self.progress_callback {
            cb(stage, msg);
        }
    }

    /// Run every stage under the context's deadline. Hitting the deadline
    /// cancels the token, which aborts in-flight generation calls.
    pub async fn run(&self, transcript: &Transcript, ctx: &PipelineContext) -> Result<PipelineReport> {
        let result = match ctx.deadline {
            Some(limit) => match tokio::time::timeout(limit, self.run_stages(transcript, ctx)).await {
                Ok(result) => result,
                Err(_) => {
                    ctx.cancel.cancel();
                    Err(ClipError::Cancelled(format!(
                        "deadline of {}s exceeded",
                        limit.as_secs_f64()
                    )))
                }
            },
            None => self.run_stages(transcript, ctx).await,
        };

        if let Err(e) = &result {
            error!("[PIPELINE] Run failed: {}", e);
        }
        result
    }

    async fn run_stages(&self, transcript: &Transcript, ctx: &PipelineContext) -> Result<PipelineReport> {
        if ctx.cancel.is_cancelled() {
            return Err(ClipError::Cancelled("run cancelled before start".to_string()));
        }
        let duration = ctx.duration_sec;
        let text = transcript.full_text();

        // 1. Route
        let decision = route(&text, duration, self.config.token_threshold);
        self.report_progress(
            PipelineStage::Route,
            &format!("{} -> {}", decision.reason, decision.model(&self.config)),
        );

        let cache_key = ctx
            .source_id
            .as_deref()
            .map(|source| CacheKey::new(source, duration));
        if let (Some(cache), Some(key)) = (&self.cache, &cache_key) {
            if let Some(edl) = cache.get(key)? {
                self.report_progress(
                    PipelineStage::Done,
                    &format!("{} clip(s) from cache", edl.clips.len()),
                );
                return Ok(PipelineReport {
                    decision,
                    candidate_count: 0,
                    failed_chunks: 0,
                    total_chunks: 0,
                    repair_attempts: 0,
                    edl,
                    from_cache: true,
                });
            }
        }

        let gateway = self.backends.for_strategy(decision.strategy);
        if !gateway.is_callable() {
            return Err(ClipError::Configuration(format!(
                "backend '{}' for strategy '{}' cannot be called directly",
                gateway.name(),
                decision.strategy
            )));
        }

        // 2. Discover
        self.report_progress(
            PipelineStage::Discover,
            &format!("{} chars in chunks of {}", text.chars().count(), self.config.chunk_size_chars),
        );
        let discovery = CandidateDiscoverer::new(
            gateway.clone(),
            self.config.chunk_size_chars,
            self.config.candidates_per_chunk,
        )
        .with_retry(self.retry)
        .discover(&text, duration, &ctx.constraints, &ctx.cancel)
        .await?;

        if discovery.failed_chunks() > 0 {
            warn!(
                "[PIPELINE] Degraded discovery: {}/{} chunk(s) failed",
                discovery.failed_chunks(),
                discovery.total_chunks()
            );
        }
        if discovery.candidates.is_empty() {
            return Err(ClipError::NoCandidates {
                failed_chunks: discovery.failed_chunks(),
                total_chunks: discovery.total_chunks(),
            });
        }

        // 3. Select
        self.report_progress(
            PipelineStage::Select,
            &format!("{} candidate(s) in pool", discovery.candidates.len()),
        );
        let selector = GlobalSelector::new(gateway.clone()).with_retry(self.retry);
        let raw = match selector
            .select(&discovery.candidates, duration, &ctx.constraints, &ctx.cancel)
            .await
        {
            Ok(edl) => edl.to_json(),
            Err(ClipError::MalformedResponse { raw, reason }) => {
                warn!("[PIPELINE] Rerank output unusable ({}), sending to repair", reason);
                raw
            }
            Err(ClipError::EmptySelection { proposed, raw }) => {
                warn!(
                    "[PIPELINE] None of {} reranked clip(s) survived enforcement, sending to repair",
                    proposed
                );
                raw
            }
            Err(e) => return Err(e),
        };

        // 4. Validate, repairing as needed
        self.report_progress(
            PipelineStage::Validate,
            &format!("repair budget {}", self.config.repair_budget),
        );
        let gate = ValidationGate::new(transcript, &ctx.constraints, duration)
            .with_confidence_floor(self.config.confidence_floor);
        let repairer = Repairer::new(gateway).with_retry(self.retry);
        let outcome = RepairLoop::new(&repairer, &gate, self.config.repair_budget, duration)
            .run(raw, &ctx.cancel)
            .await?;

        if let (Some(cache), Some(key)) = (&self.cache, &cache_key) {
            if let Err(e) = cache.set(key, &outcome.edl) {
                warn!("[PIPELINE] Could not cache EDL: {}", e);
            }
        }

        self.report_progress(
            PipelineStage::Done,
            &format!(
                "{} clip(s), {:.1}s total, {} repair(s)",
                outcome.edl.clips.len(),
                outcome.edl.total_duration(),
                outcome.attempts
            ),
        );

        Ok(PipelineReport {
            decision,
            candidate_count: discovery.candidates.len(),
            failed_chunks: discovery.failed_chunks(),
            total_chunks: discovery.total_chunks(),
            repair_attempts: outcome.attempts,
            edl: outcome.edl,
            from_cache: false,
        })
    }
}
