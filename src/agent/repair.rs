// AutoClipper Repair Loop
// Copyright (c) 2026 Xing_The_Creator | AutoClipper
//
// Bounded validate/repair cycle. The Repairer makes exactly one generation
// request per invocation; the loop owns the budget.

use crate::agent::edl::Edl;
use crate::agent::gpt_oss_bridge::{
    extract_json, generate_supervised, GenerationRequest, ModelGateway,
};
use crate::agent::supervisor::RetryPolicy;
use crate::agent::validation_gate::ValidationGate;
use crate::error::{ClipError, Result};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

pub struct Repairer {
    gateway: Arc<dyn ModelGateway>,
    retry: RetryPolicy,
}

impl Repairer {
    pub fn new(gateway: Arc<dyn ModelGateway>) -> Self {
        Self {
            gateway,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// One repair request. Returns the model's answer as text, unvalidated.
    /// An answer that does not parse is handed back as-is so the next
    /// validation pass can report it.
    pub async fn repair(
        &self,
        raw: &str,
        errors: &[String],
        duration_sec: f64,
        cancel: &CancellationToken,
    ) -> Result<String> {
        let request = GenerationRequest::repair(repair_prompt(raw, errors, duration_sec));
        match generate_supervised(
            self.gateway.as_ref(),
            "edl repair",
            &request,
            self.retry,
            cancel,
        )
        .await
        {
            Ok(value) => Ok(value.to_string()),
            Err(ClipError::MalformedResponse { raw, reason }) => {
                warn!("[REPAIR] Repaired output still unparseable: {}", reason);
                Ok(raw)
            }
            Err(e) => Err(e),
        }
    }
}

pub fn repair_prompt(raw: &str, errors: &[String], duration_sec: f64) -> String {
    let error_block = errors
        .iter()
        .map(|e| format!("- {}", e))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"The following EDL JSON has validation errors:

{errors}

Original JSON:
{raw}

Rules for repair:
1. Fix ONLY JSON syntax and field errors
2. Do NOT invent or change timestamps
3. Remove clips that violate constraints (too short, too long, overlapping)
4. Keep all valid clips unchanged
5. Ensure all timestamps are within 0-{duration} seconds
6. Return ONLY valid JSON matching the EDL schema

Required schema:
{{
  "clips": [
    {{
      "clip_id": "string",
      "start_sec": number,
      "end_sec": number,
      "title": "string",
      "hook_text": "string",
      "score": number (0.0-1.0),
      "reason": "string"
    }}
  ]
}}"#,
        errors = error_block,
        raw = raw,
        duration = duration_sec
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepairState {
    Generated,
    Validating,
    Repairing { attempt: u32 },
    Valid,
    Exhausted,
}

/// Record of one repair cycle. Logged when the cycle closes, then dropped.
#[derive(Debug, Clone)]
pub struct RepairAttempt {
    pub index: u32,
    pub input_errors: Vec<String>,
    pub outcome: std::result::Result<Edl, Vec<String>>,
}

impl RepairAttempt {
    fn log(&self) {
        match &self.outcome {
            Ok(edl) => info!(
                "[REPAIR] Attempt {} fixed {} error(s): {} clip(s) valid",
                self.index,
                self.input_errors.len(),
                edl.clips.len()
            ),
            Err(errors) => warn!(
                "[REPAIR] Attempt {} left {} error(s) (had {})",
                self.index,
                errors.len(),
                self.input_errors.len()
            ),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RepairOutcome {
    pub edl: Edl,
    /// Repairer invocations spent; 0 when the first output was valid.
    pub attempts: u32,
}

pub struct RepairLoop<'a> {
    repairer: &'a Repairer,
    gate: &'a ValidationGate<'a>,
    budget: u32,
    duration_sec: f64,
}

impl<'a> RepairLoop<'a> {
    pub fn new(
        repairer: &'a Repairer,
        gate: &'a ValidationGate<'a>,
        budget: u32,
        duration_sec: f64,
    ) -> Self {
        Self {
            repairer,
            gate,
            budget,
            duration_sec,
        }
    }

    /// Drive `raw` to a valid EDL. Each repair sees only the latest output
    /// and its errors. With a zero budget an invalid output comes back as
    /// the underlying `MalformedResponse` or `ConstraintViolation`.
    pub async fn run(&self, raw: String, cancel: &CancellationToken) -> Result<RepairOutcome> {
        let mut state = RepairState::Generated;
        let mut current = raw;
        let mut attempts = 0u32;
        let mut errors: Vec<String> = Vec::new();
        let mut pending: Option<Vec<String>> = None;
        let mut accepted: Option<Edl> = None;

        loop {
            state = match state {
                RepairState::Generated => RepairState::Validating,

                RepairState::Validating => {
                    let result = self.gate.validate_raw(&current);
                    if let Some(input_errors) = pending.take() {
                        RepairAttempt {
                            index: attempts,
                            input_errors,
                            outcome: match &result.edl {
                                Some(edl) if result.valid => Ok(edl.clone()),
                                _ => Err(result.errors.clone()),
                            },
                        }
                        .log();
                    }

                    match result.edl {
                        Some(edl) if result.valid => {
                            accepted = Some(edl);
                            RepairState::Valid
                        }
                        _ => {
                            errors = result.errors;
                            if attempts >= self.budget {
                                RepairState::Exhausted
                            } else {
                                RepairState::Repairing {
                                    attempt: attempts + 1,
                                }
                            }
                        }
                    }
                }

                RepairState::Repairing { attempt } => {
                    if cancel.is_cancelled() {
                        return Err(ClipError::Cancelled(format!(
                            "repair attempt {} not started",
                            attempt
                        )));
                    }
                    info!(
                        "[REPAIR] Attempt {}/{} for {} error(s)",
                        attempt,
                        self.budget,
                        errors.len()
                    );
                    current = self
                        .repairer
                        .repair(&current, &errors, self.duration_sec, cancel)
                        .await?;
                    attempts = attempt;
                    pending = Some(errors.clone());
                    RepairState::Validating
                }

                RepairState::Valid => match accepted.take() {
                    Some(edl) => return Ok(RepairOutcome { edl, attempts }),
                    None => RepairState::Validating,
                },

                RepairState::Exhausted => {
                    return Err(self.exhausted(&current, attempts, errors));
                }
            };
        }
    }

    fn exhausted(&self, raw: &str, attempts: u32, errors: Vec<String>) -> ClipError {
        if attempts == 0 {
            return match extract_json(raw) {
                Err(e) => ClipError::malformed(raw, e.to_string()),
                Ok(_) => ClipError::ConstraintViolation { errors },
            };
        }
        error!(
            "[REPAIR] Budget of {} exhausted with {} error(s) remaining",
            attempts,
            errors.len()
        );
        ClipError::ExhaustedRepair { attempts, errors }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_carries_rules_errors_and_schema() {
        let prompt = repair_prompt(
            "{\"clips\": [",
            &["Invalid JSON: EOF".to_string()],
            120.0,
        );
        assert!(prompt.contains("- Invalid JSON: EOF"));
        assert!(prompt.contains("Original JSON:\n{\"clips\": ["));
        assert!(prompt.contains("2. Do NOT invent or change timestamps"));
        assert!(prompt.contains("5. Ensure all timestamps are within 0-120 seconds"));
        assert!(prompt.contains("6. Return ONLY valid JSON"));
        assert!(prompt.contains("\"score\": number (0.0-1.0)"));
    }
}
