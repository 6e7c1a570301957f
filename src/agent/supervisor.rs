// AutoClipper Transport Supervisor - Bounded Retry Loop
// Copyright (c) 2026 Xing_The_Creator | AutoClipper
//
// Wraps a single generation call in a Try-Backoff-Retry loop. Only
// transport failures are retried here; malformed output and rule
// violations go to the repair loop instead.

use crate::error::{ClipError, Result};
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    pub fn with_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            ..Self::default()
        }
    }

    /// No sleeping between attempts.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Delay before retry number `attempt` (1-based): base, 2x base, 4x base...
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

pub struct AntifragileSupervisor;

impl AntifragileSupervisor {
    /// Execute an async task, retrying transient failures with exponential
    /// backoff. A cancellation during backoff ends the loop immediately.
    pub async fn execute_with_retry<T, F, Fut>(
        task_name: &str,
        policy: RetryPolicy,
        cancel: &CancellationToken,
        mut run: F,
    ) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            if cancel.is_cancelled() {
                return Err(ClipError::Cancelled(format!(
                    "'{}' cancelled before attempt {}",
                    task_name, attempt
                )));
            }

            match run().await {
                Ok(result) => {
                    if attempt > 1 {
                        info!(
                            "[SUPERVISOR] Task '{}' succeeded on attempt {}.",
                            task_name, attempt
                        );
                    }
                    return Ok(result);
                }
                Err(e) if e.is_transient() && attempt < policy.max_attempts => {
                    let delay = policy.delay_for(attempt);
                    warn!(
                        "[SUPERVISOR] Task '{}' failed (attempt {}/{}): {}. Retrying in {:?}...",
                        task_name, attempt, policy.max_attempts, e, delay
                    );
                    tokio::select! {
                        _ = cancel.cancelled() => {
                            return Err(ClipError::Cancelled(format!(
                                "'{}' cancelled during backoff",
                                task_name
                            )));
                        }
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
                Err(e) => {
                    if e.is_transient() {
                        error!(
                            "[SUPERVISOR] Task '{}' exhausted all {} attempts. Last error: {}",
                            task_name, policy.max_attempts, e
                        );
                    }
                    return Err(e);
                }
            }
        }
    }
}
