// AutoClipper Strategy Router
// Copyright (c) 2026 Xing_The_Creator | AutoClipper
//
// Picks the generation backend from the transcript size before discovery
// starts. Pure function of the input; the pipeline shape never changes.

use crate::config::PipelineConfig;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::info;

/// Crude 4-characters-per-token estimate. Not a tokenizer.
pub const AVG_CHARS_PER_TOKEN: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Strategy {
    #[serde(rename = "primary")]
    Primary,
    #[serde(rename = "long-context-fallback")]
    LongContextFallback,
}

impl Strategy {
    pub fn tag(&self) -> &'static str {
        match self {
            Strategy::Primary => "primary",
            Strategy::LongContextFallback => "long-context-fallback",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingDecision {
    pub strategy: Strategy,
    pub estimated_tokens: usize,
    pub reason: String,
}

impl RoutingDecision {
    pub fn model<'a>(&self, config: &'a PipelineConfig) -> &'a str {
        match self.strategy {
            Strategy::Primary => &config.primary_model,
            Strategy::LongContextFallback => &config.long_context_model,
        }
    }
}

pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count() / AVG_CHARS_PER_TOKEN
}

pub fn route(text: &str, duration_sec: f64, token_threshold: usize) -> RoutingDecision {
    let estimated_tokens = estimate_tokens(text);

    let (strategy, reason) = if estimated_tokens >= token_threshold {
        (
            Strategy::LongContextFallback,
            format!(
                "Transcript length (~{} tokens) exceeds primary capacity ({} tokens)",
                estimated_tokens, token_threshold
            ),
        )
    } else {
        (
            Strategy::Primary,
            format!(
                "Transcript length (~{} tokens) within primary capacity ({} tokens)",
                estimated_tokens, token_threshold
            ),
        )
    };

    info!(
        "[ROUTER] {} for {:.1}s of media: {}",
        strategy, duration_sec, reason
    );

    RoutingDecision {
        strategy,
        estimated_tokens,
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_long_transcript_routes_to_fallback() {
        let text = "a".repeat(400_000);
        let decision = route(&text, 3600.0, 80_000);
        assert_eq!(decision.estimated_tokens, 100_000);
        assert_eq!(decision.strategy, Strategy::LongContextFallback);
        assert!(decision.reason.contains("exceeds"));
    }

    #[test]
    fn test_short_transcript_stays_primary() {
        let decision = route("just a few words", 30.0, 80_000);
        assert_eq!(decision.strategy, Strategy::Primary);
        assert!(decision.reason.contains("within"));
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let text = "b".repeat(40);
        assert_eq!(route(&text, 1.0, 10).strategy, Strategy::LongContextFallback);
        assert_eq!(route(&text, 1.0, 11).strategy, Strategy::Primary);
    }

    #[test]
    fn test_estimate_counts_characters_not_bytes() {
        assert_eq!(estimate_tokens("éééé"), 1);
    }

    #[test]
    fn test_strategy_tags_serialize() {
        assert_eq!(
            serde_json::to_string(&Strategy::LongContextFallback).unwrap(),
            "\"long-context-fallback\""
        );
        assert_eq!(Strategy::Primary.to_string(), "primary");
    }

    #[test]
    fn test_decision_resolves_model() {
        let config = PipelineConfig::default();
        let decision = route(&"c".repeat(400_000), 10.0, config.token_threshold);
        assert_eq!(decision.model(&config), config.long_context_model);
    }
}
