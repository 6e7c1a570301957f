// AutoClipper Global Selector
// Copyright (c) 2026 Xing_The_Creator | AutoClipper
//
// One rerank request over the whole candidate pool, then deterministic
// enforcement of the hard constraints on whatever came back.

use crate::agent::edl::{assign_unique_ids, complete_candidates_from_value, Candidate, Constraints, Edl};
use crate::agent::gpt_oss_bridge::{generate_supervised, GenerationRequest, ModelGateway};
use crate::agent::supervisor::RetryPolicy;
use crate::error::{ClipError, Result};
use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub struct GlobalSelector {
    gateway: Arc<dyn ModelGateway>,
    retry: RetryPolicy,
}

impl GlobalSelector {
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

    /// Rerank `pool` and enforce constraints on the answer. A response that
    /// is not clip-shaped comes back as `MalformedResponse`, and one that
    /// leaves no clip after enforcement as `EmptySelection`; both carry the
    /// raw answer so the caller can route it to repair.
    pub async fn select(
        &self,
        pool: &[Candidate],
        duration_sec: f64,
        constraints: &Constraints,
        cancel: &CancellationToken,
    ) -> Result<Edl> {
        info!(
            "[SELECTOR] Reranking {} candidate(s), keeping at most {}",
            pool.len(),
            constraints.max_clips
        );
        let request = GenerationRequest::rerank(rerank_prompt(pool, duration_sec, constraints)?);
        let value = generate_supervised(
            self.gateway.as_ref(),
            "global rerank",
            &request,
            self.retry,
            cancel,
        )
        .await?;

        let (proposed, skipped) = complete_candidates_from_value(&value)
            .map_err(|reason| ClipError::malformed(value.to_string(), reason))?;
        if skipped > 0 {
            warn!(
                "[SELECTOR] Dropped {} incomplete entr(ies) from rerank output",
                skipped
            );
        }

        let edl = enforce(&proposed, duration_sec, constraints);
        info!(
            "[SELECTOR] Model proposed {}, {} survived enforcement",
            proposed.len() + skipped,
            edl.clips.len()
        );
        if edl.clips.is_empty() {
            return Err(ClipError::EmptySelection {
                proposed: proposed.len() + skipped,
                raw: value.to_string(),
            });
        }
        Ok(edl)
    }
}

/// Deterministic post-processing. Same input, same output, byte for byte.
///
/// 1. drop clips outside `[0, duration]` or with `start >= end`
/// 2. drop clips whose length is outside `[min, max]`
/// 3. clamp scores into `[0, 1]`
/// 4. greedy overlap removal in `(start asc, score desc)` order
/// 5. sort by score desc and keep `max_clips`
/// 6. replace empty or repeated ids with `sNN` by final position
pub fn enforce(clips: &[Candidate], duration_sec: f64, constraints: &Constraints) -> Edl {
    let mut kept: Vec<Candidate> = clips
        .iter()
        .filter(|c| c.start_sec.is_finite() && c.end_sec.is_finite())
        .filter(|c| c.start_sec >= 0.0 && c.end_sec <= duration_sec && c.start_sec < c.end_sec)
        .filter(|c| {
            let length = c.length();
            length >= constraints.min_clip_length && length <= constraints.max_clip_length
        })
        .map(|c| {
            if c.score.is_finite() && (0.0..=1.0).contains(&c.score) {
                c.clone()
            } else if c.score.is_nan() {
                c.with_score(0.0)
            } else {
                c.with_score(c.score.clamp(0.0, 1.0))
            }
        })
        .collect();

    kept = remove_overlaps(kept);

    // Stable sort: equal scores keep their start-time order.
    kept.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
    kept.truncate(constraints.max_clips);

    let kept = assign_unique_ids(kept, &mut HashSet::new(), |n| format!("s{:02}", n));
    Edl::new(kept, duration_sec)
}

/// Greedy interval scheduling: earliest start first, higher score breaks
/// ties. Not score-optimal.
pub fn remove_overlaps(mut clips: Vec<Candidate>) -> Vec<Candidate> {
    clips.sort_by(|a, b| {
        a.start_sec
            .partial_cmp(&b.start_sec)
            .unwrap_or(Ordering::Equal)
            .then_with(|| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal))
    });

    let mut kept: Vec<Candidate> = Vec::with_capacity(clips.len());
    for clip in clips {
        if kept.iter().all(|existing| !existing.overlaps(&clip)) {
            kept.push(clip);
        }
    }
    kept
}

fn rerank_prompt(pool: &[Candidate], duration_sec: f64, constraints: &Constraints) -> Result<String> {
    let candidates = serde_json::to_string_pretty(pool)?;

    let mut rules = Vec::new();
    if constraints.favor_diversity {
        rules.push("Ensure diversity (different topics/themes)");
    }
    rules.push("No temporal overlaps");
    if constraints.require_strong_hook {
        rules.push("Prefer clips with strong hooks in the first 2-3 seconds");
    }
    rules.push("Sort by score (descending)");
    let rules = rules
        .iter()
        .map(|r| format!("- {}", r))
        .collect::<Vec<_>>()
        .join("\n");

    Ok(format!(
        "Rank these viral clip candidates from one video and choose the final set.\n\n\
         Candidates ({} total):\n{}\n\n\
         Video duration: {} seconds\n\
         Clip length: {}s to {}s\n\
         Select best {} clips.\n\n\
         Rules:\n{}\n\n\
         Return final EDL JSON: {{\"clips\": [{{\"clip_id\", \"start_sec\", \"end_sec\", \
         \"title\", \"hook_text\", \"score\", \"reason\"}}]}}",
        pool.len(),
        candidates,
        duration_sec,
        constraints.min_clip_length,
        constraints.max_clip_length,
        constraints.max_clips,
        rules
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clip(id: &str, start: f64, end: f64, score: f64) -> Candidate {
        Candidate::new(id, start, end, score)
    }

    fn spans(edl: &Edl) -> Vec<(f64, f64, f64)> {
        edl.clips
            .iter()
            .map(|c| (c.start_sec, c.end_sec, c.score))
            .collect()
    }

    #[test]
    fn test_overlap_removal_keeps_earlier_clip() {
        let pool = vec![
            clip("a", 0.0, 20.0, 0.9),
            clip("b", 15.0, 40.0, 0.8),
            clip("c", 50.0, 100.0, 0.7),
        ];
        let edl = enforce(&pool, 120.0, &Constraints::default());
        assert_eq!(spans(&edl), vec![(0.0, 20.0, 0.9), (50.0, 100.0, 0.7)]);
    }

    #[test]
    fn test_bounds_and_length_filters() {
        let pool = vec![
            clip("neg", -1.0, 20.0, 0.9),
            clip("past_end", 100.0, 130.0, 0.9),
            clip("inverted", 40.0, 30.0, 0.9),
            clip("short", 0.0, 10.0, 0.9),
            clip("long", 0.0, 95.0, 0.9),
            clip("nan", f64::NAN, 30.0, 0.9),
            clip("ok", 10.0, 40.0, 0.5),
        ];
        let edl = enforce(&pool, 120.0, &Constraints::default());
        assert_eq!(edl.clips.len(), 1);
        assert_eq!(edl.clips[0].id, "ok");
    }

    #[test]
    fn test_scores_are_clamped_not_dropped() {
        let pool = vec![clip("hi", 0.0, 20.0, 1.7), clip("lo", 30.0, 50.0, -0.2)];
        let edl = enforce(&pool, 120.0, &Constraints::default());
        assert_eq!(edl.clips.len(), 2);
        assert_eq!(edl.clips[0].score, 1.0);
        assert_eq!(edl.clips[1].score, 0.0);
    }

    #[test]
    fn test_same_start_prefers_higher_score() {
        let pool = vec![clip("low", 0.0, 30.0, 0.4), clip("high", 0.0, 25.0, 0.8)];
        let edl = enforce(&pool, 120.0, &Constraints::default());
        assert_eq!(edl.clips.len(), 1);
        assert_eq!(edl.clips[0].id, "high");
    }

    #[test]
    fn test_greedy_is_by_start_not_by_score() {
        // A later, higher-scoring clip loses to an earlier overlapping one.
        let pool = vec![clip("early", 0.0, 30.0, 0.2), clip("late", 20.0, 50.0, 0.95)];
        let edl = enforce(&pool, 120.0, &Constraints::default());
        assert_eq!(edl.clips.len(), 1);
        assert_eq!(edl.clips[0].id, "early");
    }

    #[test]
    fn test_cap_keeps_highest_scores() {
        let pool: Vec<Candidate> = (0..6)
            .map(|i| clip(&format!("k{}", i), i as f64 * 20.0, i as f64 * 20.0 + 15.0, i as f64 / 10.0))
            .collect();
        let constraints = Constraints {
            max_clips: 3,
            ..Constraints::default()
        };
        let edl = enforce(&pool, 200.0, &constraints);
        let ids: Vec<_> = edl.clips.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["k5", "k4", "k3"]);
    }

    #[test]
    fn test_enforcement_is_idempotent() {
        let pool = vec![
            clip("a", 0.0, 20.0, 0.9),
            clip("b", 15.0, 40.0, 0.8),
            clip("c", 50.0, 100.0, 1.3),
            clip("d", 60.0, 80.0, 0.6),
            clip("e", 100.0, 118.0, 0.6),
        ];
        let constraints = Constraints::default();
        let once = enforce(&pool, 120.0, &constraints);
        let again = enforce(&pool, 120.0, &constraints);
        assert_eq!(once.to_json(), again.to_json());
        let twice = enforce(&once.clips, 120.0, &constraints);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_enforced_output_never_overlaps() {
        let pool: Vec<Candidate> = (0..40)
            .map(|i| {
                let start = (i * 7 % 100) as f64;
                clip(&format!("p{}", i), start, start + 15.0 + (i % 5) as f64, (i % 10) as f64 / 9.0)
            })
            .collect();
        let constraints = Constraints {
            max_clips: 40,
            ..Constraints::default()
        };
        let edl = enforce(&pool, 200.0, &constraints);
        for (i, a) in edl.clips.iter().enumerate() {
            for b in edl.clips.iter().skip(i + 1) {
                assert!(!a.overlaps(b), "{} overlaps {}", a.id, b.id);
            }
        }
    }

    #[test]
    fn test_enforced_ids_are_unique() {
        let pool = vec![
            clip("", 0.0, 20.0, 0.9),
            clip("dup", 30.0, 50.0, 0.8),
            clip("dup", 60.0, 80.0, 0.7),
            clip("", 85.0, 110.0, 0.6),
        ];
        let edl = enforce(&pool, 120.0, &Constraints::default());
        let ids: Vec<_> = edl.clips.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["s00", "dup", "s02", "s03"]);
        assert_eq!(enforce(&edl.clips, 120.0, &Constraints::default()), edl);
    }

    #[test]
    fn test_diversity_rule_follows_constraints() {
        let constraints = Constraints {
            favor_diversity: false,
            ..Constraints::default()
        };
        let prompt = rerank_prompt(&[clip("a", 0.0, 20.0, 0.9)], 120.0, &constraints).unwrap();
        assert!(!prompt.contains("diversity"));
    }

    #[test]
    fn test_rerank_prompt_mentions_advisory_rules() {
        let prompt = rerank_prompt(&[clip("a", 0.0, 20.0, 0.9)], 120.0, &Constraints::default()).unwrap();
        assert!(prompt.contains("Select best 10 clips"));
        assert!(prompt.contains("diversity"));
        assert!(prompt.contains("strong hooks"));
        assert!(prompt.contains("\"clip_id\": \"a\""));
    }
}
