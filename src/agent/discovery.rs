// AutoClipper Candidate Discovery
// Copyright (c) 2026 Xing_The_Creator | AutoClipper
//
// Splits the transcript into fixed-size character chunks, asks the model for
// a handful of locally strong clips per chunk, and merges the answers in
// chunk order. A chunk that fails is recorded and skipped; it never aborts
// the run.

use crate::agent::edl::{assign_unique_ids, candidates_from_value, Candidate, Constraints};
use crate::agent::gpt_oss_bridge::{generate_supervised, GenerationRequest, ModelGateway};
use crate::agent::supervisor::RetryPolicy;
use crate::error::{ClipError, Result};
use futures::stream::{self, StreamExt};
use std::collections::HashSet;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Chunk requests allowed in flight at once.
const MAX_IN_FLIGHT: usize = 4;

#[derive(Debug, Clone, PartialEq)]
pub enum ChunkOutcome {
    Candidates { index: usize, clips: Vec<Candidate> },
    Failed { index: usize, reason: String },
}

impl ChunkOutcome {
    pub fn index(&self) -> usize {
        match self {
            ChunkOutcome::Candidates { index, .. } | ChunkOutcome::Failed { index, .. } => *index,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, ChunkOutcome::Failed { .. })
    }
}

#[derive(Debug, Clone, Default)]
pub struct DiscoveryReport {
    /// Merged pool, chunk order, duplicates and overlaps unresolved.
    pub candidates: Vec<Candidate>,
    pub outcomes: Vec<ChunkOutcome>,
}

impl DiscoveryReport {
    pub fn total_chunks(&self) -> usize {
        self.outcomes.len()
    }

    pub fn failed_chunks(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_failed()).count()
    }
}

/// Split on character boundaries into pieces of at most `size` characters.
pub fn chunk_text(text: &str, size: usize) -> Vec<&str> {
    let size = size.max(1);
    let mut chunks = Vec::new();
    let mut start = 0;
    let mut count = 0;

    for (idx, _) in text.char_indices() {
        if count == size {
            chunks.push(&text[start..idx]);
            start = idx;
            count = 0;
        }
        count += 1;
    }
    if start < text.len() {
        chunks.push(&text[start..]);
    }
    chunks
}

pub struct CandidateDiscoverer {
    gateway: Arc<dyn ModelGateway>,
    chunk_size: usize,
    per_chunk: usize,
    retry: RetryPolicy,
}

impl CandidateDiscoverer {
    pub fn new(gateway: Arc<dyn ModelGateway>, chunk_size: usize, per_chunk: usize) -> Self {
        Self {
            gateway,
            chunk_size,
            per_chunk: per_chunk.max(1),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub async fn discover(
        &self,
        text: &str,
        duration_sec: f64,
        constraints: &Constraints,
        cancel: &CancellationToken,
    ) -> Result<DiscoveryReport> {
        let chunks = chunk_text(text, self.chunk_size);
        let total = chunks.len();
        info!(
            "[DISCOVERY] Scanning {} chunk(s) of up to {} chars with '{}'",
            total,
            self.chunk_size,
            self.gateway.name()
        );

        // `buffered` yields in submission order regardless of completion order.
        let results: Vec<Result<ChunkOutcome>> = stream::iter(chunks.into_iter().enumerate())
            .map(|(index, chunk)| {
                self.discover_chunk(index, total, chunk, duration_sec, constraints, cancel)
            })
            .buffered(MAX_IN_FLIGHT)
            .collect()
            .await;

        let mut outcomes = Vec::with_capacity(total);
        for result in results {
            outcomes.push(result?);
        }

        let candidates = merge_outcomes(&outcomes);
        let report = DiscoveryReport {
            candidates,
            outcomes,
        };
        info!(
            "[DISCOVERY] {} candidate(s) from {}/{} chunk(s)",
            report.candidates.len(),
            report.total_chunks() - report.failed_chunks(),
            report.total_chunks()
        );
        Ok(report)
    }

    async fn discover_chunk(
        &self,
        index: usize,
        total: usize,
        chunk: &str,
        duration_sec: f64,
        constraints: &Constraints,
        cancel: &CancellationToken,
    ) -> Result<ChunkOutcome> {
        let request = GenerationRequest::discovery(self.prompt(
            index,
            total,
            chunk,
            duration_sec,
            constraints,
        ));
        let task = format!("discover chunk {}/{}", index + 1, total);

        let value = match generate_supervised(
            self.gateway.as_ref(),
            &task,
            &request,
            self.retry,
            cancel,
        )
        .await
        {
            Ok(value) => value,
            // Cancellation and bad configuration are run-level failures.
            Err(e @ ClipError::Cancelled(_)) | Err(e @ ClipError::Configuration(_)) => {
                return Err(e)
            }
            Err(e) => {
                warn!("[DISCOVERY] Chunk {} skipped: {}", index + 1, e);
                return Ok(ChunkOutcome::Failed {
                    index,
                    reason: e.to_string(),
                });
            }
        };

        match candidates_from_value(&value) {
            Ok((mut clips, skipped)) => {
                if skipped > 0 {
                    warn!(
                        "[DISCOVERY] Chunk {}: dropped {} unreadable entr(ies)",
                        index + 1,
                        skipped
                    );
                }
                clips.truncate(self.per_chunk);
                Ok(ChunkOutcome::Candidates { index, clips })
            }
            Err(reason) => {
                warn!("[DISCOVERY] Chunk {} skipped: {}", index + 1, reason);
                Ok(ChunkOutcome::Failed { index, reason })
            }
        }
    }

    fn prompt(
        &self,
        index: usize,
        total: usize,
        chunk: &str,
        duration_sec: f64,
        constraints: &Constraints,
    ) -> String {
        format!(
            "Find viral short-form clip candidates in this part of a long video transcript.\n\
             Each clip must stand alone and open with a hook.\n\n\
             Transcript chunk ({}/{}):\n{}\n\n\
             Video duration: {} seconds\n\
             Min clip length: {}s\n\
             Max clip length: {}s\n\n\
             Find up to {} clip candidates in this chunk. Return JSON only:\n\
             {{\"clips\": [{{\"clip_id\": string, \"start_sec\": number, \"end_sec\": number, \
             \"title\": string, \"hook_text\": string, \"score\": number (0.0-1.0), \"reason\": string}}]}}",
            index + 1,
            total,
            chunk,
            duration_sec,
            constraints.min_clip_length,
            constraints.max_clip_length,
            self.per_chunk
        )
    }
}

/// Concatenate successful chunks in index order, giving every candidate an
/// id that is unique within the run.
fn merge_outcomes(outcomes: &[ChunkOutcome]) -> Vec<Candidate> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut merged = Vec::new();

    for outcome in outcomes {
        if let ChunkOutcome::Candidates { index, clips } = outcome {
            let index = *index;
            merged.extend(assign_unique_ids(clips.clone(), &mut seen, |n| {
                format!("c{:02}_{:02}", index, n)
            }));
        }
    }
    merged
}
