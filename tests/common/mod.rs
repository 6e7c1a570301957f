// Scripted stand-in for a generation backend.

#![allow(dead_code)]

use async_trait::async_trait;
use autoclipper_core::agent::gpt_oss_bridge::{GenerationRequest, ModelGateway};
use autoclipper_core::agent::transcription::{Transcript, TranscriptSegment, TranscriptWord};
use autoclipper_core::error::Result;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tokio_util::sync::CancellationToken;

pub type Script = Box<dyn Fn(&GenerationRequest, usize) -> Result<Value> + Send + Sync>;

/// Answers every request through `script`, counting calls per stage.
/// Stages are told apart by temperature.
pub struct ScriptedGateway {
    script: Script,
    calls: AtomicUsize,
    repair_calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedGateway {
    pub fn new<F>(script: F) -> Self
    where
        F: Fn(&GenerationRequest, usize) -> Result<Value> + Send + Sync + 'static,
    {
        Self {
            script: Box::new(script),
            calls: AtomicUsize::new(0),
            repair_calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn repair_calls(&self) -> usize {
        self.repair_calls.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl ModelGateway for ScriptedGateway {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate(
        &self,
        request: &GenerationRequest,
        _cancel: &CancellationToken,
    ) -> Result<Value> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if is_repair(request) {
            self.repair_calls.fetch_add(1, Ordering::SeqCst);
        }
        self.prompts.lock().unwrap().push(request.prompt.clone());
        (self.script)(request, n)
    }
}

pub fn is_discovery(request: &GenerationRequest) -> bool {
    request.temperature > 0.25
}

pub fn is_rerank(request: &GenerationRequest) -> bool {
    request.temperature > 0.1 && request.temperature <= 0.25
}

pub fn is_repair(request: &GenerationRequest) -> bool {
    request.temperature == 0.0
}

pub fn clip(id: &str, start: f64, end: f64, score: f64) -> Value {
    json!({
        "clip_id": id,
        "start_sec": start,
        "end_sec": end,
        "title": format!("Clip {}", id),
        "hook_text": "You won't believe this",
        "score": score,
        "reason": "strong hook"
    })
}

/// Two-minute talk; words in the 60-80s range were poorly transcribed.
pub fn sample_transcript() -> Transcript {
    let segment = |start: f64, end: f64, text: &str, confidence: f64| TranscriptSegment {
        start,
        end,
        text: text.to_string(),
        words: text
            .split_whitespace()
            .enumerate()
            .map(|(i, w)| TranscriptWord {
                text: w.to_string(),
                start: Some(start + i as f64),
                end: Some(start + i as f64 + 0.8),
                confidence: Some(confidence),
            })
            .collect(),
    };
    Transcript::new(vec![
        segment(0.0, 30.0, "Nobody tells you this about starting a company", 0.95),
        segment(30.0, 60.0, "We lost everything in the first year and kept going", 0.92),
        segment(60.0, 80.0, "mumble static crowd noise unclear words here", 0.40),
        segment(80.0, 120.0, "Here is the one habit that changed my entire life", 0.97),
    ])
}
