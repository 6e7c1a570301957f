// AutoClipper Validation Gate - EDL Schema & Business-Rule Checker
// Copyright (c) 2026 Xing_The_Creator | AutoClipper
//
// Observes a candidate EDL (raw text, JSON value or typed) and reports every
// violation it can find. Never mutates its input.

use crate::agent::edl::{Candidate, Constraints, Edl, ValidationResult};
use crate::agent::gpt_oss_bridge::extract_json;
use crate::agent::transcription::Transcript;
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::collections::HashSet;
use tracing::{info, warn};

const NUMERIC_FIELDS: &[&str] = &["start_sec", "end_sec", "score"];
const TEXT_FIELDS: &[&str] = &["clip_id", "title", "hook_text", "reason"];

pub const DEFAULT_CONFIDENCE_FLOOR: f64 = 0.75;

pub struct ValidationGate<'a> {
    transcript: &'a Transcript,
    constraints: &'a Constraints,
    duration_sec: f64,
    confidence_floor: f64,
}

/// A clip whose required fields are all present and well-typed.
struct CheckedClip {
    label: String,
    start: f64,
    end: f64,
}

impl<'a> ValidationGate<'a> {
    pub fn new(transcript: &'a Transcript, constraints: &'a Constraints, duration_sec: f64) -> Self {
        Self {
            transcript,
            constraints,
            duration_sec,
            confidence_floor: DEFAULT_CONFIDENCE_FLOOR,
        }
    }

    pub fn with_confidence_floor(mut self, floor: f64) -> Self {
        self.confidence_floor = floor;
        self
    }

    /// Validate unparsed model output.
    pub fn validate_raw(&self, raw: &str) -> ValidationResult {
        match extract_json(raw) {
            Ok(value) => self.validate_value(&value),
            Err(e) => {
                warn!("[VALIDATION] JSON parse error: {}", e);
                ValidationResult::invalid(vec![format!("Invalid JSON: {}", e)])
            }
        }
    }

    pub fn validate_edl(&self, edl: &Edl) -> ValidationResult {
        match serde_json::to_value(edl) {
            Ok(value) => self.validate_value(&value),
            Err(e) => ValidationResult::invalid(vec![format!("Invalid JSON: {}", e)]),
        }
    }

    pub fn validate_value(&self, value: &Value) -> ValidationResult {
        let clips = match value.get("clips") {
            Some(Value::Array(clips)) => clips,
            Some(_) => return ValidationResult::invalid(vec!["'clips' must be a list".to_string()]),
            None => {
                return ValidationResult::invalid(vec!["EDL must have 'clips' field".to_string()])
            }
        };

        let mut errors = Vec::new();
        if clips.is_empty() {
            errors.push("EDL has no clips".to_string());
        }
        if clips.len() > self.constraints.max_clips {
            errors.push(format!(
                "EDL has {} clips, more than max_clips ({})",
                clips.len(),
                self.constraints.max_clips
            ));
        }

        let mut complete = Vec::with_capacity(clips.len());
        let mut seen_ids: HashSet<&str> = HashSet::new();

        for (index, clip) in clips.iter().enumerate() {
            let Some(fields) = clip.as_object() else {
                errors.push(format!("Clip #{} is not an object", index + 1));
                continue;
            };
            if let Some(id) = fields.get("clip_id").and_then(Value::as_str) {
                if id.trim().is_empty() {
                    errors.push(format!("Clip #{} has empty clip_id", index + 1));
                } else if !seen_ids.insert(id) {
                    errors.push(format!("Duplicate clip_id '{}'", id));
                }
            }
            if let Some(checked) = self.check_fields(index, fields, &mut errors) {
                self.check_rules(&checked, fields, &mut errors);
                complete.push(checked);
            }
        }

        errors.extend(overlap_errors(&mut complete));

        if !errors.is_empty() {
            warn!(
                "[VALIDATION] ❌ {} violation(s) across {} clip(s)",
                errors.len(),
                clips.len()
            );
            return ValidationResult::invalid(errors);
        }

        match serde_json::from_value::<Vec<Candidate>>(Value::Array(clips.clone())) {
            Ok(parsed) => {
                info!("[VALIDATION] ✅ EDL verified: {} clip(s)", parsed.len());
                ValidationResult::valid(Edl::new(parsed, self.duration_sec))
            }
            Err(e) => ValidationResult::invalid(vec![format!("Schema validation failed: {}", e)]),
        }
    }

    /// Presence and type checks. Returns `None` when the clip is too
    /// incomplete to reason about numerically.
    fn check_fields(
        &self,
        index: usize,
        fields: &Map<String, Value>,
        errors: &mut Vec<String>,
    ) -> Option<CheckedClip> {
        let label = fields
            .get("clip_id")
            .and_then(Value::as_str)
            .filter(|id| !id.trim().is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("#{}", index + 1));

        let mut complete = true;
        for name in TEXT_FIELDS {
            match fields.get(*name) {
                None | Some(Value::Null) => {
                    errors.push(format!("Clip '{}' missing required field '{}'", label, name));
                    complete = false;
                }
                Some(Value::String(_)) => {}
                Some(_) => errors.push(format!("Clip '{}' field '{}' must be a string", label, name)),
            }
        }
        for name in NUMERIC_FIELDS {
            match fields.get(*name) {
                None | Some(Value::Null) => {
                    errors.push(format!("Clip '{}' missing required field '{}'", label, name));
                    complete = false;
                }
                Some(v) if v.is_number() => {}
                Some(_) => {
                    errors.push(format!("Clip '{}' field '{}' must be a number", label, name));
                    complete = false;
                }
            }
        }

        if !complete {
            return None;
        }
        Some(CheckedClip {
            label,
            start: number(fields, "start_sec"),
            end: number(fields, "end_sec"),
        })
    }

    fn check_rules(&self, clip: &CheckedClip, fields: &Map<String, Value>, errors: &mut Vec<String>) {
        let label = &clip.label;

        if clip.start < 0.0 {
            errors.push(format!("Clip '{}' has negative start time", label));
        }
        if clip.end > self.duration_sec {
            errors.push(format!(
                "Clip '{}' exceeds video duration ({}s)",
                label, self.duration_sec
            ));
        }
        if clip.start >= clip.end {
            errors.push(format!("Clip '{}' has invalid time range", label));
        } else {
            let length = clip.end - clip.start;
            if length < self.constraints.min_clip_length {
                errors.push(format!(
                    "Clip '{}' too short ({:.1}s < {}s)",
                    label, length, self.constraints.min_clip_length
                ));
            }
            if length > self.constraints.max_clip_length {
                errors.push(format!(
                    "Clip '{}' too long ({:.1}s > {}s)",
                    label, length, self.constraints.max_clip_length
                ));
            }
        }

        let score = number(fields, "score");
        if !(0.0..=1.0).contains(&score) {
            errors.push(format!("Clip '{}' has invalid score", label));
        }

        if let Some(confidence) = self.transcript.mean_confidence(clip.start, clip.end) {
            if confidence < self.confidence_floor {
                errors.push(format!(
                    "Clip '{}' has low transcription quality (confidence {:.2} < {})",
                    label, confidence, self.confidence_floor
                ));
            }
        }
    }
}

fn number(fields: &Map<String, Value>, name: &str) -> f64 {
    fields.get(name).and_then(Value::as_f64).unwrap_or(f64::NAN)
}

/// Every adjacent pair, by start time, whose intervals intersect.
fn overlap_errors(clips: &mut [CheckedClip]) -> Vec<String> {
    clips.sort_by(|a, b| a.start.partial_cmp(&b.start).unwrap_or(Ordering::Equal));
    clips
        .windows(2)
        .filter(|pair| pair[0].end > pair[1].start)
        .map(|pair| {
            format!(
                "Clips '{}' and '{}' overlap: [{}-{}] vs [{}-{}]",
                pair[0].label, pair[1].label, pair[0].start, pair[0].end, pair[1].start, pair[1].end
            )
        })
        .collect()
}
