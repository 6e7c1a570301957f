// AutoClipper Edit Decision List Types
// Copyright (c) 2026 Xing_The_Creator | AutoClipper

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;

/// Fields every clip in a final EDL must carry.
pub const REQUIRED_FIELDS: &[&str] = &[
    "clip_id",
    "start_sec",
    "end_sec",
    "title",
    "hook_text",
    "score",
    "reason",
];

/// A proposed clip. Comes from the model, so nothing here is trusted until
/// it has been through enforcement or validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    #[serde(rename = "clip_id", default)]
    pub id: String,
    pub start_sec: f64,
    pub end_sec: f64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub hook_text: String,
    pub score: f64,
    #[serde(default)]
    pub reason: String,
}

impl Candidate {
    pub fn new(id: &str, start_sec: f64, end_sec: f64, score: f64) -> Self {
        Self {
            id: id.to_string(),
            start_sec,
            end_sec,
            title: String::new(),
            hook_text: String::new(),
            score,
            reason: String::new(),
        }
    }

    pub fn length(&self) -> f64 {
        self.end_sec - self.start_sec
    }

    /// Half-open interval intersection: touching endpoints do not overlap.
    pub fn overlaps(&self, other: &Candidate) -> bool {
        self.start_sec < other.end_sec && other.start_sec < self.end_sec
    }

    pub fn with_score(&self, score: f64) -> Self {
        Self {
            score,
            ..self.clone()
        }
    }
}

/// Lenient read of a model payload: `{"clips": [...]}` or a bare list.
/// Entries that do not deserialize are skipped; the count of skipped
/// entries is returned alongside the survivors. Text fields and the id may
/// be absent; timestamps and score may not.
pub fn candidates_from_value(value: &Value) -> Result<(Vec<Candidate>, usize), String> {
    read_candidates(value, |_| true)
}

/// Like [`candidates_from_value`], but an entry missing any of
/// [`REQUIRED_FIELDS`] is skipped instead of defaulted.
pub fn complete_candidates_from_value(value: &Value) -> Result<(Vec<Candidate>, usize), String> {
    read_candidates(value, |item| {
        REQUIRED_FIELDS
            .iter()
            .all(|name| !matches!(item.get(*name), None | Some(Value::Null)))
    })
}

fn read_candidates<F>(value: &Value, accept: F) -> Result<(Vec<Candidate>, usize), String>
where
    F: Fn(&Value) -> bool,
{
    let items = match value {
        Value::Array(items) => items,
        Value::Object(map) => match map.get("clips") {
            Some(Value::Array(items)) => items,
            Some(_) => return Err("'clips' is not a list".to_string()),
            None => return Err("response has no 'clips' list".to_string()),
        },
        _ => return Err("response is not a JSON object".to_string()),
    };

    let mut clips = Vec::with_capacity(items.len());
    let mut skipped = 0;
    for item in items {
        if !accept(item) {
            skipped += 1;
            continue;
        }
        match serde_json::from_value::<Candidate>(item.clone()) {
            Ok(clip) => clips.push(clip),
            Err(_) => skipped += 1,
        }
    }
    Ok((clips, skipped))
}

/// Keep each id the first time it is seen; give empty or repeated ids a
/// fresh one from `fallback(n)`, where `n` is the clip's position.
pub fn assign_unique_ids<F>(clips: Vec<Candidate>, seen: &mut HashSet<String>, fallback: F) -> Vec<Candidate>
where
    F: Fn(usize) -> String,
{
    clips
        .into_iter()
        .enumerate()
        .map(|(n, clip)| {
            let id = clip.id.trim().to_string();
            let id = if id.is_empty() || seen.contains(&id) {
                let mut fresh = fallback(n);
                while seen.contains(&fresh) {
                    fresh.push('x');
                }
                fresh
            } else {
                id
            };
            seen.insert(id.clone());
            Candidate { id, ..clip }
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edl {
    pub clips: Vec<Candidate>,
    #[serde(default)]
    pub duration_sec: f64,
}

impl Edl {
    pub fn new(clips: Vec<Candidate>, duration_sec: f64) -> Self {
        Self { clips, duration_sec }
    }

    pub fn to_json(&self) -> String {
        // Plain data with string keys; serialization cannot fail.
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }

    pub fn total_duration(&self) -> f64 {
        self.clips.iter().map(Candidate::length).sum()
    }
}

/// Business rules for selection. `require_strong_hook` and
/// `favor_diversity` are only passed to the model as instructions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Constraints {
    pub min_clip_length: f64,
    pub max_clip_length: f64,
    pub max_clips: usize,
    pub require_strong_hook: bool,
    pub favor_diversity: bool,
}

impl Default for Constraints {
    fn default() -> Self {
        Self {
            min_clip_length: 15.0,
            max_clip_length: 90.0,
            max_clips: 10,
            require_strong_hook: true,
            favor_diversity: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<String>,
    pub edl: Option<Edl>,
}

impl ValidationResult {
    pub fn valid(edl: Edl) -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
            edl: Some(edl),
        }
    }

    pub fn invalid(errors: Vec<String>) -> Self {
        Self {
            valid: false,
            errors,
            edl: None,
        }
    }

    /// Human-readable block handed to the repair prompt.
    pub fn error_block(&self) -> String {
        self.errors
            .iter()
            .map(|e| format!("- {}", e))
            .collect::<Vec<_>>()
            .join("\n")
    }
}
