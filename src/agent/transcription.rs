// AutoClipper Transcript View
// Copyright (c) 2026 Xing_The_Creator | AutoClipper
//
// Read-only accessors over the word-timestamped transcript produced by the
// external aligner: flattened text for prompting and per-range confidence
// for validation.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptWord {
    #[serde(alias = "word")]
    pub text: String,
    /// The aligner leaves timestamps off tokens it could not place.
    #[serde(default)]
    pub start: Option<f64>,
    #[serde(default)]
    pub end: Option<f64>,
    #[serde(default, alias = "score")]
    pub confidence: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptSegment {
    pub start: f64,
    pub end: f64,
    pub text: String,
    #[serde(default)]
    pub words: Vec<TranscriptWord>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
    #[serde(default)]
    pub segments: Vec<TranscriptSegment>,
}

impl Transcript {
    pub fn new(segments: Vec<TranscriptSegment>) -> Self {
        Self { segments }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let transcript: Transcript = serde_json::from_str(&content)?;
        info!(
            "[TRANSCRIPT] Loaded {} segments from {:?}",
            transcript.segments.len(),
            path
        );
        Ok(transcript)
    }

    /// Segment texts, one per line.
    pub fn full_text(&self) -> String {
        self.segments
            .iter()
            .map(|s| s.text.trim())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Mean confidence of the scored words whose start lies in
    /// `[start_sec, end_sec]`. `None` when no scored word falls in range.
    /// Every word is considered; aligned words can drift past their
    /// segment's bounds.
    pub fn mean_confidence(&self, start_sec: f64, end_sec: f64) -> Option<f64> {
        let (sum, count) = self
            .segments
            .iter()
            .flat_map(|seg| seg.words.iter())
            .filter_map(|w| match (w.start, w.confidence) {
                (Some(t), Some(c)) if t >= start_sec && t <= end_sec => Some(c),
                _ => None,
            })
            .fold((0.0, 0usize), |(sum, n), c| (sum + c, n + 1));

        if count == 0 {
            None
        } else {
            Some(sum / count as f64)
        }
    }

    /// End of the last segment; a lower bound on the media duration.
    pub fn last_timestamp(&self) -> f64 {
        self.segments.last().map(|s| s.end).unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn word(text: &str, start: f64, confidence: Option<f64>) -> TranscriptWord {
        TranscriptWord {
            text: text.to_string(),
            start: Some(start),
            end: Some(start + 0.4),
            confidence,
        }
    }

    fn sample() -> Transcript {
        Transcript::new(vec![
            TranscriptSegment {
                start: 0.0,
                end: 5.0,
                text: " Hello there ".to_string(),
                words: vec![word("Hello", 0.5, Some(0.9)), word("there", 1.0, Some(0.7))],
            },
            TranscriptSegment {
                start: 5.0,
                end: 10.0,
                text: "General Kenobi".to_string(),
                words: vec![word("General", 6.0, None), word("Kenobi", 7.0, Some(0.2))],
            },
        ])
    }

    #[test]
    fn test_full_text_joins_trimmed_segments() {
        assert_eq!(sample().full_text(), "Hello there\nGeneral Kenobi");
    }

    #[test]
    fn test_mean_confidence_ignores_unscored_words() {
        let t = sample();
        let mean = t.mean_confidence(0.0, 10.0).unwrap();
        assert!((mean - 0.6).abs() < 1e-9);
        assert_eq!(t.mean_confidence(6.0, 6.5), None);
        assert_eq!(t.mean_confidence(20.0, 30.0), None);
    }

    #[test]
    fn test_range_is_inclusive_at_both_ends() {
        let t = sample();
        assert_eq!(t.mean_confidence(0.5, 0.5), Some(0.9));
        assert_eq!(t.mean_confidence(0.6, 1.0), Some(0.7));
    }

    #[test]
    fn test_word_outside_its_segment_still_counts() {
        let t = Transcript::new(vec![TranscriptSegment {
            start: 10.0,
            end: 12.0,
            text: "late".to_string(),
            words: vec![word("late", 12.6, Some(0.3))],
        }]);
        assert_eq!(t.mean_confidence(12.5, 30.0), Some(0.3));
    }

    #[test]
    fn test_aligner_field_names_accepted() {
        let json = r#"{"segments":[{"start":0,"end":2,"text":"hi","words":[{"word":"hi","start":0.1,"end":0.3,"score":0.8},{"word":"42"}]}]}"#;
        let t: Transcript = serde_json::from_str(json).unwrap();
        let words = &t.segments[0].words;
        assert_eq!(words[0].text, "hi");
        assert_eq!(words[0].confidence, Some(0.8));
        assert_eq!(words[1].start, None);
    }
}
