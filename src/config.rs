// AutoClipper Pipeline Configuration
// Copyright (c) 2026 Xing_The_Creator | AutoClipper
//
// Defaults, then an optional JSON file, then AUTOCLIPPER_* environment
// overrides. `.env` is loaded by the binary before this runs.

use crate::agent::edl::Constraints;
use crate::error::{ClipError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::info;

const DEFAULT_CONFIG_FILE: &str = "autoclipper.json";
const ENV_PREFIX: &str = "AUTOCLIPPER_";

/// Which implementation serves the primary strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Generation happens inside an external workflow engine.
    Workflow,
    /// OpenAI-compatible chat completions endpoint.
    Chat,
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "workflow" | "proxy" => Ok(Self::Workflow),
            "chat" | "chat_completions" => Ok(Self::Chat),
            other => Err(format!("unknown backend '{}' (expected 'chat' or 'workflow')", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub token_threshold: usize,
    pub chunk_size_chars: usize,
    pub candidates_per_chunk: usize,
    pub min_clip_length: f64,
    pub max_clip_length: f64,
    pub max_clips: usize,
    pub require_strong_hook: bool,
    pub favor_diversity: bool,
    pub confidence_floor: f64,
    pub repair_budget: u32,
    pub transport_retries: u32,
    pub api_url: String,
    pub api_key: Option<String>,
    pub primary_model: String,
    pub long_context_model: String,
    pub primary_backend: BackendKind,
    pub request_timeout_secs: u64,
    pub cache_dir: Option<PathBuf>,
    pub cache_ttl_days: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            token_threshold: 80_000,
            chunk_size_chars: 20_000,
            candidates_per_chunk: 5,
            min_clip_length: 15.0,
            max_clip_length: 90.0,
            max_clips: 10,
            require_strong_hook: true,
            favor_diversity: true,
            confidence_floor: 0.75,
            repair_budget: 3,
            transport_retries: 3,
            api_url: "http://localhost:11434/v1".to_string(),
            api_key: None,
            primary_model: "llama3:latest".to_string(),
            long_context_model: "gemini-1.5-pro-latest".to_string(),
            primary_backend: BackendKind::Chat,
            request_timeout_secs: 120,
            cache_dir: None,
            cache_ttl_days: 7,
        }
    }
}

impl PipelineConfig {
    /// Load from `path` (or `autoclipper.json` in the working directory when
    /// present), apply environment overrides and validate.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => {
                info!("[CONFIG] Using default pipeline configuration");
                Self::default()
            }
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            ClipError::Configuration(format!("cannot read config {:?}: {}", path, e))
        })?;
        let config = serde_json::from_str(&content).map_err(|e| {
            ClipError::Configuration(format!("invalid config {:?}: {}", path, e))
        })?;
        info!("[CONFIG] Loaded pipeline configuration from {:?}", path);
        Ok(config)
    }

    /// Overlay values from an environment-style lookup. A value that is set
    /// but does not parse is an error rather than a silent default.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        override_from(&lookup, "TOKEN_THRESHOLD", &mut self.token_threshold)?;
        override_from(&lookup, "CHUNK_SIZE", &mut self.chunk_size_chars)?;
        override_from(&lookup, "CANDIDATES_PER_CHUNK", &mut self.candidates_per_chunk)?;
        override_from(&lookup, "MIN_CLIP_LENGTH", &mut self.min_clip_length)?;
        override_from(&lookup, "MAX_CLIP_LENGTH", &mut self.max_clip_length)?;
        override_from(&lookup, "MAX_CLIPS", &mut self.max_clips)?;
        override_from(&lookup, "REQUIRE_STRONG_HOOK", &mut self.require_strong_hook)?;
        override_from(&lookup, "FAVOR_DIVERSITY", &mut self.favor_diversity)?;
        override_from(&lookup, "CONFIDENCE_FLOOR", &mut self.confidence_floor)?;
        override_from(&lookup, "REPAIR_BUDGET", &mut self.repair_budget)?;
        override_from(&lookup, "TRANSPORT_RETRIES", &mut self.transport_retries)?;
        override_from(&lookup, "API_URL", &mut self.api_url)?;
        override_from(&lookup, "PRIMARY_MODEL", &mut self.primary_model)?;
        override_from(&lookup, "LONG_CONTEXT_MODEL", &mut self.long_context_model)?;
        override_from(&lookup, "PRIMARY_BACKEND", &mut self.primary_backend)?;
        override_from(&lookup, "REQUEST_TIMEOUT_SECS", &mut self.request_timeout_secs)?;
        override_from(&lookup, "CACHE_TTL_DAYS", &mut self.cache_ttl_days)?;

        if let Some(key) = lookup(&format!("{}API_KEY", ENV_PREFIX)) {
            self.api_key = Some(key);
        }
        if let Some(dir) = lookup(&format!("{}CACHE_DIR", ENV_PREFIX)) {
            self.cache_dir = Some(PathBuf::from(dir));
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.chunk_size_chars == 0 {
            return Err(ClipError::Configuration("chunk size must be positive".into()));
        }
        if self.token_threshold == 0 {
            return Err(ClipError::Configuration("token threshold must be positive".into()));
        }
        if self.max_clips == 0 {
            return Err(ClipError::Configuration("max_clips must be at least 1".into()));
        }
        if !(self.min_clip_length > 0.0) || !self.max_clip_length.is_finite() {
            return Err(ClipError::Configuration(
                "clip length bounds must be positive and finite".into(),
            ));
        }
        if self.min_clip_length >= self.max_clip_length {
            return Err(ClipError::Configuration(format!(
                "min_clip_length ({}) must be below max_clip_length ({})",
                self.min_clip_length, self.max_clip_length
            )));
        }
        if !(0.0..=1.0).contains(&self.confidence_floor) {
            return Err(ClipError::Configuration(format!(
                "confidence floor {} outside [0, 1]",
                self.confidence_floor
            )));
        }
        if self.api_url.trim().is_empty() {
            return Err(ClipError::Configuration("api_url must not be empty".into()));
        }
        Ok(())
    }

    pub fn constraints(&self) -> Constraints {
        Constraints {
            min_clip_length: self.min_clip_length,
            max_clip_length: self.max_clip_length,
            max_clips: self.max_clips,
            require_strong_hook: self.require_strong_hook,
            favor_diversity: self.favor_diversity,
        }
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.cache_dir.clone().unwrap_or_else(|| {
            dirs::cache_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("autoclipper")
                .join("edl")
        })
    }
}

fn override_from<F, T>(lookup: &F, suffix: &str, slot: &mut T) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let key = format!("{}{}", ENV_PREFIX, suffix);
    if let Some(raw) = lookup(&key) {
        *slot = raw
            .trim()
            .parse()
            .map_err(|e| ClipError::Configuration(format!("{}='{}': {}", key, raw, e)))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_match_documented_values() {
        let config = PipelineConfig::default();
        assert_eq!(config.token_threshold, 80_000);
        assert_eq!(config.chunk_size_chars, 20_000);
        assert_eq!(config.min_clip_length, 15.0);
        assert_eq!(config.max_clip_length, 90.0);
        assert_eq!(config.max_clips, 10);
        assert_eq!(config.confidence_floor, 0.75);
        assert_eq!(config.repair_budget, 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_overrides_apply() {
        let mut config = PipelineConfig::default();
        config
            .apply_env(lookup_from(&[
                ("AUTOCLIPPER_MAX_CLIPS", "4"),
                ("AUTOCLIPPER_CHUNK_SIZE", "500"),
                ("AUTOCLIPPER_PRIMARY_BACKEND", "workflow"),
                ("AUTOCLIPPER_API_KEY", "secret"),
            ]))
            .unwrap();
        assert_eq!(config.max_clips, 4);
        assert_eq!(config.chunk_size_chars, 500);
        assert_eq!(config.primary_backend, BackendKind::Workflow);
        assert_eq!(config.api_key.as_deref(), Some("secret"));
    }

    #[test]
    fn test_advisory_rules_are_configurable() {
        let mut config = PipelineConfig::default();
        assert!(config.constraints().favor_diversity);
        config
            .apply_env(lookup_from(&[
                ("AUTOCLIPPER_FAVOR_DIVERSITY", "false"),
                ("AUTOCLIPPER_REQUIRE_STRONG_HOOK", "false"),
            ]))
            .unwrap();
        let constraints = config.constraints();
        assert!(!constraints.favor_diversity);
        assert!(!constraints.require_strong_hook);
    }

    #[test]
    fn test_unparseable_env_value_is_configuration_error() {
        let mut config = PipelineConfig::default();
        let err = config
            .apply_env(lookup_from(&[("AUTOCLIPPER_MAX_CLIPS", "ten")]))
            .unwrap_err();
        assert!(matches!(err, ClipError::Configuration(_)));
    }

    #[test]
    fn test_inverted_length_bounds_rejected() {
        let config = PipelineConfig {
            min_clip_length: 90.0,
            max_clip_length: 15.0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ClipError::Configuration(_))));
    }

    #[test]
    fn test_partial_json_file_keeps_defaults() {
        let parsed: PipelineConfig = serde_json::from_str(r#"{"max_clips": 3}"#).unwrap();
        assert_eq!(parsed.max_clips, 3);
        assert_eq!(parsed.min_clip_length, 15.0);
    }
}
