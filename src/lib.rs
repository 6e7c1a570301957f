// AutoClipper Core Library
// Copyright (c) 2026 Xing_The_Creator | AutoClipper

pub mod agent;
pub mod config;
pub mod error;

pub use agent::edl::{Candidate, Constraints, Edl, ValidationResult};
pub use agent::unified_pipeline::{ClipPipeline, PipelineContext, PipelineReport};
pub use config::PipelineConfig;
pub use error::{ClipError, Result};
