// AutoClipper Agent Modules
// Copyright (c) 2026 Xing_The_Creator | AutoClipper

pub mod cache;
pub mod discovery;
pub mod edl;
pub mod gpt_oss_bridge;
pub mod repair;
pub mod router;
pub mod selector;
pub mod supervisor;
pub mod transcription;
pub mod unified_pipeline;
pub mod validation_gate;
