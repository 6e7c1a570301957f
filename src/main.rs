// AutoClipper Main Entry Point
// Copyright (c) 2026 Xing_The_Creator | AutoClipper

use autoclipper_core::agent::cache::{ClipCache, FileCache};
use autoclipper_core::agent::router::route;
use autoclipper_core::agent::transcription::Transcript;
use autoclipper_core::agent::validation_gate::ValidationGate;
use autoclipper_core::{
    ClipPipeline, PipelineConfig, PipelineContext, PipelineReport, ValidationResult,
};

use anyhow::Context;
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "autoclipper")]
#[command(about = "AutoClipper viral clip selector", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Select clips from a transcript and write the EDL
    Select {
        /// Word-timestamped transcript JSON
        #[arg(short, long)]
        transcript: PathBuf,

        /// Source video duration in seconds
        #[arg(short, long)]
        duration: f64,

        /// Stable source identity (URL or path); enables the cache
        #[arg(short, long)]
        source: Option<String>,

        /// Path to output EDL file
        #[arg(short, long, default_value = "edl.json")]
        output: PathBuf,

        /// Abort the run after this many seconds
        #[arg(long)]
        deadline_secs: Option<u64>,

        /// Optional JSON config file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Skip the EDL cache
        #[arg(long)]
        no_cache: bool,
    },

    /// Check an EDL against the transcript and constraints
    Validate {
        /// EDL JSON to check
        #[arg(short, long)]
        edl: PathBuf,

        #[arg(short, long)]
        transcript: PathBuf,

        #[arg(short, long)]
        duration: f64,

        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Show which backend strategy a transcript would use
    Route {
        #[arg(short, long)]
        transcript: PathBuf,

        /// Token threshold (defaults to config)
        #[arg(long)]
        threshold: Option<usize>,
    },

    /// Delete expired cache entries
    CacheClean {
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info");
    }
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    info!("--- AUTOCLIPPER v{} ---", env!("CARGO_PKG_VERSION"));

    let args = Cli::parse();

    match args.command {
        Commands::Select {
            transcript,
            duration,
            source,
            output,
            deadline_secs,
            config,
            no_cache,
        } => {
            let config = PipelineConfig::load(config.as_deref())?;
            let transcript = Transcript::load(&transcript)
                .with_context(|| format!("reading transcript {:?}", transcript))?;
            if transcript.last_timestamp() > duration {
                warn!(
                    "Transcript runs to {:.1}s, past the stated duration of {:.1}s",
                    transcript.last_timestamp(),
                    duration
                );
            }

            let mut ctx = PipelineContext::new(duration, config.constraints());
            if let Some(secs) = deadline_secs {
                ctx = ctx.with_deadline(Duration::from_secs(secs));
            }
            if let Some(source) = source {
                ctx = ctx.with_source(source);
            }

            let mut pipeline = ClipPipeline::from_config(config.clone())?;
            if !no_cache {
                let cache = FileCache::with_ttl_days(config.cache_dir(), config.cache_ttl_days)?;
                pipeline = pipeline.with_cache(Arc::new(cache) as Arc<dyn ClipCache>);
            }

            let cancel = ctx.cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("Ctrl-C received, cancelling run");
                    cancel.cancel();
                }
            });

            match pipeline.run(&transcript, &ctx).await {
                Ok(report) => {
                    write_outputs(&output, &report, &config)?;
                    info!(
                        "✅ {} clip(s) written to {:?} ({} strategy, {} repair(s))",
                        report.edl.clips.len(),
                        output,
                        report.decision.strategy,
                        report.repair_attempts
                    );
                }
                Err(e) => {
                    error!("Clip selection failed: {}", e);
                    return Err(e.into());
                }
            }
        }
        Commands::Validate {
            edl,
            transcript,
            duration,
            config,
        } => {
            let config = PipelineConfig::load(config.as_deref())?;
            let raw = fs::read_to_string(&edl).with_context(|| format!("reading EDL {:?}", edl))?;
            let transcript = Transcript::load(&transcript)?;
            let constraints = config.constraints();
            let result = ValidationGate::new(&transcript, &constraints, duration)
                .with_confidence_floor(config.confidence_floor)
                .validate_raw(&raw);
            println!("{}", serde_json::to_string_pretty(&result)?);
            ensure_valid(&result, &edl)?;
        }
        Commands::Route {
            transcript,
            threshold,
        } => {
            let config = PipelineConfig::load(None)?;
            let transcript = Transcript::load(&transcript)?;
            let threshold = threshold.unwrap_or(config.token_threshold);
            let decision = route(&transcript.full_text(), transcript.last_timestamp(), threshold);
            let model = decision.model(&config).to_string();
            println!(
                "{}",
                serde_json::to_string_pretty(&json!({ "decision": decision, "model": model }))?
            );
        }
        Commands::CacheClean { config } => {
            let config = PipelineConfig::load(config.as_deref())?;
            let cache = FileCache::with_ttl_days(config.cache_dir(), config.cache_ttl_days)?;
            let removed = cache.cleanup_expired()?;
            println!("Removed {} expired entr(ies) from {:?}", removed, cache.dir());
        }
    }

    Ok(())
}

/// Turn a failed validation into the command's error so the exit status
/// reflects it.
fn ensure_valid(result: &ValidationResult, edl: &Path) -> anyhow::Result<()> {
    if !result.valid {
        anyhow::bail!(
            "{:?} failed validation with {} error(s)",
            edl,
            result.errors.len()
        );
    }
    Ok(())
}

/// EDL plus a `manifest.json` beside it describing the run.
fn write_outputs(output: &Path, report: &PipelineReport, config: &PipelineConfig) -> anyhow::Result<()> {
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(output, serde_json::to_string_pretty(&report.edl)?)
        .with_context(|| format!("writing EDL {:?}", output))?;

    let manifest = json!({
        "edl": output.file_name().map(|n| n.to_string_lossy().to_string()),
        "strategy": report.decision.strategy,
        "model": report.decision.model(config),
        "estimated_tokens": report.decision.estimated_tokens,
        "candidate_count": report.candidate_count,
        "failed_chunks": report.failed_chunks,
        "total_chunks": report.total_chunks,
        "repair_attempts": report.repair_attempts,
        "from_cache": report.from_cache,
        "num_clips": report.edl.clips.len(),
        "total_duration_sec": report.edl.total_duration(),
    });
    let manifest_path = output.with_file_name("manifest.json");
    fs::write(&manifest_path, serde_json::to_string_pretty(&manifest)?)?;
    info!("Manifest written to {:?}", manifest_path);
    Ok(())
}
