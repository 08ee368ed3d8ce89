//! Story video generator binary.

use anyhow::Context;
use clap::{Parser, Subcommand};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use storyreel_models::{CostTable, EncoderSettings, GenerationRequest, PostId, PostRecord};
use storyreel_worker::{
    Capabilities, CapabilityEndpoints, GenerationLauncher, GenerationOrchestrator,
    InMemoryPostStore, LogReviewNotifier, PostStore, WorkerConfig,
};

#[derive(Debug, Parser)]
#[command(name = "storyreel", version, about = "Generate short vertical videos from stories")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Generate a video for a request file
    Generate {
        /// JSON generation request
        request: PathBuf,
        /// Post id to record the generation under
        #[arg(long)]
        post_id: Option<String>,
    },
    /// Estimate the cost of a request without generating anything
    Estimate {
        /// JSON generation request
        request: PathBuf,
    },
    /// Check capability liveness
    Health,
}

#[tokio::main]
async fn main() {
    // Load environment variables
    dotenvy::dotenv().ok();

    if let Err(e) = init_tracing() {
        eprintln!("Failed to initialize logging: {e:#}");
        std::process::exit(1);
    }

    let cli = Cli::parse();
    let metrics = install_metrics();

    let outcome = run(cli).await;

    if let Some(handle) = metrics {
        eprintln!("{}", handle.render());
    }

    match outcome {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            error!("{:#}", e);
            std::process::exit(1);
        }
    }
}

/// Colored output for dev, JSON for production. Logs go to stderr so stdout
/// carries only command output.
fn init_tracing() -> anyhow::Result<()> {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::from_default_env()
        .add_directive("storyreel=info".parse()?)
        .add_directive("storyreel_worker=info".parse()?)
        .add_directive("storyreel_media=info".parse()?);

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .with(env_filter)
            .try_init()?;
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .try_init()?;
    }
    Ok(())
}

/// Prometheus recorder when `METRICS_ENABLED` is set; rendered on exit.
fn install_metrics() -> Option<PrometheusHandle> {
    let enabled = std::env::var("METRICS_ENABLED")
        .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false);
    if !enabled {
        return None;
    }
    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => Some(handle),
        Err(e) => {
            warn!("Failed to install metrics recorder: {}", e);
            None
        }
    }
}

async fn load_request(path: &Path) -> anyhow::Result<GenerationRequest> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))
}

fn build_launcher(store: Arc<dyn PostStore>) -> anyhow::Result<GenerationLauncher> {
    let config = WorkerConfig::from_env();
    config.validate()?;
    let endpoints = CapabilityEndpoints::from_env();
    info!("Worker config: {:?}", config);

    let mut settings = EncoderSettings::default();
    if let Ok(font) = std::env::var("STORYREEL_FONT_FILE") {
        settings = settings.with_font_file(font);
    }

    let caps = Capabilities::from_config(&endpoints, &config)?;
    let orchestrator = GenerationOrchestrator::new(caps, config.clone(), CostTable::from_env(), settings);

    Ok(GenerationLauncher::new(
        Arc::new(orchestrator),
        store,
        Arc::new(LogReviewNotifier),
        &config,
    ))
}

/// Returns whether the command succeeded.
async fn run(cli: Cli) -> anyhow::Result<bool> {
    let store = Arc::new(InMemoryPostStore::new());

    match cli.command {
        Command::Generate { request, post_id } => {
            let request = load_request(&request).await?;
            let launcher = build_launcher(store.clone())?;

            let post_id = post_id.map(PostId::from).unwrap_or_default();
            store.insert(PostRecord::new(post_id.clone())).await?;

            let ticket = launcher.launch(&post_id, request).await?;
            println!("{}", serde_json::to_string(&ticket.ack())?);

            let result = ticket.wait().await;
            let post = store.get(&post_id).await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
            if let Some(post) = post {
                info!(
                    post_id = %post.id,
                    status = %post.status,
                    generation = %post.generation,
                    "Final post state"
                );
            }
            Ok(result.is_success())
        }
        Command::Estimate { request } => {
            let request = load_request(&request).await?;
            let launcher = build_launcher(store)?;
            let cost = launcher.estimate(&request)?;
            println!("{}", serde_json::to_string_pretty(&cost)?);
            info!("{}", cost.to_description());
            Ok(true)
        }
        Command::Health => {
            let launcher = build_launcher(store)?;
            let report = launcher.health().await;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(report.is_ready())
        }
    }
}
