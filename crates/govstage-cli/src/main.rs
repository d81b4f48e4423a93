//! govstage
//!
//! Reads governance messages as JSON Lines on stdin and writes one stage
//! classification per message to stdout. Diagnostics go to stderr.

use anyhow::Result;
use clap::Parser;
use govstage_classifiers::{load_ranker, BatchOrchestrator, FallbackClassifier};
use std::path::PathBuf;
use tokio::io::BufReader;
use tracing::{error, info};

mod config;

#[derive(Parser, Debug)]
#[command(name = "govstage")]
#[command(about = "Classify governance messages into lifecycle stages", long_about = None)]
struct Cli {
    /// Configuration file path (built-in rules and descriptions if omitted)
    #[arg(short, long, env = "GOVSTAGE_CONFIG")]
    config: Option<PathBuf>,

    /// NLI model: a Hugging Face repo id or a local checkpoint directory
    #[arg(short, long, env = "GOVSTAGE_MODEL")]
    model: Option<String>,

    /// Inference device (cpu, cuda, cuda:N, metal)
    #[arg(short, long, env = "GOVSTAGE_DEVICE")]
    device: Option<String>,

    /// Records per chunk between working-set releases
    #[arg(long, env = "GOVSTAGE_CHUNK_SIZE")]
    chunk_size: Option<usize>,

    /// Classify all of stdin as one message and print {"stage", "confidence"}
    #[arg(short, long)]
    single: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    init_tracing(cli.verbose);

    info!("Starting govstage");

    // Load configuration
    let config = config::load(&cli).inspect_err(|e| error!("Invalid configuration: {:#}", e))?;
    info!("Configuration loaded: {} rules", config.rules.len());

    let rules = config.build_rule_matcher()?;
    let descriptions = config.build_descriptions()?;
    let template = config.build_template()?;

    // Acquire the ranker once for the whole run
    let ranker = load_ranker(&config.model)
        .inspect_err(|e| error!("Failed to load fallback model: {}", e))?;
    info!("Fallback ranker ready: {}", ranker.name());

    let fallback = FallbackClassifier::new(ranker, descriptions, template);
    let mut orchestrator = BatchOrchestrator::new(rules, fallback, config.batch.chunk_size)?;

    if cli.single {
        let result = orchestrator
            .run_single(tokio::io::stdin(), tokio::io::stdout())
            .await?;
        info!("Finished: stage={} confidence={}", result.stage, result.confidence);
    } else {
        let stats = orchestrator
            .run(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
            .await?;
        info!("Finished: {}", stats);
    }

    Ok(())
}

/// Initialize tracing/logging; stdout is reserved for results
fn init_tracing(verbose: bool) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = if verbose {
        EnvFilter::new("govstage=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("govstage=info"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
