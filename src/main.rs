//! kanagen CLI - Pronunciation dataset generation.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use kanagen::{BatchConfig, Config, DatasetPipeline};
use std::path::{Path, PathBuf};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser)]
#[command(name = "kanagen")]
#[command(version)]
#[command(about = "Collect one katakana pronunciation per word from an inference backend")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to configuration file
    #[arg(short, long, global = true, default_value = "config.toml")]
    config: PathBuf,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate the pronunciation dataset
    Run {
        /// Path to output JSONL file (overrides output.path)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Validate configuration file
    Validate,

    /// Show example configuration
    Example,
}

fn setup_logging(verbose: bool) -> Result<()> {
    // RUST_LOG takes precedence over --verbose
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("Failed to set subscriber")
}

fn print_example_config() {
    let example = r#"# kanagen configuration file

# Seed for shuffling and batch size probes (omit for a random seed)
random_seed = 42

[source]
path = "cmudict.dict"
# max_num_words = 5000

[inference]
provider = "dummy"
concurrency = 4

[inference.batch]
type = "bisect"
max_batch_size = 500
ratio = 0.8
# type = "fixed"
# batch_size = 100

[inference.rate_limit]
throttle_ms = 0
wait_ms = 60000
max_retries = 10

[inference.dummy]
capacity = 200
latency_ms = 0

[output]
path = "data.jsonl"
show_progress = true
"#;
    println!("{example}");
}

fn load_config(path: &Path) -> Result<Config> {
    let config =
        Config::from_file(path).with_context(|| format!("Failed to load config from {path:?}"))?;
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose)?;

    if let Err(e) = execute(cli).await {
        error!("{e:#}");
        std::process::exit(1);
    }

    Ok(())
}

async fn execute(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Example => {
            print_example_config();
        }

        Commands::Validate => {
            let config = load_config(&cli.config)?;

            info!("Configuration is valid");
            info!("  Source: {:?}", config.source.path);
            info!(
                "  Provider: {:?} with concurrency {}",
                config.inference.provider, config.inference.concurrency
            );
            match config.inference.batch {
                BatchConfig::Fixed { batch_size } => {
                    info!("  Batch size: fixed at {batch_size}");
                }
                BatchConfig::Bisect {
                    max_batch_size,
                    ratio,
                } => {
                    info!("  Batch size: bisect up to {max_batch_size}, ratio {ratio}");
                }
            }
            info!(
                "  Retries: {} (backoff {}ms)",
                config.inference.rate_limit.max_retries, config.inference.rate_limit.wait_ms
            );
        }

        Commands::Run { output } => {
            let config = load_config(&cli.config)?;
            let output = output.unwrap_or_else(|| config.output.path.clone());

            let pipeline = DatasetPipeline::from_config(config)?;
            let stats = pipeline.run(&output).await?;

            println!("\n=== Dataset Generation Complete ===");
            println!("Words:       {}", stats.total_words);
            println!("Resolved:    {}", stats.resolved_words);
            println!("Batch size:  {}", stats.batch_size);
            println!("Rounds:      {}", stats.rounds);
            println!("Batches:     {}", stats.batches_dispatched);
            println!("Invalid:     {}", stats.invalid_answers);
            println!("Rate limits: {}", stats.rate_limited_rounds);
            println!("Acceptance:  {:.1}%", stats.acceptance_rate() * 100.0);
            println!("Throughput:  {:.0}/hr", stats.throughput_per_hour);
            println!("Runtime:     {:.1}s", stats.runtime_secs);
            println!(
                "{} pronunciations inferred and written to {output:?}",
                stats.resolved_words
            );
        }
    }

    Ok(())
}
