//! `sse-cli` — loads an ECS configuration document, steps a [`sse::Simulation`]
//! N times, and prints or snapshots the resulting history.
//!
//! Grounded on `original_source/app.py`'s non-web code path
//! (`run_simulation_and_extract_metrics` / `save_results_to_file`), with
//! argument parsing in the `clap`-derive shape used throughout the wider
//! example pack's CLIs.

mod error;
mod snapshot;
mod stub;

use clap::Parser;
use error::CliError;
use sse::prelude::*;
use sse_sampler_anthropic::AnthropicSampler;
use sse_sampler_openai::OpenAiSampler;
use std::path::PathBuf;
use std::rc::Rc;
use stub::StubSampler;

/// Run a simulation stream engine configuration for a fixed number of steps.
#[derive(Parser)]
#[command(
    name = "sse-cli",
    version,
    about = "Run a simulation stream engine ECS configuration",
    long_about = "Loads a declarative ECS configuration document (JSON), compiles it, \
                  and drives it forward a fixed number of steps, printing the history \
                  each operator produced."
)]
struct Args {
    /// Path to the ECS configuration document (JSON).
    config: PathBuf,

    /// Number of steps to run.
    #[arg(long, default_value_t = 10)]
    steps: usize,

    /// Name of the world entity (the `{world_entity}` substitution target).
    #[arg(long, default_value = "world")]
    world_entity: String,

    /// Task name threaded into `{task_name}` substitutions.
    #[arg(long, default_value = "")]
    task_name: String,

    /// Base RNG seed for the evaluator's `random()`/`randint()` calls.
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Sampling model identifier. Selects a provider by prefix
    /// (`gpt-` -> OpenAI, `claude-` -> Anthropic) when `--live` is set;
    /// otherwise only used for display/logging.
    #[arg(long, default_value = "gpt-4o-mini")]
    model: String,

    /// Call a real provider instead of the deterministic offline stub.
    /// Requires `--api-key` (or the matching provider's env var).
    #[arg(long)]
    live: bool,

    /// API key for the live provider. Falls back to `OPENAI_API_KEY` or
    /// `ANTHROPIC_API_KEY` depending on `--model`'s prefix.
    #[arg(long)]
    api_key: Option<String>,

    /// Path to a newline-delimited file naming metrics to track across the
    /// run. When given with `--output-file`, each metric's per-step value
    /// series is written out as `{metricName -> [value, ...]}`.
    #[arg(long)]
    metrics: Option<PathBuf>,

    /// Where to write the metrics snapshot (default:
    /// `{config_name}_step{steps}.json` in the current directory, made
    /// unique by numeric suffix if it already exists).
    #[arg(long)]
    output_file: Option<PathBuf>,

    /// Suppress the per-step output lines on stdout.
    #[arg(long)]
    quiet: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), CliError> {
    tracing_subscriber::fmt::try_init().ok();
    run(Args::parse()).await
}

async fn run(args: Args) -> Result<(), CliError> {
    let config_text = std::fs::read_to_string(&args.config).map_err(|source| CliError::ReadConfig {
        path: args.config.display().to_string(),
        source,
    })?;
    let doc: ConfigDocument = serde_json::from_str(&config_text).map_err(|source| CliError::ParseConfig {
        path: args.config.display().to_string(),
        source,
    })?;

    let sampler = build_sampler(&args)?;
    let mut sim = Simulation::compile(&doc, &args.world_entity, &args.task_name, sampler, args.model.clone(), args.seed)?;
    tracing::info!(config = %args.config.display(), steps = args.steps, live = args.live, "starting run");

    let token = CancellationToken::new();
    for step_num in 1..=args.steps {
        let step = sim.step(&token).await?;
        tracing::debug!(step_num, operator_id = %step.operator_id, "step complete");
        if !args.quiet {
            println!("[{step_num}] {}:", step.operator_id);
            for line in &step.output {
                println!("    {line}");
            }
        }
    }

    if let Some(metrics_path) = &args.metrics {
        let metric_names = read_metric_names(metrics_path)?;
        let series = snapshot::collect_metric_series(sim.history(), &metric_names);
        let config_name = args.config.file_stem().and_then(|s| s.to_str()).unwrap_or("config");
        let target = args
            .output_file
            .clone()
            .unwrap_or_else(|| snapshot::default_filename(config_name, args.steps));
        let target = snapshot::unique_path(&target);

        let json = serde_json::to_string_pretty(&series).expect("metric series always serializes");
        std::fs::write(&target, json).map_err(|source| CliError::WriteSnapshot {
            path: target.display().to_string(),
            source,
        })?;
        println!("wrote metrics snapshot to {}", target.display());
    }

    Ok(())
}

fn read_metric_names(path: &PathBuf) -> Result<Vec<String>, CliError> {
    let text = std::fs::read_to_string(path).map_err(|source| CliError::ReadConfig {
        path: path.display().to_string(),
        source,
    })?;
    Ok(text.lines().map(str::trim).filter(|l| !l.is_empty()).map(str::to_string).collect())
}

fn build_sampler(args: &Args) -> Result<Rc<dyn Sampler>, CliError> {
    if !args.live {
        return Ok(Rc::new(StubSampler::new()));
    }

    if args.model.starts_with("gpt-") {
        let api_key = resolve_api_key(args, "OPENAI_API_KEY")?;
        return Ok(Rc::new(OpenAiSampler::new(api_key)));
    }
    if args.model.starts_with("claude-") {
        let api_key = resolve_api_key(args, "ANTHROPIC_API_KEY")?;
        return Ok(Rc::new(AnthropicSampler::new(api_key)));
    }
    Err(CliError::UnknownModelPrefix(args.model.clone()))
}

fn resolve_api_key(args: &Args, env_var: &str) -> Result<String, CliError> {
    args.api_key
        .clone()
        .or_else(|| std::env::var(env_var).ok())
        .ok_or_else(|| CliError::UnknownModelPrefix(args.model.clone()))
}
