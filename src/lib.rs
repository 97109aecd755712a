// src/lib.rs

pub mod chain;
pub mod cli;
pub mod config;
pub mod constraints;
pub mod demo;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod manager;
pub mod status;
pub mod work;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

pub use crate::chain::{
    ChainBuilder, ChainOutcome, ChainRef, ExistingChainPolicy, Stage, SubmitOutcome,
};
pub use crate::constraints::ConstraintBoard;
pub use crate::manager::WorkManager;
pub use crate::status::{ItemStatus, StatusFeed, StatusFilter, StatusSnapshot};
pub use crate::work::{Constraint, Data, ItemId, Value, WorkRequest, WorkState};

use crate::cli::CliArgs;
use crate::config::{ConfigFile, default_config_path, load_and_validate};
use crate::work::ConstraintEvaluator;

/// Constraints the demo treats as satisfied unless configured otherwise.
const DEFAULT_SATISFIED: [Constraint; 5] = [
    Constraint::Charging,
    Constraint::BatteryNotLow,
    Constraint::StorageNotLow,
    Constraint::DeviceIdle,
    Constraint::NetworkConnected,
];

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading
/// - the constraint board (config values, then `--hold`)
/// - the work manager and the demo work bodies
/// - status printing until the chain is terminal
/// - Ctrl-C handling (cancels the chain)
pub async fn run(args: CliArgs) -> Result<()> {
    let cfg = load_config(&args)?;

    let (name, policy, stages) = match cfg.chain {
        Some(ref chain) => (chain.name.clone(), chain.policy, chain.to_stages()?),
        None => (
            demo::IMAGE_MANIPULATION_WORK_NAME.to_string(),
            demo::IMAGE_PIPELINE_POLICY,
            demo::image_pipeline(usize::from(args.blur_level), &args.image),
        ),
    };

    let held = args
        .hold
        .iter()
        .map(|s| s.parse::<Constraint>().map_err(anyhow::Error::msg))
        .collect::<Result<Vec<_>>>()?;

    if args.dry_run {
        print_dry_run(&cfg, &name, policy, &stages, &held);
        return Ok(());
    }

    let board = Arc::new(build_board(&cfg, &held));
    let evaluator: Arc<dyn ConstraintEvaluator> = board.clone();
    let workers = demo::demo_workers(Duration::from_millis(args.work_delay_ms));
    let manager = WorkManager::start(&cfg.config, workers, evaluator);

    let mut feed = manager.observe(StatusFilter::chain(name.clone()));

    let mut stages = stages.into_iter();
    let first = stages
        .next()
        .context("chain must contain at least one stage")?;
    let mut builder = manager.begin_unique_chain(name.clone(), policy, first);
    for stage in stages {
        builder.then(stage)?;
    }
    let outcome = builder.enqueue().await?;
    let chain = outcome.chain().clone();
    info!(chain = %chain.id, name = %chain.name, items = chain.items.len(), "chain submitted");

    if let Some(ms) = args.release_after_ms
        && !held.is_empty()
    {
        let board = Arc::clone(&board);
        let held = held.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(ms)).await;
            for constraint in held {
                board.satisfy(constraint);
            }
        });
    }

    let finished = tokio::select! {
        snapshot = follow_chain(&mut feed, &chain) => snapshot,
        res = tokio::signal::ctrl_c() => {
            if let Err(e) = res {
                warn!("failed to listen for Ctrl+C: {e}");
            }
            info!(name = %chain.name, "Ctrl-C received; cancelling chain");
            manager.cancel_unique_chain(chain.name.clone()).await?;
            follow_chain(&mut feed, &chain).await
        }
    };

    match finished.as_ref().and_then(|s| chain_outcome(s, &chain)) {
        Some(outcome) => println!("chain {} finished: {outcome:?}", chain.name),
        None => println!("chain {} did not finish", chain.name),
    }

    let outputs = manager.work_infos(&StatusFilter::tag(demo::TAG_OUTPUT));
    for status in outputs.iter().filter(|s| s.chain == chain.id) {
        if let Some(ref output) = status.output {
            println!("output {} ({}): {output}", status.id, status.kind);
        }
    }

    manager.shutdown().await?;
    Ok(())
}

/// Explicit `--config`, else the default path if it exists, else defaults.
fn load_config(args: &CliArgs) -> Result<ConfigFile> {
    let path = match args.config {
        Some(ref p) => std::path::PathBuf::from(p),
        None => {
            let path = default_config_path();
            if !path.exists() {
                debug!(path = %path.display(), "no config file; using defaults");
                return Ok(ConfigFile::default());
            }
            path
        }
    };

    let cfg = load_and_validate(&path)
        .with_context(|| format!("failed to load config {}", path.display()))?;
    Ok(cfg)
}

fn build_board(cfg: &ConfigFile, held: &[Constraint]) -> ConstraintBoard {
    let values = DEFAULT_SATISFIED
        .iter()
        .cloned()
        .map(|c| (c, true))
        .chain(cfg.constraints.iter().map(|(c, v)| (c.clone(), *v)))
        .chain(held.iter().cloned().map(|c| (c, false)));
    ConstraintBoard::with_values(values)
}

/// Print every snapshot for `chain` until all of its items are terminal.
async fn follow_chain(feed: &mut StatusFeed, chain: &ChainRef) -> Option<StatusSnapshot> {
    loop {
        let snapshot = feed.next().await?;
        let entries = snapshot.for_chain(chain.id);
        if entries.is_empty() {
            continue;
        }

        let line = entries
            .iter()
            .map(|s| format!("{}:{}={}", s.id, s.kind, s.state))
            .collect::<Vec<_>>()
            .join("  ");
        println!("[{}] {line}", chain.name);

        if chain_outcome(&snapshot, chain).is_some() {
            return Some(snapshot);
        }
    }
}

fn chain_outcome(snapshot: &StatusSnapshot, chain: &ChainRef) -> Option<ChainOutcome> {
    let entries = snapshot.for_chain(chain.id);
    if entries.len() < chain.items.len() {
        return None;
    }
    status::outcome_of(entries.iter().map(|s| s.state))
}

/// Simple dry-run output: print settings, constraints and the stage plan.
fn print_dry_run(
    cfg: &ConfigFile,
    name: &str,
    policy: ExistingChainPolicy,
    stages: &[Stage],
    held: &[Constraint],
) {
    println!("workchain dry-run");
    println!("  config.max_workers = {}", cfg.config.max_workers);
    println!("  config.retained_chains = {}", cfg.config.retained_chains);
    for (constraint, value) in cfg.constraints.iter() {
        println!("  constraints.{constraint} = {value}");
    }
    if !held.is_empty() {
        let names: Vec<_> = held.iter().map(|c| c.to_string()).collect();
        println!("  held: {names:?}");
    }
    println!();

    println!("chain {name} (policy {policy:?}, {} stages):", stages.len());
    for (idx, stage) in stages.iter().enumerate() {
        println!("  stage {idx}:");
        for request in stage.requests() {
            println!("    - {}", request.kind);
            if !request.input.is_empty() {
                println!("        input: {}", request.input);
            }
            if !request.constraints.is_empty() {
                let names: Vec<_> = request.constraints.iter().map(|c| c.to_string()).collect();
                println!("        constraints: {names:?}");
            }
            if !request.tags.is_empty() {
                println!("        tags: {:?}", request.tags);
            }
        }
    }

    debug!("dry-run complete (no execution)");
}
