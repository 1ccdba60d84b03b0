//! Run episodes and update the template buffer.

use anyhow::{Context, Result};
use bot_agent::prelude::*;
use bot_llm::{build_backend, BackendKind};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

use crate::config::{default_buffer_path, Config};

pub struct RunOptions {
    pub episodes: usize,
    pub backend: Option<String>,
    pub seed: u64,
    pub buffer: Option<PathBuf>,
    pub size: Option<i32>,
    pub metrics: Option<PathBuf>,
}

pub fn run(opts: RunOptions, verbose: bool) -> Result<()> {
    let config = Config::load()?;

    let kind = match &opts.backend {
        Some(name) => name.parse::<BackendKind>()?,
        None => config.llm.backend,
    };
    let llm: Arc<dyn LlmBackend> = Arc::from(
        build_backend(kind, config.llm.to_llm_config(kind), config.llm.endpoint.as_deref())
            .with_context(|| format!("Failed to create {kind} backend"))?,
    );

    let buffer_path = match opts.buffer {
        Some(path) => path,
        None => default_buffer_path()?,
    };
    let manager = BufferManager::load_or_new(&buffer_path, config.buffer.clone(), config.distiller.clone())
        .with_context(|| format!("Failed to load buffer: {}", buffer_path.display()))?;
    let initial = manager.stats()?;
    debug!(backend = %kind, path = %buffer_path.display(), templates = initial.templates, "buffer ready");

    println!(
        "{} Running {} episodes with the {} backend ({} templates loaded)",
        "→".blue(),
        opts.episodes.to_string().cyan(),
        llm.name().cyan(),
        initial.templates.to_string().cyan()
    );

    let size = opts.size.unwrap_or(config.env.size);
    let max_steps = config.agent.max_steps;
    let retry = config.retry.to_policy();
    let mut agent = BoTAgent::new(manager.clone(), llm, config.agent.clone());

    let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;

    let pb = ProgressBar::new(opts.episodes as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} episodes {msg}")?
            .progress_chars("#>-"),
    );

    let mut metrics = Vec::with_capacity(opts.episodes);
    let mut solved = 0;
    for i in 0..opts.episodes {
        let seed = opts.seed.wrapping_add(i as u64);
        let mut world = GridWorld::random(size, seed)?.with_max_steps(config.env.max_steps);
        if let Some(radius) = config.env.view_radius {
            world = world.with_view_radius(radius);
        }

        let result = runtime.block_on(run_episode(&mut agent, &mut world, max_steps, &retry));
        let episode = match result {
            Ok(episode) => episode,
            Err(e) => {
                pb.abandon();
                // Keep what was learned before the failure.
                manager.save(&buffer_path)?;
                return Err(e).with_context(|| format!("Episode with seed {seed} failed"));
            }
        };

        if verbose {
            let status = if episode.success { "✓".green() } else { "✗".red() };
            pb.println(format!(
                "  {} seed {:<4} {:>3} steps {:>6} tokens  {}",
                status,
                seed,
                episode.steps,
                episode.tokens,
                describe_outcome(&episode.outcome)
            ));
        }
        solved += usize::from(episode.success);
        pb.set_message(format!("({solved} solved)"));
        pb.inc(1);
        metrics.push(episode);
    }
    pb.finish_and_clear();

    manager
        .save(&buffer_path)
        .with_context(|| format!("Failed to save buffer: {}", buffer_path.display()))?;

    if let Some(path) = &opts.metrics {
        let json = serde_json::to_string_pretty(&metrics)?;
        std::fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
    }

    print_summary(&ExperimentSummary::from_metrics(&metrics), &manager.stats()?, &initial);
    println!("  Buffer saved to {}", buffer_path.display().to_string().dimmed());

    Ok(())
}

fn describe_outcome(outcome: &ConsolidationOutcome) -> String {
    match outcome {
        ConsolidationOutcome::Discarded => "discarded".dimmed().to_string(),
        ConsolidationOutcome::Empty => "empty trace".dimmed().to_string(),
        ConsolidationOutcome::Reinforced { name, usage_count } => {
            format!("reinforced {} (x{})", name.cyan(), usage_count)
        }
        ConsolidationOutcome::Merged { name, usage_count, score } => {
            format!("merged into {} (x{}, score {:.2})", name.cyan(), usage_count, score)
        }
        ConsolidationOutcome::Inserted { name, evicted } => match evicted {
            Some(old) => format!("minted {} (evicted {})", name.green(), old.yellow()),
            None => format!("minted {}", name.green()),
        },
    }
}

fn print_summary(summary: &ExperimentSummary, after: &BufferStats, before: &BufferStats) {
    println!();
    println!("{} Run complete!", "✓".green().bold());
    println!(
        "  Success rate:  {} ({}/{})",
        format!("{:.1}%", summary.success_rate * 100.0).green(),
        summary.successes,
        summary.episodes
    );
    println!("  Mean steps:    {:.1}", summary.mean_steps);
    println!("  Mean tokens:   {:.1}", summary.mean_tokens);
    println!("  Mean time:     {:.1?}", summary.mean_elapsed);
    println!(
        "  Template use:  {} episodes",
        summary.template_episodes.to_string().cyan()
    );
    if summary.parse_failures > 0 {
        println!(
            "  Parse fallbacks: {}",
            summary.parse_failures.to_string().yellow()
        );
    }
    println!(
        "  Templates:     {} → {} ({} minted, {} reinforced, {} merged, {} evicted)",
        before.templates.to_string().yellow(),
        after.templates.to_string().green(),
        after.minted,
        after.reinforced,
        after.merged,
        after.evictions
    );
}
