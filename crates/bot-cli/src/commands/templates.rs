//! List stored thought templates.

use anyhow::{bail, Context, Result};
use bot_core::snapshot::BufferSnapshot;
use colored::Colorize;
use std::path::PathBuf;

use crate::config::{default_buffer_path, Config};

pub fn run(buffer: Option<PathBuf>, full: bool) -> Result<()> {
    let path = match buffer {
        Some(path) => path,
        None => default_buffer_path()?,
    };
    if !path.exists() {
        bail!("No buffer found at {}. Run {} first.", path.display(), "bot run".cyan());
    }

    let config = Config::load()?;
    let snapshot = BufferSnapshot::load(&path)
        .with_context(|| format!("Failed to load buffer: {}", path.display()))?;
    let buffer = snapshot.restore(config.buffer)?;

    let mut templates: Vec<_> = buffer.iter().collect();
    templates.sort_by(|a, b| {
        b.usage_count()
            .cmp(&a.usage_count())
            .then_with(|| a.created_at_episode().cmp(&b.created_at_episode()))
    });

    println!("{}", "Thought Templates".white().bold());
    println!("{}", "═".repeat(60).dimmed());
    println!(
        "  {} templates, {} total uses, next episode {}",
        buffer.len().to_string().cyan(),
        buffer.total_usage().to_string().cyan(),
        snapshot.next_episode
    );
    println!();

    for template in templates {
        println!(
            "{} {}  {}",
            "•".blue(),
            template.name().bold(),
            format!("used {}x, since episode {}", template.usage_count(), template.created_at_episode()).dimmed()
        );
        println!("    {}", template.description());
        if full {
            for line in template.reasoning_pattern().lines() {
                println!("    {}", line.dimmed());
            }
            println!();
        }
    }

    println!("{}", "═".repeat(60).dimmed());
    Ok(())
}
