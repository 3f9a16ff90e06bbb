//! Dead-letter command implementations.
//!
//! Abandoned operations stay in the `dead_letters` table until a technician
//! exports them or puts them back on the queue.

use crate::cli::commands::{format_timestamp, truncate, Context};
use crate::cli::DeadLetterCommands;
use crate::config::load_settings;
use crate::error::{Error, Result};
use crate::model::DeadLetter;
use crate::sync::{default_export_path, export_dead_letters, OfflineUploader};
use colored::Colorize;
use serde::Serialize;
use std::path::PathBuf;

#[derive(Serialize)]
struct DeadLetterListOutput<'a> {
    count: usize,
    items: &'a [DeadLetter],
}

/// Execute a dead-letter subcommand.
///
/// # Errors
///
/// Returns an error if the database cannot be opened, the export cannot be
/// written, or the entry is unknown.
pub fn execute(ctx: &Context<'_>, command: &DeadLetterCommands) -> Result<()> {
    match command {
        DeadLetterCommands::List => list(ctx),
        DeadLetterCommands::Export { path } => export(ctx, path.as_ref()),
        DeadLetterCommands::Requeue { id } => requeue(ctx, id),
    }
}

fn list(ctx: &Context<'_>) -> Result<()> {
    let storage = ctx.open_storage()?;
    let letters = storage.list_dead_letters()?;

    if ctx.json {
        let output = DeadLetterListOutput {
            count: letters.len(),
            items: &letters,
        };
        println!("{}", serde_json::to_string(&output)?);
        return Ok(());
    }

    if letters.is_empty() {
        println!("No dead letters.");
        return Ok(());
    }

    println!("Dead letters ({}):", letters.len());
    println!();
    for letter in &letters {
        let item = &letter.item;
        println!(
            "  {} {}/{} {} [{}]",
            item.id.dimmed(),
            item.entity_type,
            item.operation,
            item.entity_id.as_deref().unwrap_or("-"),
            letter.reason.as_str().red()
        );
        println!(
            "      {} after {} attempt(s): {}",
            format_timestamp(letter.abandoned_at),
            item.retry_count,
            truncate(&letter.error, 70)
        );
    }

    Ok(())
}

fn export(ctx: &Context<'_>, path: Option<&PathBuf>) -> Result<()> {
    let db_path = ctx.db_path()?;
    let storage = ctx.open_storage()?;
    let letters = storage.list_dead_letters()?;

    let path = path.cloned().unwrap_or_else(|| default_export_path(&db_path));
    let written = export_dead_letters(&path, &letters)?;

    if ctx.json {
        let output = serde_json::json!({
            "exported": written,
            "path": path.display().to_string(),
        });
        println!("{output}");
    } else {
        println!("Exported {written} dead letter(s) to {}", path.display());
    }
    Ok(())
}

/// The item is queued before its dead-letter row is deleted.
fn requeue(ctx: &Context<'_>, id: &str) -> Result<()> {
    let settings = load_settings()?;
    let engine = ctx.open_engine(&settings, OfflineUploader)?;

    let letter = engine
        .with_store(|store| store.get_dead_letter(id))??
        .ok_or_else(|| Error::DeadLetterNotFound { id: id.to_string() })?;

    engine.requeue(letter)?;
    engine.with_store(|store| store.take_dead_letter(id))??;
    let pending = engine.size()?;
    engine.shutdown()?;

    if ctx.json {
        let output = serde_json::json!({ "requeued": id, "pending": pending });
        println!("{output}");
    } else {
        println!("{} {id}", "Requeued".green());
        println!("  Pending: {pending}");
    }
    Ok(())
}
