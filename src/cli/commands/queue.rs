//! Queue command implementations.

use crate::cli::commands::{
    format_timestamp, parse_entity_type, parse_operation, read_json_arg, truncate, Context,
};
use crate::cli::{EnqueueArgs, QueueCommands};
use crate::config::load_settings;
use crate::error::{Error, Result};
use crate::model::{Operation, SyncQueueItem};
use crate::storage::{SqliteStorage, SyncStore};
use crate::sync::{OfflineUploader, SyncOrchestrator};
use colored::Colorize;
use serde::Serialize;

type Engine = SyncOrchestrator<SqliteStorage, OfflineUploader>;

#[derive(Serialize)]
struct EnqueueOutput<'a> {
    id: &'a str,
    entity_type: &'a str,
    operation: &'a str,
    pending: usize,
}

#[derive(Serialize)]
struct QueueEntry {
    #[serde(flatten)]
    item: SyncQueueItem,
    next_eligible_at: Option<i64>,
}

#[derive(Serialize)]
struct QueueListOutput {
    count: usize,
    items: Vec<QueueEntry>,
}

fn open_engine(ctx: &Context<'_>) -> Result<Engine> {
    let settings = load_settings()?;
    ctx.open_engine(&settings, OfflineUploader)
}

/// Execute `fieldsync enqueue`.
///
/// Creates and updates also refresh the local record replica, flagged as
/// unsynced, unless `--no-record` is given.
///
/// # Errors
///
/// Returns an error if the arguments are invalid or the queue cannot be
/// persisted.
pub fn execute_enqueue(ctx: &Context<'_>, args: &EnqueueArgs) -> Result<()> {
    let entity_type = parse_entity_type(&args.entity_type)?;
    let operation = parse_operation(&args.operation)?;
    let payload = read_json_arg(&args.payload)?;

    let engine = open_engine(ctx)?;

    if !args.no_record && operation != Operation::Delete {
        if let Some(entity_id) = payload.get("id").and_then(serde_json::Value::as_str) {
            let mut record = payload.clone();
            if let Some(obj) = record.as_object_mut() {
                obj.insert("unsynced_changes".into(), true.into());
            }
            engine.with_store(|store| store.save_record(entity_type, entity_id, &record))??;
        }
    }

    let id = engine.enqueue(entity_type, operation, payload)?;
    let pending = engine.size()?;
    engine.shutdown()?;

    if ctx.json {
        let output = EnqueueOutput {
            id: &id,
            entity_type: entity_type.as_str(),
            operation: operation.as_str(),
            pending,
        };
        println!("{}", serde_json::to_string(&output)?);
    } else {
        println!("{} {id} ({entity_type}/{operation})", "Queued".green());
        println!("  Pending: {pending}");
    }

    Ok(())
}

/// Execute a queue subcommand.
///
/// # Errors
///
/// Returns an error if the database cannot be opened or the item is unknown.
pub fn execute(ctx: &Context<'_>, command: &QueueCommands) -> Result<()> {
    match command {
        QueueCommands::List { limit } => list(ctx, *limit),
        QueueCommands::Show { id } => show(ctx, id),
        QueueCommands::Remove { id } => remove(ctx, id),
        QueueCommands::Clear { yes } => clear(ctx, *yes),
    }
}

fn list(ctx: &Context<'_>, limit: Option<usize>) -> Result<()> {
    let engine = open_engine(ctx)?;
    let pending = engine.pending()?;
    let total = pending.len();

    let mut items = Vec::with_capacity(total);
    for item in pending.into_iter().take(limit.unwrap_or(usize::MAX)) {
        let next_eligible_at = engine.next_eligible_at(&item.id)?;
        items.push(QueueEntry {
            item,
            next_eligible_at,
        });
    }

    if ctx.json {
        let output = QueueListOutput {
            count: total,
            items,
        };
        println!("{}", serde_json::to_string(&output)?);
        return Ok(());
    }

    if items.is_empty() {
        println!("Queue is empty.");
        return Ok(());
    }

    println!("Pending ({total}):");
    println!();
    for entry in &items {
        let item = &entry.item;
        let entity = item.entity_id.as_deref().unwrap_or("-");
        let retries = if item.retry_count > 0 {
            format!("retries: {}", item.retry_count).yellow().to_string()
        } else {
            String::new()
        };
        println!(
            "  {} {}/{} {} {}",
            item.id.dimmed(),
            item.entity_type,
            item.operation,
            entity,
            retries
        );
        if let Some(ref err) = item.last_error {
            println!("      last error: {}", truncate(err, 70).red());
        }
        if let Some(at) = entry.next_eligible_at {
            println!("      next attempt: {}", format_timestamp(at));
        }
    }
    if total > items.len() {
        println!();
        println!("  ... and {} more", total - items.len());
    }

    Ok(())
}

fn show(ctx: &Context<'_>, id: &str) -> Result<()> {
    let engine = open_engine(ctx)?;
    let item = engine
        .pending()?
        .into_iter()
        .find(|i| i.id == id)
        .ok_or_else(|| Error::QueueItemNotFound { id: id.to_string() })?;
    let next_eligible_at = engine.next_eligible_at(id)?;
    let history = engine.with_store(|store| store.item_history(id, Some(20)))??;

    if ctx.json {
        let entry = QueueEntry {
            item,
            next_eligible_at,
        };
        let output = serde_json::json!({ "item": entry, "history": history });
        println!("{}", serde_json::to_string(&output)?);
        return Ok(());
    }

    println!("{} {}", "Item".bold(), item.id);
    println!("  Type:      {}/{}", item.entity_type, item.operation);
    if let Some(ref entity_id) = item.entity_id {
        println!("  Record:    {entity_id}");
    }
    println!("  Queued:    {}", format_timestamp(item.created_at));
    println!("  Retries:   {}", item.retry_count);
    if let Some(at) = item.last_attempt_at {
        println!("  Last try:  {}", format_timestamp(at));
    }
    if let Some(ref err) = item.last_error {
        println!("  Error:     {}", err.red());
    }
    if let Some(at) = next_eligible_at {
        println!("  Next try:  {}", format_timestamp(at));
    }
    println!("  Payload:   {}", serde_json::to_string_pretty(&item.payload)?);

    if !history.is_empty() {
        println!();
        println!("History:");
        for event in &history {
            println!(
                "  {} {} ({})",
                format_timestamp(event.created_at).dimmed(),
                event.event_type,
                event.actor
            );
        }
    }

    Ok(())
}

fn remove(ctx: &Context<'_>, id: &str) -> Result<()> {
    let engine = open_engine(ctx)?;
    engine.remove(id)?;
    let pending = engine.size()?;
    engine.shutdown()?;

    if ctx.json {
        let output = serde_json::json!({ "removed": id, "pending": pending });
        println!("{output}");
    } else {
        println!("Removed {id}");
    }
    Ok(())
}

fn clear(ctx: &Context<'_>, yes: bool) -> Result<()> {
    if !yes {
        return Err(Error::InvalidArgument(
            "clearing the queue discards unsynced work; pass --yes to confirm".to_string(),
        ));
    }

    let engine = open_engine(ctx)?;
    let dropped = engine.clear()?;
    engine.shutdown()?;

    if ctx.json {
        let output = serde_json::json!({ "cleared": dropped });
        println!("{output}");
    } else {
        println!("Cleared {dropped} pending item(s)");
    }
    Ok(())
}
