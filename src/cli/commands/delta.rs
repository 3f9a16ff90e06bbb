//! Delta command: local records changed since the last sync watermark.

use crate::cli::commands::{format_timestamp, parse_entity_type, Context};
use crate::cli::DeltaArgs;
use crate::error::Result;
use crate::storage::{StoredRecord, WatermarkStore};
use crate::sync::select_changed_since;
use colored::Colorize;
use serde::Serialize;

#[derive(Serialize)]
struct DeltaOutput<'a> {
    scope: &'a str,
    watermark: Option<i64>,
    count: usize,
    records: Vec<&'a StoredRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    committed: Option<i64>,
}

/// Execute `fieldsync delta`.
///
/// With `--commit`, the scope's watermark advances to the newest
/// `updated_at` among the selected records. Nothing selected leaves it
/// unchanged.
///
/// # Errors
///
/// Returns an error if the database cannot be read or the watermark written.
pub fn execute(ctx: &Context<'_>, args: &DeltaArgs) -> Result<()> {
    let entity_type = args
        .entity_type
        .as_deref()
        .map(parse_entity_type)
        .transpose()?;

    let mut storage = ctx.open_storage()?;
    let watermark = match args.since {
        Some(since) => Some(since),
        None => storage.watermark(&args.scope)?,
    };

    let records = storage.list_records(entity_type)?;
    let changed = select_changed_since(&records, watermark);

    let committed = if args.commit {
        let newest = changed.iter().map(|r| r.updated_at).max();
        if let Some(at) = newest {
            storage.set_watermark(&args.scope, at)?;
        }
        newest
    } else {
        None
    };

    if ctx.json {
        let output = DeltaOutput {
            scope: &args.scope,
            watermark,
            count: changed.len(),
            records: changed,
            committed,
        };
        println!("{}", serde_json::to_string(&output)?);
        return Ok(());
    }

    match watermark {
        Some(at) => println!("Changes since {} ({}):", format_timestamp(at), args.scope),
        None => println!("All records ({}: never synced):", args.scope),
    }
    if changed.is_empty() {
        println!("  (none)");
    }
    for record in &changed {
        let flag = if record.unsynced_changes {
            "unsynced".yellow().to_string()
        } else {
            "synced".green().to_string()
        };
        println!(
            "  {}/{} {} {}",
            record.entity_type,
            record.entity_id,
            format_timestamp(record.updated_at).dimmed(),
            flag
        );
    }
    if let Some(at) = committed {
        println!();
        println!("Watermark advanced to {}", format_timestamp(at));
    }

    Ok(())
}
