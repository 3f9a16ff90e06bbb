//! Local record replica commands.

use crate::cli::commands::{format_timestamp, parse_entity_type, read_json_arg, Context};
use crate::cli::RecordCommands;
use crate::error::{Error, Result};
use crate::storage::SyncStore;
use colored::Colorize;

/// Execute a record subcommand.
///
/// # Errors
///
/// Returns an error if the arguments are invalid or the database cannot be
/// read or written.
pub fn execute(ctx: &Context<'_>, command: &RecordCommands) -> Result<()> {
    match command {
        RecordCommands::Save {
            entity_type,
            record,
        } => save(ctx, entity_type, record),
        RecordCommands::List {
            entity_type,
            unsynced,
        } => list(ctx, entity_type.as_deref(), *unsynced),
    }
}

/// A saved record is a local edit: it is stamped with `updated_at` when
/// missing and flagged as unsynced.
fn save(ctx: &Context<'_>, entity_type: &str, record: &str) -> Result<()> {
    let entity_type = parse_entity_type(entity_type)?;
    let mut record = read_json_arg(record)?;

    let entity_id = record
        .get("id")
        .and_then(serde_json::Value::as_str)
        .map(ToString::to_string)
        .ok_or_else(|| Error::InvalidPayload("record has no string `id`".to_string()))?;

    if let Some(obj) = record.as_object_mut() {
        if !obj.contains_key("updated_at") {
            obj.insert(
                "updated_at".into(),
                chrono::Utc::now().timestamp_millis().into(),
            );
        }
        obj.insert("unsynced_changes".into(), true.into());
    }

    let mut storage = ctx.open_storage()?;
    storage.save_record(entity_type, &entity_id, &record)?;

    if ctx.json {
        let output = serde_json::json!({
            "entity_type": entity_type.as_str(),
            "entity_id": entity_id,
            "updated_at": record.get("updated_at"),
        });
        println!("{output}");
    } else {
        println!("{} {entity_type}/{entity_id}", "Saved".green());
    }
    Ok(())
}

fn list(ctx: &Context<'_>, entity_type: Option<&str>, unsynced_only: bool) -> Result<()> {
    let entity_type = entity_type.map(parse_entity_type).transpose()?;
    let storage = ctx.open_storage()?;
    let records: Vec<_> = storage
        .list_records(entity_type)?
        .into_iter()
        .filter(|r| !unsynced_only || r.unsynced_changes)
        .collect();

    if ctx.json {
        let output = serde_json::json!({ "count": records.len(), "records": records });
        println!("{}", serde_json::to_string(&output)?);
        return Ok(());
    }

    if records.is_empty() {
        println!("No records.");
        return Ok(());
    }

    println!("Records ({}):", records.len());
    for record in &records {
        let synced = record.synced_at.map_or_else(
            || "never synced".to_string(),
            |at| format!("synced {}", format_timestamp(at)),
        );
        let marker = if record.unsynced_changes {
            "●".yellow()
        } else {
            "✓".green()
        };
        println!(
            "  {marker} {}/{} updated {} ({})",
            record.entity_type,
            record.entity_id,
            format_timestamp(record.updated_at),
            synced.dimmed()
        );
    }
    Ok(())
}
