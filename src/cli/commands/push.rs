//! Push command: run one sync pass against the remote store.

use crate::cli::commands::{truncate, Context};
use crate::cli::PushArgs;
use crate::config::load_settings;
use crate::error::Result;
use crate::sync::{HttpUploader, PassReport};
use colored::Colorize;
use tracing::info;

/// Execute `fieldsync push`.
///
/// Per-item failures are reported, not returned; only configuration and
/// store errors fail the command.
///
/// # Errors
///
/// Returns `Config` if no endpoint is configured, or the error that aborted
/// the pass.
pub fn execute(ctx: &Context<'_>, args: &PushArgs) -> Result<()> {
    let mut settings = load_settings()?;
    if let Some(ref endpoint) = args.endpoint {
        settings.upload.endpoint = Some(endpoint.clone());
    }
    if let Some(timeout_ms) = args.timeout_ms {
        settings.upload.timeout_ms = timeout_ms;
    }
    settings.validate()?;

    let uploader = HttpUploader::from_config(&settings.upload)?;
    info!(endpoint = uploader.endpoint(), "Pushing queue");

    let engine = ctx.open_engine(&settings, uploader)?;
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let report = runtime.block_on(engine.run_pass())?;
    let pending = engine.size()?;
    engine.shutdown()?;

    if ctx.json {
        let output = serde_json::json!({ "report": report, "pending": pending });
        println!("{}", serde_json::to_string(&output)?);
    } else {
        print_report(&report, pending);
    }

    Ok(())
}

fn print_report(report: &PassReport, pending: usize) {
    if report.attempted() == 0 {
        println!("Nothing due. Pending: {pending}");
        return;
    }

    println!("{} {} synced", "✓".green(), report.synced);
    if report.conflicts > 0 {
        println!("{} {} conflict(s) reconciled", "~".cyan(), report.conflicts);
    }
    if report.failed > 0 {
        println!("{} {} failed attempt(s)", "✗".yellow(), report.failed);
    }
    if !report.abandoned.is_empty() {
        println!(
            "{} {} moved to dead letters",
            "⊘".red(),
            report.abandoned.len()
        );
    }
    if report.cancelled {
        println!("{}", "Pass cancelled before finishing".yellow());
    }

    if !report.errors.is_empty() {
        println!();
        println!("Errors:");
        for err in &report.errors {
            println!("  {} {}", err.item_id.dimmed(), truncate(&err.message, 80));
        }
        if report.dropped_errors > 0 {
            println!("  ... and {} more", report.dropped_errors);
        }
    }

    println!();
    println!("Pending: {pending}");
}
