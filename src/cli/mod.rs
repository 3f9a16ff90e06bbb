//! CLI definitions using clap.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

pub mod commands;

/// fieldsync - offline-first sync for field technician devices
#[derive(Parser, Debug)]
#[command(name = "fieldsync", author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Database path (default: ~/.fieldsync/data/fieldsync.db)
    #[arg(long, global = true, env = "FIELDSYNC_DB")]
    pub db: Option<PathBuf>,

    /// Device or technician name for the audit trail
    #[arg(long, global = true, env = "FIELDSYNC_ACTOR")]
    pub actor: Option<String>,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Increase logging verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (no output except errors)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the local database
    Init {
        /// Overwrite an existing database
        #[arg(long)]
        force: bool,
    },

    /// Print version information
    Version,

    /// Queue a create/update/delete for upload
    Enqueue(EnqueueArgs),

    /// Inspect and maintain the pending queue
    Queue {
        #[command(subcommand)]
        command: QueueCommands,
    },

    /// Run one sync pass against the remote store
    Push(PushArgs),

    /// Abandoned operations
    DeadLetter {
        #[command(subcommand)]
        command: DeadLetterCommands,
    },

    /// List local records changed since the last sync watermark
    Delta(DeltaArgs),

    /// Local record replicas
    Record {
        #[command(subcommand)]
        command: RecordCommands,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Args, Debug)]
pub struct EnqueueArgs {
    /// Entity type (job, node, route)
    pub entity_type: String,

    /// Operation (create, update, delete)
    pub operation: String,

    /// Record JSON, or @path to read it from a file
    pub payload: String,

    /// Do not update the local record replica
    #[arg(long)]
    pub no_record: bool,
}

#[derive(Subcommand, Debug)]
pub enum QueueCommands {
    /// List pending items in upload order
    List {
        /// Maximum items to show
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Show one pending item
    Show {
        /// Queue item ID
        id: String,
    },

    /// Drop one pending item without uploading it
    Remove {
        /// Queue item ID
        id: String,
    },

    /// Drop every pending item
    Clear {
        /// Required to confirm
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Args, Debug)]
pub struct PushArgs {
    /// Sync API base URL (overrides config)
    #[arg(long)]
    pub endpoint: Option<String>,

    /// Per-request timeout in milliseconds (overrides config)
    #[arg(long)]
    pub timeout_ms: Option<u64>,
}

#[derive(Subcommand, Debug)]
pub enum DeadLetterCommands {
    /// List abandoned items
    List,

    /// Write abandoned items to a JSONL file
    Export {
        /// Output path (default: dead_letters.jsonl next to the database)
        path: Option<PathBuf>,
    },

    /// Put an abandoned item back on the queue
    Requeue {
        /// Dead-letter (original queue item) ID
        id: String,
    },
}

#[derive(Args, Debug)]
pub struct DeltaArgs {
    /// Watermark scope
    #[arg(long, default_value = "default")]
    pub scope: String,

    /// Use this watermark (Unix ms) instead of the stored one
    #[arg(long)]
    pub since: Option<i64>,

    /// Restrict to one entity type
    #[arg(long = "type")]
    pub entity_type: Option<String>,

    /// Advance the stored watermark to the newest listed change
    #[arg(long)]
    pub commit: bool,
}

#[derive(Subcommand, Debug)]
pub enum RecordCommands {
    /// Save a local record replica
    Save {
        /// Entity type (job, node, route)
        entity_type: String,

        /// Record JSON, or @path to read it from a file
        record: String,
    },

    /// List local records
    List {
        /// Restrict to one entity type
        #[arg(long = "type")]
        entity_type: Option<String>,

        /// Only records with unsynced changes
        #[arg(long)]
        unsynced: bool,
    },
}
