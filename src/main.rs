//! fieldsync CLI entry point.

use clap::Parser;
use fieldsync::cli::commands;
use fieldsync::cli::{Cli, Commands};
use fieldsync::error::Error;
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();

    if cli.no_color {
        colored::control::set_override(false);
    }

    // Set up tracing based on verbosity
    init_tracing(cli.verbose, cli.quiet);

    // JSON mode: --json or non-TTY stdout
    let json = cli.json || !std::io::IsTerminal::is_terminal(&std::io::stdout());

    match run(&cli, json) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if json {
                eprintln!("{}", e.to_structured_json());
            } else if !cli.quiet {
                if let Some(hint) = e.hint() {
                    eprintln!("Error: {e}\n  Hint: {hint}");
                } else {
                    eprintln!("Error: {e}");
                }
            }
            ExitCode::from(e.exit_code())
        }
    }
}

fn init_tracing(verbose: u8, quiet: bool) {
    use tracing_subscriber::EnvFilter;

    if quiet {
        return;
    }

    // Honor RUST_LOG if set, otherwise use verbosity flag
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        match verbose {
            0 => EnvFilter::new("warn"),
            1 => EnvFilter::new("info"),
            2 => EnvFilter::new("debug,rusqlite=info,reqwest=info,hyper=info"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

fn run(cli: &Cli, json: bool) -> Result<(), Error> {
    let ctx = commands::Context {
        db: cli.db.as_deref(),
        actor: cli.actor.as_deref(),
        json,
    };

    match &cli.command {
        Commands::Init { force } => commands::init::execute(&ctx, *force),
        Commands::Version => commands::version::execute(json),
        Commands::Enqueue(args) => commands::queue::execute_enqueue(&ctx, args),
        Commands::Queue { command } => commands::queue::execute(&ctx, command),
        Commands::Push(args) => commands::push::execute(&ctx, args),
        Commands::DeadLetter { command } => commands::dead_letter::execute(&ctx, command),
        Commands::Delta(args) => commands::delta::execute(&ctx, args),
        Commands::Record { command } => commands::record::execute(&ctx, command),
        Commands::Completions { shell } => commands::completions::execute(shell),
    }
}
