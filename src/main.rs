// ABOUTME: Entry point for the ferry CLI application.
// ABOUTME: Parses arguments, builds the run configuration and dispatches to command handlers.

mod cli;
mod commands;

use clap::Parser;
use cli::{ArchiveAction, Cli, Commands, Target};
use ferry::config::{Invocation, RunConfig, Settings};
use ferry::error::{Error, Result};
use ferry::migrate::{AssumeYes, ConfirmationGate, PromptGate, SuspendGate};
use ferry::output::{Output, OutputMode};
use std::env;
use std::path::Path;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // Help and version go to stdout with status 0; usage errors exit 1.
            let code = if e.use_stderr() { 1 } else { 0 };
            let _ = e.print();
            std::process::exit(code);
        }
    };

    // Initialize tracing subscriber based on verbose flag
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let mode = if cli.json {
        OutputMode::Json
    } else if cli.quiet {
        OutputMode::Quiet
    } else {
        OutputMode::Normal
    };

    if let Err(e) = run(cli, mode).await {
        e.log();
        Output::new(mode).error(&e.to_string());
        std::process::exit(e.exit_code());
    }
}

async fn run(cli: Cli, mode: OutputMode) -> Result<()> {
    match cli.command {
        Some(Commands::Archive { action }) => match action {
            ArchiveAction::Export { files_from, output } => {
                commands::archive::export(&files_from, &output)
            }
            ArchiveAction::Import { input, root } => commands::archive::import(&input, &root),
        },
        // Settings are frozen in the checkpoint; the config file is not read.
        Some(Commands::Resume { token }) => commands::resume(&token, Output::new(mode)).await,
        None => {
            let settings = load_settings(cli.config.as_deref())?;
            let Target {
                container,
                user,
                host,
                yes,
                suspend,
            } = cli.target;
            let invocation = match (container, user, host) {
                (Some(container), Some(user), Some(host)) => Invocation {
                    container,
                    user,
                    host,
                },
                _ => return Err(Error::Usage("usage: ferry [OPTIONS] <CONTAINER> <USER> <HOST>".into())),
            };
            let config = RunConfig::build(&invocation, &settings, env::current_exe()?)?;
            tracing::debug!(?config, "run configuration");

            let gate: Box<dyn ConfirmationGate> = if yes {
                Box::new(AssumeYes)
            } else if suspend {
                Box::new(SuspendGate)
            } else {
                Box::new(PromptGate)
            };
            commands::migrate(config, gate.as_ref(), Output::new(mode)).await
        }
    }
}

fn load_settings(explicit: Option<&Path>) -> Result<Settings> {
    let settings = match explicit {
        Some(path) => Settings::load(path)?,
        None => Settings::discover(&env::current_dir()?)?,
    };
    settings.with_process_env()
}
