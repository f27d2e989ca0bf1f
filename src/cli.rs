// ABOUTME: Command-line interface definition using clap derive macros.
// ABOUTME: Positional CONTAINER USER HOST for a migration, plus resume and the helper archive entry point.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "ferry")]
#[command(about = "Move a container with its image, volumes and networks to another Docker or Podman host")]
#[command(version)]
#[command(args_conflicts_with_subcommands = true)]
#[command(subcommand_negates_reqs = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    #[command(flatten)]
    pub target: Target,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Minimal output (only the final result)
    #[arg(short, long, global = true, conflicts_with = "json")]
    pub quiet: bool,

    /// Emit JSON lines instead of human output
    #[arg(long, global = true)]
    pub json: bool,

    /// Config file (default: ferry.yml in the working directory)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

/// Container and destination of a migration.
#[derive(Args)]
pub struct Target {
    /// Name of the container to migrate
    #[arg(required = true)]
    pub container: Option<String>,

    /// SSH user on the destination host
    #[arg(required = true)]
    pub user: Option<String>,

    /// Destination host (`host` or `host:port`)
    #[arg(required = true)]
    pub host: Option<String>,

    /// Proceed past the confirmation prompt
    #[arg(short, long, conflicts_with = "suspend")]
    pub yes: bool,

    /// Stop at the confirmation point and print a resume token
    #[arg(long)]
    pub suspend: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Finish a migration suspended at the confirmation point
    Resume {
        /// Checkpoint path printed by a suspended run
        token: PathBuf,
    },

    /// Volume archive codec run inside helper containers
    #[command(hide = true)]
    Archive {
        #[command(subcommand)]
        action: ArchiveAction,
    },
}

#[derive(Subcommand)]
pub enum ArchiveAction {
    /// Archive the paths listed in a null-delimited file
    Export {
        #[arg(long)]
        files_from: PathBuf,
        #[arg(long)]
        output: PathBuf,
    },

    /// Extract an archive beneath a root directory
    Import {
        #[arg(long)]
        input: PathBuf,
        #[arg(long, default_value = "/")]
        root: PathBuf,
    },
}
