//! marginal-cli — agent-side command-line front-end for the marginal store.
//!
//! Every mutating command is a single locked read-modify-write through
//! `marginal_core::actions`, so it is safe to run while the TUI (or another
//! CLI invocation) is using the same project. stdout carries results (plain
//! text or `--json`); logs and errors go to stderr.

mod commands;
mod output;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

/// Exit status for retryable failures (store busy or changed underneath us).
const EXIT_TEMPFAIL: u8 = 75;

#[derive(Parser)]
#[command(name = "marginal-cli")]
#[command(about = "Line-anchored review comments for humans and agents", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Emit machine-readable JSON on stdout
    #[arg(long, global = true)]
    json: bool,

    /// Project root (defaults to the nearest ancestor containing .marginal/)
    #[arg(long, global = true)]
    root: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create .marginal/ and an empty store in the project root
    Init,

    /// List comments, re-anchoring changed files first
    List(ListArgs),

    /// Show one comment with its thread
    Show { id: String },

    /// Attach a new comment to a line range
    Add(AddArgs),

    /// Append a reply to a comment thread
    Reply(ReplyArgs),

    /// Mark a comment resolved
    Resolve { id: String },

    /// Reopen a resolved comment
    Unresolve { id: String },

    /// Delete a comment and its thread
    Delete { id: String },

    /// Re-anchor comments against the current files
    Reconcile(ReconcileArgs),

    /// Mark human activity as seen by the agent (all unseen when no ids are given)
    Seen { ids: Vec<String> },
}

#[derive(Args)]
struct ListArgs {
    /// Only comments on this file
    #[arg(long)]
    file: Option<PathBuf>,

    /// Workflow filter
    #[arg(long, value_enum, default_value_t = StatusFilter::Open)]
    status: StatusFilter,

    /// Only comments with human activity the agent has not seen
    #[arg(long)]
    unseen: bool,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum StatusFilter {
    Open,
    Resolved,
    All,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum AuthorArg {
    Human,
    Agent,
}

impl From<AuthorArg> for marginal_core::Author {
    fn from(a: AuthorArg) -> Self {
        match a {
            AuthorArg::Human => marginal_core::Author::Human,
            AuthorArg::Agent => marginal_core::Author::Agent,
        }
    }
}

#[derive(Args)]
struct AddArgs {
    /// File to comment on (relative to the current directory)
    file: PathBuf,
    /// First line (1-based)
    start: usize,
    /// Last line, inclusive (defaults to START)
    end: Option<usize>,

    #[arg(long)]
    body: String,

    #[arg(long, value_enum, default_value_t = AuthorArg::Agent)]
    author: AuthorArg,
}

#[derive(Args)]
struct ReplyArgs {
    id: String,

    #[arg(long)]
    body: String,

    #[arg(long, value_enum, default_value_t = AuthorArg::Agent)]
    author: AuthorArg,
}

#[derive(Args)]
struct ReconcileArgs {
    /// Re-check every comment, including resolved ones and unchanged files
    #[arg(long)]
    force: bool,

    /// Restrict to these files (repeatable)
    #[arg(long = "file")]
    files: Vec<PathBuf>,
}

fn init_logging() {
    let filter = EnvFilter::try_from_env("MARGINAL_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging();

    match commands::run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("marginal-cli: {e:#}");
            let retryable = e
                .downcast_ref::<marginal_core::Error>()
                .is_some_and(marginal_core::Error::is_retryable);
            if retryable {
                ExitCode::from(EXIT_TEMPFAIL)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}
