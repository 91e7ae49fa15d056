//! # todos
//!
//! Command-line client for todos-sync lists.
//!
//! Each invocation opens the store snapshot, runs one dispatcher
//! operation and writes the snapshot back. Two data directories pointed at
//! the same `--store` file behave like two devices sharing a store.
//!
//! ## Example
//!
//! ```bash
//! todos init --name alice --seed
//! LIST=$(todos add-list Groceries)
//! TODO=$(todos add-todo "$LIST" Milk --tag dairy)
//! todos todos "$LIST"
//! todos untag "$TODO" dairy
//! todos share "$LIST" --member alice --member bob
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;
mod config;
mod seed;
mod session;
mod snapshot;

use commands::{init, lists, share, status, todos};
use session::Paths;

/// Command-line client for todos-sync lists.
#[derive(Parser, Debug)]
#[command(name = "todos")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Data directory for device identity and local state
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Store snapshot file (default: <data-dir>/store.json)
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    /// Dispatcher config file (default: <data-dir>/todos.toml, if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log dispatcher activity to stderr
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Initialize device identity
    Init {
        /// Principal name used for sharing
        #[arg(long, short)]
        name: String,

        /// Load demo lists
        #[arg(long)]
        seed: bool,
    },

    /// Show lists
    Lists,

    /// Create a list and print its id
    AddList {
        /// List name
        name: String,
    },

    /// Rename a list
    RenameList {
        /// List id
        list: String,
        /// New name
        name: String,
    },

    /// Show the todos of a list
    Todos {
        /// List id
        list: String,
    },

    /// Add a todo and print its id
    AddTodo {
        /// List id
        list: String,
        /// Todo text
        text: String,
        /// Tag to attach (repeatable)
        #[arg(long = "tag", short)]
        tags: Vec<String>,
    },

    /// Mark a todo done
    Done {
        /// Todo id
        todo: String,
    },

    /// Mark a todo not done
    Undo {
        /// Todo id
        todo: String,
    },

    /// Change a todo's text
    Edit {
        /// Todo id
        todo: String,
        /// New text
        text: String,
    },

    /// Remove a todo
    Rm {
        /// Todo id
        todo: String,
    },

    /// Tag a todo
    Tag {
        /// Todo id
        todo: String,
        /// Tag
        tag: String,
    },

    /// Untag a todo
    Untag {
        /// Todo id
        todo: String,
        /// Tag
        tag: String,
    },

    /// Share a list with a fixed set of members
    Share {
        /// List id
        list: String,
        /// Member principal (repeatable)
        #[arg(long = "member", short, required = true)]
        members: Vec<String>,
    },

    /// Print the invite code for a shared list
    Invite {
        /// List id
        list: String,
    },

    /// Join a shared list by sync group name or invite code
    Join {
        /// Sync group name or invite code
        target: String,
    },

    /// Show device and store status
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let data_dir = match cli.data_dir {
        Some(dir) => dir,
        None => default_data_dir()?,
    };
    tokio::fs::create_dir_all(&data_dir)
        .await
        .context("Failed to create data directory")?;
    let paths = Paths::new(data_dir, cli.store, cli.config);

    match cli.command {
        Commands::Init { name, seed } => init::run(&paths, &name, seed).await?,
        Commands::Lists => lists::show(&paths).await?,
        Commands::AddList { name } => lists::add(&paths, &name).await?,
        Commands::RenameList { list, name } => lists::rename(&paths, &list, &name).await?,
        Commands::Todos { list } => todos::show(&paths, &list).await?,
        Commands::AddTodo { list, text, tags } => todos::add(&paths, &list, &text, tags).await?,
        Commands::Done { todo } => todos::mark(&paths, &todo, true).await?,
        Commands::Undo { todo } => todos::mark(&paths, &todo, false).await?,
        Commands::Edit { todo, text } => todos::edit(&paths, &todo, &text).await?,
        Commands::Rm { todo } => todos::remove(&paths, &todo).await?,
        Commands::Tag { todo, tag } => todos::tag(&paths, &todo, &tag).await?,
        Commands::Untag { todo, tag } => todos::untag(&paths, &todo, &tag).await?,
        Commands::Share { list, members } => share::share(&paths, &list, &members).await?,
        Commands::Invite { list } => share::invite(&paths, &list).await?,
        Commands::Join { target } => share::join(&paths, &target).await?,
        Commands::Status => status::run(&paths).await?,
    }

    Ok(())
}

/// Log to stderr: `warn` by default, `debug` with `--verbose`, or `RUST_LOG`.
fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Get the default data directory for todos.
fn default_data_dir() -> Result<PathBuf> {
    let dirs = directories::ProjectDirs::from("io", "todos-sync", "todos")
        .context("Could not determine home directory")?;
    Ok(dirs.data_dir().to_path_buf())
}
