//! shardcache - A Local Key-Value Cache on Sharded JSON Files
//!
//! This is the command-line entry point. Each invocation opens the cache
//! root, runs one command (or a whole session read from stdin) and exits.

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use serde_json::Value;
use shardcache::commands::CommandHandler;
use shardcache::session::{handle_session, SessionStats};
use shardcache::storage::{ShardStore, StoreOptions};
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

const EXAMPLES: &str = r#"EXAMPLES:
    shardcache set username zhangsan        # Store a plain string
    shardcache set config '{"retries": 3}'  # Store a JSON value
    shardcache get username                 # Prints "zhangsan"
    shardcache --root /tmp/mocks keys       # List keys of another cache
    shardcache remove username

SESSION MODE:
    One JSON request per line on stdin, one JSON reply per line on stdout:
    $ printf '%s\n' '{"op":"set","key":"a","value":1}' '{"op":"get","key":"a"}' | shardcache session
    {"ok":true}
    {"found":true,"ok":true,"value":1}
"#;

/// Command-line configuration
#[derive(Debug, Parser)]
#[command(
    name = "shardcache",
    version,
    about = "A local key-value cache persisted as sharded JSON files",
    after_help = EXAMPLES
)]
struct Cli {
    /// Cache root directory
    #[arg(short, long, default_value = shardcache::DEFAULT_ROOT)]
    root: PathBuf,

    /// Buffer writes in memory and flush them once on exit
    #[arg(long)]
    no_auto_save: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace); RUST_LOG overrides
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Store a value; VALUE is parsed as JSON, or stored as a plain string
    Set { key: String, value: String },

    /// Print the stored value as JSON; exits with status 1 if the key is missing
    Get { key: String },

    /// Remove a key
    #[command(alias = "del")]
    Remove { key: String },

    /// List every key, one per line
    Keys,

    /// Print the number of keys
    Len,

    /// Delete everything under the cache root
    Clear,

    /// Print the digest and shard file for a key
    Locate { key: String },

    /// Read JSON requests from stdin until end of input
    Session,
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let options = StoreOptions::new().auto_save(!cli.no_auto_save);
    let store = ShardStore::open_with(&cli.root, options)
        .with_context(|| format!("failed to open cache at {}", cli.root.display()))?;
    debug!(root = %cli.root.display(), "Cache opened");

    run(store, cli.command)
}

/// Sets up logging to stderr so stdout stays machine-readable.
fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}

fn run(mut store: ShardStore, command: Command) -> Result<ExitCode> {
    let mut code = ExitCode::SUCCESS;

    match command {
        Command::Set { key, value } => {
            store.set(&key, parse_value(value))?;
        }
        Command::Get { key } => match store.get(&key)? {
            Some(value) => println!("{}", value),
            None => {
                debug!(key = %key, "Key not found");
                code = ExitCode::FAILURE;
            }
        },
        Command::Remove { key } => {
            let removed = store.remove(&key)?;
            info!(key = %key, removed, "Remove finished");
        }
        Command::Keys => {
            for key in store.keys()? {
                println!("{}", key);
            }
        }
        Command::Len => println!("{}", store.len()?),
        Command::Clear => store.clear()?,
        Command::Locate { key } => {
            let location = store.locate(&key)?;
            println!("{} {}", location.digest, location.file.display());
        }
        Command::Session => {
            let stats = Arc::new(SessionStats::new());
            let stdin = io::stdin();
            let stdout = io::stdout();

            info!("Session ready, reading requests from stdin");
            let handler = handle_session(
                stdin.lock(),
                stdout.lock(),
                CommandHandler::new(store),
                stats,
            )?;
            store = handler.into_store();
        }
    }

    store.flush().context("failed to flush pending shards")?;
    Ok(code)
}

/// Parses a command-line value as JSON, falling back to a plain string.
fn parse_value(raw: String) -> Value {
    match serde_json::from_str(&raw) {
        Ok(value) => value,
        Err(_) => Value::String(raw),
    }
}
