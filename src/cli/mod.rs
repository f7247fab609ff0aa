pub mod logs;
pub mod projects;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use logs::{process_logs_command, LogsCommand};
use projects::process_projects_command;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, level_filters::LevelFilter};

use crate::{
    engine::{
        shutdown::detect_shutdown,
        ticker::{Ticker, DISPLAY_INTERVAL},
        TimerEngine,
    },
    storage::project_store::SqliteStore,
    tui::run_tui,
    utils::{
        clock::SystemClock,
        dir::{create_application_default_path, ensure_dir},
        logging::enable_logging,
    },
};

pub const DATABASE_FILE: &str = "timeboxer.db";

#[derive(Parser, Debug)]
#[command(name = "timeboxer", version, long_about = None)]
#[command(about = "Time boxes per project with a log of every session", long_about = None)]
struct Args {
    #[command(subcommand)]
    commands: Option<Commands>,
    #[arg(
        long,
        global = true,
        help = "Application directory. \
                By default tries to save into $XDG_STATE_HOME or $HOME/.local/state"
    )]
    dir: Option<PathBuf>,
    #[arg(
        long,
        global = true,
        help = "Log level, like \"debug\" or \"trace\". Falls back to RUST_LOG, then info"
    )]
    log_filter: Option<LevelFilter>,
    #[arg(long, global = true, help = "Also print logs to stdout")]
    log_console: bool,
}

#[derive(Subcommand, Debug)]
#[command(version, about, long_about = None)]
enum Commands {
    #[command(about = "Open the interactive timer. Used when no command is given")]
    Tui,
    #[command(about = "Print every project with its progress")]
    Projects {
        #[arg(long, help = "Print as json")]
        json: bool,
    },
    #[command(about = "Print logged sessions, newest first")]
    Logs {
        #[command(flatten)]
        command: LogsCommand,
    },
}

pub async fn run_cli() -> Result<()> {
    let args = Args::parse();

    let dir = match args.dir {
        Some(dir) => ensure_dir(dir)?,
        None => create_application_default_path()?,
    };
    enable_logging(&ensure_dir(dir.join("logs"))?, args.log_filter, args.log_console)?;

    let store = SqliteStore::open(&dir.join(DATABASE_FILE))?;
    info!("Using database in {dir:?}");

    match args.commands.unwrap_or(Commands::Tui) {
        Commands::Tui => run_interactive(store).await,
        Commands::Projects { json } => process_projects_command(&store, json),
        Commands::Logs { command } => process_logs_command(&store, command),
    }
}

/// Runs the ui next to the ticker and the signal listener. Whatever ends first cancels the
/// others, then the engine flushes running sessions and closes the store.
async fn run_interactive(store: SqliteStore) -> Result<()> {
    let mut engine = TimerEngine::new(store, Box::new(SystemClock))?;

    let shutdown_token = CancellationToken::new();
    let (sender, receiver) = mpsc::channel(1);
    let ticker = Ticker::new(
        sender,
        shutdown_token.clone(),
        DISPLAY_INTERVAL,
        Box::new(SystemClock),
    );

    let (_, ticker_result, ui_result) = tokio::join!(
        detect_shutdown(shutdown_token.clone()),
        ticker.run(),
        run_tui(&mut engine, receiver, shutdown_token.clone()),
    );

    if let Err(ticker_result) = ticker_result {
        error!("Ticker got an error {:?}", ticker_result);
    }

    let shutdown_result = engine.shutdown();
    if let Err(e) = &shutdown_result {
        error!("Failed to flush state on shutdown {e:?}");
    }
    ui_result.and(shutdown_result)
}
