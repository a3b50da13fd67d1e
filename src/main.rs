//! remote-terminal-mcp: MCP server for remote-server lifecycle operations.
//!
//! This tool lets AI assistants connect to configured remote servers
//! through tmux sessions: direct SSH, relay-gateway logins, Docker
//! container entry, shell setup and file auto-sync. Server definitions
//! live in `~/.remote-terminal/config.yaml`.

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info, Level};
use tracing_subscriber::EnvFilter;

use remote_terminal_mcp::config::ConfigStore;
use remote_terminal_mcp::mcp::McpServer;
use remote_terminal_mcp::pane::TmuxPaneManager;
use remote_terminal_mcp::tools::ToolDispatcher;
use remote_terminal_mcp::wizard::terminal::run_terminal_wizard;

/// MCP server that drives SSH/relay/Docker connections through tmux
/// sessions for AI assistants.
///
/// Runs as a stdio JSON-RPC server by default; `--setup-wizard` instead
/// runs the interactive configuration prompts in the current terminal.
#[derive(Parser, Debug)]
#[command(name = "remote-terminal-mcp")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the server registry (default ~/.remote-terminal/config.yaml)
    #[arg(short, long, value_name = "FILE")]
    config: Option<std::path::PathBuf>,

    /// Run the interactive configuration wizard instead of the MCP server
    #[arg(long)]
    setup_wizard: bool,

    /// Increase logging verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Decrease logging verbosity (only show errors)
    #[arg(short, long)]
    quiet: bool,
}

/// Determines the log level from CLI arguments.
fn get_log_level(verbose: u8, quiet: bool) -> Level {
    if quiet {
        return Level::ERROR;
    }
    match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

/// Initialises the tracing subscriber.
///
/// The writer is pinned to stderr: stdout belongs exclusively to the
/// JSON-RPC stream.
fn init_tracing(level: Level) {
    let filter = EnvFilter::from_default_env().add_directive(level.into());

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Entry point for the remote-terminal-mcp server.
fn main() -> ExitCode {
    let args = Args::parse();

    let log_level = get_log_level(args.verbose, args.quiet);
    init_tracing(log_level);

    let store = args
        .config
        .map_or_else(ConfigStore::at_default_location, ConfigStore::new);

    // Re-entry point for the external-terminal wizard
    if args.setup_wizard {
        return match run_terminal_wizard(&store) {
            Ok(notice) => {
                info!("{notice}");
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("Configuration failed: {e}");
                ExitCode::FAILURE
            }
        };
    }

    info!(
        version = env!("CARGO_PKG_VERSION"),
        registry = %store.path().display(),
        "Starting remote-terminal-mcp server"
    );

    let pane = match TmuxPaneManager::discover() {
        Ok(pane) => Arc::new(pane),
        Err(e) => {
            error!(error = %e, "tmux is required but was not found on PATH");
            return ExitCode::FAILURE;
        }
    };

    let dispatcher = ToolDispatcher::new(store, pane);
    let mut server = McpServer::new(dispatcher);

    info!("MCP server ready, waiting for client connection...");

    // Current-thread runtime: MCP uses single-connection stdio transport
    // and tool calls are strictly sequential
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(error = %e, "Failed to create Tokio runtime");
            return ExitCode::FAILURE;
        }
    };
    let result = runtime.block_on(server.run());

    match result {
        Ok(()) => {
            info!("Server shut down gracefully");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "Server error");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Args::command().debug_assert();
    }

    #[test]
    fn verbosity_mapping() {
        assert_eq!(get_log_level(0, false), Level::WARN);
        assert_eq!(get_log_level(1, false), Level::INFO);
        assert_eq!(get_log_level(2, false), Level::DEBUG);
        assert_eq!(get_log_level(5, false), Level::TRACE);
        assert_eq!(get_log_level(3, true), Level::ERROR);
    }
}
