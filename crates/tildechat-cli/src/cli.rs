//! Command-line interface definitions and parsing

use std::path::PathBuf;

use clap::Parser;

/// Chat from the terminal: every line you type is sent, every line anyone
/// sends is printed as `~ text`. Type `clear` to empty the screen's history,
/// Ctrl-D to leave.
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// GraphQL HTTP endpoint, e.g. http://127.0.0.1:8000/
    #[arg(long, value_name = "URL")]
    pub http_endpoint: Option<String>,

    /// GraphQL WebSocket endpoint, e.g. ws://127.0.0.1:8000/ws
    #[arg(long, value_name = "URL")]
    pub ws_endpoint: Option<String>,

    /// Print an example configuration file and exit
    #[arg(long)]
    pub example_config: bool,
}
