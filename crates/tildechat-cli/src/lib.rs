//! Tildechat CLI library
//!
//! Terminal front end for the chat: configuration loading, a line-oriented
//! view and the session loop that feeds stdin to the shared chat controller.

pub mod app;
pub mod cli;
pub mod config;
pub mod error;
pub mod terminal;

pub use app::TerminalChat;
pub use cli::Cli;
pub use config::{AppConfig, TerminalConfig};
pub use error::{CliError, Result};
pub use terminal::TerminalView;
