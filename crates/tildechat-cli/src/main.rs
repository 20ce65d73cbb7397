//! Tildechat CLI - main entry point

use clap::Parser;
use tokio::io::BufReader;
use tokio::task::LocalSet;
use tracing::info;

use tildechat_cli::{app::TerminalChat, cli::Cli, config::AppConfig};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // Parse command line arguments
    let cli = Cli::parse();

    if cli.example_config {
        println!("{}", AppConfig::example_config()?);
        return Ok(());
    }

    // Initialize logging
    setup_logging(cli.verbose);

    // Load configuration
    let config = AppConfig::load(&cli)?;
    info!(
        "Connecting to {} (push {})",
        config.client.http_endpoint, config.client.ws_endpoint
    );

    // The client and its push transport live on this thread
    LocalSet::new()
        .run_until(async move {
            let client = tildechat_net::connect(&config.client)?;
            let chat = TerminalChat::new(client, &config, std::io::stdout());
            chat.run(BufReader::new(tokio::io::stdin())).await
        })
        .await?;

    info!("tildechat exited");
    Ok(())
}

/// Setup logging based on verbosity level.
///
/// Logs go to stderr so they never interleave with chat lines on stdout.
fn setup_logging(verbose: bool) {
    let log_level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}
