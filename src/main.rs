use anyhow::anyhow;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use wsync::presentation::cli::{Cli, CliApp};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins over --verbose
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if cli.verbose { "wsync=debug" } else { "wsync=info" })
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_ansi(!cli.no_color)
        .try_init()
        .map_err(|e| anyhow!("Failed to initialize logging: {}", e))?;

    let code = CliApp::new(cli).run().await;
    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}
