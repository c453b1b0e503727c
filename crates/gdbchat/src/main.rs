//! GDB Chat entry point.

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{fmt, EnvFilter};

use gdbchat::{shutdown_signal, App, Cli, Paths};

#[tokio::main]
async fn main() {
    // .env.local / .env may carry GDBCHAT_* settings
    let loaded = gdbchat_core::load_env_files();

    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cli.log_level()));
    fmt().with_env_filter(filter).with_target(false).init();

    for path in &loaded {
        tracing::debug!(path = %path.display(), "loaded env file");
    }

    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> gdbchat::Result<()> {
    let paths = Paths::resolve()?;
    let shutdown = CancellationToken::new();
    let app = App::build(&cli, &paths, shutdown.clone())?;

    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        signal_token.cancel();
    });

    app.run().await
}
