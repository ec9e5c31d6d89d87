//! acctlink CLI and REST API entry point.
//!
//! Binary name: `acctlink`
//!
//! Parses CLI arguments, opens storage and wires services, then dispatches
//! to the appropriate command handler or starts the REST API server.

mod cli;
mod http;
mod state;

use clap::Parser;
use clap_complete::generate;

use acctlink_observe::tracing_setup::{directive_for_verbosity, init_tracing, shutdown_tracing};
use cli::{Cli, Commands};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Shell completions don't need app state or logging
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = <Cli as clap::CommandFactory>::command();
        generate(*shell, &mut cmd, "acctlink", &mut std::io::stdout());
        return Ok(());
    }

    // The server logs requests at info by default; one-shot commands stay quiet
    let verbose = match cli.command {
        Commands::Serve { .. } => cli.verbose.max(1),
        _ => cli.verbose,
    };
    init_tracing(cli.otel, directive_for_verbosity(verbose, cli.quiet))
        .map_err(|e| anyhow::anyhow!("failed to initialize tracing: {e}"))?;

    let result = run(cli).await;
    shutdown_tracing();
    result
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let state = AppState::init(cli.database_url.as_deref()).await?;

    match cli.command {
        Commands::Providers => {
            cli::provider::list_providers(&state, cli.json).await?;
        }

        Commands::Review { command } => {
            cli::review::handle_review_command(command, &state, cli.json).await?;
        }

        Commands::Status => {
            cli::status::status(&state, cli.json).await?;
        }

        Commands::Serve { port, host } => {
            let addr = format!("{host}:{port}");
            let listener = tokio::net::TcpListener::bind(&addr).await?;

            if !cli.quiet {
                let backend = state
                    .storage
                    .current_backend()
                    .await
                    .map(|b| b.to_string())
                    .unwrap_or_else(|| "unavailable".to_string());
                println!(
                    "  {} acctlink API listening on {}",
                    console::style("⚡").bold(),
                    console::style(format!("http://{addr}")).cyan()
                );
                println!(
                    "  {}",
                    console::style(format!("Storage backend: {backend}")).dim()
                );
                println!("  {}", console::style("Press Ctrl+C to stop").dim());
            }

            let router = http::router::build_router(state);

            axum::serve(listener, router)
                .with_graceful_shutdown(shutdown_signal())
                .await?;

            if !cli.quiet {
                println!("\n  Server stopped.");
            }
        }

        Commands::Completions { .. } => {}
    }

    Ok(())
}

/// Wait for Ctrl+C or SIGTERM for graceful shutdown.
///
/// A handler that fails to install never resolves, leaving the other one in
/// charge.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
