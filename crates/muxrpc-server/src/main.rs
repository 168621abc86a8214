use clap::Parser;
use muxrpc_server::server::{
    config::{CliArgs, ServerConfig},
    lifecycle::Server,
    telemetry::{init_telemetry, shutdown_telemetry},
};
use tokio::signal;

// Using mimalloc for better performance under contention, especially in musl
// environments.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load from .env
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();
    let config = ServerConfig::try_from(args)?;

    let providers = init_telemetry()?;
    log_startup_info(&config);

    let server = Server::new(config).start().await?;

    shutdown_signal().await?;

    let result = server.stop().await;
    if let Err(errors) = &result {
        tracing::error!(count = errors.len(), "Server stopped with errors");
    } else {
        tracing::info!("Service shut down successfully");
    }

    shutdown_telemetry(providers);

    result.map_err(|errors| {
        let joined = errors
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ");
        anyhow::anyhow!("shutdown failed: {joined}")
    })
}

fn log_startup_info(config: &ServerConfig) {
    if cfg!(debug_assertions) {
        tracing::info!(
            "Starting muxrpc on {} with full config: {:#?}",
            config.server_addr,
            config
        );
    } else {
        tracing::info!(
            "Starting muxrpc on {} as {}/{}",
            config.server_addr,
            config.server_name,
            config.datacenter
        );
    }
}

async fn shutdown_signal() -> anyhow::Result<()> {
    #[cfg(unix)]
    let mut terminate = signal::unix::signal(signal::unix::SignalKind::terminate())?;

    tokio::select! {
        res = signal::ctrl_c() => {
            res?;
            tracing::info!("Received Ctrl+C signal");
        },
        () = async {
            #[cfg(unix)]
            terminate.recv().await;
            #[cfg(not(unix))]
            std::future::pending::<()>().await;
        } => {
            tracing::info!("Received SIGTERM signal");
        },
    }

    tracing::info!("Shutdown signal received, terminating gracefully...");
    Ok(())
}
