use anyhow::Context;
use booksum::{api, config, logging, pipeline};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

/// Serve the PDF summarization pipeline over HTTP and WebSocket.
#[derive(Debug, Parser)]
#[command(name = "booksum", version, about)]
struct Cli {
    /// Port to listen on (defaults to `SERVER_PORT`, then the first free port in 4100-4199).
    #[arg(long)]
    port: Option<u16>,
    /// Directory for uploads, summaries, and audio (defaults to `STORAGE_DIR`).
    #[arg(long)]
    storage_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = config::init_config_with(config::ConfigOverrides {
        server_port: cli.port,
        storage_dir: cli.storage_dir,
    })
    .context("Failed to load configuration")?;
    logging::init_tracing();

    let service = Arc::new(
        pipeline::PipelineService::new(config).context("Failed to build summarization client")?,
    );
    let sweep_period = Duration::from_secs(config.session_ttl_secs.clamp(1, 60));
    let _reaper = pipeline::spawn_session_reaper(service.clone(), sweep_period);
    let app = api::create_router(service, config.max_upload_bytes);

    let (listener, port) = bind_listener(config.server_port)
        .await
        .context("Failed to bind listener")?;
    tracing::info!(
        storage_dir = %config.storage_dir.display(),
        "Listening on http://0.0.0.0:{}",
        port
    );
    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}

async fn bind_listener(requested: Option<u16>) -> Result<(TcpListener, u16), std::io::Error> {
    use std::net::Ipv4Addr;

    if let Some(port) = requested {
        return TcpListener::bind((Ipv4Addr::UNSPECIFIED, port))
            .await
            .map(|listener| (listener, port));
    }

    const PORT_RANGE: std::ops::RangeInclusive<u16> = 4100..=4199;
    for port in PORT_RANGE {
        match TcpListener::bind((Ipv4Addr::UNSPECIFIED, port)).await {
            Ok(listener) => {
                tracing::debug!(port, "Bound server port");
                return Ok((listener, port));
            }
            Err(err) if err.kind() == std::io::ErrorKind::AddrInUse => {
                tracing::debug!(port, "Port already in use; trying next");
                continue;
            }
            Err(err) => return Err(err),
        }
    }

    Err(std::io::Error::new(
        std::io::ErrorKind::AddrNotAvailable,
        "No available port found in range 4100-4199",
    ))
}
