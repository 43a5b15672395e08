use anyhow::{Context, Result};
use clap::Parser;
use handbook_rag::{api, config, logging, service::RagService};
use std::sync::Arc;
use tokio::net::TcpListener;

#[derive(Parser)]
#[command(
    name = "handbook-rag",
    about = "Serve question answering over uploaded PDF handbooks"
)]
struct Cli {
    /// Interface to bind (overrides `API_HOST`).
    #[arg(long)]
    host: Option<String>,
    /// Port to bind (overrides `API_PORT`).
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    dotenvy::dotenv().ok();
    logging::init_tracing();
    let config = config::init_config().context("Failed to load configuration")?;

    let http = reqwest::Client::builder()
        .user_agent(concat!("handbook-rag/", env!("CARGO_PKG_VERSION")))
        .timeout(config.request_timeout)
        .build()
        .context("Failed to build HTTP client")?;
    let service = RagService::from_config(config, http).context("Failed to initialize service")?;
    let app = api::create_router(Arc::new(service), config.max_upload_bytes);

    let host = cli.host.unwrap_or_else(|| config.server_host.clone());
    let port = cli.port.unwrap_or(config.server_port);
    let listener = TcpListener::bind((host.as_str(), port))
        .await
        .with_context(|| format!("Failed to bind {host}:{port}"))?;
    tracing::info!("Listening on http://{}:{}", host, port);
    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}
