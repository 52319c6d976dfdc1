//cargo run --package server --bin terrabound_server
use clap::Parser;
use server::{AppState, ServerConfig, router};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "terrabound_server", about = "Satellite land segmentation service")]
struct Args {
    /// Optional configuration file (.toml or .json)
    #[arg(short, long)]
    config: Option<std::path::PathBuf>,
}

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => ServerConfig::from_file(path)?,
        None => ServerConfig::default(),
    };

    let addr = config.bind_addr();
    let state = AppState::new(config)?;
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server running on http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Received Ctrl+C, shutting down gracefully");
            }
        })
        .await?;

    tracing::info!("Server shut down");
    Ok(())
}
