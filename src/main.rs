use anyhow::{Context, Result};
use tracing::info;
use voicebridge::{create_router, AppState, Config};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cfg = Config::load("config/voicebridge")?;
    let api_key = std::env::var("OPENAI_API_KEY").context("OPENAI_API_KEY not set")?;

    info!("{} v0.1.0", cfg.service.name);
    info!(
        "HTTP server binding to {}:{}",
        cfg.service.http.bind, cfg.service.http.port
    );
    info!("Serving static assets from {}", cfg.service.static_dir);

    let addr = format!("{}:{}", cfg.service.http.bind, cfg.service.http.port);
    let state = AppState::new(cfg, api_key);
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    axum::serve(listener, router).await?;

    Ok(())
}
