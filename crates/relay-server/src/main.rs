use relay_server::{AppState, config::ServerConfig, routes};
use tracing_subscriber::{EnvFilter, prelude::*};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from `.env` if present
    dotenv::dotenv().ok();

    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    let filter_string = format!(
        "warn,relay_server={level},relay_client={level},tower_http={level}",
        level = log_level
    );
    let env_filter = EnvFilter::try_new(filter_string)?;
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_filter(env_filter))
        .init();

    let config = ServerConfig::from_env()?;
    match &config.auto_function_url {
        Some(url) => tracing::info!("Relaying to auto-function service at {}", url),
        None => tracing::info!("No auto-function upstream configured, handling requests locally"),
    }
    tracing::info!("Forwarding uploaded audio to {}", config.audio_service_url);

    let bind_address = config.bind_address();
    let state = AppState::new(config)?;
    let app_router = routes::router(state);

    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    tracing::info!("Server running on http://{}", listener.local_addr()?);

    axum::serve(listener, app_router).await?;
    Ok(())
}
