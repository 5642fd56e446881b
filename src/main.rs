use querydesk::{
    config::{McpConfig, SearchConfig},
    db, AppState,
};

use std::{net::SocketAddr, sync::Arc};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "querydesk=debug,tower_http=debug,axum::rejection=trace".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Database connection
    let pool = db::create_pool().await?;

    // Run migrations
    sqlx::migrate!("./migrations").run(&pool).await?;

    let mcp_config = McpConfig::from_env();
    let search_config = SearchConfig::from_env();
    if search_config.api_url.is_none() {
        tracing::warn!("SEARCH_API_URL is not set; search_web will report an error");
    }

    let state = AppState::new(pool, mcp_config.clone(), search_config)?;
    let shutdown = CancellationToken::new();

    // Idle session eviction
    let sweeper = mcp_config.idle_timeout.map(|max_idle| {
        tracing::info!(
            idle_secs = max_idle.as_secs(),
            sweep_secs = mcp_config.sweep_interval.as_secs(),
            "Idle session eviction enabled"
        );
        state
            .sessions
            .spawn_sweeper(mcp_config.sweep_interval, max_idle, shutdown.clone())
    });

    let app = state.router();

    // Start server
    let host = std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
    let port = std::env::var("PORT")
        .unwrap_or_else(|_| "8080".to_string())
        .parse::<u16>()?;

    let addr = SocketAddr::from((host.parse::<std::net::IpAddr>()?, port));

    tracing::info!("Server running on http://{}{}", addr, mcp_config.path);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let sessions = Arc::clone(&state.sessions);
    let signal = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal(signal).await;
            // Open event streams end once their sessions are closed
            let closed = sessions.close_all().await;
            tracing::info!(closed, "Sessions closed for shutdown");
        })
        .await?;

    if let Some(sweeper) = sweeper {
        sweeper.await.ok();
    }
    tracing::info!("Server stopped");

    Ok(())
}

async fn shutdown_signal(shutdown: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    tracing::info!("Shutdown requested");
    shutdown.cancel();
}
