use axum::{routing::get, Router};
use solar_leads_api::config::Config;
use solar_leads_api::handlers::{self, AppState};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower_governor::{
    governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor, GovernorLayer,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Main entry point for the application.
///
/// Initializes logging, configuration, shared state (CEP cache, CRM client,
/// rate limiter, lead registry) and the HTTP routes, then starts the Axum
/// server.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "solar_leads_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;

    let app_state = Arc::new(
        AppState::new(config.clone())
            .map_err(|e| anyhow::anyhow!("Failed to build application state: {}", e))?,
    );
    tracing::info!(
        "Application state ready (Kommo: {})",
        if app_state.kommo.is_some() {
            "enabled"
        } else {
            "disabled"
        }
    );

    // Idle rate-limit keys are otherwise only pruned when the same source
    // comes back.
    let limiter = Arc::clone(&app_state.crm_rate_limiter);
    let prune_every = Duration::from_secs(config.crm_rate_limit_window_secs.max(60));
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(prune_every);
        loop {
            interval.tick().await;
            limiter.prune(Instant::now());
            tracing::debug!("Rate limiter pruned: {} active key(s)", limiter.tracked_keys());
        }
    });

    // Configure rate limiter: 10 requests/second per IP, burst of 20
    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(10)
            .burst_size(20)
            .key_extractor(SmartIpKeyExtractor)
            .finish()
            .ok_or_else(|| anyhow::anyhow!("Invalid rate limiter configuration"))?,
    );

    // Health check bypasses rate limiting
    let app = Router::new()
        .route("/health", get(handlers::health))
        .merge(handlers::api_router(app_state).layer(GovernorLayer {
            config: governor_conf,
        }))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
