use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use dotenv::dotenv;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::{self, TraceLayer};
use tracing::{info, warn, Level};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod router;

use media_cell::services::{AzureBlobStore, ObjectStore};
use monitoring_cell::{spawn_health_sweep, CompositeNotifier, Notifier};
use queue_cell::services::{AgentRunner, AzureAgentClient};
use shared_config::AppConfig;
use shared_database::PgStore;
use shared_utils::AppState;

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Loading Env Vars
    dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting patient intake API server");

    // Load configuration
    let config = Arc::new(AppConfig::from_env());
    if !config.is_configured() {
        warn!("Database or signing secrets are missing; authenticated routes will reject machine callers");
    }

    // Database
    let store = PgStore::connect(&config).await.context("connecting to Postgres")?;
    store.ensure_schema().await.context("applying database schema")?;
    let state = AppState::new(config.clone(), Arc::new(store));

    // External integrations
    let notifier: Arc<dyn Notifier> = Arc::new(CompositeNotifier::from_config(&config));
    let agent: Option<Arc<dyn AgentRunner>> = match AzureAgentClient::new(&config) {
        Ok(client) => Some(Arc::new(client)),
        Err(e) => {
            warn!("AI mapping and validation disabled: {}", e);
            None
        }
    };
    let object_store: Option<Arc<dyn ObjectStore>> = match AzureBlobStore::new(&config) {
        Ok(store) => Some(Arc::new(store)),
        Err(e) => {
            warn!("Image storage disabled: {}", e);
            None
        }
    };

    // Background stale-VM sweep
    let sweep = spawn_health_sweep(
        state.clone(),
        notifier.clone(),
        Duration::from_secs(config.health_sweep_interval_seconds.max(1)),
    );

    // Set up CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Build the application router
    let app = router::create_router(
        state,
        router::Integrations {
            notifier,
            agent,
            object_store,
        },
    )
    .layer(
        TraceLayer::new_for_http()
            .make_span_with(trace::DefaultMakeSpan::new().level(Level::INFO))
            .on_response(trace::DefaultOnResponse::new().level(Level::INFO)),
    )
    .layer(cors);

    // Run the server
    let addr: SocketAddr = config
        .bind_addr
        .parse()
        .with_context(|| format!("invalid BIND_ADDR '{}'", config.bind_addr))?;
    info!("Listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    sweep.abort();
    Ok(())
}
