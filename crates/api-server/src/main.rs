//! API Server Binary Entry Point

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use video_session_api_server::{start_server, ApiState, StubEngine};
use video_session_orchestrator::{Janitor, JanitorConfig, OrchestratorConfig};
use video_session_store::SessionStoreConfig;

/// Read an env var, falling back to `default` when unset or unparsable
fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "video_session_api_server=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Configuration from environment
    let addr = std::env::var("VIDEO_SESSION_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());
    let workers = env_or("VIDEO_SESSION_WORKERS", 4);
    let queue_capacity = env_or("VIDEO_SESSION_QUEUE_CAPACITY", 64);
    let ttl_secs = env_or("VIDEO_SESSION_TTL_SECS", 86_400_i64);
    let sweep_secs = env_or("VIDEO_SESSION_SWEEP_SECS", 60_u64);

    // The stub engine keeps the server runnable without any models present;
    // production deployments construct ApiState with their own engine
    let state = ApiState::with_config(
        Arc::new(StubEngine::default()),
        SessionStoreConfig {
            ttl: chrono::Duration::seconds(ttl_secs),
        },
        OrchestratorConfig {
            workers,
            queue_capacity,
        },
    );

    let janitor = Janitor::new(
        state.store.clone(),
        state.orchestrator.clone(),
        JanitorConfig {
            interval: Duration::from_secs(sweep_secs),
            ..JanitorConfig::default()
        },
    )
    .spawn();

    tracing::info!("Starting Video Analysis Session Server");
    start_server(&addr, state).await?;

    janitor.stop().await;
    Ok(())
}
