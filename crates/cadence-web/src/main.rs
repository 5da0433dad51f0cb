mod error;
mod routes;

use std::sync::Arc;

use anyhow::Result;
use cadence_core::clock::SystemClock;
use cadence_core::config::{self, CadenceConfig};
use cadence_core::service::HabitService;
use cadence_core::storage::{self, SqliteStorage};

pub struct AppState {
    pub service: HabitService<SqliteStorage>,
    /// Identity for dashboard requests that arrive without `x-user-id`.
    pub default_user: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("cadence_web=info")),
        )
        .init();

    let cwd = std::env::current_dir().ok();
    let config = CadenceConfig::load(cwd.as_deref()).unwrap_or_else(|e| {
        tracing::warn!("config: {e}, using defaults");
        CadenceConfig::default_config()
    });

    let storage = storage::create_backend(&config)?;
    let service = HabitService::from_config(storage, Arc::new(SystemClock), &config);
    let default_user = config::resolve_user_id(&config.user);

    let state = Arc::new(AppState {
        service,
        default_user,
    });

    let app = routes::router()
        .with_state(state)
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .layer(tower_http::cors::CorsLayer::permissive());

    let addr = format!("{}:{}", config.web.host, config.web.port);
    tracing::info!("cadence-web listening on http://{addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
