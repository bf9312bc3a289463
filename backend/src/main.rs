use axum::{
    http::Method,
    routing::get,
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod database;
mod error;
mod handlers;
mod jobs;
mod notifications;
mod sla;
mod store;
mod workflows;

pub use error::{ApiError, ApiResult, AppError, AutomationError};

#[cfg(test)]
mod tests;

use jobs::{RunDispatchJob, TickScheduler};
use notifications::{NotificationGateway, PgNotificationGateway};
use sla::{IncidentReconciler, SlaMonitorJob};
use store::{AutomationStore, PgStore};
use workflows::AutomationEngine;

pub struct AppState {
    pub db_pool: sqlx::PgPool,
    pub store: Arc<dyn AutomationStore>,
    pub engine: Arc<AutomationEngine>,
    pub reconciler: Arc<IncidentReconciler>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = config::Config::from_env()?;
    let db_pool = database::create_pool(&config.database_url).await?;

    database::migrate(&db_pool).await?;

    let store: Arc<dyn AutomationStore> = Arc::new(PgStore::new(db_pool.clone()));
    let gateway: Arc<dyn NotificationGateway> = Arc::new(PgNotificationGateway::new(db_pool.clone()));
    let engine = Arc::new(AutomationEngine::new(store.clone(), gateway));
    let reconciler = Arc::new(IncidentReconciler::new(store.clone()));

    let run_ticker = TickScheduler::new(config.automation.run_poll_interval_ms);
    run_ticker.start(Arc::new(RunDispatchJob::new(engine.clone())));

    let sla_ticker = TickScheduler::new(config.automation.sla_poll_interval_ms);
    sla_ticker.start(Arc::new(SlaMonitorJob::new(store.clone())));

    let app_state = Arc::new(AppState {
        db_pool,
        store,
        engine,
        reconciler,
    });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers(Any);

    let app = Router::new()
        .route("/", get(|| async { "Tempo Automation API v1.0.0" }))
        .route("/health", get(handlers::health_check))
        .nest("/api/v1/workflows", handlers::workflow_routes())
        .nest("/api/v1/runs", handlers::run_routes())
        .nest("/api/v1/triggers", handlers::trigger_routes())
        .nest("/api/v1/sla", handlers::sla_routes())
        .layer(ServiceBuilder::new().layer(cors))
        .with_state(app_state);

    let listener = tokio::net::TcpListener::bind(&config.server_addr).await?;
    tracing::info!("Server running on {}", config.server_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
