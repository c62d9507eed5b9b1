use autoflow_engine::EngineClient;
use autoflow_server::{
    api,
    config::ServerConfig,
    db::{DeploymentRepository, RuntimeRepository, WorkflowRepository},
    state::AppState,
};
use autoflow_workflow::WorkflowValidator;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration from environment
    let config = ServerConfig::from_env().expect("failed to load configuration");
    tracing::info!("Loaded configuration");

    // Create database connection pool
    let db_pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await
        .expect("failed to connect to database");

    // Run migrations
    tracing::info!("Running database migrations...");
    sqlx::migrate!("./migrations")
        .run(&db_pool)
        .await
        .expect("failed to run migrations");

    let validator = WorkflowValidator::builtin();
    let engine = EngineClient::new(config.engine.clone(), validator.clone())
        .expect("failed to build execution engine client");
    tracing::info!(base_url = %config.engine.base_url, "Configured execution engine");

    let app_state = Arc::new(AppState::new(
        validator,
        Arc::new(engine),
        Arc::new(WorkflowRepository::new(db_pool.clone())),
        Arc::new(DeploymentRepository::new(db_pool.clone())),
        Arc::new(RuntimeRepository::new(db_pool.clone())),
        config.deployment.retry.clone(),
        config.sync.page_size,
    ));

    // Spawn stuck deployment janitor; the first sweep runs immediately and
    // catches deployments abandoned by a restart
    let janitor_state = app_state.clone();
    let stuck_after = config.deployment.stuck_after();
    let janitor_interval_secs = config.deployment.janitor_interval_seconds;
    tokio::spawn(async move {
        let mut interval =
            tokio::time::interval(Duration::from_secs(janitor_interval_secs.max(1)));
        loop {
            interval.tick().await;
            match janitor_state
                .orchestrator
                .fail_stuck_deployments(stuck_after)
                .await
            {
                Ok(count) if count > 0 => {
                    tracing::info!(failed_deployments = count, "Failed stuck deployments");
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to sweep stuck deployments");
                }
            }
        }
    });

    // Spawn periodic runtime sync
    let sync_interval_secs = config.sync.interval_seconds;
    if sync_interval_secs > 0 {
        let sync_state = app_state.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(sync_interval_secs));
            loop {
                interval.tick().await;
                match sync_state.sync.reconcile_all().await {
                    Ok(entry) => {
                        tracing::debug!(
                            workflows = entry.workflows_processed,
                            failed = entry.failed_syncs,
                            "Periodic runtime sync"
                        );
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Periodic runtime sync failed");
                    }
                }
            }
        });
    } else {
        tracing::info!("Periodic runtime sync disabled");
    }

    let app = api::router(app_state);

    let listener = tokio::net::TcpListener::bind(&config.bind_address)
        .await
        .expect("failed to bind to address");

    tracing::info!("listening on http://{}", config.bind_address);

    axum::serve(listener, app.into_make_service())
        .await
        .expect("server error");
}
