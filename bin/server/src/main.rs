use skycast_ai::GeminiBackend;
use skycast_conversation::{
    Dispatcher, InMemorySessionStore, Orchestrator, SessionStore, ToolRegistry,
};
use skycast_server::{AppConfig, AppState, router};
use skycast_weather::WeatherService;
use std::sync::Arc;
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

    let config = AppConfig::from_env().expect("failed to load configuration");
    tracing::info!("Loaded configuration");

    let backend = GeminiBackend::new(config.model).expect("failed to create model backend");
    let weather = WeatherService::from_config(config.weather)
        .expect("failed to create weather service");
    let dispatcher = Dispatcher::weather(Arc::new(ToolRegistry::weather()), Arc::new(weather))
        .expect("tool bindings do not match the registry");
    let store = Arc::new(InMemorySessionStore::new(&config.sessions));

    // Spawn periodic session cleanup task
    let cleanup_store = Arc::clone(&store);
    let cleanup_interval = config.sessions.cleanup_interval();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(cleanup_interval);
        loop {
            interval.tick().await;
            match cleanup_store.purge_expired().await {
                Ok(count) if count > 0 => {
                    tracing::debug!(purged_sessions = count, "Periodic session cleanup");
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to purge expired sessions");
                }
            }
        }
    });

    let orchestrator = Orchestrator::new(
        Arc::new(backend),
        Arc::new(dispatcher),
        store,
        &config.exchange,
    );
    let app = router(AppState::new(Arc::new(orchestrator)));

    let listener = tokio::net::TcpListener::bind(&config.listen_addr)
        .await
        .expect("failed to bind to address");

    tracing::info!("listening on http://{}", config.listen_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
