use restro_api::{
    AppState,
    config::{AppConfig, Env},
    create_router,
    repository::{PostgresRepository, RepositoryState},
};
use sqlx::postgres::PgPoolOptions;
use std::{sync::Arc, time::Duration};
use tokio::{net::TcpListener, sync::Notify};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// main
///
/// Loads configuration, installs logging, connects and migrates the database, then serves
/// HTTP until interrupted.
#[tokio::main]
async fn main() {
    // 1. Configuration (fail-fast on missing production secrets)
    dotenv::dotenv().ok();
    let config = AppConfig::load();

    // 2. Logging: RUST_LOG wins, otherwise a development default.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "restro_api=debug,tower_http=info".into());

    match config.env {
        Env::Local => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        Env::Production => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
    }

    tracing::info!("Application starting in {:?} mode", config.env);

    // 3. Database
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.db_url)
        .await
        .expect("FATAL: Failed to connect to Postgres. Check DATABASE_URL.");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("FATAL: Failed to run database migrations.");

    let repo = Arc::new(PostgresRepository::new(pool.clone())) as RepositoryState;

    // 4. Shared state: repository, session issuer and config.
    let bind_addr = config.bind_addr.clone();
    let shutdown_grace = Duration::from_secs(config.shutdown_grace_secs);
    let app = create_router(AppState::new(repo, config));

    // 5. Server
    let listener = TcpListener::bind(&bind_addr)
        .await
        .expect("FATAL: Failed to bind HTTP listener. Check BIND_ADDR.");

    tracing::info!(%bind_addr, "HTTP server listening");
    tracing::info!("API Documentation (Swagger UI) available at /swagger-ui");

    // 6. Graceful shutdown, bounded by SHUTDOWN_GRACE_SECS.
    let stop = Arc::new(Notify::new());
    let stop_rx = stop.clone();
    let mut server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move { stop_rx.notified().await })
            .await
    });

    let finished = tokio::select! {
        result = &mut server => Some(result),
        _ = shutdown_signal() => None,
    };
    let finished = match finished {
        Some(result) => Some(result),
        None => {
            stop.notify_one();
            match tokio::time::timeout(shutdown_grace, &mut server).await {
                Ok(result) => Some(result),
                Err(_) => {
                    tracing::warn!(
                        grace_secs = shutdown_grace.as_secs(),
                        "connections still open after grace period, forcing shutdown"
                    );
                    server.abort();
                    None
                }
            }
        }
    };

    match finished {
        Some(Ok(Err(e))) => tracing::error!(error = %e, "HTTP server terminated with an error"),
        Some(Err(e)) => tracing::error!(error = %e, "HTTP server task failed"),
        _ => {}
    }

    pool.close().await;
    tracing::info!("Shutdown complete");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "could not install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("Shutdown signal received, draining connections");
}
