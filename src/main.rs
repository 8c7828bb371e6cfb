use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use anyhow::Context;
use bustrack_server::config::CorsConfig;
use bustrack_server::{handlers, AppState, DbOperations, Settings, TrackingStore};
use dotenv::dotenv;
use std::net::TcpListener;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn build_cors(config: &CorsConfig) -> Cors {
    if !config.enabled {
        // Same-origin only
        return Cors::default();
    }

    let cors = if config.allow_any_origin {
        Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
    } else {
        config
            .allowed_origins
            .iter()
            .fold(Cors::default(), |cors, origin| cors.allowed_origin(origin))
            .allowed_methods(vec!["GET", "POST", "OPTIONS"])
            .allowed_headers(vec!["Authorization", "Content-Type"])
    };

    cors.max_age(config.max_age as usize)
}

/// Drops expired sessions and idle login windows on a fixed interval.
fn spawn_sweeper(state: web::Data<AppState>, interval: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;

            match state.auth_service.cleanup_expired_sessions().await {
                Ok(0) => {}
                Ok(removed) => info!("Removed {} expired sessions", removed),
                Err(e) => error!("Session cleanup failed: {}", e),
            }
            state.login_limiter.cleanup().await;
        }
    });
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenv().ok();

    let config = Settings::new().context("failed to load configuration")?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .init();

    info!("Configuration loaded successfully ({})", config.environment);

    let db = Arc::new(
        DbOperations::new_with_options(
            &config.database.url,
            config.database.max_connections,
            Duration::from_secs(config.database.acquire_timeout_secs),
        )
        .await
        .context("failed to connect to database")?,
    );
    if config.database.run_migrations {
        db.run_migrations().await.context("failed to run migrations")?;
        info!("Database migrations applied");
    }

    let store: Arc<dyn TrackingStore> = db.clone();
    let state = web::Data::new(AppState::new(config.clone(), store));

    spawn_sweeper(
        state.clone(),
        Duration::from_secs(config.auth.session_sweep_interval_secs.max(1)),
    );

    let listener = TcpListener::bind(format!("{}:{}", config.server.host, config.server.port))
        .with_context(|| format!("failed to bind {}:{}", config.server.host, config.server.port))?;
    info!("Starting server at http://{}:{}", config.server.host, config.server.port);

    let cors_config = config.cors.clone();
    HttpServer::new(move || {
        App::new()
            .wrap(build_cors(&cors_config))
            .wrap(Logger::new("%r %s %Dms"))
            .app_data(state.clone())
            .configure(handlers::configure)
    })
    .listen(listener)?
    .workers(config.server.workers.max(1) as usize)
    .run()
    .await
    .context("server error")?;

    info!("Server stopped, closing database pool");
    db.close().await;
    Ok(())
}
