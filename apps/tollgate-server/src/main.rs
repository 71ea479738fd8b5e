//! # Tollgate Server
//!
//! Actix-web server that admits requests per client through a fixed-window
//! rate limiter.

use actix_web::{App, HttpServer, web};
use tracing_actix_web::TracingLogger;

mod background;
mod config;
mod handlers;
mod middleware;
mod state;
mod telemetry;

use config::AppConfig;
use state::AppState;
use telemetry::TelemetryConfig;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    telemetry::init_telemetry(&TelemetryConfig::from_env());

    // Load configuration
    let config = AppConfig::from_env();

    tracing::info!(
        "Starting Tollgate server on {}:{}",
        config.host,
        config.port
    );

    // Build application state
    let state = AppState::new(&config)
        .await
        .map_err(|e| std::io::Error::other(e.to_string()))?;

    #[cfg(feature = "scheduler")]
    let mut scheduler = {
        use background::{Scheduler, SchedulerConfig};

        let scheduler = Scheduler::new(SchedulerConfig::from_env())
            .await
            .map_err(|e| std::io::Error::other(e.to_string()))?;
        scheduler
            .add_window_sweep(&config.rate_limit.sweep_cron, state.limiter.clone())
            .await
            .map_err(|e| std::io::Error::other(e.to_string()))?;
        scheduler
            .start()
            .await
            .map_err(|e| std::io::Error::other(e.to_string()))?;
        scheduler
    };

    // Start HTTP server; it stops gracefully on SIGINT/SIGTERM
    let app_state = state.clone();
    HttpServer::new(move || {
        let state = app_state.clone();
        App::new()
            .wrap(TracingLogger::default())
            .app_data(web::Data::new(state.clone()))
            .configure(move |cfg| handlers::configure_routes(cfg, &state))
    })
    .bind((config.host.as_str(), config.port))?
    .run()
    .await?;

    #[cfg(feature = "scheduler")]
    if let Err(e) = scheduler.shutdown().await {
        tracing::error!("Failed to stop scheduler: {}", e);
    }

    tracing::info!("Server stopped");
    Ok(())
}
