use actix_web::middleware::NormalizePath;
use actix_web::web::Data;
use actix_web::{App, HttpServer, Responder, get};
use std::sync::Arc;
use std::time::Duration;

mod api;
mod auth;
mod clock;
mod config;
mod db;
mod docs;
mod engine;
mod error;
mod model;
mod models;
mod routes;
mod store;

use clock::SystemClock;
use config::Config;
use db::init_store;
use engine::{Engine, EngineSettings};

use crate::docs::ApiDoc;
use tracing::info;
use tracing_appender::rolling;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[get("/")]
async fn index() -> impl Responder {
    "Attendance service is running"
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    // Rolling daily log
    let file_appender = rolling::daily(&config.log_dir, "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_max_level(tracing::Level::DEBUG)
        .with_ansi(false)
        .with_target(false)
        .with_level(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .pretty()
        .init();

    info!("Server starting...");

    let store = init_store(&config).await?;
    let clock = Arc::new(SystemClock::new(config.utc_offset()?));
    let engine = Engine::new(store, clock, EngineSettings::from(&config));

    let sweeper = engine::sweep::spawn(
        engine.clone(),
        Duration::from_secs(config.sweep_interval_secs),
    );
    info!(
        every_secs = config.sweep_interval_secs,
        stale_after_hours = config.stale_after_hours,
        "Invalidation sweep scheduled"
    );

    // One limiter for all workers so the per-IP quota is process-wide
    let limiter = Arc::new(routes::build_limiter(config.rate_protected_per_min)?);
    let server_addr = config.server_addr.clone();
    let engine_data = Data::new(engine);
    let config_data = Data::new(config);

    HttpServer::new(move || {
        let config = config_data.clone();
        let limiter = limiter.clone();
        App::new()
            .wrap(actix_web::middleware::Logger::default())
            .wrap(NormalizePath::trim())
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}")
                    .url("/api-doc/openapi.json", ApiDoc::openapi()),
            )
            .app_data(engine_data.clone())
            .app_data(config.clone())
            .service(index)
            .configure(move |cfg| routes::configure(cfg, &config, limiter))
    })
    .bind(server_addr)?
    .run()
    .await?;

    sweeper.abort();
    info!("Server stopped");
    Ok(())
}
