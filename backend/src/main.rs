use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use std::sync::Arc;
use std::time::Duration;

mod config;
mod db;
mod handlers;
mod middleware;
mod models;
mod services;

use config::Config;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    let config = Config::from_env().map_err(|e| {
        log::error!("Invalid configuration: {}", e);
        std::io::Error::new(std::io::ErrorKind::InvalidInput, e)
    })?;

    log::info!("Starting server at {}:{}", config.host, config.port);

    let pool = db::connect(&config.database_url)
        .await
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;

    db::migrate(&pool)
        .await
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;

    log::info!("Database migrations completed");

    let job_config = services::background_jobs::JobConfig::from_config(&config);
    tokio::spawn(services::background_jobs::start_scheduler(pool.clone(), job_config));

    // 5 failed logins per username lock it for 15 minutes
    let login_throttle = Arc::new(middleware::LoginThrottle::new(5, Duration::from_secs(15 * 60)));

    let app_state = web::Data::new(models::AppState {
        db: pool,
        config: config.clone(),
        login_throttle,
    });

    let allowed_origins = config.cors_origins.clone();

    HttpServer::new(move || {
        let allowed_origins = allowed_origins.clone();
        let cors = Cors::default()
            .allowed_origin_fn(move |origin, _req_head| {
                let origin = origin.to_str().unwrap_or("");
                allowed_origins.iter().any(|allowed| origin.starts_with(allowed.as_str()))
            })
            .allowed_methods(vec!["GET", "POST", "PUT", "DELETE", "OPTIONS"])
            .allowed_headers(vec!["Authorization", "Content-Type"])
            .max_age(3600);

        App::new()
            .app_data(app_state.clone())
            .wrap(Logger::default())
            .wrap(cors)
            .configure(handlers::configure_routes)
    })
    .bind((config.host.as_str(), config.port))?
    .run()
    .await
}
