use actix_web::middleware::NormalizePath;
use actix_web::web::Data;
use actix_web::{App, HttpServer};
use dotenvy::dotenv;
use std::sync::Arc;
use tokio::sync::watch;

mod api;
mod config;
mod db;
mod docs;
mod error;
mod identity;
mod model;
mod routes;
mod store;
mod utils;
mod voting;

use config::Config;
use db::{ensure_schema, init_db};

use crate::docs::ApiDoc;
use crate::store::{LogBook, MemoryLogBook, MemoryVoteStore, MySqlLogBook, MySqlVoteStore, VoteStore};
use crate::voting::{DayOffService, announce, sweeper};
use tracing::{info, warn};
use tracing_appender::rolling;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    // Rolling daily log
    let log_dir = std::env::var("LOG_DIR").unwrap_or_else(|_| "logs".to_string());
    let file_appender = rolling::daily(log_dir, "dayoff.log");
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

    let config = Config::from_env();
    info!(addr = %config.server_addr, "Server starting...");

    let (store, log_book): (Arc<dyn VoteStore>, Arc<dyn LogBook>) = match &config.database_url {
        Some(url) => {
            let pool = init_db(url, config.store_timeout).await?;
            ensure_schema(&pool).await?;
            (
                Arc::new(MySqlVoteStore::new(pool.clone(), config.store_timeout)),
                Arc::new(MySqlLogBook::new(pool, config.store_timeout)),
            )
        }
        None => {
            warn!("DATABASE_URL not set, day-off requests are kept in memory only");
            (Arc::new(MemoryVoteStore::new()), Arc::new(MemoryLogBook::new()))
        }
    };

    let announcer = Arc::from(announce::from_config(&config)?);
    let service = Arc::new(DayOffService::new(store, log_book, announcer, &config));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sweeper_handle = actix_web::rt::spawn(sweeper::run(
        service.clone(),
        config.sweep_interval,
        shutdown_rx,
    ));

    let server_addr = config.server_addr.clone();
    let routes_config = config.clone();

    HttpServer::new(move || {
        App::new()
            .wrap(actix_web::middleware::Logger::default())
            .wrap(NormalizePath::trim())
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}")
                    .url("/api-doc/openapi.json", ApiDoc::openapi()),
            )
            .app_data(Data::from(service.clone()))
            .configure(|cfg| routes::configure(cfg, routes_config.clone()))
    })
    .bind(server_addr)?
    .run()
    .await?;

    info!("Server stopped, shutting down sweeper");
    let _ = shutdown_tx.send(true);
    if let Err(e) = sweeper_handle.await {
        warn!(error = %e, "Sweeper task ended abnormally");
    }

    Ok(())
}
