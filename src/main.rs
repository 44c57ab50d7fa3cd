use std::sync::Arc;

use actix_web::middleware::NormalizePath;
use actix_web::web::Data;
use actix_web::{App, HttpServer, Responder, get};
use dotenvy::dotenv;

use hrm_payroll::config::{Config, StoreBackend};
use hrm_payroll::db::init_db;
use hrm_payroll::docs::ApiDoc;
use hrm_payroll::payroll::PayrollService;
use hrm_payroll::payroll::clock::SystemClock;
use hrm_payroll::routes;
use hrm_payroll::store::{MemoryStore, MySqlStore};

use anyhow::Context;
use tracing::{info, warn};
use tracing_appender::rolling;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[get("/")]
async fn index() -> impl Responder {
    "HRM payroll service"
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let config = Config::from_env()?;

    // Rolling daily log
    let file_appender = rolling::daily(&config.log_dir, "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_max_level(tracing::Level::DEBUG)
        .with_ansi(false)
        .with_target(false) // removes module path
        .with_level(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .pretty()
        .init();

    info!(backend = %config.store_backend, "Server starting...");

    let clock = Arc::new(SystemClock);
    let service = match config.store_backend {
        StoreBackend::Mysql => {
            let url = config
                .database_url
                .as_deref()
                .context("DATABASE_URL must be set")?;
            let store = Arc::new(MySqlStore::new(init_db(url).await?));
            PayrollService::new(
                store.clone(),
                store.clone(),
                store.clone(),
                store,
                clock,
                config.run_concurrency,
            )
        }
        StoreBackend::Memory => {
            warn!("Using the in-memory store; payroll data is lost on restart");
            let store = Arc::new(MemoryStore::new());
            PayrollService::new(
                store.clone(),
                store.clone(),
                store.clone(),
                store,
                clock,
                config.run_concurrency,
            )
        }
    };

    let server_addr = config.server_addr.clone();
    let config_data = config.clone();

    HttpServer::new(move || {
        App::new()
            .wrap(actix_web::middleware::Logger::default())
            .wrap(NormalizePath::trim())
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}") // ← wildcard {_:.*} to match JS/CSS files
                    .url("/api-doc/openapi.json", ApiDoc::openapi()),
            )
            .app_data(Data::new(service.clone()))
            .app_data(Data::new(config.clone()))
            .service(index)
            .configure(|cfg| routes::configure(cfg, &config_data))
    })
    .bind(&server_addr)
    .with_context(|| format!("Failed to bind {server_addr}"))?
    .run()
    .await?;

    Ok(())
}
