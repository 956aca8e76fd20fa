use actix_cors::Cors;
use actix_web::{http::header, middleware::Logger, web, App, HttpServer};
use log::{error, info, warn};
use std::sync::Arc;

use college_transport::config::ServerConfig;
use college_transport::db::{seed, MemoryStore, MongoDB, Store};
use college_transport::handlers;
use college_transport::mail::{HttpMailer, LogMailer, Mailer};
use college_transport::state::AppState;

fn io_error(message: impl std::fmt::Display) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::Other, message.to_string())
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = ServerConfig::from_env().map_err(|e| {
        error!("Configuration error: {}", e);
        io_error(e)
    })?;

    let store: Arc<dyn Store> = match &config.mongodb_uri {
        Some(uri) => {
            let db = MongoDB::new(uri, &config.db_name).await.map_err(|e| {
                error!("Could not connect to MongoDB: {}", e);
                io_error(e)
            })?;
            db.ensure_indexes().await.map_err(io_error)?;
            info!("Connected to MongoDB database {}", config.db_name);
            Arc::new(db)
        }
        None => {
            warn!("Running with the in-memory store; data is lost on restart");
            Arc::new(MemoryStore::new())
        }
    };

    seed::seed_data(store.as_ref(), &config.seed).await.map_err(|e| {
        error!("Seeding failed: {}", e);
        io_error(e)
    })?;

    let mailer: Arc<dyn Mailer> = match &config.mail {
        Some(mail) => Arc::new(
            HttpMailer::new(mail.api_url.clone(), mail.api_key.clone(), mail.from.clone())
                .map_err(io_error)?,
        ),
        None => {
            info!("MAIL_API_URL not set, emails will be logged");
            Arc::new(LogMailer)
        }
    };

    let state = web::Data::new(AppState::new(store, mailer, config.booking.clone()));
    let cors_origin = config.cors_origin.clone();

    info!("Starting server on {}:{}", config.host, config.port);
    HttpServer::new(move || {
        let cors = Cors::default()
            .allowed_origin(&cors_origin)
            .allowed_methods(vec!["GET", "POST", "DELETE"])
            .allowed_headers(vec![header::AUTHORIZATION, header::CONTENT_TYPE])
            .supports_credentials()
            .max_age(3600);

        App::new()
            .wrap(cors)
            .wrap(Logger::default())
            .app_data(state.clone())
            .configure(handlers::configure)
    })
    .bind((config.host.as_str(), config.port))?
    .run()
    .await
}
