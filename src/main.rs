use actix_web::{web, App, HttpServer};
use log::{error, info, warn};
use std::path::Path;
use std::process;

use signed_store::api;
use signed_store::app_state::AppState;
use signed_store::config::AppConfig;

fn init_logging(config_file: &str) {
    if Path::new(config_file).exists() {
        match log4rs::init_file(config_file, Default::default()) {
            Ok(()) => return,
            Err(e) => eprintln!("Failed to load log config {}: {}", config_file, e),
        }
    }
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    warn!("Log config {} not used, logging to stderr", config_file);
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let config = match AppConfig::load() {
        Ok(config) => config,
        Err(e) => {
            env_logger::init();
            error!("Invalid configuration: {}", e);
            eprintln!("Invalid configuration: {}", e);
            process::exit(1);
        }
    };
    init_logging(&config.logging.config_file);
    config.log_source();

    let state = match AppState::from_config(config.clone()) {
        Ok(state) => web::Data::new(state),
        Err(e) => {
            error!("Failed to initialize application state: {}", e);
            process::exit(1);
        }
    };

    let host = config.server.host.clone();
    let port = config.server.port;
    info!(
        "Starting server on {}:{} (storage: {})",
        host, port, config.storage.upload_dir
    );

    HttpServer::new(move || {
        App::new()
            .wrap(actix_web::middleware::Logger::default())
            .app_data(state.clone())
            .configure(api::configure)
    })
    .workers(config.server.workers)
    .bind((host.as_str(), port))?
    .run()
    .await
}
