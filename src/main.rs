use std::sync::Arc;

use actix_cors::Cors;
use actix_web::middleware::Logger;
use actix_web::{web, App, HttpServer};
use anyhow::Context;
use tracing::info;

use food_recognizer::classifier::OnnxClassifier;
use food_recognizer::config::{self, ServerConfig};
use food_recognizer::logging::{self, LogFormat};
use food_recognizer::nutrition::{FdcClient, NutritionResolver};
use food_recognizer::{routes, AppState, UploadSettings};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let dotenv = config::load_dotenv();
    logging::init(LogFormat::from_env())?;
    if let Some(path) = dotenv {
        info!(path = %path.display(), "loaded environment file");
    }
    let config = ServerConfig::from_env()?;

    std::fs::create_dir_all(&config.upload_dir).with_context(|| {
        format!("could not create upload directory {}", config.upload_dir.display())
    })?;

    let classifier = OnnxClassifier::load(&config.model_path);
    let fdc = FdcClient::new(&config.fdc).context("could not build FDC HTTP client")?;

    let state = web::Data::new(AppState::new(
        Arc::new(classifier),
        Arc::new(NutritionResolver::new(fdc)),
        UploadSettings {
            dir: config.upload_dir.clone(),
            max_bytes: config.max_upload_bytes,
        },
    ));

    info!("Server running at http://{}:{}", config.host, config.port);

    HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header();

        App::new()
            .app_data(state.clone())
            .wrap(cors)
            .wrap(Logger::default())
            .configure(routes)
    })
    .bind((config.host.as_str(), config.port))?
    .run()
    .await?;

    Ok(())
}
