//! Food photo recognition service.
//!
//! `POST /recognize_food` classifies an uploaded photo into one of the
//! Food-101 categories and attaches nutrition facts looked up in USDA
//! `FoodData` Central.

pub mod categories;
pub mod classifier;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod logging;
pub mod models;
pub mod nutrition;

use std::path::PathBuf;
use std::sync::Arc;

use actix_web::web;

use crate::classifier::Classifier;
use crate::nutrition::NutritionLookup;

/// Where and how large uploads may be written.
#[derive(Debug, Clone)]
pub struct UploadSettings {
    pub dir: PathBuf,
    pub max_bytes: usize,
}

/// Services shared by every request, built once at startup.
#[derive(Clone)]
pub struct AppState {
    pub classifier: Arc<dyn Classifier>,
    pub nutrition: Arc<dyn NutritionLookup>,
    pub uploads: UploadSettings,
}

impl AppState {
    pub fn new(
        classifier: Arc<dyn Classifier>,
        nutrition: Arc<dyn NutritionLookup>,
        uploads: UploadSettings,
    ) -> Self {
        Self {
            classifier,
            nutrition,
            uploads,
        }
    }
}

/// Register the service's routes.
pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/recognize_food").route(web::post().to(handlers::recognize_food)))
        .service(web::resource("/health").route(web::get().to(handlers::health)));
}
