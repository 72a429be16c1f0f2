//! Error types for every failure path of the service.
//!
//! Component errors stay typed up to the handler, where [`ApiError`] maps
//! them onto an HTTP status and a `{"error": "..."}` body.

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde::Serialize;
use thiserror::Error;

/// Failure to turn an image into a prediction.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ClassificationError {
    /// The upload is not a decodable image.
    #[error("Error in prediction: could not decode image: {0}")]
    Decode(String),
    /// Tensor construction or the forward pass failed.
    #[error("Error in prediction: inference failed: {0}")]
    Inference(String),
    /// Weights failed to load at startup.
    #[error("Error in prediction: model is not loaded: {0}")]
    ModelUnavailable(String),
}

/// Failure to resolve nutrition data for a label.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LookupError {
    /// Every query in the fallback ladder came back empty.
    #[error("Food not found")]
    NotFound,
    /// The nutrition API could not be reached or answered with an error.
    /// The cause is kept for logs and not sent to clients.
    #[error("API request failed")]
    ServiceUnavailable(String),
}

/// Rejected client input.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("No image provided")]
    MissingImage,
    #[error("Image exceeds the upload limit of {limit} bytes")]
    ImageTooLarge { limit: usize },
    #[error("Malformed image upload")]
    MalformedUpload,
}

/// Invalid environment configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {var}: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

/// Everything the HTTP layer can answer with besides success.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Classification(#[from] ClassificationError),
    #[error(transparent)]
    Lookup(#[from] LookupError),
    #[error("Could not save uploaded image")]
    Storage(String),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(ValidationError::MissingImage | ValidationError::MalformedUpload) => {
                StatusCode::BAD_REQUEST
            }
            Self::Validation(ValidationError::ImageTooLarge { .. }) => {
                StatusCode::PAYLOAD_TOO_LARGE
            }
            Self::Classification(_) | Self::Lookup(_) | Self::Storage(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ErrorBody {
            error: self.to_string(),
        })
    }
}
