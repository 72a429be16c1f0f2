use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use actix_multipart::{Field, Multipart};
use actix_web::{web, HttpResponse};
use futures_util::StreamExt;
use tempfile::{Builder, TempDir};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::classifier::{classify_file, ModelStatus};
use crate::errors::{ApiError, ClassificationError, ValidationError};
use crate::models::{HealthResponse, RecognitionResponse};
use crate::AppState;

/// Multipart field carrying the photo.
pub const IMAGE_FIELD: &str = "image";

/// Upload name on disk: a fresh UUID plus the client's extension when it is
/// a plain short ASCII token. Nothing else from the client name is kept.
#[must_use]
pub fn sanitized_upload_name(client_filename: Option<&str>) -> String {
    let extension = client_filename
        .and_then(|name| Path::new(name).extension())
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty() && ext.len() <= 8)
        .filter(|ext| ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .map_or_else(|| "bin".to_owned(), str::to_ascii_lowercase);

    format!("{}.{extension}", Uuid::new_v4())
}

/// The saved upload; removed from disk when dropped.
struct StoredUpload {
    _dir: TempDir,
    path: PathBuf,
}

async fn store_field(
    mut field: Field,
    dir: TempDir,
    max_bytes: usize,
) -> Result<StoredUpload, ApiError> {
    let filename = sanitized_upload_name(field.content_disposition().get_filename());
    let path = dir.path().join(filename);

    let path_for_closure = path.clone();
    let mut f = web::block(move || File::create(&path_for_closure))
        .await
        .map_err(|e| ApiError::Storage(e.to_string()))?
        .map_err(|e| {
            error!(error = %e, "failed to create upload file");
            ApiError::Storage(e.to_string())
        })?;

    let mut written = 0usize;
    while let Some(chunk) = field.next().await {
        let data = chunk.map_err(|e| {
            warn!(error = %e, "upload stream interrupted");
            ValidationError::MalformedUpload
        })?;

        written += data.len();
        if written > max_bytes {
            return Err(ValidationError::ImageTooLarge { limit: max_bytes }.into());
        }

        f = web::block(move || f.write_all(&data).map(|()| f))
            .await
            .map_err(|e| ApiError::Storage(e.to_string()))?
            .map_err(|e| {
                error!(error = %e, "failed to write upload");
                ApiError::Storage(e.to_string())
            })?;
    }

    Ok(StoredUpload { _dir: dir, path })
}

/// Drain the multipart stream, saving the first `image` field.
///
/// A body that is not multipart at all is reported as a missing image.
async fn receive_image(
    payload: &mut Multipart,
    upload_root: &Path,
    max_bytes: usize,
) -> Result<StoredUpload, ApiError> {
    let mut stored = None;

    while let Some(item) = payload.next().await {
        let mut field = match item {
            Ok(field) => field,
            Err(e) => {
                warn!(error = %e, "unreadable multipart body");
                break;
            }
        };

        let is_image = field.content_disposition().get_name() == Some(IMAGE_FIELD);
        if is_image && stored.is_none() {
            let dir = Builder::new()
                .prefix("upload-")
                .tempdir_in(upload_root)
                .map_err(|e| {
                    error!(error = %e, root = %upload_root.display(), "failed to create upload directory");
                    ApiError::Storage(e.to_string())
                })?;
            stored = Some(store_field(field, dir, max_bytes).await?);
        } else {
            while let Some(chunk) = field.next().await {
                if chunk.is_err() {
                    break;
                }
            }
        }
    }

    stored.ok_or_else(|| ValidationError::MissingImage.into())
}

/// `POST /recognize_food`
pub async fn recognize_food(
    state: web::Data<AppState>,
    mut payload: Multipart,
) -> Result<HttpResponse, ApiError> {
    let upload = receive_image(
        &mut payload,
        &state.uploads.dir,
        state.uploads.max_bytes,
    )
    .await
    .inspect_err(|e| info!(error = %e, "upload rejected"))?;

    let classifier = state.classifier.clone();
    let image_path = upload.path.clone();
    let prediction = web::block(move || classify_file(classifier.as_ref(), &image_path))
        .await
        .map_err(|e| ClassificationError::Inference(e.to_string()))?
        .inspect_err(|e| error!(error = %e, "classification failed"))?;
    info!(label = %prediction.label, confidence = prediction.confidence, "food classified");

    let nutrition = state
        .nutrition
        .lookup(&prediction.label)
        .await
        .inspect_err(|e| error!(label = %prediction.label, error = ?e, "nutrition lookup failed"))?;

    drop(upload);
    Ok(HttpResponse::Ok().json(RecognitionResponse::new(prediction, nutrition)))
}

/// `GET /health`
pub async fn health(state: web::Data<AppState>) -> HttpResponse {
    match state.classifier.status() {
        ModelStatus::Ready => HttpResponse::Ok().json(HealthResponse {
            status: "ready",
            reason: None,
        }),
        ModelStatus::Degraded { reason } => {
            HttpResponse::ServiceUnavailable().json(HealthResponse {
                status: "degraded",
                reason: Some(reason),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_only_safe_extension() {
        let name = sanitized_upload_name(Some("../../etc/passwd.JPG"));
        assert!(name.ends_with(".jpg"));
        assert!(!name.contains('/'));
        assert!(!name.contains("passwd"));
    }

    #[test]
    fn odd_extensions_become_bin() {
        for client in [None, Some("photo"), Some("photo.j p g"), Some("a.verylongextension")] {
            assert!(sanitized_upload_name(client).ends_with(".bin"), "{client:?}");
        }
    }

    #[test]
    fn names_are_unique() {
        assert_ne!(
            sanitized_upload_name(Some("pizza.png")),
            sanitized_upload_name(Some("pizza.png"))
        );
    }
}
