//! Image classification: preprocessing, score post-processing, and the
//! [`Classifier`] seam the request handler depends on.

mod onnx;

pub use onnx::{checkpoint_candidates, OnnxClassifier};

use std::path::Path;

use image::imageops::{self, FilterType};
use image::io::Reader as ImageReader;
use image::DynamicImage;
use ndarray::Array4;

use crate::categories::{label_for, NUM_CLASSES};
use crate::errors::ClassificationError;
use crate::models::ClassificationResult;

/// Side length of the square network input.
pub const INPUT_SIZE: u32 = 224;

/// Per-channel normalisation the pretrained weights were trained under.
pub const MEAN: [f32; 3] = [0.485, 0.456, 0.406];
pub const STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Whether a classifier can serve predictions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelStatus {
    Ready,
    Degraded { reason: String },
}

pub trait Classifier: Send + Sync {
    /// Top-1 label and its softmax probability.
    ///
    /// # Errors
    ///
    /// Returns a [`ClassificationError`] when the model is unavailable or
    /// inference fails.
    fn predict(&self, image: &DynamicImage) -> Result<ClassificationResult, ClassificationError>;

    fn status(&self) -> ModelStatus;
}

/// Decode an image file, sniffing the format from its content.
///
/// # Errors
///
/// Returns [`ClassificationError::Decode`] if the file cannot be read or is
/// not a supported image.
pub fn decode_image(path: &Path) -> Result<DynamicImage, ClassificationError> {
    ImageReader::open(path)
        .and_then(ImageReader::with_guessed_format)
        .map_err(|e| ClassificationError::Decode(e.to_string()))?
        .decode()
        .map_err(|e| ClassificationError::Decode(e.to_string()))
}

/// Decode `path` and run it through `classifier`.
///
/// # Errors
///
/// Propagates decode and prediction failures.
pub fn classify_file(
    classifier: &dyn Classifier,
    path: &Path,
) -> Result<ClassificationResult, ClassificationError> {
    let image = decode_image(path)?;
    classifier.predict(&image)
}

/// Convert an image into the normalised `(1, 3, 224, 224)` input tensor.
#[must_use]
pub fn preprocess(image: &DynamicImage) -> Array4<f32> {
    let rgb = image.to_rgb8();
    let resized = imageops::resize(&rgb, INPUT_SIZE, INPUT_SIZE, FilterType::Triangle);
    let side = INPUT_SIZE as usize;

    Array4::from_shape_fn((1, 3, side, side), |(_, c, y, x)| {
        let pixel = resized.get_pixel(x as u32, y as u32);
        (f32::from(pixel[c]) / 255.0 - MEAN[c]) / STD[c]
    })
}

/// Numerically stable softmax.
#[must_use]
pub fn softmax(scores: &[f32]) -> Vec<f32> {
    let max = scores.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = scores.iter().map(|s| (s - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

/// Index and value of the largest element.
#[must_use]
pub fn arg_max(values: &[f32]) -> Option<(usize, f32)> {
    values
        .iter()
        .copied()
        .enumerate()
        .max_by(|(_, a), (_, b)| a.total_cmp(b))
}

/// Turn raw network scores into a labelled prediction.
///
/// # Errors
///
/// Returns [`ClassificationError::Inference`] if the network did not emit
/// exactly one score per category.
pub fn prediction_from_scores(scores: &[f32]) -> Result<ClassificationResult, ClassificationError> {
    if scores.len() != NUM_CLASSES {
        return Err(ClassificationError::Inference(format!(
            "expected {NUM_CLASSES} class scores, got {}",
            scores.len()
        )));
    }

    let probabilities = softmax(scores);
    let (index, confidence) = arg_max(&probabilities)
        .ok_or_else(|| ClassificationError::Inference("empty model output".into()))?;
    let label = label_for(index).ok_or_else(|| {
        ClassificationError::Inference(format!("class index {index} out of range"))
    })?;

    Ok(ClassificationResult {
        label: label.to_owned(),
        confidence,
    })
}
