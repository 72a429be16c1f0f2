#![allow(dead_code)]

use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use food_recognizer::classifier::{Classifier, ModelStatus};
use food_recognizer::errors::{ClassificationError, LookupError};
use food_recognizer::models::{ClassificationResult, NutrientValue, NutritionRecord};
use food_recognizer::nutrition::NutritionLookup;
use food_recognizer::{AppState, UploadSettings};
use image::{DynamicImage, ImageOutputFormat, Rgb, RgbImage};

pub const BOUNDARY: &str = "----food-recognizer-test-boundary";

pub struct MockClassifier {
    pub answer: Result<ClassificationResult, ClassificationError>,
    pub calls: AtomicUsize,
}

impl MockClassifier {
    pub fn predicting(label: &str, confidence: f32) -> Arc<Self> {
        Arc::new(Self {
            answer: Ok(ClassificationResult {
                label: label.to_owned(),
                confidence,
            }),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn failing(err: ClassificationError) -> Arc<Self> {
        Arc::new(Self {
            answer: Err(err),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Classifier for MockClassifier {
    fn predict(&self, _image: &DynamicImage) -> Result<ClassificationResult, ClassificationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.answer.clone()
    }

    fn status(&self) -> ModelStatus {
        ModelStatus::Ready
    }
}

pub struct MockNutrition {
    pub answer: Result<NutritionRecord, LookupError>,
    pub labels: std::sync::Mutex<Vec<String>>,
}

impl MockNutrition {
    pub fn returning(record: NutritionRecord) -> Arc<Self> {
        Arc::new(Self {
            answer: Ok(record),
            labels: std::sync::Mutex::default(),
        })
    }

    pub fn failing(err: LookupError) -> Arc<Self> {
        Arc::new(Self {
            answer: Err(err),
            labels: std::sync::Mutex::default(),
        })
    }

    pub fn labels(&self) -> Vec<String> {
        self.labels.lock().unwrap().clone()
    }
}

#[async_trait]
impl NutritionLookup for MockNutrition {
    async fn lookup(&self, food_label: &str) -> Result<NutritionRecord, LookupError> {
        self.labels.lock().unwrap().push(food_label.to_owned());
        self.answer.clone()
    }
}

pub fn quesadilla_record() -> NutritionRecord {
    NutritionRecord {
        food_name: "Quesadilla with chicken".into(),
        calories: NutrientValue::Known(292.0),
        protein: NutrientValue::Known(15.6),
        carbs: NutrientValue::Known(22.4),
        fats: NutrientValue::Unknown,
    }
}

pub fn state(
    classifier: Arc<dyn Classifier>,
    nutrition: Arc<dyn NutritionLookup>,
    upload_dir: &std::path::Path,
) -> AppState {
    AppState::new(
        classifier,
        nutrition,
        UploadSettings {
            dir: upload_dir.to_path_buf(),
            max_bytes: 1024 * 1024,
        },
    )
}

pub fn png_bytes() -> Vec<u8> {
    let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(32, 24, Rgb([200, 160, 90])));
    let mut out = Cursor::new(Vec::new());
    image.write_to(&mut out, ImageOutputFormat::Png).unwrap();
    out.into_inner()
}

/// Multipart body with one file part per `(field, filename, bytes)`.
pub fn multipart_body(parts: &[(&str, &str, &[u8])]) -> Vec<u8> {
    let mut body = Vec::new();
    for (field, filename, bytes) in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

pub fn multipart_content_type() -> String {
    format!("multipart/form-data; boundary={BOUNDARY}")
}
