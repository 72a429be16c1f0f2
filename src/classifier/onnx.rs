use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};

use image::DynamicImage;
use tract_onnx::prelude::*;
use tracing::{debug, error, info, warn};

use super::{prediction_from_scores, preprocess, Classifier, ModelStatus, INPUT_SIZE};
use crate::categories::NUM_CLASSES;
use crate::errors::ClassificationError;
use crate::models::ClassificationResult;

type Plan = TypedRunnableModel<TypedModel>;

/// File names tried, in order, when the model path is a directory.
const WRAPPED_CHECKPOINTS: [&str; 3] = ["model_state.onnx", "state_dict.onnx", "model.onnx"];

enum LoadState {
    Ready(Box<Plan>),
    Failed(String),
}

/// ONNX classifier executed with tract.
///
/// Loading never fails: a checkpoint that cannot be used leaves the
/// classifier degraded and every prediction returns
/// [`ClassificationError::ModelUnavailable`].
pub struct OnnxClassifier {
    state: LoadState,
}

/// Checkpoint files to try for `path`, in priority order.
///
/// A file is taken as the bare model. A directory is searched for a wrapped
/// checkpoint first and a bare `model.onnx` last.
#[must_use]
pub fn checkpoint_candidates(path: &Path) -> Vec<PathBuf> {
    if path.is_dir() {
        WRAPPED_CHECKPOINTS.iter().map(|name| path.join(name)).collect()
    } else {
        vec![path.to_path_buf()]
    }
}

impl OnnxClassifier {
    pub fn load(path: &Path) -> Self {
        let mut failures = Vec::new();

        for candidate in checkpoint_candidates(path) {
            if !candidate.is_file() {
                debug!(path = %candidate.display(), "checkpoint candidate not present");
                failures.push(format!("{}: not found", candidate.display()));
                continue;
            }

            // tract asserts on some malformed graphs instead of erroring.
            match panic::catch_unwind(AssertUnwindSafe(|| load_plan(&candidate))) {
                Ok(Ok(plan)) => {
                    info!(path = %candidate.display(), "Model loaded successfully");
                    return Self {
                        state: LoadState::Ready(Box::new(plan)),
                    };
                }
                Ok(Err(e)) => {
                    warn!(path = %candidate.display(), error = %e, "checkpoint rejected");
                    failures.push(format!("{}: {e:#}", candidate.display()));
                }
                Err(payload) => {
                    let message = panic_message(payload.as_ref());
                    warn!(path = %candidate.display(), %message, "checkpoint crashed the loader");
                    failures.push(format!("{}: loader panicked: {message}", candidate.display()));
                }
            }
        }

        let reason = format!("no usable checkpoint ({})", failures.join("; "));
        error!(model_path = %path.display(), %reason, "Error loading model, serving in degraded mode");
        Self::degraded(reason)
    }

    /// A classifier that refuses every prediction with `reason`.
    pub fn degraded(reason: impl Into<String>) -> Self {
        Self {
            state: LoadState::Failed(reason.into()),
        }
    }

    fn run(plan: &Plan, image: &DynamicImage) -> TractResult<Vec<f32>> {
        let input = preprocess(image);
        let side = INPUT_SIZE as usize;
        let tensor = tract_ndarray::Array::from_shape_vec((1, 3, side, side), input.into_raw_vec())?
            .into_tensor();

        let outputs = plan.run(tvec!(tensor.into()))?;
        let scores = outputs
            .first()
            .ok_or_else(|| anyhow::anyhow!("model produced no outputs"))?
            .to_array_view::<f32>()?
            .iter()
            .copied()
            .collect();
        Ok(scores)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

fn load_plan(path: &Path) -> TractResult<Plan> {
    let side = INPUT_SIZE as usize;
    let model = tract_onnx::onnx()
        .model_for_path(path)?
        .with_input_fact(
            0,
            InferenceFact::dt_shape(f32::datum_type(), tvec!(1, 3, side, side)),
        )?
        .into_optimized()?;

    let classes = model
        .output_fact(0)?
        .shape
        .as_concrete()
        .and_then(|dims| dims.last().copied());
    if classes != Some(NUM_CLASSES) {
        anyhow::bail!("expected a {NUM_CLASSES}-class output, found {classes:?}");
    }

    model.into_runnable()
}

impl Classifier for OnnxClassifier {
    fn predict(&self, image: &DynamicImage) -> Result<ClassificationResult, ClassificationError> {
        let plan = match &self.state {
            LoadState::Ready(plan) => plan,
            LoadState::Failed(reason) => {
                return Err(ClassificationError::ModelUnavailable(reason.clone()))
            }
        };

        let scores = Self::run(plan, image)
            .map_err(|e| ClassificationError::Inference(format!("{e:#}")))?;
        let prediction = prediction_from_scores(&scores)?;
        debug!(label = %prediction.label, confidence = prediction.confidence, "prediction");
        Ok(prediction)
    }

    fn status(&self) -> ModelStatus {
        match &self.state {
            LoadState::Ready(_) => ModelStatus::Ready,
            LoadState::Failed(reason) => ModelStatus::Degraded {
                reason: reason.clone(),
            },
        }
    }
}
