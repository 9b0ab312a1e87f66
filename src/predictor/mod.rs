pub mod linear;

pub use linear::LinearPipeline;

use serde::Serialize;

use crate::error::PredictorError;
use crate::features::{FeatureValue, ModelVariant};

/// Summary of the loaded model, shown on the form page.
#[derive(Debug, Clone, Serialize)]
pub struct ModelInfo {
    pub name: String,
    pub kind: &'static str,
    pub variant: ModelVariant,
    pub columns: Vec<String>,
    pub intercept: f64,
}

/// Trait every fitted regression model must implement.
///
/// Implementations are immutable after load: `predict_batch` takes `&self`
/// so one handle can be shared by every request.
pub trait Predictor: Send + Sync {
    /// Human-readable name for logging.
    fn name(&self) -> &str;

    fn info(&self) -> ModelInfo;

    /// Predict one value per row, in row order.
    fn predict_batch(&self, rows: &[Vec<FeatureValue>]) -> Result<Vec<f64>, PredictorError>;

    fn predict(&self, row: &[FeatureValue]) -> Result<f64, PredictorError> {
        let outputs = self.predict_batch(&[row.to_vec()])?;
        match outputs.as_slice() {
            [value] => Ok(*value),
            other => Err(PredictorError::OutputLength {
                expected: 1,
                actual: other.len(),
            }),
        }
    }
}
