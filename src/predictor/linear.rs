//! Linear regression pipeline loaded from a JSON artifact.
//!
//! The artifact mirrors what the offline training step fitted:
//!
//! ```text
//!   y = intercept
//!     + Σ coef_i · x_i                 (numeric columns)
//!     + Σ levels_j[category_j]         (one-hot categorical columns)
//! ```
//!
//! Categories the model never saw contribute nothing, like a one-hot encoder
//! fitted with `handle_unknown = ignore`.
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::info;

use super::{ModelInfo, Predictor};
use crate::error::{ArtifactError, PredictorError};
use crate::features::{FeatureValue, ModelVariant};

/// One fitted input column.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ColumnTerm {
    Numeric { name: String, coef: f64 },
    Categorical {
        name: String,
        levels: BTreeMap<String, f64>,
    },
}

impl ColumnTerm {
    pub fn name(&self) -> &str {
        match self {
            ColumnTerm::Numeric { name, .. } | ColumnTerm::Categorical { name, .. } => name,
        }
    }

    fn coefficients(&self) -> Vec<f64> {
        match self {
            ColumnTerm::Numeric { coef, .. } => vec![*coef],
            ColumnTerm::Categorical { levels, .. } => levels.values().copied().collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearPipeline {
    pub name: String,
    pub variant: ModelVariant,
    pub intercept: f64,
    pub columns: Vec<ColumnTerm>,
}

impl LinearPipeline {
    /// Load and validate an artifact against the configured variant.
    pub fn load(path: &Path, variant: ModelVariant) -> Result<Self, ArtifactError> {
        let label = path.display().to_string();
        if !path.is_file() {
            return Err(ArtifactError::Missing(label));
        }
        let text = std::fs::read_to_string(path).map_err(|e| ArtifactError::Corrupt {
            path: label.clone(),
            reason: e.to_string(),
        })?;
        let pipeline = Self::from_json(&text, &label, variant)?;
        info!(
            "Loaded model '{}' ({} columns, {} variant) from {}",
            pipeline.name,
            pipeline.columns.len(),
            pipeline.variant,
            label
        );
        Ok(pipeline)
    }

    pub fn from_json(text: &str, label: &str, variant: ModelVariant) -> Result<Self, ArtifactError> {
        let pipeline: LinearPipeline =
            serde_json::from_str(text).map_err(|e| ArtifactError::Corrupt {
                path: label.to_string(),
                reason: e.to_string(),
            })?;
        pipeline.validate(label, variant)?;
        Ok(pipeline)
    }

    fn validate(&self, label: &str, variant: ModelVariant) -> Result<(), ArtifactError> {
        let non_finite = !self.intercept.is_finite()
            || self
                .columns
                .iter()
                .flat_map(ColumnTerm::coefficients)
                .any(|c| !c.is_finite());
        if non_finite {
            return Err(ArtifactError::Corrupt {
                path: label.to_string(),
                reason: "non-finite coefficient".to_string(),
            });
        }

        let actual: Vec<String> = self.columns.iter().map(|c| c.name().to_string()).collect();
        if self.variant != variant || actual != variant.encoded_columns() {
            return Err(ArtifactError::ColumnContract {
                variant: variant.to_string(),
                expected: variant.encoded_columns().iter().map(|c| c.to_string()).collect(),
                actual,
            });
        }
        Ok(())
    }

    fn score(&self, row_idx: usize, row: &[FeatureValue]) -> Result<f64, PredictorError> {
        let row_no = row_idx + 1;
        if row.len() != self.columns.len() {
            return Err(PredictorError::ShapeMismatch {
                row: row_no,
                expected: self.columns.len(),
                actual: row.len(),
            });
        }

        let mut y = self.intercept;
        for (term, value) in self.columns.iter().zip(row) {
            match (term, value) {
                (ColumnTerm::Numeric { name, coef }, FeatureValue::Number(x)) => {
                    if !x.is_finite() {
                        return Err(PredictorError::NonFinite {
                            row: row_no,
                            column: name.clone(),
                        });
                    }
                    y += coef * x;
                }
                (ColumnTerm::Categorical { levels, .. }, FeatureValue::Category(level)) => {
                    y += levels.get(level).copied().unwrap_or(0.0);
                }
                (ColumnTerm::Numeric { name, .. }, _) => {
                    return Err(PredictorError::TypeMismatch {
                        row: row_no,
                        column: name.clone(),
                        expected: "numeric",
                    });
                }
                (ColumnTerm::Categorical { name, .. }, _) => {
                    return Err(PredictorError::TypeMismatch {
                        row: row_no,
                        column: name.clone(),
                        expected: "categorical",
                    });
                }
            }
        }

        if !y.is_finite() {
            return Err(PredictorError::NonFinite {
                row: row_no,
                column: "prediction".to_string(),
            });
        }
        Ok(y)
    }
}

impl Predictor for LinearPipeline {
    fn name(&self) -> &str {
        &self.name
    }

    fn info(&self) -> ModelInfo {
        ModelInfo {
            name: self.name.clone(),
            kind: "linear_regression",
            variant: self.variant,
            columns: self.columns.iter().map(|c| c.name().to_string()).collect(),
            intercept: self.intercept,
        }
    }

    fn predict_batch(&self, rows: &[Vec<FeatureValue>]) -> Result<Vec<f64>, PredictorError> {
        rows.iter()
            .enumerate()
            .map(|(i, row)| self.score(i, row))
            .collect()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::io::Write;

    pub(crate) const FULL_ARTIFACT: &str = r#"{
        "name": "test-full",
        "variant": "full",
        "intercept": 1.0,
        "columns": [
            { "name": "M/Inns", "kind": "numeric", "coef": 2.0 },
            { "name": "Captain", "kind": "numeric", "coef": 3.0 },
            { "name": "Country", "kind": "categorical", "levels": { "India": 4.0, "England": -2.0 } },
            { "name": "Versus", "kind": "categorical", "levels": { "Australia": -1.0, "Pakistan": 1.5 } },
            { "name": "B/F", "kind": "numeric", "coef": 0.5 },
            { "name": "SENA", "kind": "numeric", "coef": -2.0 },
            { "name": "Month", "kind": "numeric", "coef": 0.0 },
            { "name": "Year", "kind": "numeric", "coef": 0.0 }
        ]
    }"#;

    pub(crate) fn full_pipeline() -> LinearPipeline {
        LinearPipeline::from_json(FULL_ARTIFACT, "test", ModelVariant::Full).unwrap()
    }

    fn e2e_row() -> Vec<FeatureValue> {
        vec![
            FeatureValue::Number(1.0),
            FeatureValue::Number(1.0),
            FeatureValue::Category("India".into()),
            FeatureValue::Category("Australia".into()),
            FeatureValue::Number(60.0),
            FeatureValue::Number(0.0),
            FeatureValue::Number(1.0),
            FeatureValue::Number(2023.0),
        ]
    }

    #[test]
    fn predicts_linear_combination() {
        // 1 + 2·1 + 3·1 + 4 − 1 + 0.5·60
        let y = full_pipeline().predict(&e2e_row()).unwrap();
        assert_relative_eq!(y, 39.0, epsilon = 1e-9);
    }

    #[test]
    fn unknown_category_contributes_nothing() {
        let mut row = e2e_row();
        row[2] = FeatureValue::Category("Kenya".into());
        let y = full_pipeline().predict(&row).unwrap();
        assert_relative_eq!(y, 35.0, epsilon = 1e-9);
    }

    #[test]
    fn rejects_wrong_width_and_kind() {
        let model = full_pipeline();
        let short = e2e_row()[..7].to_vec();
        assert_eq!(
            model.predict(&short).unwrap_err(),
            PredictorError::ShapeMismatch {
                row: 1,
                expected: 8,
                actual: 7
            }
        );

        let mut swapped = e2e_row();
        swapped[0] = FeatureValue::Category("1st".into());
        assert!(matches!(
            model.predict(&swapped).unwrap_err(),
            PredictorError::TypeMismatch { expected: "numeric", .. }
        ));

        let mut nan = e2e_row();
        nan[4] = FeatureValue::Number(f64::NAN);
        assert!(matches!(
            model.predict(&nan).unwrap_err(),
            PredictorError::NonFinite { .. }
        ));
    }

    #[test]
    fn failed_call_does_not_affect_later_calls() {
        let model = full_pipeline();
        assert!(model.predict(&[]).is_err());
        assert_relative_eq!(model.predict(&e2e_row()).unwrap(), 39.0, epsilon = 1e-9);
    }

    #[test]
    fn batch_keeps_row_order_and_reports_row() {
        let model = full_pipeline();
        let mut second = e2e_row();
        second[1] = FeatureValue::Number(0.0);
        let out = model.predict_batch(&[e2e_row(), second.clone()]).unwrap();
        assert_relative_eq!(out[0], 39.0, epsilon = 1e-9);
        assert_relative_eq!(out[1], 36.0, epsilon = 1e-9);

        let err = model
            .predict_batch(&[e2e_row(), second[..3].to_vec()])
            .unwrap_err();
        assert!(matches!(err, PredictorError::ShapeMismatch { row: 2, .. }));
    }

    #[test]
    fn artifact_must_match_variant_columns() {
        let err = LinearPipeline::from_json(FULL_ARTIFACT, "test", ModelVariant::PreMatch)
            .unwrap_err();
        assert!(matches!(err, ArtifactError::ColumnContract { .. }));
    }

    #[test]
    fn missing_and_corrupt_artifacts_fail_to_load() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.json");
        assert!(matches!(
            LinearPipeline::load(&missing, ModelVariant::Full),
            Err(ArtifactError::Missing(_))
        ));

        let corrupt = dir.path().join("corrupt.json");
        std::fs::write(&corrupt, "{ not json").unwrap();
        assert!(matches!(
            LinearPipeline::load(&corrupt, ModelVariant::Full),
            Err(ArtifactError::Corrupt { .. })
        ));
    }

    #[test]
    fn loads_valid_artifact_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(FULL_ARTIFACT.as_bytes()).unwrap();
        let model = LinearPipeline::load(file.path(), ModelVariant::Full).unwrap();
        let info = model.info();
        assert_eq!(info.name, "test-full");
        assert_eq!(info.columns.len(), 8);
    }

    #[test]
    fn shipped_artifacts_match_their_variants() {
        let root = Path::new(env!("CARGO_MANIFEST_DIR")).join("models");
        LinearPipeline::load(&root.join("kohli_odi_pipeline.json"), ModelVariant::Full).unwrap();
        LinearPipeline::load(&root.join("kohli_odi_prematch.json"), ModelVariant::PreMatch)
            .unwrap();
    }
}
