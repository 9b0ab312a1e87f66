use serde::Serialize;
use thiserror::Error;

/// Why a single field failed to encode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EncodingFailure {
    /// Value could not be parsed into the expected type (date, integer).
    Unparseable,
    /// Value parsed but lies outside the field's declared domain.
    Domain,
    /// Required field absent or empty.
    Missing,
    /// Supplied value disagrees with the value derived from other fields.
    Inconsistent,
}

impl EncodingFailure {
    pub fn as_str(&self) -> &'static str {
        match self {
            EncodingFailure::Unparseable => "unparseable",
            EncodingFailure::Domain => "domain",
            EncodingFailure::Missing => "missing",
            EncodingFailure::Inconsistent => "inconsistent",
        }
    }
}

impl std::fmt::Display for EncodingFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A per-field failure of the feature encoder.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {reason}{}", .value.as_ref().map(|v| format!(" value '{v}'")).unwrap_or_default())]
pub struct EncodingError {
    /// Column header name of the offending field (`Date`, `M/Inns`, ...).
    pub field: &'static str,
    pub reason: EncodingFailure,
    pub value: Option<String>,
}

impl EncodingError {
    pub fn unparseable(field: &'static str, value: &str) -> Self {
        Self {
            field,
            reason: EncodingFailure::Unparseable,
            value: Some(value.to_string()),
        }
    }

    pub fn domain(field: &'static str, value: &str) -> Self {
        Self {
            field,
            reason: EncodingFailure::Domain,
            value: Some(value.to_string()),
        }
    }

    pub fn missing(field: &'static str) -> Self {
        Self {
            field,
            reason: EncodingFailure::Missing,
            value: None,
        }
    }

    pub fn inconsistent(field: &'static str, value: &str) -> Self {
        Self {
            field,
            reason: EncodingFailure::Inconsistent,
            value: Some(value.to_string()),
        }
    }
}

/// Column-level problems detected before any row is encoded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("schema error: missing columns {missing:?}, duplicated columns {duplicated:?}")]
pub struct SchemaError {
    pub missing: Vec<String>,
    pub duplicated: Vec<String>,
}

/// Encoding failure inside a batch, tagged with the 1-based data row.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("row {row}: {source}")]
pub struct BatchError {
    pub row: usize,
    #[source]
    pub source: EncodingError,
}

/// Failures of the underlying regression call.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PredictorError {
    #[error("row {row}: expected {expected} features, got {actual}")]
    ShapeMismatch {
        row: usize,
        expected: usize,
        actual: usize,
    },
    #[error("row {row}: column '{column}' expects a {expected} value")]
    TypeMismatch {
        row: usize,
        column: String,
        expected: &'static str,
    },
    #[error("row {row}: non-finite value in column '{column}'")]
    NonFinite { row: usize, column: String },
    #[error("model returned {actual} predictions for {expected} rows")]
    OutputLength { expected: usize, actual: usize },
}

/// Model artifact could not be loaded. Fatal at startup.
#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("model artifact not found: {0}")]
    Missing(String),
    #[error("model artifact {path} is corrupt: {reason}")]
    Corrupt { path: String, reason: String },
    #[error("model artifact columns {actual:?} do not match the {variant} variant columns {expected:?}")]
    ColumnContract {
        variant: String,
        expected: Vec<String>,
        actual: Vec<String>,
    },
}

/// Everything a single prediction request can fail with.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error("{source}")]
    Encoding {
        row: Option<usize>,
        #[source]
        source: EncodingError,
    },
    #[error("CSV error: {0}")]
    Csv(String),
    #[error("invalid request: {0}")]
    Request(String),
    #[error("prediction failed: {0}")]
    Predictor(#[from] PredictorError),
}

impl From<EncodingError> for ServiceError {
    fn from(source: EncodingError) -> Self {
        ServiceError::Encoding { row: None, source }
    }
}

impl From<BatchError> for ServiceError {
    fn from(err: BatchError) -> Self {
        ServiceError::Encoding {
            row: Some(err.row),
            source: err.source,
        }
    }
}

impl From<csv::Error> for ServiceError {
    fn from(err: csv::Error) -> Self {
        ServiceError::Csv(err.to_string())
    }
}

impl ServiceError {
    /// Short machine-readable category for API error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            ServiceError::Schema(_) => "schema",
            ServiceError::Encoding { .. } => "encoding",
            ServiceError::Csv(_) => "csv",
            ServiceError::Request(_) => "request",
            ServiceError::Predictor(_) => "predictor",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encoding_error_message_names_field_and_value() {
        let err = EncodingError::unparseable("Date", "2023-15-01");
        assert_eq!(err.to_string(), "Date: unparseable value '2023-15-01'");
        assert_eq!(EncodingError::missing("Versus").to_string(), "Versus: missing");
    }

    #[test]
    fn batch_error_keeps_row_through_service_error() {
        let err: ServiceError = BatchError {
            row: 3,
            source: EncodingError::domain("Captain", "Maybe"),
        }
        .into();
        match err {
            ServiceError::Encoding { row, source } => {
                assert_eq!(row, Some(3));
                assert_eq!(source.field, "Captain");
                assert_eq!(source.reason, EncodingFailure::Domain);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
