//! Batch prediction over CSV files.
//!
//! The whole batch is validated before any output is produced: header check,
//! then every row encoded, then one predictor call. Output rows are the input
//! rows verbatim plus a `Predicted_Runs` cell.
use anyhow::{Context, Result};
use csv::StringRecord;
use serde::Serialize;
use std::io::{Read, Write};
use std::path::Path;
use tracing::info;

use crate::display::RoundingPolicy;
use crate::error::{BatchError, PredictorError, ServiceError};
use crate::features::schema::PREDICTED_RUNS;
use crate::features::{FeatureEncoder, FeatureValue, ModelVariant, RawRecord};
use crate::predictor::Predictor;

/// File names offered for download.
pub const SAMPLE_FILE_NAME: &str = "sample_kohli_odi_data.csv";
pub const PREDICTIONS_FILE_NAME: &str = "kohli_odi_predictions.csv";

#[derive(Debug, Clone, Serialize)]
pub struct BatchSummary {
    pub rows: usize,
    pub mean_prediction: Option<f64>,
}

/// Encode and predict every row of `input`, writing the annotated CSV to
/// `output` only once all rows have succeeded.
pub fn predict_csv<R: Read, W: Write>(
    input: R,
    output: W,
    encoder: &FeatureEncoder,
    predictor: &dyn Predictor,
    rounding: RoundingPolicy,
) -> Result<BatchSummary, ServiceError> {
    let mut reader = csv::Reader::from_reader(input);
    let headers = reader.headers()?.clone();
    encoder.check_columns(headers.iter())?;

    let rows = reader
        .records()
        .collect::<Result<Vec<StringRecord>, csv::Error>>()?;
    let raws: Vec<RawRecord> = rows.iter().map(|row| to_raw(&headers, row)).collect();

    let encoded = encoder.encode_batch(&raws)?;
    let features = encoded
        .iter()
        .enumerate()
        .map(|(i, rec)| {
            rec.features(encoder.variant())
                .map_err(|source| BatchError { row: i + 1, source })
        })
        .collect::<Result<Vec<Vec<FeatureValue>>, BatchError>>()?;
    let predictions = predictor.predict_batch(&features)?;
    if predictions.len() != rows.len() {
        return Err(PredictorError::OutputLength {
            expected: rows.len(),
            actual: predictions.len(),
        }
        .into());
    }

    let mut writer = csv::Writer::from_writer(output);
    let mut out_headers = headers.clone();
    out_headers.push_field(PREDICTED_RUNS);
    writer.write_record(&out_headers)?;
    for (row, prediction) in rows.iter().zip(&predictions) {
        let mut out = row.clone();
        out.push_field(&rounding.format(*prediction));
        writer.write_record(&out)?;
    }
    writer
        .flush()
        .map_err(|e| ServiceError::Csv(e.to_string()))?;

    let mean_prediction = if predictions.is_empty() {
        None
    } else {
        Some(predictions.iter().sum::<f64>() / predictions.len() as f64)
    };
    info!(
        "Batch prediction with '{}': {} rows",
        predictor.name(),
        predictions.len()
    );
    Ok(BatchSummary {
        rows: predictions.len(),
        mean_prediction,
    })
}

/// Offline batch: read `input`, write `output`. The output file is only
/// created when the whole batch succeeds.
pub fn predict_file(
    input: &Path,
    output: &Path,
    encoder: &FeatureEncoder,
    predictor: &dyn Predictor,
    rounding: RoundingPolicy,
) -> Result<BatchSummary> {
    let file = std::fs::File::open(input)
        .with_context(|| format!("opening batch input {}", input.display()))?;
    let mut buf = Vec::new();
    let summary = predict_csv(file, &mut buf, encoder, predictor, rounding)
        .with_context(|| format!("batch prediction for {}", input.display()))?;
    std::fs::write(output, buf)
        .with_context(|| format!("writing batch output {}", output.display()))?;
    Ok(summary)
}

/// Two example rows restricted to the variant's required columns.
pub fn sample_csv(variant: ModelVariant) -> Result<String, ServiceError> {
    let samples = [
        sample_record("01/15/2023", "1st", "Yes", "India", "Australia", "75", "0"),
        sample_record("07/20/2022", "2nd", "No", "England", "Pakistan", "48", "1"),
    ];
    let columns = variant.required_columns();

    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(columns)?;
    for raw in &samples {
        writer.write_record(columns.iter().map(|c| raw.get(c).unwrap_or("")))?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| ServiceError::Csv(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| ServiceError::Csv(e.to_string()))
}

fn sample_record(
    date: &str,
    innings: &str,
    captain: &str,
    country: &str,
    versus: &str,
    balls_faced: &str,
    sena: &str,
) -> RawRecord {
    RawRecord {
        date: Some(date.into()),
        innings: Some(innings.into()),
        captain: Some(captain.into()),
        country: Some(country.into()),
        versus: Some(versus.into()),
        balls_faced: Some(balls_faced.into()),
        sena: Some(sena.into()),
    }
}

fn to_raw(headers: &StringRecord, row: &StringRecord) -> RawRecord {
    let mut raw = RawRecord::default();
    for (header, value) in headers.iter().zip(row.iter()) {
        raw.set(header, value);
    }
    raw
}
