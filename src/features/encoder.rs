use chrono::{Datelike, NaiveDate};
use std::collections::HashSet;
use tracing::debug;

use super::models::{Captain, EncodedRecord, Innings, RawRecord};
use super::schema::{self, ModelVariant};
use crate::error::{BatchError, EncodingError, SchemaError};

/// Accepted textual date layouts: the CSV/form `MM/DD/YYYY` and the ISO form
/// an HTML date input submits.
const DATE_FORMATS: [&str; 2] = ["%m/%d/%Y", "%Y-%m-%d"];

/// SENA flag for a venue country. The single source of truth for both the
/// single-record and the batch path.
pub fn sena(country: &str) -> u8 {
    u8::from(schema::SENA_COUNTRIES.contains(&country.trim()))
}

/// Parse a match date, failing explicitly instead of guessing.
pub fn parse_date(value: &str) -> Result<NaiveDate, EncodingError> {
    let value = value.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(value, fmt).ok())
        .ok_or_else(|| EncodingError::unparseable(schema::DATE, value))
}

/// Maps raw records to the column contract of one model variant.
///
/// The encoder is pure: it reads borrowed records and returns new values, so
/// callers can reuse their input after encoding.
#[derive(Debug, Clone, Copy)]
pub struct FeatureEncoder {
    variant: ModelVariant,
    strict_names: bool,
}

impl FeatureEncoder {
    pub fn new(variant: ModelVariant, strict_names: bool) -> Self {
        Self {
            variant,
            strict_names,
        }
    }

    pub fn variant(&self) -> ModelVariant {
        self.variant
    }

    pub fn strict_names(&self) -> bool {
        self.strict_names
    }

    /// Verify a header row carries every required column exactly once.
    /// Extra columns are allowed and ignored.
    pub fn check_columns<'a, I>(&self, headers: I) -> Result<(), SchemaError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut seen = HashSet::new();
        let mut duplicated = Vec::new();
        for header in headers {
            if !seen.insert(header) && !duplicated.iter().any(|d: &String| d == header) {
                duplicated.push(header.to_string());
            }
        }
        let missing: Vec<String> = self
            .variant
            .required_columns()
            .iter()
            .filter(|column| !seen.contains(**column))
            .map(|column| column.to_string())
            .collect();
        // Only duplicates of required columns are ambiguous for the encoder.
        duplicated.retain(|d| self.variant.required_columns().contains(&d.as_str()));

        if missing.is_empty() && duplicated.is_empty() {
            Ok(())
        } else {
            Err(SchemaError {
                missing,
                duplicated,
            })
        }
    }

    /// Encode one record.
    pub fn encode(&self, raw: &RawRecord) -> Result<EncodedRecord, EncodingError> {
        let date = parse_date(self.required(raw, schema::DATE)?)?;

        let innings_raw = self.required(raw, schema::INNINGS)?;
        let innings = Innings::from_label(innings_raw)
            .filter(|i| *i != Innings::NoResult || self.variant.allows_no_result())
            .ok_or_else(|| EncodingError::domain(schema::INNINGS, innings_raw))?;

        let captain_raw = self.required(raw, schema::CAPTAIN)?;
        let captain = Captain::from_label(captain_raw)
            .ok_or_else(|| EncodingError::domain(schema::CAPTAIN, captain_raw))?;

        let country = self.name(raw, schema::COUNTRY, schema::VENUE_COUNTRIES)?;
        let versus = self.name(raw, schema::VERSUS, schema::OPPONENTS)?;

        let balls_faced = if self.variant.uses_balls_faced() {
            Some(parse_balls_faced(self.required(raw, schema::BALLS_FACED)?)?)
        } else {
            None
        };

        // SENA is always derived; a supplied value only has to agree with it.
        let derived = sena(country);
        if let Some(value) = present(raw, schema::SENA) {
            if parse_sena_flag(value)? != derived {
                return Err(EncodingError::inconsistent(schema::SENA, value));
            }
        }

        Ok(EncodedRecord {
            month: date.month(),
            year: date.year(),
            innings: innings.code(),
            captain: captain.code(),
            country: country.to_string(),
            versus: versus.to_string(),
            balls_faced,
            sena: derived,
        })
    }

    /// Encode an ordered batch. The first failing row rejects the batch.
    pub fn encode_batch(&self, raws: &[RawRecord]) -> Result<Vec<EncodedRecord>, BatchError> {
        let encoded = raws
            .iter()
            .enumerate()
            .map(|(i, raw)| {
                self.encode(raw)
                    .map_err(|source| BatchError { row: i + 1, source })
            })
            .collect::<Result<Vec<_>, _>>()?;
        debug!("Encoded {} rows for the {} variant", encoded.len(), self.variant);
        Ok(encoded)
    }

    fn required<'a>(&self, raw: &'a RawRecord, column: &'static str) -> Result<&'a str, EncodingError> {
        present(raw, column).ok_or_else(|| EncodingError::missing(column))
    }

    fn name<'a>(
        &self,
        raw: &'a RawRecord,
        column: &'static str,
        allowed: &[&str],
    ) -> Result<&'a str, EncodingError> {
        let value = self.required(raw, column)?;
        if self.strict_names && !allowed.iter().any(|name| *name == value) {
            return Err(EncodingError::domain(column, value));
        }
        Ok(value)
    }
}

/// Trimmed, non-empty raw value.
fn present<'a>(raw: &'a RawRecord, column: &str) -> Option<&'a str> {
    raw.get(column).map(str::trim).filter(|v| !v.is_empty())
}

fn parse_balls_faced(value: &str) -> Result<u32, EncodingError> {
    // Integral floats ("60.0") show up when a spreadsheet round-trips the column.
    let number = match value.parse::<i64>() {
        Ok(n) => n,
        Err(_) => match value.parse::<f64>() {
            Ok(f) if f.is_finite() && f.fract() == 0.0 => f as i64,
            _ => return Err(EncodingError::unparseable(schema::BALLS_FACED, value)),
        },
    };
    u32::try_from(number).map_err(|_| EncodingError::domain(schema::BALLS_FACED, value))
}

fn parse_sena_flag(value: &str) -> Result<u8, EncodingError> {
    match value {
        "1" | "Yes" => Ok(1),
        "0" | "No" => Ok(0),
        other => Err(EncodingError::domain(schema::SENA, other)),
    }
}
