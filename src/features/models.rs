use serde::{Deserialize, Serialize};

use super::schema::{self, ModelVariant};
use crate::error::{EncodingError, EncodingFailure};

/// One match-context observation as entered in the form or read from a CSV
/// row. Every field is raw text; typing happens in the encoder.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRecord {
    pub date: Option<String>,
    pub innings: Option<String>,
    pub captain: Option<String>,
    pub country: Option<String>,
    pub versus: Option<String>,
    pub balls_faced: Option<String>,
    pub sena: Option<String>,
}

impl RawRecord {
    /// Raw value for an input column header, if the header is known.
    pub fn get(&self, column: &str) -> Option<&str> {
        let value = match column {
            schema::DATE => &self.date,
            schema::INNINGS => &self.innings,
            schema::CAPTAIN => &self.captain,
            schema::COUNTRY => &self.country,
            schema::VERSUS => &self.versus,
            schema::BALLS_FACED => &self.balls_faced,
            schema::SENA => &self.sena,
            _ => return None,
        };
        value.as_deref()
    }

    /// Set the field behind an input column header. Unknown headers are ignored.
    pub fn set(&mut self, column: &str, value: &str) {
        let slot = match column {
            schema::DATE => &mut self.date,
            schema::INNINGS => &mut self.innings,
            schema::CAPTAIN => &mut self.captain,
            schema::COUNTRY => &mut self.country,
            schema::VERSUS => &mut self.versus,
            schema::BALLS_FACED => &mut self.balls_faced,
            schema::SENA => &mut self.sena,
            _ => return,
        };
        *slot = Some(value.to_string());
    }
}

/// Batting innings of the match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Innings {
    First,
    Second,
    NoResult,
}

impl Innings {
    pub fn code(&self) -> u8 {
        match self {
            Innings::First => 1,
            Innings::Second => 2,
            Innings::NoResult => 0,
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "1st" => Some(Innings::First),
            "2nd" => Some(Innings::Second),
            "N/A - No Result" => Some(Innings::NoResult),
            _ => None,
        }
    }
}

/// Whether the batter captained the side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Captain {
    Yes,
    No,
}

impl Captain {
    pub fn code(&self) -> u8 {
        match self {
            Captain::Yes => 1,
            Captain::No => 0,
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "Yes" => Some(Captain::Yes),
            "No" => Some(Captain::No),
            _ => None,
        }
    }
}

/// Post-transform record consumed by the predictor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodedRecord {
    #[serde(rename = "Month")]
    pub month: u32,
    #[serde(rename = "Year")]
    pub year: i32,
    #[serde(rename = "M/Inns")]
    pub innings: u8,
    #[serde(rename = "Captain")]
    pub captain: u8,
    #[serde(rename = "Country")]
    pub country: String,
    #[serde(rename = "Versus")]
    pub versus: String,
    #[serde(rename = "B/F", skip_serializing_if = "Option::is_none", default)]
    pub balls_faced: Option<u32>,
    #[serde(rename = "SENA")]
    pub sena: u8,
}

/// A single model input cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeatureValue {
    Number(f64),
    Category(String),
}

impl EncodedRecord {
    /// Feature vector in the variant's encoded column order.
    ///
    /// Fails with a `missing` error when the variant needs `B/F` and the
    /// record carries none.
    pub fn features(&self, variant: ModelVariant) -> Result<Vec<FeatureValue>, EncodingError> {
        variant
            .encoded_columns()
            .iter()
            .map(|column| self.feature(*column))
            .collect()
    }

    fn feature(&self, column: &'static str) -> Result<FeatureValue, EncodingError> {
        let value = match column {
            schema::INNINGS => FeatureValue::Number(self.innings as f64),
            schema::CAPTAIN => FeatureValue::Number(self.captain as f64),
            schema::COUNTRY => FeatureValue::Category(self.country.clone()),
            schema::VERSUS => FeatureValue::Category(self.versus.clone()),
            schema::BALLS_FACED => match self.balls_faced {
                Some(balls) => FeatureValue::Number(balls as f64),
                None => return Err(EncodingError::missing(schema::BALLS_FACED)),
            },
            schema::SENA => FeatureValue::Number(self.sena as f64),
            schema::MONTH => FeatureValue::Number(self.month as f64),
            schema::YEAR => FeatureValue::Number(self.year as f64),
            other => {
                return Err(EncodingError {
                    field: other,
                    reason: EncodingFailure::Domain,
                    value: None,
                })
            }
        };
        Ok(value)
    }
}
