use serde::{Deserialize, Serialize};

/// Input column headers as they appear in the CSV schema and the form.
pub const DATE: &str = "Date";
pub const INNINGS: &str = "M/Inns";
pub const CAPTAIN: &str = "Captain";
pub const COUNTRY: &str = "Country";
pub const VERSUS: &str = "Versus";
pub const BALLS_FACED: &str = "B/F";
pub const SENA: &str = "SENA";

/// Derived columns appended by the encoder.
pub const MONTH: &str = "Month";
pub const YEAR: &str = "Year";

/// Column appended to batch output.
pub const PREDICTED_RUNS: &str = "Predicted_Runs";

/// Venue countries that count as SENA conditions.
pub const SENA_COUNTRIES: [&str; 5] = [
    "South Africa",
    "England",
    "Wales",
    "New Zealand",
    "Australia",
];

/// Venue allow-list used when strict names are enabled.
pub const VENUE_COUNTRIES: &[&str] = &[
    "Australia",
    "Bangladesh",
    "England",
    "India",
    "Ireland",
    "Netherlands",
    "New Zealand",
    "Pakistan",
    "Scotland",
    "South Africa",
    "Sri Lanka",
    "U.A.E.",
    "Wales",
    "West Indies",
    "Zimbabwe",
];

/// Opponent allow-list used when strict names are enabled.
pub const OPPONENTS: &[&str] = &[
    "Afghanistan",
    "Australia",
    "Bangladesh",
    "Bermuda",
    "England",
    "Ireland",
    "Netherlands",
    "New Zealand",
    "Pakistan",
    "Scotland",
    "South Africa",
    "Sri Lanka",
    "U.A.E.",
    "West Indies",
    "Zimbabwe",
];

/// The column contract of a fitted model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum ModelVariant {
    /// Post-innings model: balls faced and the no-result innings are inputs.
    Full,
    /// Pre-match model: no balls faced, innings restricted to 1st/2nd.
    PreMatch,
}

impl ModelVariant {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelVariant::Full => "full",
            ModelVariant::PreMatch => "pre-match",
        }
    }

    /// Columns an input must carry, in declared order.
    pub fn required_columns(&self) -> &'static [&'static str] {
        match self {
            ModelVariant::Full => &[DATE, INNINGS, CAPTAIN, COUNTRY, VERSUS, BALLS_FACED, SENA],
            ModelVariant::PreMatch => &[DATE, INNINGS, CAPTAIN, COUNTRY, VERSUS],
        }
    }

    /// Columns handed to the predictor, in the order the model was fit on.
    pub fn encoded_columns(&self) -> &'static [&'static str] {
        match self {
            ModelVariant::Full => &[INNINGS, CAPTAIN, COUNTRY, VERSUS, BALLS_FACED, SENA, MONTH, YEAR],
            ModelVariant::PreMatch => &[INNINGS, CAPTAIN, COUNTRY, VERSUS, SENA, MONTH, YEAR],
        }
    }

    /// Whether the "N/A - No Result" innings value is part of the domain.
    pub fn allows_no_result(&self) -> bool {
        matches!(self, ModelVariant::Full)
    }

    pub fn uses_balls_faced(&self) -> bool {
        matches!(self, ModelVariant::Full)
    }
}

impl std::fmt::Display for ModelVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
