use serde::Serialize;

/// How predictions are presented to users. Owned by callers so the single
/// and batch paths round identically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum RoundingPolicy {
    /// Round half away from zero to one decimal place.
    OneDecimal,
    /// Drop the fractional part.
    Truncate,
}

impl RoundingPolicy {
    pub fn apply(&self, value: f64) -> f64 {
        let rounded = match self {
            RoundingPolicy::OneDecimal => (value * 10.0).round() / 10.0,
            RoundingPolicy::Truncate => value.trunc(),
        };
        // Adding +0.0 turns a negative zero into a positive one
        rounded + 0.0
    }

    /// Text form used in CSV output.
    pub fn format(&self, value: f64) -> String {
        match self {
            RoundingPolicy::OneDecimal => format!("{:.1}", self.apply(value)),
            RoundingPolicy::Truncate => format!("{}", self.apply(value) as i64),
        }
    }
}
