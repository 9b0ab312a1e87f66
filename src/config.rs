use clap::Parser;
use std::path::PathBuf;

use crate::display::RoundingPolicy;
use crate::features::ModelVariant;

/// ODI runs predictor: web form and CSV batch scoring
#[derive(Parser, Debug, Clone)]
#[command(name = "odi-runs-predictor", version, about)]
pub struct Config {
    /// HTTP listen address
    #[arg(long, env = "LISTEN_ADDR", default_value = "0.0.0.0:8080")]
    pub listen_addr: String,

    /// Path to the fitted model artifact (JSON linear pipeline)
    #[arg(long, env = "MODEL_PATH", default_value = "models/kohli_odi_pipeline.json")]
    pub model_path: PathBuf,

    /// Column contract of the model artifact
    #[arg(long, env = "MODEL_VARIANT", value_enum, default_value = "full")]
    pub variant: ModelVariant,

    /// Restrict Country and Versus to the known venue/opponent lists
    #[arg(long, env = "STRICT_NAMES", default_value = "false")]
    pub strict_names: bool,

    /// How predictions are rounded for display and CSV output
    #[arg(long, env = "ROUNDING", value_enum, default_value = "one-decimal")]
    pub rounding: RoundingPolicy,

    /// Maximum accepted CSV upload size in bytes
    #[arg(long, env = "MAX_UPLOAD_BYTES", default_value = "2097152")]
    pub max_upload_bytes: usize,

    /// Score this CSV file once and exit instead of serving
    #[arg(long, env = "BATCH_INPUT", requires = "batch_output")]
    pub batch_input: Option<PathBuf>,

    /// Where to write the scored CSV when --batch-input is given
    #[arg(long, env = "BATCH_OUTPUT", requires = "batch_input")]
    pub batch_output: Option<PathBuf>,
}

impl Config {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.max_upload_bytes == 0 {
            anyhow::bail!("max_upload_bytes must be positive");
        }
        if self.batch_input.is_some() != self.batch_output.is_some() {
            anyhow::bail!("--batch-input and --batch-output must be given together");
        }
        if let (Some(input), Some(output)) = (&self.batch_input, &self.batch_output) {
            if input == output {
                anyhow::bail!("batch output must not overwrite the batch input");
            }
        }
        if self.batch_input.is_none() {
            self.listen_addr
                .parse::<std::net::SocketAddr>()
                .map_err(|e| anyhow::anyhow!("invalid listen_addr '{}': {}", self.listen_addr, e))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = Config::parse_from(["odi-runs-predictor"]);
        assert_eq!(config.variant, ModelVariant::Full);
        assert_eq!(config.rounding, RoundingPolicy::OneDecimal);
        assert!(!config.strict_names);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn parses_variant_and_rounding() {
        let config = Config::parse_from([
            "odi-runs-predictor",
            "--variant",
            "pre-match",
            "--rounding",
            "truncate",
            "--strict-names",
        ]);
        assert_eq!(config.variant, ModelVariant::PreMatch);
        assert_eq!(config.rounding, RoundingPolicy::Truncate);
        assert!(config.strict_names);
    }

    #[test]
    fn batch_paths_come_in_pairs() {
        let result = Config::try_parse_from(["odi-runs-predictor", "--batch-input", "in.csv"]);
        assert!(result.is_err());

        let config = Config::parse_from([
            "odi-runs-predictor",
            "--batch-input",
            "same.csv",
            "--batch-output",
            "same.csv",
        ]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_bad_listen_addr() {
        let config = Config::parse_from(["odi-runs-predictor", "--listen-addr", "nowhere"]);
        assert!(config.validate().is_err());
    }
}
