use anyhow::{Context, Result};
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info};

mod batch;
mod config;
mod display;
mod error;
mod features;
mod predictor;
mod web;

use config::Config;
use features::FeatureEncoder;
use predictor::{LinearPipeline, Predictor};
use web::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialise tracing / logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = Config::parse();
    config.validate()?;

    // A missing or mismatched model is fatal: never serve without one.
    let model = match LinearPipeline::load(&config.model_path, config.variant) {
        Ok(model) => model,
        Err(err) => {
            error!("❌ Refusing to start: {}", err);
            return Err(err.into());
        }
    };
    let predictor: Arc<dyn Predictor> = Arc::new(model);
    let encoder = FeatureEncoder::new(config.variant, config.strict_names);

    if let (Some(input), Some(output)) = (&config.batch_input, &config.batch_output) {
        let summary =
            batch::predict_file(input, output, &encoder, predictor.as_ref(), config.rounding)?;
        info!(
            "Scored {} rows from {} into {} (mean prediction: {})",
            summary.rows,
            input.display(),
            output.display(),
            summary
                .mean_prediction
                .map(|m| format!("{:.1}", m))
                .unwrap_or_else(|| "n/a".to_string())
        );
        return Ok(());
    }

    let state = AppState {
        predictor,
        encoder,
        rounding: config.rounding,
    };
    let app = web::router(state, config.max_upload_bytes);
    let addr: SocketAddr = config.listen_addr.parse()?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {}", addr))?;
    info!(
        "🏏 ODI runs predictor ({} variant) listening on http://{}",
        config.variant, addr
    );

    axum::serve(listener, app).await?;

    Ok(())
}
