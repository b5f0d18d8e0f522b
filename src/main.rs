//! Hypoproteinemia Risk Calculator - Main Entry Point
//!
//! Loads the random forest pipeline once, then serves a terminal form:
//! ten laboratory values in, one probability out.

use anyhow::{Context, Result};
use hypoproteinemia_risk::{
    config::{AppConfig, LoggingConfig},
    form::{Submission, TerminalForm},
    metrics::CalculatorMetrics,
    models::InferenceEngine,
};
use std::io;
use std::time::Instant;
use tracing::{error, info, warn};

fn main() -> Result<()> {
    // Load configuration
    let config = AppConfig::load()?;

    // Initialize logging
    init_tracing(&config.logging)?;
    info!("Starting Hypoproteinemia Risk Calculator");
    info!(model_path = %config.model.path.display(), "Configuration loaded successfully");

    // No prediction can be served without the model
    let engine = InferenceEngine::from_config(&config);
    if let Err(e) = engine.warm_up() {
        error!(error = %e, "Failed to load model");
        return Err(e).context("Cannot start without a scoring model");
    }
    info!(
        features = engine.catalog().feature_count(),
        "Feature catalog initialized"
    );

    let metrics = CalculatorMetrics::new();
    let stdin = io::stdin();
    let mut form = TerminalForm::new(stdin.lock(), io::stdout().lock(), config.form.show_inputs);
    form.print_header()?;

    while let Some(record) = form.read_record(engine.catalog())? {
        let start_time = Instant::now();
        let submission = Submission::from_result(engine.assess(&record))
            .context("Prediction failed")?;

        match &submission {
            Submission::Scored(prediction) => {
                let scoring_time = start_time.elapsed();
                metrics.record_prediction(scoring_time, prediction.probability);
                info!(
                    request_id = %prediction.request_id,
                    probability = prediction.probability,
                    scoring_time_us = scoring_time.as_micros() as u64,
                    "Risk predicted"
                );
            }
            Submission::Rejected(missing) => {
                metrics.record_rejection(missing.missing());
                warn!(missing = ?missing.missing(), "Submission rejected");
            }
        }

        form.render(&submission)?;
    }

    form.print_footer()?;

    info!("Calculator shutting down...");
    metrics.print_summary();

    Ok(())
}

fn init_tracing(logging: &LoggingConfig) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::from_default_env().add_directive(
        format!("hypoproteinemia_risk={}", logging.level)
            .parse()
            .context("Invalid logging.level")?,
    );

    // Logs go to stderr; stdout belongs to the form
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr);

    if logging.is_json() {
        builder.json().init();
    } else {
        builder.init();
    }
    Ok(())
}
