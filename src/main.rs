//! Spinal Posture Classifier - Main Entry Point
//!
//! Reads feature samples as JSON lines from stdin, classifies them with the
//! configured ANFIS model and writes one report per line to stdout.
//!
//! Usage: `spine-anfis [config.toml]`

use anyhow::Result;
use spine_anfis::{
    config::{AppConfig, LoggingConfig, DEFAULT_CONFIG_PATH},
    consumer::SampleReader,
    metrics::ClassificationMetrics,
    models::inference::InferenceEngine,
    producer::ReportWriter,
    types::report::ClassificationReport,
};
use std::io::{self, BufWriter};
use std::time::Instant;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());

    let config = AppConfig::load_from_path(&config_path)?;
    init_logging(&config.logging)?;

    info!(config = %config_path, "Starting Spinal Posture Classifier");

    let engine = InferenceEngine::new(&config)?;
    let model = engine
        .handle()
        .snapshot()
        .ok_or_else(|| anyhow::anyhow!("No model active after startup"))?;
    info!(
        classes = ?model.classes().iter().collect::<Vec<_>>(),
        features = ?model.feature_names(),
        rules = model.num_rules(),
        "Model ready"
    );

    let metrics = ClassificationMetrics::new();
    let reader = SampleReader::new(io::stdin().lock(), "stdin");
    let mut writer = ReportWriter::new(BufWriter::new(io::stdout().lock()));

    for sample in reader {
        let sample = match sample {
            Ok(sample) => sample,
            Err(e) => {
                warn!(error = %e, "Skipping unreadable sample");
                metrics.record_rejected();
                continue;
            }
        };

        let start_time = Instant::now();

        // Labels come from the same snapshot that scored the sample
        let (model, prediction) = match engine.predict_with_model(&sample.features) {
            Ok(result) => result,
            Err(e) => {
                error!(sample_id = %sample.sample_id, error = %e, "Inference failed");
                metrics.record_rejected();
                continue;
            }
        };

        let report = ClassificationReport::new(
            sample.sample_id,
            &prediction,
            model.classes(),
            &config.classification.confidence_levels,
        )
        .with_top_k(config.classification.top_k);

        let processing_time = start_time.elapsed();
        metrics.record_prediction(&prediction, &report.label, processing_time);

        if report.nan_poisoned {
            warn!(sample_id = %report.sample_id, "Sample has missing features, scores are NaN");
        } else {
            debug!(
                sample_id = %report.sample_id,
                label = %report.label,
                confidence = report.confidence,
                processing_time_us = processing_time.as_micros(),
                "Sample classified"
            );
        }

        writer.publish(&report)?;
    }

    writer.flush()?;
    info!(reports = writer.written(), "Input exhausted, shutting down");
    metrics.print_summary();

    Ok(())
}

/// Install the tracing subscriber. Logs go to stderr; stdout carries reports.
fn init_logging(logging: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::from_default_env()
        .add_directive(format!("spine_anfis={}", logging.level).parse()?);

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr);

    if logging.format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }

    Ok(())
}
