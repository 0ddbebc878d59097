//! JSON-lines writer for classification reports

use crate::types::report::ClassificationReport;
use anyhow::{Context, Result};
use std::io::Write;
use tracing::{debug, error};

/// Writes one [`ClassificationReport`] per line
pub struct ReportWriter<W: Write> {
    writer: W,
    written: u64,
}

impl<W: Write> ReportWriter<W> {
    /// Create a new report writer
    pub fn new(writer: W) -> Self {
        Self { writer, written: 0 }
    }

    /// Publish a classification report
    pub fn publish(&mut self, report: &ClassificationReport) -> Result<()> {
        serde_json::to_writer(&mut self.writer, report).context("Failed to serialize report")?;
        self.writer
            .write_all(b"\n")
            .context("Failed to write report")?;
        self.written += 1;

        debug!(
            report_id = %report.report_id,
            sample_id = %report.sample_id,
            label = %report.label,
            "Published classification report"
        );

        Ok(())
    }

    /// Publish multiple reports, logging and skipping failures
    pub fn publish_batch(&mut self, reports: &[ClassificationReport]) -> Result<()> {
        for report in reports {
            if let Err(e) = self.publish(report) {
                error!(
                    report_id = %report.report_id,
                    error = %e,
                    "Failed to publish report"
                );
            }
        }
        self.flush()
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush().context("Failed to flush reports")
    }

    /// Reports written so far
    pub fn written(&self) -> u64 {
        self.written
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}
