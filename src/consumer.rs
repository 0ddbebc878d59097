//! JSON-lines reader for incoming feature samples

use crate::types::sample::FeatureSample;
use anyhow::{Context, Result};
use std::io::{BufRead, Lines};
use tracing::info;

/// Reads one [`FeatureSample`] per line. Blank lines are skipped.
pub struct SampleReader<R> {
    lines: Lines<R>,
    source: String,
    line_no: usize,
    done: bool,
}

impl<R: BufRead> SampleReader<R> {
    /// Create a new sample reader
    pub fn new(reader: R, source: &str) -> Self {
        info!(source = %source, "Reading feature samples");
        Self {
            lines: reader.lines(),
            source: source.to_string(),
            line_no: 0,
            done: false,
        }
    }

    /// Name of the input, for diagnostics
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Number of lines consumed so far
    pub fn line_no(&self) -> usize {
        self.line_no
    }
}

impl<R: BufRead> Iterator for SampleReader<R> {
    type Item = Result<FeatureSample>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        loop {
            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(e) => {
                    // A broken stream won't recover; report once and stop
                    self.done = true;
                    return Some(
                        Err(e).with_context(|| format!("Failed to read from {}", self.source)),
                    );
                }
            };
            self.line_no += 1;

            if line.trim().is_empty() {
                continue;
            }

            return Some(
                serde_json::from_str::<FeatureSample>(&line)
                    .with_context(|| format!("{}:{}: invalid sample", self.source, self.line_no)),
            );
        }
    }
}
