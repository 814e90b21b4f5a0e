//! License detection of one file, bounded by a hard timeout.

use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};

use crate::license_detection::expression::combine_expressions;
use crate::license_detection::{
    DetectOptions, DetectionRecord, LicenseDetectionEngine, MatchRecord, MatchedTextCache,
};

/// How files are scanned for licenses.
#[derive(Debug, Clone)]
pub struct LicenseScanConfig {
    pub engine: LicenseDetectionEngine,
    /// Store the matched text of every match.
    pub include_text: bool,
    pub min_score: f64,
    pub unknown_licenses: bool,
    /// Wall-clock limit for one file.
    pub timeout: Duration,
}

/// Detections and clues of one text.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct LicenseFindings {
    pub detections: Vec<DetectionRecord>,
    pub clues: Vec<MatchRecord>,
}

impl LicenseScanConfig {
    pub fn new(engine: LicenseDetectionEngine) -> Self {
        Self {
            engine,
            include_text: false,
            min_score: 0.0,
            unknown_licenses: false,
            timeout: Duration::from_secs(120),
        }
    }

    /// Detect licenses in `text` on a worker thread.
    ///
    /// Gives up after `timeout`; the worker is then left to finish on its own
    /// and its result is dropped. The approximate matcher stops on its own at
    /// half the timeout.
    pub fn detect(&self, text: String, package_license: bool) -> Result<LicenseFindings> {
        let options = DetectOptions {
            package_license,
            min_score: self.min_score,
            deadline: Some(Instant::now() + self.timeout / 2),
            unknown_licenses: self.unknown_licenses,
        };
        let engine = self.engine.clone();
        let include_text = self.include_text;
        let (sender, receiver) = mpsc::channel();

        thread::Builder::new()
            .name("license-detection".to_string())
            .spawn(move || {
                // The receiver is gone if the caller timed out.
                let _ = sender.send(detect_records(&engine, &text, &options, include_text));
            })
            .context("Failed to start license detection")?;

        match receiver.recv_timeout(self.timeout) {
            Ok(findings) => findings,
            Err(RecvTimeoutError::Timeout) => {
                bail!("license detection timed out after {}s", self.timeout.as_secs())
            }
            Err(RecvTimeoutError::Disconnected) => bail!("license detection failed unexpectedly"),
        }
    }

    /// Combined expression of `detections` and its SPDX rendering.
    pub fn detected_expression(&self, detections: &[DetectionRecord]) -> Result<(Option<String>, Option<String>)> {
        let expressions: Vec<&str> = detections
            .iter()
            .filter_map(|d| d.license_expression.as_deref())
            .collect();
        let combined = combine_expressions(&expressions, true)?;
        let spdx = combined
            .as_deref()
            .and_then(|e| self.engine.index().spdx_expression(e));
        Ok((combined, spdx))
    }
}

fn detect_records(
    engine: &LicenseDetectionEngine,
    text: &str,
    options: &DetectOptions,
    include_text: bool,
) -> Result<LicenseFindings> {
    let query = engine.query(text);
    let detections = engine.detect_licenses(&query, options)?;
    let cache = MatchedTextCache::new(&engine.index().dictionary);

    let mut findings = LicenseFindings::default();
    for detection in &detections {
        let record = DetectionRecord::from_detection(detection, engine.index(), &cache, include_text);
        if record.license_expression.is_some() {
            findings.detections.push(record);
        } else {
            findings.clues.extend(record.matches);
        }
    }
    Ok(findings)
}
