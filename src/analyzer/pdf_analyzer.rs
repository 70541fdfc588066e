//! PDF Analyzer Implementation
//! Author: kartik4091
//!
//! Runs one document through the whole engine: structure graph, rule
//! registry, report.

use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::config::AnalysisConfig;
use crate::error::Result;
use crate::forensics::detector::{AnomalyDetector, DetectionStats};
use crate::report::{AnalysisReport, GraphSummary};
use crate::structure::decryption::Decryption;
use crate::structure::progress::{AnalysisStage, AnalysisWarning};
use crate::structure::structure_handler::StructureHandler;
use crate::utils::logger::Logger;

/// Timing and counters for a single run
#[derive(Debug, Clone, Default, Serialize)]
pub struct PdfAnalyzerStats {
    pub bytes_analyzed: usize,
    pub structure_time: Duration,
    pub detection: DetectionStats,
    pub total_time: Duration,
}

pub struct PdfAnalyzer {
    config: AnalysisConfig,
    structure: StructureHandler,
    detector: AnomalyDetector,
}

impl PdfAnalyzer {
    /// Creates an analyzer with every built-in rule; fails on an invalid
    /// configuration
    pub fn new(config: AnalysisConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            structure: StructureHandler::new(config.clone()),
            detector: AnomalyDetector::from_config(&config),
            config,
        })
    }

    /// Replaces the rule registry
    pub fn with_detector(mut self, detector: AnomalyDetector) -> Self {
        self.detector = detector;
        self
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn detector(&self) -> &AnomalyDetector {
        &self.detector
    }

    /// Logger for the embedding application, filtered at the configured
    /// `log_level`. Nothing is installed until `Logger::init` is called.
    pub fn logger(&self) -> Logger {
        Logger::from_config(&self.config)
    }

    pub fn analyze(&self, bytes: &[u8], decryption: Decryption<'_>) -> Result<AnalysisReport> {
        self.analyze_with_stats(bytes, decryption).map(|(report, _)| report)
    }

    #[instrument(skip_all, fields(len = bytes.len()))]
    pub fn analyze_with_stats(
        &self,
        bytes: &[u8],
        decryption: Decryption<'_>,
    ) -> Result<(AnalysisReport, PdfAnalyzerStats)> {
        let started = Instant::now();
        let (graph, mut warnings) = self.structure.build(bytes, decryption)?;
        let structure_time = started.elapsed();

        let (anomalies, detection) = self.detector.detect_with_stats(&graph);
        if detection.rules_evaluated == 0 {
            warnings.push(AnalysisWarning::new(
                AnalysisStage::Detection,
                "every rule is disabled; no anomalies were looked for",
            ));
        }

        let partial_history = !graph.chain_faults.is_empty();
        if partial_history {
            warn!(
                security = true,
                domain = "pdf.xref",
                faults = graph.chain_faults.len(),
                recovered = graph.revisions.len(),
                "Revision history is incomplete"
            );
        }

        let report = AnalysisReport {
            summary: GraphSummary::from_graph(&graph),
            anomalies,
            warnings,
            partial_history,
        };
        let stats = PdfAnalyzerStats {
            bytes_analyzed: bytes.len(),
            structure_time,
            detection,
            total_time: started.elapsed(),
        };
        info!(
            revisions = report.summary.revision_count,
            anomalies = report.anomalies.len(),
            elapsed_ms = stats.total_time.as_millis() as u64,
            "Analysis complete"
        );
        Ok((report, stats))
    }
}

impl Default for PdfAnalyzer {
    fn default() -> Self {
        let config = AnalysisConfig::default();
        Self {
            structure: StructureHandler::new(config.clone()),
            detector: AnomalyDetector::from_config(&config),
            config,
        }
    }
}
