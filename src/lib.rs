//! PDF structure forensics library
//!
//! Reads a PDF buffer at the byte level, rebuilds every incremental revision
//! into a document graph and runs a registry of detection rules over it.
//!
//! ```no_run
//! use pdx_forensics::{AnalysisConfig, Decryption, PdfAnalyzer};
//!
//! let bytes = std::fs::read("document.pdf")?;
//! let analyzer = PdfAnalyzer::new(AnalysisConfig::default())?;
//! analyzer.logger().init();
//! let report = analyzer.analyze(&bytes, Decryption::NotRequired)?;
//! for anomaly in &report.anomalies {
//!     println!("{} {:?} {}", anomaly.severity, anomaly.kind, anomaly.rationale);
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

// Configuration and core types
pub mod config;
pub mod error;
pub mod hash_utils;
pub mod types;

// Stage 1: Byte scanning
pub mod scanner;

// Stage 2: Structure reconstruction
pub mod structure;

// Stage 3: Anomaly detection
pub mod forensics;

// Stage 4: Report model
pub mod report;

// Pipeline entry point
pub mod analyzer;

// Shared utilities
pub mod utils;

pub use analyzer::{PdfAnalyzer, PdfAnalyzerStats};
pub use config::AnalysisConfig;
pub use error::{Error, ParseError, Result, StructureError};
pub use forensics::{Anomaly, AnomalyDetector, AnomalyKind, AnomalyRule, Severity};
pub use report::{AnalysisReport, GraphSummary};
pub use scanner::ByteScanner;
pub use structure::{
    AnalysisStage, AnalysisWarning, Decryption, DocumentGraph, StreamDecryptor, StructureHandler,
};
pub use types::{Dictionary, ObjectId, ObjectValue, Stream};
pub use utils::logger::Logger;
