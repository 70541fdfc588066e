//! Forensics module: anomaly model, rule registry and built-in rules
//! Author: kartik4091
//!
//! Rules are pure functions of the finished [`DocumentGraph`]. They never see
//! each other's output, so their results can be merged in any order and
//! sorted afterwards.
//!
//! [`DocumentGraph`]: crate::structure::DocumentGraph

pub mod anomaly;
pub mod detector;
pub mod rules;

pub use anomaly::{sort_anomalies, Anomaly, AnomalyKind, Severity};
pub use detector::{AnomalyDetector, AnomalyRule, DetectionStats};
pub use rules::default_rules;
