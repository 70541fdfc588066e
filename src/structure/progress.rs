//! Analysis stages, used to tag recovered problems

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AnalysisStage {
    Setup,
    Scanning,
    CrossReference,
    Objects,
    Streams,
    References,
    Detection,
}

impl fmt::Display for AnalysisStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnalysisStage::Setup => write!(f, "Setup"),
            AnalysisStage::Scanning => write!(f, "Byte Scanning"),
            AnalysisStage::CrossReference => write!(f, "Cross-Reference Reconstruction"),
            AnalysisStage::Objects => write!(f, "Object Analysis"),
            AnalysisStage::Streams => write!(f, "Stream Analysis"),
            AnalysisStage::References => write!(f, "Reference Validation"),
            AnalysisStage::Detection => write!(f, "Anomaly Detection"),
        }
    }
}

/// A problem recovered from without producing an anomaly
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisWarning {
    pub stage: AnalysisStage,
    pub message: String,
}

impl AnalysisWarning {
    pub fn new(stage: AnalysisStage, message: impl Into<String>) -> Self {
        Self {
            stage,
            message: message.into(),
        }
    }
}

impl fmt::Display for AnalysisWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.stage, self.message)
    }
}
