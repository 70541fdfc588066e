//! Anomaly records produced by the detection rules
//! Author: kartik4091

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::ObjectId;

/// Every kind of finding the detector can report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AnomalyKind {
    OrphanedObject,
    IncrementalConcealment,
    StreamLengthMismatch,
    FreeListInconsistency,
    XrefChainBroken,
    XrefChainTruncated,
    GenerationRegression,
    MetadataInconsistency,
    TruncatedInput,
    MalformedToken,
    UnresolvableReference,
    UnsupportedEncryption,
    UnindexedObject,
    HybridXrefConflict,
    EofMarkerMismatch,
    TrailingData,
}

impl AnomalyKind {
    pub const ALL: [AnomalyKind; 16] = [
        AnomalyKind::OrphanedObject,
        AnomalyKind::IncrementalConcealment,
        AnomalyKind::StreamLengthMismatch,
        AnomalyKind::FreeListInconsistency,
        AnomalyKind::XrefChainBroken,
        AnomalyKind::XrefChainTruncated,
        AnomalyKind::GenerationRegression,
        AnomalyKind::MetadataInconsistency,
        AnomalyKind::TruncatedInput,
        AnomalyKind::MalformedToken,
        AnomalyKind::UnresolvableReference,
        AnomalyKind::UnsupportedEncryption,
        AnomalyKind::UnindexedObject,
        AnomalyKind::HybridXrefConflict,
        AnomalyKind::EofMarkerMismatch,
        AnomalyKind::TrailingData,
    ];

    /// Kinds that describe damage or a limitation of the analysis rather than
    /// evidence of deliberate editing
    pub fn is_integrity_issue(&self) -> bool {
        matches!(
            self,
            AnomalyKind::TruncatedInput | AnomalyKind::MalformedToken | AnomalyKind::UnsupportedEncryption
        )
    }
}

impl fmt::Display for AnomalyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    Info,
    Low,
    Medium,
    High,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Severity::Info => "info",
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        };
        f.write_str(label)
    }
}

/// One finding. Built by a rule and never changed afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Anomaly {
    pub kind: AnomalyKind,
    /// Revision the finding is attributed to; `None` for document-wide
    /// findings
    pub revision: Option<usize>,
    pub objects: Vec<ObjectId>,
    pub severity: Severity,
    /// Between 0.0 and 1.0
    pub confidence: f64,
    pub rationale: String,
}

impl Anomaly {
    pub fn new(kind: AnomalyKind, severity: Severity, rationale: impl Into<String>) -> Self {
        Self {
            kind,
            revision: None,
            objects: Vec::new(),
            severity,
            confidence: 1.0,
            rationale: rationale.into(),
        }
    }

    pub fn with_revision(mut self, revision: usize) -> Self {
        self.revision = Some(revision);
        self
    }

    pub fn with_object(mut self, id: ObjectId) -> Self {
        self.objects.push(id);
        self.objects.sort();
        self.objects.dedup();
        self
    }

    pub fn with_objects(mut self, ids: impl IntoIterator<Item = ObjectId>) -> Self {
        self.objects.extend(ids);
        self.objects.sort();
        self.objects.dedup();
        self
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = if confidence.is_nan() { 0.0 } else { confidence.clamp(0.0, 1.0) };
        self
    }

    /// Report order: revision (`None` first), objects, kind, severity,
    /// rationale
    pub fn report_order(&self, other: &Self) -> Ordering {
        self.revision
            .cmp(&other.revision)
            .then_with(|| self.objects.cmp(&other.objects))
            .then_with(|| self.kind.cmp(&other.kind))
            .then_with(|| self.severity.cmp(&other.severity))
            .then_with(|| self.rationale.cmp(&other.rationale))
            .then_with(|| self.confidence.total_cmp(&other.confidence))
    }
}

pub fn sort_anomalies(anomalies: &mut [Anomaly]) {
    anomalies.sort_by(Anomaly::report_order);
}
