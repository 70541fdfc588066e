//! `%%EOF` markers and data appended after the last one

use crate::forensics::anomaly::{Anomaly, AnomalyKind, Severity};
use crate::forensics::detector::AnomalyRule;
use crate::structure::graph::DocumentGraph;

pub struct EofMarkerRule {
    trailing_threshold: usize,
}

impl EofMarkerRule {
    pub fn new(trailing_threshold: usize) -> Self {
        Self { trailing_threshold }
    }
}

impl AnomalyRule for EofMarkerRule {
    fn name(&self) -> &'static str {
        "eof-marker"
    }

    fn kinds(&self) -> &'static [AnomalyKind] {
        &[AnomalyKind::EofMarkerMismatch, AnomalyKind::TrailingData]
    }

    fn evaluate(&self, graph: &DocumentGraph) -> Vec<Anomaly> {
        let mut found = Vec::new();
        let facts = &graph.facts;
        let revisions = graph.revision_count();

        if revisions > 0 && facts.eof_markers != revisions {
            found.push(
                Anomaly::new(
                    AnomalyKind::EofMarkerMismatch,
                    Severity::Low,
                    format!("{} %%EOF marker(s) for {} xref section(s)", facts.eof_markers, revisions),
                )
                .with_confidence(0.5),
            );
        }
        if facts.trailing_bytes > self.trailing_threshold {
            found.push(
                Anomaly::new(
                    AnomalyKind::TrailingData,
                    Severity::Medium,
                    format!("{} non-whitespace bytes follow the last %%EOF", facts.trailing_bytes),
                )
                .with_confidence(0.8),
            );
        }
        found
    }
}
