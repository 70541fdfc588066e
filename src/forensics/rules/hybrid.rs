//! Hybrid sections whose classic table and `/XRefStm` disagree

use crate::forensics::anomaly::{Anomaly, AnomalyKind, Severity};
use crate::forensics::detector::AnomalyRule;
use crate::structure::graph::DocumentGraph;
use crate::types::ObjectId;

pub struct HybridXrefConflictRule;

impl AnomalyRule for HybridXrefConflictRule {
    fn name(&self) -> &'static str {
        "hybrid-xref-conflict"
    }

    fn kinds(&self) -> &'static [AnomalyKind] {
        &[AnomalyKind::HybridXrefConflict]
    }

    fn evaluate(&self, graph: &DocumentGraph) -> Vec<Anomaly> {
        graph
            .revisions
            .iter()
            .filter(|revision| !revision.hybrid_conflicts.is_empty())
            .map(|revision| {
                let ids = revision
                    .hybrid_conflicts
                    .iter()
                    .map(|number| ObjectId::new(*number, revision.entry(*number).map_or(0, |e| e.generation())));
                Anomaly::new(
                    AnomalyKind::HybridXrefConflict,
                    Severity::High,
                    format!(
                        "xref section at {} and its /XRefStm give different locations for {} object(s)",
                        revision.xref_offset,
                        revision.hybrid_conflicts.len()
                    ),
                )
                .with_revision(revision.index)
                .with_objects(ids)
                .with_confidence(0.8)
            })
            .collect()
    }
}
