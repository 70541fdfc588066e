//! Object bodies no cross-reference section points at

use crate::forensics::anomaly::{Anomaly, AnomalyKind, Severity};
use crate::forensics::detector::AnomalyRule;
use crate::structure::graph::DocumentGraph;

pub struct UnindexedObjectRule;

impl AnomalyRule for UnindexedObjectRule {
    fn name(&self) -> &'static str {
        "unindexed-object"
    }

    fn kinds(&self) -> &'static [AnomalyKind] {
        &[AnomalyKind::UnindexedObject]
    }

    fn evaluate(&self, graph: &DocumentGraph) -> Vec<Anomaly> {
        // Without a recovered section every body would look unindexed
        if graph.revisions.is_empty() {
            return Vec::new();
        }
        graph
            .unindexed_objects()
            .into_iter()
            .map(|object| {
                Anomaly::new(
                    AnomalyKind::UnindexedObject,
                    Severity::Medium,
                    format!("{} at byte {} is not listed by any xref section", object.id, object.offset),
                )
                .with_object(object.id)
                .with_confidence(0.75)
            })
            .collect()
    }
}
