//! Objects an incremental update cut loose while leaving their entry in use

use crate::forensics::anomaly::{Anomaly, AnomalyKind, Severity};
use crate::forensics::detector::AnomalyRule;
use crate::structure::graph::DocumentGraph;

pub struct IncrementalConcealmentRule;

impl AnomalyRule for IncrementalConcealmentRule {
    fn name(&self) -> &'static str {
        "incremental-concealment"
    }

    fn kinds(&self) -> &'static [AnomalyKind] {
        &[AnomalyKind::IncrementalConcealment]
    }

    fn evaluate(&self, graph: &DocumentGraph) -> Vec<Anomaly> {
        let Some(last) = graph.final_view() else {
            return Vec::new();
        };
        let last_reachable = graph.last_reachable_before(last.revision);

        graph
            .in_use(last)
            .filter(|(id, _)| !last.is_reachable(*id) && !graph.structural.contains(id))
            .filter_map(|(id, _)| {
                // Revision right after the last one that could still reach it
                let reachable_in = *last_reachable.get(&id)?;
                let hidden_at = reachable_in + 1;
                Some(
                    Anomaly::new(
                        AnomalyKind::IncrementalConcealment,
                        Severity::High,
                        format!(
                            "{} was reachable in revision {} and unreachable from revision {} on, \
                             while the xref still lists it in use",
                            id, reachable_in, hidden_at
                        ),
                    )
                    .with_revision(hidden_at)
                    .with_object(id)
                    .with_confidence(0.85),
                )
            })
            .collect()
    }
}
