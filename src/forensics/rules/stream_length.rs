//! Streams whose declared `/Length` disagrees with the bytes before `endstream`

use std::collections::BTreeMap;

use crate::forensics::anomaly::{Anomaly, AnomalyKind, Severity};
use crate::forensics::detector::AnomalyRule;
use crate::structure::graph::DocumentGraph;
use crate::types::ObjectValue;

pub struct StreamLengthRule;

impl AnomalyRule for StreamLengthRule {
    fn name(&self) -> &'static str {
        "stream-length"
    }

    fn kinds(&self) -> &'static [AnomalyKind] {
        &[AnomalyKind::StreamLengthMismatch]
    }

    fn evaluate(&self, graph: &DocumentGraph) -> Vec<Anomaly> {
        // Revision that first listed each definition
        let mut introduced: BTreeMap<usize, usize> = BTreeMap::new();
        for history in graph.histories.values() {
            for event in &history.events {
                if let Some(definition) = event.definition {
                    introduced.entry(definition).or_insert(event.revision);
                }
            }
        }

        graph
            .definitions
            .iter()
            .enumerate()
            .filter_map(|(idx, definition)| {
                let Some(ObjectValue::Stream(stream)) = definition.value() else {
                    return None;
                };
                let check = stream.length_check;
                if check.consistent {
                    return None;
                }
                let declared = check.declared.map_or_else(|| "no usable".to_string(), |n| n.to_string());
                let actual = check.actual.map_or_else(|| "an undelimited".to_string(), |n| n.to_string());
                let reachable = graph.final_view().map_or(false, |view| view.is_reachable(definition.id));
                let mut anomaly = Anomaly::new(
                    AnomalyKind::StreamLengthMismatch,
                    if reachable { Severity::Medium } else { Severity::High },
                    format!(
                        "stream {} declares {} /Length but {} bytes precede endstream",
                        definition.id, declared, actual
                    ),
                )
                .with_object(definition.id)
                .with_confidence(0.9);
                if let Some(revision) = introduced.get(&idx) {
                    anomaly = anomaly.with_revision(*revision);
                }
                Some(anomaly)
            })
            .collect()
    }
}
