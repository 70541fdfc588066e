//! Objects the final revision still lists but its catalog cannot reach

use tracing::warn;

use crate::forensics::anomaly::{Anomaly, AnomalyKind, Severity};
use crate::forensics::detector::AnomalyRule;
use crate::structure::graph::DocumentGraph;
use crate::types::ObjectValue;

pub struct OrphanedObjectRule {
    large_payload: usize,
}

impl OrphanedObjectRule {
    pub fn new(large_payload: usize) -> Self {
        Self { large_payload }
    }

    fn classify(&self, value: Option<&ObjectValue>) -> (Severity, String) {
        match value {
            Some(ObjectValue::Stream(stream)) => {
                let subtype = stream.dict.get_name(b"Subtype");
                let described = match subtype {
                    Some(b"Image") => "image stream",
                    Some(b"Form") => "form XObject stream",
                    _ if stream.dict.has(b"Type") => "typed stream",
                    _ => "stream",
                };
                let severity = if matches!(subtype, Some(b"Image") | Some(b"Form"))
                    || stream.data.len() >= self.large_payload
                {
                    Severity::High
                } else {
                    Severity::Medium
                };
                (severity, format!("{} with {} payload bytes", described, stream.data.len()))
            }
            Some(ObjectValue::Dictionary(dict)) if dict.has(b"JS") => {
                (Severity::High, "dictionary carrying JavaScript".to_string())
            }
            Some(ObjectValue::Dictionary(dict)) => match dict.get_name(b"Type") {
                Some(kind) => (
                    Severity::Medium,
                    format!("/{} dictionary", String::from_utf8_lossy(kind)),
                ),
                None => (Severity::Low, "untyped dictionary".to_string()),
            },
            Some(other) => (Severity::Low, format!("{} value", other.type_label())),
            None => (Severity::Low, "object whose body could not be read".to_string()),
        }
    }
}

impl AnomalyRule for OrphanedObjectRule {
    fn name(&self) -> &'static str {
        "orphaned-object"
    }

    fn kinds(&self) -> &'static [AnomalyKind] {
        &[AnomalyKind::OrphanedObject]
    }

    fn evaluate(&self, graph: &DocumentGraph) -> Vec<Anomaly> {
        let Some(view) = graph.final_view() else {
            return Vec::new();
        };
        let last_reachable = graph.last_reachable_before(view.revision);
        graph
            .orphans()
            .into_iter()
            .map(|(id, visible)| {
                let (severity, described) = self.classify(graph.resolve(view, id));
                let earlier = last_reachable.contains_key(&id);
                let (confidence, history) = if earlier {
                    (0.7, "was reachable in an earlier revision")
                } else {
                    (0.9, "was never reachable from any revision")
                };
                warn!(
                    security = true,
                    domain = "pdf.structure",
                    kind = "orphaned_object",
                    object = %id,
                    "Orphaned object"
                );
                Anomaly::new(
                    AnomalyKind::OrphanedObject,
                    severity,
                    format!(
                        "{} is in use in the final xref but unreachable from the catalog; {}; it {}",
                        id, described, history
                    ),
                )
                .with_revision(visible.revision)
                .with_object(id)
                .with_confidence(confidence)
            })
            .collect()
    }
}
