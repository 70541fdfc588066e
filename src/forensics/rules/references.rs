//! References from the final object tree that resolve to nothing

use crate::forensics::anomaly::{Anomaly, AnomalyKind, Severity};
use crate::forensics::detector::AnomalyRule;
use crate::structure::graph::{DanglingKind, DocumentGraph};

pub struct UnresolvableReferenceRule;

impl AnomalyRule for UnresolvableReferenceRule {
    fn name(&self) -> &'static str {
        "unresolvable-reference"
    }

    fn kinds(&self) -> &'static [AnomalyKind] {
        &[AnomalyKind::UnresolvableReference]
    }

    fn evaluate(&self, graph: &DocumentGraph) -> Vec<Anomaly> {
        let Some(view) = graph.final_view() else {
            return Vec::new();
        };
        view.dangling
            .iter()
            .filter_map(|dangling| {
                let source = dangling
                    .from
                    .map_or_else(|| "the trailer".to_string(), |from| from.to_string());
                let (severity, rationale) = match dangling.kind {
                    DanglingKind::Freed => return None,
                    DanglingKind::Missing => (
                        Severity::Medium,
                        format!("{} references {}, which no xref section lists", source, dangling.target),
                    ),
                    DanglingKind::GenerationMismatch { found } => (
                        Severity::Medium,
                        format!(
                            "{} references {} but the visible entry has generation {}",
                            source, dangling.target, found
                        ),
                    ),
                };
                let revision = dangling
                    .from
                    .and_then(|from| graph.visible_entry(view, from.number))
                    .map_or(view.revision, |slot| slot.revision);
                Some(
                    Anomaly::new(AnomalyKind::UnresolvableReference, severity, rationale)
                        .with_revision(revision)
                        .with_object(dangling.target)
                        .with_objects(dangling.from)
                        .with_confidence(0.7),
                )
            })
            .collect()
    }
}
