//! Free-list consistency

use std::collections::BTreeMap;

use crate::forensics::anomaly::{Anomaly, AnomalyKind, Severity};
use crate::forensics::detector::AnomalyRule;
use crate::structure::cross_ref::XrefEntry;
use crate::structure::graph::{DanglingKind, DocumentGraph};
use crate::types::ObjectId;

pub struct FreeListRule;

impl AnomalyRule for FreeListRule {
    fn name(&self) -> &'static str {
        "free-list"
    }

    fn kinds(&self) -> &'static [AnomalyKind] {
        &[AnomalyKind::FreeListInconsistency]
    }

    fn evaluate(&self, graph: &DocumentGraph) -> Vec<Anomaly> {
        let mut found = Vec::new();

        // Reachable objects still pointing at freed entries
        if let Some(view) = graph.final_view() {
            let mut referrers: BTreeMap<ObjectId, Vec<ObjectId>> = BTreeMap::new();
            for dangling in view.dangling.iter().filter(|d| d.kind == DanglingKind::Freed) {
                let from = referrers.entry(dangling.target).or_default();
                from.extend(dangling.from);
            }
            for (target, from) in referrers {
                let freed_in = graph.visible_entry(view, target.number).map(|slot| slot.revision);
                let mut anomaly = Anomaly::new(
                    AnomalyKind::FreeListInconsistency,
                    Severity::Medium,
                    format!(
                        "{} is marked free but still referenced by {} reachable object(s)",
                        target,
                        from.len().max(1)
                    ),
                )
                .with_object(target)
                .with_objects(from)
                .with_confidence(0.8);
                if let Some(revision) = freed_in {
                    anomaly = anomaly.with_revision(revision);
                }
                found.push(anomaly);
            }
        }

        // Free entries linking to objects the same section lists in use
        for revision in &graph.revisions {
            for (&number, entry) in &revision.entries {
                let XrefEntry::Free { next_free, .. } = *entry else {
                    continue;
                };
                if next_free == 0 || next_free == number {
                    continue;
                }
                if let Some(target) = revision.entries.get(&next_free).filter(|e| e.is_in_use()) {
                    found.push(
                        Anomaly::new(
                            AnomalyKind::FreeListInconsistency,
                            Severity::Low,
                            format!(
                                "free entry {} links to object {}, which the same section lists in use",
                                number, next_free
                            ),
                        )
                        .with_revision(revision.index)
                        .with_object(ObjectId::new(number, entry.generation()))
                        .with_object(ObjectId::new(next_free, target.generation()))
                        .with_confidence(0.6),
                    );
                }
            }
        }
        found
    }
}
