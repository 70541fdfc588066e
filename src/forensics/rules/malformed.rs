//! Definitions an xref entry points at but that could not be read

use std::collections::BTreeMap;

use crate::forensics::anomaly::{Anomaly, AnomalyKind, Severity};
use crate::forensics::detector::AnomalyRule;
use crate::structure::graph::{DefinitionLocation, DefinitionStatus, DocumentGraph};

pub struct MalformedDefinitionRule;

impl AnomalyRule for MalformedDefinitionRule {
    fn name(&self) -> &'static str {
        "malformed-definition"
    }

    fn kinds(&self) -> &'static [AnomalyKind] {
        &[AnomalyKind::MalformedToken, AnomalyKind::TruncatedInput]
    }

    fn evaluate(&self, graph: &DocumentGraph) -> Vec<Anomaly> {
        let mut introduced: BTreeMap<usize, usize> = BTreeMap::new();
        for event in graph.histories.values().flat_map(|h| h.events.iter()) {
            if let Some(definition) = event.definition {
                introduced.entry(definition).or_insert(event.revision);
            }
        }

        let file_size = graph.facts.file_size as u64;
        let mut found = Vec::new();
        for (idx, definition) in graph.definitions.iter().enumerate() {
            let (kind, severity, rationale) = match &definition.status {
                DefinitionStatus::Unparseable(e) => {
                    let kind = if e.is_truncation() {
                        AnomalyKind::TruncatedInput
                    } else {
                        AnomalyKind::MalformedToken
                    };
                    let at = definition
                        .span
                        .as_ref()
                        .map_or_else(String::new, |span| format!(" (bytes {}..{})", span.start, span.end));
                    (kind, Severity::Medium, format!("{} does not parse{}: {}", definition.id, at, e))
                }
                DefinitionStatus::Unresolved(reason) => {
                    // Encrypted containers are reported once by the encryption rule
                    if graph.unresolved_compressed.contains(&definition.id) {
                        continue;
                    }
                    let kind = match definition.location {
                        DefinitionLocation::Offset(offset) if offset >= file_size => AnomalyKind::TruncatedInput,
                        _ => AnomalyKind::MalformedToken,
                    };
                    (kind, Severity::Medium, format!("{} cannot be located: {}", definition.id, reason))
                }
                DefinitionStatus::Parsed(_) if definition.missing_endobj => (
                    AnomalyKind::MalformedToken,
                    Severity::Low,
                    format!("{} is not closed by endobj", definition.id),
                ),
                DefinitionStatus::Parsed(_) => continue,
            };
            let mut anomaly = Anomaly::new(kind, severity, rationale)
                .with_object(definition.id)
                .with_confidence(0.8);
            if let Some(revision) = introduced.get(&idx) {
                anomaly = anomaly.with_revision(*revision);
            }
            found.push(anomaly);
        }
        found
    }
}
