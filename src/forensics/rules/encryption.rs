//! Encrypted documents analyzed without a decryptor

use crate::forensics::anomaly::{Anomaly, AnomalyKind, Severity};
use crate::forensics::detector::AnomalyRule;
use crate::structure::graph::DocumentGraph;

pub struct UnsupportedEncryptionRule;

impl AnomalyRule for UnsupportedEncryptionRule {
    fn name(&self) -> &'static str {
        "unsupported-encryption"
    }

    fn kinds(&self) -> &'static [AnomalyKind] {
        &[AnomalyKind::UnsupportedEncryption]
    }

    fn evaluate(&self, graph: &DocumentGraph) -> Vec<Anomaly> {
        if !graph.decryption_unavailable {
            return Vec::new();
        }
        let unresolved = graph.unresolved_compressed.len();
        let rationale = if unresolved == 0 {
            "document is encrypted and no decryptor was supplied; stream contents were not inspected".to_string()
        } else {
            format!(
                "document is encrypted and no decryptor was supplied; {} compressed object(s) left unresolved",
                unresolved
            )
        };
        vec![Anomaly::new(AnomalyKind::UnsupportedEncryption, Severity::Info, rationale)
            .with_objects(graph.unresolved_compressed.iter().copied())]
    }
}
