//! Cross-reference chain faults and generation regressions

use crate::forensics::anomaly::{Anomaly, AnomalyKind, Severity};
use crate::forensics::detector::AnomalyRule;
use crate::structure::cross_ref::XrefEntry;
use crate::structure::cross_ref_handler::ChainFault;
use crate::structure::graph::DocumentGraph;
use crate::types::ObjectId;

/// One anomaly per fault recorded while walking the chain
pub struct ChainFaultRule;

impl ChainFaultRule {
    fn classify(fault: &ChainFault) -> (AnomalyKind, Severity, f64) {
        match fault {
            ChainFault::Cycle { .. } => (AnomalyKind::XrefChainBroken, Severity::High, 0.95),
            ChainFault::PrevOutOfRange { .. } | ChainFault::InvalidPrev { .. } => {
                (AnomalyKind::XrefChainBroken, Severity::High, 0.85)
            }
            ChainFault::MissingStartXref => (AnomalyKind::XrefChainBroken, Severity::Medium, 0.7),
            ChainFault::StartXrefOutOfRange { .. } | ChainFault::StartXrefUnreadable { .. } => {
                (AnomalyKind::TruncatedInput, Severity::Medium, 0.8)
            }
            ChainFault::MalformedSection { .. } | ChainFault::XRefStmUnreadable { .. } => {
                (AnomalyKind::MalformedToken, Severity::Medium, 0.8)
            }
            ChainFault::HopLimitExceeded { .. } => (AnomalyKind::XrefChainTruncated, Severity::Medium, 0.9),
        }
    }

    /// Section the fault was raised from, as a revision index
    fn origin(graph: &DocumentGraph, fault: &ChainFault) -> Option<usize> {
        let section = match fault {
            ChainFault::PrevOutOfRange { from_section, .. }
            | ChainFault::Cycle { from_section, .. }
            | ChainFault::InvalidPrev { from_section }
            | ChainFault::XRefStmUnreadable { from_section, .. } => Some(*from_section),
            ChainFault::MalformedSection { from_section, .. } => *from_section,
            _ => None,
        }?;
        graph
            .revisions
            .iter()
            .find(|revision| revision.xref_offset == section)
            .map(|revision| revision.index)
    }
}

impl AnomalyRule for ChainFaultRule {
    fn name(&self) -> &'static str {
        "xref-chain"
    }

    fn kinds(&self) -> &'static [AnomalyKind] {
        &[
            AnomalyKind::XrefChainBroken,
            AnomalyKind::XrefChainTruncated,
            AnomalyKind::TruncatedInput,
            AnomalyKind::MalformedToken,
        ]
    }

    fn evaluate(&self, graph: &DocumentGraph) -> Vec<Anomaly> {
        graph
            .chain_faults
            .iter()
            .map(|fault| {
                let (kind, severity, confidence) = Self::classify(fault);
                let anomaly = Anomaly::new(kind, severity, fault.describe()).with_confidence(confidence);
                match Self::origin(graph, fault) {
                    Some(revision) => anomaly.with_revision(revision),
                    None => anomaly,
                }
            })
            .collect()
    }
}

/// An object number whose generation goes down in a later section
pub struct GenerationRegressionRule;

impl AnomalyRule for GenerationRegressionRule {
    fn name(&self) -> &'static str {
        "generation-regression"
    }

    fn kinds(&self) -> &'static [AnomalyKind] {
        &[AnomalyKind::GenerationRegression]
    }

    fn evaluate(&self, graph: &DocumentGraph) -> Vec<Anomaly> {
        let mut found = Vec::new();
        for history in graph.histories.values().filter(|h| h.number != 0) {
            let mut previous: Option<(usize, u16)> = None;
            for event in &history.events {
                // Compressed entries carry no generation of their own
                if matches!(event.entry, XrefEntry::Compressed { .. }) {
                    continue;
                }
                let generation = event.entry.generation();
                if let Some((earlier, last)) = previous {
                    if generation < last {
                        found.push(
                            Anomaly::new(
                                AnomalyKind::GenerationRegression,
                                Severity::High,
                                format!(
                                    "object {} drops from generation {} in revision {} to {} in revision {}",
                                    history.number, last, earlier, generation, event.revision
                                ),
                            )
                            .with_revision(event.revision)
                            .with_object(ObjectId::new(history.number, generation))
                            .with_confidence(0.85),
                        );
                    }
                }
                previous = Some((event.revision, generation));
            }
        }
        found
    }
}
