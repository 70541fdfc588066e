//! Analysis report model
//! Author: kartik4091
//!
//! Plain data handed back to the caller. Formatting and writing it out is
//! left to whoever embeds the engine; everything here derives `Serialize`.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::forensics::anomaly::{Anomaly, AnomalyKind, Severity};
use crate::structure::cross_ref_handler::ChainFault;
use crate::structure::graph::{DocumentFacts, DocumentGraph};
use crate::structure::progress::AnalysisWarning;
use crate::structure::structure_handler::{StructureHandler, StructureMetrics};
use crate::types::ObjectId;

/// Per-revision numbers for the summary
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RevisionSummary {
    pub index: usize,
    pub xref_offset: u64,
    pub kind: crate::structure::cross_ref::XrefKind,
    pub entries: usize,
    pub root: Option<ObjectId>,
    /// `None` when the revision was past the reachability budget
    pub reachable_objects: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphSummary {
    pub revision_count: usize,
    /// In-use objects visible in the final revision
    pub object_count: usize,
    pub root: Option<ObjectId>,
    pub facts: DocumentFacts,
    pub metrics: StructureMetrics,
    pub revisions: Vec<RevisionSummary>,
    pub chain_faults: Vec<ChainFault>,
}

impl GraphSummary {
    pub fn from_graph(graph: &DocumentGraph) -> Self {
        let metrics = StructureHandler::metrics(graph);
        let revisions = graph
            .revisions
            .iter()
            .map(|revision| RevisionSummary {
                index: revision.index,
                xref_offset: revision.xref_offset,
                kind: revision.kind,
                entries: revision.entries.len(),
                root: revision.root(),
                reachable_objects: graph
                    .view(revision.index)
                    .filter(|view| view.resolved)
                    .map(|view| view.reachable.len()),
            })
            .collect();
        Self {
            revision_count: graph.revision_count(),
            object_count: metrics.total_objects,
            root: graph.final_view().and_then(|view| view.root),
            facts: graph.facts.clone(),
            metrics,
            revisions,
            chain_faults: graph.chain_faults.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisReport {
    pub summary: GraphSummary,
    /// Sorted by revision, objects, kind
    pub anomalies: Vec<Anomaly>,
    pub warnings: Vec<AnalysisWarning>,
    /// The cross-reference chain could not be followed to its end
    pub partial_history: bool,
}

impl AnalysisReport {
    pub fn has_anomalies(&self) -> bool {
        !self.anomalies.is_empty()
    }

    pub fn of_kind(&self, kind: AnomalyKind) -> impl Iterator<Item = &Anomaly> + '_ {
        self.anomalies.iter().filter(move |anomaly| anomaly.kind == kind)
    }

    pub fn count(&self, kind: AnomalyKind) -> usize {
        self.of_kind(kind).count()
    }

    pub fn severity_counts(&self) -> BTreeMap<Severity, usize> {
        let mut counts = BTreeMap::new();
        for anomaly in &self.anomalies {
            *counts.entry(anomaly.severity).or_insert(0) += 1;
        }
        counts
    }

    pub fn highest_severity(&self) -> Option<Severity> {
        self.anomalies.iter().map(|anomaly| anomaly.severity).max()
    }

    /// Anomalies that point at deliberate editing rather than damage
    pub fn tampering_indicators(&self) -> impl Iterator<Item = &Anomaly> + '_ {
        self.anomalies.iter().filter(|anomaly| !anomaly.kind.is_integrity_issue())
    }

    pub fn to_json(&self) -> crate::error::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
