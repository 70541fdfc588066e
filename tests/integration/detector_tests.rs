use pdx_forensics::forensics::{default_rules, Anomaly, AnomalyDetector, AnomalyKind, AnomalyRule, Severity};
use pdx_forensics::structure::{Decryption, DocumentGraph, StructureHandler};
use pdx_forensics::AnalysisConfig;

use crate::fixtures::PdfBuilder;

/// Two revisions with a concealed object, a bad stream length, an object
/// body outside every xref section and junk after the last `%%EOF`
fn noisy_document() -> Vec<u8> {
    let mut pdf = PdfBuilder::new();
    pdf.object(1, "<</Type/Catalog/Pages 2 0 R/Names 3 0 R>>");
    pdf.object(2, "<</Type/Pages/Kids[4 0 R]/Count 1>>");
    pdf.object(3, "<</Type/EmbeddedFile>>");
    pdf.object(4, "<</Type/Page/Parent 2 0 R/Contents 5 0 R>>");
    pdf.stream_with_length(5, "", b"q 1 0 0 1 0 0 cm Q BT ET", 4);
    pdf.finish("/Root 1 0 R");
    pdf.raw(b"9 0 obj\n(stray)\nendobj\n");
    pdf.object(1, "<</Type/Catalog/Pages 2 0 R>>");
    pdf.finish("/Root 1 0 R");
    pdf.raw(b"appended payload that follows the final end-of-file marker");
    pdf.build()
}

fn graph_of(bytes: &[u8]) -> DocumentGraph {
    StructureHandler::default()
        .build(bytes, Decryption::NotRequired)
        .unwrap()
        .0
}

#[test]
fn test_rule_order_does_not_change_output() {
    let bytes = noisy_document();
    let graph = graph_of(&bytes);
    let config = AnalysisConfig::default();

    let forward = AnomalyDetector::new()
        .with_rules(default_rules(&config))
        .detect(&graph);
    let mut reversed_rules = default_rules(&config);
    reversed_rules.reverse();
    let reversed = AnomalyDetector::new()
        .with_rules(reversed_rules)
        .with_parallel(true)
        .detect(&graph);
    let mut rotated_rules = default_rules(&config);
    rotated_rules.rotate_left(5);
    let rotated = AnomalyDetector::new().with_rules(rotated_rules).detect(&graph);

    assert!(!forward.is_empty());
    assert_eq!(forward, reversed);
    assert_eq!(forward, rotated);
}

#[test]
fn test_noisy_document_findings() {
    let graph = graph_of(&noisy_document());
    let anomalies = AnomalyDetector::default().detect(&graph);
    let kinds: Vec<AnomalyKind> = anomalies.iter().map(|a| a.kind).collect();

    for expected in [
        AnomalyKind::OrphanedObject,
        AnomalyKind::IncrementalConcealment,
        AnomalyKind::StreamLengthMismatch,
        AnomalyKind::UnindexedObject,
        AnomalyKind::TrailingData,
    ] {
        assert!(kinds.contains(&expected), "missing {:?} in {:?}", expected, kinds);
    }

    // Document-wide findings sort first
    let first_attributed = anomalies.iter().position(|a| a.revision.is_some()).unwrap();
    assert!(anomalies[..first_attributed].iter().all(|a| a.revision.is_none()));
    assert!(anomalies[first_attributed..].iter().all(|a| a.revision.is_some()));
    assert!(anomalies.windows(2).all(|w| w[0].report_order(&w[1]).is_le()));
}

#[test]
fn test_disabled_kinds_are_dropped() {
    let graph = graph_of(&noisy_document());
    let config = AnalysisConfig {
        disabled_rules: vec![AnomalyKind::OrphanedObject, AnomalyKind::TrailingData],
        ..AnalysisConfig::default()
    };
    let detector = AnomalyDetector::from_config(&config);
    let (anomalies, stats) = detector.detect_with_stats(&graph);

    assert!(anomalies
        .iter()
        .all(|a| a.kind != AnomalyKind::OrphanedObject && a.kind != AnomalyKind::TrailingData));
    assert!(anomalies.iter().any(|a| a.kind == AnomalyKind::IncrementalConcealment));
    // The orphan rule only emits a disabled kind and is skipped outright
    assert_eq!(stats.rules_skipped, 1);
    assert_eq!(stats.anomalies_found, anomalies.len());
}

struct CatalogPresenceRule;

impl AnomalyRule for CatalogPresenceRule {
    fn name(&self) -> &'static str {
        "catalog-presence"
    }

    fn kinds(&self) -> &'static [AnomalyKind] {
        &[AnomalyKind::UnresolvableReference]
    }

    fn evaluate(&self, graph: &DocumentGraph) -> Vec<Anomaly> {
        match graph.final_view().and_then(|view| view.root) {
            Some(_) => Vec::new(),
            None => vec![Anomaly::new(
                AnomalyKind::UnresolvableReference,
                Severity::Critical,
                "final trailer names no catalog",
            )],
        }
    }
}

#[test]
fn test_custom_rule() {
    let mut pdf = PdfBuilder::new();
    pdf.object(1, "<</Type/Catalog>>");
    pdf.finish("/Info 1 0 R");
    let graph = graph_of(&pdf.build());

    let detector = AnomalyDetector::new().with_rule(Box::new(CatalogPresenceRule));
    assert_eq!(detector.rule_names(), vec!["catalog-presence"]);
    let anomalies = detector.detect(&graph);
    assert_eq!(anomalies.len(), 1);
    assert_eq!(anomalies[0].severity, Severity::Critical);
}

#[test]
fn test_empty_registry_finds_nothing() {
    let graph = graph_of(&noisy_document());
    assert!(AnomalyDetector::new().detect(&graph).is_empty());
}
