use pdx_forensics::forensics::{AnomalyDetector, AnomalyKind};
use pdx_forensics::structure::{AnalysisStage, Decryption, StructureHandler};
use pdx_forensics::{AnalysisConfig, ObjectId};

use crate::fixtures::PdfBuilder;

/// A catalog reaching `leaves` objects through one array, then `updates`
/// revisions that each rewrite the reachable `/Pages` node
fn wide_document_with_updates(leaves: u32, updates: usize) -> Vec<u8> {
    let mut pdf = PdfBuilder::new();
    pdf.object(1, "<</Type/Catalog/Pages 2 0 R>>");
    pdf.object(2, "<</Type/Pages/Kids[]/Count 0/Leaves 3 0 R>>");
    let refs: String = (0..leaves).map(|n| format!("{} 0 R ", n + 4)).collect();
    pdf.object(3, &format!("[{}]", refs));
    for n in 0..leaves {
        pdf.object(n + 4, "(leaf)");
    }
    pdf.finish("/Root 1 0 R");
    for round in 0..updates {
        pdf.object(2, &format!("<</Type/Pages/Kids[]/Count 0/Leaves 3 0 R/Round {}>>", round));
        pdf.finish("/Root 1 0 R");
    }
    pdf.build()
}

#[test]
fn test_many_updates_stay_within_view_budget() {
    let leaves = 2000;
    let bytes = wide_document_with_updates(leaves, 1000);
    let config = AnalysisConfig {
        max_view_work: 20_000,
        ..AnalysisConfig::default()
    };
    let (graph, warnings) = StructureHandler::new(config)
        .build(&bytes, Decryption::NotRequired)
        .unwrap();

    assert_eq!(graph.revision_count(), 1001);
    assert_eq!(graph.views.len(), 1001);

    // The final view is always complete
    let last = graph.final_view().unwrap();
    assert!(last.resolved);
    assert_eq!(last.reachable.len(), leaves as usize + 3);

    // Each earlier walk costs about `leaves` visits, so only a handful fit
    let resolved = graph.views.iter().filter(|view| view.resolved).count();
    assert!(resolved >= 2, "resolved {}", resolved);
    assert!(resolved <= 1 + 20_000 / leaves as usize, "resolved {}", resolved);
    assert_eq!(graph.unresolved_views(), 1001 - resolved);
    assert!(graph.views[0].reachable.is_empty());
    assert!(warnings
        .iter()
        .any(|w| w.stage == AnalysisStage::References && w.message.contains("budget")));

    // Newest revisions are the ones walked
    assert!(graph.views[1000 - resolved + 1..].iter().all(|view| view.resolved));
}

#[test]
fn test_unrelated_updates_share_reachability() {
    let mut pdf = PdfBuilder::new();
    pdf.object(1, "<</Type/Catalog/Pages 2 0 R>>");
    pdf.object(2, "<</Type/Pages/Kids[]/Count 0>>");
    pdf.object(3, "(scratch)");
    pdf.finish("/Root 1 0 R");
    for round in 0..300 {
        pdf.object(3, &format!("(scratch {})", round));
        pdf.finish("/Root 1 0 R");
    }
    // A budget this small would stop every real walk
    let config = AnalysisConfig {
        max_view_work: 1,
        ..AnalysisConfig::default()
    };
    let (graph, warnings) = StructureHandler::new(config)
        .build(&pdf.build(), Decryption::NotRequired)
        .unwrap();

    assert_eq!(graph.revision_count(), 301);
    assert_eq!(graph.unresolved_views(), 0);
    assert!(graph.views.windows(2).all(|pair| pair[0].shares_sets_with(&pair[1])));
    assert!(graph.views[0].is_reachable(ObjectId::new(2, 0)));
    assert!(warnings.is_empty());
}

#[test]
fn test_concealment_found_across_shared_views() {
    let mut pdf = PdfBuilder::new();
    pdf.object(1, "<</Type/Catalog/Pages 2 0 R/Names 3 0 R>>");
    pdf.object(2, "<</Type/Pages/Kids[]/Count 0>>");
    pdf.object(3, "<</Type/EmbeddedFile>>");
    pdf.object(4, "(scratch)");
    pdf.finish("/Root 1 0 R");
    pdf.object(1, "<</Type/Catalog/Pages 2 0 R>>");
    pdf.finish("/Root 1 0 R");
    for round in 1..3 {
        pdf.object(4, &format!("(scratch {})", round));
        pdf.finish("/Root 1 0 R");
    }
    let (graph, _) = StructureHandler::default()
        .build(&pdf.build(), Decryption::NotRequired)
        .unwrap();

    assert_eq!(graph.revision_count(), 4);
    assert!(graph.views[1].shares_sets_with(&graph.views[2]));
    assert!(graph.views[2].shares_sets_with(&graph.views[3]));
    assert!(!graph.views[0].shares_sets_with(&graph.views[1]));

    let anomalies = AnomalyDetector::default().detect(&graph);
    let concealed: Vec<_> = anomalies
        .iter()
        .filter(|a| a.kind == AnomalyKind::IncrementalConcealment)
        .collect();
    assert_eq!(concealed.len(), 1);
    assert_eq!(concealed[0].revision, Some(1));
    assert_eq!(concealed[0].objects, vec![ObjectId::new(3, 0)]);
}
