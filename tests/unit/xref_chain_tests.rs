use pdx_forensics::structure::{ChainFault, Decryption, DocumentGraph, StructureHandler, XrefEntry, XrefKind};
use pdx_forensics::{AnalysisConfig, ObjectId, ObjectValue};

use crate::fixtures::{self, Damage, Entry, PdfBuilder};

fn graph_of(bytes: &[u8]) -> DocumentGraph {
    StructureHandler::default()
        .build(bytes, Decryption::NotRequired)
        .unwrap()
        .0
}

#[test]
fn test_revisions_oldest_first() {
    let bytes = fixtures::concealed_update();
    let graph = graph_of(&bytes);

    assert_eq!(graph.revision_count(), 2);
    assert!(graph.chain_faults.is_empty());
    assert_eq!(graph.revisions[0].index, 0);
    assert_eq!(graph.revisions[0].previous, None);
    assert_eq!(graph.revisions[1].previous, Some(0));
    assert_eq!(graph.revisions[1].prev_offset, Some(graph.revisions[0].xref_offset));
    assert_eq!(graph.revisions[1].entries.len(), 1);
    assert_eq!(graph.update_count(), 1);

    // The catalog seen by each revision differs; object 3 only hangs off the first
    assert!(graph.views[0].is_reachable(ObjectId::new(3, 0)));
    assert!(!graph.views[1].is_reachable(ObjectId::new(3, 0)));
    assert_eq!(graph.histories[&1].events.len(), 2);
}

#[test]
fn test_self_referencing_prev_stops() {
    let mut pdf = PdfBuilder::new();
    pdf.object(1, "<</Type/Catalog>>");
    let xref = pdf.finish_with(
        "/Root 1 0 R",
        Damage {
            self_prev: true,
            ..Damage::default()
        },
    );
    let graph = graph_of(&pdf.build());

    assert_eq!(graph.revision_count(), 1);
    assert_eq!(
        graph.chain_faults,
        vec![ChainFault::Cycle {
            offset: xref as u64,
            from_section: xref as u64
        }]
    );
}

#[test]
fn test_startxref_past_end() {
    let mut pdf = PdfBuilder::new();
    pdf.object(1, "<</Type/Catalog>>");
    pdf.finish_with(
        "/Root 1 0 R",
        Damage {
            startxref: Some(1_000_000),
            ..Damage::default()
        },
    );
    let bytes = pdf.build();
    let graph = graph_of(&bytes);

    assert_eq!(graph.revision_count(), 0);
    assert!(graph.final_view().is_none());
    assert_eq!(
        graph.chain_faults,
        vec![ChainFault::StartXrefOutOfRange {
            offset: 1_000_000,
            len: bytes.len()
        }]
    );
}

#[test]
fn test_prev_out_of_range_keeps_newest() {
    let mut pdf = PdfBuilder::new();
    pdf.object(1, "<</Type/Catalog>>");
    pdf.finish_with(
        "/Root 1 0 R",
        Damage {
            prev: Some(900_000),
            ..Damage::default()
        },
    );
    let graph = graph_of(&pdf.build());

    assert_eq!(graph.revision_count(), 1);
    assert!(matches!(
        graph.chain_faults.as_slice(),
        [ChainFault::PrevOutOfRange { offset: 900_000, .. }]
    ));
}

#[test]
fn test_hop_limit() {
    let mut pdf = PdfBuilder::new();
    pdf.object(1, "<</Type/Catalog/Pages 2 0 R>>");
    pdf.object(2, "<</Type/Pages/Kids[]/Count 0>>");
    pdf.finish("/Root 1 0 R");
    for round in 0..2 {
        pdf.object(2, &format!("<</Type/Pages/Kids[]/Count 0/Round {}>>", round));
        pdf.finish("/Root 1 0 R");
    }
    let config = AnalysisConfig {
        max_xref_hops: 2,
        ..AnalysisConfig::default()
    };
    let graph = StructureHandler::new(config)
        .build(&pdf.build(), Decryption::NotRequired)
        .unwrap()
        .0;

    assert_eq!(graph.revision_count(), 2);
    assert_eq!(graph.chain_faults, vec![ChainFault::HopLimitExceeded { limit: 2 }]);
}

#[test]
fn test_compressed_xref_stream_with_object_stream() {
    let mut pdf = PdfBuilder::with_version("1.5");
    pdf.object(1, "<</Type/Catalog/Pages 2 0 R>>");
    pdf.object_stream(
        5,
        &[
            (2, "<</Type/Pages/Kids[3 0 R]/Count 1>>"),
            (3, "<</Type/Page/Parent 2 0 R>>"),
        ],
    );
    pdf.finish_xref_stream(6, "/Root 1 0 R", true);
    let graph = graph_of(&pdf.build());

    assert!(graph.chain_faults.is_empty());
    let revision = &graph.revisions[0];
    assert_eq!(revision.kind, XrefKind::Stream);
    assert_eq!(revision.xref_stream, Some(ObjectId::new(6, 0)));
    assert_eq!(revision.entry(3), Some(&XrefEntry::Compressed { container: 5, index: 1 }));

    let view = graph.final_view().unwrap();
    assert!(view.is_reachable(ObjectId::new(3, 0)));
    let pages = graph.resolve_dict(view, ObjectId::new(2, 0)).unwrap();
    assert_eq!(pages.get(b"Count").and_then(ObjectValue::as_integer), Some(1));
    assert!(graph.structural.contains(&ObjectId::new(5, 0)));
    assert!(graph.structural.contains(&ObjectId::new(6, 0)));
    assert!(graph.orphans().is_empty());
    assert_eq!(graph.facts.page_count, Some(1));
}

#[test]
fn test_hybrid_stream_entry_wins() {
    let mut pdf = PdfBuilder::new();
    pdf.object(1, "<</Type/Catalog/Pages 2 0 R/Extra 3 0 R>>");
    pdf.object(2, "<</Type/Pages/Kids[]/Count 0>>");
    let first = pdf.object(3, "(from the stream)");
    pdf.object(3, "(from the table)");
    let stm = pdf.xref_stream_object(
        9,
        &[(
            3,
            Entry::InUse {
                offset: first,
                generation: 0,
            },
        )],
    );
    pdf.finish(&format!("/Root 1 0 R/XRefStm {}", stm));
    let graph = graph_of(&pdf.build());

    let revision = &graph.revisions[0];
    assert_eq!(revision.kind, XrefKind::Hybrid);
    assert_eq!(revision.hybrid_conflicts, vec![3]);
    assert_eq!(
        revision.entry(3),
        Some(&XrefEntry::InUse {
            offset: first as u64,
            generation: 0
        })
    );
    let view = graph.final_view().unwrap();
    assert_eq!(
        graph.resolve(view, ObjectId::new(3, 0)).and_then(ObjectValue::as_string),
        Some(&b"from the stream"[..])
    );
}
