use std::sync::atomic::{AtomicUsize, Ordering};

use pdx_forensics::{
    AnalysisConfig, AnalysisReport, AnomalyKind, Decryption, ObjectId, PdfAnalyzer, Severity, StreamDecryptor,
};

use crate::fixtures::{self, Damage, Entry, PdfBuilder};

fn analyze(bytes: &[u8]) -> AnalysisReport {
    PdfAnalyzer::default()
        .analyze(bytes, Decryption::NotRequired)
        .unwrap()
}

#[test]
fn test_well_formed_document_is_clean() {
    let bytes = fixtures::well_formed();
    let report = analyze(&bytes);

    assert!(report.anomalies.is_empty(), "unexpected {:?}", report.anomalies);
    assert!(!report.partial_history);
    let summary = &report.summary;
    assert_eq!(summary.revision_count, 1);
    assert_eq!(summary.object_count, 5);
    assert_eq!(summary.root, Some(ObjectId::new(1, 0)));
    assert_eq!(summary.facts.version, "1.4");
    assert_eq!(summary.facts.page_count, Some(1));
    assert_eq!(summary.facts.file_size, bytes.len());
    assert_eq!(summary.facts.sha256.len(), 64);
    assert_eq!(summary.facts.info.title.as_deref(), Some("Quarterly report"));
    assert!(!summary.facts.encrypted);
}

#[test]
fn test_two_revision_concealment() {
    let report = analyze(&fixtures::concealed_update());
    let hidden = ObjectId::new(3, 0);

    let orphans: Vec<_> = report.of_kind(AnomalyKind::OrphanedObject).collect();
    assert_eq!(orphans.len(), 1);
    assert_eq!(orphans[0].objects, vec![hidden]);
    assert_eq!(orphans[0].revision, Some(0));

    let concealed: Vec<_> = report.of_kind(AnomalyKind::IncrementalConcealment).collect();
    assert_eq!(concealed.len(), 1);
    assert_eq!(concealed[0].objects, vec![hidden]);
    assert_eq!(concealed[0].revision, Some(1));
    assert_eq!(concealed[0].severity, Severity::High);

    // Reachable earlier, so less certain than a never-referenced orphan
    assert!(orphans[0].confidence < 0.9);
    assert_eq!(report.summary.revision_count, 2);
}

#[test]
fn test_startxref_past_end_of_buffer() {
    let mut pdf = PdfBuilder::new();
    pdf.object(1, "<</Type/Catalog>>");
    pdf.finish_with(
        "/Root 1 0 R",
        Damage {
            startxref: Some(50_000),
            ..Damage::default()
        },
    );
    let report = analyze(&pdf.build());

    assert_eq!(report.summary.revision_count, 0);
    assert!(report.partial_history);
    assert_eq!(report.count(AnomalyKind::TruncatedInput), 1);
    assert_eq!(report.anomalies.len(), 1);
}

#[test]
fn test_prev_cycle_reported_once() {
    let mut pdf = PdfBuilder::new();
    pdf.object(1, "<</Type/Catalog/Pages 2 0 R>>");
    pdf.object(2, "<</Type/Pages/Kids[]/Count 0>>");
    pdf.finish_with(
        "/Root 1 0 R",
        Damage {
            self_prev: true,
            ..Damage::default()
        },
    );
    let report = analyze(&pdf.build());

    assert_eq!(report.count(AnomalyKind::XrefChainBroken), 1);
    assert!(report.partial_history);
    assert_eq!(report.summary.revision_count, 1);
}

#[test]
fn test_stream_length_mismatch() {
    let mut pdf = PdfBuilder::new();
    pdf.object(1, "<</Type/Catalog/Pages 2 0 R>>");
    pdf.object(2, "<</Type/Pages/Kids[3 0 R]/Count 1>>");
    pdf.object(3, "<</Type/Page/Parent 2 0 R/Contents 4 0 R>>");
    pdf.stream_with_length(4, "", b"BT /F1 24 Tf 100 100 Td (Hidden) Tj ET", 12);
    pdf.finish("/Root 1 0 R");
    let report = analyze(&pdf.build());

    let found: Vec<_> = report.of_kind(AnomalyKind::StreamLengthMismatch).collect();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].objects, vec![ObjectId::new(4, 0)]);
    assert_eq!(found[0].revision, Some(0));
}

#[test]
fn test_free_entry_still_referenced() {
    let mut pdf = PdfBuilder::new();
    pdf.object(1, "<</Type/Catalog/Pages 2 0 R/Outlines 3 0 R>>");
    pdf.object(2, "<</Type/Pages/Kids[]/Count 0>>");
    pdf.object(3, "<</Type/Outlines/Count 0>>");
    pdf.finish("/Root 1 0 R");
    pdf.free(3, 0, 1);
    pdf.finish("/Root 1 0 R");
    let report = analyze(&pdf.build());

    let found: Vec<_> = report.of_kind(AnomalyKind::FreeListInconsistency).collect();
    assert_eq!(found.len(), 1);
    assert!(found[0].objects.contains(&ObjectId::new(3, 0)));
    assert_eq!(found[0].revision, Some(1));
    assert_eq!(report.count(AnomalyKind::UnresolvableReference), 0);
}

#[test]
fn test_generation_regression() {
    let mut pdf = PdfBuilder::new();
    pdf.object(1, "<</Type/Catalog/Pages 2 0 R/Extra 4 1 R>>");
    pdf.object(2, "<</Type/Pages/Kids[]/Count 0>>");
    pdf.object_gen(4, 1, "(second life)");
    pdf.finish("/Root 1 0 R");
    pdf.object(1, "<</Type/Catalog/Pages 2 0 R/Extra 4 0 R>>");
    pdf.object(4, "(rewound)");
    pdf.finish("/Root 1 0 R");
    let report = analyze(&pdf.build());

    let found: Vec<_> = report.of_kind(AnomalyKind::GenerationRegression).collect();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].objects, vec![ObjectId::new(4, 0)]);
    assert_eq!(found[0].revision, Some(1));
}

#[test]
fn test_unindexed_object_and_trailing_data() {
    let mut pdf = PdfBuilder::new();
    pdf.object(1, "<</Type/Catalog/Pages 2 0 R>>");
    pdf.raw(b"7 0 obj\n<</Payload(tucked away)>>\nendobj\n");
    pdf.object(2, "<</Type/Pages/Kids[]/Count 0>>");
    pdf.finish("/Root 1 0 R");
    pdf.raw(b"\n\nthis text was appended after the end-of-file marker\n");
    let report = analyze(&pdf.build());

    let unindexed: Vec<_> = report.of_kind(AnomalyKind::UnindexedObject).collect();
    assert_eq!(unindexed.len(), 1);
    assert_eq!(unindexed[0].objects, vec![ObjectId::new(7, 0)]);
    assert_eq!(report.count(AnomalyKind::TrailingData), 1);
    assert_eq!(report.count(AnomalyKind::EofMarkerMismatch), 0);
}

#[test]
fn test_hybrid_conflict_reported() {
    let mut pdf = PdfBuilder::new();
    pdf.object(1, "<</Type/Catalog/Pages 2 0 R/Extra 3 0 R>>");
    pdf.object(2, "<</Type/Pages/Kids[]/Count 0>>");
    let first = pdf.object(3, "(visible to stream readers)");
    pdf.object(3, "(visible to table readers)");
    let stm = pdf.xref_stream_object(
        8,
        &[(
            3,
            fixtures::Entry::InUse {
                offset: first,
                generation: 0,
            },
        )],
    );
    pdf.finish(&format!("/Root 1 0 R/XRefStm {}", stm));
    let report = analyze(&pdf.build());

    let found: Vec<_> = report.of_kind(AnomalyKind::HybridXrefConflict).collect();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].objects, vec![ObjectId::new(3, 0)]);
    assert_eq!(found[0].severity, Severity::High);
}

#[test]
fn test_metadata_dates_out_of_order() {
    let mut pdf = PdfBuilder::new();
    pdf.object(1, "<</Type/Catalog/Pages 2 0 R>>");
    pdf.object(2, "<</Type/Pages/Kids[]/Count 0>>");
    pdf.object(
        3,
        "<</Producer(editor)/CreationDate(D:20240510093000+02'00')/ModDate(D:20210101000000Z)>>",
    );
    pdf.finish("/Root 1 0 R/Info 3 0 R");
    let report = analyze(&pdf.build());

    let found: Vec<_> = report.of_kind(AnomalyKind::MetadataInconsistency).collect();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].severity, Severity::High);
    assert_eq!(found[0].objects, vec![ObjectId::new(3, 0)]);
}

#[test]
fn test_update_without_new_mod_date() {
    let mut pdf = PdfBuilder::new();
    let info = "<</CreationDate(D:20240301120000Z)/ModDate(D:20240301120000Z)>>";
    pdf.object(1, "<</Type/Catalog/Pages 2 0 R>>");
    pdf.object(2, "<</Type/Pages/Kids[]/Count 0>>");
    pdf.object(3, info);
    pdf.finish("/Root 1 0 R/Info 3 0 R");
    pdf.object(2, "<</Type/Pages/Kids[]/Count 0/Edited true>>");
    pdf.finish("/Root 1 0 R/Info 3 0 R");
    let report = analyze(&pdf.build());

    let found: Vec<_> = report.of_kind(AnomalyKind::MetadataInconsistency).collect();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].severity, Severity::Medium);
    assert_eq!(found[0].revision, Some(1));
}

fn encrypted_document() -> Vec<u8> {
    let mut pdf = PdfBuilder::with_version("1.5");
    pdf.object(1, "<</Type/Catalog/Pages 2 0 R/Names 3 0 R>>");
    pdf.object(2, "<</Type/Pages/Kids[]/Count 0>>");
    pdf.object_stream(5, &[(3, "<</Dests 4 0 R>>"), (4, "<</Names[]>>")]);
    pdf.object(8, "<</Filter/Standard/V 2/R 3/Length 128/P -1028/O(owner)/U(user)>>");
    pdf.finish_xref_stream(6, "/Root 1 0 R/Encrypt 8 0 R", false);
    pdf.build()
}

#[test]
fn test_encrypted_without_decryptor() {
    let report = PdfAnalyzer::default()
        .analyze(&encrypted_document(), Decryption::Unavailable)
        .unwrap();

    assert!(report.summary.facts.encrypted);
    let found: Vec<_> = report.of_kind(AnomalyKind::UnsupportedEncryption).collect();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].objects, vec![ObjectId::new(3, 0), ObjectId::new(4, 0)]);
    assert_eq!(report.count(AnomalyKind::MalformedToken), 0);
}

#[test]
fn test_encrypted_under_default_mode_is_not_guessed() {
    // Scrambled bytes standing in for an encrypted, deflated object stream
    let ciphertext: Vec<u8> = (0u32..96).map(|i| (i.wrapping_mul(157) ^ 0x5a) as u8 | 0x80).collect();
    let mut pdf = PdfBuilder::with_version("1.5");
    pdf.object(1, "<</Type/Catalog/Pages 2 0 R/Names 3 0 R>>");
    pdf.object(2, "<</Type/Pages/Kids[]/Count 0>>");
    pdf.stream(5, "/Type/ObjStm/N 2/First 9/Filter/FlateDecode", &ciphertext);
    pdf.set_entry(3, Entry::Compressed { container: 5, index: 0 });
    pdf.set_entry(4, Entry::Compressed { container: 5, index: 1 });
    pdf.object(8, "<</Filter/Standard/V 2/R 3/Length 128/P -1028/O(owner)/U(user)>>");
    pdf.finish_xref_stream(6, "/Root 1 0 R/Encrypt 8 0 R", false);

    let report = analyze(&pdf.build());

    let found: Vec<_> = report.of_kind(AnomalyKind::UnsupportedEncryption).collect();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].objects, vec![ObjectId::new(3, 0), ObjectId::new(4, 0)]);
    assert_eq!(report.count(AnomalyKind::MalformedToken), 0);
    assert_eq!(report.count(AnomalyKind::UnresolvableReference), 0);
    assert_eq!(report.summary.metrics.unparseable_definitions, 0);
    assert!(report.warnings.iter().any(|w| w.message.contains("encrypted")));
}

struct PassThrough {
    calls: AtomicUsize,
}

impl StreamDecryptor for PassThrough {
    fn decrypt_stream(&self, _id: ObjectId, data: &[u8]) -> Result<Vec<u8>, String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(data.to_vec())
    }
}

#[test]
fn test_encrypted_with_decryptor() {
    let decryptor = PassThrough {
        calls: AtomicUsize::new(0),
    };
    let report = PdfAnalyzer::default()
        .analyze(&encrypted_document(), Decryption::Decryptor(&decryptor))
        .unwrap();

    assert_eq!(report.count(AnomalyKind::UnsupportedEncryption), 0);
    assert_eq!(report.summary.metrics.unparseable_definitions, 0);
    assert!(decryptor.calls.load(Ordering::SeqCst) >= 1);
    assert_eq!(report.count(AnomalyKind::UnresolvableReference), 0);
}

#[test]
fn test_truncated_prefixes_never_fail_past_the_header() {
    let bytes = fixtures::concealed_update();
    let analyzer = PdfAnalyzer::default();
    for end in 8..bytes.len() {
        let report = analyzer
            .analyze(&bytes[..end], Decryption::NotRequired)
            .unwrap_or_else(|e| panic!("prefix of {} bytes failed: {}", end, e));
        assert!(report.summary.revision_count <= 2);
    }
}

#[test]
fn test_config_from_yaml_disables_rules() {
    let config = AnalysisConfig::from_yaml_str("disabled_rules: [OrphanedObject]\nparallel_rules: false\n").unwrap();
    let report = PdfAnalyzer::new(config)
        .unwrap()
        .analyze(&fixtures::concealed_update(), Decryption::NotRequired)
        .unwrap();

    assert_eq!(report.count(AnomalyKind::OrphanedObject), 0);
    assert_eq!(report.count(AnomalyKind::IncrementalConcealment), 1);
}

#[test]
fn test_report_serializes() {
    let report = analyze(&fixtures::concealed_update());
    let json = report.to_json().unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();

    assert_eq!(value["summary"]["revision_count"], 2);
    assert_eq!(value["partial_history"], false);
    assert!(value["anomalies"].as_array().map_or(false, |a| a.len() == 2));
}
