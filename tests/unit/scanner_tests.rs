use pdx_forensics::scanner::{ByteScanner, StartXref, TokenKind};

use crate::fixtures::{self, Damage, PdfBuilder};

#[test]
fn test_header_and_startxref() {
    let mut pdf = PdfBuilder::with_version("1.7");
    pdf.object(1, "<</Type/Catalog>>");
    let xref = pdf.finish("/Root 1 0 R");
    let bytes = pdf.build();

    let scanner = ByteScanner::new(&bytes);
    assert_eq!(scanner.locate_header(), Some((0, "1.7".to_string())));
    match scanner.find_startxref() {
        StartXref::Found { value, .. } => assert_eq!(value, xref as u64),
        other => panic!("unexpected {:?}", other),
    }
    assert_eq!(scanner.count_eof_markers(), 1);
    assert_eq!(scanner.last_eof_end(), Some(bytes.len() - 1));
}

#[test]
fn test_last_startxref_wins() {
    let bytes = fixtures::concealed_update();
    let scanner = ByteScanner::new(&bytes);
    assert_eq!(scanner.count_eof_markers(), 2);

    let StartXref::Found { keyword_offset, .. } = scanner.find_startxref() else {
        panic!("startxref expected");
    };
    let first = bytes.windows(9).position(|w| w == b"startxref").unwrap();
    assert!(keyword_offset > first);
}

#[test]
fn test_truncated_startxref() {
    let mut pdf = PdfBuilder::new();
    pdf.object(1, "<</Type/Catalog>>");
    pdf.finish_with(
        "/Root 1 0 R",
        Damage {
            omit_eof: true,
            ..Damage::default()
        },
    );
    let mut bytes = pdf.build();
    // Cut the file right after the keyword
    let at = bytes.windows(9).rposition(|w| w == b"startxref").unwrap();
    bytes.truncate(at + 9);

    let scanner = ByteScanner::new(&bytes);
    assert_eq!(scanner.find_startxref(), StartXref::Truncated { keyword_offset: at });
    assert_eq!(scanner.count_eof_markers(), 0);
}

#[test]
fn test_object_headers_skip_stream_payloads() {
    let mut pdf = PdfBuilder::new();
    pdf.object(1, "<</Type/Catalog>>");
    pdf.stream(2, "", b"3 0 obj looks like a header");
    pdf.object_gen(4, 2, "(text)");
    pdf.finish("/Root 1 0 R");
    let bytes = pdf.build();

    let numbers: Vec<(u32, u16)> = ByteScanner::new(&bytes)
        .scan_object_headers()
        .into_iter()
        .filter_map(|token| match token.kind {
            TokenKind::ObjectHeader { number, generation } => Some((number, generation)),
            _ => None,
        })
        .collect();
    assert_eq!(numbers, vec![(1, 0), (2, 0), (4, 2)]);
}

#[test]
fn test_missing_header() {
    let scanner = ByteScanner::new(b"no marker in here");
    assert_eq!(scanner.locate_header(), None);
    assert_eq!(scanner.find_startxref(), StartXref::Missing);
}
