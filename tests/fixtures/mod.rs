//! Synthetic PDF documents for the integration tests
//!
//! `PdfBuilder` writes objects one after another, remembers where each one
//! landed and emits xref sections (classic tables or xref streams) with the
//! right offsets. Incremental updates are just further `finish*` calls.
//! `Damage` and `set_entry` bend the output for the tampering scenarios.
#![allow(dead_code)]

use std::collections::BTreeMap;
use std::io::Write;

use flate2::write::ZlibEncoder;
use flate2::Compression;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entry {
    Free { next: u32, generation: u16 },
    InUse { offset: usize, generation: u16 },
    Compressed { container: u32, index: u32 },
}

/// Deliberate damage applied when a revision is closed
#[derive(Debug, Clone, Copy, Default)]
pub struct Damage {
    /// Written as `/Prev` instead of the previous section's offset
    pub prev: Option<u64>,
    /// `/Prev` points at the section itself
    pub self_prev: bool,
    /// Written after `startxref` instead of the real offset
    pub startxref: Option<u64>,
    pub omit_eof: bool,
}

pub struct PdfBuilder {
    out: Vec<u8>,
    pending: BTreeMap<u32, Entry>,
    xref_offsets: Vec<usize>,
    size: u32,
}

impl PdfBuilder {
    pub fn new() -> Self {
        Self::with_version("1.4")
    }

    pub fn with_version(version: &str) -> Self {
        let mut out = format!("%PDF-{}\n", version).into_bytes();
        out.extend_from_slice(b"%\xE2\xE3\xCF\xD3\n");
        Self {
            out,
            pending: BTreeMap::new(),
            xref_offsets: Vec::new(),
            size: 1,
        }
    }

    pub fn len(&self) -> usize {
        self.out.len()
    }

    pub fn last_xref(&self) -> Option<usize> {
        self.xref_offsets.last().copied()
    }

    fn note(&mut self, number: u32, entry: Entry) {
        self.size = self.size.max(number + 1);
        self.pending.insert(number, entry);
    }

    pub fn object(&mut self, number: u32, body: &str) -> usize {
        self.object_gen(number, 0, body)
    }

    pub fn object_gen(&mut self, number: u32, generation: u16, body: &str) -> usize {
        let offset = self.out.len();
        self.out
            .extend_from_slice(format!("{} {} obj\n{}\nendobj\n", number, generation, body).as_bytes());
        self.note(number, Entry::InUse { offset, generation });
        offset
    }

    /// `dict` holds the entries without `/Length`; the builder adds it
    pub fn stream(&mut self, number: u32, dict: &str, data: &[u8]) -> usize {
        self.stream_with_length(number, dict, data, data.len())
    }

    pub fn stream_with_length(&mut self, number: u32, dict: &str, data: &[u8], declared: usize) -> usize {
        let offset = self.out.len();
        self.out
            .extend_from_slice(format!("{} 0 obj\n<<{}/Length {}>>\nstream\n", number, dict, declared).as_bytes());
        self.out.extend_from_slice(data);
        self.out.extend_from_slice(b"\nendstream\nendobj\n");
        self.note(number, Entry::InUse { offset, generation: 0 });
        offset
    }

    /// Writes an uncompressed `/ObjStm` holding `members` in order
    pub fn object_stream(&mut self, container: u32, members: &[(u32, &str)]) -> usize {
        let mut header = String::new();
        let mut body = String::new();
        for (number, text) in members {
            header.push_str(&format!("{} {} ", number, body.len()));
            body.push_str(text);
            body.push('\n');
        }
        let first = header.len();
        let data = format!("{}{}", header, body);
        let offset = self.stream(
            container,
            &format!("/Type/ObjStm/N {}/First {}", members.len(), first),
            data.as_bytes(),
        );
        for (index, (number, _)) in members.iter().enumerate() {
            self.note(
                *number,
                Entry::Compressed {
                    container,
                    index: index as u32,
                },
            );
        }
        offset
    }

    pub fn free(&mut self, number: u32, next: u32, generation: u16) {
        self.note(number, Entry::Free { next, generation });
    }

    /// Overrides what the next section says about `number`
    pub fn set_entry(&mut self, number: u32, entry: Entry) {
        self.note(number, entry);
    }

    pub fn raw(&mut self, bytes: &[u8]) {
        self.out.extend_from_slice(bytes);
    }

    /// Closes the revision with a classic xref table
    pub fn finish(&mut self, trailer: &str) -> usize {
        self.finish_with(trailer, Damage::default())
    }

    pub fn finish_with(&mut self, trailer: &str, damage: Damage) -> usize {
        let entries = self.take_entries();
        let offset = self.out.len();
        let mut table = String::from("xref\n");
        for run in runs(&entries) {
            table.push_str(&format!("{} {}\n", run[0].0, run.len()));
            for (_, entry) in run {
                let line = match entry {
                    Entry::Free { next, generation } => format!("{:010} {:05} f \n", next, generation),
                    Entry::InUse { offset, generation } => format!("{:010} {:05} n \n", offset, generation),
                    // Classic tables cannot express compressed entries
                    Entry::Compressed { .. } => format!("{:010} {:05} f \n", 0, 0),
                };
                table.push_str(&line);
            }
        }
        table.push_str(&format!(
            "trailer\n<</Size {}{}{}>>\n",
            self.size,
            self.prev_entry(offset, &damage),
            trailer
        ));
        self.out.extend_from_slice(table.as_bytes());
        self.close(offset, damage);
        offset
    }

    /// Closes the revision with an xref stream stored as object `number`
    pub fn finish_xref_stream(&mut self, number: u32, trailer: &str, compress: bool) -> usize {
        let offset = self.out.len();
        self.note(number, Entry::InUse { offset, generation: 0 });
        let entries = self.take_entries();
        let prev = self.prev_entry(offset, &Damage::default());

        let (index, rows) = encode_rows(&entries);
        let (filter, data) = if compress {
            ("/Filter/FlateDecode", deflate(&rows))
        } else {
            ("", rows)
        };
        self.out.extend_from_slice(
            format!(
                "{} 0 obj\n<</Type/XRef/Size {}/W[1 4 2]/Index[{}]{}{}{}/Length {}>>\nstream\n",
                number,
                self.size,
                index,
                filter,
                prev,
                trailer,
                data.len()
            )
            .as_bytes(),
        );
        self.out.extend_from_slice(&data);
        self.out.extend_from_slice(b"\nendstream\nendobj\n");
        self.close(offset, Damage::default());
        offset
    }

    /// Writes a standalone xref stream object (for `/XRefStm`) without
    /// touching the pending entries
    pub fn xref_stream_object(&mut self, number: u32, entries: &[(u32, Entry)]) -> usize {
        let offset = self.out.len();
        let (index, rows) = encode_rows(entries);
        self.out.extend_from_slice(
            format!(
                "{} 0 obj\n<</Type/XRef/Size {}/W[1 4 2]/Index[{}]/Length {}>>\nstream\n",
                number,
                self.size.max(number + 1),
                index,
                rows.len()
            )
            .as_bytes(),
        );
        self.out.extend_from_slice(&rows);
        self.out.extend_from_slice(b"\nendstream\nendobj\n");
        offset
    }

    pub fn build(self) -> Vec<u8> {
        self.out
    }

    fn take_entries(&mut self) -> Vec<(u32, Entry)> {
        if self.xref_offsets.is_empty() {
            self.pending.entry(0).or_insert(Entry::Free {
                next: 0,
                generation: 65535,
            });
        }
        std::mem::take(&mut self.pending).into_iter().collect()
    }

    fn prev_entry(&self, offset: usize, damage: &Damage) -> String {
        let prev = if damage.self_prev {
            Some(offset as u64)
        } else {
            damage.prev.or_else(|| self.last_xref().map(|p| p as u64))
        };
        prev.map_or_else(String::new, |p| format!("/Prev {}", p))
    }

    fn close(&mut self, offset: usize, damage: Damage) {
        let startxref = damage.startxref.unwrap_or(offset as u64);
        self.out
            .extend_from_slice(format!("startxref\n{}\n", startxref).as_bytes());
        if !damage.omit_eof {
            self.out.extend_from_slice(b"%%EOF\n");
        }
        self.xref_offsets.push(offset);
    }
}

/// Splits sorted entries into runs of consecutive object numbers
fn runs(entries: &[(u32, Entry)]) -> Vec<&[(u32, Entry)]> {
    let mut out = Vec::new();
    let mut start = 0;
    for i in 1..=entries.len() {
        if i == entries.len() || entries[i].0 != entries[i - 1].0 + 1 {
            if start < i {
                out.push(&entries[start..i]);
            }
            start = i;
        }
    }
    out
}

/// `/Index` text and `W[1 4 2]` rows for sorted entries
fn encode_rows(entries: &[(u32, Entry)]) -> (String, Vec<u8>) {
    let index = runs(entries)
        .iter()
        .map(|run| format!("{} {}", run[0].0, run.len()))
        .collect::<Vec<_>>()
        .join(" ");
    let mut rows = Vec::new();
    for (_, entry) in entries {
        let (kind, field2, field3) = match *entry {
            Entry::Free { next, generation } => (0u8, next, generation),
            Entry::InUse { offset, generation } => (1, offset as u32, generation),
            Entry::Compressed { container, index } => (2, container, index as u16),
        };
        rows.push(kind);
        rows.extend_from_slice(&field2.to_be_bytes());
        rows.extend_from_slice(&field3.to_be_bytes());
    }
    (index, rows)
}

pub fn deflate(data: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

/// Catalog, page tree, one page and an `/Info` with matching dates; a
/// single classic revision
pub fn well_formed() -> Vec<u8> {
    let mut pdf = PdfBuilder::new();
    pdf.object(1, "<</Type/Catalog/Pages 2 0 R>>");
    pdf.object(2, "<</Type/Pages/Kids[3 0 R]/Count 1>>");
    pdf.object(3, "<</Type/Page/Parent 2 0 R/MediaBox[0 0 612 792]/Contents 4 0 R>>");
    pdf.stream(4, "", b"BT /F1 12 Tf 72 712 Td (Hello) Tj ET");
    pdf.object(
        5,
        "<</Title(Quarterly report)/Producer(pdx tests)/CreationDate(D:20240301120000Z)/ModDate(D:20240301120000Z)>>",
    );
    pdf.finish("/Root 1 0 R/Info 5 0 R");
    pdf.build()
}

/// Revision 0 reaches objects 1, 2 and 3; revision 1 rewrites the catalog
/// without its link to 3 and leaves 3's entry in use
pub fn concealed_update() -> Vec<u8> {
    let mut pdf = PdfBuilder::new();
    pdf.object(1, "<</Type/Catalog/Pages 2 0 R/Names 3 0 R>>");
    pdf.object(2, "<</Type/Pages/Kids[]/Count 0>>");
    pdf.object(3, "<</Type/EmbeddedFile/Desc(ledger)>>");
    pdf.finish("/Root 1 0 R");
    pdf.object(1, "<</Type/Catalog/Pages 2 0 R>>");
    pdf.finish("/Root 1 0 R");
    pdf.build()
}
