//! Cross-reference section parsing
//! Author: kartik4091
//!
//! Reads a single classic `xref` table or a `/Type /XRef` stream at a known
//! offset. Chain traversal across `/Prev` lives in the handler.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::error::StructureError;
use crate::scanner::lexer::Cursor;
use crate::structure::parser::PdfParser;
use crate::structure::stream_processor::StreamProcessor;
use crate::types::{Dictionary, ObjectId, ObjectValue};

/// One cross-reference entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum XrefEntry {
    Free { next_free: u32, generation: u16 },
    InUse { offset: u64, generation: u16 },
    /// Object stored inside an object stream
    Compressed { container: u32, index: u32 },
}

impl XrefEntry {
    pub fn is_in_use(&self) -> bool {
        !matches!(self, XrefEntry::Free { .. })
    }

    /// Generation the entry claims for its object. Compressed objects always
    /// have generation zero.
    pub fn generation(&self) -> u16 {
        match self {
            XrefEntry::Free { generation, .. } | XrefEntry::InUse { generation, .. } => *generation,
            XrefEntry::Compressed { .. } => 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum XrefKind {
    Table,
    Stream,
    /// Classic table whose trailer also points at an xref stream (`/XRefStm`)
    Hybrid,
}

/// Counters gathered while reading one section
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct XRefStatistics {
    pub subsections: usize,
    pub entries_processed: usize,
    pub free_objects: usize,
    pub in_use_objects: usize,
    pub compressed_objects: usize,
    /// Object numbers listed more than once within the section
    pub duplicate_entries: usize,
}

impl XRefStatistics {
    fn record(&mut self, entry: &XrefEntry) {
        self.entries_processed += 1;
        match entry {
            XrefEntry::Free { .. } => self.free_objects += 1,
            XrefEntry::InUse { .. } => self.in_use_objects += 1,
            XrefEntry::Compressed { .. } => self.compressed_objects += 1,
        }
    }
}

/// A section read from one offset, before any hybrid merge
#[derive(Debug, Clone, PartialEq)]
pub struct XrefSection {
    pub offset: u64,
    pub kind: XrefKind,
    pub entries: BTreeMap<u32, XrefEntry>,
    pub trailer: Dictionary,
    pub prev: Option<u64>,
    /// `/Prev` exists but is not a non-negative integer
    pub prev_invalid: bool,
    pub xref_stm: Option<u64>,
    /// Object holding the section when it is an xref stream
    pub stream_object: Option<ObjectId>,
    /// Filled in when an `/XRefStm` stream is merged into a classic table
    pub hybrid_conflicts: Vec<u32>,
    pub statistics: XRefStatistics,
}

impl XrefSection {
    fn new(offset: u64, kind: XrefKind, trailer: Dictionary) -> Self {
        let (prev, prev_invalid) = match trailer.get(b"Prev") {
            None => (None, false),
            Some(ObjectValue::Integer(n)) if *n >= 0 => (Some(*n as u64), false),
            Some(_) => (None, true),
        };
        let xref_stm = trailer
            .get_integer(b"XRefStm")
            .and_then(|n| u64::try_from(n).ok());
        Self {
            offset,
            kind,
            entries: BTreeMap::new(),
            trailer,
            prev,
            prev_invalid,
            xref_stm,
            stream_object: None,
            hybrid_conflicts: Vec::new(),
            statistics: XRefStatistics::default(),
        }
    }

    fn insert(&mut self, number: u32, entry: XrefEntry) {
        self.statistics.record(&entry);
        if self.entries.insert(number, entry).is_some() {
            self.statistics.duplicate_entries += 1;
        }
    }
}

/// Reads cross-reference sections out of a borrowed buffer
#[derive(Debug, Clone, Copy)]
pub struct XrefSectionParser<'a> {
    bytes: &'a [u8],
    parser: PdfParser<'a>,
    processor: StreamProcessor,
}

impl<'a> XrefSectionParser<'a> {
    pub fn new(bytes: &'a [u8], parser: PdfParser<'a>, processor: StreamProcessor) -> Self {
        Self { bytes, parser, processor }
    }

    /// Parses whichever kind of section starts at `offset`
    pub fn parse_at(&self, offset: u64) -> Result<XrefSection, StructureError> {
        let start = usize::try_from(offset)
            .ok()
            .filter(|o| *o < self.bytes.len())
            .ok_or_else(|| StructureError::InvalidXref(format!("offset {} is outside the buffer", offset)))?;
        let mut cur = Cursor::at(self.bytes, start);
        cur.skip_whitespace();
        if cur.consume_word(b"xref") {
            self.parse_table(offset, cur)
        } else {
            self.parse_stream(offset)
        }
    }

    /// Parses an xref stream object at `offset`
    pub fn parse_stream(&self, offset: u64) -> Result<XrefSection, StructureError> {
        let start = usize::try_from(offset)
            .map_err(|_| StructureError::InvalidXref(format!("offset {} is outside the buffer", offset)))?;
        let object = self
            .parser
            .parse_indirect_at(start, &|_| None)
            .map_err(|e| StructureError::InvalidXref(format!("no xref keyword or stream at {}: {}", offset, e)))?;
        let ObjectValue::Stream(stream) = object.value else {
            return Err(StructureError::InvalidXref(format!(
                "object {} at {} is not an xref stream",
                object.id, offset
            )));
        };
        if !stream.dict.has_type(b"XRef") {
            return Err(StructureError::InvalidXref(format!(
                "stream {} at {} lacks /Type /XRef",
                object.id, offset
            )));
        }

        let widths = field_widths(&stream.dict)?;
        let size = stream
            .dict
            .get_integer(b"Size")
            .and_then(|n| u32::try_from(n).ok())
            .ok_or_else(|| StructureError::InvalidTrailer(format!("xref stream {} has no /Size", object.id)))?;
        let subsections = index_ranges(&stream.dict, size)?;
        let data = self.processor.decode(&stream, &stream.data)?;

        let mut section = XrefSection::new(offset, XrefKind::Stream, stream.dict.clone());
        section.stream_object = Some(object.id);
        section.statistics.subsections = subsections.len();

        let row = widths.iter().sum::<usize>();
        let mut rows = data.chunks_exact(row.max(1));
        for (first, count) in subsections {
            for i in 0..count {
                let Some(fields) = rows.next() else {
                    debug!(offset, "Xref stream data shorter than its /Index");
                    return Ok(section);
                };
                let (f1, rest) = fields.split_at(widths[0]);
                let (f2, f3) = rest.split_at(widths[1]);
                let kind = if widths[0] == 0 { 1 } else { read_be(f1) };
                let (f2, f3) = (read_be(f2), read_be(f3));
                let entry = match kind {
                    0 => XrefEntry::Free {
                        next_free: clamp_u32(f2),
                        generation: clamp_u16(f3),
                    },
                    1 => XrefEntry::InUse {
                        offset: f2,
                        generation: clamp_u16(f3),
                    },
                    2 => XrefEntry::Compressed {
                        container: clamp_u32(f2),
                        index: clamp_u32(f3),
                    },
                    // Unknown entry types are treated as null references
                    _ => continue,
                };
                let Some(number) = first.checked_add(i) else {
                    break;
                };
                section.insert(number, entry);
            }
        }
        trace!(offset, entries = section.entries.len(), "Parsed xref stream");
        Ok(section)
    }

    fn parse_table(&self, offset: u64, mut cur: Cursor<'a>) -> Result<XrefSection, StructureError> {
        let mut pending = Vec::new();
        let mut subsections = 0;
        loop {
            cur.skip_ws_and_comments();
            if cur.consume_word(b"trailer") {
                break;
            }
            let at = cur.pos;
            let first = cur.read_unsigned();
            cur.skip_whitespace();
            let count = cur.read_unsigned();
            let (Some(first), Some(count)) = (first, count) else {
                return Err(StructureError::InvalidXref(format!(
                    "expected subsection header or trailer at offset {}",
                    at
                )));
            };
            // Every entry needs at least five bytes (`0 0 n`)
            if count > (self.bytes.len() - cur.pos) as u64 / 5 + 1 {
                return Err(StructureError::InvalidXref(format!(
                    "subsection at {} claims {} entries, more than the buffer holds",
                    at, count
                )));
            }
            subsections += 1;
            for i in 0..count {
                cur.skip_whitespace();
                let entry_at = cur.pos;
                let field1 = cur.read_unsigned();
                cur.skip_whitespace();
                let field2 = cur.read_unsigned();
                cur.skip_whitespace();
                let marker = cur.consume();
                let number = first
                    .checked_add(i)
                    .and_then(|n| u32::try_from(n).ok())
                    .ok_or_else(|| StructureError::InvalidXref(format!("object number overflow at {}", entry_at)))?;
                let entry = match (field1, field2, marker) {
                    (Some(off), Some(generation), Some(b'n')) => XrefEntry::InUse {
                        offset: off,
                        generation: clamp_u16(generation),
                    },
                    (Some(next), Some(generation), Some(b'f')) => XrefEntry::Free {
                        next_free: clamp_u32(next),
                        generation: clamp_u16(generation),
                    },
                    _ => {
                        return Err(StructureError::InvalidXref(format!(
                            "malformed entry for object {} at offset {}",
                            number, entry_at
                        )))
                    }
                };
                pending.push((number, entry));
            }
        }

        cur.skip_ws_and_comments();
        let (trailer, _) = self
            .parser
            .parse_value_at(cur.pos)
            .map_err(|e| StructureError::InvalidTrailer(e.to_string()))?;
        let ObjectValue::Dictionary(trailer) = trailer else {
            return Err(StructureError::InvalidTrailer(format!(
                "trailer at {} is a {}, not a dictionary",
                cur.pos,
                trailer.type_label()
            )));
        };

        let mut section = XrefSection::new(offset, XrefKind::Table, trailer);
        section.statistics.subsections = subsections;
        for (number, entry) in pending {
            section.insert(number, entry);
        }
        if section.xref_stm.is_some() {
            section.kind = XrefKind::Hybrid;
        }
        trace!(offset, entries = section.entries.len(), "Parsed xref table");
        Ok(section)
    }
}

fn field_widths(dict: &Dictionary) -> Result<[usize; 3], StructureError> {
    let invalid = || StructureError::InvalidXref("xref stream /W must hold three small integers".into());
    let items = dict.get(b"W").and_then(ObjectValue::as_array).ok_or_else(invalid)?;
    if items.len() != 3 {
        return Err(invalid());
    }
    let mut widths = [0usize; 3];
    for (slot, item) in widths.iter_mut().zip(items) {
        *slot = item
            .as_integer()
            .and_then(|n| usize::try_from(n).ok())
            .filter(|n| *n <= 8)
            .ok_or_else(invalid)?;
    }
    if widths[1] == 0 {
        return Err(invalid());
    }
    Ok(widths)
}

fn index_ranges(dict: &Dictionary, size: u32) -> Result<Vec<(u32, u32)>, StructureError> {
    let Some(items) = dict.get(b"Index").and_then(ObjectValue::as_array) else {
        return Ok(vec![(0, size)]);
    };
    if items.len() % 2 != 0 {
        return Err(StructureError::InvalidXref("xref stream /Index has odd length".into()));
    }
    items
        .chunks(2)
        .map(|pair| {
            let first = pair[0].as_integer().and_then(|n| u32::try_from(n).ok());
            let count = pair[1].as_integer().and_then(|n| u32::try_from(n).ok());
            first
                .zip(count)
                .ok_or_else(|| StructureError::InvalidXref("xref stream /Index holds a non-integer".into()))
        })
        .collect()
}

fn read_be(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0u64, |acc, b| (acc << 8) | u64::from(*b))
}

fn clamp_u32(v: u64) -> u32 {
    u32::try_from(v).unwrap_or(u32::MAX)
}

fn clamp_u16(v: u64) -> u16 {
    u16::try_from(v).unwrap_or(u16::MAX)
}
