//! Cross-reference chain reconstruction
//! Author: kartik4091
//!
//! Walks `startxref` and the `/Prev` links back to the oldest readable
//! section. Each section becomes one revision. The walk is bounded by a hop
//! limit and a visited set, and every way it can stop early is recorded as a
//! [`ChainFault`] next to the revisions already recovered.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::scanner::{ByteScanner, StartXref};
use crate::structure::cross_ref::{XRefStatistics, XrefEntry, XrefKind, XrefSection, XrefSectionParser};
use crate::types::{Dictionary, ObjectId};

/// One incremental revision: an xref section plus its trailer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Revision {
    /// Zero for the original document, increasing with each update
    pub index: usize,
    pub xref_offset: u64,
    pub kind: XrefKind,
    /// Entries this section declares (after merging `/XRefStm` for hybrids)
    pub entries: BTreeMap<u32, XrefEntry>,
    #[serde(skip)]
    pub trailer: Dictionary,
    pub prev_offset: Option<u64>,
    /// Index of the revision `/Prev` points at
    pub previous: Option<usize>,
    /// Object carrying the xref stream, for stream and hybrid sections
    pub xref_stream: Option<ObjectId>,
    /// Objects where the classic table and the `/XRefStm` stream disagree
    pub hybrid_conflicts: Vec<u32>,
    pub statistics: XRefStatistics,
}

impl Revision {
    pub fn root(&self) -> Option<ObjectId> {
        self.trailer.get_reference(b"Root")
    }

    pub fn info(&self) -> Option<ObjectId> {
        self.trailer.get_reference(b"Info")
    }

    pub fn entry(&self, number: u32) -> Option<&XrefEntry> {
        self.entries.get(&number)
    }
}

/// Why the chain walk stopped before reaching a section without `/Prev`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChainFault {
    MissingStartXref,
    /// `startxref` keyword present but its value is unreadable
    StartXrefUnreadable { keyword_offset: usize },
    StartXrefOutOfRange { offset: u64, len: usize },
    PrevOutOfRange { offset: u64, from_section: u64 },
    /// `/Prev` revisits a section already read
    Cycle { offset: u64, from_section: u64 },
    MalformedSection { offset: u64, from_section: Option<u64>, reason: String },
    InvalidPrev { from_section: u64 },
    HopLimitExceeded { limit: usize },
    /// A hybrid table's `/XRefStm` stream could not be read; the classic
    /// entries are kept
    XRefStmUnreadable { offset: u64, from_section: u64, reason: String },
}

impl ChainFault {
    pub fn describe(&self) -> String {
        match self {
            ChainFault::MissingStartXref => "no startxref keyword found".to_string(),
            ChainFault::StartXrefUnreadable { keyword_offset } => {
                format!("startxref at {} is not followed by an offset", keyword_offset)
            }
            ChainFault::StartXrefOutOfRange { offset, len } => {
                format!("startxref points to {} but the buffer holds {} bytes", offset, len)
            }
            ChainFault::PrevOutOfRange { offset, from_section } => {
                format!("/Prev {} of the section at {} is outside the buffer", offset, from_section)
            }
            ChainFault::Cycle { offset, from_section } => {
                format!("/Prev of the section at {} loops back to {}", from_section, offset)
            }
            ChainFault::MalformedSection { offset, reason, .. } => {
                format!("unreadable xref section at {}: {}", offset, reason)
            }
            ChainFault::InvalidPrev { from_section } => {
                format!("section at {} has a /Prev that is not an offset", from_section)
            }
            ChainFault::HopLimitExceeded { limit } => {
                format!("stopped after {} xref sections", limit)
            }
            ChainFault::XRefStmUnreadable { offset, from_section, reason } => format!(
                "/XRefStm {} of the section at {} is unreadable: {}",
                offset, from_section, reason
            ),
        }
    }
}

/// Revisions oldest first, plus whatever stopped the walk
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct XrefChain {
    pub revisions: Vec<Revision>,
    pub faults: Vec<ChainFault>,
    pub startxref: Option<u64>,
}

impl XrefChain {
    /// Some part of the cross-reference history could not be read
    pub fn is_partial(&self) -> bool {
        !self.faults.is_empty()
    }

    pub fn latest(&self) -> Option<&Revision> {
        self.revisions.last()
    }
}

pub struct CrossRefHandler {
    max_hops: usize,
    header_offset: usize,
}

impl CrossRefHandler {
    pub fn new() -> Self {
        Self {
            max_hops: 4096,
            header_offset: 0,
        }
    }

    pub fn with_max_hops(mut self, max_hops: usize) -> Self {
        self.max_hops = max_hops.max(1);
        self
    }

    /// Offsets are retried relative to a header found past byte zero
    pub fn with_header_offset(mut self, header_offset: usize) -> Self {
        self.header_offset = header_offset;
        self
    }

    #[instrument(skip(self, scanner, sections), fields(len = scanner.bytes().len()))]
    pub fn reconstruct(&self, scanner: &ByteScanner<'_>, sections: &XrefSectionParser<'_>) -> XrefChain {
        let len = scanner.bytes().len();
        let mut chain = XrefChain::default();

        let start = match scanner.find_startxref() {
            StartXref::Found { value, .. } => value,
            StartXref::Truncated { keyword_offset } => {
                warn!(keyword_offset, "startxref has no offset");
                chain.faults.push(ChainFault::StartXrefUnreadable { keyword_offset });
                return chain;
            }
            StartXref::Missing => {
                warn!("No startxref keyword");
                chain.faults.push(ChainFault::MissingStartXref);
                return chain;
            }
        };
        chain.startxref = Some(start);

        let limit = self.max_hops;
        let mut visited = HashSet::new();
        let mut newest_first: Vec<XrefSection> = Vec::new();
        let mut next: Option<(u64, Option<u64>)> = Some((start, None));

        while let Some((offset, from)) = next.take() {
            if newest_first.len() >= limit {
                warn!(limit, "Xref chain exceeds hop limit");
                chain.faults.push(ChainFault::HopLimitExceeded { limit });
                break;
            }
            if offset >= len as u64 {
                warn!(offset, len, "Xref offset outside the buffer");
                chain.faults.push(match from {
                    None => ChainFault::StartXrefOutOfRange { offset, len },
                    Some(from_section) => ChainFault::PrevOutOfRange { offset, from_section },
                });
                break;
            }
            if !visited.insert(offset) {
                let from_section = from.unwrap_or(offset);
                warn!(offset, from_section, "Xref /Prev cycle");
                chain.faults.push(ChainFault::Cycle { offset, from_section });
                break;
            }

            let mut section = match self.read_section(sections, offset) {
                Ok(section) => section,
                Err(reason) => {
                    warn!(offset, reason = %reason, "Unreadable xref section");
                    chain.faults.push(ChainFault::MalformedSection {
                        offset,
                        from_section: from,
                        reason,
                    });
                    break;
                }
            };

            if let Some(stm) = section.xref_stm {
                match self.read_stream(sections, stm) {
                    Ok(stream) => merge_hybrid(&mut section, stream),
                    Err(reason) => {
                        warn!(offset = stm, reason = %reason, "Unreadable /XRefStm");
                        chain.faults.push(ChainFault::XRefStmUnreadable {
                            offset: stm,
                            from_section: offset,
                            reason,
                        });
                    }
                }
            }

            if section.prev_invalid {
                chain.faults.push(ChainFault::InvalidPrev { from_section: offset });
            }
            next = section.prev.map(|prev| (prev, Some(offset)));
            debug!(offset, kind = ?section.kind, entries = section.entries.len(), "Recovered xref section");
            newest_first.push(section);
        }

        chain.revisions = newest_first
            .into_iter()
            .rev()
            .enumerate()
            .map(|(index, section)| Revision {
                index,
                xref_offset: section.offset,
                kind: section.kind,
                entries: section.entries,
                trailer: section.trailer,
                prev_offset: section.prev,
                previous: index.checked_sub(1),
                xref_stream: section.stream_object,
                hybrid_conflicts: section.hybrid_conflicts,
                statistics: section.statistics,
            })
            .collect();
        info!(
            revisions = chain.revisions.len(),
            faults = chain.faults.len(),
            "Reconstructed xref chain"
        );
        chain
    }

    fn read_section(&self, sections: &XrefSectionParser<'_>, offset: u64) -> Result<XrefSection, String> {
        match sections.parse_at(offset) {
            Ok(section) => Ok(section),
            Err(first) if self.header_offset > 0 => sections
                .parse_at(offset + self.header_offset as u64)
                .map(|mut section| {
                    debug!(offset, header_offset = self.header_offset, "Xref section found relative to header");
                    section.offset = offset;
                    section
                })
                .map_err(|_| first.to_string()),
            Err(e) => Err(e.to_string()),
        }
    }

    fn read_stream(&self, sections: &XrefSectionParser<'_>, offset: u64) -> Result<XrefSection, String> {
        match sections.parse_stream(offset) {
            Ok(section) => Ok(section),
            Err(first) if self.header_offset > 0 => sections
                .parse_stream(offset + self.header_offset as u64)
                .map_err(|_| first.to_string()),
            Err(e) => Err(e.to_string()),
        }
    }
}

impl Default for CrossRefHandler {
    fn default() -> Self {
        Self::new()
    }
}

/// Folds an `/XRefStm` stream into its classic table. The stream's entry
/// wins; a clash is only recorded when the table listed the object in use at
/// a different location.
fn merge_hybrid(section: &mut XrefSection, stream: XrefSection) {
    for (number, entry) in stream.entries {
        if let Some(existing @ XrefEntry::InUse { .. }) = section.entries.get(&number) {
            if *existing != entry {
                section.hybrid_conflicts.push(number);
            }
        }
        section.entries.insert(number, entry);
    }
    section.kind = XrefKind::Hybrid;
    section.stream_object = stream.stream_object;
    section.statistics.compressed_objects += stream.statistics.compressed_objects;
}
