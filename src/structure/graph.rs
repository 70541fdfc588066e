//! Document graph: every recovered revision, its resolved view and the
//! definitions behind it
//! Author: kartik4091
//!
//! The graph is built once per analysis run by the structure handler and is
//! read-only afterwards. Detection rules only ever see `&DocumentGraph`.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::ops::Range;
use std::sync::Arc;

use serde::Serialize;

use crate::error::ParseError;
use crate::structure::cross_ref::XrefEntry;
use crate::structure::cross_ref_handler::{ChainFault, Revision};
use crate::structure::linearization::LinearizationInfo;
use crate::types::{Dictionary, ObjectId, ObjectValue};

/// Where a definition's bytes came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum DefinitionLocation {
    Offset(u64),
    Compressed { container: u32, index: u32 },
}

#[derive(Debug, Clone, PartialEq)]
pub enum DefinitionStatus {
    Parsed(ObjectValue),
    /// Bytes were found but did not parse
    Unparseable(ParseError),
    /// The bytes could not be reached at all (offset past the buffer,
    /// encrypted object stream, broken container)
    Unresolved(String),
}

/// One object body as found at one location
#[derive(Debug, Clone, PartialEq)]
pub struct Definition {
    pub id: ObjectId,
    pub location: DefinitionLocation,
    /// Raw byte range in the analyzed buffer, when the definition sits there
    pub span: Option<Range<usize>>,
    pub status: DefinitionStatus,
    pub missing_endobj: bool,
}

impl Definition {
    pub fn value(&self) -> Option<&ObjectValue> {
        match &self.status {
            DefinitionStatus::Parsed(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_unparseable(&self) -> bool {
        matches!(self.status, DefinitionStatus::Unparseable(_))
    }
}

/// The entry a revision sees for an object number, and the revision that
/// supplied it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VisibleEntry {
    pub entry: XrefEntry,
    pub revision: usize,
    /// Index into [`DocumentGraph::definitions`]
    pub definition: Option<usize>,
}

impl VisibleEntry {
    pub fn object_id(&self, number: u32) -> ObjectId {
        ObjectId::new(number, self.entry.generation())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum DanglingKind {
    /// No entry for the object number
    Missing,
    /// The visible entry is free
    Freed,
    /// The visible entry has a different generation
    GenerationMismatch { found: u16 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct DanglingReference {
    /// `None` when the reference comes straight from the trailer
    pub from: Option<ObjectId>,
    pub target: ObjectId,
    pub kind: DanglingKind,
}

/// The document as seen by one revision. Visible entries are not copied
/// per revision; they are looked up through the object histories. An update
/// that cannot change what the trailer reaches shares the reachable and
/// dangling sets of the revision after it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RevisionView {
    pub revision: usize,
    pub root: Option<ObjectId>,
    pub info: Option<ObjectId>,
    pub reachable: Arc<BTreeSet<ObjectId>>,
    pub dangling: Arc<BTreeSet<DanglingReference>>,
    /// False when the reachability budget ran out before this revision was
    /// walked; `reachable` and `dangling` are empty then
    pub resolved: bool,
}

impl RevisionView {
    pub fn is_reachable(&self, id: ObjectId) -> bool {
        self.reachable.contains(&id)
    }

    /// Both views hold the same reachability sets
    pub fn shares_sets_with(&self, other: &RevisionView) -> bool {
        Arc::ptr_eq(&self.reachable, &other.reachable) && Arc::ptr_eq(&self.dangling, &other.dangling)
    }
}

/// An entry an object number received in one revision's own section
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryEvent {
    pub revision: usize,
    pub entry: XrefEntry,
    pub definition: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectHistory {
    pub number: u32,
    pub events: Vec<HistoryEvent>,
}

/// An `N G obj` header physically present in the buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct PhysicalObject {
    pub id: ObjectId,
    pub offset: usize,
}

/// Document-level facts; only text values are kept from `/Info`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DocumentInfo {
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub creator: Option<String>,
    pub producer: Option<String>,
    pub creation_date: Option<String>,
    pub mod_date: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DocumentFacts {
    pub version: String,
    pub header_offset: usize,
    pub file_size: usize,
    pub eof_markers: usize,
    /// Non-whitespace bytes after the last `%%EOF`
    pub trailing_bytes: usize,
    pub linearization: Option<LinearizationInfo>,
    pub encrypted: bool,
    pub sha256: String,
    pub page_count: Option<i64>,
    pub javascript_objects: Vec<ObjectId>,
    pub info: DocumentInfo,
}

#[derive(Debug, Clone, Default)]
pub struct DocumentGraph {
    /// Oldest first; `revisions[i].index == i`
    pub revisions: Vec<Revision>,
    /// `views[i]` belongs to `revisions[i]`
    pub views: Vec<RevisionView>,
    pub definitions: Vec<Definition>,
    pub histories: BTreeMap<u32, ObjectHistory>,
    pub physical_objects: Vec<PhysicalObject>,
    /// Xref streams, object stream containers and linearization objects
    pub structural: BTreeSet<ObjectId>,
    pub chain_faults: Vec<ChainFault>,
    pub facts: DocumentFacts,
    /// XMP packet referenced by the final catalog's `/Metadata`
    pub xmp_packet: Option<String>,
    /// `/Encrypt` is present and the caller cannot decrypt
    pub decryption_unavailable: bool,
    /// Compressed objects left unresolved because their container is
    /// encrypted
    pub unresolved_compressed: BTreeSet<ObjectId>,
}

impl DocumentGraph {
    pub fn revision_count(&self) -> usize {
        self.revisions.len()
    }

    /// Incremental updates applied after the original document. The second
    /// xref section of a linearized file belongs to the original.
    pub fn update_count(&self) -> usize {
        let sections = self.revisions.len().saturating_sub(1);
        if self.facts.linearization.is_some() {
            sections.saturating_sub(1)
        } else {
            sections
        }
    }

    pub fn final_view(&self) -> Option<&RevisionView> {
        self.views.last()
    }

    pub fn view(&self, revision: usize) -> Option<&RevisionView> {
        self.views.get(revision)
    }

    pub fn definition(&self, index: usize) -> Option<&Definition> {
        self.definitions.get(index)
    }

    /// Entry `view` sees for object `number`: the newest history event at or
    /// before its revision
    pub fn visible_entry(&self, view: &RevisionView, number: u32) -> Option<VisibleEntry> {
        let events = &self.histories.get(&number)?.events;
        let at = events.partition_point(|event| event.revision <= view.revision);
        let event = events.get(at.checked_sub(1)?)?;
        Some(VisibleEntry {
            entry: event.entry,
            revision: event.revision,
            definition: event.definition,
        })
    }

    /// In-use entries visible in `view`, object 0 excluded
    pub fn in_use<'g>(&'g self, view: &'g RevisionView) -> impl Iterator<Item = (ObjectId, VisibleEntry)> + 'g {
        self.histories
            .keys()
            .filter(|number| **number != 0)
            .filter_map(move |number| {
                let visible = self.visible_entry(view, *number)?;
                visible.entry.is_in_use().then(|| (visible.object_id(*number), visible))
            })
    }

    /// Value `id` resolves to in `view`, if it resolves and parsed
    pub fn resolve<'g>(&'g self, view: &RevisionView, id: ObjectId) -> Option<&'g ObjectValue> {
        let visible = self.visible_entry(view, id.number)?;
        if !visible.entry.is_in_use() || visible.entry.generation() != id.generation {
            return None;
        }
        self.definitions.get(visible.definition?)?.value()
    }

    /// Follows a reference; direct values are returned as-is
    pub fn deref<'g>(&'g self, view: &RevisionView, value: &'g ObjectValue) -> Option<&'g ObjectValue> {
        match value {
            ObjectValue::Reference(id) => self.resolve(view, *id),
            other => Some(other),
        }
    }

    pub fn resolve_dict<'g>(&'g self, view: &RevisionView, id: ObjectId) -> Option<&'g Dictionary> {
        self.resolve(view, id)?.as_dictionary()
    }

    pub fn info_dictionary(&self, view: &RevisionView) -> Option<&Dictionary> {
        self.resolve_dict(view, view.info?)
    }

    /// For every object reachable in some revision before `end`, the newest
    /// such revision. Views sharing their sets with the next one are skipped,
    /// so the cost is bounded by the distinct sets actually stored.
    pub fn last_reachable_before(&self, end: usize) -> HashMap<ObjectId, usize> {
        let end = end.min(self.views.len());
        let mut last = HashMap::new();
        for (index, view) in self.views[..end].iter().enumerate().rev() {
            let shared = self.views.get(index + 1).map_or(false, |next| index + 1 < end && view.shares_sets_with(next));
            if shared {
                continue;
            }
            for id in view.reachable.iter() {
                last.entry(*id).or_insert(index);
            }
        }
        last
    }

    /// Revisions whose reachability was never computed
    pub fn unresolved_views(&self) -> usize {
        self.views.iter().filter(|view| !view.resolved).count()
    }

    /// In-use objects of the final view that its root cannot reach
    pub fn orphans(&self) -> Vec<(ObjectId, VisibleEntry)> {
        let Some(view) = self.final_view() else {
            return Vec::new();
        };
        self.in_use(view)
            .filter(|(id, _)| !view.is_reachable(*id) && !self.structural.contains(id))
            .collect()
    }

    /// Objects present in the body that no revision indexes at their offset
    pub fn unindexed_objects(&self) -> Vec<PhysicalObject> {
        let shift = self.facts.header_offset as u64;
        let indexed: BTreeSet<(u32, u64)> = self
            .revisions
            .iter()
            .flat_map(|revision| revision.entries.iter())
            .filter_map(|(number, entry)| match entry {
                XrefEntry::InUse { offset, .. } => Some((*number, *offset)),
                _ => None,
            })
            .collect();
        let xref_offsets: BTreeSet<u64> = self.revisions.iter().map(|r| r.xref_offset).collect();
        self.physical_objects
            .iter()
            .filter(|object| !self.structural.contains(&object.id))
            .filter(|object| {
                let offset = object.offset as u64;
                let candidates = [Some(offset), offset.checked_sub(shift).filter(|_| shift > 0)];
                !candidates.iter().flatten().any(|at| {
                    xref_offsets.contains(at) || indexed.contains(&(object.id.number, *at))
                })
            })
            .copied()
            .collect()
    }
}
