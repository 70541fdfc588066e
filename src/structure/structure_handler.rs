//! Structure graph construction
//! Author: kartik4091
//!
//! Turns the recovered revisions into a [`DocumentGraph`]: per revision the
//! visible entry for every object number, one parsed definition per
//! location, reachability from the trailer and every dangling reference.

use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use memchr::memmem;
use tracing::{debug, info, instrument, warn};

use crate::config::AnalysisConfig;
use crate::error::{Error, ParseError, Result, StructureError};
use crate::hash_utils::sha256_hex;
use crate::scanner::lexer::is_whitespace;
use crate::scanner::{ByteScanner, TokenKind};
use crate::structure::cross_ref::{XrefEntry, XrefSectionParser};
use crate::structure::cross_ref_handler::{CrossRefHandler, Revision};
use crate::structure::decryption::Decryption;
use crate::structure::graph::{
    DanglingKind, DanglingReference, Definition, DefinitionLocation, DefinitionStatus, DocumentFacts,
    DocumentGraph, DocumentInfo, HistoryEvent, ObjectHistory, PhysicalObject, RevisionView, VisibleEntry,
};
use crate::structure::linearization::{LinearizationHandler, LinearizationInfo};
use crate::structure::object_stream::ObjectStream;
use crate::structure::parser::PdfParser;
use crate::structure::progress::{AnalysisStage, AnalysisWarning};
use crate::structure::stream_processor::StreamProcessor;
use crate::types::{ObjectId, ObjectValue};
use crate::utils::metadata_utils::get_metadata_string;

/// Counts describing the final state of a built graph
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct StructureMetrics {
    pub total_objects: usize,
    pub reachable_objects: usize,
    pub unreachable_objects: usize,
    pub dangling_references: usize,
    pub stream_objects: usize,
    pub compressed_objects: usize,
    pub unparseable_definitions: usize,
}

pub struct StructureHandler {
    config: AnalysisConfig,
}

impl StructureHandler {
    pub fn new(config: AnalysisConfig) -> Self {
        Self { config }
    }

    /// Builds the graph for `bytes`. Only an empty buffer or a missing
    /// `%PDF-` header is an error; everything else degrades into faults and
    /// warnings.
    #[instrument(skip_all, fields(len = bytes.len()))]
    pub fn build(&self, bytes: &[u8], decryption: Decryption<'_>) -> Result<(DocumentGraph, Vec<AnalysisWarning>)> {
        if bytes.is_empty() {
            return Err(Error::EmptyInput);
        }
        let scanner = ByteScanner::new(bytes).with_lookahead(self.config.scan_lookahead);
        let (header_offset, version) = scanner
            .locate_header()
            .ok_or_else(|| StructureError::InvalidHeader("no %PDF- marker in buffer".into()))?;

        let parser = PdfParser::new(bytes).with_max_depth(self.config.max_parse_depth);
        let processor = StreamProcessor::new(self.config.max_decoded_stream_size);
        let sections = XrefSectionParser::new(bytes, parser, processor);
        let chain = CrossRefHandler::new()
            .with_max_hops(self.config.effective_hop_limit(bytes.len()))
            .with_header_offset(header_offset)
            .reconstruct(&scanner, &sections);

        let linearization = LinearizationHandler::detect(&scanner, &parser, header_offset);
        let encrypted = chain
            .revisions
            .iter()
            .any(|revision| revision.trailer.has(b"Encrypt"));

        // Ciphertext is never parsed as if it were plain
        let guarded = encrypted && matches!(decryption, Decryption::NotRequired);
        let decryption = if guarded {
            warn!(
                security = true,
                domain = "pdf.encryption",
                "Encrypted document analyzed without a decryptor; treating it as undecryptable"
            );
            Decryption::Unavailable
        } else {
            decryption
        };

        let mut builder = GraphBuilder {
            bytes,
            parser,
            processor,
            decryption,
            encrypted,
            header_offset,
            max_depth: self.config.max_parse_depth,
            definitions: Vec::new(),
            index: HashMap::new(),
            object_streams: HashMap::new(),
            unresolved_compressed: BTreeSet::new(),
            warnings: Vec::new(),
        };
        if guarded {
            builder.warnings.push(AnalysisWarning::new(
                AnalysisStage::Setup,
                "document is encrypted but no decryptor was supplied; encrypted content is left unresolved",
            ));
        }

        let mut histories: BTreeMap<u32, ObjectHistory> = BTreeMap::new();
        let mut visible: BTreeMap<u32, VisibleEntry> = BTreeMap::new();
        for revision in &chain.revisions {
            for (&number, &entry) in &revision.entries {
                visible.insert(
                    number,
                    VisibleEntry {
                        entry,
                        revision: revision.index,
                        definition: None,
                    },
                );
            }
            for (&number, &entry) in &revision.entries {
                let definition = builder.define(number, entry, &visible);
                if let Some(slot) = visible.get_mut(&number) {
                    slot.definition = definition;
                }
                histories
                    .entry(number)
                    .or_insert_with(|| ObjectHistory {
                        number,
                        events: Vec::new(),
                    })
                    .events
                    .push(HistoryEvent {
                        revision: revision.index,
                        entry,
                        definition,
                    });
            }
        }
        let structural = builder.structural_objects(&chain.revisions, &visible, linearization.as_ref());
        let xmp_packet = chain
            .revisions
            .last()
            .and_then(|revision| builder.xmp_packet(&visible, revision.root()?));
        let views = builder.views(
            &chain.revisions,
            &histories,
            visible,
            linearization.as_ref(),
            self.config.max_view_work,
        );

        let physical_objects = scanner
            .scan_object_headers()
            .into_iter()
            .filter_map(|token| match token.kind {
                TokenKind::ObjectHeader { number, generation } => Some(PhysicalObject {
                    id: ObjectId::new(number, generation),
                    offset: token.offset,
                }),
                _ => None,
            })
            .collect();

        let decryption_unavailable = encrypted && builder.decryption.is_unavailable();
        if decryption_unavailable {
            warn!(security = true, domain = "pdf.encryption", "Encrypted document without a decryptor");
        }

        let mut graph = DocumentGraph {
            revisions: chain.revisions,
            views,
            definitions: Vec::new(),
            histories,
            physical_objects,
            structural,
            chain_faults: chain.faults,
            facts: DocumentFacts {
                version,
                header_offset,
                file_size: bytes.len(),
                eof_markers: scanner.count_eof_markers(),
                trailing_bytes: trailing_bytes(bytes, scanner.last_eof_end()),
                linearization,
                encrypted,
                sha256: sha256_hex(bytes),
                ..DocumentFacts::default()
            },
            xmp_packet,
            decryption_unavailable,
            unresolved_compressed: BTreeSet::new(),
        };

        graph.definitions = std::mem::take(&mut builder.definitions);
        graph.unresolved_compressed = std::mem::take(&mut builder.unresolved_compressed);
        fill_final_facts(&mut graph);

        info!(
            revisions = graph.revisions.len(),
            definitions = graph.definitions.len(),
            faults = graph.chain_faults.len(),
            "Built document graph"
        );
        Ok((graph, builder.warnings))
    }

    /// Counts over the final view
    pub fn metrics(graph: &DocumentGraph) -> StructureMetrics {
        let Some(view) = graph.final_view() else {
            return StructureMetrics::default();
        };
        let mut metrics = StructureMetrics {
            dangling_references: view.dangling.len(),
            unparseable_definitions: graph.definitions.iter().filter(|d| d.is_unparseable()).count(),
            ..StructureMetrics::default()
        };
        for (id, visible) in graph.in_use(view) {
            metrics.total_objects += 1;
            if view.is_reachable(id) {
                metrics.reachable_objects += 1;
            } else {
                metrics.unreachable_objects += 1;
            }
            if matches!(visible.entry, XrefEntry::Compressed { .. }) {
                metrics.compressed_objects += 1;
            }
            if matches!(graph.resolve(view, id), Some(ObjectValue::Stream(_))) {
                metrics.stream_objects += 1;
            }
        }
        metrics
    }
}

impl Default for StructureHandler {
    fn default() -> Self {
        Self::new(AnalysisConfig::default())
    }
}

struct GraphBuilder<'b> {
    bytes: &'b [u8],
    parser: PdfParser<'b>,
    processor: StreamProcessor,
    decryption: Decryption<'b>,
    encrypted: bool,
    header_offset: usize,
    max_depth: usize,
    definitions: Vec<Definition>,
    index: HashMap<(u32, DefinitionLocation), usize>,
    /// Keyed by the container's definition index
    object_streams: HashMap<usize, std::result::Result<ObjectStream, String>>,
    unresolved_compressed: BTreeSet<ObjectId>,
    warnings: Vec<AnalysisWarning>,
}

impl<'b> GraphBuilder<'b> {
    /// Definition behind `entry`, parsed the first time its location is seen
    fn define(&mut self, number: u32, entry: XrefEntry, visible: &BTreeMap<u32, VisibleEntry>) -> Option<usize> {
        let location = match entry {
            XrefEntry::Free { .. } => return None,
            XrefEntry::InUse { offset, .. } => DefinitionLocation::Offset(offset),
            XrefEntry::Compressed { container, index } => DefinitionLocation::Compressed { container, index },
        };
        if let Some(&idx) = self.index.get(&(number, location)) {
            return Some(idx);
        }
        let definition = match entry {
            XrefEntry::InUse { offset, generation } => self.parse_at_offset(number, generation, offset, visible),
            _ => self.parse_compressed(number, location, visible),
        };
        if let DefinitionStatus::Unparseable(e) = &definition.status {
            debug!(object = %definition.id, error = %e, "Unparseable definition");
        }
        let idx = self.definitions.len();
        self.definitions.push(definition);
        self.index.insert((number, location), idx);
        Some(idx)
    }

    fn parse_at_offset(
        &self,
        number: u32,
        generation: u16,
        offset: u64,
        visible: &BTreeMap<u32, VisibleEntry>,
    ) -> Definition {
        let id = ObjectId::new(number, generation);
        let location = DefinitionLocation::Offset(offset);
        let Some(start) = usize::try_from(offset).ok().filter(|o| *o < self.bytes.len()) else {
            return Definition {
                id,
                location,
                span: None,
                status: DefinitionStatus::Unresolved(format!("offset {} is outside the buffer", offset)),
                missing_endobj: false,
            };
        };

        let length_of = |target: ObjectId| self.lookup_length(target, visible);
        let mut parsed = self.parser.parse_indirect_at(start, &length_of);
        if self.header_offset > 0 && !matches!(&parsed, Ok(obj) if obj.id.number == number) {
            let shifted = self.parser.parse_indirect_at(start + self.header_offset, &length_of);
            if matches!(&shifted, Ok(obj) if obj.id.number == number) {
                parsed = shifted;
            }
        }

        match parsed {
            Ok(object) if object.id.number == number => Definition {
                id,
                location,
                span: Some(object.span),
                status: DefinitionStatus::Parsed(object.value),
                missing_endobj: object.missing_endobj,
            },
            Ok(object) => Definition {
                id,
                location,
                span: Some(object.span),
                status: DefinitionStatus::Unparseable(ParseError::HeaderMismatch {
                    offset: start,
                    detail: format!("entry for object {} points at {}", number, object.id),
                }),
                missing_endobj: object.missing_endobj,
            },
            Err(e) => Definition {
                id,
                location,
                span: Some(start..self.raw_end(start)),
                status: DefinitionStatus::Unparseable(e),
                missing_endobj: true,
            },
        }
    }

    /// End of the raw region kept for an unparseable definition
    fn raw_end(&self, start: usize) -> usize {
        memmem::find(&self.bytes[start..], b"endobj")
            .map(|rel| start + rel + b"endobj".len())
            .unwrap_or(self.bytes.len())
    }

    fn lookup_length(&self, target: ObjectId, visible: &BTreeMap<u32, VisibleEntry>) -> Option<i64> {
        let XrefEntry::InUse { offset, .. } = visible.get(&target.number)?.entry else {
            return None;
        };
        let object = self
            .parser
            .parse_indirect_at(usize::try_from(offset).ok()?, &|_| None)
            .ok()?;
        if object.id.number != target.number {
            return None;
        }
        object.value.as_integer()
    }

    fn parse_compressed(
        &mut self,
        number: u32,
        location: DefinitionLocation,
        visible: &BTreeMap<u32, VisibleEntry>,
    ) -> Definition {
        let id = ObjectId::new(number, 0);
        let unresolved = |reason: String| Definition {
            id,
            location,
            span: None,
            status: DefinitionStatus::Unresolved(reason),
            missing_endobj: false,
        };
        let DefinitionLocation::Compressed { container, index } = location else {
            return unresolved("not a compressed entry".to_string());
        };

        let container_entry = match visible.get(&container) {
            Some(slot) if matches!(slot.entry, XrefEntry::InUse { .. }) => slot.entry,
            Some(_) => return unresolved(format!("container {} is not stored at a file offset", container)),
            None => return unresolved(format!("container {} has no xref entry", container)),
        };
        if self.encrypted && self.decryption.is_unavailable() {
            self.unresolved_compressed.insert(id);
            return unresolved(format!("object stream {} is encrypted", container));
        }
        let Some(container_idx) = self.define(container, container_entry, visible) else {
            return unresolved(format!("container {} has no definition", container));
        };
        let span = self.definitions.get(container_idx).and_then(|d| d.span.clone());

        let member = match self.object_stream(container_idx) {
            Ok(stream) => stream.member(index).cloned(),
            Err(reason) => return unresolved(reason),
        };
        let Some(member) = member else {
            return unresolved(format!("object stream {} has no member {}", container, index));
        };
        let status = if member.id.number != number {
            DefinitionStatus::Unparseable(ParseError::HeaderMismatch {
                offset: 0,
                detail: format!(
                    "member {} of object stream {} holds object {}, not {}",
                    index, container, member.id.number, number
                ),
            })
        } else {
            match member.value {
                Ok(value) => DefinitionStatus::Parsed(value),
                Err(e) => DefinitionStatus::Unparseable(e),
            }
        };
        Definition {
            id,
            location,
            span,
            status,
            missing_endobj: false,
        }
    }

    fn object_stream(&mut self, container_idx: usize) -> std::result::Result<&ObjectStream, String> {
        if !self.object_streams.contains_key(&container_idx) {
            let decoded = self.decode_object_stream(container_idx);
            if let Err(reason) = &decoded {
                warn!(reason = %reason, "Object stream could not be decoded");
                self.warnings.push(AnalysisWarning::new(AnalysisStage::Streams, reason.clone()));
            }
            self.object_streams.insert(container_idx, decoded);
        }
        match self.object_streams.get(&container_idx) {
            Some(Ok(stream)) => Ok(stream),
            Some(Err(reason)) => Err(reason.clone()),
            None => Err("object stream cache miss".to_string()),
        }
    }

    fn decode_object_stream(&self, container_idx: usize) -> std::result::Result<ObjectStream, String> {
        let definition = self
            .definitions
            .get(container_idx)
            .ok_or_else(|| "unknown container definition".to_string())?;
        let Some(ObjectValue::Stream(stream)) = definition.value() else {
            return Err(format!("container {} is not a parsed stream", definition.id));
        };
        let payload = self.stream_payload(definition.id, &stream.data)?;
        ObjectStream::parse(definition.id, stream, &payload, &self.processor, self.max_depth)
            .map_err(|e| format!("object stream {}: {}", definition.id, e))
    }

    fn stream_payload<'d>(&self, id: ObjectId, data: &'d [u8]) -> std::result::Result<Cow<'d, [u8]>, String> {
        match self.decryption {
            Decryption::Decryptor(decryptor) if self.encrypted => decryptor
                .decrypt_stream(id, data)
                .map(Cow::Owned)
                .map_err(|e| format!("decrypting {}: {}", id, e)),
            Decryption::Unavailable if self.encrypted => Err(format!("stream {} is encrypted", id)),
            _ => Ok(Cow::Borrowed(data)),
        }
    }

    fn value_of(&self, visible: &BTreeMap<u32, VisibleEntry>, id: ObjectId) -> Option<&ObjectValue> {
        let slot = visible.get(&id.number)?;
        if !slot.entry.is_in_use() || slot.entry.generation() != id.generation {
            return None;
        }
        self.definitions.get(slot.definition?)?.value()
    }

    /// Views newest first. The final view is always walked. Each earlier
    /// view is derived by undoing the next revision's own entries; when
    /// those entries touch nothing the next view reached or referenced and
    /// the trailer seeds match, the next view's sets are shared. Every other
    /// walk is charged against `budget` node visits.
    fn views(
        &mut self,
        revisions: &[Revision],
        histories: &BTreeMap<u32, ObjectHistory>,
        mut visible: BTreeMap<u32, VisibleEntry>,
        linearization: Option<&LinearizationInfo>,
        budget: usize,
    ) -> Vec<RevisionView> {
        let Some(last) = revisions.last() else {
            return Vec::new();
        };
        let mut remaining = budget;
        let mut views = Vec::with_capacity(revisions.len());

        let seeds = self.seeds(last, linearization);
        let (reachable, dangling, _) = self
            .traverse(&visible, seeds.iter().flatten().copied(), usize::MAX)
            .unwrap_or_default();
        let mut next = Walked::new(seeds, reachable, dangling);
        views.push(next.view(last));

        let mut exhausted_at = None;
        for index in (0..revisions.len() - 1).rev() {
            let revision = &revisions[index];
            let undone = &revisions[index + 1].entries;
            for &number in undone.keys() {
                let previous = histories.get(&number).and_then(|history| {
                    let at = history.events.partition_point(|event| event.revision <= index);
                    history.events.get(at.checked_sub(1)?)
                });
                match previous {
                    Some(event) => {
                        visible.insert(
                            number,
                            VisibleEntry {
                                entry: event.entry,
                                revision: event.revision,
                                definition: event.definition,
                            },
                        );
                    }
                    None => {
                        visible.remove(&number);
                    }
                }
            }

            let seeds = self.seeds(revision, linearization);
            if next.resolved && next.seeds == seeds && !undone.keys().any(|number| next.touches(*number)) {
                views.push(next.view(revision));
                continue;
            }
            let walked = if remaining > 0 {
                self.traverse(&visible, seeds.iter().flatten().copied(), remaining)
            } else {
                None
            };
            next = match walked {
                Some((reachable, dangling, visits)) => {
                    remaining = remaining.saturating_sub(visits);
                    Walked::new(seeds, reachable, dangling)
                }
                None => {
                    remaining = 0;
                    exhausted_at.get_or_insert(index);
                    Walked::unresolved(seeds)
                }
            };
            views.push(next.view(revision));
        }
        views.reverse();

        if let Some(index) = exhausted_at {
            warn!(
                security = true,
                domain = "pdf.revisions",
                budget,
                unresolved = index + 1,
                "Reachability budget exhausted"
            );
            self.warnings.push(AnalysisWarning::new(
                AnalysisStage::References,
                format!(
                    "reachability of revisions 0..={} was not computed: budget of {} node visits exhausted",
                    index, budget
                ),
            ));
        }
        debug!(views = views.len(), remaining, "Resolved revision views");
        views
    }

    /// Trailer references a revision is walked from
    fn seeds(&mut self, revision: &Revision, linearization: Option<&LinearizationInfo>) -> [Option<ObjectId>; 4] {
        let root = revision.root();
        if root.is_none() {
            self.warnings.push(AnalysisWarning::new(
                AnalysisStage::References,
                format!("revision {} has no /Root reference in its trailer", revision.index),
            ));
        }
        [
            root,
            revision.info(),
            revision.trailer.get_reference(b"Encrypt"),
            linearization.map(|l| l.object),
        ]
    }

    /// Depth-first walk with an explicit visited set; reference cycles are
    /// legal in PDF. Gives up with `None` after `limit` node visits.
    fn traverse(
        &self,
        visible: &BTreeMap<u32, VisibleEntry>,
        seeds: impl Iterator<Item = ObjectId>,
        limit: usize,
    ) -> Option<(BTreeSet<ObjectId>, BTreeSet<DanglingReference>, usize)> {
        let mut reachable = BTreeSet::new();
        let mut dangling = BTreeSet::new();
        let mut visited = HashSet::new();
        let mut stack: Vec<(Option<ObjectId>, ObjectId)> = seeds.map(|id| (None, id)).collect();
        stack.reverse();
        let mut visits = 0usize;

        while let Some((from, target)) = stack.pop() {
            visits += 1;
            if visits > limit {
                return None;
            }
            let kind = match visible.get(&target.number) {
                None => Some(DanglingKind::Missing),
                Some(slot) if !slot.entry.is_in_use() => Some(DanglingKind::Freed),
                Some(slot) if slot.entry.generation() != target.generation => Some(DanglingKind::GenerationMismatch {
                    found: slot.entry.generation(),
                }),
                Some(_) => None,
            };
            if let Some(kind) = kind {
                dangling.insert(DanglingReference { from, target, kind });
                continue;
            }
            if !visited.insert(target) {
                continue;
            }
            reachable.insert(target);
            if let Some(value) = self.value_of(visible, target) {
                let mut children = value.references();
                children.reverse();
                stack.extend(children.into_iter().map(|child| (Some(target), child)));
            }
        }
        Some((reachable, dangling, visits))
    }

    fn structural_objects(
        &self,
        revisions: &[Revision],
        visible: &BTreeMap<u32, VisibleEntry>,
        linearization: Option<&LinearizationInfo>,
    ) -> BTreeSet<ObjectId> {
        let mut structural: BTreeSet<ObjectId> = revisions.iter().filter_map(|r| r.xref_stream).collect();
        for definition in &self.definitions {
            if let Some(ObjectValue::Stream(stream)) = definition.value() {
                if stream.dict.has_type(b"XRef") || stream.dict.has_type(b"ObjStm") {
                    structural.insert(definition.id);
                }
            }
        }
        for revision in revisions {
            for entry in revision.entries.values() {
                if let XrefEntry::Compressed { container, .. } = entry {
                    let generation = visible.get(container).map_or(0, |slot| slot.entry.generation());
                    structural.insert(ObjectId::new(*container, generation));
                }
            }
        }
        if let Some(linearization) = linearization {
            structural.insert(linearization.object);
            let hint = linearization.hint_stream_offset.and_then(|h| u64::try_from(h).ok());
            if let Some(hint) = hint {
                for (number, slot) in visible {
                    if *number != 0 && matches!(slot.entry, XrefEntry::InUse { offset, .. } if offset == hint) {
                        structural.insert(slot.object_id(*number));
                    }
                }
            }
        }
        structural
    }

    /// Text of the XMP packet the final catalog points at
    fn xmp_packet(&self, visible: &BTreeMap<u32, VisibleEntry>, root: ObjectId) -> Option<String> {
        let catalog = self.value_of(visible, root)?.as_dictionary()?;
        let metadata_id = catalog.get_reference(b"Metadata")?;
        let ObjectValue::Stream(stream) = self.value_of(visible, metadata_id)? else {
            return None;
        };
        let payload = self.stream_payload(metadata_id, &stream.data).ok()?;
        let decoded = if stream.filters().is_empty() {
            payload.into_owned()
        } else {
            self.processor.decode(stream, &payload).ok()?
        };
        Some(String::from_utf8_lossy(&decoded).into_owned())
    }
}

/// Reachability of one revision, kept while deriving the revision before it
struct Walked {
    seeds: [Option<ObjectId>; 4],
    reachable: Arc<BTreeSet<ObjectId>>,
    dangling: Arc<BTreeSet<DanglingReference>>,
    /// Object numbers reached or referenced
    touched: HashSet<u32>,
    resolved: bool,
}

impl Walked {
    fn new(
        seeds: [Option<ObjectId>; 4],
        reachable: BTreeSet<ObjectId>,
        dangling: BTreeSet<DanglingReference>,
    ) -> Self {
        let touched = reachable
            .iter()
            .map(|id| id.number)
            .chain(dangling.iter().map(|d| d.target.number))
            .collect();
        Self {
            seeds,
            reachable: Arc::new(reachable),
            dangling: Arc::new(dangling),
            touched,
            resolved: true,
        }
    }

    fn unresolved(seeds: [Option<ObjectId>; 4]) -> Self {
        Self {
            seeds,
            reachable: Arc::default(),
            dangling: Arc::default(),
            touched: HashSet::new(),
            resolved: false,
        }
    }

    fn touches(&self, number: u32) -> bool {
        self.touched.contains(&number)
    }

    fn view(&self, revision: &Revision) -> RevisionView {
        RevisionView {
            revision: revision.index,
            root: revision.root(),
            info: revision.info(),
            reachable: Arc::clone(&self.reachable),
            dangling: Arc::clone(&self.dangling),
            resolved: self.resolved,
        }
    }
}

fn trailing_bytes(bytes: &[u8], last_eof_end: Option<usize>) -> usize {
    last_eof_end
        .and_then(|end| bytes.get(end..))
        .map_or(0, |rest| rest.iter().filter(|b| !is_whitespace(**b)).count())
}

/// Page count, JavaScript carriers and `/Info` text from the final view
fn fill_final_facts(graph: &mut DocumentGraph) {
    let Some(view) = graph.final_view() else {
        return;
    };

    let page_count = view
        .root
        .and_then(|root| graph.resolve_dict(view, root))
        .and_then(|catalog| catalog.get(b"Pages"))
        .and_then(|pages| graph.deref(view, pages))
        .and_then(ObjectValue::as_dictionary)
        .and_then(|pages| pages.get(b"Count"))
        .and_then(|count| graph.deref(view, count))
        .and_then(ObjectValue::as_integer);

    let javascript_objects = view
        .reachable
        .iter()
        .copied()
        .filter(|id| {
            graph.resolve_dict(view, *id).map_or(false, |dict| {
                dict.has(b"JS") || dict.get_name(b"S") == Some(&b"JavaScript"[..])
            })
        })
        .collect();

    let info = graph
        .info_dictionary(view)
        .map(|dict| DocumentInfo {
            title: get_metadata_string(dict, b"Title"),
            author: get_metadata_string(dict, b"Author"),
            subject: get_metadata_string(dict, b"Subject"),
            creator: get_metadata_string(dict, b"Creator"),
            producer: get_metadata_string(dict, b"Producer"),
            creation_date: get_metadata_string(dict, b"CreationDate"),
            mod_date: get_metadata_string(dict, b"ModDate"),
        })
        .unwrap_or_default();

    graph.facts.page_count = page_count;
    graph.facts.javascript_objects = javascript_objects;
    graph.facts.info = info;
}
