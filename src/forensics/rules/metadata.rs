//! `/Info` and XMP date consistency
//! Author: kartik4091

use chrono::{DateTime, FixedOffset};
use tracing::debug;

use crate::forensics::anomaly::{Anomaly, AnomalyKind, Severity};
use crate::forensics::detector::AnomalyRule;
use crate::structure::graph::{DocumentGraph, RevisionView};
use crate::types::ObjectId;
use crate::utils::metadata_utils::{extract_xmp_dates, get_metadata_string, parse_pdf_date, parse_xmp_date};

/// A date entry as found in one revision's `/Info`
#[derive(Debug, Clone)]
enum DateField {
    Absent,
    Unparseable(String),
    Parsed(DateTime<FixedOffset>),
}

impl DateField {
    fn parsed(&self) -> Option<DateTime<FixedOffset>> {
        match self {
            DateField::Parsed(date) => Some(*date),
            _ => None,
        }
    }
}

struct InfoDates {
    id: ObjectId,
    created: DateField,
    modified: DateField,
}

pub struct MetadataConsistencyRule {
    tolerance_secs: i64,
}

impl MetadataConsistencyRule {
    pub fn new(tolerance_secs: i64) -> Self {
        Self { tolerance_secs }
    }

    fn beyond_tolerance(&self, a: DateTime<FixedOffset>, b: DateTime<FixedOffset>) -> bool {
        (a - b).num_seconds().abs() > self.tolerance_secs
    }

    fn dates(graph: &DocumentGraph, view: &RevisionView) -> Option<InfoDates> {
        let id = view.info?;
        let dict = graph.resolve_dict(view, id)?;
        let field = |key: &[u8]| match get_metadata_string(dict, key) {
            None => DateField::Absent,
            Some(raw) => match parse_pdf_date(&raw) {
                Some(date) => DateField::Parsed(date),
                None => DateField::Unparseable(raw),
            },
        };
        Some(InfoDates {
            id,
            created: field(b"CreationDate"),
            modified: field(b"ModDate"),
        })
    }

    /// Checks on the final `/Info`
    fn check_final(&self, graph: &DocumentGraph, revision: usize, dates: &InfoDates, found: &mut Vec<Anomaly>) {
        let report = |severity: Severity, confidence: f64, rationale: String| {
            Anomaly::new(AnomalyKind::MetadataInconsistency, severity, rationale)
                .with_revision(revision)
                .with_object(dates.id)
                .with_confidence(confidence)
        };

        for (key, field) in [("CreationDate", &dates.created), ("ModDate", &dates.modified)] {
            if let DateField::Unparseable(raw) = field {
                found.push(report(Severity::Low, 0.5, format!("/{} value {:?} is not a valid PDF date", key, raw)));
            }
        }

        let updates = graph.update_count();
        match (dates.created.parsed(), &dates.modified) {
            (Some(created), DateField::Parsed(modified)) => {
                let modified = *modified;
                if modified < created {
                    found.push(report(
                        Severity::High,
                        0.9,
                        format!("/ModDate {} is earlier than /CreationDate {}", modified, created),
                    ));
                } else if updates == 0 && self.beyond_tolerance(modified, created) {
                    found.push(report(
                        Severity::Medium,
                        0.6,
                        format!(
                            "/ModDate {} is later than /CreationDate {} but the file has no incremental update",
                            modified, created
                        ),
                    ));
                } else if updates > 0 && modified == created {
                    found.push(report(
                        Severity::Medium,
                        0.7,
                        format!("/ModDate equals /CreationDate despite {} incremental update(s)", updates),
                    ));
                }
            }
            (Some(_), DateField::Absent) if updates > 0 => {
                found.push(report(
                    Severity::Medium,
                    0.6,
                    format!("/ModDate is missing despite {} incremental update(s)", updates),
                ));
            }
            _ => {}
        }

        if let Some(packet) = graph.xmp_packet.as_deref() {
            let xmp = extract_xmp_dates(packet);
            let pairs = [
                ("CreationDate", "xmp:CreateDate", dates.created.parsed(), xmp.create),
                ("ModDate", "xmp:ModifyDate", dates.modified.parsed(), xmp.modify),
            ];
            for (info_key, xmp_key, info_date, xmp_raw) in pairs {
                let (Some(info_date), Some(xmp_date)) = (info_date, xmp_raw.as_deref().and_then(parse_xmp_date))
                else {
                    continue;
                };
                if self.beyond_tolerance(info_date, xmp_date) {
                    found.push(report(
                        Severity::Medium,
                        0.75,
                        format!("/{} {} disagrees with {} {}", info_key, info_date, xmp_key, xmp_date),
                    ));
                }
            }
        }
    }
}

impl AnomalyRule for MetadataConsistencyRule {
    fn name(&self) -> &'static str {
        "metadata-consistency"
    }

    fn kinds(&self) -> &'static [AnomalyKind] {
        &[AnomalyKind::MetadataInconsistency]
    }

    fn evaluate(&self, graph: &DocumentGraph) -> Vec<Anomaly> {
        let mut found = Vec::new();
        let per_view: Vec<Option<InfoDates>> = graph.views.iter().map(|view| Self::dates(graph, view)).collect();

        // Across revisions
        let mut latest_modified: Option<(usize, DateTime<FixedOffset>)> = None;
        for (revision, dates) in per_view.iter().enumerate() {
            if revision > 0 && dates.is_none() && per_view[revision - 1].is_some() {
                found.push(
                    Anomaly::new(
                        AnomalyKind::MetadataInconsistency,
                        Severity::Medium,
                        format!("/Info present in revision {} is gone from revision {}", revision - 1, revision),
                    )
                    .with_revision(revision)
                    .with_confidence(0.7),
                );
            }
            let Some(modified) = dates.as_ref().and_then(|d| d.modified.parsed()) else {
                continue;
            };
            if let Some((earlier, previous)) = latest_modified {
                if modified < previous {
                    let mut anomaly = Anomaly::new(
                        AnomalyKind::MetadataInconsistency,
                        Severity::High,
                        format!(
                            "/ModDate goes back from {} in revision {} to {} in revision {}",
                            previous, earlier, modified, revision
                        ),
                    )
                    .with_revision(revision)
                    .with_confidence(0.85);
                    if let Some(dates) = dates {
                        anomaly = anomaly.with_object(dates.id);
                    }
                    found.push(anomaly);
                }
            }
            if latest_modified.map_or(true, |(_, previous)| modified > previous) {
                latest_modified = Some((revision, modified));
            }
        }

        if let Some(Some(dates)) = per_view.last() {
            self.check_final(graph, per_view.len() - 1, dates, &mut found);
        }
        debug!(found = found.len(), "Metadata consistency checked");
        found
    }
}
