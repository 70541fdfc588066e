//! Linearization detection
//! Author: kartik4091

use serde::Serialize;
use tracing::debug;

use crate::scanner::{ByteScanner, TokenKind};
use crate::structure::parser::PdfParser;
use crate::types::{Dictionary, ObjectId};

/// A linearization dictionary must start within this many bytes of the header
const LINEARIZATION_WINDOW: usize = 1024;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LinearizationInfo {
    pub object: ObjectId,
    /// `/L`, the file length recorded when the file was linearized
    pub declared_length: Option<i64>,
    pub first_page_object: Option<i64>,
    pub page_count: Option<i64>,
    /// First entry of `/H`, the primary hint stream offset
    pub hint_stream_offset: Option<i64>,
    /// `/L` equals the analyzed buffer length; an incremental update
    /// appended after linearization breaks this
    pub length_matches: bool,
}

pub struct LinearizationHandler;

impl LinearizationHandler {
    /// Looks at the first object after the header for a `/Linearized` dictionary
    pub fn detect(scanner: &ByteScanner<'_>, parser: &PdfParser<'_>, header_offset: usize) -> Option<LinearizationInfo> {
        let first_object = scanner
            .tokens(header_offset)
            .take_while(|token| token.offset <= header_offset + LINEARIZATION_WINDOW)
            .find(|token| matches!(token.kind, TokenKind::ObjectHeader { .. }))?;
        let object = parser.parse_indirect_at(first_object.offset, &|_| None).ok()?;
        let dict = object.value.as_dictionary()?;
        if !dict.has(b"Linearized") {
            return None;
        }
        let info = Self::parse_linearization_dict(object.id, dict, scanner.bytes().len());
        debug!(object = %info.object, length_matches = info.length_matches, "Linearized document");
        Some(info)
    }

    pub fn parse_linearization_dict(object: ObjectId, dict: &Dictionary, len: usize) -> LinearizationInfo {
        let declared_length = dict.get_integer(b"L");
        LinearizationInfo {
            object,
            declared_length,
            first_page_object: dict.get_integer(b"O"),
            page_count: dict.get_integer(b"N"),
            hint_stream_offset: dict
                .get(b"H")
                .and_then(|h| h.as_array())
                .and_then(|h| h.first())
                .and_then(|first| first.as_integer()),
            length_matches: declared_length == i64::try_from(len).ok(),
        }
    }
}
