//! Object stream (`/Type /ObjStm`) decoding
//! Author: kartik4091

use tracing::{debug, trace};

use crate::error::{ParseError, StructureError};
use crate::scanner::lexer::Cursor;
use crate::structure::parser::PdfParser;
use crate::structure::stream_processor::StreamProcessor;
use crate::types::{ObjectId, ObjectValue, Stream};

/// One member of a decoded object stream
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectStreamMember {
    pub id: ObjectId,
    pub value: Result<ObjectValue, ParseError>,
}

/// Decoded object stream; members are stored in header order so an xref
/// `Compressed { index }` entry addresses them directly
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectStream {
    pub container: ObjectId,
    pub members: Vec<ObjectStreamMember>,
}

impl ObjectStream {
    /// Decodes `payload` (the container's data after any decryption) and
    /// parses every member it declares
    pub fn parse(
        container: ObjectId,
        stream: &Stream,
        payload: &[u8],
        processor: &StreamProcessor,
        max_depth: usize,
    ) -> Result<Self, StructureError> {
        if !stream.dict.has_type(b"ObjStm") {
            return Err(StructureError::InvalidObjectStream(format!(
                "{} is not an object stream",
                container
            )));
        }
        let count = stream
            .dict
            .get_integer(b"N")
            .and_then(|n| usize::try_from(n).ok())
            .ok_or_else(|| StructureError::InvalidObjectStream(format!("{} has no valid /N", container)))?;
        let first = stream
            .dict
            .get_integer(b"First")
            .and_then(|n| usize::try_from(n).ok())
            .ok_or_else(|| StructureError::InvalidObjectStream(format!("{} has no valid /First", container)))?;

        let data = processor.decode(stream, payload)?;
        if first > data.len() {
            return Err(StructureError::InvalidObjectStream(format!(
                "{} declares /First {} past its {} decoded bytes",
                container,
                first,
                data.len()
            )));
        }

        // Each header pair takes at least four bytes
        if count > first / 4 + 1 {
            return Err(StructureError::InvalidObjectStream(format!(
                "{} declares {} members but its header holds {} bytes",
                container, count, first
            )));
        }

        let mut cur = Cursor::new(&data[..first]);
        let mut header = Vec::with_capacity(count);
        for _ in 0..count {
            cur.skip_ws_and_comments();
            let number = cur.read_unsigned().and_then(|n| u32::try_from(n).ok());
            cur.skip_ws_and_comments();
            let offset = cur.read_unsigned().and_then(|n| usize::try_from(n).ok());
            match (number, offset) {
                (Some(number), Some(offset)) => header.push((number, offset)),
                _ => {
                    debug!(container = %container, parsed = header.len(), "Object stream header ends early");
                    break;
                }
            }
        }

        let parser = PdfParser::new(&data).with_max_depth(max_depth);
        let members = header
            .iter()
            .enumerate()
            .map(|(i, &(number, offset))| {
                let start = first.saturating_add(offset);
                let end = header
                    .get(i + 1)
                    .map_or(data.len(), |&(_, next)| first.saturating_add(next))
                    .min(data.len());
                let value = if start >= end {
                    Err(ParseError::Truncated { offset: start })
                } else {
                    parser.parse_range(start..end)
                };
                ObjectStreamMember {
                    id: ObjectId::new(number, 0),
                    value,
                }
            })
            .collect::<Vec<_>>();
        trace!(container = %container, members = members.len(), "Decoded object stream");

        Ok(Self { container, members })
    }

    pub fn member(&self, index: u32) -> Option<&ObjectStreamMember> {
        self.members.get(index as usize)
    }
}
