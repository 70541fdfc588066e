//! PDF Object Parser
//! Author: kartik4091
//!
//! Converts byte ranges into typed [`ObjectValue`]s. The parser is pure: it
//! borrows the buffer, never mutates shared state, and returns the same
//! result for the same range. Stream payloads are delimited by comparing the
//! declared `/Length` with the bytes actually found before `endstream`; the
//! outcome is attached to the stream instead of trusting either value.

use std::ops::Range;

use memchr::memmem;
use tracing::trace;

use crate::error::ParseError;
use crate::scanner::lexer::{hex_val, is_regular, is_whitespace, Cursor};
use crate::types::{Dictionary, ObjectId, ObjectValue, Stream, StreamLengthCheck};

pub type ParseResult<T> = std::result::Result<T, ParseError>;

pub const DEFAULT_MAX_DEPTH: usize = 64;
const MAX_ARRAY_ELEMENTS: usize = 100_000;
const MAX_DICT_ENTRIES: usize = 10_000;

/// An `N G obj ... endobj` body parsed from the file
#[derive(Debug, Clone, PartialEq)]
pub struct IndirectObject {
    pub id: ObjectId,
    pub value: ObjectValue,
    /// From the first header byte to the end of `endobj` (or of the value
    /// when `endobj` is missing)
    pub span: Range<usize>,
    pub missing_endobj: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct PdfParser<'a> {
    bytes: &'a [u8],
    max_depth: usize,
}

impl<'a> PdfParser<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self {
            bytes,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth.max(1);
        self
    }

    /// Parses one direct value starting at `offset`. Returns the value and
    /// the offset just past it.
    pub fn parse_value_at(&self, offset: usize) -> ParseResult<(ObjectValue, usize)> {
        let mut parser = ValueParser::new(self.bytes, offset, self.max_depth);
        let value = parser.parse_object(0)?;
        Ok((value, parser.cur.pos))
    }

    /// Parses one direct value confined to `range`
    pub fn parse_range(&self, range: Range<usize>) -> ParseResult<ObjectValue> {
        let end = range.end.min(self.bytes.len());
        let mut parser = ValueParser::new(&self.bytes[..end], range.start, self.max_depth);
        parser.parse_object(0)
    }

    /// Parses an indirect object whose header starts at (or just after
    /// whitespace following) `offset`.
    ///
    /// `length_of` resolves an indirect `/Length`; returning `None` leaves
    /// the declared length unknown.
    pub fn parse_indirect_at(
        &self,
        offset: usize,
        length_of: &dyn Fn(ObjectId) -> Option<i64>,
    ) -> ParseResult<IndirectObject> {
        if offset >= self.bytes.len() {
            return Err(ParseError::Truncated { offset });
        }
        let mut parser = ValueParser::new(self.bytes, offset, self.max_depth);
        parser.cur.skip_ws_and_comments();
        let header_start = parser.cur.pos;
        let id = parser.parse_object_header()?;

        let value = parser.parse_object(0)?;
        let value = match value {
            ObjectValue::Dictionary(dict) => {
                let mark = parser.cur.mark();
                parser.cur.skip_whitespace();
                if parser.cur.consume_word(b"stream") {
                    ObjectValue::Stream(parser.parse_stream_body(dict, length_of)?)
                } else {
                    parser.cur.restore(mark);
                    ObjectValue::Dictionary(dict)
                }
            }
            other => other,
        };

        let value_end = parser.cur.pos;
        parser.cur.skip_ws_and_comments();
        let missing_endobj = !parser.cur.consume_word(b"endobj");
        let end = if missing_endobj { value_end } else { parser.cur.pos };
        trace!(object = %id, start = header_start, end, missing_endobj, "Parsed indirect object");

        Ok(IndirectObject {
            id,
            value,
            span: header_start..end,
            missing_endobj,
        })
    }
}

struct ValueParser<'a> {
    cur: Cursor<'a>,
    max_depth: usize,
}

impl<'a> ValueParser<'a> {
    fn new(bytes: &'a [u8], pos: usize, max_depth: usize) -> Self {
        Self {
            cur: Cursor::at(bytes, pos),
            max_depth,
        }
    }

    fn parse_object_header(&mut self) -> ParseResult<ObjectId> {
        let start = self.cur.pos;
        let number = self.cur.read_unsigned();
        self.cur.skip_whitespace();
        let generation = self.cur.read_unsigned();
        self.cur.skip_whitespace();
        let has_keyword = self.cur.consume_word(b"obj");
        match (number, generation, has_keyword) {
            (Some(number), Some(generation), true) => {
                let number = u32::try_from(number).map_err(|_| ParseError::HeaderMismatch {
                    offset: start,
                    detail: format!("object number {} out of range", number),
                })?;
                let generation = u16::try_from(generation).map_err(|_| ParseError::HeaderMismatch {
                    offset: start,
                    detail: format!("generation {} out of range", generation),
                })?;
                Ok(ObjectId::new(number, generation))
            }
            _ if self.cur.eof() => Err(ParseError::Truncated { offset: self.cur.pos }),
            _ => Err(ParseError::HeaderMismatch {
                offset: start,
                detail: "expected `N G obj`".to_string(),
            }),
        }
    }

    fn parse_object(&mut self, depth: usize) -> ParseResult<ObjectValue> {
        if depth >= self.max_depth {
            return Err(ParseError::DepthExceeded {
                offset: self.cur.pos,
                limit: self.max_depth,
            });
        }
        self.cur.skip_ws_and_comments();
        let start = self.cur.pos;
        let b = self.cur.peek().ok_or(ParseError::Truncated { offset: start })?;
        match b {
            b'/' => Ok(ObjectValue::Name(self.parse_name())),
            b'<' if self.cur.peek_n(1) == Some(b'<') => {
                Ok(ObjectValue::Dictionary(self.parse_dict(depth + 1)?))
            }
            b'<' => Ok(ObjectValue::String(self.parse_hex_string()?)),
            b'(' => Ok(ObjectValue::String(self.parse_literal_string()?)),
            b'[' => Ok(ObjectValue::Array(self.parse_array(depth + 1)?)),
            b'+' | b'-' | b'.' | b'0'..=b'9' => self.parse_number_or_ref(),
            _ if is_regular(b) => {
                let word = self.cur.consume_while(is_regular);
                match word {
                    b"true" => Ok(ObjectValue::Boolean(true)),
                    b"false" => Ok(ObjectValue::Boolean(false)),
                    b"null" => Ok(ObjectValue::Null),
                    other => Err(ParseError::UnexpectedToken {
                        offset: start,
                        found: String::from_utf8_lossy(other).into_owned(),
                    }),
                }
            }
            other => Err(ParseError::UnexpectedToken {
                offset: start,
                found: format!("0x{:02x}", other),
            }),
        }
    }

    fn read_number_literal(&mut self) -> ParseResult<(usize, ObjectValue)> {
        let start = self.cur.pos;
        self.cur
            .consume_while(|b| b.is_ascii_digit() || matches!(b, b'+' | b'-' | b'.'));
        // Digits glued to letters (`1e5`, `12abc`) are not PDF numbers
        self.cur.consume_while(is_regular);
        let literal = &self.cur.bytes[start..self.cur.pos];
        match parse_number(literal) {
            Some(value) => Ok((start, value)),
            None => Err(ParseError::InvalidNumber {
                offset: start,
                literal: String::from_utf8_lossy(literal).into_owned(),
            }),
        }
    }

    fn parse_number_or_ref(&mut self) -> ParseResult<ObjectValue> {
        let (_, first) = self.read_number_literal()?;
        let ObjectValue::Integer(number) = first else {
            return Ok(first);
        };
        if number < 0 {
            return Ok(first);
        }
        let after_first = self.cur.mark();
        self.cur.skip_ws_and_comments();
        if let Some(generation) = self.cur.read_unsigned() {
            if matches!(self.cur.peek(), Some(b) if !is_regular(b)) || self.cur.eof() {
                self.cur.skip_ws_and_comments();
                if self.cur.consume_word(b"R") {
                    if let (Ok(number), Ok(generation)) =
                        (u32::try_from(number), u16::try_from(generation))
                    {
                        return Ok(ObjectValue::Reference(ObjectId::new(number, generation)));
                    }
                }
            }
        }
        self.cur.restore(after_first);
        Ok(first)
    }

    fn parse_array(&mut self, depth: usize) -> ParseResult<Vec<ObjectValue>> {
        let start = self.cur.pos;
        self.cur.consume();
        let mut items = Vec::new();
        loop {
            self.cur.skip_ws_and_comments();
            match self.cur.peek() {
                Some(b']') => {
                    self.cur.consume();
                    return Ok(items);
                }
                None => return Err(ParseError::UnterminatedArray { offset: start }),
                Some(_) => {}
            }
            if items.len() >= MAX_ARRAY_ELEMENTS {
                return Err(ParseError::UnexpectedToken {
                    offset: self.cur.pos,
                    found: format!("array longer than {} elements", MAX_ARRAY_ELEMENTS),
                });
            }
            match self.parse_object(depth) {
                Ok(item) => items.push(item),
                Err(ParseError::Truncated { .. }) => {
                    return Err(ParseError::UnterminatedArray { offset: start })
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn parse_dict(&mut self, depth: usize) -> ParseResult<Dictionary> {
        let start = self.cur.pos;
        self.cur.consume_keyword(b"<<");
        let mut dict = Dictionary::new();
        loop {
            self.cur.skip_ws_and_comments();
            if self.cur.consume_keyword(b">>") {
                return Ok(dict);
            }
            match self.cur.peek() {
                None => return Err(ParseError::UnterminatedDictionary { offset: start }),
                Some(b'/') => {}
                Some(_) => {
                    let offset = self.cur.pos;
                    let found = self.cur.consume_while(is_regular);
                    return Err(ParseError::UnexpectedToken {
                        offset,
                        found: if found.is_empty() {
                            "non-name dictionary key".to_string()
                        } else {
                            String::from_utf8_lossy(found).into_owned()
                        },
                    });
                }
            }
            let key = self.parse_name();
            self.cur.skip_ws_and_comments();
            if self.cur.starts_with(b">>") {
                // Key without a value; keep the key so the gap stays visible
                dict.insert(key, ObjectValue::Null);
                continue;
            }
            let value = match self.parse_object(depth) {
                Ok(value) => value,
                Err(ParseError::Truncated { .. }) => {
                    return Err(ParseError::UnterminatedDictionary { offset: start })
                }
                Err(e) => return Err(e),
            };
            dict.insert(key, value);
            if dict.len() > MAX_DICT_ENTRIES {
                return Err(ParseError::UnexpectedToken {
                    offset: self.cur.pos,
                    found: format!("dictionary larger than {} entries", MAX_DICT_ENTRIES),
                });
            }
        }
    }

    fn parse_name(&mut self) -> Vec<u8> {
        self.cur.consume();
        let raw = self.cur.consume_while(is_regular);
        decode_name(raw)
    }

    fn parse_literal_string(&mut self) -> ParseResult<Vec<u8>> {
        let start = self.cur.pos;
        self.cur.consume();
        let mut depth = 1usize;
        let mut out = Vec::new();
        while let Some(b) = self.cur.consume() {
            match b {
                b'(' => {
                    depth += 1;
                    out.push(b);
                }
                b')' => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(out);
                    }
                    out.push(b);
                }
                b'\\' => match self.cur.consume() {
                    Some(b'n') => out.push(b'\n'),
                    Some(b'r') => out.push(b'\r'),
                    Some(b't') => out.push(b'\t'),
                    Some(b'b') => out.push(0x08),
                    Some(b'f') => out.push(0x0c),
                    Some(b'\r') => {
                        if self.cur.peek() == Some(b'\n') {
                            self.cur.consume();
                        }
                    }
                    Some(b'\n') => {}
                    Some(d @ b'0'..=b'7') => {
                        let mut value = u32::from(d - b'0');
                        for _ in 0..2 {
                            match self.cur.peek() {
                                Some(n @ b'0'..=b'7') => {
                                    value = value * 8 + u32::from(n - b'0');
                                    self.cur.consume();
                                }
                                _ => break,
                            }
                        }
                        out.push((value & 0xff) as u8);
                    }
                    Some(other) => out.push(other),
                    None => break,
                },
                _ => out.push(b),
            }
        }
        Err(ParseError::UnterminatedString { offset: start })
    }

    fn parse_hex_string(&mut self) -> ParseResult<Vec<u8>> {
        let start = self.cur.pos;
        self.cur.consume();
        let mut out = Vec::new();
        let mut high: Option<u8> = None;
        while let Some(b) = self.cur.consume() {
            if b == b'>' {
                if let Some(h) = high {
                    out.push(h << 4);
                }
                return Ok(out);
            }
            if is_whitespace(b) {
                continue;
            }
            let Some(v) = hex_val(b) else {
                return Err(ParseError::UnexpectedToken {
                    offset: self.cur.pos - 1,
                    found: format!("non-hex byte 0x{:02x} in hex string", b),
                });
            };
            match high.take() {
                Some(h) => out.push((h << 4) | v),
                None => high = Some(v),
            }
        }
        Err(ParseError::UnterminatedString { offset: start })
    }

    /// Reads the payload after the `stream` keyword and checks it against
    /// the declared length
    fn parse_stream_body(
        &mut self,
        dict: Dictionary,
        length_of: &dyn Fn(ObjectId) -> Option<i64>,
    ) -> ParseResult<Stream> {
        self.cur.consume_eol();
        let data_start = self.cur.pos;
        let bytes = self.cur.bytes;
        let declared = match dict.get(b"Length") {
            Some(ObjectValue::Integer(n)) => Some(*n),
            Some(ObjectValue::Reference(id)) => length_of(*id),
            _ => None,
        };

        let declared_fits = declared
            .and_then(|n| usize::try_from(n).ok())
            .filter(|n| data_start.checked_add(*n).map_or(false, |end| end <= bytes.len()));
        let declared_lands = declared_fits.filter(|n| {
            let mut probe = Cursor::at(bytes, data_start + n);
            probe.skip_whitespace();
            probe.starts_with(b"endstream")
        });

        let endstream_at = memmem::find(&bytes[data_start..], b"endstream").map(|rel| data_start + rel);
        let actual = endstream_at.map(|at| trim_eol(&bytes[data_start..at]));

        let (payload_end, consistent) = if let Some(n) = declared_lands {
            (data_start + n, true)
        } else if let Some(len) = actual {
            (data_start + len, false)
        } else if let Some(n) = declared_fits {
            (data_start + n, false)
        } else {
            return Err(ParseError::StreamLengthMismatch {
                offset: data_start,
                detail: format!(
                    "no endstream keyword and declared length {:?} exceeds the buffer",
                    declared
                ),
            });
        };
        let check = StreamLengthCheck {
            declared,
            actual,
            consistent,
        };

        // Position the cursor after `endstream` when it exists
        let resume = if consistent {
            let mut probe = Cursor::at(bytes, payload_end);
            probe.skip_whitespace();
            probe.consume_keyword(b"endstream");
            probe.pos
        } else {
            endstream_at.map_or(payload_end, |at| at + b"endstream".len())
        };
        self.cur.restore(resume);

        Ok(Stream {
            dict,
            data: bytes[data_start..payload_end].to_vec(),
            data_offset: data_start,
            length_check: check,
        })
    }
}

/// Length of `data` without one trailing end-of-line marker
fn trim_eol(data: &[u8]) -> usize {
    if data.ends_with(b"\r\n") {
        data.len() - 2
    } else if data.ends_with(b"\n") || data.ends_with(b"\r") {
        data.len() - 1
    } else {
        data.len()
    }
}

/// PDF numeric literal: optional sign, digits with at most one decimal
/// point, at least one digit, nothing else.
pub fn parse_number(literal: &[u8]) -> Option<ObjectValue> {
    let body = match literal.first() {
        Some(b'+') | Some(b'-') => &literal[1..],
        _ => literal,
    };
    let digits = body.iter().filter(|b| b.is_ascii_digit()).count();
    let points = body.iter().filter(|b| **b == b'.').count();
    if digits == 0 || points > 1 || digits + points != body.len() {
        return None;
    }
    let text = std::str::from_utf8(literal).ok()?;
    if points == 0 {
        match text.parse::<i64>() {
            Ok(value) => Some(ObjectValue::Integer(value)),
            Err(_) => text.parse::<f64>().ok().map(ObjectValue::Real),
        }
    } else {
        let normalized = text.strip_prefix('+').unwrap_or(text);
        normalized.parse::<f64>().ok().map(ObjectValue::Real)
    }
}

fn decode_name(raw: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(raw.len());
    let mut i = 0;
    while i < raw.len() {
        if raw[i] == b'#' && i + 2 < raw.len() {
            if let (Some(h), Some(l)) = (hex_val(raw[i + 1]), hex_val(raw[i + 2])) {
                out.push((h << 4) | l);
                i += 3;
                continue;
            }
        }
        out.push(raw[i]);
        i += 1;
    }
    out
}
