//! Byte Scanner
//! Author: kartik4091
//!
//! Locates PDF structural markers inside a raw buffer without assuming the
//! file is well formed. Matching is forward-only over a borrowed slice: every
//! candidate position is examined through a bounded lookahead window, nothing
//! is allocated while scanning and running off the end of the buffer in the
//! middle of a marker is reported as truncation instead of panicking.

pub mod lexer;

use memchr::memmem;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use self::lexer::{is_regular, is_whitespace, Cursor};

/// Default number of bytes a single token match may inspect
pub const DEFAULT_LOOKAHEAD: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenKind {
    Header,
    Xref,
    Trailer,
    StartXref,
    ObjectHeader { number: u32, generation: u16 },
    EndObj,
    Stream,
    EndStream,
    Eof,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub kind: TokenKind,
    pub offset: usize,
    pub len: usize,
}

impl Token {
    pub fn end(&self) -> usize {
        self.offset + self.len
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanOutcome {
    Found(Token),
    NotFound,
    /// The buffer ends inside a partially matched marker starting at `offset`
    Truncated { offset: usize },
}

/// Result of looking for the `startxref` pointer near end of file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartXref {
    Found { keyword_offset: usize, value: u64 },
    /// Keyword present but not followed by an integer
    Truncated { keyword_offset: usize },
    Missing,
}

enum Match {
    Full(Token),
    Partial,
    None,
}

const KEYWORDS: &[(&[u8], TokenKind)] = &[
    (b"startxref", TokenKind::StartXref),
    (b"stream", TokenKind::Stream),
    (b"xref", TokenKind::Xref),
    (b"trailer", TokenKind::Trailer),
    (b"endstream", TokenKind::EndStream),
    (b"endobj", TokenKind::EndObj),
];

#[derive(Debug, Clone, Copy)]
pub struct ByteScanner<'a> {
    bytes: &'a [u8],
    lookahead: usize,
}

impl<'a> ByteScanner<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self {
            bytes,
            lookahead: DEFAULT_LOOKAHEAD,
        }
    }

    pub fn with_lookahead(mut self, lookahead: usize) -> Self {
        self.lookahead = lookahead.max(16);
        self
    }

    pub fn bytes(&self) -> &'a [u8] {
        self.bytes
    }

    /// Next structural token at or after `from`
    pub fn next_token(&self, from: usize) -> ScanOutcome {
        let mut truncated_at = None;
        for pos in from..self.bytes.len() {
            match self.match_at(pos) {
                Match::Full(token) => {
                    trace!(offset = token.offset, kind = ?token.kind, "Scanner token");
                    return ScanOutcome::Found(token);
                }
                Match::Partial => {
                    if truncated_at.is_none() {
                        truncated_at = Some(pos);
                    }
                }
                Match::None => {}
            }
        }
        match truncated_at {
            Some(offset) => ScanOutcome::Truncated { offset },
            None => ScanOutcome::NotFound,
        }
    }

    /// Iterates `Found` tokens from `from` until the buffer is exhausted
    pub fn tokens(&self, from: usize) -> impl Iterator<Item = Token> + 'a {
        let scanner = *self;
        let mut pos = from;
        std::iter::from_fn(move || match scanner.next_token(pos) {
            ScanOutcome::Found(token) => {
                pos = token.end().max(token.offset + 1);
                Some(token)
            }
            _ => None,
        })
    }

    fn match_at(&self, pos: usize) -> Match {
        let b = self.bytes[pos];
        match b {
            b'%' => self.match_percent(pos),
            b'0'..=b'9' if self.boundary_before(pos) => self.match_object_header(pos),
            b's' | b'x' | b't' | b'e' if self.boundary_before(pos) => self.match_keyword(pos),
            _ => Match::None,
        }
    }

    fn boundary_before(&self, pos: usize) -> bool {
        pos == 0 || {
            let prev = self.bytes[pos - 1];
            is_whitespace(prev) || matches!(prev, b'>' | b')' | b']')
        }
    }

    fn boundary_after(&self, end: usize) -> bool {
        match self.bytes.get(end) {
            Some(&b) => !is_regular(b),
            None => true,
        }
    }

    fn match_literal(&self, pos: usize, literal: &[u8]) -> Option<bool> {
        let rest = &self.bytes[pos..];
        if rest.len() < literal.len() {
            return if literal.starts_with(rest) { Some(false) } else { None };
        }
        if rest.starts_with(literal) {
            Some(true)
        } else {
            None
        }
    }

    fn match_keyword(&self, pos: usize) -> Match {
        let mut partial = false;
        for (keyword, kind) in KEYWORDS {
            match self.match_literal(pos, keyword) {
                Some(true) if self.boundary_after(pos + keyword.len()) => {
                    return Match::Full(Token {
                        kind: *kind,
                        offset: pos,
                        len: keyword.len(),
                    });
                }
                Some(false) => partial = true,
                _ => {}
            }
        }
        if partial {
            Match::Partial
        } else {
            Match::None
        }
    }

    fn match_percent(&self, pos: usize) -> Match {
        match self.match_literal(pos, b"%%EOF") {
            Some(true) => {
                return Match::Full(Token {
                    kind: TokenKind::Eof,
                    offset: pos,
                    len: 5,
                })
            }
            Some(false) => return Match::Partial,
            None => {}
        }
        match self.match_literal(pos, b"%PDF-") {
            Some(true) => {
                let window_end = (pos + self.lookahead).min(self.bytes.len());
                let version_len = self.bytes[pos + 5..window_end]
                    .iter()
                    .take_while(|b| b.is_ascii_digit() || **b == b'.')
                    .count();
                Match::Full(Token {
                    kind: TokenKind::Header,
                    offset: pos,
                    len: 5 + version_len,
                })
            }
            Some(false) => Match::Partial,
            None => Match::None,
        }
    }

    /// `N G obj` with both integers and the keyword inside the lookahead window
    fn match_object_header(&self, pos: usize) -> Match {
        let window_end = (pos + self.lookahead).min(self.bytes.len());
        let hit_end = window_end == self.bytes.len();
        let window = &self.bytes[..window_end];
        let mut cur = Cursor::at(window, pos);

        let number = cur.consume_while(|b| b.is_ascii_digit());
        if number.len() > 10 {
            return Match::None;
        }
        let ws = cur.consume_while(is_whitespace);
        if cur.eof() {
            return if hit_end { Match::Partial } else { Match::None };
        }
        if ws.is_empty() {
            return Match::None;
        }
        let generation = cur.consume_while(|b| b.is_ascii_digit());
        if cur.eof() && !generation.is_empty() {
            return if hit_end { Match::Partial } else { Match::None };
        }
        if generation.is_empty() || generation.len() > 5 {
            return Match::None;
        }
        cur.consume_while(is_whitespace);
        if cur.eof() {
            return if hit_end { Match::Partial } else { Match::None };
        }
        let keyword_at = cur.pos;
        match self.match_literal(keyword_at, b"obj") {
            Some(true) if keyword_at + 3 <= window_end && self.boundary_after(keyword_at + 3) => {}
            Some(false) => return Match::Partial,
            _ => return Match::None,
        }
        let (Some(number), Some(generation)) = (parse_digits(number), parse_digits(generation)) else {
            return Match::None;
        };
        let (Ok(number), Ok(generation)) = (u32::try_from(number), u16::try_from(generation)) else {
            return Match::None;
        };
        Match::Full(Token {
            kind: TokenKind::ObjectHeader { number, generation },
            offset: pos,
            len: keyword_at + 3 - pos,
        })
    }

    /// Offset and version string of the first `%PDF-` marker
    pub fn locate_header(&self) -> Option<(usize, String)> {
        let offset = memmem::find(self.bytes, b"%PDF-")?;
        let version: String = self.bytes[offset + 5..]
            .iter()
            .take(self.lookahead)
            .take_while(|b| b.is_ascii_digit() || **b == b'.')
            .map(|b| *b as char)
            .collect();
        debug!(offset, version = %version, "Located PDF header");
        Some((offset, version))
    }

    /// The last `startxref` keyword in the file and the offset it declares
    pub fn find_startxref(&self) -> StartXref {
        let Some(keyword_offset) = memmem::rfind(self.bytes, b"startxref") else {
            return StartXref::Missing;
        };
        let mut cur = Cursor::at(self.bytes, keyword_offset + b"startxref".len());
        cur.skip_ws_and_comments();
        match cur.read_unsigned() {
            Some(value) => StartXref::Found { keyword_offset, value },
            None => StartXref::Truncated { keyword_offset },
        }
    }

    pub fn count_eof_markers(&self) -> usize {
        memmem::find_iter(self.bytes, b"%%EOF").count()
    }

    /// Offset just past the last `%%EOF` marker
    pub fn last_eof_end(&self) -> Option<usize> {
        memmem::rfind(self.bytes, b"%%EOF").map(|offset| offset + 5)
    }

    /// Every `N G obj` header physically present in the body.
    ///
    /// Stream payloads are skipped so binary data that happens to look like
    /// an object header is not reported.
    pub fn scan_object_headers(&self) -> Vec<Token> {
        let mut headers = Vec::new();
        let mut pos = 0;
        while pos < self.bytes.len() {
            let token = match self.next_token(pos) {
                ScanOutcome::Found(token) => token,
                ScanOutcome::NotFound | ScanOutcome::Truncated { .. } => break,
            };
            match token.kind {
                TokenKind::ObjectHeader { .. } => {
                    headers.push(token);
                    pos = token.end();
                }
                TokenKind::Stream => match memmem::find(&self.bytes[token.end()..], b"endstream") {
                    Some(rel) => pos = token.end() + rel + b"endstream".len(),
                    None => break,
                },
                _ => pos = token.end(),
            }
        }
        debug!(count = headers.len(), "Scanned object headers");
        headers
    }
}

fn parse_digits(digits: &[u8]) -> Option<u64> {
    digits
        .iter()
        .try_fold(0u64, |acc, d| acc.checked_mul(10)?.checked_add(u64::from(d - b'0')))
}
