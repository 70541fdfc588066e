//! Byte cursor and PDF character classes

#[derive(Debug, Clone)]
pub struct Cursor<'a> {
    pub bytes: &'a [u8],
    pub pos: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    pub fn at(bytes: &'a [u8], pos: usize) -> Self {
        Self { bytes, pos }
    }

    pub fn eof(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    pub fn mark(&self) -> usize {
        self.pos
    }

    pub fn restore(&mut self, mark: usize) {
        self.pos = mark;
    }

    pub fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    pub fn peek_n(&self, n: usize) -> Option<u8> {
        self.bytes.get(self.pos + n).copied()
    }

    pub fn consume(&mut self) -> Option<u8> {
        let b = self.peek()?;
        self.pos += 1;
        Some(b)
    }

    pub fn consume_while<F: Fn(u8) -> bool>(&mut self, f: F) -> &'a [u8] {
        let start = self.pos;
        while let Some(b) = self.peek() {
            if !f(b) {
                break;
            }
            self.pos += 1;
        }
        &self.bytes[start..self.pos]
    }

    pub fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(b) if is_whitespace(b)) {
            self.pos += 1;
        }
    }

    pub fn skip_ws_and_comments(&mut self) {
        loop {
            self.skip_whitespace();
            if self.peek() == Some(b'%') {
                while let Some(b) = self.consume() {
                    if b == b'\n' || b == b'\r' {
                        break;
                    }
                }
                continue;
            }
            break;
        }
    }

    /// Consumes `kw` when the input at the cursor starts with it
    pub fn consume_keyword(&mut self, kw: &[u8]) -> bool {
        if self.starts_with(kw) {
            self.pos += kw.len();
            true
        } else {
            false
        }
    }

    /// Like `consume_keyword`, but only when `kw` ends on a token boundary
    pub fn consume_word(&mut self, kw: &[u8]) -> bool {
        if !self.starts_with(kw) {
            return false;
        }
        match self.bytes.get(self.pos + kw.len()) {
            Some(&b) if is_regular(b) => false,
            _ => {
                self.pos += kw.len();
                true
            }
        }
    }

    pub fn starts_with(&self, kw: &[u8]) -> bool {
        self.bytes
            .get(self.pos..)
            .map(|rest| rest.starts_with(kw))
            .unwrap_or(false)
    }

    /// Reads an unsigned decimal integer token
    pub fn read_unsigned(&mut self) -> Option<u64> {
        let start = self.pos;
        let digits = self.consume_while(|b| b.is_ascii_digit());
        if digits.is_empty() || digits.len() > 19 {
            self.pos = start;
            return None;
        }
        digits
            .iter()
            .try_fold(0u64, |acc, d| acc.checked_mul(10)?.checked_add(u64::from(d - b'0')))
            .or_else(|| {
                self.pos = start;
                None
            })
    }

    /// Consumes a single end-of-line marker (`\r\n`, `\n` or `\r`)
    pub fn consume_eol(&mut self) -> bool {
        match self.peek() {
            Some(b'\r') => {
                self.pos += 1;
                if self.peek() == Some(b'\n') {
                    self.pos += 1;
                }
                true
            }
            Some(b'\n') => {
                self.pos += 1;
                true
            }
            _ => false,
        }
    }
}

pub fn is_whitespace(b: u8) -> bool {
    matches!(b, b'\x00' | b'\t' | b'\n' | b'\x0c' | b'\r' | b' ')
}

pub fn is_delim(b: u8) -> bool {
    matches!(b, b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%')
}

pub fn is_regular(b: u8) -> bool {
    !is_whitespace(b) && !is_delim(b)
}

pub fn hex_val(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}
