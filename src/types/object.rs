//! PDF object model shared by the parser, the graph builder and the rules
//! Author: kartik4091

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Identity of an indirect object: object number plus generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectId {
    pub number: u32,
    pub generation: u16,
}

impl ObjectId {
    pub const fn new(number: u32, generation: u16) -> Self {
        Self { number, generation }
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} R", self.number, self.generation)
    }
}

/// Outcome of comparing a stream's declared `/Length` with the bytes
/// actually found before `endstream`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamLengthCheck {
    /// Declared length, if `/Length` resolved to an integer
    pub declared: Option<i64>,
    /// Bytes between the `stream` EOL and the EOL before `endstream`,
    /// `None` when no `endstream` keyword was found
    pub actual: Option<usize>,
    pub consistent: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Stream {
    pub dict: Dictionary,
    /// Raw payload, still encoded with whatever `/Filter` declares
    pub data: Vec<u8>,
    /// Absolute offset of the first payload byte
    pub data_offset: usize,
    pub length_check: StreamLengthCheck,
}

impl Stream {
    pub fn filters(&self) -> Vec<Vec<u8>> {
        match self.dict.get(b"Filter") {
            Some(ObjectValue::Name(name)) => vec![name.clone()],
            Some(ObjectValue::Array(items)) => items
                .iter()
                .filter_map(|item| item.as_name().map(|n| n.to_vec()))
                .collect(),
            _ => Vec::new(),
        }
    }
}

/// Dictionary keyed by decoded name bytes (without the leading slash).
///
/// Keys are kept sorted so iteration order never depends on the order the
/// producer wrote them in.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Dictionary {
    entries: BTreeMap<Vec<u8>, ObjectValue>,
}

impl Dictionary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts an entry, returning the value it replaced
    pub fn insert(&mut self, key: impl Into<Vec<u8>>, value: ObjectValue) -> Option<ObjectValue> {
        self.entries.insert(key.into(), value)
    }

    pub fn get(&self, key: &[u8]) -> Option<&ObjectValue> {
        self.entries.get(key)
    }

    pub fn has(&self, key: &[u8]) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Vec<u8>, &ObjectValue)> {
        self.entries.iter()
    }

    pub fn values(&self) -> impl Iterator<Item = &ObjectValue> {
        self.entries.values()
    }

    pub fn get_integer(&self, key: &[u8]) -> Option<i64> {
        self.get(key).and_then(ObjectValue::as_integer)
    }

    pub fn get_name(&self, key: &[u8]) -> Option<&[u8]> {
        self.get(key).and_then(ObjectValue::as_name)
    }

    pub fn get_reference(&self, key: &[u8]) -> Option<ObjectId> {
        self.get(key).and_then(ObjectValue::as_reference)
    }

    /// True when `/Type` is the given name
    pub fn has_type(&self, type_name: &[u8]) -> bool {
        self.get_name(b"Type") == Some(type_name)
    }
}

/// Closed set of PDF object values.
#[derive(Debug, Clone, PartialEq)]
pub enum ObjectValue {
    Null,
    Boolean(bool),
    Integer(i64),
    Real(f64),
    /// Decoded string bytes (literal escapes and hex already resolved)
    String(Vec<u8>),
    /// Decoded name bytes without the leading slash
    Name(Vec<u8>),
    Array(Vec<ObjectValue>),
    Dictionary(Dictionary),
    Reference(ObjectId),
    Stream(Stream),
}

impl ObjectValue {
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            ObjectValue::Integer(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_name(&self) -> Option<&[u8]> {
        match self {
            ObjectValue::Name(name) => Some(name),
            _ => None,
        }
    }

    pub fn as_string(&self) -> Option<&[u8]> {
        match self {
            ObjectValue::String(bytes) => Some(bytes),
            _ => None,
        }
    }

    pub fn as_reference(&self) -> Option<ObjectId> {
        match self {
            ObjectValue::Reference(id) => Some(*id),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[ObjectValue]> {
        match self {
            ObjectValue::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Dictionary of a dictionary or of a stream
    pub fn as_dictionary(&self) -> Option<&Dictionary> {
        match self {
            ObjectValue::Dictionary(dict) => Some(dict),
            ObjectValue::Stream(stream) => Some(&stream.dict),
            _ => None,
        }
    }

    pub fn as_stream(&self) -> Option<&Stream> {
        match self {
            ObjectValue::Stream(stream) => Some(stream),
            _ => None,
        }
    }

    pub fn type_label(&self) -> &'static str {
        match self {
            ObjectValue::Null => "null",
            ObjectValue::Boolean(_) => "boolean",
            ObjectValue::Integer(_) => "integer",
            ObjectValue::Real(_) => "real",
            ObjectValue::String(_) => "string",
            ObjectValue::Name(_) => "name",
            ObjectValue::Array(_) => "array",
            ObjectValue::Dictionary(_) => "dictionary",
            ObjectValue::Reference(_) => "reference",
            ObjectValue::Stream(_) => "stream",
        }
    }

    /// Collects every indirect reference held directly or nested inside this
    /// value, in a deterministic order.
    pub fn collect_references(&self, out: &mut Vec<ObjectId>) {
        let mut pending: Vec<&ObjectValue> = vec![self];
        while let Some(value) = pending.pop() {
            match value {
                ObjectValue::Reference(id) => out.push(*id),
                ObjectValue::Array(items) => pending.extend(items.iter().rev()),
                ObjectValue::Dictionary(dict) => {
                    let mut values: Vec<&ObjectValue> = dict.values().collect();
                    values.reverse();
                    pending.extend(values);
                }
                ObjectValue::Stream(stream) => {
                    let mut values: Vec<&ObjectValue> = stream.dict.values().collect();
                    values.reverse();
                    pending.extend(values);
                }
                _ => {}
            }
        }
    }

    pub fn references(&self) -> Vec<ObjectId> {
        let mut out = Vec::new();
        self.collect_references(&mut out);
        out
    }
}
