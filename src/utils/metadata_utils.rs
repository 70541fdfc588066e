//! Utilities for extracting and decoding PDF metadata

use chrono::{DateTime, FixedOffset, NaiveDate, TimeZone};
use lazy_static::lazy_static;
use regex::Regex;

use crate::types::{Dictionary, ObjectValue};

lazy_static! {
    static ref XMP_CREATE_DATE: Regex =
        Regex::new(r#"xmp:CreateDate\s*(?:=\s*["']([^"']+)["']|>\s*([^<\s]+)\s*<)"#).unwrap();
    static ref XMP_MODIFY_DATE: Regex =
        Regex::new(r#"xmp:ModifyDate\s*(?:=\s*["']([^"']+)["']|>\s*([^<\s]+)\s*<)"#).unwrap();
}

/// Decodes a PDF text string: UTF-16BE with a byte-order mark, otherwise
/// treated as single-byte text
pub fn decode_text_string(raw: &[u8]) -> String {
    if raw.len() >= 2 && raw[0] == 0xFE && raw[1] == 0xFF {
        let units: Vec<u16> = raw[2..]
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }
    if let Ok(text) = std::str::from_utf8(raw) {
        return text.to_string();
    }
    raw.iter().map(|b| *b as char).collect()
}

/// Extract a text entry from an Info dictionary
pub fn get_metadata_string(info: &Dictionary, key: &[u8]) -> Option<String> {
    match info.get(key) {
        Some(ObjectValue::String(s)) => Some(decode_text_string(s)),
        _ => None,
    }
}

/// Parses `D:YYYYMMDDHHmmSSOHH'mm'`. Everything after the year is optional;
/// a missing zone is taken as UTC.
pub fn parse_pdf_date(raw: &str) -> Option<DateTime<FixedOffset>> {
    let text = raw.trim();
    let text = text.strip_prefix("D:").unwrap_or(text);
    let bytes = text.as_bytes();

    let digits_end = bytes.iter().position(|b| !b.is_ascii_digit()).unwrap_or(bytes.len());
    if digits_end < 4 || digits_end % 2 != 0 || digits_end > 14 {
        return None;
    }
    let field = |start: usize, default: u32| -> Option<u32> {
        if start + 2 <= digits_end {
            text[start..start + 2].parse().ok()
        } else {
            Some(default)
        }
    };
    let year: i32 = text[..4].parse().ok()?;
    let month = field(4, 1)?;
    let day = field(6, 1)?;
    let hour = field(8, 0)?;
    let minute = field(10, 0)?;
    let second = field(12, 0)?;

    let offset = parse_zone(&text[digits_end..])?;
    let naive = NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(hour, minute, second)?;
    offset.from_local_datetime(&naive).single()
}

fn parse_zone(zone: &str) -> Option<FixedOffset> {
    let zone = zone.trim_end_matches('\'');
    match zone.chars().next() {
        None | Some('Z') => FixedOffset::east_opt(0),
        Some(sign @ ('+' | '-')) => {
            let rest: String = zone[1..].chars().filter(|c| c.is_ascii_digit()).collect();
            let hours: i32 = rest.get(..2)?.parse().ok()?;
            let minutes: i32 = match rest.get(2..4) {
                Some(m) => m.parse().ok()?,
                None => 0,
            };
            if hours > 23 || minutes > 59 {
                return None;
            }
            let secs = hours * 3600 + minutes * 60;
            FixedOffset::east_opt(if sign == '-' { -secs } else { secs })
        }
        Some(_) => None,
    }
}

/// Creation and modification dates found in an XMP packet
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct XmpDates {
    pub create: Option<String>,
    pub modify: Option<String>,
}

pub fn extract_xmp_dates(packet: &str) -> XmpDates {
    let capture = |re: &Regex| {
        re.captures(packet).and_then(|caps| {
            caps.get(1)
                .or_else(|| caps.get(2))
                .map(|m| m.as_str().to_string())
        })
    };
    XmpDates {
        create: capture(&XMP_CREATE_DATE),
        modify: capture(&XMP_MODIFY_DATE),
    }
}

/// Parses an XMP (ISO 8601) date. Date-only and zone-less values are
/// accepted and taken as UTC midnight or UTC respectively.
pub fn parse_xmp_date(raw: &str) -> Option<DateTime<FixedOffset>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt);
    }
    let utc = FixedOffset::east_opt(0)?;
    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(raw, format) {
            return utc.from_local_datetime(&naive).single();
        }
    }
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()?;
    utc.from_local_datetime(&date.and_hms_opt(0, 0, 0)?).single()
}
