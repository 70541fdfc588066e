//! Stream decoding for cross-reference and object streams
//! Author: kartik4091

use std::io::Read;

use flate2::read::ZlibDecoder;
use tracing::{debug, warn};
use weezl::{decode::Decoder as LzwDecoder, BitOrder, LzwStatus};

use crate::error::StructureError;
use crate::scanner::lexer::{hex_val, is_whitespace};
use crate::types::{Dictionary, ObjectValue, Stream};

#[derive(Debug, Clone, Copy)]
struct DecodeParms {
    predictor: u32,
    colors: u32,
    bits_per_component: u32,
    columns: u32,
}

impl DecodeParms {
    fn from_dict(dict: &Dictionary) -> Self {
        let int = |key: &[u8], default: u32| {
            dict.get_integer(key)
                .and_then(|v| u32::try_from(v).ok())
                .unwrap_or(default)
        };
        Self {
            predictor: int(b"Predictor", 1),
            colors: int(b"Colors", 1),
            bits_per_component: int(b"BitsPerComponent", 8),
            columns: int(b"Columns", 1),
        }
    }
}

/// Decodes the filters the structure stages need to read xref and object
/// streams. Output is capped at `max_output` bytes.
#[derive(Debug, Clone, Copy)]
pub struct StreamProcessor {
    max_output: usize,
}

impl StreamProcessor {
    pub fn new(max_output: usize) -> Self {
        Self { max_output }
    }

    /// Decodes `data` (the stream payload, possibly already decrypted by the
    /// caller) according to the stream's `/Filter` chain
    pub fn decode(&self, stream: &Stream, data: &[u8]) -> Result<Vec<u8>, StructureError> {
        let filters = stream.filters();
        let parms = decode_parms(&stream.dict, filters.len());
        let mut out = data.to_vec();
        for (idx, filter) in filters.iter().enumerate() {
            out = match filter.as_slice() {
                b"FlateDecode" | b"Fl" => self.inflate(&out)?,
                b"LZWDecode" | b"LZW" => self.lzw(&out)?,
                b"ASCIIHexDecode" | b"AHx" => ascii_hex(&out)?,
                other => {
                    return Err(StructureError::InvalidObjectStream(format!(
                        "unsupported filter /{}",
                        String::from_utf8_lossy(other)
                    )))
                }
            };
            if let Some(p) = parms.get(idx).copied().flatten() {
                if p.predictor > 1 {
                    out = apply_predictor(&out, p)?;
                }
            }
        }
        debug!(filters = filters.len(), input = data.len(), output = out.len(), "Decoded stream");
        Ok(out)
    }

    fn inflate(&self, data: &[u8]) -> Result<Vec<u8>, StructureError> {
        let mut decoder = ZlibDecoder::new(data);
        let mut out = Vec::new();
        let mut buf = [0u8; 8192];
        loop {
            match decoder.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => {
                    if out.len() + n > self.max_output {
                        return Err(StructureError::InvalidObjectStream(format!(
                            "decoded stream exceeds {} bytes",
                            self.max_output
                        )));
                    }
                    out.extend_from_slice(&buf[..n]);
                }
                // Trailing garbage after a valid deflate body is common
                Err(e) if !out.is_empty() => {
                    warn!(error = %e, decoded = out.len(), "Flate stream ended with an error");
                    break;
                }
                Err(e) => return Err(StructureError::InvalidObjectStream(format!("flate: {}", e))),
            }
        }
        Ok(out)
    }

    fn lzw(&self, data: &[u8]) -> Result<Vec<u8>, StructureError> {
        let mut decoder = LzwDecoder::with_tiff_size_switch(BitOrder::Msb, 8);
        let mut out = Vec::new();
        let mut buf = [0u8; 8192];
        let mut input = data;
        loop {
            let result = decoder.decode_bytes(input, &mut buf);
            input = &input[result.consumed_in..];
            if out.len() + result.consumed_out > self.max_output {
                return Err(StructureError::InvalidObjectStream(format!(
                    "decoded stream exceeds {} bytes",
                    self.max_output
                )));
            }
            out.extend_from_slice(&buf[..result.consumed_out]);
            match result.status {
                Ok(LzwStatus::Done) | Ok(LzwStatus::NoProgress) => break,
                Ok(LzwStatus::Ok) if result.consumed_in == 0 && result.consumed_out == 0 => break,
                Ok(LzwStatus::Ok) => {}
                Err(e) if !out.is_empty() => {
                    warn!(error = %e, decoded = out.len(), "LZW stream ended with an error");
                    break;
                }
                Err(e) => return Err(StructureError::InvalidObjectStream(format!("lzw: {}", e))),
            }
        }
        Ok(out)
    }
}

fn decode_parms(dict: &Dictionary, filters: usize) -> Vec<Option<DecodeParms>> {
    let mut out = vec![None; filters.max(1)];
    match dict.get(b"DecodeParms") {
        Some(ObjectValue::Dictionary(d)) => out[0] = Some(DecodeParms::from_dict(d)),
        Some(ObjectValue::Array(items)) => {
            for (slot, item) in out.iter_mut().zip(items) {
                if let ObjectValue::Dictionary(d) = item {
                    *slot = Some(DecodeParms::from_dict(d));
                }
            }
        }
        _ => {}
    }
    out
}

fn ascii_hex(data: &[u8]) -> Result<Vec<u8>, StructureError> {
    let mut out = Vec::with_capacity(data.len() / 2);
    let mut high = None;
    for &b in data {
        if b == b'>' {
            break;
        }
        if is_whitespace(b) {
            continue;
        }
        let v = hex_val(b).ok_or_else(|| {
            StructureError::InvalidObjectStream(format!("invalid hex digit 0x{:02x}", b))
        })?;
        match high.take() {
            Some(h) => out.push((h << 4) | v),
            None => high = Some(v),
        }
    }
    if let Some(h) = high {
        out.push(h << 4);
    }
    Ok(out)
}

fn apply_predictor(data: &[u8], parms: DecodeParms) -> Result<Vec<u8>, StructureError> {
    if parms.bits_per_component != 8 || parms.columns == 0 || parms.colors == 0 {
        return Ok(data.to_vec());
    }
    let bpp = parms.colors as usize;
    let row_len = (parms.columns as usize)
        .checked_mul(bpp)
        .filter(|len| *len <= 1 << 20)
        .ok_or_else(|| StructureError::InvalidObjectStream("predictor row too large".into()))?;
    match parms.predictor {
        2 => Ok(tiff_predictor(data, row_len, bpp)),
        10..=15 => png_predictor(data, row_len, bpp),
        _ => Ok(data.to_vec()),
    }
}

fn tiff_predictor(data: &[u8], row_len: usize, bpp: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len());
    for chunk in data.chunks(row_len) {
        let mut row = chunk.to_vec();
        for i in bpp..row.len() {
            row[i] = row[i].wrapping_add(row[i - bpp]);
        }
        out.extend_from_slice(&row);
    }
    out
}

fn png_predictor(data: &[u8], row_len: usize, bpp: usize) -> Result<Vec<u8>, StructureError> {
    let mut out = Vec::with_capacity(data.len());
    let mut prev = vec![0u8; row_len];
    for chunk in data.chunks(row_len + 1) {
        if chunk.len() < row_len + 1 {
            break;
        }
        let filter = chunk[0];
        let mut row = chunk[1..].to_vec();
        for j in 0..row_len {
            let left = if j >= bpp { row[j - bpp] } else { 0 };
            let up = prev[j];
            let up_left = if j >= bpp { prev[j - bpp] } else { 0 };
            row[j] = match filter {
                0 => row[j],
                1 => row[j].wrapping_add(left),
                2 => row[j].wrapping_add(up),
                3 => row[j].wrapping_add(((u16::from(left) + u16::from(up)) / 2) as u8),
                4 => row[j].wrapping_add(paeth(left, up, up_left)),
                other => {
                    return Err(StructureError::InvalidObjectStream(format!(
                        "unknown PNG predictor row filter {}",
                        other
                    )))
                }
            };
        }
        out.extend_from_slice(&row);
        prev = row;
    }
    Ok(out)
}

fn paeth(a: u8, b: u8, c: u8) -> u8 {
    let p = i16::from(a) + i16::from(b) - i16::from(c);
    let pa = (p - i16::from(a)).abs();
    let pb = (p - i16::from(b)).abs();
    let pc = (p - i16::from(c)).abs();
    if pa <= pb && pa <= pc {
        a
    } else if pb <= pc {
        b
    } else {
        c
    }
}
