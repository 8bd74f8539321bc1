//! The header model: `FieldMeta`/`Header` (de)serialization, the
//! self-referential header CRC, and the fixed-point iteration that makes
//! `payload_start`/`file_size` consistent with the header's own length.

use crate::error::{GbfError, Result};
use crate::integrity::crc32;
use crate::json;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

pub const MAGIC_BYTES: [u8; 8] = *b"GREDBIN\0";
pub const VERSION: u32 = 1;

/// Writer's own ceiling on header size; readers may configure a larger
/// `max_header_len`.
pub const WRITER_MAX_HEADER_LEN: u32 = 64 * 1024 * 1024;

static CRC_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""header_crc32_hex"(\s*:\s*)"([0-9A-Fa-f]{8})""#).expect("valid regex"));
static CRC_FALLBACK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""header_crc32_hex"\s*:\s*"[^"]+""#).expect("valid regex"));

/// Header integers are written as plain JSON numbers, but tolerate
/// numeric-string or floating forms on read from less careful producers.
fn de_u64<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<u64, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_u64().unwrap_or_else(|| n.as_f64().unwrap_or(0.0).max(0.0) as u64),
        Value::String(s) => s.parse().unwrap_or(0),
        _ => 0,
    })
}

fn de_u32<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<u32, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => n
            .as_u64()
            .map(|u| u.min(u32::MAX as u64) as u32)
            .unwrap_or_else(|| n.as_f64().unwrap_or(0.0).max(0.0).min(u32::MAX as f64) as u32),
        Value::String(s) => s.parse().unwrap_or(0),
        _ => 0,
    })
}

fn de_vec_u64<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Vec<u64>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Array(arr) => arr
            .into_iter()
            .map(|x| match x {
                Value::Number(n) => n.as_u64().unwrap_or_else(|| n.as_f64().unwrap_or(0.0).max(0.0) as u64),
                _ => 0,
            })
            .collect(),
        _ => Vec::new(),
    })
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldMeta {
    pub name: String,
    pub kind: String,
    pub class: String,

    #[serde(default, deserialize_with = "de_vec_u64")]
    pub shape: Vec<u64>,

    #[serde(default)]
    pub complex: bool,

    #[serde(default)]
    pub encoding: String,

    #[serde(default)]
    pub compression: String,

    #[serde(default, deserialize_with = "de_u64")]
    pub offset: u64,

    #[serde(default, deserialize_with = "de_u64")]
    pub csize: u64,

    #[serde(default, deserialize_with = "de_u64")]
    pub usize: u64,

    #[serde(default, deserialize_with = "de_u32")]
    pub crc32: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Header {
    pub format: String,
    pub magic: String,
    pub version: u32,

    #[serde(default)]
    pub endianness: String,

    #[serde(default)]
    pub order: String,

    #[serde(default)]
    pub root: String,

    #[serde(default)]
    pub created_utc: String,

    #[serde(default)]
    pub matlab_version: String,

    pub fields: Vec<FieldMeta>,

    #[serde(default, deserialize_with = "de_u64")]
    pub payload_start: u64,

    #[serde(default, deserialize_with = "de_u64")]
    pub file_size: u64,

    #[serde(default)]
    pub header_crc32_hex: String,
}

/// Replace the *value* of `header_crc32_hex` with `00000000`, preserving
/// whitespace around `:` so this is stable whether the header was produced
/// compact or pretty-printed.
fn with_placeholder_crc(header_json: &str) -> String {
    let replaced = CRC_RE.replace(header_json, r#""header_crc32_hex"$1"00000000""#);
    if replaced.as_ref() == header_json {
        CRC_FALLBACK_RE.replace(header_json, r#""header_crc32_hex":"00000000""#).to_string()
    } else {
        replaced.to_string()
    }
}

pub fn header_crc32_hex(header_json: &str) -> String {
    let for_crc = with_placeholder_crc(header_json);
    format!("{:08X}", crc32(for_crc.as_bytes()))
}

pub fn validate_header_crc(header: &Header, header_json: &str) -> Result<()> {
    if header.header_crc32_hex.trim().is_empty() {
        return Ok(());
    }
    let expected = header.header_crc32_hex.trim().to_ascii_uppercase();
    let got = header_crc32_hex(header_json);
    if expected != got {
        return Err(GbfError::HeaderCrcMismatch { expected, got });
    }
    Ok(())
}

/// The fixed point this function looks for: `header_len` (hence
/// `payload_start` and `file_size`, which live inside the header JSON)
/// stops changing width between successive serializations, and the CRC
/// computed against that exact JSON no longer moves the bytes around (it
/// can't — `header_crc32_hex`'s value is always a fixed 10-byte quoted
/// token). Six iterations is expected to be plenty; more indicates a bug.
const MAX_HEADER_FIXED_POINT_ITERATIONS: usize = 10;

/// Build the final header JSON bytes for `header`, stamping
/// `payload_start`, `file_size` and `header_crc32_hex` in place. Mutates
/// `header` to match what was written. `pretty` selects indented over
/// compact JSON; either is a stable fixed point, since the CRC is computed
/// against the exact bytes that get written.
pub fn stamp_header(header: &mut Header, payload_bytes_total: u64, pretty: bool) -> Result<Vec<u8>> {
    let mut prev_len: Option<u32> = None;
    let render = |h: &Header| -> Result<String> {
        if pretty {
            json::to_pretty_string(h)
        } else {
            json::to_compact_string(h)
        }
    };

    for _ in 0..MAX_HEADER_FIXED_POINT_ITERATIONS {
        header.header_crc32_hex = "00000000".to_string();
        let json_for_crc = render(header)?;

        header.header_crc32_hex = header_crc32_hex(&json_for_crc);
        let final_json = render(header)?;

        let bytes = final_json.into_bytes();
        let header_len = bytes.len() as u32;
        let payload_start = 8u64 + 4u64 + header_len as u64;
        let file_size = payload_start + payload_bytes_total;

        let stable = prev_len == Some(header_len) && header.payload_start == payload_start && header.file_size == file_size;

        header.payload_start = payload_start;
        header.file_size = file_size;
        prev_len = Some(header_len);

        if stable {
            return Ok(bytes);
        }
    }

    Err(GbfError::InvalidData(
        "header length failed to reach a fixed point after bounded iteration".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_header(n_fields: usize) -> Header {
        Header {
            format: "GBF".to_string(),
            magic: "GREDBIN".to_string(),
            version: VERSION,
            endianness: "little".to_string(),
            order: "column-major".to_string(),
            root: "struct".to_string(),
            created_utc: String::new(),
            matlab_version: String::new(),
            fields: (0..n_fields)
                .map(|i| FieldMeta {
                    name: format!("f{i}"),
                    kind: "numeric".to_string(),
                    class: "double".to_string(),
                    shape: vec![1, 1],
                    complex: false,
                    encoding: String::new(),
                    compression: "none".to_string(),
                    offset: (i as u64) * 8,
                    csize: 8,
                    usize: 8,
                    crc32: 0,
                })
                .collect(),
            payload_start: 0,
            file_size: 0,
            header_crc32_hex: "00000000".to_string(),
        }
    }

    #[test]
    fn stamp_header_reaches_fixed_point() {
        let mut h = sample_header(3);
        let bytes = stamp_header(&mut h, 24, false).unwrap();
        assert_eq!(h.payload_start, 8 + 4 + bytes.len() as u64);
        assert_eq!(h.file_size, h.payload_start + 24);
    }

    #[test]
    fn stamp_header_crc_validates() {
        let mut h = sample_header(200); // many fields: header_len width changes across iterations
        let bytes = stamp_header(&mut h, 1600, false).unwrap();
        let json = String::from_utf8(bytes).unwrap();
        validate_header_crc(&h, &json).unwrap();
    }

    #[test]
    fn stamp_header_pretty_also_validates() {
        let mut h = sample_header(5);
        let bytes = stamp_header(&mut h, 40, true).unwrap();
        let json = String::from_utf8(bytes).unwrap();
        assert!(json.contains('\n'));
        validate_header_crc(&h, &json).unwrap();
    }

    #[test]
    fn corrupting_header_crc_value_fails_validation() {
        let mut h = sample_header(1);
        let bytes = stamp_header(&mut h, 8, false).unwrap();
        let json = String::from_utf8(bytes).unwrap();
        let mut bad = h.clone();
        bad.header_crc32_hex = "DEADBEEF".to_string();
        assert!(validate_header_crc(&bad, &json).is_err());
    }
}
