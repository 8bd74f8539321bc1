//! Flatten → encode → compress → lay out → stamp header → write atomically.

use crate::error::{GbfError, Result};
use crate::header::{stamp_header, Header, MAGIC_BYTES, VERSION};
use crate::integrity::{crc32, zlib_compress};
use crate::leaf::encode_leaf;
use crate::value::GbfValue;
use std::collections::BTreeMap;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;
use tempfile::NamedTempFile;
use time::macros::format_description;
use time::OffsetDateTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionMode {
    Auto,
    Always,
    Never,
}

#[derive(Debug, Clone)]
pub struct WriteOptions {
    pub compression: CompressionMode,
    /// 0..=9
    pub zlib_level: u32,
    pub include_crc32: bool,
    pub pretty_header: bool,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            compression: CompressionMode::Auto,
            zlib_level: 6,
            include_crc32: true,
            pretty_header: false,
        }
    }
}

// Compression selection thresholds (implementation-defined optimizations;
// they never change the decoded output).
const COMPRESS_THRESHOLD_BYTES: usize = 1024;
const AUTO_COMPRESS_FLOAT_THRESHOLD_BYTES: usize = 64 * 1024;
const AUTO_ENTROPY_SAMPLE_BYTES: usize = 4096;
const AUTO_ENTROPY_MAX_UNIQUE_RATIO: f64 = 0.95;

fn should_attempt_auto_compress(kind: &str, class: &str, raw: &[u8]) -> bool {
    if raw.len() < COMPRESS_THRESHOLD_BYTES {
        return false;
    }
    if kind == "numeric" && (class == "double" || class == "single") && raw.len() < AUTO_COMPRESS_FLOAT_THRESHOLD_BYTES {
        return false;
    }

    let sample_len = raw.len().min(AUTO_ENTROPY_SAMPLE_BYTES);
    let mut seen = [false; 256];
    let mut unique = 0usize;
    for &b in &raw[..sample_len] {
        if !seen[b as usize] {
            seen[b as usize] = true;
            unique += 1;
        }
    }
    (unique as f64 / sample_len as f64) <= AUTO_ENTROPY_MAX_UNIQUE_RATIO
}

fn now_utc_string() -> String {
    let fmt = format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]Z");
    OffsetDateTime::now_utc().format(&fmt).unwrap_or_default()
}

/// Depth-first flatten of the root struct into `(dotted_name, leaf)` pairs.
/// A non-struct root becomes a single leaf named `<root>`; `header.root` is
/// always `"struct"` regardless, per the documented header schema.
fn flatten(value: &GbfValue) -> Result<Vec<(String, GbfValue)>> {
    fn walk(value: &GbfValue, prefix: &str, out: &mut Vec<(String, GbfValue)>) -> Result<()> {
        match value {
            GbfValue::Struct(map) => {
                for (k, v) in map {
                    if k.contains('.') {
                        return Err(GbfError::Unsupported(format!(
                            "struct key `{k}` contains '.', not representable as a GBF path segment"
                        )));
                    }
                    let name = if prefix.is_empty() { k.clone() } else { format!("{prefix}.{k}") };
                    walk(v, &name, out)?;
                }
                Ok(())
            }
            other => {
                let name = if prefix.is_empty() { "<root>".to_string() } else { prefix.to_string() };
                out.push((name, other.clone()));
                Ok(())
            }
        }
    }

    match value {
        GbfValue::Struct(map) => {
            let mut leaves = Vec::new();
            for (k, v) in map {
                walk(v, k, &mut leaves)?;
            }
            Ok(leaves)
        }
        other => Ok(vec![("<root>".to_string(), other.clone())]),
    }
}

/// Write `value` to `path` as a whole-file atomic replace: encode into a
/// temp file in the destination directory, then rename into place. On any
/// failure, no file is left at `path` that wasn't already there.
pub fn write_file<P: AsRef<Path>>(path: P, value: &GbfValue, opts: WriteOptions) -> Result<()> {
    let path = path.as_ref();
    log::debug!("write_file: preparing {}", path.display());

    let leaves = flatten(value)?;

    let mut chunks: Vec<Vec<u8>> = Vec::with_capacity(leaves.len());
    let mut fields = Vec::with_capacity(leaves.len());

    for (name, v) in &leaves {
        let encoded = encode_leaf(name, v)?;
        let usize_u64 = encoded.bytes.len() as u64;
        let crc = if opts.include_crc32 { crc32(&encoded.bytes) } else { 0 };

        let mut stored = encoded.bytes;
        let mut compression_tag = "none".to_string();

        let attempt = match opts.compression {
            CompressionMode::Never => false,
            CompressionMode::Always => stored.len() >= COMPRESS_THRESHOLD_BYTES,
            CompressionMode::Auto => should_attempt_auto_compress(&encoded.kind, &encoded.class, &stored),
        };

        if attempt {
            let compressed = zlib_compress(&stored, opts.zlib_level)?;
            let keep = match opts.compression {
                CompressionMode::Always => true, // size-neutral outcomes are allowed
                _ => compressed.len() < stored.len(),
            };
            if keep {
                stored = compressed;
                compression_tag = "zlib".to_string();
            }
        }

        fields.push(crate::header::FieldMeta {
            name: name.clone(),
            kind: encoded.kind,
            class: encoded.class,
            shape: encoded.shape,
            complex: encoded.complex,
            encoding: encoded.encoding,
            compression: compression_tag,
            offset: 0,
            csize: stored.len() as u64,
            usize: usize_u64,
            crc32: crc,
        });
        chunks.push(stored);
    }

    let mut offset = 0u64;
    for f in fields.iter_mut() {
        f.offset = offset;
        offset = offset.saturating_add(f.csize);
    }
    let payload_bytes_total = offset;
    log::trace!("write_file: {} field(s), {} payload byte(s)", fields.len(), payload_bytes_total);

    let mut header = Header {
        format: "GBF".to_string(),
        magic: "GREDBIN".to_string(),
        version: VERSION,
        endianness: "little".to_string(),
        order: "column-major".to_string(),
        root: "struct".to_string(),
        created_utc: now_utc_string(),
        matlab_version: format!("gredbin {}", env!("CARGO_PKG_VERSION")),
        fields,
        payload_start: 0,
        file_size: 0,
        header_crc32_hex: "00000000".to_string(),
    };

    let header_bytes = stamp_header(&mut header, payload_bytes_total, opts.pretty_header)?;

    let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir)?;

    let mut tmp = NamedTempFile::new_in(dir)?;
    {
        let mut w = BufWriter::new(tmp.as_file_mut());
        w.write_all(&MAGIC_BYTES)?;
        w.write_all(&(header_bytes.len() as u32).to_le_bytes())?;
        w.write_all(&header_bytes)?;
        for chunk in &chunks {
            w.write_all(chunk)?;
        }
        w.flush()?;
    }
    tmp.as_file().sync_all()?;

    tmp.persist(path).map_err(|e| GbfError::Io(e.error))?;
    log::debug!("write_file: wrote {}", path.display());
    Ok(())
}
