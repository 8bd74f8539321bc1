//! CRC32 (IEEE 802.3, via `crc32fast`) and zlib framing (via `flate2`).

use crate::error::{GbfError, Result};
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use std::io::{Read, Write};

/// Upper bound on a single leaf's decompressed size. Not a format limit —
/// guards against hostile/corrupt `usize` fields driving an unbounded
/// allocation.
pub const MAX_FIELD_USIZE: u64 = 16u64 * 1024 * 1024 * 1024;

pub fn crc32(bytes: &[u8]) -> u32 {
    let mut h = crc32fast::Hasher::new();
    h.update(bytes);
    h.finalize()
}

pub fn zlib_compress(raw: &[u8], level: u32) -> Result<Vec<u8>> {
    let mut enc = ZlibEncoder::new(Vec::new(), Compression::new(level.min(9)));
    enc.write_all(raw)?;
    Ok(enc.finish()?)
}

/// Inflate `comp` to exactly `expected_len` bytes (the leaf's recorded
/// `usize`), failing if the stream produces more or errors out.
pub fn zlib_decompress(name: &str, comp: &[u8], expected_len: u64) -> Result<Vec<u8>> {
    let cap = expected_len.min(MAX_FIELD_USIZE);
    let dec = ZlibDecoder::new(comp);
    let mut out = Vec::new();
    let mut limited = dec.take(cap.saturating_add(1));
    limited.read_to_end(&mut out).map_err(|e| GbfError::ZlibError {
        name: name.to_string(),
        message: e.to_string(),
    })?;
    if out.len() as u64 > cap {
        return Err(GbfError::ZlibError {
            name: name.to_string(),
            message: "decompressed data exceeds configured limit".to_string(),
        });
    }
    Ok(out)
}
