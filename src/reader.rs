//! Header parsing and payload decoding.

use crate::error::{GbfError, Result};
use crate::header::{validate_header_crc, FieldMeta, Header, MAGIC_BYTES, WRITER_MAX_HEADER_LEN};
use crate::integrity::{crc32, zlib_decompress, MAX_FIELD_USIZE};
use crate::leaf::decode_leaf;
use crate::primitives::{add_u64, u64_to_usize};
use crate::value::{insert_path, GbfValue};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;

/// Coalesced random-access reads: group fields within
/// `coalesce_max_gap_bytes` of each other into a single seek+read, bounded
/// by `coalesce_max_group_bytes`. An optimization only — it never changes
/// which bytes end up assigned to which field.
#[derive(Debug, Clone)]
pub struct ReadOptions {
    pub validate: bool,
    /// Upper bound on the accepted `header_len`. Defaults to the writer's
    /// own ceiling; readers may raise this.
    pub max_header_len: u32,
    pub coalesce_max_gap_bytes: u64,
    pub coalesce_max_group_bytes: u64,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            validate: false,
            max_header_len: WRITER_MAX_HEADER_LEN,
            coalesce_max_gap_bytes: 4096,
            coalesce_max_group_bytes: 8 * 1024 * 1024,
        }
    }
}

fn read_u32_le<R: Read>(r: &mut R) -> Result<u32> {
    let mut b = [0u8; 4];
    r.read_exact(&mut b).map_err(|e| match e.kind() {
        std::io::ErrorKind::UnexpectedEof => GbfError::Truncated("header length prefix".to_string()),
        _ => GbfError::Io(e),
    })?;
    Ok(u32::from_le_bytes(b))
}

fn read_header_and_json(file: &mut File, opts: &ReadOptions) -> Result<(Header, u32, String)> {
    let mut r = BufReader::new(&mut *file);

    let mut magic = [0u8; 8];
    r.read_exact(&mut magic).map_err(|e| match e.kind() {
        std::io::ErrorKind::UnexpectedEof => GbfError::Truncated("magic".to_string()),
        _ => GbfError::Io(e),
    })?;
    if magic != MAGIC_BYTES {
        return Err(GbfError::BadMagic);
    }

    let header_len = read_u32_le(&mut r)?;
    if header_len < 2 || header_len > opts.max_header_len {
        return Err(GbfError::InvalidData(format!("header_len {header_len} out of bounds")));
    }

    let mut header_bytes = vec![0u8; header_len as usize];
    r.read_exact(&mut header_bytes).map_err(|e| match e.kind() {
        std::io::ErrorKind::UnexpectedEof => GbfError::Truncated("header body".to_string()),
        _ => GbfError::Io(e),
    })?;

    let header_json = String::from_utf8(header_bytes)?;
    let header: Header = crate::json::parse_strict(&header_json)?;

    if opts.validate {
        validate_header_crc(&header, &header_json)?;

        if header.file_size > 0 {
            let fs = r.get_ref().metadata()?.len();
            if fs != header.file_size {
                return Err(GbfError::InvalidData(format!(
                    "file size mismatch: header says {}, actual is {fs}",
                    header.file_size
                )));
            }
        }
    }

    let computed_payload_start = 8u64 + 4u64 + header_len as u64;
    if opts.validate && header.payload_start > 0 && header.payload_start != computed_payload_start {
        return Err(GbfError::InvalidData(format!(
            "payload_start mismatch: header={}, computed={computed_payload_start}",
            header.payload_start
        )));
    }

    Ok((header, header_len, header_json))
}

fn effective_payload_start(header_len: u32, header_payload_start: u64) -> u64 {
    if header_payload_start > 0 {
        header_payload_start
    } else {
        8u64 + 4u64 + header_len as u64
    }
}

/// Read and parse the GBF header without decoding any payload.
pub fn read_header_only<P: AsRef<Path>>(path: P, opts: ReadOptions) -> Result<(Header, u32, String)> {
    let path = path.as_ref();
    log::debug!("read_header_only: opening {}", path.display());
    let mut file = File::open(path)?;
    read_header_and_json(&mut file, &opts)
}

fn field_byte_range(payload_start: u64, field: &FieldMeta) -> Result<(u64, u64)> {
    let pos = add_u64(payload_start, field.offset)?;
    let end = add_u64(pos, field.csize)?;
    Ok((pos, end))
}

fn read_field_raw(file: &mut File, payload_start: u64, field: &FieldMeta) -> Result<Vec<u8>> {
    if field.csize > MAX_FIELD_USIZE || field.usize > MAX_FIELD_USIZE {
        return Err(GbfError::Unsupported(format!("field `{}` size exceeds configured limit", field.name)));
    }

    let (pos, end) = field_byte_range(payload_start, field)?;
    let fs = file.metadata()?.len();
    if end > fs {
        return Err(GbfError::Truncated(format!(
            "field `{}` chunk out of bounds (offset {}, csize {}, payload_len {})",
            field.name,
            field.offset,
            field.csize,
            fs.saturating_sub(payload_start)
        )));
    }

    file.seek(SeekFrom::Start(pos))?;
    let csz = u64_to_usize(field.csize, "field csize")?;
    let mut buf = vec![0u8; csz];
    file.read_exact(&mut buf).map_err(|e| match e.kind() {
        std::io::ErrorKind::UnexpectedEof => GbfError::Truncated(format!("field `{}` payload", field.name)),
        _ => GbfError::Io(e),
    })?;
    Ok(buf)
}

fn decode_field_bytes(field: &FieldMeta, comp_bytes: &[u8], validate: bool) -> Result<Vec<u8>> {
    let raw = if field.compression.eq_ignore_ascii_case("zlib") {
        let expected = if field.usize > 0 { field.usize } else { MAX_FIELD_USIZE };
        zlib_decompress(&field.name, comp_bytes, expected)?
    } else {
        if comp_bytes.len() as u64 > MAX_FIELD_USIZE {
            return Err(GbfError::Unsupported(format!("field `{}` raw payload exceeds configured limit", field.name)));
        }
        comp_bytes.to_vec()
    };

    if validate && field.usize > 0 && raw.len() as u64 != field.usize {
        return Err(GbfError::InvalidData(format!(
            "field `{}` decoded size mismatch: expected {} bytes, got {}",
            field.name,
            field.usize,
            raw.len()
        )));
    }

    if validate && field.crc32 != 0 {
        let got = crc32(&raw);
        if got != field.crc32 {
            return Err(GbfError::FieldCrcMismatch { name: field.name.clone(), expected: field.crc32, got });
        }
    }

    Ok(raw)
}

/// Group nearby fields into as few reads as possible, then split the
/// resulting buffers back out per-field.
fn coalesced_read(
    file: &mut File,
    payload_start: u64,
    fields: &[&FieldMeta],
    opts: &ReadOptions,
) -> Result<Vec<(String, Vec<u8>)>> {
    if fields.is_empty() {
        return Ok(Vec::new());
    }

    let mut sorted: Vec<&FieldMeta> = fields.to_vec();
    sorted.sort_by_key(|f| f.offset);

    let mut out = Vec::with_capacity(sorted.len());
    let mut group_start = sorted[0].offset;
    let mut group_end = add_u64(sorted[0].offset, sorted[0].csize)?;
    let mut group: Vec<&FieldMeta> = vec![sorted[0]];

    let flush = |file: &mut File, group_start: u64, group_end: u64, group: &[&FieldMeta]| -> Result<Vec<(String, Vec<u8>)>> {
        let size = group_end - group_start;
        let pos = add_u64(payload_start, group_start)?;
        let fs = file.metadata()?.len();
        let end = add_u64(pos, size)?;
        if end > fs {
            return Err(GbfError::Truncated(format!(
                "coalesced read out of bounds (offset {group_start}, size {size}, payload_len {})",
                fs.saturating_sub(payload_start)
            )));
        }
        file.seek(SeekFrom::Start(pos))?;
        let sz = u64_to_usize(size, "coalesced group size")?;
        let mut buf = vec![0u8; sz];
        file.read_exact(&mut buf).map_err(|e| match e.kind() {
            std::io::ErrorKind::UnexpectedEof => GbfError::Truncated("coalesced payload group".to_string()),
            _ => GbfError::Io(e),
        })?;

        let mut res = Vec::with_capacity(group.len());
        for f in group {
            let rel = u64_to_usize(f.offset - group_start, "field relative offset")?;
            let csz = u64_to_usize(f.csize, "field csize")?;
            res.push((f.name.clone(), buf[rel..rel + csz].to_vec()));
        }
        Ok(res)
    };

    for f in sorted.iter().skip(1) {
        let f_start = f.offset;
        let f_end = add_u64(f.offset, f.csize)?;
        let gap = f_start.saturating_sub(group_end);
        let new_size = f_end.saturating_sub(group_start);

        if gap <= opts.coalesce_max_gap_bytes && new_size <= opts.coalesce_max_group_bytes {
            group_end = group_end.max(f_end);
            group.push(*f);
        } else {
            out.extend(flush(file, group_start, group_end, &group)?);
            group_start = f_start;
            group_end = f_end;
            group = vec![*f];
        }
    }

    out.extend(flush(file, group_start, group_end, &group)?);
    Ok(out)
}

fn decode_field(field: &FieldMeta, comp_bytes: &[u8], validate: bool) -> Result<GbfValue> {
    let raw = decode_field_bytes(field, comp_bytes, validate)?;
    decode_leaf(&field.name, &field.kind, &field.class, &field.shape, field.complex, &field.encoding, &raw)
}

/// Read the whole file into a struct-rooted value.
pub fn read_file<P: AsRef<Path>>(path: P, opts: ReadOptions) -> Result<GbfValue> {
    let path = path.as_ref();
    log::debug!("read_file: opening {}", path.display());
    let mut file = File::open(path)?;
    let (header, header_len, _json) = read_header_and_json(&mut file, &opts)?;
    let payload_start = effective_payload_start(header_len, header.payload_start);

    let mut out = BTreeMap::<String, GbfValue>::new();
    let all_fields: Vec<&FieldMeta> = header.fields.iter().collect();
    let chunks = coalesced_read(&mut file, payload_start, &all_fields, &opts)?;

    for (name, comp_bytes) in chunks {
        let field = header
            .fields
            .iter()
            .find(|f| f.name == name)
            .ok_or_else(|| GbfError::InvalidData("internal field lookup failure".to_string()))?;
        let val = decode_field(field, &comp_bytes, opts.validate)?;
        insert_path(&mut out, &field.name, val)?;
    }
    log::trace!("read_file: decoded {} field(s)", header.fields.len());

    if out.len() == 1 {
        if let Some(v) = out.get("<root>") {
            return Ok(v.clone());
        }
    }

    Ok(GbfValue::Struct(out))
}

/// Read a single leaf or subtree by dotted path, seeking only the bytes it
/// needs.
pub fn read_var<P: AsRef<Path>>(path: P, var_path: &str, opts: ReadOptions) -> Result<GbfValue> {
    let path = path.as_ref();
    let mut file = File::open(path)?;
    let (header, header_len, _json) = read_header_and_json(&mut file, &opts)?;
    let payload_start = effective_payload_start(header_len, header.payload_start);

    let var_path = var_path.trim();
    if var_path.is_empty() {
        return read_file(path, opts);
    }

    if let Some(field) = header.fields.iter().find(|f| f.name == var_path) {
        let comp_bytes = read_field_raw(&mut file, payload_start, field)?;
        return decode_field(field, &comp_bytes, opts.validate);
    }

    let prefix = format!("{var_path}.");
    let subtree_fields: Vec<&FieldMeta> = header.fields.iter().filter(|f| f.name.starts_with(&prefix)).collect();
    if subtree_fields.is_empty() {
        return Err(GbfError::NotFound(var_path.to_string()));
    }

    let chunks = coalesced_read(&mut file, payload_start, &subtree_fields, &opts)?;
    let mut out = BTreeMap::<String, GbfValue>::new();

    for (name, comp_bytes) in chunks {
        let field = subtree_fields
            .iter()
            .find(|f| f.name == name)
            .ok_or_else(|| GbfError::InvalidData("internal field lookup failure".to_string()))?;
        let val = decode_field(field, &comp_bytes, opts.validate)?;
        let rel = &name[prefix.len()..];
        insert_path(&mut out, rel, val)?;
    }

    Ok(GbfValue::Struct(out))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::NumericArray;
    use crate::writer::{write_file, WriteOptions};
    use tempfile::tempdir;

    fn one_field_value() -> GbfValue {
        let mut root = BTreeMap::new();
        root.insert(
            "a".to_string(),
            GbfValue::Numeric(NumericArray::from_f64_column_major(vec![1, 3], vec![1.0, 2.0, 3.0])),
        );
        GbfValue::Struct(root)
    }

    #[test]
    fn read_header_only_reports_consistent_offsets() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("t.gbf");
        write_file(&file, &one_field_value(), WriteOptions::default()).unwrap();

        let (header, header_len, _json) = read_header_only(&file, ReadOptions { validate: true, ..Default::default() }).unwrap();
        assert_eq!(header.payload_start, 8 + 4 + header_len as u64);
        let total: u64 = header.fields.iter().map(|f| f.csize).sum();
        assert_eq!(header.file_size, header.payload_start + total);
    }

    #[test]
    fn read_var_not_found_reports_not_found() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("t.gbf");
        write_file(&file, &one_field_value(), WriteOptions::default()).unwrap();

        let err = read_var(&file, "nope", ReadOptions::default()).unwrap_err();
        assert!(matches!(err, GbfError::NotFound(_)));
    }
}
