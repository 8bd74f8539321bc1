//! Per-kind wire codecs: the serialize/deserialize functions
//! for each leaf kind's uncompressed byte layout. These never see
//! compression or CRCs — that is the writer/reader's job, operating on
//! the byte strings this module produces and consumes.

use crate::error::{GbfError, Result};
use crate::primitives::{mul_usize, numel, u64_to_usize, ByteBuffer, ByteReader};
use crate::value::{
    CalendarDurationArray, CategoricalArray, CharArray, DateTimeArray, DurationArray, GbfValue,
    LogicalArray, NumericArray, NumericClass, OpaqueLeaf, StringArray,
};

/// The uncompressed encoding of one leaf, plus the metadata a `FieldMeta`
/// needs to describe it.
pub struct EncodedLeaf {
    pub bytes: Vec<u8>,
    pub kind: String,
    pub class: String,
    pub shape: Vec<u64>,
    pub complex: bool,
    pub encoding: String,
}

fn shape_to_u64(shape: &[usize]) -> Vec<u64> {
    shape.iter().map(|&d| d as u64).collect()
}

fn shape_to_usize(shape: &[u64]) -> Result<Vec<usize>> {
    shape.iter().map(|&d| u64_to_usize(d, "shape dim")).collect()
}

pub fn encode_leaf(name: &str, value: &GbfValue) -> Result<EncodedLeaf> {
    match value {
        GbfValue::Numeric(arr) => encode_numeric(name, arr),
        GbfValue::Logical(arr) => Ok(EncodedLeaf {
            bytes: arr.data.clone(),
            kind: "logical".to_string(),
            class: "logical".to_string(),
            shape: shape_to_u64(&arr.shape),
            complex: false,
            encoding: String::new(),
        }),
        GbfValue::Char(arr) => encode_char(arr),
        GbfValue::String(arr) => encode_string(name, arr),
        GbfValue::DateTime(arr) => encode_datetime(name, arr),
        GbfValue::Duration(arr) => encode_duration(name, arr),
        GbfValue::CalendarDuration(arr) => encode_calendar_duration(name, arr),
        GbfValue::Categorical(arr) => encode_categorical(name, arr),
        GbfValue::Opaque(op) => Ok(EncodedLeaf {
            bytes: op.bytes.clone(),
            kind: op.kind.clone(),
            class: op.class.clone(),
            shape: shape_to_u64(&op.shape),
            complex: op.complex,
            encoding: op.encoding.clone(),
        }),
        GbfValue::EmptyStruct => Ok(EncodedLeaf {
            bytes: Vec::new(),
            kind: "struct".to_string(),
            class: "struct".to_string(),
            shape: vec![1, 1],
            complex: false,
            encoding: "empty-scalar-struct".to_string(),
        }),
        GbfValue::Struct(_) => Err(GbfError::Unsupported(format!(
            "non-leaf struct encountered at `{name}`; structs must be flattened before encoding"
        ))),
    }
}

fn encode_numeric(name: &str, arr: &NumericArray) -> Result<EncodedLeaf> {
    let n = numel(&arr.shape)?;
    let bpe = arr.class.bytes_per_element();
    let expected = mul_usize(n, bpe)?;

    if arr.real_le.len() != expected {
        return Err(GbfError::InvalidData(format!(
            "numeric `{name}` real_le size mismatch: expected {expected} bytes, got {}",
            arr.real_le.len()
        )));
    }

    let mut bytes = Vec::with_capacity(expected * if arr.complex { 2 } else { 1 });
    bytes.extend_from_slice(&arr.real_le);

    if arr.complex {
        let imag = arr
            .imag_le
            .as_ref()
            .ok_or_else(|| GbfError::InvalidData(format!("numeric `{name}` is complex but imag_le is None")))?;
        if imag.len() != expected {
            return Err(GbfError::InvalidData(format!(
                "numeric `{name}` imag_le size mismatch: expected {expected} bytes, got {}",
                imag.len()
            )));
        }
        bytes.extend_from_slice(imag);
    } else if arr.imag_le.is_some() {
        return Err(GbfError::InvalidData(format!("numeric `{name}` is not complex but imag_le is present")));
    }

    Ok(EncodedLeaf {
        bytes,
        kind: "numeric".to_string(),
        class: arr.class.as_matlab_class().to_string(),
        shape: shape_to_u64(&arr.shape),
        complex: arr.complex,
        encoding: String::new(),
    })
}

fn encode_char(arr: &CharArray) -> Result<EncodedLeaf> {
    let mut buf = ByteBuffer::with_capacity(arr.data.len() * 2);
    for &u in &arr.data {
        buf.append_u16_le(u);
    }
    Ok(EncodedLeaf {
        bytes: buf.into_vec(),
        kind: "char".to_string(),
        class: "char".to_string(),
        shape: shape_to_u64(&arr.shape),
        complex: false,
        encoding: "utf-16-codeunits".to_string(),
    })
}

fn encode_string(name: &str, arr: &StringArray) -> Result<EncodedLeaf> {
    let n = numel(&arr.shape)?;
    if arr.data.len() != n {
        return Err(GbfError::InvalidData(format!(
            "string `{name}` shape {:?} implies N={n}, but data.len={}",
            arr.shape,
            arr.data.len()
        )));
    }

    let mut buf = ByteBuffer::new();
    for opt in &arr.data {
        match opt {
            None => {
                buf.append_byte(1);
                buf.append_u32_le(0);
            }
            Some(s) => {
                buf.append_byte(0);
                let b = s.as_bytes();
                let len = u32::try_from(b.len())
                    .map_err(|_| GbfError::Unsupported(format!("string too large in `{name}`")))?;
                buf.append_u32_le(len);
                buf.append_bytes(b);
            }
        }
    }

    Ok(EncodedLeaf {
        bytes: buf.into_vec(),
        kind: "string".to_string(),
        class: "string".to_string(),
        shape: shape_to_u64(&arr.shape),
        complex: false,
        encoding: "utf-8".to_string(),
    })
}

fn encode_datetime(name: &str, arr: &DateTimeArray) -> Result<EncodedLeaf> {
    let n = numel(&arr.shape)?;
    if arr.nat_mask.len() != n || arr.unix_ms.len() != n {
        return Err(GbfError::InvalidData(format!(
            "datetime `{name}` inconsistent component lengths for shape {:?}",
            arr.shape
        )));
    }

    let tz = arr.timezone.clone().unwrap_or_default();
    let locale = arr.locale.clone().unwrap_or_default();
    let format = arr.format.clone().unwrap_or_default();

    let mut buf = ByteBuffer::new();
    buf.append_byte(3); // n_strings

    for s in [&tz, &locale, &format] {
        let bytes = s.as_bytes();
        let len = u32::try_from(bytes.len()).map_err(|_| GbfError::Unsupported(format!("datetime `{name}` metadata string too large")))?;
        buf.append_u32_le(len);
        buf.append_bytes(bytes);
    }

    buf.append_bytes(&arr.nat_mask);
    for &ms in &arr.unix_ms {
        buf.append_i64_le(ms);
    }

    let encoding = if tz.is_empty() {
        "dt:naive-unixms+nat-mask+tz+locale+format"
    } else {
        "dt:tz-unixms+nat-mask+tz+locale+format"
    };

    Ok(EncodedLeaf {
        bytes: buf.into_vec(),
        kind: "datetime".to_string(),
        class: "datetime".to_string(),
        shape: shape_to_u64(&arr.shape),
        complex: false,
        encoding: encoding.to_string(),
    })
}

fn encode_duration(name: &str, arr: &DurationArray) -> Result<EncodedLeaf> {
    let n = numel(&arr.shape)?;
    if arr.nan_mask.len() != n || arr.ms.len() != n {
        return Err(GbfError::InvalidData(format!(
            "duration `{name}` inconsistent lengths for shape {:?}",
            arr.shape
        )));
    }
    let mut buf = ByteBuffer::new();
    buf.append_bytes(&arr.nan_mask);
    for &ms in &arr.ms {
        buf.append_i64_le(ms);
    }
    Ok(EncodedLeaf {
        bytes: buf.into_vec(),
        kind: "duration".to_string(),
        class: "duration".to_string(),
        shape: shape_to_u64(&arr.shape),
        complex: false,
        encoding: "ms-i64+nan-mask".to_string(),
    })
}

fn encode_calendar_duration(name: &str, arr: &CalendarDurationArray) -> Result<EncodedLeaf> {
    let n = numel(&arr.shape)?;
    if arr.mask.len() != n || arr.months.len() != n || arr.days.len() != n || arr.time_ms.len() != n {
        return Err(GbfError::InvalidData(format!(
            "calendarDuration `{name}` inconsistent lengths for shape {:?}",
            arr.shape
        )));
    }
    let mut buf = ByteBuffer::new();
    buf.append_bytes(&arr.mask);
    for &m in &arr.months {
        buf.append_i32_le(m);
    }
    for &d in &arr.days {
        buf.append_i32_le(d);
    }
    for &t in &arr.time_ms {
        buf.append_i64_le(t);
    }
    Ok(EncodedLeaf {
        bytes: buf.into_vec(),
        kind: "calendarduration".to_string(),
        class: "calendarDuration".to_string(),
        shape: shape_to_u64(&arr.shape),
        complex: false,
        encoding: "mask+months-i32+days-i32+time-ms-i64".to_string(),
    })
}

fn encode_categorical(name: &str, arr: &CategoricalArray) -> Result<EncodedLeaf> {
    let n = numel(&arr.shape)?;
    if arr.codes.len() != n {
        return Err(GbfError::InvalidData(format!(
            "categorical `{name}` codes.len != N for shape {:?}",
            arr.shape
        )));
    }
    let n_cats = u32::try_from(arr.categories.len())
        .map_err(|_| GbfError::Unsupported(format!("too many categories in `{name}`")))?;

    let mut buf = ByteBuffer::new();
    buf.append_u32_le(n_cats);
    for cat in &arr.categories {
        let b = cat.as_bytes();
        let len = u32::try_from(b.len())
            .map_err(|_| GbfError::Unsupported(format!("category string too large in `{name}`")))?;
        buf.append_u32_le(len);
        buf.append_bytes(b);
    }
    for &c in &arr.codes {
        buf.append_u32_le(c);
    }

    Ok(EncodedLeaf {
        bytes: buf.into_vec(),
        kind: "categorical".to_string(),
        class: "categorical".to_string(),
        shape: shape_to_u64(&arr.shape),
        complex: false,
        encoding: "cats-utf8+codes-u32".to_string(),
    })
}

/// Decode a leaf's uncompressed bytes back into a value, dispatching on
/// the field's recorded `kind`. Unknown kinds are not an error: they are
/// preserved verbatim as `Opaque` so a reader can round-trip leaves from a
/// newer writer it doesn't fully understand.
pub fn decode_leaf(
    name: &str,
    kind: &str,
    class: &str,
    shape_u64: &[u64],
    complex: bool,
    encoding: &str,
    raw: &[u8],
) -> Result<GbfValue> {
    let shape = shape_to_usize(shape_u64)?;
    let n = numel(&shape)?;
    let kind_lc = kind.to_ascii_lowercase();

    match kind_lc.as_str() {
        "struct" => Ok(GbfValue::EmptyStruct),
        "numeric" => decode_numeric(name, class, shape, complex, raw, n),
        "logical" => decode_logical(name, shape, raw, n),
        "char" => decode_char(name, shape, raw, n),
        "string" => decode_string(name, shape, raw, n),
        "datetime" => decode_datetime(name, shape, encoding, raw, n),
        "duration" => decode_duration(name, shape, raw, n),
        "calendarduration" => decode_calendar_duration(name, shape, raw, n),
        "categorical" => decode_categorical(name, shape, raw, n),
        _ => Ok(GbfValue::Opaque(OpaqueLeaf {
            kind: kind.to_string(),
            class: class.to_string(),
            shape,
            complex,
            encoding: encoding.to_string(),
            bytes: raw.to_vec(),
        })),
    }
}

fn decode_numeric(name: &str, class: &str, shape: Vec<usize>, complex: bool, raw: &[u8], n: usize) -> Result<GbfValue> {
    let cls = NumericClass::from_matlab_class(class)
        .ok_or_else(|| GbfError::Unsupported(format!("unknown numeric class `{class}`")))?;
    let bpe = cls.bytes_per_element();
    let part_bytes = mul_usize(n, bpe)?;

    if !complex {
        if raw.len() != part_bytes {
            return Err(GbfError::InvalidData(format!(
                "numeric `{name}` size mismatch: expected {part_bytes} bytes, got {}",
                raw.len()
            )));
        }
        Ok(GbfValue::Numeric(NumericArray::new_real(cls, shape, raw.to_vec())))
    } else {
        if raw.len() != 2 * part_bytes {
            return Err(GbfError::InvalidData(format!(
                "complex numeric `{name}` size mismatch: expected {} bytes, got {}",
                2 * part_bytes,
                raw.len()
            )));
        }
        let real_le = raw[..part_bytes].to_vec();
        let imag_le = raw[part_bytes..].to_vec();
        Ok(GbfValue::Numeric(NumericArray::new_complex(cls, shape, real_le, imag_le)))
    }
}

fn decode_logical(name: &str, shape: Vec<usize>, raw: &[u8], n: usize) -> Result<GbfValue> {
    if raw.len() != n {
        return Err(GbfError::InvalidData(format!(
            "logical `{name}` size mismatch: expected {n} bytes, got {}",
            raw.len()
        )));
    }
    Ok(GbfValue::Logical(LogicalArray { shape, data: raw.to_vec() }))
}

fn decode_char(name: &str, shape: Vec<usize>, raw: &[u8], n: usize) -> Result<GbfValue> {
    if raw.len() != n * 2 {
        return Err(GbfError::InvalidData(format!(
            "char `{name}` size mismatch: expected {} bytes, got {}",
            n * 2,
            raw.len()
        )));
    }
    let mut r = ByteReader::new(raw, "char");
    let mut data = Vec::with_capacity(n);
    for _ in 0..n {
        data.push(r.take_u16_le()?);
    }
    Ok(GbfValue::Char(CharArray { shape, data }))
}

fn decode_string(name: &str, shape: Vec<usize>, raw: &[u8], n: usize) -> Result<GbfValue> {
    let mut r = ByteReader::new(raw, "string");
    let mut data = Vec::with_capacity(n);
    for _ in 0..n {
        let miss_flag = r.take_u8()?;
        let len = r.take_u32_le()? as usize;
        let bytes = r.take(len)?;
        if miss_flag != 0 {
            data.push(None);
        } else {
            let s = std::str::from_utf8(bytes)
                .map_err(|e| GbfError::InvalidData(format!("string `{name}` invalid UTF-8: {e}")))?;
            data.push(Some(s.to_string()));
        }
    }
    Ok(GbfValue::String(StringArray { shape, data }))
}

/// Decode a datetime leaf. Two wire forms exist in the wild, tagged by
/// `encoding`: the canonical Unix-milliseconds form this crate writes, and
/// a legacy calendar-components form (`year i16, month u8, day u8,
/// ms_of_day i32`) some older writers emit. Both decode into the same
/// `unix_ms`-based value.
fn decode_datetime(name: &str, shape: Vec<usize>, encoding: &str, raw: &[u8], n: usize) -> Result<GbfValue> {
    let mut r = ByteReader::new(raw, "datetime");
    let n_strings = r.take_u8()?;
    if n_strings != 3 {
        return Err(GbfError::InvalidData(format!("datetime `{name}` expected 3 metadata strings, got {n_strings}")));
    }

    let mut strs = Vec::with_capacity(3);
    for _ in 0..3 {
        let len = r.take_u32_le()? as usize;
        let bytes = r.take(len)?;
        let s = std::str::from_utf8(bytes)
            .map_err(|e| GbfError::InvalidData(format!("datetime `{name}` metadata invalid UTF-8: {e}")))?
            .to_string();
        strs.push(s);
    }
    let tz = strs.remove(0);
    let locale = strs.remove(0);
    let format = strs.remove(0);

    let nat_mask = r.take(n)?.to_vec();

    let is_legacy = encoding.contains("-ymd+msday");
    let unix_ms = if is_legacy {
        let mut year = Vec::with_capacity(n);
        for _ in 0..n {
            year.push(r.take_i16_le()?);
        }
        let month = r.take(n)?.to_vec();
        let day = r.take(n)?.to_vec();
        let mut ms_day = Vec::with_capacity(n);
        for _ in 0..n {
            ms_day.push(r.take_i32_le()?);
        }
        calendar_components_to_unix_ms(name, &year, &month, &day, &ms_day, &nat_mask)?
    } else {
        let mut v = Vec::with_capacity(n);
        for _ in 0..n {
            v.push(r.take_i64_le()?);
        }
        v
    };

    Ok(GbfValue::DateTime(DateTimeArray {
        shape,
        timezone: if tz.is_empty() { None } else { Some(tz) },
        locale: if locale.is_empty() { None } else { Some(locale) },
        format: if format.is_empty() { None } else { Some(format) },
        nat_mask,
        unix_ms,
    }))
}

/// Days from the civil epoch (1970-01-01) for a given y/m/d, using Howard
/// Hinnant's well-known branchless civil-from-days/days-from-civil scheme.
fn days_from_civil(y: i64, m: i64, d: i64) -> i64 {
    let y = if m <= 2 { y - 1 } else { y };
    let era = if y >= 0 { y } else { y - 399 } / 400;
    let yoe = (y - era * 400) as i64; // [0, 399]
    let mp = (m + 9) % 12; // [0, 11]
    let doy = (153 * mp + 2) / 5 + d - 1; // [0, 365]
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy; // [0, 146096]
    era * 146097 + doe - 719468
}

fn calendar_components_to_unix_ms(
    name: &str,
    year: &[i16],
    month: &[u8],
    day: &[u8],
    ms_day: &[i32],
    nat_mask: &[u8],
) -> Result<Vec<i64>> {
    let n = year.len();
    if month.len() != n || day.len() != n || ms_day.len() != n || nat_mask.len() != n {
        return Err(GbfError::InvalidData(format!(
            "datetime `{name}` legacy components have mismatched lengths"
        )));
    }
    let mut out = Vec::with_capacity(n);
    for i in 0..n {
        if nat_mask[i] != 0 {
            out.push(0);
            continue;
        }
        let days = days_from_civil(year[i] as i64, month[i] as i64, day[i] as i64);
        out.push(days * 86_400_000 + ms_day[i] as i64);
    }
    Ok(out)
}

fn decode_duration(name: &str, shape: Vec<usize>, raw: &[u8], n: usize) -> Result<GbfValue> {
    let need = n + n * 8;
    if raw.len() != need {
        return Err(GbfError::InvalidData(format!(
            "duration `{name}` size mismatch: expected {need} bytes, got {}",
            raw.len()
        )));
    }
    let mut r = ByteReader::new(raw, "duration");
    let nan_mask = r.take(n)?.to_vec();
    let mut ms = Vec::with_capacity(n);
    for _ in 0..n {
        ms.push(r.take_i64_le()?);
    }
    Ok(GbfValue::Duration(DurationArray { shape, nan_mask, ms }))
}

fn decode_calendar_duration(name: &str, shape: Vec<usize>, raw: &[u8], n: usize) -> Result<GbfValue> {
    let need = n + n * 4 + n * 4 + n * 8;
    if raw.len() != need {
        return Err(GbfError::InvalidData(format!(
            "calendarDuration `{name}` size mismatch: expected {need} bytes, got {}",
            raw.len()
        )));
    }
    let mut r = ByteReader::new(raw, "calendarDuration");
    let mask = r.take(n)?.to_vec();
    let mut months = Vec::with_capacity(n);
    for _ in 0..n {
        months.push(r.take_i32_le()?);
    }
    let mut days = Vec::with_capacity(n);
    for _ in 0..n {
        days.push(r.take_i32_le()?);
    }
    let mut time_ms = Vec::with_capacity(n);
    for _ in 0..n {
        time_ms.push(r.take_i64_le()?);
    }
    Ok(GbfValue::CalendarDuration(CalendarDurationArray { shape, mask, months, days, time_ms }))
}

fn decode_categorical(name: &str, shape: Vec<usize>, raw: &[u8], n: usize) -> Result<GbfValue> {
    let mut r = ByteReader::new(raw, "categorical");
    let n_cats = r.take_u32_le()? as usize;
    let mut categories = Vec::with_capacity(n_cats);
    for _ in 0..n_cats {
        let len = r.take_u32_le()? as usize;
        let bytes = r.take(len)?;
        let s = std::str::from_utf8(bytes)
            .map_err(|e| GbfError::InvalidData(format!("categorical `{name}` invalid UTF-8 category: {e}")))?;
        categories.push(s.to_string());
    }
    if r.remaining_len() != n * 4 {
        return Err(GbfError::InvalidData(format!(
            "categorical `{name}` codes size mismatch: expected {} bytes, got {}",
            n * 4,
            r.remaining_len()
        )));
    }
    let mut codes = Vec::with_capacity(n);
    for _ in 0..n {
        codes.push(r.take_u32_le()?);
    }
    Ok(GbfValue::Categorical(CategoricalArray { shape, categories, codes }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(v: GbfValue) -> GbfValue {
        let enc = encode_leaf("x", &v).unwrap();
        decode_leaf("x", &enc.kind, &enc.class, &enc.shape, enc.complex, &enc.encoding, &enc.bytes).unwrap()
    }

    #[test]
    fn numeric_round_trip() {
        let v = GbfValue::Numeric(NumericArray::from_f64_column_major(vec![2, 3], vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]));
        assert_eq!(roundtrip(v.clone()), v);
    }

    #[test]
    fn complex_numeric_round_trip() {
        let real = vec![1.0f64, 2.0, 3.0];
        let imag = vec![-1.0f64, -2.0, -3.0];
        let mut rb = Vec::new();
        for x in &real {
            rb.extend_from_slice(&x.to_le_bytes());
        }
        let mut ib = Vec::new();
        for x in &imag {
            ib.extend_from_slice(&x.to_le_bytes());
        }
        let v = GbfValue::Numeric(NumericArray::new_complex(NumericClass::Double, vec![1, 3], rb, ib));
        assert_eq!(roundtrip(v.clone()), v);
    }

    #[test]
    fn char_wire_layout_is_utf16_le() {
        let arr = CharArray::from_str_row("hello");
        let enc = encode_leaf("msg", &GbfValue::Char(arr)).unwrap();
        assert_eq!(enc.bytes, vec![0x68, 0, 0x65, 0, 0x6C, 0, 0x6C, 0, 0x6F, 0]);
    }

    #[test]
    fn string_with_missing_round_trips() {
        let v = GbfValue::String(StringArray {
            shape: vec![1, 3],
            data: vec![Some("".to_string()), None, Some("caffè".to_string())],
        });
        assert_eq!(roundtrip(v.clone()), v);
    }

    #[test]
    fn datetime_unix_ms_round_trips() {
        let v = GbfValue::DateTime(DateTimeArray {
            shape: vec![1, 2],
            timezone: Some("UTC".to_string()),
            locale: Some("en_US".to_string()),
            format: None,
            nat_mask: vec![0, 1],
            unix_ms: vec![1_700_000_000_000, 0],
        });
        assert_eq!(roundtrip(v.clone()), v);
    }

    #[test]
    fn datetime_legacy_encoding_decodes_to_unix_ms() {
        // 2020-01-02 00:00:00 UTC == 1577923200000 ms
        let mut buf = ByteBuffer::new();
        buf.append_byte(3);
        for s in ["", "", ""] {
            buf.append_u32_le(s.len() as u32);
            buf.append_bytes(s.as_bytes());
        }
        buf.append_byte(0); // nat_mask[0] = 0
        buf.append_bytes(&2020i16.to_le_bytes());
        buf.append_byte(1); // month
        buf.append_byte(2); // day
        buf.append_i32_le(0); // ms_of_day

        let raw = buf.into_vec();
        let v = decode_leaf("t", "datetime", "datetime", &[1, 1], false, "dt:naive-ymd+msday+nat-mask+locale+format", &raw).unwrap();
        match v {
            GbfValue::DateTime(dt) => assert_eq!(dt.unix_ms, vec![1_577_923_200_000]),
            _ => panic!("expected datetime"),
        }
    }

    #[test]
    fn categorical_undefined_code_round_trips() {
        let v = GbfValue::Categorical(CategoricalArray {
            shape: vec![1, 4],
            categories: vec!["x".into(), "y".into(), "z".into()],
            codes: vec![1, 2, 0, 3],
        });
        assert_eq!(roundtrip(v.clone()), v);
    }

    #[test]
    fn unknown_kind_decodes_as_opaque() {
        let v = decode_leaf("x", "future-kind", "c1", &[2, 2], false, "whatever", &[1, 2, 3, 4]).unwrap();
        match v {
            GbfValue::Opaque(op) => {
                assert_eq!(op.kind, "future-kind");
                assert_eq!(op.bytes, vec![1, 2, 3, 4]);
            }
            _ => panic!("expected opaque"),
        }
    }

    #[test]
    fn opaque_round_trips_through_encode() {
        let v = GbfValue::Opaque(OpaqueLeaf {
            kind: "custom".into(),
            class: "c".into(),
            shape: vec![3],
            complex: false,
            encoding: "raw".into(),
            bytes: vec![9, 8, 7],
        });
        assert_eq!(roundtrip(v.clone()), v);
    }
}
