//! The in-memory value tree: a closed sum type over every leaf kind GBF
//! can carry, plus path-addressed navigation over it.

use crate::error::{GbfError, Result};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NumericClass {
    Double,
    Single,
    Int8,
    Uint8,
    Int16,
    Uint16,
    Int32,
    Uint32,
    Int64,
    Uint64,
}

impl NumericClass {
    pub fn from_matlab_class(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "double" => Some(Self::Double),
            "single" => Some(Self::Single),
            "int8" => Some(Self::Int8),
            "uint8" => Some(Self::Uint8),
            "int16" => Some(Self::Int16),
            "uint16" => Some(Self::Uint16),
            "int32" => Some(Self::Int32),
            "uint32" => Some(Self::Uint32),
            "int64" => Some(Self::Int64),
            "uint64" => Some(Self::Uint64),
            _ => None,
        }
    }

    pub fn as_matlab_class(&self) -> &'static str {
        match self {
            Self::Double => "double",
            Self::Single => "single",
            Self::Int8 => "int8",
            Self::Uint8 => "uint8",
            Self::Int16 => "int16",
            Self::Uint16 => "uint16",
            Self::Int32 => "int32",
            Self::Uint32 => "uint32",
            Self::Int64 => "int64",
            Self::Uint64 => "uint64",
        }
    }

    pub fn bytes_per_element(&self) -> usize {
        match self {
            Self::Double => 8,
            Self::Single => 4,
            Self::Int8 => 1,
            Self::Uint8 => 1,
            Self::Int16 => 2,
            Self::Uint16 => 2,
            Self::Int32 => 4,
            Self::Uint32 => 4,
            Self::Int64 => 8,
            Self::Uint64 => 8,
        }
    }
}

/// Number of elements implied by `shape`, per GBF's zero-dimension
/// convention (see [`crate::primitives::numel`] for the checked variant
/// used internally by the codec).
pub fn element_count(shape: &[usize]) -> usize {
    if shape.iter().any(|&d| d == 0) {
        return 0;
    }
    shape.iter().copied().fold(1usize, |acc, d| acc.saturating_mul(d))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NumericArray {
    pub class: NumericClass,
    pub shape: Vec<usize>,
    pub complex: bool,
    pub real_le: Vec<u8>,
    pub imag_le: Option<Vec<u8>>,
}

impl NumericArray {
    pub fn new_real(class: NumericClass, shape: Vec<usize>, real_le: Vec<u8>) -> Self {
        Self { class, shape, complex: false, real_le, imag_le: None }
    }

    pub fn new_complex(class: NumericClass, shape: Vec<usize>, real_le: Vec<u8>, imag_le: Vec<u8>) -> Self {
        Self { class, shape, complex: true, real_le, imag_le: Some(imag_le) }
    }

    pub fn from_f64_column_major(shape: Vec<usize>, data: Vec<f64>) -> Self {
        let mut bytes = Vec::with_capacity(data.len() * 8);
        for v in data {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
        Self::new_real(NumericClass::Double, shape, bytes)
    }

    pub fn from_f32_column_major(shape: Vec<usize>, data: Vec<f32>) -> Self {
        let mut bytes = Vec::with_capacity(data.len() * 4);
        for v in data {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
        Self::new_real(NumericClass::Single, shape, bytes)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogicalArray {
    pub shape: Vec<usize>,
    /// One byte per element (0/1), column-major order.
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharArray {
    pub shape: Vec<usize>,
    /// UTF-16 code units, column-major order.
    pub data: Vec<u16>,
}

impl CharArray {
    /// Convenience for a 1xN row of UTF-16 code units.
    pub fn from_str_row(s: &str) -> Self {
        let data: Vec<u16> = s.encode_utf16().collect();
        Self { shape: vec![1, data.len()], data }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StringArray {
    pub shape: Vec<usize>,
    /// Flattened column-major order; `None` denotes a missing element.
    pub data: Vec<Option<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateTimeArray {
    pub shape: Vec<usize>,
    pub timezone: Option<String>,
    pub locale: Option<String>,
    pub format: Option<String>,
    /// One byte per element, 1 where the element is NaT.
    pub nat_mask: Vec<u8>,
    /// Milliseconds since the Unix epoch, 0 where masked.
    pub unix_ms: Vec<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DurationArray {
    pub shape: Vec<usize>,
    /// One byte per element, 1 where the element is NaN.
    pub nan_mask: Vec<u8>,
    /// Milliseconds, 0 where masked.
    pub ms: Vec<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarDurationArray {
    pub shape: Vec<usize>,
    /// One byte per element, 1 where the element is missing.
    pub mask: Vec<u8>,
    pub months: Vec<i32>,
    pub days: Vec<i32>,
    pub time_ms: Vec<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoricalArray {
    pub shape: Vec<usize>,
    pub categories: Vec<String>,
    /// 0 for `<undefined>`, else 1..=categories.len().
    pub codes: Vec<u32>,
}

/// Pass-through for leaf kinds this codec does not otherwise model: raw
/// bytes preserved verbatim alongside the metadata needed to reproduce
/// the leaf on write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpaqueLeaf {
    pub kind: String,
    pub class: String,
    pub shape: Vec<usize>,
    pub complex: bool,
    pub encoding: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GbfValue {
    Struct(BTreeMap<String, GbfValue>),

    Numeric(NumericArray),
    Logical(LogicalArray),
    Char(CharArray),
    String(StringArray),
    DateTime(DateTimeArray),
    Duration(DurationArray),
    CalendarDuration(CalendarDurationArray),
    Categorical(CategoricalArray),
    Opaque(OpaqueLeaf),

    /// MATLAB `struct()` with no fields: a scalar empty struct, which is a
    /// leaf rather than something to recurse into.
    EmptyStruct,
}

impl GbfValue {
    pub fn as_struct(&self) -> Option<&BTreeMap<String, GbfValue>> {
        match self {
            GbfValue::Struct(m) => Some(m),
            _ => None,
        }
    }

    pub fn get_path(&self, path: &str) -> Option<&GbfValue> {
        if path.is_empty() {
            return Some(self);
        }
        let mut cur = self;
        for part in path.split('.') {
            match cur {
                GbfValue::Struct(m) => cur = m.get(part)?,
                _ => return None,
            }
        }
        Some(cur)
    }
}

/// Walk or create `Struct` nodes along `path`, inserting `leaf` at the end.
/// Requires every intermediate segment to already be (or become) a
/// `Struct`; colliding with a non-struct intermediate is `invalid-data`.
/// Overwrites an existing leaf at the same path.
pub fn insert_path(root: &mut BTreeMap<String, GbfValue>, path: &str, leaf: GbfValue) -> Result<()> {
    if path.is_empty() {
        return Err(GbfError::InvalidData("empty field name".to_string()));
    }
    let parts: Vec<&str> = path.split('.').collect();
    let mut cur = root;

    for (i, part) in parts.iter().enumerate() {
        if part.is_empty() {
            return Err(GbfError::InvalidData(format!("invalid path `{path}`: empty segment")));
        }
        if i == parts.len() - 1 {
            cur.insert((*part).to_string(), leaf);
            return Ok(());
        }
        let entry = cur.entry((*part).to_string()).or_insert_with(|| GbfValue::Struct(BTreeMap::new()));
        match entry {
            GbfValue::Struct(m) => cur = m,
            _ => {
                return Err(GbfError::InvalidData(format!(
                    "path collision at `{part}` inserting `{path}`: intermediate is not a struct"
                )))
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_path_creates_intermediate_structs() {
        let mut root = BTreeMap::new();
        insert_path(&mut root, "a.b.c", GbfValue::EmptyStruct).unwrap();
        let v = GbfValue::Struct(root);
        assert_eq!(v.get_path("a.b.c"), Some(&GbfValue::EmptyStruct));
    }

    #[test]
    fn insert_path_rejects_collision_with_leaf() {
        let mut root = BTreeMap::new();
        insert_path(&mut root, "a", GbfValue::EmptyStruct).unwrap();
        let err = insert_path(&mut root, "a.b", GbfValue::EmptyStruct).unwrap_err();
        assert!(matches!(err, GbfError::InvalidData(_)));
    }

    #[test]
    fn insert_path_overwrites_existing_leaf() {
        let mut root = BTreeMap::new();
        insert_path(&mut root, "a", GbfValue::EmptyStruct).unwrap();
        insert_path(
            &mut root,
            "a",
            GbfValue::Numeric(NumericArray::from_f64_column_major(vec![1, 1], vec![1.0])),
        )
        .unwrap();
        assert!(matches!(root.get("a"), Some(GbfValue::Numeric(_))));
    }
}
