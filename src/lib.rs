//! Reader/writer for GBF ("GREDBIN"), a self-describing binary container
//! for MATLAB-like structured scientific data: nested records whose leaves
//! are typed N-dimensional arrays, with optional per-leaf compression and
//! integrity checks.
//!
//! A file is a fixed prelude, a JSON header describing every leaf, and a
//! concatenated payload whose regions the header locates by offset. See
//! [`writer::write_file`] and [`reader::read_file`]/[`reader::read_var`]
//! for the entry points.

mod error;
mod header;
mod integrity;
mod json;
mod leaf;
mod primitives;
mod reader;
mod value;
mod writer;

pub use crate::error::{GbfError, Result};
pub use crate::header::{FieldMeta, Header, MAGIC_BYTES, VERSION};
pub use crate::reader::{read_file, read_header_only, read_var, ReadOptions};
pub use crate::value::{
    element_count, CalendarDurationArray, CategoricalArray, CharArray, DateTimeArray, DurationArray,
    GbfValue, LogicalArray, NumericArray, NumericClass, OpaqueLeaf, StringArray,
};
pub use crate::writer::{write_file, CompressionMode, WriteOptions};
