//! Error taxonomy for the GBF codec.
//!
//! One variant per concept in the format's error taxonomy, so callers can
//! match on what went wrong instead of inspecting message text.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum GbfError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("bad magic: not a GBF/GREDBIN file")]
    BadMagic,

    #[error("header JSON parse error: {0}")]
    HeaderJsonParse(String),

    #[error("header CRC mismatch: expected {expected}, got {got}")]
    HeaderCrcMismatch { expected: String, got: String },

    #[error("field `{name}` CRC mismatch: expected {expected:08X}, got {got:08X}")]
    FieldCrcMismatch { name: String, expected: u32, got: u32 },

    #[error("zlib error for field `{name}`: {message}")]
    ZlibError { name: String, message: String },

    #[error("truncated: {0}")]
    Truncated(String),

    #[error("variable not found: {0}")]
    NotFound(String),

    #[error("unsupported value: {0}")]
    Unsupported(String),

    #[error("invalid data: {0}")]
    InvalidData(String),
}

impl From<serde_json::Error> for GbfError {
    fn from(e: serde_json::Error) -> Self {
        GbfError::HeaderJsonParse(e.to_string())
    }
}

impl From<std::string::FromUtf8Error> for GbfError {
    fn from(e: std::string::FromUtf8Error) -> Self {
        GbfError::InvalidData(format!("invalid UTF-8: {e}"))
    }
}

pub type Result<T> = std::result::Result<T, GbfError>;
