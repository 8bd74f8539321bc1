//! The restricted JSON contract the header relies on: objects, arrays,
//! strings (with `\uXXXX` escapes), integers, booleans and null, serialized
//! compactly with no trailing data tolerated on parse.
//!
//! The grammar itself is delegated to `serde_json`, which already speaks
//! exactly this subset for the types the header uses (`serde_json::Value`'s
//! `Number` preserves the original integer magnitude losslessly for every
//! value this format produces). This module adds two behaviors beyond what
//! `serde_json::from_str`/`to_string` give for free: rejecting trailing
//! bytes after the top-level value, and a single place to control
//! compact-vs-pretty serialization.

use crate::error::Result;
use serde::{de::DeserializeOwned, Serialize};

/// Parse `text` as a single JSON value of type `T`, failing if there is any
/// non-whitespace data after the value.
pub fn parse_strict<T: DeserializeOwned>(text: &str) -> Result<T> {
    let mut de = serde_json::Deserializer::from_str(text);
    let value = T::deserialize(&mut de)?;
    de.end()?;
    Ok(value)
}

/// Serialize `value` compactly (no extraneous whitespace).
pub fn to_compact_string<T: Serialize>(value: &T) -> Result<String> {
    Ok(serde_json::to_string(value)?)
}

/// Serialize `value` with indentation, for headers a human might read
/// directly out of the file.
pub fn to_pretty_string<T: Serialize>(value: &T) -> Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[test]
    fn rejects_trailing_garbage() {
        let err = parse_strict::<Value>("{}garbage");
        assert!(err.is_err());
    }

    #[test]
    fn accepts_trailing_whitespace() {
        let v: Value = parse_strict("{}\n").unwrap();
        assert!(v.is_object());
    }

    #[test]
    fn compact_has_no_whitespace() {
        let v = serde_json::json!({"a": 1, "b": [1,2,3]});
        let s = to_compact_string(&v).unwrap();
        assert!(!s.contains(' ') && !s.contains('\n'));
    }
}
