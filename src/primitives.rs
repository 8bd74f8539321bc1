//! Little-endian byte plumbing and checked arithmetic shared by the leaf
//! codecs and the header/writer stages.

use crate::error::{GbfError, Result};

/// Product of a shape's dimensions, with GBF's zero-dimension convention:
/// an empty shape has zero elements, and so does any shape containing a
/// zero-length dimension.
pub fn numel(shape: &[usize]) -> Result<usize> {
    if shape.is_empty() {
        return Ok(0);
    }
    if shape.iter().any(|&d| d == 0) {
        return Ok(0);
    }
    let mut n: usize = 1;
    for &d in shape {
        n = n
            .checked_mul(d)
            .ok_or_else(|| GbfError::InvalidData("shape element count overflow".to_string()))?;
    }
    Ok(n)
}

pub fn mul_usize(a: usize, b: usize) -> Result<usize> {
    a.checked_mul(b)
        .ok_or_else(|| GbfError::InvalidData("usize multiplication overflow".to_string()))
}

pub fn add_u64(a: u64, b: u64) -> Result<u64> {
    a.checked_add(b)
        .ok_or_else(|| GbfError::InvalidData("u64 addition overflow".to_string()))
}

pub fn u64_to_usize(v: u64, what: &str) -> Result<usize> {
    usize::try_from(v).map_err(|_| GbfError::Unsupported(format!("{what} too large for this platform")))
}

/// A growable little-endian byte buffer used by the leaf wire codecs.
#[derive(Debug, Default, Clone)]
pub struct ByteBuffer {
    bytes: Vec<u8>,
}

impl ByteBuffer {
    pub fn new() -> Self {
        Self { bytes: Vec::new() }
    }

    pub fn with_capacity(cap: usize) -> Self {
        Self { bytes: Vec::with_capacity(cap) }
    }

    pub fn append_byte(&mut self, b: u8) {
        self.bytes.push(b);
    }

    pub fn append_bytes(&mut self, b: &[u8]) {
        self.bytes.extend_from_slice(b);
    }

    pub fn append_u16_le(&mut self, v: u16) {
        self.bytes.extend_from_slice(&v.to_le_bytes());
    }

    pub fn append_u32_le(&mut self, v: u32) {
        self.bytes.extend_from_slice(&v.to_le_bytes());
    }

    pub fn append_i32_le(&mut self, v: i32) {
        self.bytes.extend_from_slice(&v.to_le_bytes());
    }

    pub fn append_i64_le(&mut self, v: i64) {
        self.bytes.extend_from_slice(&v.to_le_bytes());
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// A cursor over a decoded leaf payload, used to pull little-endian
/// fixed-width fields out while tracking truncation.
pub struct ByteReader<'a> {
    bytes: &'a [u8],
    pos: usize,
    what: &'static str,
}

impl<'a> ByteReader<'a> {
    pub fn new(bytes: &'a [u8], what: &'static str) -> Self {
        Self { bytes, pos: 0, what }
    }

    fn need(&self, n: usize) -> Result<()> {
        if self.pos + n > self.bytes.len() {
            return Err(GbfError::Truncated(format!("{} payload truncated", self.what)));
        }
        Ok(())
    }

    pub fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        self.need(n)?;
        let s = &self.bytes[self.pos..self.pos + n];
        self.pos += n;
        Ok(s)
    }

    pub fn take_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn take_u16_le(&mut self) -> Result<u16> {
        let s = self.take(2)?;
        Ok(u16::from_le_bytes([s[0], s[1]]))
    }

    pub fn take_u32_le(&mut self) -> Result<u32> {
        let s = self.take(4)?;
        Ok(u32::from_le_bytes([s[0], s[1], s[2], s[3]]))
    }

    pub fn take_i16_le(&mut self) -> Result<i16> {
        let s = self.take(2)?;
        Ok(i16::from_le_bytes([s[0], s[1]]))
    }

    pub fn take_i32_le(&mut self) -> Result<i32> {
        let s = self.take(4)?;
        Ok(i32::from_le_bytes([s[0], s[1], s[2], s[3]]))
    }

    pub fn take_i64_le(&mut self) -> Result<i64> {
        let s = self.take(8)?;
        Ok(i64::from_le_bytes([s[0], s[1], s[2], s[3], s[4], s[5], s[6], s[7]]))
    }

    pub fn remaining(&self) -> &'a [u8] {
        &self.bytes[self.pos..]
    }

    pub fn remaining_len(&self) -> usize {
        self.bytes.len() - self.pos
    }

    pub fn at_end(&self) -> bool {
        self.pos == self.bytes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numel_empty_shape_is_one_dimension_zero() {
        assert_eq!(numel(&[]).unwrap(), 0);
    }

    #[test]
    fn numel_with_zero_dim_is_zero() {
        assert_eq!(numel(&[3, 0]).unwrap(), 0);
        assert_eq!(numel(&[0, 0]).unwrap(), 0);
    }

    #[test]
    fn numel_product() {
        assert_eq!(numel(&[2, 3]).unwrap(), 6);
        assert_eq!(numel(&[4]).unwrap(), 4);
    }

    #[test]
    fn numel_overflow_fails() {
        assert!(numel(&[usize::MAX, 2]).is_err());
    }

    #[test]
    fn byte_buffer_round_trips_fields() {
        let mut buf = ByteBuffer::new();
        buf.append_byte(1);
        buf.append_u16_le(0x0203);
        buf.append_u32_le(0x0405_0607);
        buf.append_i32_le(-1);
        buf.append_i64_le(-2);
        let bytes = buf.into_vec();

        let mut r = ByteReader::new(&bytes, "test");
        assert_eq!(r.take_u8().unwrap(), 1);
        assert_eq!(r.take_u16_le().unwrap(), 0x0203);
        assert_eq!(r.take_u32_le().unwrap(), 0x0405_0607);
        assert_eq!(r.take_i32_le().unwrap(), -1);
        assert_eq!(r.take_i64_le().unwrap(), -2);
        assert!(r.at_end());
    }

    #[test]
    fn byte_reader_reports_truncation() {
        let bytes = [0u8; 2];
        let mut r = ByteReader::new(&bytes, "test");
        assert!(r.take_u32_le().is_err());
    }
}
