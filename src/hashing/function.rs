//! Named hash-function family used for partition resolution and ring
//! placement.
//!
//! Peers only agree on partition ownership if they hash identical byte
//! sequences with the same function, so the builder fixes the encoding of
//! every input: integers are appended big-endian, strings as raw UTF-8.

use crate::error::{Error, Result};
use crc::{Crc, CRC_32_ISO_HDLC};
use md5::{Digest, Md5};
use std::io::Cursor;
use std::str::FromStr;

const CRC32: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

/// Hash family selectable by configuration name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashFunction {
    Murmur3_32,
    Murmur3_128,
    Crc32,
    Md5,
}

impl HashFunction {
    /// The configuration name of the function.
    pub fn name(&self) -> &'static str {
        match self {
            HashFunction::Murmur3_32 => "murmur3_32",
            HashFunction::Murmur3_128 => "murmur3_128",
            HashFunction::Crc32 => "crc32",
            HashFunction::Md5 => "md5",
        }
    }

    /// Start a streaming hasher for this function.
    pub fn hasher(&self) -> Hasher {
        Hasher {
            function: *self,
            buf: Vec::new(),
        }
    }

    fn digest(&self, data: &[u8]) -> HashCode {
        match self {
            HashFunction::Murmur3_32 => {
                // Reads from an in-memory cursor cannot fail.
                let h = murmur3::murmur3_32(&mut Cursor::new(data), 0).unwrap_or_default();
                HashCode::from_u32(h)
            }
            HashFunction::Murmur3_128 => {
                let h = murmur3::murmur3_x64_128(&mut Cursor::new(data), 0).unwrap_or_default();
                HashCode::from_u128(h)
            }
            HashFunction::Crc32 => HashCode::from_u32(CRC32.checksum(data)),
            HashFunction::Md5 => {
                let digest = Md5::digest(data);
                let mut bytes = [0u8; 16];
                bytes.copy_from_slice(&digest);
                HashCode { bytes, len: 16 }
            }
        }
    }
}

impl FromStr for HashFunction {
    type Err = Error;

    fn from_str(name: &str) -> Result<Self> {
        match name {
            "murmur3_32" => Ok(HashFunction::Murmur3_32),
            "murmur3_128" => Ok(HashFunction::Murmur3_128),
            "crc32" => Ok(HashFunction::Crc32),
            "md5" => Ok(HashFunction::Md5),
            _ => Err(Error::UnknownHashFunction(name.to_string())),
        }
    }
}

/// Streaming builder over the bytes to be hashed.
///
/// Inputs are appended in call order; `finish` consumes the builder and
/// produces the digest.
#[derive(Debug, Clone)]
pub struct Hasher {
    function: HashFunction,
    buf: Vec<u8>,
}

impl Hasher {
    /// Append a 64-bit integer, big-endian.
    pub fn put_i64(mut self, value: i64) -> Self {
        self.buf.extend_from_slice(&value.to_be_bytes());
        self
    }

    /// Append a 32-bit integer, big-endian.
    pub fn put_i32(mut self, value: i32) -> Self {
        self.buf.extend_from_slice(&value.to_be_bytes());
        self
    }

    /// Append the UTF-8 bytes of a string.
    pub fn put_str(mut self, value: &str) -> Self {
        self.buf.extend_from_slice(value.as_bytes());
        self
    }

    /// Compute the digest over everything appended so far.
    pub fn finish(self) -> HashCode {
        self.function.digest(&self.buf)
    }
}

/// Digest of a hash computation, convertible to the integer widths the
/// fabric works with.
///
/// Narrow digests (murmur3_32, crc32) are zero-extended, so `as_i64` on a
/// 32-bit digest equals the unsigned value of `as_i32`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashCode {
    bytes: [u8; 16],
    len: usize,
}

impl HashCode {
    fn from_u32(value: u32) -> Self {
        let mut bytes = [0u8; 16];
        bytes[..4].copy_from_slice(&value.to_le_bytes());
        Self { bytes, len: 4 }
    }

    fn from_u128(value: u128) -> Self {
        Self {
            bytes: value.to_le_bytes(),
            len: 16,
        }
    }

    /// Digest length in bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the digest is empty (never, for the supported functions).
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The leading 32 bits of the digest, little-endian.
    pub fn as_i32(&self) -> i32 {
        i32::from_le_bytes([self.bytes[0], self.bytes[1], self.bytes[2], self.bytes[3]])
    }

    /// The leading 64 bits of the digest, little-endian, zero-extended for
    /// narrow digests.
    pub fn as_i64(&self) -> i64 {
        i64::from_le_bytes([
            self.bytes[0],
            self.bytes[1],
            self.bytes[2],
            self.bytes[3],
            self.bytes[4],
            self.bytes[5],
            self.bytes[6],
            self.bytes[7],
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_for_name() {
        assert_eq!(
            "murmur3_128".parse::<HashFunction>().unwrap(),
            HashFunction::Murmur3_128
        );
        assert_eq!(
            "crc32".parse::<HashFunction>().unwrap(),
            HashFunction::Crc32
        );
        let err = "blake3".parse::<HashFunction>().unwrap_err();
        assert!(matches!(err, Error::UnknownHashFunction(name) if name == "blake3"));
    }

    #[test]
    fn test_deterministic() {
        for function in [
            HashFunction::Murmur3_32,
            HashFunction::Murmur3_128,
            HashFunction::Crc32,
            HashFunction::Md5,
        ] {
            let a = function
                .hasher()
                .put_str("core-1")
                .put_i32(3)
                .finish();
            let b = function
                .hasher()
                .put_str("core-1")
                .put_i32(3)
                .finish();
            assert_eq!(a.as_i64(), b.as_i64(), "{}", function.name());
            assert_eq!(a.as_i32(), b.as_i32(), "{}", function.name());

            let c = function
                .hasher()
                .put_str("core-2")
                .put_i32(3)
                .finish();
            assert_ne!(a.as_i64(), c.as_i64(), "{}", function.name());
        }
    }

    #[test]
    fn test_input_encoding_is_big_endian() {
        // put_i32(1) and put_i32(256) must produce different byte streams
        // that differ in more than the trailing byte.
        let a = HashFunction::Md5.hasher().put_i32(0x0102_0304).finish();
        let b = HashFunction::Md5
            .hasher()
            .put_str("\u{1}\u{2}\u{3}\u{4}")
            .finish();
        assert_eq!(a, b);

        let wide = HashFunction::Md5.hasher().put_i64(0x0102_0304).finish();
        assert_ne!(a, wide);
    }

    #[test]
    fn test_crc32_check_value() {
        // Standard CRC-32/ISO-HDLC check input.
        let code = HashFunction::Crc32.hasher().put_str("123456789").finish();
        assert_eq!(code.as_i32() as u32, 0xcbf4_3926);
    }

    #[test]
    fn test_narrow_digest_zero_extends() {
        let code = HashFunction::Crc32.hasher().put_str("tb_core").finish();
        assert_eq!(code.len(), 4);
        assert_eq!(code.as_i64(), (code.as_i32() as u32) as i64);
        assert!(code.as_i64() >= 0);
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(HashFunction::Murmur3_32.hasher().finish().as_i32(), 0);
        assert_eq!(HashFunction::Murmur3_128.hasher().finish().as_i64(), 0);
    }

    #[test]
    fn test_wide_digest_truncation() {
        let code = HashFunction::Murmur3_128
            .hasher()
            .put_i64(42)
            .put_i64(7)
            .finish();
        assert_eq!(code.len(), 16);
        // The 32-bit view is the truncation of the 64-bit view.
        assert_eq!(code.as_i32(), code.as_i64() as i32);
    }
}
