//! Canonical binary encoding shared by signers and validators.
//!
//! Encoding rules (BCS-compatible):
//! 1. Fixed-width integers are little-endian: u8/u32/u64/u128 (and u256 via `Amount`).
//! 2. Fixed-length byte arrays are written raw, without a length prefix.
//! 3. Sequences are prefixed with their length as ULEB128 (at most 2^31 - 1).
//! 4. Optional values carry a one-byte presence tag (0 or 1) followed by the payload.
//! 5. Enums carry a ULEB128 variant index followed by the variant payload.
//! 6. Structs are the concatenation of their fields in declaration order.
//!
//! Field order is part of the wire contract.

use crate::error::FormatError;

/// Largest sequence length accepted by the encoding.
pub const MAX_SEQUENCE_LENGTH: usize = (1 << 31) - 1;

/// A value with a canonical byte representation.
pub trait Canonical: Sized {
    fn encode_into(&self, out: &mut Vec<u8>);

    fn decode_from(reader: &mut Reader<'_>) -> Result<Self, FormatError>;

    fn to_canonical_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.encode_into(&mut out);
        out
    }

    /// Decodes a complete value; leftover input is an error.
    fn from_canonical_bytes(bytes: &[u8]) -> Result<Self, FormatError> {
        let mut reader = Reader::new(bytes);
        let value = Self::decode_from(&mut reader)?;
        reader.finish()?;
        Ok(value)
    }
}

pub fn encode<T: Canonical>(value: &T) -> Vec<u8> {
    value.to_canonical_bytes()
}

pub fn decode<T: Canonical>(bytes: &[u8]) -> Result<T, FormatError> {
    T::from_canonical_bytes(bytes)
}

pub fn put_u8(out: &mut Vec<u8>, value: u8) {
    out.push(value);
}

pub fn put_u32(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_le_bytes());
}

pub fn put_u64(out: &mut Vec<u8>, value: u64) {
    out.extend_from_slice(&value.to_le_bytes());
}

pub fn put_u128(out: &mut Vec<u8>, value: u128) {
    out.extend_from_slice(&value.to_le_bytes());
}

pub fn put_uleb128(out: &mut Vec<u8>, mut value: u32) {
    while value >= 0x80 {
        out.push((value as u8 & 0x7f) | 0x80);
        value >>= 7;
    }
    out.push(value as u8);
}

/// Writes a sequence length prefix.
///
/// Panics if `len` exceeds [`MAX_SEQUENCE_LENGTH`]; such a value cannot exist in memory for
/// any type this crate encodes.
pub fn put_len(out: &mut Vec<u8>, len: usize) {
    assert!(len <= MAX_SEQUENCE_LENGTH, "sequence too long to encode");
    put_uleb128(out, len as u32);
}

pub fn put_variant(out: &mut Vec<u8>, index: u32) {
    put_uleb128(out, index);
}

/// Cursor over canonical input.
#[derive(Debug, Clone)]
pub struct Reader<'a> {
    input: &'a [u8],
    offset: usize,
}

impl<'a> Reader<'a> {
    pub fn new(input: &'a [u8]) -> Self {
        Self { input, offset: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.input.len() - self.offset
    }

    pub fn take(&mut self, n: usize) -> Result<&'a [u8], FormatError> {
        if self.remaining() < n {
            return Err(FormatError::UnexpectedEnd {
                needed: n,
                remaining: self.remaining(),
            });
        }
        let slice = &self.input[self.offset..self.offset + n];
        self.offset += n;
        Ok(slice)
    }

    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N], FormatError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    pub fn read_u8(&mut self) -> Result<u8, FormatError> {
        Ok(self.take(1)?[0])
    }

    pub fn read_u32(&mut self) -> Result<u32, FormatError> {
        Ok(u32::from_le_bytes(self.read_array()?))
    }

    pub fn read_u64(&mut self) -> Result<u64, FormatError> {
        Ok(u64::from_le_bytes(self.read_array()?))
    }

    pub fn read_u128(&mut self) -> Result<u128, FormatError> {
        Ok(u128::from_le_bytes(self.read_array()?))
    }

    pub fn read_uleb128(&mut self) -> Result<u32, FormatError> {
        let mut value: u64 = 0;
        for shift in (0..35).step_by(7) {
            let byte = self.read_u8()?;
            value |= u64::from(byte & 0x7f) << shift;
            if byte & 0x80 == 0 {
                if shift > 0 && byte == 0 {
                    return Err(FormatError::NonCanonicalUleb128);
                }
                return u32::try_from(value).map_err(|_| FormatError::Uleb128Overflow);
            }
        }
        Err(FormatError::Uleb128Overflow)
    }

    pub fn read_len(&mut self) -> Result<usize, FormatError> {
        let len = self.read_uleb128()? as usize;
        if len > MAX_SEQUENCE_LENGTH {
            return Err(FormatError::LengthOverflow(len as u64));
        }
        Ok(len)
    }

    pub fn read_variant(&mut self) -> Result<u32, FormatError> {
        self.read_uleb128()
    }

    pub fn finish(&self) -> Result<(), FormatError> {
        match self.remaining() {
            0 => Ok(()),
            n => Err(FormatError::TrailingBytes(n)),
        }
    }
}

impl Canonical for u8 {
    fn encode_into(&self, out: &mut Vec<u8>) {
        put_u8(out, *self);
    }

    fn decode_from(reader: &mut Reader<'_>) -> Result<Self, FormatError> {
        reader.read_u8()
    }
}

impl Canonical for bool {
    fn encode_into(&self, out: &mut Vec<u8>) {
        put_u8(out, u8::from(*self));
    }

    fn decode_from(reader: &mut Reader<'_>) -> Result<Self, FormatError> {
        match reader.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(FormatError::InvalidBool(other)),
        }
    }
}

impl Canonical for u32 {
    fn encode_into(&self, out: &mut Vec<u8>) {
        put_u32(out, *self);
    }

    fn decode_from(reader: &mut Reader<'_>) -> Result<Self, FormatError> {
        reader.read_u32()
    }
}

impl Canonical for u64 {
    fn encode_into(&self, out: &mut Vec<u8>) {
        put_u64(out, *self);
    }

    fn decode_from(reader: &mut Reader<'_>) -> Result<Self, FormatError> {
        reader.read_u64()
    }
}

impl Canonical for u128 {
    fn encode_into(&self, out: &mut Vec<u8>) {
        put_u128(out, *self);
    }

    fn decode_from(reader: &mut Reader<'_>) -> Result<Self, FormatError> {
        reader.read_u128()
    }
}

impl<const N: usize> Canonical for [u8; N] {
    fn encode_into(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(self);
    }

    fn decode_from(reader: &mut Reader<'_>) -> Result<Self, FormatError> {
        reader.read_array()
    }
}

impl<T: Canonical> Canonical for Option<T> {
    fn encode_into(&self, out: &mut Vec<u8>) {
        match self {
            Some(value) => {
                put_u8(out, 1);
                value.encode_into(out);
            }
            None => put_u8(out, 0),
        }
    }

    fn decode_from(reader: &mut Reader<'_>) -> Result<Self, FormatError> {
        match reader.read_u8()? {
            0 => Ok(None),
            1 => Ok(Some(T::decode_from(reader)?)),
            other => Err(FormatError::InvalidOptionTag(other)),
        }
    }
}

impl<T: Canonical> Canonical for Vec<T> {
    fn encode_into(&self, out: &mut Vec<u8>) {
        put_len(out, self.len());
        for item in self {
            item.encode_into(out);
        }
    }

    fn decode_from(reader: &mut Reader<'_>) -> Result<Self, FormatError> {
        let len = reader.read_len()?;
        // Every element occupies at least one byte.
        let mut items = Vec::with_capacity(len.min(reader.remaining()));
        for _ in 0..len {
            items.push(T::decode_from(reader)?);
        }
        Ok(items)
    }
}

impl<A: Canonical, B: Canonical> Canonical for (A, B) {
    fn encode_into(&self, out: &mut Vec<u8>) {
        self.0.encode_into(out);
        self.1.encode_into(out);
    }

    fn decode_from(reader: &mut Reader<'_>) -> Result<Self, FormatError> {
        let a = A::decode_from(reader)?;
        let b = B::decode_from(reader)?;
        Ok((a, b))
    }
}

#[cfg(test)]
mod tests {
    use super::{decode, encode, put_uleb128, Canonical, Reader};
    use crate::error::FormatError;

    #[test]
    fn integers_are_little_endian_fixed_width() {
        assert_eq!(encode(&0x0102u64), vec![0x02, 0x01, 0, 0, 0, 0, 0, 0]);
        assert_eq!(encode(&1u128).len(), 16);
        assert_eq!(encode(&7u8), vec![7]);
    }

    #[test]
    fn uleb128_golden_values() {
        let cases: &[(u32, &[u8])] = &[
            (0, &[0x00]),
            (1, &[0x01]),
            (127, &[0x7f]),
            (128, &[0x80, 0x01]),
            (300, &[0xac, 0x02]),
            (16_384, &[0x80, 0x80, 0x01]),
            (u32::MAX, &[0xff, 0xff, 0xff, 0xff, 0x0f]),
        ];
        for (value, bytes) in cases {
            let mut out = Vec::new();
            put_uleb128(&mut out, *value);
            assert_eq!(out.as_slice(), *bytes, "encoding {value}");
            assert_eq!(Reader::new(bytes).read_uleb128().unwrap(), *value);
        }
    }

    #[test]
    fn uleb128_rejects_non_canonical_and_overflow() {
        assert_eq!(
            Reader::new(&[0x80, 0x00]).read_uleb128(),
            Err(FormatError::NonCanonicalUleb128)
        );
        assert_eq!(
            Reader::new(&[0xff, 0xff, 0xff, 0xff, 0x1f]).read_uleb128(),
            Err(FormatError::Uleb128Overflow)
        );
        assert_eq!(
            Reader::new(&[0x80, 0x80, 0x80, 0x80, 0x80, 0x01]).read_uleb128(),
            Err(FormatError::Uleb128Overflow)
        );
    }

    #[test]
    fn sequences_and_options() {
        let value: Vec<Option<u8>> = vec![Some(5), None];
        let bytes = encode(&value);
        assert_eq!(bytes, vec![0x02, 0x01, 0x05, 0x00]);
        assert_eq!(decode::<Vec<Option<u8>>>(&bytes).unwrap(), value);
    }

    #[test]
    fn fixed_arrays_have_no_length_prefix() {
        let bytes = encode(&[0xabu8; 4]);
        assert_eq!(bytes, vec![0xab; 4]);
    }

    #[test]
    fn decode_reports_truncation_trailing_bytes_and_bad_tags() {
        assert!(matches!(
            decode::<u64>(&[1, 2, 3]),
            Err(FormatError::UnexpectedEnd { needed: 8, remaining: 3 })
        ));
        assert_eq!(decode::<u8>(&[1, 2]), Err(FormatError::TrailingBytes(1)));
        assert_eq!(
            decode::<Option<u8>>(&[2, 0]),
            Err(FormatError::InvalidOptionTag(2))
        );
        assert_eq!(decode::<bool>(&[3]), Err(FormatError::InvalidBool(3)));
    }

    #[test]
    fn huge_declared_length_fails_without_allocating() {
        let bytes = [0xff, 0xff, 0xff, 0xff, 0x07];
        let err = Vec::<u64>::from_canonical_bytes(&bytes).expect_err("must be truncated");
        assert!(matches!(err, FormatError::UnexpectedEnd { .. }));
    }
}
