//! Byte-level codecs shared by instruction data, account data and the
//! transaction wire format.
//!
//! Solana programs decode instruction arguments with bincode/borsh, both of
//! which lay out unsigned integers little-endian. [`LeUint`] is only
//! implemented for `u8` through `u64`; wider integers are rejected at
//! compile time.

use crate::error::SolError;

mod sealed {
    pub trait Sealed {}
}

/// An unsigned integer of at most 64 bits with a fixed little-endian layout.
pub trait LeUint: sealed::Sealed + Copy {
    /// Encoded width in bytes.
    const SIZE: usize;

    /// Append the little-endian encoding of `self` to `out`.
    fn write_le(self, out: &mut Vec<u8>);

    /// Decode from exactly [`Self::SIZE`] little-endian bytes.
    fn read_le(bytes: &[u8]) -> Option<Self>;
}

macro_rules! impl_le_uint {
    ($($ty:ty),*) => {
        $(
            impl sealed::Sealed for $ty {}

            impl LeUint for $ty {
                const SIZE: usize = std::mem::size_of::<$ty>();

                fn write_le(self, out: &mut Vec<u8>) {
                    out.extend_from_slice(&self.to_le_bytes());
                }

                fn read_le(bytes: &[u8]) -> Option<Self> {
                    let buf: [u8; std::mem::size_of::<$ty>()] = bytes.try_into().ok()?;
                    Some(<$ty>::from_le_bytes(buf))
                }
            }
        )*
    };
}

impl_le_uint!(u8, u16, u32, u64);

/// Encode `value` as exactly `T::SIZE` little-endian bytes.
pub fn uint_to_le_bytes<T: LeUint>(value: T) -> Vec<u8> {
    let mut out = Vec::with_capacity(T::SIZE);
    value.write_le(&mut out);
    out
}

/// Decode a little-endian integer. `bytes` must be exactly `T::SIZE` long.
pub fn uint_from_le_bytes<T: LeUint>(bytes: &[u8]) -> Option<T> {
    T::read_le(bytes)
}

// ---------------------------------------------------------------------------
// Compact-u16
// ---------------------------------------------------------------------------

/// Encode a `u16` in Solana's compact-u16 (shortvec) format: seven bits per
/// byte, high bit set on every byte but the last.
pub fn encode_compact_u16(value: u16) -> Vec<u8> {
    let mut val = value as u32;
    let mut out = Vec::with_capacity(3);

    loop {
        let mut byte = (val & 0x7f) as u8;
        val >>= 7;
        if val > 0 {
            byte |= 0x80;
        }
        out.push(byte);
        if val == 0 {
            break;
        }
    }

    out
}

/// Decode a compact-u16 from the front of `data`.
///
/// Returns `(value, bytes_consumed)`.
pub fn decode_compact_u16(data: &[u8]) -> Result<(u16, usize), SolError> {
    let mut value: u32 = 0;

    for (i, byte) in data.iter().take(3).enumerate() {
        value |= ((byte & 0x7f) as u32) << (7 * i);
        if byte & 0x80 == 0 {
            return u16::try_from(value)
                .map(|v| (v, i + 1))
                .map_err(|_| SolError::SerializationError("compact-u16 value overflow".into()));
        }
    }

    Err(SolError::SerializationError(
        "unexpected end of data while decoding compact-u16".into(),
    ))
}

// ---------------------------------------------------------------------------
// Sequential reader
// ---------------------------------------------------------------------------

/// Cursor over a byte buffer. Every read is bounds checked and fails with
/// [`SolError::SerializationError`] on truncation instead of panicking.
#[derive(Debug)]
pub struct ByteReader<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Bytes left after the cursor.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.offset
    }

    /// Consume `len` bytes and return them.
    pub fn take(&mut self, len: usize) -> Result<&'a [u8], SolError> {
        let end = self
            .offset
            .checked_add(len)
            .filter(|end| *end <= self.data.len())
            .ok_or_else(|| {
                SolError::SerializationError(format!(
                    "need {len} bytes at offset {}, only {} left",
                    self.offset,
                    self.remaining()
                ))
            })?;
        let slice = &self.data[self.offset..end];
        self.offset = end;
        Ok(slice)
    }

    /// Advance the cursor without inspecting the bytes.
    pub fn skip(&mut self, len: usize) -> Result<(), SolError> {
        self.take(len).map(|_| ())
    }

    pub fn read_uint<T: LeUint>(&mut self) -> Result<T, SolError> {
        let bytes = self.take(T::SIZE)?;
        T::read_le(bytes)
            .ok_or_else(|| SolError::SerializationError("integer width mismatch".into()))
    }

    pub fn read_u8(&mut self) -> Result<u8, SolError> {
        self.read_uint::<u8>()
    }

    pub fn read_u32(&mut self) -> Result<u32, SolError> {
        self.read_uint::<u32>()
    }

    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N], SolError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    pub fn read_compact_u16(&mut self) -> Result<u16, SolError> {
        let (value, consumed) = decode_compact_u16(&self.data[self.offset..])?;
        self.offset += consumed;
        Ok(value)
    }
}
