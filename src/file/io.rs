//! Low-level byte order and safe reading/writing utilities for the module container.
//!
//! All multi-byte values in the container are little-endian. Reading is bounds-checked
//! against the underlying buffer and advances a caller-held offset; writing appends to a
//! growable output buffer so it cannot overrun.
//!
//! # Key Components
//!
//! - [`crate::file::io::LeValue`] - Trait implemented by every primitive the container stores
//! - [`crate::file::io::read_le_at`] / [`crate::file::io::write_le`] - Primitive access
//! - [`crate::file::io::read_string_at`] / [`crate::file::io::write_string`] - Length-prefixed UTF-8
//! - [`crate::file::io::read_utf16_at`] / [`crate::file::io::write_utf16`] - Length-prefixed UTF-16LE,
//!   used for string literals carried by `ldstr` instructions

use widestring::Utf16String;

use crate::Result;

/// Primitive value that can be read from and written to the container in little-endian form.
pub trait LeValue: Sized + Copy {
    /// Number of bytes this value occupies in serialized form.
    const SIZE: usize;

    /// Decode a value from the first [`Self::SIZE`] bytes of `data`.
    ///
    /// Callers must have bounds-checked `data` already.
    fn from_le(data: &[u8]) -> Self;

    /// Append the little-endian encoding of `self` to `out`.
    fn put_le(self, out: &mut Vec<u8>);
}

macro_rules! impl_le_value {
    ($($t:ty),*) => {
        $(
            impl LeValue for $t {
                const SIZE: usize = std::mem::size_of::<$t>();

                fn from_le(data: &[u8]) -> Self {
                    let mut bytes = [0u8; std::mem::size_of::<$t>()];
                    bytes.copy_from_slice(&data[..std::mem::size_of::<$t>()]);
                    <$t>::from_le_bytes(bytes)
                }

                fn put_le(self, out: &mut Vec<u8>) {
                    out.extend_from_slice(&self.to_le_bytes());
                }
            }
        )*
    };
}

impl_le_value!(u8, u16, u32, u64, i8, i16, i32, i64);

/// Read a primitive at `offset`, advancing the offset past it.
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] if fewer than `T::SIZE` bytes remain.
pub fn read_le_at<T: LeValue>(data: &[u8], offset: &mut usize) -> Result<T> {
    let end = offset
        .checked_add(T::SIZE)
        .ok_or(crate::Error::OutOfBounds)?;
    if end > data.len() {
        return Err(crate::Error::OutOfBounds);
    }

    let value = T::from_le(&data[*offset..]);
    *offset = end;
    Ok(value)
}

/// Borrow `len` raw bytes at `offset`, advancing the offset past them.
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] if fewer than `len` bytes remain.
pub fn read_bytes_at<'a>(data: &'a [u8], offset: &mut usize, len: usize) -> Result<&'a [u8]> {
    let end = offset.checked_add(len).ok_or(crate::Error::OutOfBounds)?;
    if end > data.len() {
        return Err(crate::Error::OutOfBounds);
    }

    let bytes = &data[*offset..end];
    *offset = end;
    Ok(bytes)
}

/// Append the little-endian encoding of `value` to `out`.
pub fn write_le<T: LeValue>(out: &mut Vec<u8>, value: T) {
    value.put_le(out);
}

/// Read a `u32`-length-prefixed UTF-8 string at `offset`.
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] on a truncated buffer, or
/// [`crate::Error::Malformed`] if the bytes are not valid UTF-8.
pub fn read_string_at(data: &[u8], offset: &mut usize) -> Result<String> {
    let len = read_le_at::<u32>(data, offset)? as usize;
    let bytes = read_bytes_at(data, offset, len)?;

    String::from_utf8(bytes.to_vec())
        .map_err(|_| malformed_error!("Invalid UTF-8 in string at offset {}", *offset - len))
}

/// Append a `u32`-length-prefixed UTF-8 string to `out`.
pub fn write_string(out: &mut Vec<u8>, value: &str) {
    write_le(out, value.len() as u32);
    out.extend_from_slice(value.as_bytes());
}

/// Read a `u32`-unit-count-prefixed UTF-16LE string at `offset`.
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] on a truncated buffer, or
/// [`crate::Error::Malformed`] if the code units are not valid UTF-16.
pub fn read_utf16_at(data: &[u8], offset: &mut usize) -> Result<String> {
    let units = read_le_at::<u32>(data, offset)? as usize;

    // Cap the reservation by the bytes remaining; a hostile count fails below instead
    let remaining = data.len().saturating_sub(*offset);
    let mut decoded = Vec::with_capacity(units.min(remaining / 2));
    for _ in 0..units {
        decoded.push(read_le_at::<u16>(data, offset)?);
    }

    match Utf16String::from_vec(decoded) {
        Ok(value) => Ok(value.to_string()),
        Err(_) => Err(malformed_error!(
            "Invalid UTF-16 string literal at offset {}",
            *offset
        )),
    }
}

/// Append a `u32`-unit-count-prefixed UTF-16LE string to `out`.
pub fn write_utf16(out: &mut Vec<u8>, value: &str) {
    let units: Vec<u16> = value.encode_utf16().collect();

    write_le(out, units.len() as u32);
    for unit in units {
        write_le(out, unit);
    }
}
