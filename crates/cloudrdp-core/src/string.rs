//! UTF-16LE string helpers.
//!
//! Redirected paths and names travel as UTF-16LE, two bytes per code unit,
//! usually with an explicit byte length and a trailing NUL code unit.

use crate::{DecodeResult, EncodeResult, ReadCursor, WriteCursor};

/// Encodes a string as UTF-16LE, without a terminator.
pub fn to_utf16_bytes(value: &str) -> Vec<u8> {
    value.encode_utf16().flat_map(u16::to_le_bytes).collect()
}

/// Decodes a UTF-16LE byte slice, stripping any trailing NUL code units.
///
/// A trailing odd byte is ignored; unpaired surrogates are replaced rather
/// than rejected, matching how redirected names are displayed.
pub fn from_utf16_bytes(value: &[u8]) -> String {
    let units: Vec<u16> = value
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect();
    let result = String::from_utf16_lossy(&units);
    result.trim_end_matches('\0').to_owned()
}

/// Reads `byte_len` bytes from the cursor and decodes them as UTF-16LE.
pub fn read_utf16_from_cursor(src: &mut ReadCursor<'_>, byte_len: usize) -> DecodeResult<String> {
    ensure_size!(ctx: "decode string (UTF-16)", in: src, size: byte_len);
    Ok(from_utf16_bytes(src.read_slice(byte_len)))
}

/// Writes a string as UTF-16LE, optionally NUL-terminated.
pub fn write_utf16_to_cursor(dst: &mut WriteCursor<'_>, value: &str, with_terminator: bool) -> EncodeResult<()> {
    let len = utf16_encoded_len(value, with_terminator);
    ensure_size!(ctx: "encode string (UTF-16)", in: dst, size: len);
    for unit in value.encode_utf16() {
        dst.write_u16(unit);
    }
    if with_terminator {
        dst.write_u16(0);
    }
    Ok(())
}

/// Length in bytes of `value` once encoded as UTF-16LE.
pub fn utf16_encoded_len(value: &str, with_terminator: bool) -> usize {
    value.encode_utf16().count() * 2 + if with_terminator { 2 } else { 0 }
}
