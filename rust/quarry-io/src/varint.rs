//! Variable-length integer encoding used throughout the index files.
//!
//! A `VInt` stores a non-negative integer 7 bits at a time, low-order group first.
//! The high bit of every byte is a continuation flag: when set, more bytes follow.
//! Values below 128 take a single byte, a full `u32` takes at most 5 bytes.
//! A `VLong` uses the same scheme for 63-bit values (at most 9 bytes).
//!
//! Signed deltas are mapped onto unsigned values with zig-zag encoding first, so
//! that small negative numbers stay small on disk: `0, -1, 1, -2, 2, ...` become
//! `0, 1, 2, 3, 4, ...`.

use quarry_common::{Result, bail_corrupt};

/// Maximum encoded size of a `VInt`.
pub const MAX_VINT_LEN: usize = 5;

/// Maximum encoded size of a `VLong`.
pub const MAX_VLONG_LEN: usize = 9;

/// Largest value representable as a `VLong`.
pub const MAX_VLONG: u64 = i64::MAX as u64;

/// Appends `value` to `out` as a `VInt`.
#[inline]
pub fn write_vint(mut value: u32, out: &mut Vec<u8>) {
    while value >= 0x80 {
        out.push((value as u8) | 0x80);
        value >>= 7;
    }
    out.push(value as u8);
}

/// Appends `value` to `out` as a `VLong`.
///
/// `value` must not exceed [`MAX_VLONG`]; callers writing untrusted values check this
/// before (see `IndexOutput::write_vlong`).
#[inline]
pub fn write_vlong(mut value: u64, out: &mut Vec<u8>) {
    debug_assert!(value <= MAX_VLONG);
    while value >= 0x80 {
        out.push((value as u8) | 0x80);
        value >>= 7;
    }
    out.push(value as u8);
}

/// Returns the number of bytes `write_vint` emits for `value`.
#[inline]
pub fn vint_len(value: u32) -> usize {
    let bits = 32 - (value | 1).leading_zeros() as usize;
    bits.div_ceil(7)
}

/// Returns the number of bytes `write_vlong` emits for `value`.
#[inline]
pub fn vlong_len(value: u64) -> usize {
    let bits = 64 - (value | 1).leading_zeros() as usize;
    bits.div_ceil(7)
}

/// Decodes a `VInt` pulling bytes from `next_byte`.
///
/// Fails with a corruption error naming `resource` when the encoding does not
/// terminate within 5 bytes or carries bits beyond 32.
#[inline]
pub fn decode_vint(resource: &str, mut next_byte: impl FnMut() -> Result<u8>) -> Result<u32> {
    let mut b = next_byte()?;
    if b < 0x80 {
        return Ok(b as u32);
    }
    let mut value = (b & 0x7F) as u32;
    for shift in [7u32, 14, 21] {
        b = next_byte()?;
        value |= ((b & 0x7F) as u32) << shift;
        if b < 0x80 {
            return Ok(value);
        }
    }
    b = next_byte()?;
    if b > 0x0F {
        bail_corrupt!(resource, "invalid vInt detected (too many bits)");
    }
    Ok(value | ((b as u32) << 28))
}

/// Decodes a `VLong` pulling bytes from `next_byte`.
#[inline]
pub fn decode_vlong(resource: &str, mut next_byte: impl FnMut() -> Result<u8>) -> Result<u64> {
    let mut value = 0u64;
    for i in 0..MAX_VLONG_LEN {
        let b = next_byte()?;
        value |= ((b & 0x7F) as u64) << (7 * i);
        if b < 0x80 {
            return Ok(value);
        }
    }
    bail_corrupt!(resource, "invalid vLong detected (negative or too many bits)");
}

/// Decodes a `VInt` from the start of `buf`, returning the value and the number of
/// bytes consumed.
pub fn read_vint(buf: &[u8]) -> Result<(u32, usize)> {
    let mut pos = 0;
    let value = decode_vint("vint", || next_from_slice(buf, &mut pos))?;
    Ok((value, pos))
}

/// Decodes a `VLong` from the start of `buf`, returning the value and the number of
/// bytes consumed.
pub fn read_vlong(buf: &[u8]) -> Result<(u64, usize)> {
    let mut pos = 0;
    let value = decode_vlong("vlong", || next_from_slice(buf, &mut pos))?;
    Ok((value, pos))
}

fn next_from_slice(buf: &[u8], pos: &mut usize) -> Result<u8> {
    match buf.get(*pos) {
        Some(&b) => {
            *pos += 1;
            Ok(b)
        }
        None => bail_corrupt!("varint", "unexpected end of input at byte {}", *pos),
    }
}

#[inline]
pub fn zigzag_encode_i32(value: i32) -> u32 {
    ((value << 1) ^ (value >> 31)) as u32
}

#[inline]
pub fn zigzag_decode_i32(value: u32) -> i32 {
    ((value >> 1) as i32) ^ -((value & 1) as i32)
}

#[inline]
pub fn zigzag_encode_i64(value: i64) -> u64 {
    ((value << 1) ^ (value >> 63)) as u64
}

#[inline]
pub fn zigzag_decode_i64(value: u64) -> i64 {
    ((value >> 1) as i64) ^ -((value & 1) as i64)
}
