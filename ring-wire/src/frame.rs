use bytes::{Buf, BufMut};
use byteorder::{BigEndian, ByteOrder};

use crate::error::WireError;

/// Cap on a participant list's wire length, well above any ring this core is
/// meant to run (guards against a corrupt or hostile length prefix).
pub const MAX_LIST_LEN: u32 = 1 << 16;

/// Writes a length-prefixed, NUL-terminated UTF-8 string: `u32 len` (the byte
/// count of `s` plus the trailing NUL) followed by `s`'s bytes and a `0u8`.
pub fn put_string(buf: &mut impl BufMut, s: &str) {
    let len = s.len() as u32 + 1;
    buf.put_u32(len);
    buf.put_slice(s.as_bytes());
    buf.put_u8(0);
}

/// Attempts to read a length-prefixed string out of `bytes` starting at
/// `*pos`, advancing `*pos` past it on success.
///
/// Returns `Ok(None)` (not an error) when `bytes` does not yet hold the full
/// string, so the caller can ask for more data without losing what it already
/// decoded of the surrounding frame.
pub fn try_get_string(bytes: &[u8], pos: &mut usize) -> Result<Option<String>, WireError> {
    if bytes.len() - *pos < 4 {
        return Ok(None);
    }
    let len = BigEndian::read_u32(&bytes[*pos..*pos + 4]) as usize;
    if bytes.len() - *pos < 4 + len {
        return Ok(None);
    }
    let start = *pos + 4;
    let raw = &bytes[start..start + len];
    *pos = start + len;
    match raw.split_last() {
        Some((0, rest)) => Ok(Some(String::from_utf8(rest.to_vec())?)),
        _ => Err(WireError::MissingNul),
    }
}

pub fn try_get_u32(bytes: &[u8], pos: &mut usize) -> Option<u32> {
    if bytes.len() - *pos < 4 {
        return None;
    }
    let v = BigEndian::read_u32(&bytes[*pos..*pos + 4]);
    *pos += 4;
    Some(v)
}

pub fn try_get_i32(bytes: &[u8], pos: &mut usize) -> Option<i32> {
    if bytes.len() - *pos < 4 {
        return None;
    }
    let v = BigEndian::read_i32(&bytes[*pos..*pos + 4]);
    *pos += 4;
    Some(v)
}

pub fn try_get_u8(bytes: &[u8], pos: &mut usize) -> Option<u8> {
    if bytes.len() - *pos < 1 {
        return None;
    }
    let v = bytes[*pos];
    *pos += 1;
    Some(v)
}

/// Reads a participant list (`u32 n` followed by `n` strings), bailing out
/// with `Ok(None)` as soon as any element is incomplete.
pub fn try_get_list(bytes: &[u8], pos: &mut usize) -> Result<Option<Vec<String>>, WireError> {
    let checkpoint = *pos;
    let n = match try_get_u32(bytes, pos) {
        Some(n) => n,
        None => return Ok(None),
    };
    if n > MAX_LIST_LEN {
        return Err(WireError::ListTooLarge(n));
    }
    let mut out = Vec::with_capacity(n as usize);
    for _ in 0..n {
        match try_get_string(bytes, pos)? {
            Some(s) => out.push(s),
            None => {
                *pos = checkpoint;
                return Ok(None);
            }
        }
    }
    Ok(Some(out))
}

pub fn put_list(buf: &mut impl BufMut, items: &[String]) {
    buf.put_u32(items.len() as u32);
    for item in items {
        put_string(buf, item);
    }
}

pub fn consume(buf: &mut impl Buf, n: usize) {
    buf.advance(n);
}
