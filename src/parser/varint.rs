use crate::error::{ProbeError, Result};

/// Decode a varint (1-9 bytes, big-endian, 7 bits per byte).
/// The high bit marks continuation; a 9th byte, if reached, contributes all
/// 8 of its bits. Returns (value, bytes_consumed), or None if the buffer
/// ends before the varint terminates.
pub fn parse_varint(data: &[u8]) -> Option<(u64, usize)> {
    let mut value: u64 = 0;

    for (i, &byte) in data.iter().take(9).enumerate() {
        if i == 8 {
            // 9th byte uses all 8 bits
            return Some(((value << 8) | byte as u64, 9));
        }

        value = (value << 7) | (byte & 0x7f) as u64;

        if byte & 0x80 == 0 {
            return Some((value, i + 1));
        }
    }

    None
}

/// Decode the varint starting at `offset`, attributing a truncation to
/// `page` for diagnostics.
pub fn varint_at(data: &[u8], offset: usize, page: u32) -> Result<(u64, usize)> {
    data.get(offset..)
        .and_then(parse_varint)
        .ok_or(ProbeError::TruncatedVarint { page, offset })
}

/// Decode a varint holding a signed value (rowids use two's complement).
pub fn signed_varint_at(data: &[u8], offset: usize, page: u32) -> Result<(i64, usize)> {
    let (value, len) = varint_at(data, offset, page)?;
    Ok((value as i64, len))
}

/// Encode a value in the 1-9 byte varint format.
pub fn encode_varint(value: u64) -> Vec<u8> {
    if value >> 56 != 0 {
        // Needs the 9-byte form: eight 7-bit groups for the top 56 bits,
        // then the low byte whole.
        let mut out = Vec::with_capacity(9);
        let high = value >> 8;
        for i in (0..8).rev() {
            out.push((((high >> (7 * i)) & 0x7f) as u8) | 0x80);
        }
        out.push((value & 0xff) as u8);
        return out;
    }

    let mut groups = Vec::with_capacity(8);
    let mut rest = value;
    loop {
        groups.push((rest & 0x7f) as u8);
        rest >>= 7;
        if rest == 0 {
            break;
        }
    }
    groups.reverse();
    let last = groups.len() - 1;
    for (i, byte) in groups.iter_mut().enumerate() {
        if i != last {
            *byte |= 0x80;
        }
    }
    groups
}
