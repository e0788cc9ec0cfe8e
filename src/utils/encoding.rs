/// Largest payload a single length prefix may describe.
pub const MAX_PREFIXED_LEN: usize = u32::MAX as usize;

/// Encode a u32 as a variable-length integer
pub fn encode_varint(mut value: u32, buf: &mut Vec<u8>) {
    loop {
        if value < 0x80 {
            buf.push(value as u8);
            break;
        }
        buf.push((value as u8) | 0x80);
        value >>= 7;
    }
}

/// Decode a variable-length integer from a slice
/// Returns (value, bytes_consumed)
pub fn decode_varint(buf: &[u8]) -> Option<(u32, usize)> {
    let mut result: u32 = 0;
    let mut shift = 0;

    for (i, &byte) in buf.iter().enumerate() {
        if shift >= 32 {
            return None; // Overflow
        }

        // The fifth byte carries only the top four bits
        if shift == 28 && byte & 0x70 != 0 {
            return None;
        }

        result |= ((byte & 0x7F) as u32) << shift;

        if byte & 0x80 == 0 {
            return Some((result, i + 1));
        }

        shift += 7;
    }

    None // Incomplete
}

/// Number of bytes `encode_varint` emits for `value`
pub fn varint_len(value: u32) -> usize {
    match value {
        0..=0x7F => 1,
        0x80..=0x3FFF => 2,
        0x4000..=0x1F_FFFF => 3,
        0x20_0000..=0xFFF_FFFF => 4,
        _ => 5,
    }
}

/// Append `payload` preceded by its varint length.
///
/// Callers guarantee `payload.len() <= MAX_PREFIXED_LEN`.
pub fn write_length_prefixed(payload: &[u8], buf: &mut Vec<u8>) {
    debug_assert!(payload.len() <= MAX_PREFIXED_LEN);
    buf.reserve(varint_len(payload.len() as u32) + payload.len());
    encode_varint(payload.len() as u32, buf);
    buf.extend_from_slice(payload);
}

/// Split a length-prefixed payload off the front of `buf`.
/// Returns (payload, bytes_consumed), or None if the prefix is malformed,
/// not in its shortest form, or the payload is truncated.
pub fn read_length_prefixed(buf: &[u8]) -> Option<(&[u8], usize)> {
    let (len, header) = decode_varint(buf)?;
    if header != varint_len(len) {
        return None;
    }
    let end = header.checked_add(len as usize)?;
    let payload = buf.get(header..end)?;
    Some((payload, end))
}
