//! # Key Encoding
//!
//! Keys are unsigned little-endian integers between one and eight bytes wide.
//! The width is a runtime parameter, so every numeric decode of a stored key
//! funnels through [`widen_key`], which lifts a 1-8 byte slice into a `u64`.
//! [`narrow_key`] is the inverse used on the write path.
//!
//! Narrowing silently truncates high bytes the configured width cannot hold;
//! callers that accept keys from the public API must reject out-of-range keys
//! before stamping them (see `EngineBuilder` validation and `Engine::put`).

/// Widens a stored little-endian key of 1-8 bytes into a `u64`.
#[inline]
pub fn widen_key(bytes: &[u8]) -> u64 {
    debug_assert!((1..=8).contains(&bytes.len()));
    let mut buf = [0u8; 8];
    buf[..bytes.len()].copy_from_slice(bytes);
    u64::from_le_bytes(buf)
}

/// Writes the low `out.len()` bytes of `key` in little-endian order.
#[inline]
pub fn narrow_key(key: u64, out: &mut [u8]) {
    debug_assert!((1..=8).contains(&out.len()));
    let bytes = key.to_le_bytes();
    out.copy_from_slice(&bytes[..out.len()]);
}

/// Largest key representable in `key_size` bytes.
#[inline]
pub fn max_key_for_width(key_size: usize) -> u64 {
    if key_size >= 8 {
        u64::MAX
    } else {
        (1u64 << (key_size * 8)) - 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn widen_reads_little_endian() {
        assert_eq!(widen_key(&[0x01]), 1);
        assert_eq!(widen_key(&[0x00, 0x01]), 256);
        assert_eq!(widen_key(&[0xFF, 0xFF, 0xFF, 0xFF]), u32::MAX as u64);
        assert_eq!(widen_key(&u64::MAX.to_le_bytes()), u64::MAX);
    }

    #[test]
    fn narrow_then_widen_round_trips_within_width() {
        for width in 1..=8usize {
            let key = max_key_for_width(width) / 3;
            let mut buf = vec![0u8; width];
            narrow_key(key, &mut buf);
            assert_eq!(widen_key(&buf), key, "width {width}");
        }
    }

    #[test]
    fn max_key_for_width_matches_byte_count() {
        assert_eq!(max_key_for_width(1), 0xFF);
        assert_eq!(max_key_for_width(4), 0xFFFF_FFFF);
        assert_eq!(max_key_for_width(8), u64::MAX);
    }
}
