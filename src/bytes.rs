//! Low-level little-endian field readers for ZIP structure parsing.

/// Reads an unsigned little-endian value of `length` bytes (at most 8)
/// starting at `offset`.
///
/// ZIP fixed records mix 2-, 4- and 8-byte fields, so a width-parameterized
/// reader keeps the record decoders close to the format tables they mirror.
///
/// # Panics
///
/// Panics if `offset + length` runs past the slice; record decoders only
/// call this after validating the fixed record size.
pub(crate) fn little_endian_value(bytes: &[u8], offset: usize, length: usize) -> u64 {
    debug_assert!(length <= 8);
    let mut value = 0u64;
    for i in (0..length).rev() {
        value = (value << 8) | u64::from(bytes[offset + i]);
    }
    value
}

/// Reads an unsigned 16-bit little-endian field.
pub(crate) fn read_u16_le(bytes: &[u8], offset: usize) -> u16 {
    little_endian_value(bytes, offset, 2) as u16
}

/// Reads an unsigned 32-bit little-endian field.
pub(crate) fn read_u32_le(bytes: &[u8], offset: usize) -> u32 {
    little_endian_value(bytes, offset, 4) as u32
}

/// Reads an unsigned 64-bit little-endian field.
pub(crate) fn read_u64_le(bytes: &[u8], offset: usize) -> u64 {
    little_endian_value(bytes, offset, 8)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_little_endian_value_widths() {
        let data = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08];
        assert_eq!(little_endian_value(&data, 0, 1), 0x01);
        assert_eq!(little_endian_value(&data, 0, 2), 0x0201);
        assert_eq!(little_endian_value(&data, 0, 4), 0x04030201);
        assert_eq!(little_endian_value(&data, 0, 8), 0x0807060504030201);
    }

    #[test]
    fn test_little_endian_value_offset() {
        let data = [0xFF, 0xFF, 0x34, 0x12];
        assert_eq!(little_endian_value(&data, 2, 2), 0x1234);
    }

    #[test]
    fn test_typed_readers() {
        let data = [0x50, 0x4B, 0x05, 0x06, 0x00, 0x00, 0x00, 0x00];
        assert_eq!(read_u16_le(&data, 0), 0x4B50);
        assert_eq!(read_u32_le(&data, 0), 0x06054B50);
        assert_eq!(read_u64_le(&data, 0), 0x0000000006054B50);
    }

    #[test]
    fn test_high_bit_bytes() {
        let data = [0xFF, 0xFF, 0xFF, 0xFF];
        assert_eq!(read_u32_le(&data, 0), u32::MAX);
        assert_eq!(read_u16_le(&data, 0), 0xFFFF);
    }
}
