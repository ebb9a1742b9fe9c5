//! CRC-32 over the bitmap transfer's address header plus payload.

/// The 4-byte address header prefixed to every bitmap transfer's CRC
/// input (and to the first chunk of the transfer itself, per §4.1).
pub const BITMAP_ADDRESS_HEADER: [u8; 4] = [0x00, 0x1C, 0x00, 0x00];

/// `crc32(address_header ‖ payload)`, matching the `0x16` packet's CRC.
pub fn bitmap_crc32(payload: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&BITMAP_ADDRESS_HEADER);
    hasher.update(payload);
    hasher.finalize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_direct_computation() {
        let payload = vec![0xAAu8; 500];
        let mut expected = Vec::with_capacity(4 + payload.len());
        expected.extend_from_slice(&BITMAP_ADDRESS_HEADER);
        expected.extend_from_slice(&payload);
        assert_eq!(bitmap_crc32(&payload), crc32fast::hash(&expected));
    }
}
