use crc32fast::Hasher;

use crate::types::{CHECKSUM_SIZE, PAGE_CHECKSUM_OFFSET};

/// CRC32 over a serialized page, skipping the checksum field itself.
pub fn calculate_page_checksum(page_bytes: &[u8]) -> u32 {
    let mut hasher = Hasher::new();

    hasher.update(&page_bytes[..PAGE_CHECKSUM_OFFSET]);
    hasher.update(&page_bytes[PAGE_CHECKSUM_OFFSET + CHECKSUM_SIZE..]);

    hasher.finalize()
}

pub fn verify_page_checksum(page_bytes: &[u8], expected_checksum: u32) -> bool {
    calculate_page_checksum(page_bytes) == expected_checksum
}
