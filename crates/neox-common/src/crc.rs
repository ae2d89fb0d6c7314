//! CRC-32 checksums.
//!
//! NPK index rows carry two CRC-32 (IEEE) values, one over the stored bytes
//! and one over the decoded payload. The checksum is computed with the
//! hardware-accelerated implementation bundled with flate2.

use flate2::Crc;

/// Compute the CRC-32 of a byte slice.
#[inline]
pub fn hash_bytes(data: &[u8]) -> u32 {
    let mut crc = Crc::new();
    crc.update(data);
    crc.sum()
}
