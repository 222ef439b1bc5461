//! CRC32 checksums over stack state
//!
//! The structure checksum covers the buffer address, size and capacity; the
//! content checksum covers the live element bytes. Both are recomputed after
//! every mutation and compared before every access, so any write that did not
//! go through push/pop shows up as a mismatch.

use crc32fast::Hasher as Crc32Hasher;

/// Checksum over the scalar fields of a stack
pub fn structure_checksum(buffer_address: usize, size: isize, capacity: isize) -> u32 {
    let mut hasher = Crc32Hasher::new();
    hasher.update(&(buffer_address as u64).to_le_bytes());
    hasher.update(&(size as i64).to_le_bytes());
    hasher.update(&(capacity as i64).to_le_bytes());
    hasher.finalize()
}

/// Checksum over live element bit patterns
pub fn content_checksum(live: &[u64]) -> u32 {
    let mut hasher = Crc32Hasher::new();
    for bits in live {
        hasher.update(&bits.to_le_bytes());
    }
    hasher.finalize()
}
