//! Utility functions for binary data processing.
//!
//! Endian-aware scalar reads (via byteorder for optimal codegen) and
//! null-padded name extraction (SIMD-accelerated via memchr).

use byteorder::{BigEndian, ByteOrder, LittleEndian};

// =============================================================================
// Endian-Aware Reads
// =============================================================================

/// Reads a u32 from a byte slice at the given offset, in the given byte order.
///
/// # Panics
///
/// Panics if `offset + 4 > data.len()`.
#[inline(always)]
pub fn read_u32_at(data: &[u8], offset: usize, little_endian: bool) -> u32 {
    if little_endian {
        LittleEndian::read_u32(&data[offset..])
    } else {
        BigEndian::read_u32(&data[offset..])
    }
}

// =============================================================================
// Name Extraction
// =============================================================================

/// Extracts a string from a fixed-size, null-padded name field.
///
/// Segment and section names in Mach-O load commands are 16-byte arrays
/// padded with zeros; a full 16-byte name has no terminator.
#[inline]
pub fn padded_name(bytes: &[u8]) -> &str {
    let end = memchr::memchr(0, bytes).unwrap_or(bytes.len());
    std::str::from_utf8(&bytes[..end]).unwrap_or("")
}

// =============================================================================
// Alignment Utilities
// =============================================================================

/// Aligns a value down to the given power-of-two alignment.
#[inline(always)]
pub const fn align_down(value: u64, alignment: u64) -> u64 {
    debug_assert!(alignment.is_power_of_two());
    value & !(alignment - 1)
}

/// Checks if a value is aligned to the given power-of-two alignment.
#[inline(always)]
pub const fn is_aligned(value: u64, alignment: u64) -> bool {
    debug_assert!(alignment.is_power_of_two());
    (value & (alignment - 1)) == 0
}
