//! Addressable section views.
//!
//! A [`Section`] is a borrowed, virtual-address-indexed window over one
//! slice's bytes. Reads are normalized to host order regardless of the
//! slice's on-disk endianness, so the xref engine never sees raw bytes.

use crate::error::{Error, Result};
use crate::util::read_u32_at;

/// A named, read-only view over a contiguous address range of a slice.
#[derive(Debug, Clone, Copy)]
pub struct Section<'a> {
    segment: &'a str,
    name: &'a str,
    vmaddr: u64,
    size: u64,
    data: &'a [u8],
    little_endian: bool,
}

impl<'a> Section<'a> {
    /// Creates a section view. The byte range has already been validated
    /// against the owning slice by the caller.
    pub(crate) fn new(
        segment: &'a str,
        name: &'a str,
        vmaddr: u64,
        size: u64,
        data: &'a [u8],
        little_endian: bool,
    ) -> Self {
        debug_assert_eq!(data.len() as u64, size);
        debug_assert!(vmaddr.checked_add(size).is_some());
        Self {
            segment,
            name,
            vmaddr,
            size,
            data,
            little_endian,
        }
    }

    /// Returns the section name (e.g. `__text`).
    #[inline]
    pub fn name(&self) -> &str {
        self.name
    }

    /// Returns the owning segment name (e.g. `__TEXT`).
    #[inline]
    pub fn segment_name(&self) -> &str {
        self.segment
    }

    /// Returns the virtual address of the first byte.
    #[inline]
    pub fn vmaddr(&self) -> u64 {
        self.vmaddr
    }

    /// Returns the size of the section in bytes.
    #[inline]
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Returns the virtual address one past the last byte.
    ///
    /// Construction rejects ranges that wrap the address space, so the
    /// saturation never takes effect for sections built from a slice.
    #[inline]
    pub fn end_addr(&self) -> u64 {
        self.vmaddr.saturating_add(self.size)
    }

    /// Reads a 4-byte-aligned instruction word at a virtual address.
    ///
    /// Addresses outside `[vmaddr, vmaddr + size)` are an error, not a
    /// clamp; ARM64 instruction fetches are strictly 4-byte aligned.
    pub fn read_u32(&self, addr: u64) -> Result<u32> {
        if addr % 4 != 0 {
            return Err(Error::Misaligned { addr, alignment: 4 });
        }
        let in_range = addr >= self.vmaddr
            && addr
                .checked_add(4)
                .is_some_and(|end| end <= self.end_addr());
        if !in_range {
            return Err(Error::SectionOutOfRange {
                addr,
                vmaddr: self.vmaddr,
                size: self.size,
            });
        }
        let offset = (addr - self.vmaddr) as usize;
        Ok(read_u32_at(self.data, offset, self.little_endian))
    }

    /// Searches backward from `from` for an instruction matching
    /// `pattern` under `mask`, within at most `max_window` slots.
    ///
    /// Returns the match nearest to `from` (the latest preceding one).
    /// The window is deliberately small: widening it associates ADRP
    /// instructions with unrelated later uses of the same register and
    /// raises the false-positive rate.
    pub fn find_prev_inst(
        &self,
        from: u64,
        max_window: u32,
        pattern: u32,
        mask: u32,
    ) -> Option<u64> {
        for i in 1..=u64::from(max_window) {
            let addr = from.checked_sub(i * 4)?;
            if addr < self.vmaddr {
                return None;
            }
            // In-range by construction; misalignment of `from` propagates.
            let word = self.read_u32(addr).ok()?;
            if word & mask == pattern {
                return Some(addr);
            }
        }
        None
    }
}
