//! On-disk Mach-O and FAT container structures.
//!
//! FAT headers and arch descriptors are always big-endian on disk, so they
//! are declared with explicit big-endian field types. Thin Mach-O headers
//! follow their own magic's byte order; those structures are read in host
//! order and byte-swapped in place when the swapped magic is seen.

use std::fmt;

use zerocopy::byteorder::big_endian::{I32 as I32Be, U32 as U32Be, U64 as U64Be};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use super::constants::*;
use crate::util::padded_name;

// =============================================================================
// FAT Container Structures
// =============================================================================

/// FAT container header (big-endian on disk).
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct FatHeader {
    /// FAT_MAGIC or FAT_MAGIC_64
    pub magic: U32Be,
    /// Number of arch descriptors that follow
    pub nfat_arch: U32Be,
}

impl FatHeader {
    /// Size of the header in bytes.
    pub const SIZE: usize = 8;
}

/// 32-bit FAT arch descriptor (big-endian on disk).
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct FatArch32 {
    /// CPU type
    pub cputype: I32Be,
    /// CPU subtype
    pub cpusubtype: I32Be,
    /// File offset of the slice
    pub offset: U32Be,
    /// Size of the slice in bytes
    pub size: U32Be,
    /// Alignment (power of 2)
    pub align: U32Be,
}

impl FatArch32 {
    /// Size of a descriptor entry.
    pub const SIZE: usize = 20;
}

/// 64-bit FAT arch descriptor (big-endian on disk).
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct FatArch64 {
    /// CPU type
    pub cputype: I32Be,
    /// CPU subtype
    pub cpusubtype: I32Be,
    /// File offset of the slice
    pub offset: U64Be,
    /// Size of the slice in bytes
    pub size: U64Be,
    /// Alignment (power of 2)
    pub align: U32Be,
    /// Reserved
    pub reserved: U32Be,
}

impl FatArch64 {
    /// Size of a descriptor entry.
    pub const SIZE: usize = 32;
}

/// A FAT arch descriptor normalized to host order and 64-bit fields.
///
/// Descriptors parsed from the legacy 32-bit form have their offset and
/// size widened and `reserved` forced to zero, so both on-disk variants
/// compare equal when they describe the same slice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FatArch {
    /// CPU type
    pub cputype: i32,
    /// CPU subtype
    pub cpusubtype: i32,
    /// File offset of the slice
    pub offset: u64,
    /// Size of the slice in bytes
    pub size: u64,
    /// Alignment (power of 2)
    pub align: u32,
    /// Reserved (zero for 32-bit descriptors)
    pub reserved: u32,
}

impl From<FatArch32> for FatArch {
    fn from(arch: FatArch32) -> Self {
        Self {
            cputype: arch.cputype.get(),
            cpusubtype: arch.cpusubtype.get(),
            offset: u64::from(arch.offset.get()),
            size: u64::from(arch.size.get()),
            align: arch.align.get(),
            reserved: 0,
        }
    }
}

impl From<FatArch64> for FatArch {
    fn from(arch: FatArch64) -> Self {
        Self {
            cputype: arch.cputype.get(),
            cpusubtype: arch.cpusubtype.get(),
            offset: arch.offset.get(),
            size: arch.size.get(),
            align: arch.align.get(),
            reserved: arch.reserved.get(),
        }
    }
}

impl FatArch {
    /// Returns the architecture name for this descriptor.
    pub fn arch_name(&self) -> &'static str {
        arch_name(self.cputype, self.cpusubtype)
    }
}

// =============================================================================
// Mach-O Header Structures
// =============================================================================

/// 64-bit Mach-O header.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct MachHeader64 {
    /// Magic number (MH_MAGIC_64)
    pub magic: u32,
    /// CPU type
    pub cputype: i32,
    /// CPU subtype
    pub cpusubtype: i32,
    /// File type
    pub filetype: u32,
    /// Number of load commands
    pub ncmds: u32,
    /// Size of load commands
    pub sizeofcmds: u32,
    /// Flags
    pub flags: u32,
    /// Reserved
    pub reserved: u32,
}

impl MachHeader64 {
    /// Size of the header in bytes.
    pub const SIZE: usize = 32;

    /// Swaps all fields between byte orders.
    pub fn byte_swap(&mut self) {
        self.magic = self.magic.swap_bytes();
        self.cputype = self.cputype.swap_bytes();
        self.cpusubtype = self.cpusubtype.swap_bytes();
        self.filetype = self.filetype.swap_bytes();
        self.ncmds = self.ncmds.swap_bytes();
        self.sizeofcmds = self.sizeofcmds.swap_bytes();
        self.flags = self.flags.swap_bytes();
        self.reserved = self.reserved.swap_bytes();
    }
}

/// 32-bit Mach-O header (no reserved field).
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct MachHeader32 {
    /// Magic number (MH_MAGIC)
    pub magic: u32,
    /// CPU type
    pub cputype: i32,
    /// CPU subtype
    pub cpusubtype: i32,
    /// File type
    pub filetype: u32,
    /// Number of load commands
    pub ncmds: u32,
    /// Size of load commands
    pub sizeofcmds: u32,
    /// Flags
    pub flags: u32,
}

impl MachHeader32 {
    /// Size of the header in bytes.
    pub const SIZE: usize = 28;

    /// Swaps all fields between byte orders.
    pub fn byte_swap(&mut self) {
        self.magic = self.magic.swap_bytes();
        self.cputype = self.cputype.swap_bytes();
        self.cpusubtype = self.cpusubtype.swap_bytes();
        self.filetype = self.filetype.swap_bytes();
        self.ncmds = self.ncmds.swap_bytes();
        self.sizeofcmds = self.sizeofcmds.swap_bytes();
        self.flags = self.flags.swap_bytes();
    }
}

// =============================================================================
// Load Commands
// =============================================================================

/// Generic load command header.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct LoadCommand {
    /// Type of load command
    pub cmd: u32,
    /// Size of load command
    pub cmdsize: u32,
}

impl LoadCommand {
    /// Size of the load command header.
    pub const SIZE: usize = 8;

    /// Swaps all fields between byte orders.
    pub fn byte_swap(&mut self) {
        self.cmd = self.cmd.swap_bytes();
        self.cmdsize = self.cmdsize.swap_bytes();
    }
}

/// 64-bit segment command.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct SegmentCommand64 {
    /// LC_SEGMENT_64
    pub cmd: u32,
    /// Size of this load command
    pub cmdsize: u32,
    /// Segment name (16 bytes, null-padded)
    pub segname: [u8; 16],
    /// Virtual memory address
    pub vmaddr: u64,
    /// Virtual memory size
    pub vmsize: u64,
    /// File offset
    pub fileoff: u64,
    /// Amount of file to map
    pub filesize: u64,
    /// Maximum VM protection
    pub maxprot: u32,
    /// Initial VM protection
    pub initprot: u32,
    /// Number of sections
    pub nsects: u32,
    /// Flags
    pub flags: u32,
}

impl SegmentCommand64 {
    /// Size of the segment command (without sections).
    pub const SIZE: usize = 72;

    /// Returns the segment name as a string.
    pub fn name(&self) -> &str {
        padded_name(&self.segname)
    }

    /// Swaps all numeric fields between byte orders.
    pub fn byte_swap(&mut self) {
        self.cmd = self.cmd.swap_bytes();
        self.cmdsize = self.cmdsize.swap_bytes();
        self.vmaddr = self.vmaddr.swap_bytes();
        self.vmsize = self.vmsize.swap_bytes();
        self.fileoff = self.fileoff.swap_bytes();
        self.filesize = self.filesize.swap_bytes();
        self.maxprot = self.maxprot.swap_bytes();
        self.initprot = self.initprot.swap_bytes();
        self.nsects = self.nsects.swap_bytes();
        self.flags = self.flags.swap_bytes();
    }
}

/// 32-bit segment command.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct SegmentCommand32 {
    /// LC_SEGMENT
    pub cmd: u32,
    /// Size of this load command
    pub cmdsize: u32,
    /// Segment name (16 bytes, null-padded)
    pub segname: [u8; 16],
    /// Virtual memory address
    pub vmaddr: u32,
    /// Virtual memory size
    pub vmsize: u32,
    /// File offset
    pub fileoff: u32,
    /// Amount of file to map
    pub filesize: u32,
    /// Maximum VM protection
    pub maxprot: u32,
    /// Initial VM protection
    pub initprot: u32,
    /// Number of sections
    pub nsects: u32,
    /// Flags
    pub flags: u32,
}

impl SegmentCommand32 {
    /// Size of the segment command (without sections).
    pub const SIZE: usize = 56;

    /// Swaps all numeric fields between byte orders.
    pub fn byte_swap(&mut self) {
        self.cmd = self.cmd.swap_bytes();
        self.cmdsize = self.cmdsize.swap_bytes();
        self.vmaddr = self.vmaddr.swap_bytes();
        self.vmsize = self.vmsize.swap_bytes();
        self.fileoff = self.fileoff.swap_bytes();
        self.filesize = self.filesize.swap_bytes();
        self.maxprot = self.maxprot.swap_bytes();
        self.initprot = self.initprot.swap_bytes();
        self.nsects = self.nsects.swap_bytes();
        self.flags = self.flags.swap_bytes();
    }

    /// Widens this command to the 64-bit form.
    pub fn widen(&self) -> SegmentCommand64 {
        SegmentCommand64 {
            cmd: self.cmd,
            cmdsize: self.cmdsize,
            segname: self.segname,
            vmaddr: u64::from(self.vmaddr),
            vmsize: u64::from(self.vmsize),
            fileoff: u64::from(self.fileoff),
            filesize: u64::from(self.filesize),
            maxprot: self.maxprot,
            initprot: self.initprot,
            nsects: self.nsects,
            flags: self.flags,
        }
    }
}

/// 64-bit section entry.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct Section64 {
    /// Section name (16 bytes, null-padded)
    pub sectname: [u8; 16],
    /// Segment name (16 bytes, null-padded)
    pub segname: [u8; 16],
    /// Virtual memory address
    pub addr: u64,
    /// Size in bytes
    pub size: u64,
    /// File offset
    pub offset: u32,
    /// Alignment (power of 2)
    pub align: u32,
    /// File offset of relocation entries
    pub reloff: u32,
    /// Number of relocation entries
    pub nreloc: u32,
    /// Flags
    pub flags: u32,
    /// Reserved (for runtime use)
    pub reserved1: u32,
    /// Reserved (for runtime use)
    pub reserved2: u32,
    /// Reserved
    pub reserved3: u32,
}

impl Section64 {
    /// Size of a section entry.
    pub const SIZE: usize = 80;

    /// Returns the section name as a string.
    pub fn name(&self) -> &str {
        padded_name(&self.sectname)
    }

    /// Returns the segment name as a string.
    pub fn segment_name(&self) -> &str {
        padded_name(&self.segname)
    }

    /// Returns the section type.
    #[inline]
    pub fn section_type(&self) -> u32 {
        self.flags & SECTION_TYPE
    }

    /// Returns true if this section has no file backing.
    #[inline]
    pub fn is_zerofill(&self) -> bool {
        self.section_type() == S_ZEROFILL
    }

    /// Swaps all numeric fields between byte orders.
    pub fn byte_swap(&mut self) {
        self.addr = self.addr.swap_bytes();
        self.size = self.size.swap_bytes();
        self.offset = self.offset.swap_bytes();
        self.align = self.align.swap_bytes();
        self.reloff = self.reloff.swap_bytes();
        self.nreloc = self.nreloc.swap_bytes();
        self.flags = self.flags.swap_bytes();
        self.reserved1 = self.reserved1.swap_bytes();
        self.reserved2 = self.reserved2.swap_bytes();
        self.reserved3 = self.reserved3.swap_bytes();
    }
}

/// 32-bit section entry.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct Section32 {
    /// Section name (16 bytes, null-padded)
    pub sectname: [u8; 16],
    /// Segment name (16 bytes, null-padded)
    pub segname: [u8; 16],
    /// Virtual memory address
    pub addr: u32,
    /// Size in bytes
    pub size: u32,
    /// File offset
    pub offset: u32,
    /// Alignment (power of 2)
    pub align: u32,
    /// File offset of relocation entries
    pub reloff: u32,
    /// Number of relocation entries
    pub nreloc: u32,
    /// Flags
    pub flags: u32,
    /// Reserved (for runtime use)
    pub reserved1: u32,
    /// Reserved (for runtime use)
    pub reserved2: u32,
}

impl Section32 {
    /// Size of a section entry.
    pub const SIZE: usize = 68;

    /// Swaps all numeric fields between byte orders.
    pub fn byte_swap(&mut self) {
        self.addr = self.addr.swap_bytes();
        self.size = self.size.swap_bytes();
        self.offset = self.offset.swap_bytes();
        self.align = self.align.swap_bytes();
        self.reloff = self.reloff.swap_bytes();
        self.nreloc = self.nreloc.swap_bytes();
        self.flags = self.flags.swap_bytes();
        self.reserved1 = self.reserved1.swap_bytes();
        self.reserved2 = self.reserved2.swap_bytes();
    }

    /// Widens this entry to the 64-bit form.
    pub fn widen(&self) -> Section64 {
        Section64 {
            sectname: self.sectname,
            segname: self.segname,
            addr: u64::from(self.addr),
            size: u64::from(self.size),
            offset: self.offset,
            align: self.align,
            reloff: self.reloff,
            nreloc: self.nreloc,
            flags: self.flags,
            reserved1: self.reserved1,
            reserved2: self.reserved2,
            reserved3: 0,
        }
    }
}

// =============================================================================
// Display Implementations
// =============================================================================

impl fmt::Display for FatArch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Slice {{ arch: {}, offset: {:#x}, size: {:#x}, align: 2^{} }}",
            self.arch_name(),
            self.offset,
            self.size,
            self.align
        )
    }
}

impl fmt::Display for Section64 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Section {{ name: \"{},{}\", addr: {:#x}+{:#x}, offset: {:#x} }}",
            self.segment_name(),
            self.name(),
            self.addr,
            self.size,
            self.offset
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fat_arch_normalization() {
        let bytes32: Vec<u8> = [
            0x0100000Cu32.to_be_bytes(), // cputype arm64
            0x00000000u32.to_be_bytes(), // cpusubtype
            0x00004000u32.to_be_bytes(), // offset
            0x00010000u32.to_be_bytes(), // size
            0x0000000Eu32.to_be_bytes(), // align
        ]
        .concat();
        let arch32 = FatArch32::read_from_bytes(&bytes32).unwrap();

        let mut bytes64 = Vec::new();
        bytes64.extend_from_slice(&0x0100000Ci32.to_be_bytes());
        bytes64.extend_from_slice(&0i32.to_be_bytes());
        bytes64.extend_from_slice(&0x4000u64.to_be_bytes());
        bytes64.extend_from_slice(&0x10000u64.to_be_bytes());
        bytes64.extend_from_slice(&0xEu32.to_be_bytes());
        bytes64.extend_from_slice(&0u32.to_be_bytes());
        let arch64 = FatArch64::read_from_bytes(&bytes64).unwrap();

        assert_eq!(FatArch::from(arch32), FatArch::from(arch64));
        assert_eq!(FatArch::from(arch32).arch_name(), "arm64");
    }

    #[test]
    fn test_header_byte_swap() {
        let mut header = MachHeader64 {
            magic: MH_CIGAM_64,
            cputype: CPU_TYPE_ARM64.swap_bytes(),
            cpusubtype: 0,
            filetype: 0x02000000,
            ncmds: 0x01000000,
            sizeofcmds: 0,
            flags: 0,
            reserved: 0,
        };
        header.byte_swap();
        assert_eq!(header.magic, MH_MAGIC_64);
        assert_eq!(header.cputype, CPU_TYPE_ARM64);
        assert_eq!(header.filetype, 2);
        assert_eq!(header.ncmds, 1);
    }

    #[test]
    fn test_segment_widen() {
        let mut seg = SegmentCommand32 {
            cmd: LC_SEGMENT,
            cmdsize: SegmentCommand32::SIZE as u32,
            segname: *b"__TEXT\0\0\0\0\0\0\0\0\0\0",
            vmaddr: 0x4000,
            vmsize: 0x8000,
            fileoff: 0,
            filesize: 0x8000,
            maxprot: 5,
            initprot: 5,
            nsects: 0,
            flags: 0,
        };
        let wide = seg.widen();
        assert_eq!(wide.vmaddr, 0x4000);
        assert_eq!(wide.name(), "__TEXT");

        seg.byte_swap();
        assert_eq!(seg.vmaddr, 0x4000u32.swap_bytes());
    }
}
