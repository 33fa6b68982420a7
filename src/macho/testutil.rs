//! Synthetic Mach-O builders shared by the parser and engine tests.

use zerocopy::{FromBytes, IntoBytes};

use super::constants::*;
use super::structs::*;

/// One section to place in a synthetic thin image.
pub struct SectionSpec<'a> {
    pub segment: &'a str,
    pub section: &'a str,
    pub vmaddr: u64,
    pub words: &'a [u32],
}

/// One slice to place in a synthetic FAT container.
pub struct FatDescriptor<'a> {
    pub image: &'a [u8],
    pub cputype: i32,
    pub cpusubtype: i32,
}

fn name16(name: &str) -> [u8; 16] {
    let mut out = [0u8; 16];
    let bytes = name.as_bytes();
    out[..bytes.len()].copy_from_slice(bytes);
    out
}

/// Builds a minimal little-endian arm64 thin Mach-O with a single segment
/// holding the given sections. Section bytes are placed after the load
/// commands in declaration order.
pub fn build_thin_macho(specs: &[SectionSpec<'_>]) -> Vec<u8> {
    let cmds_size = SegmentCommand64::SIZE + specs.len() * Section64::SIZE;
    let mut data_offset = MachHeader64::SIZE + cmds_size;

    let header = MachHeader64 {
        magic: MH_MAGIC_64,
        cputype: CPU_TYPE_ARM64,
        cpusubtype: CPU_SUBTYPE_ARM64_ALL,
        filetype: 0x2, // MH_EXECUTE
        ncmds: 1,
        sizeofcmds: cmds_size as u32,
        flags: 0,
        reserved: 0,
    };

    let mut sections = Vec::new();
    for spec in specs {
        sections.push(Section64 {
            sectname: name16(spec.section),
            segname: name16(spec.segment),
            addr: spec.vmaddr,
            size: (spec.words.len() * 4) as u64,
            offset: data_offset as u32,
            align: 2,
            reloff: 0,
            nreloc: 0,
            flags: 0,
            reserved1: 0,
            reserved2: 0,
            reserved3: 0,
        });
        data_offset += spec.words.len() * 4;
    }

    let total_size = data_offset;
    let segment = SegmentCommand64 {
        cmd: LC_SEGMENT_64,
        cmdsize: cmds_size as u32,
        segname: name16(specs.first().map(|s| s.segment).unwrap_or("__TEXT")),
        vmaddr: specs.first().map(|s| s.vmaddr).unwrap_or(0),
        vmsize: total_size as u64,
        fileoff: 0,
        filesize: total_size as u64,
        maxprot: 5,
        initprot: 5,
        nsects: specs.len() as u32,
        flags: 0,
    };

    let mut out = Vec::with_capacity(total_size);
    out.extend_from_slice(header.as_bytes());
    out.extend_from_slice(segment.as_bytes());
    for sect in &sections {
        out.extend_from_slice(sect.as_bytes());
    }
    for spec in specs {
        for word in spec.words {
            out.extend_from_slice(&word.to_le_bytes());
        }
    }
    debug_assert_eq!(out.len(), total_size);
    out
}

/// Re-encodes a little-endian thin image from [`build_thin_macho`] as its
/// byte-swapped (MH_CIGAM_64) equivalent, section words included.
pub fn byte_swap_thin_macho(image: &[u8]) -> Vec<u8> {
    let mut out = image.to_vec();

    let header = MachHeader64::read_from_prefix(&out).unwrap().0;
    let ncmds = header.ncmds;
    let mut swapped = header;
    swapped.byte_swap();
    out[..MachHeader64::SIZE].copy_from_slice(swapped.as_bytes());

    let mut offset = MachHeader64::SIZE;
    for _ in 0..ncmds {
        let lc = LoadCommand::read_from_prefix(&out[offset..]).unwrap().0;
        assert_eq!(lc.cmd, LC_SEGMENT_64, "builder emits only LC_SEGMENT_64");

        let seg = SegmentCommand64::read_from_prefix(&out[offset..]).unwrap().0;
        let nsects = seg.nsects;
        let mut seg_swapped = seg;
        seg_swapped.byte_swap();
        out[offset..offset + SegmentCommand64::SIZE].copy_from_slice(seg_swapped.as_bytes());

        let mut sect_offset = offset + SegmentCommand64::SIZE;
        for _ in 0..nsects {
            let sect = Section64::read_from_prefix(&out[sect_offset..]).unwrap().0;

            // Swap the section payload words so a big-endian read yields
            // the same instruction values.
            let start = sect.offset as usize;
            let end = start + sect.size as usize;
            for word in out[start..end].chunks_exact_mut(4) {
                word.reverse();
            }

            let mut sect_swapped = sect;
            sect_swapped.byte_swap();
            out[sect_offset..sect_offset + Section64::SIZE]
                .copy_from_slice(sect_swapped.as_bytes());
            sect_offset += Section64::SIZE;
        }

        offset += lc.cmdsize as usize;
    }

    out
}

/// Builds a FAT container around the given images, using either the
/// 32-bit or 64-bit descriptor form. Slices are placed back to back,
/// 8-byte aligned, after the descriptor table.
pub fn build_fat(descriptors: &[FatDescriptor<'_>], use64: bool) -> Vec<u8> {
    let magic = if use64 { FAT_MAGIC_64 } else { FAT_MAGIC };
    let desc_size = if use64 {
        FatArch64::SIZE
    } else {
        FatArch32::SIZE
    };

    let mut out = Vec::new();
    out.extend_from_slice(&magic.to_be_bytes());
    out.extend_from_slice(&(descriptors.len() as u32).to_be_bytes());

    let table_end = FatHeader::SIZE + descriptors.len() * desc_size;
    let mut offset = (table_end + 7) & !7;

    // Descriptor table first, big-endian fields throughout.
    for desc in descriptors {
        out.extend_from_slice(&desc.cputype.to_be_bytes());
        out.extend_from_slice(&desc.cpusubtype.to_be_bytes());
        if use64 {
            out.extend_from_slice(&(offset as u64).to_be_bytes());
            out.extend_from_slice(&(desc.image.len() as u64).to_be_bytes());
            out.extend_from_slice(&3u32.to_be_bytes());
            out.extend_from_slice(&0u32.to_be_bytes());
        } else {
            out.extend_from_slice(&(offset as u32).to_be_bytes());
            out.extend_from_slice(&(desc.image.len() as u32).to_be_bytes());
            out.extend_from_slice(&3u32.to_be_bytes());
        }
        offset = (offset + desc.image.len() + 7) & !7;
    }

    // Then the slice payloads at their recorded offsets.
    for desc in descriptors {
        while out.len() % 8 != 0 {
            out.push(0);
        }
        out.extend_from_slice(desc.image);
    }
    out
}
