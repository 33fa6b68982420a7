//! A single architecture slice of a Mach-O container.
//!
//! A [`MachO`] owns a copy of its slice's bytes and the segment/section
//! metadata parsed from the load commands. It hands out borrowed
//! [`Section`](super::section::Section) views for analysis; the views never
//! outlive the slice.

use tracing::{debug, warn};
use zerocopy::FromBytes;

use super::constants::*;
use super::section::Section;
use super::structs::*;
use crate::error::{Error, Result};
use crate::stream::ByteSource;

// =============================================================================
// Segment Info
// =============================================================================

/// A parsed segment with its sections.
#[derive(Debug, Clone)]
pub struct SegmentInfo {
    /// The segment command, widened to 64-bit fields
    pub command: SegmentCommand64,
    /// Section entries, widened to 64-bit fields
    pub sections: Vec<Section64>,
}

impl SegmentInfo {
    /// Returns the segment name.
    pub fn name(&self) -> &str {
        self.command.name()
    }
}

// =============================================================================
// MachO Slice
// =============================================================================

/// One architecture's parsed Mach-O image.
#[derive(Debug)]
pub struct MachO {
    /// Offset of this slice within the containing file
    pub base_offset: u64,
    /// CPU type from the header
    pub cputype: i32,
    /// CPU subtype from the header
    pub cpusubtype: i32,
    /// File type from the header
    pub filetype: u32,
    /// True if fields are stored little-endian on disk
    little_endian: bool,
    /// True if this is a 64-bit image
    is64: bool,
    /// The slice's bytes, copied out of the container's source
    data: Vec<u8>,
    /// Parsed segments in load-command order
    segments: Vec<SegmentInfo>,
}

impl MachO {
    /// Parses a slice from `source` at the given offset and size.
    ///
    /// The magic determines pointer width and byte order; all parsed
    /// metadata is normalized to host order and 64-bit fields.
    pub fn parse(source: &ByteSource, offset: u64, size: u64) -> Result<Self> {
        let data = source.read_at(offset, size as usize)?.to_vec();

        if data.len() < MachHeader32::SIZE {
            return Err(Error::parse(offset as usize, "slice too small for header"));
        }

        let magic = source.read_u32_le(offset)?;
        let (is64, little_endian) = match magic {
            MH_MAGIC_64 => (true, true),
            MH_CIGAM_64 => (true, false),
            MH_MAGIC => (false, true),
            MH_CIGAM => (false, false),
            other => return Err(Error::InvalidMachoMagic(other)),
        };

        let mut slice = Self {
            base_offset: offset,
            cputype: 0,
            cpusubtype: 0,
            filetype: 0,
            little_endian,
            is64,
            data,
            segments: Vec::new(),
        };

        let (ncmds, sizeofcmds) = slice.parse_header()?;
        slice.parse_load_commands(ncmds, sizeofcmds)?;

        debug!(
            arch = slice.arch_name(),
            offset = %format_args!("{:#x}", offset),
            segments = slice.segments.len(),
            "parsed slice"
        );

        Ok(slice)
    }

    /// Reads the header, byte-swapping if needed. Returns (ncmds, sizeofcmds).
    fn parse_header(&mut self) -> Result<(u32, u32)> {
        if self.is64 {
            let mut header = MachHeader64::read_from_prefix(&self.data)
                .map_err(|_| Error::parse(0, "failed to read 64-bit header"))?
                .0;
            if !self.little_endian {
                header.byte_swap();
            }
            self.cputype = header.cputype;
            self.cpusubtype = header.cpusubtype;
            self.filetype = header.filetype;
            Ok((header.ncmds, header.sizeofcmds))
        } else {
            let mut header = MachHeader32::read_from_prefix(&self.data)
                .map_err(|_| Error::parse(0, "failed to read 32-bit header"))?
                .0;
            if !self.little_endian {
                header.byte_swap();
            }
            self.cputype = header.cputype;
            self.cpusubtype = header.cpusubtype;
            self.filetype = header.filetype;
            Ok((header.ncmds, header.sizeofcmds))
        }
    }

    /// Walks the load commands, collecting segments and their sections.
    ///
    /// Commands other than LC_SEGMENT/LC_SEGMENT_64 are skipped by size;
    /// this layer only needs named sections with address ranges.
    fn parse_load_commands(&mut self, ncmds: u32, sizeofcmds: u32) -> Result<()> {
        let header_size = if self.is64 {
            MachHeader64::SIZE
        } else {
            MachHeader32::SIZE
        };
        let end_offset = header_size + sizeofcmds as usize;

        let mut offset = header_size;
        for _ in 0..ncmds {
            if offset + LoadCommand::SIZE > end_offset || offset + LoadCommand::SIZE > self.data.len()
            {
                return Err(Error::LoadCommandOverflow { offset });
            }

            let mut lc = LoadCommand::read_from_prefix(&self.data[offset..])
                .map_err(|_| Error::parse(offset, "failed to read load command"))?
                .0;
            if !self.little_endian {
                lc.byte_swap();
            }

            if lc.cmdsize < LoadCommand::SIZE as u32
                || offset + lc.cmdsize as usize > self.data.len()
            {
                return Err(Error::LoadCommandOverflow { offset });
            }

            match lc.cmd {
                LC_SEGMENT_64 => {
                    let seg = self.parse_segment64(offset)?;
                    self.segments.push(seg);
                }
                LC_SEGMENT => {
                    let seg = self.parse_segment32(offset)?;
                    self.segments.push(seg);
                }
                _ => {}
            }

            offset += lc.cmdsize as usize;
        }

        Ok(())
    }

    fn parse_segment64(&self, offset: usize) -> Result<SegmentInfo> {
        let mut command = SegmentCommand64::read_from_prefix(&self.data[offset..])
            .map_err(|_| Error::parse(offset, "failed to read segment command"))?
            .0;
        if !self.little_endian {
            command.byte_swap();
        }

        let mut sections = Vec::with_capacity(command.nsects as usize);
        let mut sect_offset = offset + SegmentCommand64::SIZE;
        for _ in 0..command.nsects {
            if sect_offset + Section64::SIZE > self.data.len() {
                return Err(Error::parse(sect_offset, "section entry out of bounds"));
            }
            let mut sect = Section64::read_from_prefix(&self.data[sect_offset..])
                .map_err(|_| Error::parse(sect_offset, "failed to read section"))?
                .0;
            if !self.little_endian {
                sect.byte_swap();
            }
            sections.push(sect);
            sect_offset += Section64::SIZE;
        }

        Ok(SegmentInfo { command, sections })
    }

    fn parse_segment32(&self, offset: usize) -> Result<SegmentInfo> {
        let mut command32 = SegmentCommand32::read_from_prefix(&self.data[offset..])
            .map_err(|_| Error::parse(offset, "failed to read segment command"))?
            .0;
        if !self.little_endian {
            command32.byte_swap();
        }
        let command = command32.widen();

        let mut sections = Vec::with_capacity(command.nsects as usize);
        let mut sect_offset = offset + SegmentCommand32::SIZE;
        for _ in 0..command.nsects {
            if sect_offset + Section32::SIZE > self.data.len() {
                return Err(Error::parse(sect_offset, "section entry out of bounds"));
            }
            let mut sect32 = Section32::read_from_prefix(&self.data[sect_offset..])
                .map_err(|_| Error::parse(sect_offset, "failed to read section"))?
                .0;
            if !self.little_endian {
                sect32.byte_swap();
            }
            sections.push(sect32.widen());
            sect_offset += Section32::SIZE;
        }

        Ok(SegmentInfo { command, sections })
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Returns the architecture name of this slice.
    pub fn arch_name(&self) -> &'static str {
        arch_name(self.cputype, self.cpusubtype)
    }

    /// Returns true if this is an ARM64 slice.
    #[inline]
    pub fn is_arm64(&self) -> bool {
        self.cputype == CPU_TYPE_ARM64
    }

    /// Returns true if this is a 64-bit image.
    #[inline]
    pub fn is_64bit(&self) -> bool {
        self.is64
    }

    /// Returns the size of the slice in bytes.
    #[inline]
    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }

    /// Returns an iterator over the parsed segments, in load-command order.
    pub fn segments(&self) -> impl Iterator<Item = &SegmentInfo> {
        self.segments.iter()
    }

    /// Returns addressable views over all file-backed sections, in order.
    ///
    /// Zerofill sections and sections whose file range falls outside the
    /// slice are skipped; they have no bytes to scan.
    pub fn sections(&self) -> Vec<Section<'_>> {
        let mut out = Vec::new();
        for seg in &self.segments {
            for sect in &seg.sections {
                match self.make_section(sect) {
                    Some(section) => out.push(section),
                    None => {
                        debug!(
                            section = %format_args!("{},{}", sect.segment_name(), sect.name()),
                            "skipping section without file backing"
                        );
                    }
                }
            }
        }
        out
    }

    /// Returns a view over the named section.
    pub fn section(&self, segment: &str, section: &str) -> Result<Section<'_>> {
        for seg in &self.segments {
            for sect in &seg.sections {
                if sect.segment_name() == segment && sect.name() == section {
                    return self.make_section(sect).ok_or_else(|| {
                        warn!(%sect, "section has no file backing");
                        Error::SectionNotFound {
                            segment: segment.to_string(),
                            section: section.to_string(),
                        }
                    });
                }
            }
        }
        Err(Error::SectionNotFound {
            segment: segment.to_string(),
            section: section.to_string(),
        })
    }

    /// Builds a borrowed view for a section entry, validating its ranges.
    ///
    /// `sect` always borrows from `self.segments`, so both inputs share
    /// the slice's lifetime.
    fn make_section<'a>(&'a self, sect: &'a Section64) -> Option<Section<'a>> {
        if sect.is_zerofill() {
            return None;
        }
        // Reject address ranges that wrap; the view's arithmetic assumes
        // vmaddr + size fits in a u64.
        sect.addr.checked_add(sect.size)?;
        let start = sect.offset as usize;
        let end = start.checked_add(sect.size as usize)?;
        if end > self.data.len() {
            return None;
        }
        Some(Section::new(
            sect.segment_name(),
            sect.name(),
            sect.addr,
            sect.size,
            &self.data[start..end],
            self.little_endian,
        ))
    }
}
