//! Top-level Mach-O container parsing.
//!
//! A [`MachOContainer`] owns the byte source and dispatches on the leading
//! magic: a FAT header yields one slice per arch descriptor, anything else
//! is tried as a single thin Mach-O spanning the whole stream. Slice
//! construction is all-or-nothing; the first failure aborts the parse.

use std::path::Path;

use tracing::info;
use zerocopy::FromBytes;

use super::constants::*;
use super::slice::MachO;
use super::structs::{FatArch, FatArch32, FatArch64, FatHeader};
use crate::error::{Error, Result};
use crate::stream::ByteSource;

/// A parsed Mach-O container: one or more architecture slices over one
/// byte source.
#[derive(Debug)]
pub struct MachOContainer {
    source: ByteSource,
    slices: Vec<MachO>,
}

impl MachOContainer {
    /// Opens and parses a container from a file path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_byte_source(ByteSource::open(path)?)
    }

    /// Parses a container from a byte source, taking ownership of it.
    pub fn from_byte_source(source: ByteSource) -> Result<Self> {
        // The FAT header is big-endian on disk regardless of host.
        let magic = source.read_u32_be(0)?;

        let slices = match magic {
            FAT_MAGIC => Self::parse_fat(&source, false)?,
            FAT_MAGIC_64 => Self::parse_fat(&source, true)?,
            _ => {
                // Not FAT: try the whole stream as a single thin slice.
                vec![MachO::parse(&source, 0, source.len())?]
            }
        };

        info!(
            size = %format_args!("{:#x}", source.len()),
            slices = slices.len(),
            "parsed container"
        );

        Ok(Self { source, slices })
    }

    /// Parses the FAT descriptor table and constructs one slice per entry.
    fn parse_fat(source: &ByteSource, is64: bool) -> Result<Vec<MachO>> {
        let header = FatHeader::read_from_bytes(source.read_at(0, FatHeader::SIZE)?)
            .map_err(|_| Error::parse(0, "failed to read FAT header"))?;

        let nfat_arch = header.nfat_arch.get();
        if nfat_arch < 1 || nfat_arch > MAX_FAT_ARCH_COUNT {
            return Err(Error::InvalidArchCount(nfat_arch));
        }

        let mut slices = Vec::with_capacity(nfat_arch as usize);
        for i in 0..u64::from(nfat_arch) {
            let arch = Self::read_fat_arch(source, i, is64)?;

            let in_bounds = arch
                .offset
                .checked_add(arch.size)
                .is_some_and(|end| end <= source.len());
            if !in_bounds {
                return Err(Error::SliceOutOfBounds {
                    offset: arch.offset,
                    size: arch.size,
                    file_size: source.len(),
                });
            }

            info!(%arch, index = i, "FAT descriptor");
            let mut slice = MachO::parse(source, arch.offset, arch.size)?;
            // The descriptor is authoritative for slice identity; the inner
            // header may disagree on the subtype.
            slice.cputype = arch.cputype;
            slice.cpusubtype = arch.cpusubtype;
            slices.push(slice);
        }

        Ok(slices)
    }

    /// Reads the i-th arch descriptor, normalized to the 64-bit form.
    fn read_fat_arch(source: &ByteSource, index: u64, is64: bool) -> Result<FatArch> {
        if is64 {
            let offset = FatHeader::SIZE as u64 + index * FatArch64::SIZE as u64;
            let arch = FatArch64::read_from_bytes(source.read_at(offset, FatArch64::SIZE)?)
                .map_err(|_| Error::parse(offset as usize, "failed to read fat_arch_64"))?;
            Ok(FatArch::from(arch))
        } else {
            let offset = FatHeader::SIZE as u64 + index * FatArch32::SIZE as u64;
            let arch = FatArch32::read_from_bytes(source.read_at(offset, FatArch32::SIZE)?)
                .map_err(|_| Error::parse(offset as usize, "failed to read fat_arch"))?;
            Ok(FatArch::from(arch))
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Returns the slices in descriptor order (a single entry for thin files).
    #[inline]
    pub fn slices(&self) -> &[MachO] {
        &self.slices
    }

    /// Returns the slice matching an architecture name.
    ///
    /// Substring match, so "arm64" also selects "arm64e".
    pub fn slice_for_arch(&self, arch: &str) -> Result<&MachO> {
        self.slices
            .iter()
            .find(|s| s.arch_name().contains(arch))
            .ok_or_else(|| Error::ArchNotFound(arch.to_string()))
    }

    /// Returns the total size of the backing stream, for diagnostics.
    #[inline]
    pub fn total_size(&self) -> u64 {
        self.source.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::macho::testutil::{build_fat, build_thin_macho, FatDescriptor, SectionSpec};

    fn thin_image() -> Vec<u8> {
        build_thin_macho(&[SectionSpec {
            segment: "__TEXT",
            section: "__text",
            vmaddr: 0x4000,
            words: &[0xD503201F; 4],
        }])
    }

    #[test]
    fn test_thin_file_has_one_slice() {
        let container =
            MachOContainer::from_byte_source(ByteSource::from_vec(thin_image())).unwrap();
        assert_eq!(container.slices().len(), 1);
        assert_eq!(container.slices()[0].arch_name(), "arm64");
    }

    #[test]
    fn test_fat_file_slice_order() {
        for use64 in [false, true] {
            // Both descriptors wrap the same image, whose header claims
            // ARM64_ALL; the descriptor decides each slice's identity.
            let image = thin_image();
            let data = build_fat(
                &[
                    FatDescriptor {
                        image: &image,
                        cputype: CPU_TYPE_ARM64,
                        cpusubtype: CPU_SUBTYPE_ARM64_ALL,
                    },
                    FatDescriptor {
                        image: &image,
                        cputype: CPU_TYPE_ARM64,
                        cpusubtype: CPU_SUBTYPE_ARM64E,
                    },
                ],
                use64,
            );
            let container =
                MachOContainer::from_byte_source(ByteSource::from_vec(data)).unwrap();
            assert_eq!(container.slices().len(), 2);
            assert_eq!(container.slices()[0].arch_name(), "arm64");
            assert_eq!(container.slices()[1].arch_name(), "arm64e");
            assert!(container.slice_for_arch("arm64e").is_ok());
            assert!(container.slice_for_arch("x86_64").is_err());
        }
    }

    #[test]
    fn test_invalid_arch_count() {
        // Header claims 0 then 6 arch entries; both outside 1..=5.
        for count in [0u32, 6] {
            let mut data = Vec::new();
            data.extend_from_slice(&FAT_MAGIC.to_be_bytes());
            data.extend_from_slice(&count.to_be_bytes());
            data.resize(256, 0);
            let err =
                MachOContainer::from_byte_source(ByteSource::from_vec(data)).unwrap_err();
            assert!(matches!(err, Error::InvalidArchCount(c) if c == count));
        }
    }

    #[test]
    fn test_slice_out_of_bounds() {
        let mut data = Vec::new();
        data.extend_from_slice(&FAT_MAGIC.to_be_bytes());
        data.extend_from_slice(&1u32.to_be_bytes());
        // Descriptor points far past the end of the file.
        data.extend_from_slice(&CPU_TYPE_ARM64.to_be_bytes());
        data.extend_from_slice(&0i32.to_be_bytes());
        data.extend_from_slice(&0x10000u32.to_be_bytes());
        data.extend_from_slice(&0x10000u32.to_be_bytes());
        data.extend_from_slice(&14u32.to_be_bytes());
        data.resize(256, 0);

        let err = MachOContainer::from_byte_source(ByteSource::from_vec(data)).unwrap_err();
        assert!(matches!(err, Error::SliceOutOfBounds { .. }));
    }

    #[test]
    fn test_garbage_is_not_a_container() {
        let err = MachOContainer::from_byte_source(ByteSource::from_vec(vec![0xFFu8; 64]))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidMachoMagic(_)));
    }
}
