//! Random-access byte sources.
//!
//! A [`ByteSource`] provides bounds-checked reads over a fully materialized
//! byte region, backed either by a memory-mapped file or an in-memory
//! buffer. The container layer owns exactly one source per analysis run.

use std::fs::File;
use std::path::Path;

use memmap2::Mmap;

use crate::error::{Error, Result};
use crate::util::read_u32_at;

/// Backing storage for a byte source.
#[derive(Debug)]
enum Backing {
    /// Memory-mapped file.
    Mapped(Mmap),
    /// In-memory buffer.
    Buffer(Vec<u8>),
}

/// A read-only, random-access byte provider.
#[derive(Debug)]
pub struct ByteSource {
    backing: Backing,
}

impl ByteSource {
    /// Opens a file and memory-maps it.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| Error::FileOpen {
            path: path.to_path_buf(),
            source,
        })?;

        // Safety: the mapping is read-only and the file is not mutated
        // through this process while mapped.
        let mmap = unsafe { Mmap::map(&file) }.map_err(|source| Error::MemoryMap {
            path: path.to_path_buf(),
            source,
        })?;

        Ok(Self {
            backing: Backing::Mapped(mmap),
        })
    }

    /// Creates a byte source over an in-memory buffer.
    pub fn from_vec(data: Vec<u8>) -> Self {
        Self {
            backing: Backing::Buffer(data),
        }
    }

    /// Returns the total size of the source in bytes.
    #[inline]
    pub fn len(&self) -> u64 {
        self.as_bytes().len() as u64
    }

    /// Returns true if the source is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.as_bytes().is_empty()
    }

    /// Returns the full backing byte region.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        match &self.backing {
            Backing::Mapped(mmap) => mmap,
            Backing::Buffer(buf) => buf,
        }
    }

    /// Reads `len` bytes at the given absolute offset.
    ///
    /// Reads beyond the end of the source are an error, never a clamp.
    pub fn read_at(&self, offset: u64, len: usize) -> Result<&[u8]> {
        let data = self.as_bytes();
        let end = offset
            .checked_add(len as u64)
            .ok_or(Error::ReadOutOfBounds {
                offset,
                len,
                size: data.len() as u64,
            })?;
        if end > data.len() as u64 {
            return Err(Error::ReadOutOfBounds {
                offset,
                len,
                size: data.len() as u64,
            });
        }
        Ok(&data[offset as usize..end as usize])
    }

    /// Reads a big-endian u32 at the given offset.
    ///
    /// FAT headers and arch descriptors are big-endian on disk.
    pub fn read_u32_be(&self, offset: u64) -> Result<u32> {
        let bytes = self.read_at(offset, 4)?;
        Ok(read_u32_at(bytes, 0, false))
    }

    /// Reads a little-endian u32 at the given offset.
    pub fn read_u32_le(&self, offset: u64) -> Result<u32> {
        let bytes = self.read_at(offset, 4)?;
        Ok(read_u32_at(bytes, 0, true))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_in_bounds() {
        let source = ByteSource::from_vec(vec![1, 2, 3, 4, 5]);
        assert_eq!(source.len(), 5);
        assert_eq!(source.read_at(1, 3).unwrap(), &[2, 3, 4]);
    }

    #[test]
    fn test_read_out_of_bounds() {
        let source = ByteSource::from_vec(vec![1, 2, 3, 4]);
        assert!(matches!(
            source.read_at(2, 3),
            Err(Error::ReadOutOfBounds { .. })
        ));
        assert!(matches!(
            source.read_at(u64::MAX, 1),
            Err(Error::ReadOutOfBounds { .. })
        ));
    }

    #[test]
    fn test_read_u32_be() {
        let source = ByteSource::from_vec(vec![0xCA, 0xFE, 0xBA, 0xBE]);
        assert_eq!(source.read_u32_be(0).unwrap(), 0xCAFEBABE);
        assert_eq!(source.read_u32_le(0).unwrap(), 0xBEBAFECA);
    }
}
