//! Error types for Mach-O parsing and xref analysis.
//!
//! "Instruction word does not match this decode form" is deliberately *not*
//! an error: the decoders in [`crate::arm64`] return `Option` so the xref
//! engine can probe several forms per word without error plumbing.

use std::path::PathBuf;

use thiserror::Error;

/// The main error type for container parsing and section access.
#[derive(Error, Debug)]
pub enum Error {
    // ==================== I/O Errors ====================
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to open file '{path}': {source}")]
    FileOpen {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to memory map file '{path}': {source}")]
    MemoryMap {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("read of {len} bytes at offset {offset:#x} exceeds stream size {size:#x}")]
    ReadOutOfBounds { offset: u64, len: usize, size: u64 },

    // ==================== Container Format Errors ====================
    #[error("invalid FAT arch count {0}: expected 1..=5 (not a plausible target container)")]
    InvalidArchCount(u32),

    #[error("FAT slice at {offset:#x}+{size:#x} exceeds file size {file_size:#x}")]
    SliceOutOfBounds {
        offset: u64,
        size: u64,
        file_size: u64,
    },

    // ==================== Mach-O Errors ====================
    #[error("invalid Mach-O magic: {0:#x}")]
    InvalidMachoMagic(u32),

    #[error("load command at offset {offset:#x} extends beyond header")]
    LoadCommandOverflow { offset: usize },

    #[error("Mach-O section '{segment},{section}' not found")]
    SectionNotFound { segment: String, section: String },

    #[error("no slice matches architecture '{0}'")]
    ArchNotFound(String),

    #[error("parse error at offset {offset:#x}: {reason}")]
    Parse { offset: usize, reason: String },

    // ==================== Section Access Errors ====================
    #[error("address {addr:#x} outside section range {vmaddr:#x}+{size:#x}")]
    SectionOutOfRange { addr: u64, vmaddr: u64, size: u64 },

    #[error("address {addr:#x} not aligned to {alignment}")]
    Misaligned { addr: u64, alignment: u64 },
}

/// A specialized Result type for patchfind operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Creates a parse error with a formatted message.
    #[inline]
    pub fn parse(offset: usize, reason: impl Into<String>) -> Self {
        Error::Parse {
            offset,
            reason: reason.into(),
        }
    }
}
