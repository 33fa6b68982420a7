//! patchfind - Mach-O parsing and ARM64 cross-reference recovery.
//!
//! This library loads Apple Mach-O binaries (thin or FAT), exposes their
//! code sections as addressable byte ranges, and recovers cross-references
//! from decoded ARM64 instruction semantics: branches, ADR/ADRP address
//! materialization, and ADRP-fused ADD/LDR/STR sequences. Matching on
//! instruction semantics instead of byte signatures keeps patch location
//! resilient to compiler reordering and recompilation.
//!
//! # Example
//!
//! ```no_run
//! use std::ops::ControlFlow;
//! use patchfind::{enumerate_xrefs, MachOContainer, XrefTypes};
//!
//! fn main() -> patchfind::Result<()> {
//!     let container = MachOContainer::open("/path/to/kernelcache")?;
//!     let slice = container.slice_for_arch("arm64")?;
//!     let text = slice.section("__TEXT", "__text")?;
//!
//!     enumerate_xrefs(&text, XrefTypes::BL, |xref| {
//!         println!("{:#x} -> {:#x}", xref.source, xref.target);
//!         ControlFlow::Continue(())
//!     })?;
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod arm64;
pub mod error;
pub mod macho;
pub mod stream;
pub mod util;
pub mod xref;

// Re-export main types
pub use error::{Error, Result};
pub use macho::{MachO, MachOContainer, Section};
pub use stream::ByteSource;
pub use xref::{enumerate_xrefs, Xref, XrefKind, XrefTypes, ADRP_SEEK_BACK};
