//! Mach-O container, slice, and section handling.
//!
//! This module turns a raw byte stream into one or more addressable
//! architecture slices: FAT dispatch at the top, load-command walking per
//! slice, and borrowed section views for the analysis layer.

mod constants;
mod container;
mod section;
mod slice;
mod structs;

#[cfg(test)]
pub(crate) mod testutil;

pub use constants::*;
pub use container::MachOContainer;
pub use section::Section;
pub use slice::{MachO, SegmentInfo};
pub use structs::*;
