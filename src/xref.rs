//! ARM64 cross-reference enumeration.
//!
//! The engine linear-scans a section's instruction words and streams typed
//! xref events to a caller-supplied visitor. Branches and ADR give a
//! target directly; the ADRP fusion paths pair an immediate ADD/LDR/STR
//! with the nearest preceding ADRP that set up its base register, found by
//! a bounded backward pattern search.
//!
//! The fusion search does not check whether an instruction between the
//! ADRP and its consumer redefines the shared register or starts a new
//! function, so it can report false positives. That imprecision is a
//! known property of the heuristic and downstream consumers account for
//! it; do not tighten it here.

use std::fmt;
use std::ops::ControlFlow;

use bitflags::bitflags;

use crate::arm64;
use crate::error::Result;
use crate::macho::Section;

/// How many instruction slots the fusion paths search backward for the
/// matching ADRP. Small on purpose: a wider window starts associating
/// consumers with unrelated earlier ADRPs.
pub const ADRP_SEEK_BACK: u32 = 8;

// =============================================================================
// Event Types
// =============================================================================

/// The kind of a recovered cross-reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XrefKind {
    /// Unconditional branch
    B,
    /// Branch with link
    Bl,
    /// Byte-precise address materialization
    Adr,
    /// ADRP fused with a dependent immediate ADD
    AdrpAdd,
    /// ADRP fused with a dependent immediate LDR
    AdrpLdr,
    /// ADRP fused with a dependent immediate STR
    AdrpStr,
}

impl fmt::Display for XrefKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            XrefKind::B => "b",
            XrefKind::Bl => "bl",
            XrefKind::Adr => "adr",
            XrefKind::AdrpAdd => "adrp+add",
            XrefKind::AdrpLdr => "adrp+ldr",
            XrefKind::AdrpStr => "adrp+str",
        };
        f.write_str(name)
    }
}

bitflags! {
    /// Selects which xref kinds an enumeration reports.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct XrefTypes: u32 {
        /// Unconditional branches
        const B = 1 << 0;
        /// Branches with link
        const BL = 1 << 1;
        /// ADR materializations
        const ADR = 1 << 2;
        /// ADRP+ADD fusions
        const ADRP_ADD = 1 << 3;
        /// ADRP+LDR fusions
        const ADRP_LDR = 1 << 4;
        /// ADRP+STR fusions
        const ADRP_STR = 1 << 5;
    }
}

/// A recovered cross-reference event.
///
/// Ephemeral: produced and consumed within one enumeration call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Xref {
    /// The kind of reference
    pub kind: XrefKind,
    /// Address of the referencing instruction
    pub source: u64,
    /// Recovered target address
    pub target: u64,
}

// =============================================================================
// Enumeration Engine
// =============================================================================

/// Enumerates xrefs over every instruction slot of `section`, in ascending
/// address order, invoking `visit` for each event whose kind is in `types`.
///
/// The visitor's `ControlFlow::Break` stops the scan before the next
/// address is examined. Words that match none of the requested forms are
/// skipped; only an out-of-range section read aborts the call.
pub fn enumerate_xrefs<F>(section: &Section<'_>, types: XrefTypes, mut visit: F) -> Result<()>
where
    F: FnMut(Xref) -> ControlFlow<()>,
{
    let mut addr = section.vmaddr();
    let end = section.end_addr();

    while addr < end {
        let inst = section.read_u32(addr)?;

        if let ControlFlow::Break(()) = scan_word(section, types, inst, addr, &mut visit) {
            return Ok(());
        }

        addr += 4;
    }

    Ok(())
}

/// Probes one instruction word against every requested form.
fn scan_word<F>(
    section: &Section<'_>,
    types: XrefTypes,
    inst: u32,
    addr: u64,
    visit: &mut F,
) -> ControlFlow<()>
where
    F: FnMut(Xref) -> ControlFlow<()>,
{
    // Branch forms are mutually exclusive with everything else at the
    // same address: a successful decode ends the probing for this word.
    if types.intersects(XrefTypes::B | XrefTypes::BL) {
        if let Some(branch) = arm64::decode_branch(inst, addr) {
            if branch.link && types.contains(XrefTypes::BL) {
                visit(Xref {
                    kind: XrefKind::Bl,
                    source: addr,
                    target: branch.target,
                })?;
            } else if !branch.link && types.contains(XrefTypes::B) {
                visit(Xref {
                    kind: XrefKind::B,
                    source: addr,
                    target: branch.target,
                })?;
            }
            return ControlFlow::Continue(());
        }
    }

    if types.contains(XrefTypes::ADR) {
        if let Some(adr) = arm64::decode_adr(inst, addr) {
            // A standalone ADRP is never an event; it only participates
            // in the fusion paths below.
            if !adr.page {
                visit(Xref {
                    kind: XrefKind::Adr,
                    source: addr,
                    target: adr.target,
                })?;
            }
            return ControlFlow::Continue(());
        }
    }

    if types.contains(XrefTypes::ADRP_ADD) {
        if let Some(add) = arm64::decode_add_imm(inst) {
            if let Some(page) = find_adrp_page(section, addr, add.rn) {
                visit(Xref {
                    kind: XrefKind::AdrpAdd,
                    source: addr,
                    target: page.wrapping_add(u64::from(add.imm)),
                })?;
            }
        }
    }

    if types.contains(XrefTypes::ADRP_LDR) {
        if let Some(ldr) = arm64::decode_ldr_imm(inst) {
            if let Some(page) = find_adrp_page(section, addr, ldr.rn) {
                visit(Xref {
                    kind: XrefKind::AdrpLdr,
                    source: addr,
                    target: page.wrapping_add(ldr.imm),
                })?;
            }
        }
    }

    if types.contains(XrefTypes::ADRP_STR) {
        if let Some(str_) = arm64::decode_str_imm(inst) {
            if let Some(page) = find_adrp_page(section, addr, str_.rn) {
                visit(Xref {
                    kind: XrefKind::AdrpStr,
                    source: addr,
                    target: page.wrapping_add(str_.imm),
                })?;
            }
        }
    }

    ControlFlow::Continue(())
}

/// Searches backward from `addr` for an ADRP that writes `reg` and returns
/// the page address it materializes.
fn find_adrp_page(section: &Section<'_>, addr: u64, reg: u8) -> Option<u64> {
    let (pattern, mask) = arm64::adrp_pattern(reg);
    let adrp_addr = section.find_prev_inst(addr, ADRP_SEEK_BACK, pattern, mask)?;
    let adrp_inst = section.read_u32(adrp_addr).ok()?;
    // The pattern search only matches ADRP encodings, so this decodes.
    arm64::decode_adr(adrp_inst, adrp_addr).map(|adr| adr.target)
}
