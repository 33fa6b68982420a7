//! ARM64 instruction decoding for xref recovery.
//!
//! Only the forms the xref engine needs are decoded: unconditional B/BL,
//! ADR/ADRP, immediate ADD, and the unsigned-offset load/store class.
//! Every decoder is a pure function returning `None` for "not this form";
//! that outcome is ordinary control flow, never an error.
//!
//! Register fields are raw register numbers (0-31); immediates are
//! sign-extended per their field width before use.

use crate::util::align_down;

/// Sign-extends the low `bits` of `value` to 64 bits.
#[inline]
const fn sign_extend(value: u64, bits: u32) -> i64 {
    let shift = 64 - bits;
    ((value << shift) as i64) >> shift
}

// =============================================================================
// Decoded Forms
// =============================================================================

/// A decoded unconditional branch (B or BL).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Branch {
    /// True for BL (branch with link)
    pub link: bool,
    /// Absolute branch target
    pub target: u64,
}

/// A decoded ADR or ADRP.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Adr {
    /// True for ADRP (page-granular), false for ADR (byte-precise)
    pub page: bool,
    /// Destination register
    pub rd: u8,
    /// Materialized absolute address
    pub target: u64,
}

/// A decoded ADD (immediate).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddImm {
    /// Destination register
    pub rd: u8,
    /// Source register
    pub rn: u8,
    /// Immediate, with the optional LSL #12 already applied
    pub imm: u32,
}

/// Access width of a load or store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessWidth {
    /// 8-bit
    Byte,
    /// 16-bit
    Half,
    /// 32-bit
    Word,
    /// 64-bit
    Double,
}

impl AccessWidth {
    #[inline]
    fn from_size(size: u32) -> Self {
        match size & 0x3 {
            0 => AccessWidth::Byte,
            1 => AccessWidth::Half,
            2 => AccessWidth::Word,
            _ => AccessWidth::Double,
        }
    }
}

/// A decoded LDR (unsigned immediate offset), including the signed-load
/// opcodes (LDRSB/LDRSH/LDRSW).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LdrImm {
    /// Destination register
    pub rt: u8,
    /// Base register
    pub rn: u8,
    /// Byte offset (imm12 scaled by the access size)
    pub imm: u64,
    /// Access width
    pub width: AccessWidth,
    /// True for sign-extending loads
    pub signed: bool,
}

/// A decoded STR (unsigned immediate offset).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StrImm {
    /// Source register
    pub rt: u8,
    /// Base register
    pub rn: u8,
    /// Byte offset (imm12 scaled by the access size)
    pub imm: u64,
    /// Access width
    pub width: AccessWidth,
}

// =============================================================================
// Decoders
// =============================================================================

/// Decodes an unconditional B or BL at `pc`.
pub fn decode_branch(inst: u32, pc: u64) -> Option<Branch> {
    if inst & 0x7C00_0000 != 0x1400_0000 {
        return None;
    }
    let link = inst & 0x8000_0000 != 0;
    let imm26 = sign_extend(u64::from(inst & 0x03FF_FFFF), 26);
    Some(Branch {
        link,
        target: pc.wrapping_add((imm26 << 2) as u64),
    })
}

/// Decodes an ADR or ADRP at `pc`.
///
/// ADRP targets are page-granular: the page-aligned pc plus the immediate
/// scaled by 4 KiB. ADR targets are byte-precise.
pub fn decode_adr(inst: u32, pc: u64) -> Option<Adr> {
    if inst & 0x1F00_0000 != 0x1000_0000 {
        return None;
    }
    let page = inst & 0x8000_0000 != 0;
    let rd = (inst & 0x1F) as u8;
    let immlo = u64::from((inst >> 29) & 0x3);
    let immhi = u64::from((inst >> 5) & 0x7_FFFF);
    let imm = sign_extend((immhi << 2) | immlo, 21);

    let target = if page {
        align_down(pc, 0x1000).wrapping_add((imm << 12) as u64)
    } else {
        pc.wrapping_add(imm as u64)
    };

    Some(Adr { page, rd, target })
}

/// Decodes an ADD (immediate), 32- or 64-bit.
pub fn decode_add_imm(inst: u32) -> Option<AddImm> {
    if inst & 0x7F80_0000 != 0x1100_0000 {
        return None;
    }
    let imm12 = (inst >> 10) & 0xFFF;
    let shifted = (inst >> 22) & 0x1 != 0;
    Some(AddImm {
        rd: (inst & 0x1F) as u8,
        rn: ((inst >> 5) & 0x1F) as u8,
        imm: if shifted { imm12 << 12 } else { imm12 },
    })
}

/// Decodes an LDR-class load with unsigned immediate offset.
///
/// Covers LDRB/LDRH/LDR (32/64) and the sign-extending LDRSB/LDRSH/LDRSW
/// forms. The byte offset is the 12-bit immediate scaled by the access
/// size.
pub fn decode_ldr_imm(inst: u32) -> Option<LdrImm> {
    // Load/store register, unsigned immediate, non-vector.
    if inst & 0x3F00_0000 != 0x3900_0000 {
        return None;
    }
    let size = (inst >> 30) & 0x3;
    let opc = (inst >> 22) & 0x3;

    let signed = match opc {
        0b01 => false,
        // opc=10 with size=11 is PRFM, not a load.
        0b10 if size != 0b11 => true,
        // Sign-extend to 32-bit dest exists only for byte/half accesses.
        0b11 if size <= 0b01 => true,
        _ => return None,
    };

    let imm12 = u64::from((inst >> 10) & 0xFFF);
    Some(LdrImm {
        rt: (inst & 0x1F) as u8,
        rn: ((inst >> 5) & 0x1F) as u8,
        imm: imm12 << size,
        width: AccessWidth::from_size(size),
        signed,
    })
}

/// Decodes an STR-class store with unsigned immediate offset
/// (STRB/STRH/STR 32/64).
pub fn decode_str_imm(inst: u32) -> Option<StrImm> {
    if inst & 0x3F00_0000 != 0x3900_0000 {
        return None;
    }
    let opc = (inst >> 22) & 0x3;
    if opc != 0b00 {
        return None;
    }
    let size = (inst >> 30) & 0x3;
    let imm12 = u64::from((inst >> 10) & 0xFFF);
    Some(StrImm {
        rt: (inst & 0x1F) as u8,
        rn: ((inst >> 5) & 0x1F) as u8,
        imm: imm12 << size,
        width: AccessWidth::from_size(size),
    })
}

// =============================================================================
// Pattern Generation
// =============================================================================

/// Returns true if the instruction is ADRP.
#[inline]
pub fn is_adrp(inst: u32) -> bool {
    (inst & 0x9F00_0000) == 0x9000_0000
}

/// Generates a (pattern, mask) pair matching any ADRP that writes `rd`.
///
/// The immediate bits are wildcarded, so the pair matches an ADRP with any
/// target page. This drives the backward search in the fusion paths.
pub fn adrp_pattern(rd: u8) -> (u32, u32) {
    (0x9000_0000 | u32::from(rd & 0x1F), 0x9F00_001F)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_branch_b_and_bl() {
        let pc = 0x1_0000_4000u64;

        // B +8
        let b = decode_branch(0x14000002, pc).unwrap();
        assert!(!b.link);
        assert_eq!(b.target, pc + 8);

        // BL with the same immediate
        let bl = decode_branch(0x94000002, pc).unwrap();
        assert!(bl.link);
        assert_eq!(bl.target, pc + 8);

        // Backward branch: B -4
        let back = decode_branch(0x17FFFFFF, pc).unwrap();
        assert_eq!(back.target, pc - 4);

        // Not a branch
        assert!(decode_branch(0xD503201F, pc).is_none());
    }

    #[test]
    fn test_decode_adrp_page_arithmetic() {
        // ADRP X0, #1 at a page-aligned pc: target is the next page.
        let pc = 0x1_0000_4000u64;
        let adrp = decode_adr(0xB0000000, pc).unwrap();
        assert!(adrp.page);
        assert_eq!(adrp.rd, 0);
        assert_eq!(adrp.target, pc + 0x1000);

        // The low pc bits do not leak into the target.
        let adrp = decode_adr(0xB0000000, pc + 0x123 * 4).unwrap();
        assert_eq!(adrp.target, pc + 0x1000);
    }

    #[test]
    fn test_decode_adr_byte_precise() {
        // ADR X0, #16
        let pc = 0x1_0000_4000u64;
        let adr = decode_adr(0x10000080, pc).unwrap();
        assert!(!adr.page);
        assert_eq!(adr.target, pc + 16);

        // Negative immediate: ADR X1, #-4 (imm21 = -4)
        let adr = decode_adr(0x10FFFFE1, pc).unwrap();
        assert_eq!(adr.rd, 1);
        assert_eq!(adr.target, pc - 4);
    }

    #[test]
    fn test_decode_add_imm() {
        // ADD X1, X2, #0x123
        let add = decode_add_imm(0x91048C41).unwrap();
        assert_eq!(add.rd, 1);
        assert_eq!(add.rn, 2);
        assert_eq!(add.imm, 0x123);

        // ADD X1, X2, #0x123, LSL #12
        let add = decode_add_imm(0x91448C41).unwrap();
        assert_eq!(add.imm, 0x123 << 12);

        // SUB must not match
        assert!(decode_add_imm(0xD1048C41).is_none());
    }

    #[test]
    fn test_decode_ldr_imm() {
        // LDR X1, [X0, #0x18]
        let ldr = decode_ldr_imm(0xF9400C01).unwrap();
        assert_eq!(ldr.rt, 1);
        assert_eq!(ldr.rn, 0);
        assert_eq!(ldr.imm, 0x18);
        assert_eq!(ldr.width, AccessWidth::Double);
        assert!(!ldr.signed);

        // LDRB W3, [X2, #5]
        let ldrb = decode_ldr_imm(0x39401443).unwrap();
        assert_eq!(ldrb.imm, 5);
        assert_eq!(ldrb.width, AccessWidth::Byte);

        // LDRSW X4, [X5, #8]: signed load, imm scaled by 4
        let ldrsw = decode_ldr_imm(0xB98008A4).unwrap();
        assert_eq!(ldrsw.imm, 8);
        assert!(ldrsw.signed);
        assert_eq!(ldrsw.width, AccessWidth::Word);

        // A store must not decode as a load.
        assert!(decode_ldr_imm(0xF9000C01).is_none());
        // PRFM (size=11, opc=10) must not decode as a load.
        assert!(decode_ldr_imm(0xF9800000).is_none());
    }

    #[test]
    fn test_decode_str_imm() {
        // STR W2, [X3, #8]
        let str_ = decode_str_imm(0xB9000862).unwrap();
        assert_eq!(str_.rt, 2);
        assert_eq!(str_.rn, 3);
        assert_eq!(str_.imm, 8);
        assert_eq!(str_.width, AccessWidth::Word);

        // STR X7, [X1, #0x10]
        let str_ = decode_str_imm(0xF9000827).unwrap();
        assert_eq!(str_.imm, 0x10);
        assert_eq!(str_.width, AccessWidth::Double);

        // A load must not decode as a store.
        assert!(decode_str_imm(0xF9400C01).is_none());
    }

    #[test]
    fn test_adrp_pattern_matches_any_page() {
        let (pattern, mask) = adrp_pattern(8);

        // ADRP X8 with assorted immediates all match.
        for inst in [0x90000008u32, 0xB0000008, 0x90FFF028, 0xF0000008] {
            assert!(is_adrp(inst));
            assert_eq!(inst & mask, pattern, "inst {inst:#x} should match");
        }

        // Different destination register does not match.
        assert_ne!(0x90000009u32 & mask, pattern);
        // ADR (non-page) does not match.
        assert_ne!(0x10000008u32 & mask, pattern);
    }
}
