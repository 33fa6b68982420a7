//! Mach-O and FAT container constants.

// =============================================================================
// Magic Numbers
// =============================================================================

/// FAT binary magic (32-bit arch descriptors).
pub const FAT_MAGIC: u32 = 0xCAFEBABE;

/// FAT binary magic (64-bit arch descriptors).
pub const FAT_MAGIC_64: u32 = 0xCAFEBABF;

/// 64-bit Mach-O magic (host order).
pub const MH_MAGIC_64: u32 = 0xFEEDFACF;

/// 64-bit Mach-O magic (byte-swapped on disk).
pub const MH_CIGAM_64: u32 = 0xCFFAEDFE;

/// 32-bit Mach-O magic (host order).
pub const MH_MAGIC: u32 = 0xFEEDFACE;

/// 32-bit Mach-O magic (byte-swapped on disk).
pub const MH_CIGAM: u32 = 0xCEFAEDFE;

/// Maximum plausible slice count for a target FAT container.
///
/// A sanity heuristic rather than a format limit: real iOS/macOS fat
/// binaries carry a handful of slices, so wildly large counts mean the
/// file is not a genuine container for this toolchain.
pub const MAX_FAT_ARCH_COUNT: u32 = 5;

// =============================================================================
// CPU Types
// =============================================================================

/// 64-bit architecture flag.
pub const CPU_ARCH_ABI64: i32 = 0x0100_0000;

/// ARM CPU type.
pub const CPU_TYPE_ARM: i32 = 12;
/// ARM64 CPU type.
pub const CPU_TYPE_ARM64: i32 = CPU_TYPE_ARM | CPU_ARCH_ABI64;

/// x86 CPU type.
pub const CPU_TYPE_X86: i32 = 7;
/// x86_64 CPU type.
pub const CPU_TYPE_X86_64: i32 = CPU_TYPE_X86 | CPU_ARCH_ABI64;

/// ARM64e CPU subtype (pointer authentication).
pub const CPU_SUBTYPE_ARM64E: i32 = 2;

/// ARM64 all CPU subtype.
pub const CPU_SUBTYPE_ARM64_ALL: i32 = 0;

// =============================================================================
// Load Commands
// =============================================================================

/// 32-bit segment load command.
pub const LC_SEGMENT: u32 = 0x1;

/// 64-bit segment load command.
pub const LC_SEGMENT_64: u32 = 0x19;

// =============================================================================
// Section Flags
// =============================================================================

/// Mask for the section type bits of a section's flags.
pub const SECTION_TYPE: u32 = 0x0000_00FF;

/// Zero-filled section (no file backing).
pub const S_ZEROFILL: u32 = 0x1;

/// Returns a human-readable architecture name for a cpu type/subtype pair.
pub fn arch_name(cputype: i32, cpusubtype: i32) -> &'static str {
    match cputype {
        CPU_TYPE_ARM64 => {
            if (cpusubtype & 0xFF) == CPU_SUBTYPE_ARM64E {
                "arm64e"
            } else {
                "arm64"
            }
        }
        CPU_TYPE_ARM => "arm",
        CPU_TYPE_X86_64 => "x86_64",
        CPU_TYPE_X86 => "i386",
        _ => "unknown",
    }
}
