//! patchfind - inspect Mach-O containers and dump ARM64 xrefs.

use std::ops::ControlFlow;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use patchfind::{enumerate_xrefs, MachOContainer, XrefTypes};

/// Mach-O container inspection and ARM64 xref recovery.
#[derive(Parser, Debug)]
#[command(name = "patchfind")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Verbosity level (0=quiet, 1=warnings, 2=info, 3=debug)
    #[arg(short, long, default_value = "1", global = true)]
    verbosity: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List the architecture slices of a container
    Slices {
        /// Path to a thin or FAT Mach-O file
        file: PathBuf,
    },

    /// List segments and sections of a slice
    Sections {
        /// Path to a thin or FAT Mach-O file
        file: PathBuf,

        /// Architecture to select (e.g. "arm64e"); required for FAT files
        /// with more than one slice
        #[arg(short, long)]
        arch: Option<String>,
    },

    /// Enumerate ARM64 xrefs over a section
    Xrefs {
        /// Path to a thin or FAT Mach-O file
        file: PathBuf,

        /// Section to scan, as "SEGMENT,section" (e.g. "__TEXT,__text")
        #[arg(short, long, default_value = "__TEXT,__text")]
        section: String,

        /// Xref kinds to report (comma-separated: b, bl, adr, adrp-add,
        /// adrp-ldr, adrp-str). Defaults to all.
        #[arg(short, long)]
        types: Option<String>,

        /// Architecture to select
        #[arg(short, long)]
        arch: Option<String>,

        /// Stop after this many events
        #[arg(short, long)]
        limit: Option<u64>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbosity);

    match cli.command {
        Commands::Slices { file } => cmd_slices(file),
        Commands::Sections { file, arch } => cmd_sections(file, arch),
        Commands::Xrefs {
            file,
            section,
            types,
            arch,
            limit,
        } => cmd_xrefs(file, section, types, arch, limit),
    }
}

fn setup_logging(verbosity: u8) {
    let level = match verbosity {
        0 => Level::ERROR,
        1 => Level::WARN,
        2 => Level::INFO,
        _ => Level::DEBUG,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .without_time()
        .finish();

    tracing::subscriber::set_global_default(subscriber).ok();
}

fn open_container(file: &PathBuf) -> Result<MachOContainer> {
    MachOContainer::open(file)
        .with_context(|| format!("failed to parse container: {}", file.display()))
}

/// Selects a slice by arch name, or the only slice if the file is thin.
fn select_slice<'a>(
    container: &'a MachOContainer,
    arch: Option<&str>,
) -> Result<&'a patchfind::MachO> {
    match arch {
        Some(name) => Ok(container.slice_for_arch(name)?),
        None => {
            let slices = container.slices();
            if slices.len() > 1 {
                let available: Vec<_> = slices.iter().map(|s| s.arch_name()).collect();
                bail!(
                    "container has {} slices; select one with --arch ({})",
                    slices.len(),
                    available.join(", ")
                );
            }
            Ok(&slices[0])
        }
    }
}

fn cmd_slices(file: PathBuf) -> Result<()> {
    let container = open_container(&file)?;

    println!(
        "{} ({} bytes, {} slice(s))",
        file.display(),
        container.total_size(),
        container.slices().len()
    );
    for (i, slice) in container.slices().iter().enumerate() {
        println!(
            "  [{}] {:<8} offset {:#010x} size {:#x}",
            i,
            slice.arch_name(),
            slice.base_offset,
            slice.size()
        );
    }

    Ok(())
}

fn cmd_sections(file: PathBuf, arch: Option<String>) -> Result<()> {
    let container = open_container(&file)?;
    let slice = select_slice(&container, arch.as_deref())?;

    for seg in slice.segments() {
        println!(
            "{:<16} {:#018x} + {:#x}",
            seg.name(),
            seg.command.vmaddr,
            seg.command.vmsize
        );
        for sect in &seg.sections {
            println!(
                "  {:<24} {:#018x} + {:#x}",
                format!("{},{}", sect.segment_name(), sect.name()),
                sect.addr,
                sect.size
            );
        }
    }

    Ok(())
}

/// Parses a comma-separated type list into a mask.
fn parse_types(spec: &str) -> Result<XrefTypes> {
    let mut types = XrefTypes::empty();
    for name in spec.split(',') {
        types |= match name.trim() {
            "b" => XrefTypes::B,
            "bl" => XrefTypes::BL,
            "adr" => XrefTypes::ADR,
            "adrp-add" => XrefTypes::ADRP_ADD,
            "adrp-ldr" => XrefTypes::ADRP_LDR,
            "adrp-str" => XrefTypes::ADRP_STR,
            other => bail!("unknown xref type: {other}"),
        };
    }
    Ok(types)
}

fn cmd_xrefs(
    file: PathBuf,
    section: String,
    types: Option<String>,
    arch: Option<String>,
    limit: Option<u64>,
) -> Result<()> {
    let container = open_container(&file)?;
    let slice = select_slice(&container, arch.as_deref())?;

    if !slice.is_arm64() {
        bail!("xref analysis requires an arm64 slice, got {}", slice.arch_name());
    }

    let (segname, sectname) = section
        .split_once(',')
        .with_context(|| format!("section must be \"SEGMENT,section\", got \"{section}\""))?;
    let section = slice.section(segname, sectname)?;

    let types = match types {
        Some(spec) => parse_types(&spec)?,
        None => XrefTypes::all(),
    };

    let mut count = 0u64;
    enumerate_xrefs(&section, types, |xref| {
        println!("{:#018x} -> {:#018x}  {}", xref.source, xref.target, xref.kind);
        count += 1;
        match limit {
            Some(max) if count >= max => ControlFlow::Break(()),
            _ => ControlFlow::Continue(()),
        }
    })?;

    println!("{count} xref(s)");
    Ok(())
}
