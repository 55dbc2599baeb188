//! vmdisk CLI - create and inspect VMDK disk images.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use log::LevelFilter;
use vmdisk_core::{CreateType, DiskImageFile, FileAccess};

/// Create and inspect VMDK virtual disk images.
#[derive(Parser)]
#[command(name = "vmdisk")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Increase log verbosity (-v for debug, -vv for trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new blank VMDK.
    Create {
        /// Path of the descriptor file to create.
        path: PathBuf,

        /// Capacity, e.g. "512M", "10G", or a byte count.
        #[arg(short, long)]
        size: String,

        /// Disk variant to create.
        #[arg(short = 't', long, value_enum, default_value = "monolithic-sparse")]
        disk_type: DiskTypeArg,
    },

    /// Display information about an existing VMDK.
    Info {
        /// Path to the descriptor or monolithic VMDK file.
        path: PathBuf,
    },
}

/// Disk variant argument mapping.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum DiskTypeArg {
    MonolithicSparse,
    MonolithicFlat,
    TwoGbMaxExtentSparse,
    TwoGbMaxExtentFlat,
    Vmfs,
    VmfsSparse,
}

impl From<DiskTypeArg> for CreateType {
    fn from(arg: DiskTypeArg) -> Self {
        match arg {
            DiskTypeArg::MonolithicSparse => CreateType::MonolithicSparse,
            DiskTypeArg::MonolithicFlat => CreateType::MonolithicFlat,
            DiskTypeArg::TwoGbMaxExtentSparse => CreateType::TwoGbMaxExtentSparse,
            DiskTypeArg::TwoGbMaxExtentFlat => CreateType::TwoGbMaxExtentFlat,
            DiskTypeArg::Vmfs => CreateType::Vmfs,
            DiskTypeArg::VmfsSparse => CreateType::VmfsSparse,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    env_logger::Builder::new().filter_level(level).init();

    match cli.command {
        Commands::Create {
            path,
            size,
            disk_type,
        } => run_create(&path, &size, disk_type),
        Commands::Info { path } => run_info(&path),
    }
}

fn run_create(path: &std::path::Path, size: &str, disk_type: DiskTypeArg) -> Result<()> {
    let capacity = parse_size(size)?;
    let disk = DiskImageFile::initialize(path, capacity, disk_type.into())
        .with_context(|| format!("failed to create {}", path.display()))?;

    println!("created {}", path.display());
    println!("  type:     {}", disk.create_type().as_str());
    println!("  capacity: {} bytes", disk.capacity());
    Ok(())
}

fn run_info(path: &std::path::Path) -> Result<()> {
    let disk = DiskImageFile::open(path, FileAccess::Read)
        .with_context(|| format!("failed to open {}", path.display()))?;

    println!("{}", path.display());
    println!("  type:         {}", disk.create_type().as_str());
    println!("  capacity:     {} bytes", disk.capacity());
    println!("  content id:   {:08x}", disk.content_id());
    println!("  sparse:       {}", disk.is_sparse());
    println!("  needs parent: {}", disk.needs_parent());
    if let Some(parent) = disk.parent_location() {
        println!("  parent:       {}", parent);
    }
    if let Some(geometry) = disk.geometry() {
        println!(
            "  geometry:     {}/{}/{}",
            geometry.cylinders, geometry.heads, geometry.sectors_per_track
        );
    }

    println!("  extents:");
    for extent in &disk.descriptor().extents {
        let name = if extent.file_name.is_empty() {
            "<none>"
        } else {
            extent.file_name.as_str()
        };
        println!(
            "    {} {} sectors, {}",
            extent.extent_type.as_str(),
            extent.size_sectors,
            name
        );
    }

    let content = disk.open_content(None)?;
    let stored: u64 = content.extents().iter().map(|e| e.length).sum();
    println!("  stored:       {} of {} bytes", stored, content.len());
    Ok(())
}

/// Parses a size argument: a plain byte count or a K/M/G/T-suffixed value.
fn parse_size(s: &str) -> Result<u64> {
    let s = s.trim();
    let (digits, multiplier) = match s.chars().last() {
        Some('K') | Some('k') => (&s[..s.len() - 1], 1u64 << 10),
        Some('M') | Some('m') => (&s[..s.len() - 1], 1u64 << 20),
        Some('G') | Some('g') => (&s[..s.len() - 1], 1u64 << 30),
        Some('T') | Some('t') => (&s[..s.len() - 1], 1u64 << 40),
        _ => (s, 1),
    };
    let value: u64 = digits.trim().parse()?;
    let Some(bytes) = value.checked_mul(multiplier) else {
        bail!("size out of range: {}", s);
    };
    Ok(bytes)
}
