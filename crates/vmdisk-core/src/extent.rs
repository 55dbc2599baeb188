//! Creating and opening individual disk extents.

use std::cmp;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};

use log::debug;

use crate::descriptor::{ExtentAccess, ExtentDescriptor, ExtentType};
use crate::error::{Error, Result};
use crate::locator::{FileAccess, FileLocator, FileMode, FileShare};
use crate::sector::SECTOR_SIZE;
use crate::sparse::hosted::HostedSparseExtentStream;
use crate::sparse::layout::ExtentLayout;
use crate::sparse::server::ServerSparseExtentStream;
use crate::sparse::ServerSparseExtentHeader;
use crate::stream::{self, SharedStream, SparseStream, StreamExtent, ZeroStream};

/// Writes the initial on-disk structure for a new extent into `file`.
///
/// For sparse extents, `descriptor_length_bytes` reserves an embedded
/// descriptor window. Returns the descriptor start sector (0 when no window
/// was reserved).
pub fn initialize_extent(
    file: &mut File,
    extent_type: ExtentType,
    size_bytes: u64,
    descriptor_length_bytes: u64,
) -> Result<u64> {
    match extent_type {
        ExtentType::Flat | ExtentType::Vmfs => {
            file.set_len(size_bytes)?;
            Ok(0)
        }
        ExtentType::Sparse => initialize_sparse(file, size_bytes, descriptor_length_bytes),
        ExtentType::VmfsSparse => initialize_server_sparse(file, size_bytes),
        other => Err(Error::unsupported_extent_type(other.as_str())),
    }
}

fn initialize_sparse(file: &mut File, size_bytes: u64, descriptor_length_bytes: u64) -> Result<u64> {
    let layout = ExtentLayout::plan(size_bytes, descriptor_length_bytes);
    let header = layout.header(size_bytes);
    debug!(
        "initializing sparse extent: {} bytes, grain {} sectors, data at sector {}",
        size_bytes, layout.grain_size, layout.data_start
    );

    file.seek(SeekFrom::Start(0))?;
    file.write_all(&header.write())?;

    if layout.descriptor_length > 0 {
        file.seek(SeekFrom::Start(layout.descriptor_start * SECTOR_SIZE))?;
        file.write_all(&vec![0u8; layout.descriptor_length as usize])?;
    }

    // Both directories list their grain tables at a fixed stride
    let stride = layout.grain_table_stride();
    let mut rgd = Vec::with_capacity((layout.num_grain_tables * 4) as usize);
    let mut gd = Vec::with_capacity((layout.num_grain_tables * 4) as usize);
    for i in 0..layout.num_grain_tables {
        let redundant_table = layout.redundant_gt_start + i * stride;
        let table = layout.gt_start + i * stride;
        rgd.extend_from_slice(&(redundant_table as u32).to_le_bytes());
        gd.extend_from_slice(&(table as u32).to_le_bytes());
    }
    file.seek(SeekFrom::Start(layout.rgd_start * SECTOR_SIZE))?;
    file.write_all(&rgd)?;
    file.seek(SeekFrom::Start(layout.gd_start * SECTOR_SIZE))?;
    file.write_all(&gd)?;

    // Every grain table slot starts out unallocated
    let tables = vec![0u8; (layout.num_grain_tables * stride * SECTOR_SIZE) as usize];
    file.seek(SeekFrom::Start(layout.redundant_gt_start * SECTOR_SIZE))?;
    file.write_all(&tables)?;
    file.seek(SeekFrom::Start(layout.gt_start * SECTOR_SIZE))?;
    file.write_all(&tables)?;

    file.set_len(layout.data_start * SECTOR_SIZE)?;
    Ok(layout.descriptor_start)
}

fn initialize_server_sparse(file: &mut File, size_bytes: u64) -> Result<u64> {
    let header = ServerSparseExtentHeader::new(size_bytes);
    file.seek(SeekFrom::Start(0))?;
    file.write_all(&header.write())?;
    file.write_all(&vec![0u8; header.num_gd_entries as usize * 4])?;
    file.set_len(header.free_sector as u64 * SECTOR_SIZE)?;
    Ok(0)
}

/// Opens one extent as a sparse stream.
///
/// `extent_start` is the extent's byte offset within the logical disk; the
/// parent stream, when retained, is read at that offset for unallocated
/// grains. Non-differencing extent types drop the parent handle.
pub fn open_extent(
    locator: &dyn FileLocator,
    disk_access: FileAccess,
    extent: &ExtentDescriptor,
    extent_start: u64,
    parent: Option<SharedStream>,
) -> Result<Box<dyn SparseStream>> {
    let access = if disk_access == FileAccess::ReadWrite
        && extent.access == ExtentAccess::ReadWrite
    {
        FileAccess::ReadWrite
    } else {
        FileAccess::Read
    };
    let share = if access == FileAccess::ReadWrite {
        FileShare::None
    } else {
        FileShare::Read
    };

    match extent.extent_type {
        ExtentType::Flat | ExtentType::Vmfs => {
            let file = locator.open(&extent.file_name, FileMode::Open, access, share)?;
            Ok(Box::new(FlatExtentStream::new(
                file,
                extent.offset_sectors * SECTOR_SIZE,
                extent.size_sectors * SECTOR_SIZE,
            )))
        }
        ExtentType::Zero => Ok(Box::new(ZeroStream::new(
            extent.size_sectors * SECTOR_SIZE,
        ))),
        ExtentType::Sparse => {
            let file = locator.open(&extent.file_name, FileMode::Open, access, share)?;
            Ok(Box::new(HostedSparseExtentStream::new(
                file,
                extent_start,
                parent,
            )?))
        }
        ExtentType::VmfsSparse => {
            let file = locator.open(&extent.file_name, FileMode::Open, access, share)?;
            Ok(Box::new(ServerSparseExtentStream::new(
                file,
                extent_start,
                parent,
            )?))
        }
        other => Err(Error::unsupported_extent_type(other.as_str())),
    }
}

/// A raw extent file presented as a single contiguous stored range.
pub struct FlatExtentStream {
    file: File,
    /// Byte offset of the extent's data within the backing file.
    base: u64,
    length: u64,
    position: u64,
}

impl FlatExtentStream {
    /// Wraps `file`, exposing `length` bytes starting at `base`.
    pub fn new(file: File, base: u64, length: u64) -> Self {
        Self {
            file,
            base,
            length,
            position: 0,
        }
    }
}

impl Read for FlatExtentStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.position >= self.length {
            return Ok(0);
        }
        let count = cmp::min(buf.len() as u64, self.length - self.position) as usize;
        self.file
            .seek(SeekFrom::Start(self.base + self.position))?;
        let n = self.file.read(&mut buf[..count])?;
        self.position += n as u64;
        Ok(n)
    }
}

impl Seek for FlatExtentStream {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.position = stream::resolve_seek(pos, self.position, self.length)?;
        Ok(self.position)
    }
}

impl SparseStream for FlatExtentStream {
    fn len(&self) -> u64 {
        self.length
    }

    fn extents(&self) -> Vec<StreamExtent> {
        vec![StreamExtent::new(0, self.length)]
    }
}
