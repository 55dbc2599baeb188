//! Read adapter for hosted sparse extents.
//!
//! Presents the extent's grain-mapped contents as a [`SparseStream`].
//! Grains without an allocation fall through to the parent stream (read at
//! the extent's position within the logical disk) or read as zeros.

use std::cmp;
use std::io::{self, Read, Seek, SeekFrom};

use flate2::read::DeflateDecoder;
use log::debug;

use crate::error::{Error, Result};
use crate::sector::{self, SECTOR_SIZE};
use crate::stream::{self, SharedStream, SparseStream, StreamExtent};

use super::{HostedSparseExtentHeader, FLAG_COMPRESSED, FLAG_MARKERS};

/// A hosted sparse extent opened for reading.
pub struct HostedSparseExtentStream<S> {
    file: S,
    header: HostedSparseExtentHeader,
    /// Sector offsets of the grain tables, one entry per table; 0 means the
    /// whole table is unallocated.
    grain_directory: Vec<u32>,
    /// The most recently used grain table.
    cached_table: Option<(u64, Vec<u32>)>,
    /// Stored grain ranges, gathered once at open.
    stored: Vec<StreamExtent>,
    /// Byte offset of this extent within the logical disk.
    extent_start: u64,
    parent: Option<SharedStream>,
    position: u64,
}

impl<S: Read + Seek> HostedSparseExtentStream<S> {
    /// Opens the extent in `file`, which starts at byte `extent_start` of
    /// the logical disk. Unallocated grains read from `parent` when given.
    pub fn new(mut file: S, extent_start: u64, parent: Option<SharedStream>) -> Result<Self> {
        let mut header_bytes = vec![0u8; SECTOR_SIZE as usize];
        file.seek(SeekFrom::Start(0))?;
        file.read_exact(&mut header_bytes)?;
        let header = HostedSparseExtentHeader::read(&header_bytes)?;

        if header.flags & FLAG_MARKERS != 0 {
            // Stream-optimized layouts place the authoritative grain
            // directory behind a footer marker; the header copy cannot be
            // trusted.
            return Err(Error::unsupported_extent_type(
                "stream-optimized sparse extent with markers",
            ));
        }
        if header.grain_size == 0 || header.num_gtes_per_gt == 0 {
            return Err(Error::corrupt("sparse header has zero grain geometry"));
        }

        let num_tables = header.num_grain_tables() as usize;
        let mut gd_bytes = vec![0u8; num_tables * 4];
        file.seek(SeekFrom::Start(header.gd_offset * SECTOR_SIZE))?;
        file.read_exact(&mut gd_bytes)?;
        let grain_directory: Vec<u32> = (0..num_tables)
            .map(|i| sector::read_u32(&gd_bytes, i * 4))
            .collect();

        debug!(
            "opened hosted sparse extent: {} sectors, grain {} sectors, {} grain tables",
            header.capacity, header.grain_size, num_tables
        );

        let mut stream = Self {
            file,
            header,
            grain_directory,
            cached_table: None,
            stored: Vec::new(),
            extent_start,
            parent,
            position: 0,
        };
        stream.stored = stream.scan_stored_grains()?;
        Ok(stream)
    }

    fn grain_size_bytes(&self) -> u64 {
        self.header.grain_size * SECTOR_SIZE
    }

    fn capacity_bytes(&self) -> u64 {
        self.header.capacity * SECTOR_SIZE
    }

    /// Reads the grain table with the given index, or None when the
    /// directory entry is unallocated.
    fn load_table(&mut self, table_index: u64) -> io::Result<Option<&[u32]>> {
        if self
            .cached_table
            .as_ref()
            .map(|(index, _)| *index == table_index)
            != Some(true)
        {
            let entry = match self.grain_directory.get(table_index as usize) {
                Some(&entry) => entry,
                None => return Ok(None),
            };
            if entry == 0 {
                return Ok(None);
            }
            let count = self.header.num_gtes_per_gt as usize;
            let mut bytes = vec![0u8; count * 4];
            self.file
                .seek(SeekFrom::Start(entry as u64 * SECTOR_SIZE))?;
            self.file.read_exact(&mut bytes)?;
            let table = (0..count).map(|i| sector::read_u32(&bytes, i * 4)).collect();
            self.cached_table = Some((table_index, table));
        }
        Ok(self.cached_table.as_ref().map(|(_, table)| table.as_slice()))
    }

    /// Sector offset of the given grain's data, 0 when unallocated.
    fn grain_sector(&mut self, grain: u64) -> io::Result<u32> {
        let table_index = grain / self.header.num_gtes_per_gt as u64;
        let entry_index = (grain % self.header.num_gtes_per_gt as u64) as usize;
        match self.load_table(table_index)? {
            Some(table) => Ok(table[entry_index]),
            None => Ok(0),
        }
    }

    /// Reads `buf.len()` bytes of a stored grain starting `offset` bytes in.
    fn read_stored_grain(
        &mut self,
        grain_sector: u32,
        offset: u64,
        buf: &mut [u8],
    ) -> io::Result<()> {
        if self.header.flags & FLAG_COMPRESSED != 0 {
            let grain = self.read_compressed_grain(grain_sector)?;
            let start = offset as usize;
            buf.copy_from_slice(&grain[start..start + buf.len()]);
            return Ok(());
        }
        self.file
            .seek(SeekFrom::Start(grain_sector as u64 * SECTOR_SIZE + offset))?;
        self.file.read_exact(buf)
    }

    /// Decompresses a whole deflate grain. The grain data is preceded by a
    /// 12-byte marker: the LBA and the compressed size.
    fn read_compressed_grain(&mut self, grain_sector: u32) -> io::Result<Vec<u8>> {
        let mut marker = [0u8; 12];
        self.file
            .seek(SeekFrom::Start(grain_sector as u64 * SECTOR_SIZE))?;
        self.file.read_exact(&mut marker)?;
        let compressed_size = sector::read_u32(&marker, 8) as usize;

        let mut compressed = vec![0u8; compressed_size];
        self.file.read_exact(&mut compressed)?;

        let mut grain = vec![0u8; self.grain_size_bytes() as usize];
        let mut decoder = DeflateDecoder::new(&compressed[..]);
        decoder.read_exact(&mut grain).map_err(|e| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("failed to decompress grain: {}", e),
            )
        })?;
        Ok(grain)
    }

    /// Walks every grain table and collects allocated grain ranges.
    fn scan_stored_grains(&mut self) -> Result<Vec<StreamExtent>> {
        let grain_bytes = self.grain_size_bytes();
        let gtes = self.header.num_gtes_per_gt as u64;
        let total_grains = self.header.total_grains();
        let mut extents = Vec::new();

        for table_index in 0..self.grain_directory.len() as u64 {
            if self.grain_directory[table_index as usize] == 0 {
                continue;
            }
            // The borrow of the cache ends before the next iteration
            let allocated: Vec<u64> = match self.load_table(table_index)? {
                Some(table) => table
                    .iter()
                    .enumerate()
                    .filter(|(_, &entry)| entry != 0)
                    .map(|(i, _)| table_index * gtes + i as u64)
                    .collect(),
                None => continue,
            };
            for grain in allocated {
                if grain >= total_grains {
                    break;
                }
                extents.push(StreamExtent::new(grain * grain_bytes, grain_bytes));
            }
        }
        Ok(stream::merge_extents(extents))
    }
}

impl<S: Read + Seek> Read for HostedSparseExtentStream<S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let capacity = self.capacity_bytes();
        if self.position >= capacity || buf.is_empty() {
            return Ok(0);
        }

        let grain_bytes = self.grain_size_bytes();
        let grain = self.position / grain_bytes;
        let offset_in_grain = self.position % grain_bytes;

        // Serve at most the remainder of one grain per call
        let count = cmp::min(
            cmp::min(buf.len() as u64, grain_bytes - offset_in_grain),
            capacity - self.position,
        ) as usize;
        let target = &mut buf[..count];

        let grain_sector = self.grain_sector(grain)?;
        if grain_sector != 0 {
            self.read_stored_grain(grain_sector, offset_in_grain, target)?;
        } else if let Some(ref parent) = self.parent {
            stream::read_at(parent, self.extent_start + self.position, target)?;
        } else {
            for byte in target.iter_mut() {
                *byte = 0;
            }
        }

        self.position += count as u64;
        Ok(count)
    }
}

impl<S: Read + Seek> Seek for HostedSparseExtentStream<S> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.position = stream::resolve_seek(pos, self.position, self.capacity_bytes())?;
        Ok(self.position)
    }
}

impl<S: Read + Seek> SparseStream for HostedSparseExtentStream<S> {
    fn len(&self) -> u64 {
        self.capacity_bytes()
    }

    fn extents(&self) -> Vec<StreamExtent> {
        let mut all = self.stored.clone();
        if let Some(ref parent) = self.parent {
            let parent_extents = parent.borrow().extents();
            all.extend(stream::clip_extents(
                &parent_extents,
                self.extent_start,
                self.capacity_bytes(),
            ));
        }
        stream::merge_extents(all)
    }
}
