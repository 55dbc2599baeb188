//! Read adapter for COWD server sparse extents.
//!
//! The server format is much simpler than the hosted one: 1-sector grains,
//! a single global directory whose entries each cover 2 MiB of disk, and no
//! compression.

use std::cmp;
use std::io::{self, Read, Seek, SeekFrom};

use log::debug;

use crate::error::{Error, Result};
use crate::sector::{self, SECTOR_SIZE};
use crate::stream::{self, SharedStream, SparseStream, StreamExtent};

use super::{ServerSparseExtentHeader, SERVER_GD_SPAN, SERVER_HEADER_SIZE};

/// Grain table entries per COWD table: 2 MiB span / 512-byte grains.
const ENTRIES_PER_TABLE: u64 = SERVER_GD_SPAN / SECTOR_SIZE;

/// A server sparse (COWD) extent opened for reading.
pub struct ServerSparseExtentStream<S> {
    file: S,
    header: ServerSparseExtentHeader,
    global_directory: Vec<u32>,
    cached_table: Option<(u64, Vec<u32>)>,
    stored: Vec<StreamExtent>,
    extent_start: u64,
    parent: Option<SharedStream>,
    position: u64,
}

impl<S: Read + Seek> ServerSparseExtentStream<S> {
    /// Opens the extent in `file`, which starts at byte `extent_start` of
    /// the logical disk.
    pub fn new(mut file: S, extent_start: u64, parent: Option<SharedStream>) -> Result<Self> {
        let mut header_bytes = vec![0u8; SERVER_HEADER_SIZE as usize];
        file.seek(SeekFrom::Start(0))?;
        file.read_exact(&mut header_bytes)?;
        let header = ServerSparseExtentHeader::read(&header_bytes)?;

        if header.grain_size != 1 {
            return Err(Error::corrupt(format!(
                "server sparse grain size must be 1 sector, got {}",
                header.grain_size
            )));
        }

        let count = header.num_gd_entries as usize;
        let mut gd_bytes = vec![0u8; count * 4];
        file.seek(SeekFrom::Start(header.gd_offset as u64 * SECTOR_SIZE))?;
        file.read_exact(&mut gd_bytes)?;
        let global_directory: Vec<u32> = (0..count)
            .map(|i| sector::read_u32(&gd_bytes, i * 4))
            .collect();

        debug!(
            "opened server sparse extent: {} sectors, {} directory entries",
            header.capacity, count
        );

        let mut stream = Self {
            file,
            header,
            global_directory,
            cached_table: None,
            stored: Vec::new(),
            extent_start,
            parent,
            position: 0,
        };
        stream.stored = stream.scan_stored_grains()?;
        Ok(stream)
    }

    fn capacity_bytes(&self) -> u64 {
        self.header.capacity as u64 * SECTOR_SIZE
    }

    fn load_table(&mut self, table_index: u64) -> io::Result<Option<&[u32]>> {
        if self
            .cached_table
            .as_ref()
            .map(|(index, _)| *index == table_index)
            != Some(true)
        {
            let entry = match self.global_directory.get(table_index as usize) {
                Some(&entry) => entry,
                None => return Ok(None),
            };
            if entry == 0 {
                return Ok(None);
            }
            let mut bytes = vec![0u8; (ENTRIES_PER_TABLE * 4) as usize];
            self.file
                .seek(SeekFrom::Start(entry as u64 * SECTOR_SIZE))?;
            self.file.read_exact(&mut bytes)?;
            let table = (0..ENTRIES_PER_TABLE as usize)
                .map(|i| sector::read_u32(&bytes, i * 4))
                .collect();
            self.cached_table = Some((table_index, table));
        }
        Ok(self.cached_table.as_ref().map(|(_, table)| table.as_slice()))
    }

    fn grain_sector(&mut self, grain: u64) -> io::Result<u32> {
        let table_index = grain / ENTRIES_PER_TABLE;
        let entry_index = (grain % ENTRIES_PER_TABLE) as usize;
        match self.load_table(table_index)? {
            Some(table) => Ok(table[entry_index]),
            None => Ok(0),
        }
    }

    fn scan_stored_grains(&mut self) -> Result<Vec<StreamExtent>> {
        let total_grains = self.header.capacity as u64;
        let mut extents = Vec::new();
        for table_index in 0..self.global_directory.len() as u64 {
            if self.global_directory[table_index as usize] == 0 {
                continue;
            }
            let allocated: Vec<u64> = match self.load_table(table_index)? {
                Some(table) => table
                    .iter()
                    .enumerate()
                    .filter(|(_, &entry)| entry != 0)
                    .map(|(i, _)| table_index * ENTRIES_PER_TABLE + i as u64)
                    .collect(),
                None => continue,
            };
            for grain in allocated {
                if grain >= total_grains {
                    break;
                }
                extents.push(StreamExtent::new(grain * SECTOR_SIZE, SECTOR_SIZE));
            }
        }
        Ok(stream::merge_extents(extents))
    }
}

impl<S: Read + Seek> Read for ServerSparseExtentStream<S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let capacity = self.capacity_bytes();
        if self.position >= capacity || buf.is_empty() {
            return Ok(0);
        }

        let grain = self.position / SECTOR_SIZE;
        let offset_in_grain = self.position % SECTOR_SIZE;
        let count = cmp::min(
            cmp::min(buf.len() as u64, SECTOR_SIZE - offset_in_grain),
            capacity - self.position,
        ) as usize;
        let target = &mut buf[..count];

        let grain_sector = self.grain_sector(grain)?;
        if grain_sector != 0 {
            self.file.seek(SeekFrom::Start(
                grain_sector as u64 * SECTOR_SIZE + offset_in_grain,
            ))?;
            self.file.read_exact(target)?;
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

impl<S: Read + Seek> Seek for ServerSparseExtentStream<S> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.position = stream::resolve_seek(pos, self.position, self.capacity_bytes())?;
        Ok(self.position)
    }
}

impl<S: Read + Seek> SparseStream for ServerSparseExtentStream<S> {
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
