//! On-disk headers for sparse extent files.
//!
//! Two unrelated formats share the name "sparse": the hosted format
//! ("KDMV" magic, 512-byte header, redundant grain directories) used by
//! Workstation/Fusion disks, and the COWD server format ("COWD" magic,
//! 4-sector header) used by ESX redo logs.

pub mod hosted;
pub mod layout;
pub mod server;

use crate::error::{Error, Result};
use crate::sector::{self, SECTOR_SIZE};

/// Hosted sparse magic, "KDMV" on disk.
pub const HOSTED_MAGIC: u32 = 0x564d444b;

/// COWD server sparse magic.
pub const SERVER_MAGIC: u32 = 0x44574f43;

/// The newline-detection bytes in the header are valid.
pub const FLAG_VALID_LINE_DETECTION: u32 = 1 << 0;

/// A redundant grain directory precedes the main one.
pub const FLAG_REDUNDANT_GRAIN_TABLE: u32 = 1 << 1;

/// Grains are deflate-compressed.
pub const FLAG_COMPRESSED: u32 = 1 << 16;

/// Metadata is preceded by stream markers (streamOptimized).
pub const FLAG_MARKERS: u32 = 1 << 17;

/// Number of entries in one hosted grain table.
pub const GTES_PER_GT: u32 = 512;

/// The 512-byte header at offset 0 of a hosted sparse extent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostedSparseExtentHeader {
    pub magic: u32,
    pub version: u32,
    pub flags: u32,
    /// Extent capacity in sectors.
    pub capacity: u64,
    /// Grain size in sectors.
    pub grain_size: u64,
    /// Start of the embedded descriptor in sectors, 0 when absent.
    pub descriptor_offset: u64,
    /// Length of the embedded descriptor window in sectors.
    pub descriptor_size: u64,
    pub num_gtes_per_gt: u32,
    /// Start of the redundant grain directory in sectors.
    pub rgd_offset: u64,
    /// Start of the main grain directory in sectors.
    pub gd_offset: u64,
    /// Sector index of the first data grain.
    pub overhead: u64,
    pub unclean_shutdown: u8,
    pub single_end_line_char: u8,
    pub non_end_line_char: u8,
    pub double_end_line_char1: u8,
    pub double_end_line_char2: u8,
    pub compress_algorithm: u16,
}

impl Default for HostedSparseExtentHeader {
    fn default() -> Self {
        Self {
            magic: HOSTED_MAGIC,
            version: 1,
            flags: FLAG_VALID_LINE_DETECTION | FLAG_REDUNDANT_GRAIN_TABLE,
            capacity: 0,
            grain_size: 0,
            descriptor_offset: 0,
            descriptor_size: 0,
            num_gtes_per_gt: GTES_PER_GT,
            rgd_offset: 0,
            gd_offset: 0,
            overhead: 0,
            unclean_shutdown: 0,
            single_end_line_char: b'\n',
            non_end_line_char: b' ',
            double_end_line_char1: b'\r',
            double_end_line_char2: b'\n',
            compress_algorithm: 0,
        }
    }
}

impl HostedSparseExtentHeader {
    /// Parses a header from the first sector of an extent file.
    ///
    /// Fails with `NotAVmdk` when the magic does not match.
    pub fn read(data: &[u8]) -> Result<Self> {
        if data.len() < SECTOR_SIZE as usize {
            return Err(Error::corrupt("hosted sparse header too short"));
        }

        let magic = sector::read_u32(data, 0);
        if magic != HOSTED_MAGIC {
            return Err(Error::not_a_vmdk(format!(
                "bad hosted sparse magic: expected 0x{:08x}, got 0x{:08x}",
                HOSTED_MAGIC, magic
            )));
        }

        Ok(Self {
            magic,
            version: sector::read_u32(data, 4),
            flags: sector::read_u32(data, 8),
            capacity: sector::read_u64(data, 12),
            grain_size: sector::read_u64(data, 20),
            descriptor_offset: sector::read_u64(data, 28),
            descriptor_size: sector::read_u64(data, 36),
            num_gtes_per_gt: sector::read_u32(data, 44),
            rgd_offset: sector::read_u64(data, 48),
            gd_offset: sector::read_u64(data, 56),
            overhead: sector::read_u64(data, 64),
            unclean_shutdown: data[72],
            single_end_line_char: data[73],
            non_end_line_char: data[74],
            double_end_line_char1: data[75],
            double_end_line_char2: data[76],
            compress_algorithm: sector::read_u16(data, 77),
        })
    }

    /// Serializes the header to exactly one sector.
    pub fn write(&self) -> Vec<u8> {
        let mut buf = vec![0u8; SECTOR_SIZE as usize];
        sector::write_u32(&mut buf, 0, self.magic);
        sector::write_u32(&mut buf, 4, self.version);
        sector::write_u32(&mut buf, 8, self.flags);
        sector::write_u64(&mut buf, 12, self.capacity);
        sector::write_u64(&mut buf, 20, self.grain_size);
        sector::write_u64(&mut buf, 28, self.descriptor_offset);
        sector::write_u64(&mut buf, 36, self.descriptor_size);
        sector::write_u32(&mut buf, 44, self.num_gtes_per_gt);
        sector::write_u64(&mut buf, 48, self.rgd_offset);
        sector::write_u64(&mut buf, 56, self.gd_offset);
        sector::write_u64(&mut buf, 64, self.overhead);
        buf[72] = self.unclean_shutdown;
        buf[73] = self.single_end_line_char;
        buf[74] = self.non_end_line_char;
        buf[75] = self.double_end_line_char1;
        buf[76] = self.double_end_line_char2;
        sector::write_u16(&mut buf, 77, self.compress_algorithm);
        buf
    }

    /// Number of grains covering the capacity.
    pub fn total_grains(&self) -> u64 {
        sector::ceil(self.capacity, self.grain_size)
    }

    /// Number of grain tables, and so of grain directory entries.
    pub fn num_grain_tables(&self) -> u64 {
        sector::ceil(self.total_grains(), self.num_gtes_per_gt as u64)
    }
}

/// The COWD header occupying the first 4 sectors of a server sparse extent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerSparseExtentHeader {
    pub magic: u32,
    pub version: u32,
    pub flags: u32,
    /// Extent capacity in sectors.
    pub capacity: u32,
    /// Grain size in sectors, always 1.
    pub grain_size: u32,
    /// Start of the global directory in sectors.
    pub gd_offset: u32,
    pub num_gd_entries: u32,
    /// First sector available for grain data.
    pub free_sector: u32,
}

/// Bytes of virtual disk covered by one COWD directory entry.
pub const SERVER_GD_SPAN: u64 = 2 * crate::sector::ONE_MIB;

/// Size of the serialized COWD header in bytes.
pub const SERVER_HEADER_SIZE: u64 = 4 * SECTOR_SIZE;

impl ServerSparseExtentHeader {
    /// Builds the header for a new extent of `capacity_bytes`.
    pub fn new(capacity_bytes: u64) -> Self {
        let gd_offset = 4u32;
        let num_gd_entries = sector::ceil(capacity_bytes, SERVER_GD_SPAN) as u32;
        let free_sector =
            gd_offset + sector::ceil(num_gd_entries as u64 * 4, SECTOR_SIZE) as u32;
        Self {
            magic: SERVER_MAGIC,
            version: 1,
            flags: 3,
            capacity: (capacity_bytes / SECTOR_SIZE) as u32,
            grain_size: 1,
            gd_offset,
            num_gd_entries,
            free_sector,
        }
    }

    /// Parses a COWD header.
    pub fn read(data: &[u8]) -> Result<Self> {
        if data.len() < 32 {
            return Err(Error::corrupt("server sparse header too short"));
        }

        let magic = sector::read_u32(data, 0);
        if magic != SERVER_MAGIC {
            return Err(Error::not_a_vmdk(format!(
                "bad server sparse magic: expected 0x{:08x}, got 0x{:08x}",
                SERVER_MAGIC, magic
            )));
        }

        Ok(Self {
            magic,
            version: sector::read_u32(data, 4),
            flags: sector::read_u32(data, 8),
            capacity: sector::read_u32(data, 12),
            grain_size: sector::read_u32(data, 16),
            gd_offset: sector::read_u32(data, 20),
            num_gd_entries: sector::read_u32(data, 24),
            free_sector: sector::read_u32(data, 28),
        })
    }

    /// Serializes the header into its 4-sector on-disk form.
    pub fn write(&self) -> Vec<u8> {
        let mut buf = vec![0u8; SERVER_HEADER_SIZE as usize];
        sector::write_u32(&mut buf, 0, self.magic);
        sector::write_u32(&mut buf, 4, self.version);
        sector::write_u32(&mut buf, 8, self.flags);
        sector::write_u32(&mut buf, 12, self.capacity);
        sector::write_u32(&mut buf, 16, self.grain_size);
        sector::write_u32(&mut buf, 20, self.gd_offset);
        sector::write_u32(&mut buf, 24, self.num_gd_entries);
        sector::write_u32(&mut buf, 28, self.free_sector);
        buf
    }
}
