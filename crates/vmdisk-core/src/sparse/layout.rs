//! Placement math for new hosted sparse extents.
//!
//! Layout order within the extent file: header sector, optional embedded
//! descriptor, redundant grain directory, redundant grain tables, main
//! grain directory, main grain tables, then data grains starting at a
//! grain-aligned sector.

use crate::sector::{self, SECTOR_SIZE};

use super::{HostedSparseExtentHeader, GTES_PER_GT};

// Grain size is chosen so a disk fills roughly this many grain tables.
const TARGET_GRAIN_TABLES: u64 = 256;

/// Computed placement of every region of a new hosted sparse extent.
///
/// All `*_start` fields are sector indices within the extent file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtentLayout {
    /// Grain size in sectors, at least 8.
    pub grain_size: u64,
    /// Number of grain tables (and grain directory entries).
    pub num_grain_tables: u64,
    /// Embedded descriptor window length in bytes, sector-rounded.
    pub descriptor_length: u64,
    /// Start of the embedded descriptor, 0 when none is reserved.
    pub descriptor_start: u64,
    /// Start of the redundant grain directory.
    pub rgd_start: u64,
    /// Start of the redundant grain tables.
    pub redundant_gt_start: u64,
    /// Start of the main grain directory.
    pub gd_start: u64,
    /// Start of the main grain tables.
    pub gt_start: u64,
    /// First data sector; also the header's overhead field.
    pub data_start: u64,
}

impl ExtentLayout {
    /// Plans the layout for an extent holding `size_bytes` of virtual disk,
    /// reserving `descriptor_length_bytes` for an embedded descriptor
    /// (0 when the descriptor lives in its own file).
    pub fn plan(size_bytes: u64, descriptor_length_bytes: u64) -> Self {
        // The division is deliberately not rounded to a power of two; the
        // resulting grain size is what existing tooling expects.
        let grain_size = std::cmp::max(
            size_bytes / (TARGET_GRAIN_TABLES * GTES_PER_GT as u64 * SECTOR_SIZE),
            8,
        );
        let num_grain_tables =
            sector::ceil(size_bytes, grain_size * GTES_PER_GT as u64 * SECTOR_SIZE);

        let descriptor_length = sector::round_up(descriptor_length_bytes, SECTOR_SIZE);
        let descriptor_start = if descriptor_length == 0 { 0 } else { 1 };

        let rgd_start =
            std::cmp::max(descriptor_start, 1) + sector::ceil(descriptor_length, SECTOR_SIZE);
        let rgd_length = num_grain_tables * 4;

        let redundant_gt_start = rgd_start + sector::ceil(rgd_length, SECTOR_SIZE);
        let redundant_gt_length =
            num_grain_tables * sector::round_up(GTES_PER_GT as u64 * 4, SECTOR_SIZE);

        let gd_start = redundant_gt_start + sector::ceil(redundant_gt_length, SECTOR_SIZE);
        let gd_length = num_grain_tables * 4;

        let gt_start = gd_start + sector::ceil(gd_length, SECTOR_SIZE);
        let gt_length = redundant_gt_length;

        let data_start = sector::round_up(
            gt_start + sector::ceil(gt_length, SECTOR_SIZE),
            grain_size,
        );

        Self {
            grain_size,
            num_grain_tables,
            descriptor_length,
            descriptor_start,
            rgd_start,
            redundant_gt_start,
            gd_start,
            gt_start,
            data_start,
        }
    }

    /// Sectors occupied by one grain table.
    pub fn grain_table_stride(&self) -> u64 {
        sector::ceil(GTES_PER_GT as u64 * 4, SECTOR_SIZE)
    }

    /// Builds the extent header describing this layout.
    pub fn header(&self, size_bytes: u64) -> HostedSparseExtentHeader {
        HostedSparseExtentHeader {
            capacity: sector::round_up(size_bytes, self.grain_size * SECTOR_SIZE) / SECTOR_SIZE,
            grain_size: self.grain_size,
            descriptor_offset: self.descriptor_start,
            descriptor_size: self.descriptor_length / SECTOR_SIZE,
            rgd_offset: self.rgd_start,
            gd_offset: self.gd_start,
            overhead: self.data_start,
            ..Default::default()
        }
    }
}
