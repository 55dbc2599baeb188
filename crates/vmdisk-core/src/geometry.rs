//! Disk CHS geometry.

use crate::sector::{ONE_GIB, SECTOR_SIZE};

/// Cylinder/head/sector geometry advertised in the descriptor's disk
/// database section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    /// Number of cylinders.
    pub cylinders: u64,
    /// Number of heads.
    pub heads: u32,
    /// Number of sectors per track.
    pub sectors_per_track: u32,
}

impl Geometry {
    /// Creates a geometry from explicit CHS values.
    pub fn new(cylinders: u64, heads: u32, sectors_per_track: u32) -> Self {
        Self {
            cylinders,
            heads,
            sectors_per_track,
        }
    }

    /// Derives a BIOS-friendly geometry for a disk of `capacity_bytes`.
    ///
    /// Heads and sectors-per-track grow with capacity (64/32 below 1 GiB,
    /// 128/32 below 2 GiB, 255/63 above); cylinders take up the remainder,
    /// truncated.
    pub fn from_capacity(capacity_bytes: u64) -> Self {
        let (heads, sectors_per_track) = if capacity_bytes < ONE_GIB {
            (64, 32)
        } else if capacity_bytes < 2 * ONE_GIB {
            (128, 32)
        } else {
            (255, 63)
        };
        let cylinders = capacity_bytes / (heads as u64 * sectors_per_track as u64 * SECTOR_SIZE);
        Self {
            cylinders,
            heads,
            sectors_per_track,
        }
    }

    /// Total sectors addressable through this geometry.
    pub fn total_sectors(&self) -> u64 {
        self.cylinders * self.heads as u64 * self.sectors_per_track as u64
    }

    /// Capacity in bytes addressable through this geometry.
    pub fn capacity_bytes(&self) -> u64 {
        self.total_sectors() * SECTOR_SIZE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sector::ONE_MIB;

    #[test]
    fn test_small_disk_geometry() {
        let geometry = Geometry::from_capacity(100 * ONE_MIB);
        assert_eq!(geometry.heads, 64);
        assert_eq!(geometry.sectors_per_track, 32);
        assert_eq!(geometry.cylinders, 100 * ONE_MIB / (64 * 32 * 512));
    }

    #[test]
    fn test_medium_disk_geometry() {
        let geometry = Geometry::from_capacity(ONE_GIB + ONE_MIB);
        assert_eq!(geometry.heads, 128);
        assert_eq!(geometry.sectors_per_track, 32);
    }

    #[test]
    fn test_large_disk_geometry() {
        let geometry = Geometry::from_capacity(3 * ONE_GIB);
        assert_eq!(geometry.heads, 255);
        assert_eq!(geometry.sectors_per_track, 63);
        assert_eq!(geometry.cylinders, 3 * ONE_GIB / (255 * 63 * 512));
    }

    #[test]
    fn test_geometry_capacity_does_not_exceed_disk() {
        for capacity in [100 * ONE_MIB, ONE_GIB, 2 * ONE_GIB, 10 * ONE_GIB] {
            let geometry = Geometry::from_capacity(capacity);
            assert!(geometry.capacity_bytes() <= capacity);
        }
    }
}
