//! Unit conversions between sectors, megabytes, and the tenth-of-a-gigabyte
//! granularity that sizes are displayed with.

/// Bytes in a megabyte, as the installer counts them.
pub const MEBIBYTE: u64 = 1024 * 1024;
/// Megabytes in a gigabyte.
pub const MB_PER_GB: u64 = 1024;
/// The smallest size that the editor hands out, `gb_to_mb(0.1)`.
pub const TENTH_GB_MB: u64 = 102;
/// Cylinder boundary below which a BIOS without LBA support can boot.
pub const MAX_BOOT_CYLINDER: u64 = 1023;

/// Converts megabytes to gigabytes, truncated to one decimal place.
pub fn round_mb_to_gb(mb: u64) -> f64 { (mb as f64 / MB_PER_GB as f64 * 10.0).trunc() / 10.0 }

/// Converts a gigabyte value back to whole megabytes.
pub fn gb_to_mb(gb: f64) -> u64 {
    if gb <= 0.0 {
        0
    } else {
        (gb * MB_PER_GB as f64) as u64
    }
}

/// Rounds a gigabyte value to the nearest tenth.
pub fn one_decimal(gb: f64) -> f64 { (gb * 10.0).round() / 10.0 }

/// True if a region is too small to show: it rounds to 0.0 GB.
pub fn is_tiny(mb: u64) -> bool { round_mb_to_gb(mb) <= 0.0 }

/// The size and shape of a disk, as reported by the orchestrator.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub struct DiskGeometry {
    /// The size of each sector, in bytes.
    pub sector_size:      u64,
    /// The combined total number of sectors on the disk. Zero if unknown.
    pub total_sectors:    u64,
    /// The size of the disk in megabytes.
    pub total_mb:         u64,
    /// Sectors per cylinder (heads * sectors per track). Zero if the BIOS
    /// geometry is unknown.
    pub cylinder_sectors: u64,
}

impl DiskGeometry {
    /// Geometry of a disk with the given sector count and sector size.
    pub fn new(total_sectors: u64, sector_size: u64) -> DiskGeometry {
        DiskGeometry {
            sector_size,
            total_sectors,
            total_mb: total_sectors * sector_size / MEBIBYTE,
            cylinder_sectors: 0,
        }
    }

    /// Geometry of a 512-byte sector disk that is exactly `total_mb` large.
    pub fn from_mb(total_mb: u64) -> DiskGeometry {
        DiskGeometry::new(total_mb * (MEBIBYTE / 512), 512)
    }

    pub fn with_cylinders(mut self, heads: u64, sectors_per_track: u64) -> DiskGeometry {
        self.cylinder_sectors = heads * sectors_per_track;
        self
    }

    pub fn total_gb(&self) -> f64 { round_mb_to_gb(self.total_mb) }

    /// Converts megabytes into sectors.
    ///
    /// The count is scaled against the disk's own sector and megabyte totals,
    /// so the last megabyte of the disk maps onto its last sector. When the
    /// sector total is unknown the nominal sector size is used instead; both
    /// paths are approximations that can drift by a sector across edits.
    pub fn mb_to_sectors(&self, mb: u64) -> u64 {
        if self.total_sectors == 0 || self.total_mb == 0 {
            mb * (MEBIBYTE / self.sector_size.max(1))
        } else {
            (u128::from(mb) * u128::from(self.total_sectors) / u128::from(self.total_mb)) as u64
        }
    }

    /// Converts sectors into whole megabytes.
    pub fn sectors_to_mb(&self, sectors: u64) -> u64 {
        if self.total_sectors == 0 || self.total_mb == 0 {
            sectors * self.sector_size / MEBIBYTE
        } else {
            (u128::from(sectors) * u128::from(self.total_mb) / u128::from(self.total_sectors)) as u64
        }
    }

    /// The size of one cylinder, in megabytes.
    pub fn cylinder_mb(&self) -> f64 {
        (self.cylinder_sectors * self.sector_size) as f64 / MEBIBYTE as f64
    }

    /// The highest megabyte offset that a root partition may start at, if the
    /// cylinder geometry is known.
    pub fn max_root_mb(&self) -> Option<u64> {
        if self.cylinder_sectors == 0 {
            None
        } else {
            Some((self.cylinder_mb() * MAX_BOOT_CYLINDER as f64) as u64)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gigabyte_rounding() {
        assert_eq!(round_mb_to_gb(20480), 20.0);
        assert_eq!(round_mb_to_gb(20378), 19.9);
        assert_eq!(round_mb_to_gb(3123), 3.0);
        assert_eq!(round_mb_to_gb(51), 0.0);
        assert_eq!(round_mb_to_gb(102), 0.0);
        assert_eq!(round_mb_to_gb(103), 0.1);
    }

    #[test]
    fn gigabytes_to_megabytes() {
        assert_eq!(gb_to_mb(0.1), TENTH_GB_MB);
        assert_eq!(gb_to_mb(5.0), 5120);
        assert_eq!(gb_to_mb(8.0), 8192);
        assert_eq!(gb_to_mb(6.1), 6246);
        assert_eq!(gb_to_mb(-1.0), 0);
    }

    #[test]
    fn tenths() {
        assert_eq!(one_decimal(2.96), 3.0);
        assert_eq!(one_decimal(2.94), 2.9);
        assert_eq!(one_decimal(7.0), 7.0);
        assert!(is_tiny(51));
        assert!(!is_tiny(1024));
    }

    #[test]
    fn sector_conversion() {
        let disk = DiskGeometry::from_mb(20480);
        assert_eq!(disk.total_sectors, 41_943_040);
        assert_eq!(disk.mb_to_sectors(20480), 41_943_040);
        assert_eq!(disk.mb_to_sectors(102), 208_896);
        assert_eq!(disk.sectors_to_mb(208_896), 102);

        let unknown = DiskGeometry { sector_size: 512, total_sectors: 0, total_mb: 0, cylinder_sectors: 0 };
        assert_eq!(unknown.mb_to_sectors(1), 2048);
        assert_eq!(unknown.sectors_to_mb(4096), 2);
    }

    #[test]
    fn cylinder_limit() {
        let disk = DiskGeometry::from_mb(20480);
        assert_eq!(disk.max_root_mb(), None);

        let disk = disk.with_cylinders(255, 63);
        assert_eq!(disk.cylinder_sectors, 16065);
        assert_eq!(disk.max_root_mb(), Some(8024));
    }
}
