//! The narrow interface through which the disk screen talks to the installer's
//! target discovery and commit machinery.

use crate::config::ResizePolicy;
use disk_types::{DiskGeometry, PartInfoTable};

/// A disk found by target discovery.
#[derive(Debug, Clone, PartialEq, new)]
pub struct DiskInfo {
    pub name:     String,
    pub geometry: DiskGeometry,
}

/// Error codes returned when the orchestrator cannot canonicalize or commit a
/// proposed table.
#[rustfmt::skip]
#[derive(Debug, Fail, Clone, PartialEq)]
pub enum CanonicalizeError {
    #[fail(display = "this partition configuration is not supported. Create the Solaris \
                      partition manually with fdisk before running the installer again")]
    UnsupportedConfiguration,
    #[fail(display = "there is not enough space on the disk for the requested layout")]
    NoSpace,
    #[fail(display = "one of the partitions is invalid")]
    InvalidPartition,
    #[fail(display = "the partition configuration exceeds the size of the disk")]
    ConfigExceedsDisk,
    #[fail(display = "the orchestrator failed with error code {}", code)]
    Other { code: i32 },
}

/// Disk enumeration, canonicalization, and commit.
pub trait Orchestrator {
    /// Every disk that may be installed to.
    fn get_disks(&self) -> Vec<DiskInfo>;

    /// The partition table read from the disk's label, or `None` if the label
    /// cannot be read.
    fn get_disk_partitions(&self, name: &str) -> Option<PartInfoTable>;

    /// Rounds and re-offsets a proposed table so that it can be written to
    /// the disk.
    fn validate_and_resize_disk_partitions(
        &self,
        name: &str,
        table: &PartInfoTable,
        policy: ResizePolicy,
    ) -> Result<PartInfoTable, CanonicalizeError>;

    /// Hands the accepted table to the installer.
    fn set_disk_partition_info(&mut self, name: &str, table: &PartInfoTable) -> Result<(), CanonicalizeError>;

    /// The minimum size of an install, in megabytes.
    fn get_min_size(&self) -> u64;

    /// The recommended size of an install, in megabytes.
    fn get_recommended_size(&self) -> u64;

    fn disk_is_bootdevice(&self, name: &str) -> bool;
}
