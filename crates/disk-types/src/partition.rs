use crate::{
    kind::{ContentType, PartitionKind},
    sector::{round_mb_to_gb, DiskGeometry},
};

/// Defines whether a slot lives in the primary or the logical namespace.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub enum PartitionType {
    Primary,
    Logical,
}

/// A single slot of the partition table.
///
/// Offsets and sizes are carried twice: in megabytes, which is what the editor
/// does arithmetic with, and in sectors, which is what the orchestrator commits.
#[derive(Debug, Default, PartialEq, Eq, Clone, Copy, Hash)]
pub struct PartitionRecord {
    /// Slot identity. Zero marks an empty slot; 1-4 are primaries, 5 and up
    /// are logicals.
    pub id:         u8,
    /// Dense 1-based row position. Zero for gaps and empty slots.
    pub order:      u8,
    pub kind:       PartitionKind,
    pub content:    ContentType,
    pub offset_mb:  u64,
    pub size_mb:    u64,
    pub offset_sec: u64,
    pub size_sec:   u64,
    /// The MBR bootable flag.
    pub active:     bool,
}

impl PartitionRecord {
    /// A record of the given type spanning `offset_mb..offset_mb + size_mb`.
    pub fn new(
        id: u8,
        kind: PartitionKind,
        offset_mb: u64,
        size_mb: u64,
        geometry: &DiskGeometry,
    ) -> PartitionRecord {
        let mut record = PartitionRecord { id, kind, ..PartitionRecord::default() };
        record.set_extent(offset_mb, size_mb, geometry);
        record
    }

    /// Stores all four coordinates verbatim.
    pub fn set_partition_info(&mut self, size_mb: u64, offset_mb: u64, size_sec: u64, offset_sec: u64) {
        self.size_mb = size_mb;
        self.offset_mb = offset_mb;
        self.size_sec = size_sec;
        self.offset_sec = offset_sec;
    }

    /// Moves the record to a new extent, deriving the sector fields from the
    /// disk geometry.
    pub fn set_extent(&mut self, offset_mb: u64, size_mb: u64, geometry: &DiskGeometry) {
        let offset_sec = geometry.mb_to_sectors(offset_mb);
        let end_sec = geometry.mb_to_sectors(offset_mb + size_mb);
        self.set_partition_info(size_mb, offset_mb, end_sec - offset_sec, offset_sec);
    }

    pub fn end_mb(&self) -> u64 { self.offset_mb + self.size_mb }

    pub fn size_gb(&self) -> f64 { round_mb_to_gb(self.size_mb) }

    pub fn partition_type(&self) -> PartitionType {
        if self.id > 4 {
            PartitionType::Logical
        } else {
            PartitionType::Primary
        }
    }

    /// True if this slot does not hold a partition at all.
    pub fn is_empty(&self) -> bool { self.id == 0 }

    pub fn is_unused(&self) -> bool { self.kind.is_unused() }

    pub fn is_extended(&self) -> bool { self.kind.is_extended() }

    /// True for a Solaris install target. A `0x82` slot holding Linux swap is
    /// not one.
    pub fn is_solaris(&self) -> bool {
        match self.kind {
            PartitionKind::Solaris2 => true,
            PartitionKind::Solaris => self.content != ContentType::LinuxSwap,
            _ => false,
        }
    }

    pub fn is_linux_swap(&self) -> bool {
        self.kind == PartitionKind::Solaris && self.content == ContentType::LinuxSwap
    }

    /// True if the given megabyte lies within this partition.
    pub fn mb_lies_within(&self, mb: u64) -> bool { mb >= self.offset_mb && mb < self.end_mb() }

    /// True if there is an overlap between this partition and `start..end`.
    pub fn overlaps(&self, start: u64, end: u64) -> bool {
        start < self.end_mb() && end > self.offset_mb
    }
}
