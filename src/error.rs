use crate::{invariants::InvariantViolation, orchestrator::CanonicalizeError};
use disk_types::{PartitionKind, TableError};

/// Reasons that an edit was refused. The edit state is left exactly as it was
/// before the intent was applied.
#[rustfmt::skip]
#[derive(Debug, Fail, PartialEq)]
pub enum EditError {
    #[fail(display = "only one extended partition may exist on a disk")]
    OnlyOneExtended,
    #[fail(display = "the disk is too small to install on; editing is disabled")]
    DiskTooSmall,
    #[fail(display = "no disk has been selected")]
    NoDiskSelected,
    #[fail(display = "disk {} does not exist", index)]
    NoSuchDisk { index: usize },
    #[fail(display = "the entire disk is in use; partitions cannot be edited")]
    WholeDiskSelected,
    #[fail(display = "primary row {} does not exist", row)]
    NoSuchPrimary { row: usize },
    #[fail(display = "logical row {} does not exist", row)]
    NoSuchLogical { row: usize },
    #[fail(display = "there is no extended partition to hold logical partitions")]
    NoExtendedPartition,
    #[fail(display = "a partition may not be changed to {}", kind)]
    UnsupportedType { kind: PartitionKind },
    #[fail(display = "{} partitions cannot be resized", kind)]
    NotResizable { kind: PartitionKind },
    #[fail(display = "a partition cannot be resized to 0 GB")]
    ZeroSize,
    #[fail(display = "{} MB are required, but only {} MB are available", needed, available)]
    InsufficientSpace { needed: u64, available: u64 },
    #[fail(display = "a partition that cannot be shrunk is in the way; {} MB could not be freed", needed)]
    ShrinkBlocked { needed: u64 },
    #[fail(display = "there is no free space to create a partition in")]
    NoFreeSpace,
    #[fail(display = "partition table error: {}", why)]
    Table { why: TableError },
    #[fail(display = "edit produced an inconsistent layout: {}", why)]
    Invariant { why: InvariantViolation },
}

impl From<TableError> for EditError {
    fn from(why: TableError) -> EditError { EditError::Table { why } }
}

impl From<InvariantViolation> for EditError {
    fn from(why: InvariantViolation) -> EditError { EditError::Invariant { why } }
}

/// Reasons that the proposed layout cannot be installed to.
#[rustfmt::skip]
#[derive(Debug, Fail, PartialEq)]
pub enum ValidationError {
    #[fail(display = "no disk has been selected")]
    NoDiskSelected,
    #[fail(display = "the disk is {} MB, but at least {} MB are required", disk_mb, min_mb)]
    DiskTooSmall { disk_mb: u64, min_mb: u64 },
    #[fail(display = "there is no Solaris partition to install to")]
    NoSolarisPartition,
    #[fail(display = "there are {} Solaris partitions; only one may exist", count)]
    MultipleSolarisPartitions { count: usize },
    #[fail(display = "primary partitions use {} MB of a {} MB disk", used_mb, disk_mb)]
    PrimaryOvercommit { used_mb: u64, disk_mb: u64 },
    #[fail(display = "logical partitions use {} MB of a {} MB extended partition", used_mb, extended_mb)]
    LogicalOvercommit { used_mb: u64, extended_mb: u64 },
    #[fail(display = "the Solaris partition is {} MB, but at least {} MB are required", size_mb, min_mb)]
    SolarisTooSmall { size_mb: u64, min_mb: u64 },
    #[fail(display = "the Solaris partition starts at {} MB, past the boot limit of {} MB", offset_mb, max_mb)]
    BeyondCylinderLimit { offset_mb: u64, max_mb: u64 },
    #[fail(display = "the layout was adjusted to fit the disk and must be reviewed")]
    AdjustmentPending,
    #[fail(display = "{}", why)]
    Rejected { why: CanonicalizeError },
}

impl From<CanonicalizeError> for ValidationError {
    fn from(why: CanonicalizeError) -> ValidationError { ValidationError::Rejected { why } }
}
