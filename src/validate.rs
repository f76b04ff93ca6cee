//! Checks run when the operator leaves the disk screen.

use crate::{config::ScreenConfig, editor::DiskEditState, error::ValidationError, orchestrator::Orchestrator};
use disk_types::{round_mb_to_gb, PartInfoTable, PartitionRecord};

/// The outcome of a successful validation.
#[derive(Debug, Clone, PartialEq)]
pub enum Validation {
    /// The orchestrator will commit the table as proposed.
    Accepted,
    /// The orchestrator rounded or moved partitions. The operator must review
    /// the adjusted table before it can be committed.
    Adjusted(PartInfoTable),
}

/// Validates the table proposed for `disk`, halting on the first failure.
pub fn validate<O: Orchestrator + ?Sized>(
    disk: Option<&DiskEditState>,
    use_whole_disk: bool,
    orchestrator: &O,
    config: &ScreenConfig,
) -> Result<Validation, ValidationError> {
    let disk = disk.ok_or(ValidationError::NoDiskSelected)?;

    let min_mb = orchestrator.get_min_size();
    if disk.geometry.total_mb < min_mb {
        return Err(ValidationError::DiskTooSmall { disk_mb: disk.geometry.total_mb, min_mb });
    }

    let table = disk.proposed_parts(use_whole_disk);
    let solaris = install_target(table)?;
    check_allocation(table, disk.geometry.total_mb, config.overcommit_slop_mb)?;

    if round_mb_to_gb(solaris.size_mb) < round_mb_to_gb(min_mb) {
        return Err(ValidationError::SolarisTooSmall { size_mb: solaris.size_mb, min_mb });
    }

    if config.enforce_cylinder_limit {
        if let Some(max_mb) = disk.geometry.max_root_mb() {
            if solaris.offset_mb >= max_mb {
                return Err(ValidationError::BeyondCylinderLimit { offset_mb: solaris.offset_mb, max_mb });
            }
        }
    }

    let canonical = orchestrator
        .validate_and_resize_disk_partitions(&disk.name, table, config.resize_policy)
        .map_err(|why| {
            warn!("{}: orchestrator rejected the proposed table: {}", disk.name, why);
            why
        })?;

    if canonical == *table {
        info!("{}: partition layout accepted", disk.name);
        Ok(Validation::Accepted)
    } else {
        warn!("{}: orchestrator adjusted the proposed table to {:?}", disk.name, canonical);
        Ok(Validation::Adjusted(canonical))
    }
}

/// The one Solaris partition that will be installed to.
fn install_target(table: &PartInfoTable) -> Result<&PartitionRecord, ValidationError> {
    let candidates = table.solaris_partitions().collect::<Vec<_>>();
    match candidates.len() {
        0 => Err(ValidationError::NoSolarisPartition),
        1 => Ok(candidates[0]),
        count => Err(ValidationError::MultipleSolarisPartitions { count }),
    }
}

fn check_allocation(table: &PartInfoTable, disk_mb: u64, slop_mb: u64) -> Result<(), ValidationError> {
    let used_mb = table.primary_sum_mb();
    if used_mb > disk_mb + slop_mb {
        return Err(ValidationError::PrimaryOvercommit { used_mb, disk_mb });
    }

    if let Some((_, extended)) = table.extended() {
        let used_mb = table.logical_sum_mb();
        if used_mb > extended.size_mb + slop_mb {
            return Err(ValidationError::LogicalOvercommit { used_mb, extended_mb: extended.size_mb });
        }
    }

    Ok(())
}
