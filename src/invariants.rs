//! Consistency checks between a partition table and its block-order lists.
//!
//! The editor runs these after every intent. A failure is a bug in the
//! editor, never a user error.

use crate::{blockorder::BlockList, layout::Layout};
use disk_types::{DiskGeometry, PartInfoTable, FIRST_LOGICAL_ID, TENTH_GB_MB};
use itertools::Itertools;

#[rustfmt::skip]
#[derive(Debug, Fail, Clone, PartialEq)]
pub enum InvariantViolation {
    #[fail(display = "{} extended partitions exist", count)]
    MultipleExtended { count: usize },
    #[fail(display = "logical partitions exist without an extended partition")]
    OrphanLogicals,
    #[fail(display = "logical partition {} lies outside of the extended partition", id)]
    LogicalOutsideExtended { id: u8 },
    #[fail(display = "node at {} MB starts before the node preceding it ends", offset)]
    Unordered { offset: u64 },
    #[fail(display = "gaps at {} MB were not merged", offset)]
    AdjacentGaps { offset: u64 },
    #[fail(display = "primary nodes cover {} MB of a {} MB disk", covered, disk)]
    PrimaryCoverage { covered: u64, disk: u64 },
    #[fail(display = "logical nodes cover {} MB of a {} MB extended partition", covered, extended)]
    LogicalCoverage { covered: u64, extended: u64 },
    #[fail(display = "node of partition {} does not match its table slot", id)]
    Unbound { id: u8 },
    #[fail(display = "partition {} has no node in its block-order list", id)]
    MissingNode { id: u8 },
    #[fail(display = "row orders are not dense")]
    SparseOrders,
    #[fail(display = "gap at {} MB carries a partition identity", offset)]
    MalformedGap { offset: u64 },
    #[fail(display = "gap at {} MB is empty", offset)]
    EmptyGap { offset: u64 },
    #[fail(display = "unused row at {} MB is too small to show", offset)]
    TinyRow { offset: u64 },
}

/// Verifies that `layout` and `table` describe the same disk.
pub fn check(table: &PartInfoTable, layout: &Layout, geometry: &DiskGeometry) -> Result<(), InvariantViolation> {
    let count = table.extended_count();
    if count > 1 {
        return Err(InvariantViolation::MultipleExtended { count });
    }

    match table.extended() {
        None => {
            if table.logical_count() != 0 || !layout.logical.is_empty() {
                return Err(InvariantViolation::OrphanLogicals);
            }
        }
        Some((_, extended)) => {
            let outside = table
                .logicals()
                .iter()
                .chain(layout.logical.iter().map(|node| &node.partinfo))
                .filter(|slot| !slot.is_empty())
                .find(|slot| slot.offset_mb < extended.offset_mb || slot.end_mb() > extended.end_mb());

            if let Some(slot) = outside {
                return Err(InvariantViolation::LogicalOutsideExtended { id: slot.id });
            }

            // Tiny gaps that the builder dropped leave holes of less than a
            // tenth of a gigabyte each.
            let covered = layout.logical.total_mb();
            let tolerance = TENTH_GB_MB * (layout.logical.len() as u64 + 1);
            if covered > extended.size_mb || extended.size_mb - covered > tolerance {
                return Err(InvariantViolation::LogicalCoverage { covered, extended: extended.size_mb });
            }
        }
    }

    ordered(&layout.primary)?;
    ordered(&layout.logical)?;
    sized(&layout.primary)?;
    sized(&layout.logical)?;

    let covered = layout.primary.total_mb();
    if covered != geometry.total_mb {
        return Err(InvariantViolation::PrimaryCoverage { covered, disk: geometry.total_mb });
    }

    mirrored(table, &layout.primary, table.primaries().iter().map(|slot| slot.id), 1)?;
    mirrored(table, &layout.logical, table.logicals().iter().map(|slot| slot.id), FIRST_LOGICAL_ID)
}

/// Nodes must not overlap, and no two gaps may be neighbours.
fn ordered(list: &BlockList) -> Result<(), InvariantViolation> {
    for (prev, next) in list.iter().tuple_windows() {
        if next.offset() < prev.end() {
            return Err(InvariantViolation::Unordered { offset: next.offset() });
        }

        if prev.is_gap() && next.is_gap() {
            return Err(InvariantViolation::AdjacentGaps { offset: next.offset() });
        }
    }

    Ok(())
}

/// Gaps hold space, and unused rows are either empty placeholders or large
/// enough to show.
fn sized(list: &BlockList) -> Result<(), InvariantViolation> {
    for node in list.iter().filter(|node| node.is_free()) {
        if node.is_gap() && node.size() == 0 {
            return Err(InvariantViolation::EmptyGap { offset: node.offset() });
        } else if node.is_sliver() {
            return Err(InvariantViolation::TinyRow { offset: node.offset() });
        }
    }

    Ok(())
}

/// Every bound node matches its slot, every slot has a node, orders are dense
/// from `first_order`, and gaps carry no identity.
fn mirrored<I: Iterator<Item = u8>>(
    table: &PartInfoTable,
    list: &BlockList,
    slot_ids: I,
    first_order: u8,
) -> Result<(), InvariantViolation> {
    for gap in list.iter().filter(|node| node.is_gap()) {
        if gap.partinfo.id != 0 || gap.partinfo.order != 0 || !gap.partinfo.is_unused() {
            return Err(InvariantViolation::MalformedGap { offset: gap.offset() });
        }
    }

    for (row, (_, node)) in list.displayed().enumerate() {
        let id = node.partinfo.id;
        if table.find_by_id(id) != Some(&node.partinfo) {
            return Err(InvariantViolation::Unbound { id });
        }

        if node.partinfo.order as usize != first_order as usize + row {
            return Err(InvariantViolation::SparseOrders);
        }
    }

    for id in slot_ids.filter(|&id| id != 0) {
        if list.position_of_id(id).is_none() {
            return Err(InvariantViolation::MissingNode { id });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{blockorder::BlockNode, layout};
    use disk_types::{PartitionKind, PartitionRecord, EXTENDED};

    fn fixture() -> (PartInfoTable, Layout, DiskGeometry) {
        let disk = DiskGeometry::from_mb(20480);
        let mut table = PartInfoTable::new();
        table.set_slot(0, PartitionRecord::new(1, PartitionKind::Solaris2, 0, 10240, &disk)).unwrap();
        table.set_slot(1, PartitionRecord::new(2, EXTENDED, 10240, 8192, &disk)).unwrap();
        table.set_slot(4, PartitionRecord::new(5, PartitionKind::Solaris2, 10240, 4096, &disk)).unwrap();
        let layout = layout::build(&mut table, &disk).unwrap();
        (table, layout, disk)
    }

    #[test]
    fn built_layouts_are_consistent() {
        let (table, layout, disk) = fixture();
        assert_eq!(check(&table, &layout, &disk), Ok(()));
    }

    #[test]
    fn second_extended_is_caught() {
        let (mut table, layout, disk) = fixture();
        let mut record = table.slots()[0];
        record.kind = EXTENDED;
        table.set_slot(0, record).unwrap();
        assert_eq!(check(&table, &layout, &disk), Err(InvariantViolation::MultipleExtended { count: 2 }));
    }

    #[test]
    fn stale_slot_is_caught() {
        let (mut table, layout, disk) = fixture();
        let mut record = table.slots()[0];
        record.size_mb -= 1;
        table.set_slot(0, record).unwrap();
        assert_eq!(check(&table, &layout, &disk), Err(InvariantViolation::Unbound { id: 1 }));
    }

    #[test]
    fn unlisted_slot_is_caught() {
        let (mut table, layout, disk) = fixture();
        table.set_slot(2, PartitionRecord::new(3, PartitionKind::Unused, 20480, 0, &disk)).unwrap();
        assert_eq!(check(&table, &layout, &disk), Err(InvariantViolation::MissingNode { id: 3 }));
    }

    #[test]
    fn coverage_is_checked() {
        let (table, mut layout, disk) = fixture();
        layout.primary.retain(|node| node.displayed);
        assert_eq!(
            check(&table, &layout, &disk),
            Err(InvariantViolation::PrimaryCoverage { covered: 18432, disk: 20480 })
        );
    }

    #[test]
    fn adjacent_gaps_are_caught() {
        let (table, mut layout, disk) = fixture();
        let tail = layout.primary.len() - 1;
        let gap = layout.primary.remove(tail);
        layout.primary.push(BlockNode::gap(gap.offset(), 1024, &disk));
        layout.primary.push(BlockNode::gap(gap.offset() + 1024, gap.size() - 1024, &disk));
        assert_eq!(check(&table, &layout, &disk), Err(InvariantViolation::AdjacentGaps { offset: 19456 }));
    }

    #[test]
    fn empty_gaps_are_caught() {
        let (table, mut layout, disk) = fixture();
        layout.logical.insert(0, BlockNode::gap(10240, 0, &disk));
        assert_eq!(check(&table, &layout, &disk), Err(InvariantViolation::EmptyGap { offset: 10240 }));
    }

    #[test]
    fn tiny_unused_rows_are_caught() {
        let (mut table, mut layout, disk) = fixture();
        let position = layout.logical.position_of_id(5).unwrap();
        let node = layout.logical.get_mut(position).unwrap();
        node.partinfo = PartitionRecord::new(5, PartitionKind::Unused, 10240, 60, &disk);
        node.partinfo.order = 5;
        let gap = layout.logical.get_mut(position + 1).unwrap();
        gap.partinfo = PartitionRecord::new(0, PartitionKind::Unused, 10300, 8132, &disk);
        table.set_slot(4, layout.logical.nodes()[position].partinfo).unwrap();

        assert_eq!(check(&table, &layout, &disk), Err(InvariantViolation::TinyRow { offset: 10240 }));
    }

    #[test]
    fn orphan_logicals_are_caught() {
        let (mut table, mut layout, disk) = fixture();
        let position = layout.primary.position_of_id(2).unwrap();
        layout.primary.get_mut(position).unwrap().partinfo.kind = PartitionKind::Solaris2;
        let mut record = table.slots()[1];
        record.kind = PartitionKind::Solaris2;
        table.set_slot(1, record).unwrap();
        assert_eq!(check(&table, &layout, &disk), Err(InvariantViolation::OrphanLogicals));
    }
}
