//! Construction of block-order lists from a partition table, and the
//! projection of edited lists back into the table.

use crate::blockorder::{BlockList, BlockNode};
use disk_types::{
    DiskGeometry, PartInfoTable, PartitionKind, PartitionRecord, TableError, FIRST_LOGICAL_ID,
    LOGICAL_SLOTS, PRIMARY_SLOTS,
};
use itertools::Itertools;

/// The primary and logical block-order lists of one disk.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Layout {
    pub primary: BlockList,
    pub logical: BlockList,
}

/// Rebuilds both block-order lists from `table`, inserting gaps wherever the
/// partitions leave space unallocated, and writes dense orders back to the
/// table.
///
/// Building an already built table yields the same lists and table.
pub fn build(table: &mut PartInfoTable, geometry: &DiskGeometry) -> Result<Layout, TableError> {
    let mut layout = Layout::default();
    let mut descended = false;
    let mut cursor = 0;

    let primaries = table
        .primaries()
        .iter()
        .filter(|slot| !slot.is_empty())
        .cloned()
        .sorted_by(|a, b| (a.offset_mb, a.order).cmp(&(b.offset_mb, b.order)));

    for part in primaries {
        if part.offset_mb > cursor {
            layout.primary.push(BlockNode::gap(cursor, part.offset_mb - cursor, geometry));
        }

        cursor = cursor.max(part.end_mb());
        layout.primary.push(BlockNode::bound(part));

        if part.is_extended() && !descended {
            layout.logical = descend(table, &part, geometry);
            descended = true;
        }
    }

    if cursor < geometry.total_mb {
        layout.primary.push(BlockNode::gap(cursor, geometry.total_mb - cursor, geometry));
    }

    layout.primary.unbind_slivers(geometry);
    layout.logical.unbind_slivers(geometry);
    project(table, &mut layout.primary, &mut layout.logical)?;
    layout.logical.drop_tiny_gaps();

    debug!("built layout: {} primary nodes, {} logical nodes", layout.primary.len(), layout.logical.len());
    Ok(layout)
}

/// Lists the logicals inside `extended`, with a gap wherever they leave space
/// unallocated, including at the tail.
fn descend(table: &PartInfoTable, extended: &PartitionRecord, geometry: &DiskGeometry) -> BlockList {
    let mut list = BlockList::new();
    let mut cursor = extended.offset_mb;

    let logicals = table
        .logicals()
        .iter()
        .filter(|slot| !slot.is_empty())
        .cloned()
        .sorted_by(|a, b| (a.offset_mb, a.order).cmp(&(b.offset_mb, b.order)));

    for part in logicals {
        if part.offset_mb < extended.offset_mb || part.end_mb() > extended.end_mb() {
            warn!("dropping logical partition {} that lies outside of the extended partition", part.id);
            continue;
        }

        if part.offset_mb > cursor {
            list.push(BlockNode::gap(cursor, part.offset_mb - cursor, geometry));
        }

        cursor = cursor.max(part.end_mb());
        list.push(BlockNode::bound(part));
    }

    if cursor < extended.end_mb() {
        list.push(BlockNode::gap(cursor, extended.end_mb() - cursor, geometry));
    }

    list
}

/// Assigns dense orders to the bound nodes of both lists and mirrors them
/// into the table.
///
/// Primary nodes keep their ids and are written to the slot holding that id;
/// primary slots whose id no longer has a node are cleared. Logical nodes are
/// numbered by position, so their ids and orders both run from 5 upwards, and
/// the logical slots are rewritten compactly.
pub fn project(
    table: &mut PartInfoTable,
    primary: &mut BlockList,
    logical: &mut BlockList,
) -> Result<(), TableError> {
    let live = primary.displayed().map(|(_, node)| node.partinfo.id).collect::<Vec<u8>>();
    if live.len() > PRIMARY_SLOTS {
        return Err(TableError::PrimarySlotsExhausted);
    }

    for index in 0..PRIMARY_SLOTS {
        let id = table.primaries()[index].id;
        if id != 0 && !live.contains(&id) {
            table.set_slot(index, PartitionRecord::default())?;
        }
    }

    for (order, node) in primary.iter_mut().filter(|node| node.displayed).enumerate() {
        node.partinfo.order = order as u8 + 1;
        let index = match table.index_of_id(node.partinfo.id) {
            Some(index) => index,
            None => table.find_unused_primary().ok_or(TableError::PrimarySlotsExhausted)?,
        };
        table.set_slot(index, node.partinfo)?;
    }

    table.clear_logicals();
    for (position, node) in logical.iter_mut().filter(|node| node.displayed).enumerate() {
        if position >= LOGICAL_SLOTS {
            return Err(TableError::LogicalSlotsExhausted(LOGICAL_SLOTS));
        }

        let id = FIRST_LOGICAL_ID + position as u8;
        node.partinfo.id = id;
        node.partinfo.order = id;
        table.set_slot(PRIMARY_SLOTS + position, node.partinfo)?;
    }

    Ok(())
}

/// A table with a single active Solaris2 partition spanning the disk.
pub fn default_layout(geometry: &DiskGeometry) -> PartInfoTable {
    let mut record = PartitionRecord::new(1, PartitionKind::Solaris2, 0, geometry.total_mb, geometry);
    record.order = 1;
    record.active = true;
    PartInfoTable::with_whole_disk(record, geometry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use disk_types::{ForeignKind, EXTENDED};

    const DISK_MB: u64 = 20480;

    fn part(id: u8, kind: PartitionKind, offset: u64, size: u64, disk: &DiskGeometry) -> PartitionRecord {
        PartitionRecord::new(id, kind, offset, size, disk)
    }

    fn extents(list: &BlockList) -> Vec<(u64, u64, bool)> {
        list.iter().map(|node| (node.offset(), node.size(), node.displayed)).collect()
    }

    fn tiles(list: &BlockList, start: u64, end: u64) -> bool {
        let mut cursor = start;
        for node in list {
            if node.offset() != cursor {
                return false;
            }
            cursor = node.end();
        }
        cursor == end
    }

    fn mixed_table(disk: &DiskGeometry) -> PartInfoTable {
        let mut table = PartInfoTable::new();
        table.set_slot(0, part(1, PartitionKind::Solaris2, 1024, 4096, disk)).unwrap();
        table.set_slot(1, part(2, EXTENDED, 8192, 8192, disk)).unwrap();
        table.set_slot(4, part(5, PartitionKind::Solaris2, 8192, 2048, disk)).unwrap();
        table
            .set_slot(5, part(6, PartitionKind::Foreign(ForeignKind::Ntfs), 12288, 2048, disk))
            .unwrap();
        table
    }

    #[test]
    fn default_is_whole_disk_solaris() {
        let disk = DiskGeometry::from_mb(DISK_MB);
        let mut table = default_layout(&disk);

        let first = table.primaries()[0];
        assert_eq!((first.id, first.order, first.kind), (1, 1, PartitionKind::Solaris2));
        assert_eq!((first.offset_mb, first.size_mb), (0, DISK_MB));
        assert!(first.active);
        assert!(table.primaries()[1..].iter().all(PartitionRecord::is_empty));
        assert_eq!(table.logical_count(), 0);

        let layout = build(&mut table, &disk).unwrap();
        assert_eq!(extents(&layout.primary), vec![(0, DISK_MB, true)]);
        assert!(layout.logical.is_empty());
    }

    #[test]
    fn gaps_fill_unallocated_space() {
        let disk = DiskGeometry::from_mb(DISK_MB);
        let mut table = mixed_table(&disk);
        let layout = build(&mut table, &disk).unwrap();

        assert_eq!(extents(&layout.primary), vec![
            (0, 1024, false),
            (1024, 4096, true),
            (5120, 3072, false),
            (8192, 8192, true),
            (16384, 4096, false),
        ]);

        assert_eq!(extents(&layout.logical), vec![
            (8192, 2048, true),
            (10240, 2048, false),
            (12288, 2048, true),
            (14336, 2048, false),
        ]);

        assert!(tiles(&layout.primary, 0, DISK_MB));
        assert!(tiles(&layout.logical, 8192, 16384));
        assert!(layout.primary.iter().filter(|n| n.is_gap()).all(|n| n.partinfo.id == 0 && n.partinfo.order == 0));
    }

    #[test]
    fn orders_follow_offsets() {
        let disk = DiskGeometry::from_mb(DISK_MB);
        let mut table = PartInfoTable::new();
        table.set_slot(0, part(1, PartitionKind::Solaris2, 10240, 10240, &disk)).unwrap();
        table
            .set_slot(2, part(3, PartitionKind::Foreign(ForeignKind::Fat32), 0, 10240, &disk))
            .unwrap();

        build(&mut table, &disk).unwrap();
        assert_eq!(table.get_part_by_order(1).map(|p| p.id), Some(3));
        assert_eq!(table.get_part_by_order(2).map(|p| p.id), Some(1));
        assert_eq!(table.index_of_id(3), Some(2));
    }

    #[test]
    fn logical_ids_are_compacted() {
        let disk = DiskGeometry::from_mb(DISK_MB);
        let mut table = mixed_table(&disk);
        let mut first = table.slots()[4];
        first.id = 9;
        let mut second = table.slots()[5];
        second.id = 7;
        table.set_slot(4, PartitionRecord::default()).unwrap();
        table.set_slot(5, PartitionRecord::default()).unwrap();
        table.set_slot(20, second).unwrap();
        table.set_slot(31, first).unwrap();

        build(&mut table, &disk).unwrap();
        assert_eq!(table.logical_count(), 2);
        assert_eq!(table.slots()[4].id, 5);
        assert_eq!(table.slots()[4].offset_mb, 8192);
        assert_eq!(table.slots()[5].id, 6);
        assert_eq!(table.slots()[5].order, 6);
        assert!(table.slots()[6..].iter().all(PartitionRecord::is_empty));
    }

    #[test]
    fn building_is_idempotent() {
        let disk = DiskGeometry::from_mb(DISK_MB);
        let mut table = mixed_table(&disk);
        let first = build(&mut table, &disk).unwrap();
        let snapshot = table.clone();
        let second = build(&mut table, &disk).unwrap();

        assert_eq!(first, second);
        assert_eq!(snapshot, table);
    }

    #[test]
    fn tiny_logical_gaps_are_dropped() {
        let disk = DiskGeometry::from_mb(DISK_MB);
        let mut table = PartInfoTable::new();
        table.set_slot(0, part(1, PartitionKind::Solaris2, 0, 14234, &disk)).unwrap();
        table.set_slot(1, part(2, EXTENDED, 14234, 6246, &disk)).unwrap();
        table.set_slot(4, part(5, PartitionKind::Solaris2, 14234, 3123, &disk)).unwrap();
        table.set_slot(5, part(6, PartitionKind::Solaris2, 17357, 3072, &disk)).unwrap();

        let layout = build(&mut table, &disk).unwrap();
        assert_eq!(extents(&layout.logical), vec![(14234, 3123, true), (17357, 3072, true)]);
        assert!(tiles(&layout.primary, 0, DISK_MB));
    }

    #[test]
    fn unused_slivers_are_not_rows() {
        let disk = DiskGeometry::from_mb(DISK_MB);
        let mut table = PartInfoTable::new();
        table.set_slot(0, part(1, PartitionKind::Solaris2, 0, 20000, &disk)).unwrap();
        table.set_slot(1, part(2, PartitionKind::Unused, 20000, 60, &disk)).unwrap();

        let layout = build(&mut table, &disk).unwrap();
        assert_eq!(extents(&layout.primary), vec![(0, 20000, true), (20000, 480, false)]);
        assert_eq!(table.find_by_id(2), None);
    }

    #[test]
    fn projection_clears_stale_primaries() {
        let disk = DiskGeometry::from_mb(DISK_MB);
        let mut table = mixed_table(&disk);
        let mut layout = build(&mut table, &disk).unwrap();

        let position = layout.primary.position_of_id(1).unwrap();
        layout.primary.get_mut(position).unwrap().displayed = false;
        project(&mut table, &mut layout.primary, &mut layout.logical).unwrap();

        assert_eq!(table.find_by_id(1), None);
        assert_eq!(table.find_by_id(2).map(|p| p.order), Some(1));
    }
}
