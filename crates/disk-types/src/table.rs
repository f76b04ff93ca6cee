use crate::{
    partition::PartitionRecord,
    sector::DiskGeometry,
};

/// Primary slots in an MBR partition table.
pub const PRIMARY_SLOTS: usize = 4;
/// Logical slots the installer models inside an extended partition.
pub const LOGICAL_SLOTS: usize = 32;
/// Total number of slots in a `PartInfoTable`.
pub const SLOT_COUNT: usize = PRIMARY_SLOTS + LOGICAL_SLOTS;
/// The id (and order) of the first logical partition.
pub const FIRST_LOGICAL_ID: u8 = 5;

/// A possible error when manipulating the partition table.
#[derive(Debug, Fail, PartialEq)]
pub enum TableError {
    #[fail(display = "slot {} is out of range", index)]
    SlotOutOfRange { index: usize },
    #[fail(display = "all four primary partition slots are in use")]
    PrimarySlotsExhausted,
    #[fail(display = "all {} logical partition slots are in use", _0)]
    LogicalSlotsExhausted(usize),
    #[fail(display = "partition {} was not found in the table", id)]
    IdNotFound { id: u8 },
}

/// The partition table of one disk: four primary slots followed by thirty-two
/// logical slots.
///
/// The physical index of a slot is not its row position; consumers look
/// partitions up by `order` or `id`.
#[derive(Clone, PartialEq, Eq)]
pub struct PartInfoTable {
    slots: [PartitionRecord; SLOT_COUNT],
}

impl Default for PartInfoTable {
    fn default() -> Self { PartInfoTable { slots: [PartitionRecord::default(); SLOT_COUNT] } }
}

impl ::std::fmt::Debug for PartInfoTable {
    fn fmt(&self, f: &mut ::std::fmt::Formatter) -> ::std::fmt::Result {
        // Empty slots are noise when dumping a table to the log.
        f.debug_list()
            .entries(self.slots.iter().enumerate().filter(|(_, slot)| !slot.is_empty()))
            .finish()
    }
}

impl PartInfoTable {
    pub fn new() -> PartInfoTable { PartInfoTable::default() }

    pub fn slots(&self) -> &[PartitionRecord] { &self.slots }

    pub fn primaries(&self) -> &[PartitionRecord] { &self.slots[..PRIMARY_SLOTS] }

    pub fn primaries_mut(&mut self) -> &mut [PartitionRecord] { &mut self.slots[..PRIMARY_SLOTS] }

    pub fn logicals(&self) -> &[PartitionRecord] { &self.slots[PRIMARY_SLOTS..] }

    pub fn logicals_mut(&mut self) -> &mut [PartitionRecord] { &mut self.slots[PRIMARY_SLOTS..] }

    pub fn slot(&self, index: usize) -> Result<&PartitionRecord, TableError> {
        self.slots.get(index).ok_or(TableError::SlotOutOfRange { index })
    }

    /// Overwrites the slot at the given physical index.
    pub fn set_slot(&mut self, index: usize, record: PartitionRecord) -> Result<(), TableError> {
        let slot = self.slots.get_mut(index).ok_or(TableError::SlotOutOfRange { index })?;
        *slot = record;
        Ok(())
    }

    /// Fetches the non-empty partition shown at the given row order.
    pub fn get_part_by_order(&self, order: u8) -> Option<&PartitionRecord> {
        self.namespace(order).iter().find(|slot| !slot.is_empty() && slot.order == order)
    }

    pub fn get_part_by_order_mut(&mut self, order: u8) -> Option<&mut PartitionRecord> {
        self.namespace_mut(order).iter_mut().find(|slot| !slot.is_empty() && slot.order == order)
    }

    /// Physical index of the slot holding the partition with the given id.
    pub fn index_of_id(&self, id: u8) -> Option<usize> {
        if id == 0 {
            return None;
        }

        let base = if id < FIRST_LOGICAL_ID { 0 } else { PRIMARY_SLOTS };
        self.namespace(id).iter().position(|slot| slot.id == id).map(|pos| base + pos)
    }

    pub fn find_by_id(&self, id: u8) -> Option<&PartitionRecord> {
        self.index_of_id(id).map(|index| &self.slots[index])
    }

    pub fn find_by_id_mut(&mut self, id: u8) -> Option<&mut PartitionRecord> {
        self.index_of_id(id).map(move |index| &mut self.slots[index])
    }

    /// Physical index of the first empty primary slot.
    pub fn find_unused_primary(&self) -> Option<usize> {
        self.primaries().iter().position(PartitionRecord::is_empty)
    }

    /// Physical index of the first empty logical slot.
    pub fn find_unused_logical(&self) -> Option<usize> {
        self.logicals().iter().position(PartitionRecord::is_empty).map(|pos| PRIMARY_SLOTS + pos)
    }

    /// The smallest primary id that no slot currently uses.
    pub fn next_primary_id(&self) -> Option<u8> {
        (1..FIRST_LOGICAL_ID).find(|&id| self.primaries().iter().all(|slot| slot.id != id))
    }

    /// Reserves an empty primary slot, returning its physical index and new id.
    pub fn allocate_primary(&mut self) -> Result<(usize, u8), TableError> {
        let index = self.find_unused_primary().ok_or(TableError::PrimarySlotsExhausted)?;
        let id = self.next_primary_id().ok_or(TableError::PrimarySlotsExhausted)?;
        self.slots[index] = PartitionRecord { id, ..PartitionRecord::default() };
        Ok((index, id))
    }

    /// The extended partition and its physical index, if one exists.
    pub fn extended(&self) -> Option<(usize, &PartitionRecord)> {
        self.primaries().iter().enumerate().find(|(_, slot)| !slot.is_empty() && slot.is_extended())
    }

    pub fn extended_count(&self) -> usize {
        self.primaries().iter().filter(|slot| !slot.is_empty() && slot.is_extended()).count()
    }

    pub fn logical_count(&self) -> usize {
        self.logicals().iter().filter(|slot| !slot.is_empty()).count()
    }

    /// Zeroes every logical slot.
    pub fn clear_logicals(&mut self) {
        for slot in self.logicals_mut() {
            *slot = PartitionRecord::default();
        }
    }

    /// Every Solaris install candidate across primaries and logicals.
    pub fn solaris_partitions<'a>(&'a self) -> impl Iterator<Item = &'a PartitionRecord> + 'a {
        self.slots.iter().filter(|slot| !slot.is_empty() && slot.is_solaris())
    }

    /// Megabytes claimed by primary partitions. Empty rows and unused slots
    /// are free space and do not count.
    pub fn primary_sum_mb(&self) -> u64 {
        self.primaries().iter().filter(|slot| !slot.is_empty() && !slot.is_unused()).map(|slot| slot.size_mb).sum()
    }

    /// Megabytes claimed by logical partitions.
    pub fn logical_sum_mb(&self) -> u64 {
        self.logicals().iter().filter(|slot| !slot.is_empty() && !slot.is_unused()).map(|slot| slot.size_mb).sum()
    }

    /// A table holding a single partition in the first primary slot.
    pub fn with_whole_disk(record: PartitionRecord, geometry: &DiskGeometry) -> PartInfoTable {
        let mut table = PartInfoTable::new();
        let mut record = record;
        record.set_extent(0, geometry.total_mb, geometry);
        table.slots[0] = record;
        table
    }

    fn namespace(&self, key: u8) -> &[PartitionRecord] {
        if key < FIRST_LOGICAL_ID { self.primaries() } else { self.logicals() }
    }

    fn namespace_mut(&mut self, key: u8) -> &mut [PartitionRecord] {
        if key < FIRST_LOGICAL_ID { self.primaries_mut() } else { self.logicals_mut() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kind::{PartitionKind, EXTENDED};

    fn sample() -> PartInfoTable {
        let disk = DiskGeometry::from_mb(20480);
        let mut table = PartInfoTable::new();
        let mut solaris = PartitionRecord::new(1, PartitionKind::Solaris2, 0, 10240, &disk);
        solaris.order = 1;
        let mut extended = PartitionRecord::new(3, EXTENDED, 10240, 10240, &disk);
        extended.order = 2;
        let mut logical = PartitionRecord::new(5, PartitionKind::Solaris, 10240, 2048, &disk);
        logical.order = 5;
        table.set_slot(2, solaris).unwrap();
        table.set_slot(0, extended).unwrap();
        table.set_slot(4, logical).unwrap();
        table
    }

    #[test]
    fn lookup_by_order_and_id() {
        let table = sample();
        assert_eq!(table.get_part_by_order(1).map(|p| p.id), Some(1));
        assert_eq!(table.get_part_by_order(2).map(|p| p.id), Some(3));
        assert_eq!(table.get_part_by_order(3), None);
        assert_eq!(table.get_part_by_order(5).map(|p| p.id), Some(5));
        assert_eq!(table.index_of_id(1), Some(2));
        assert_eq!(table.index_of_id(3), Some(0));
        assert_eq!(table.index_of_id(5), Some(4));
        assert_eq!(table.index_of_id(0), None);
        assert_eq!(table.index_of_id(6), None);
    }

    #[test]
    fn unused_slots() {
        let mut table = sample();
        assert_eq!(table.find_unused_primary(), Some(1));
        assert_eq!(table.find_unused_logical(), Some(5));
        assert_eq!(table.next_primary_id(), Some(2));
        assert_eq!(table.allocate_primary(), Ok((1, 2)));
        assert_eq!(table.allocate_primary(), Ok((3, 4)));
        assert_eq!(table.allocate_primary(), Err(TableError::PrimarySlotsExhausted));
        assert_eq!(table.set_slot(SLOT_COUNT, PartitionRecord::default()), Err(TableError::SlotOutOfRange { index: 36 }));
    }

    #[test]
    fn extended_and_sums() {
        let mut table = sample();
        assert_eq!(table.extended().map(|(index, p)| (index, p.id)), Some((0, 3)));
        assert_eq!(table.extended_count(), 1);
        assert_eq!(table.primary_sum_mb(), 20480);
        assert_eq!(table.logical_sum_mb(), 2048);
        assert_eq!(table.solaris_partitions().count(), 2);

        table.clear_logicals();
        assert_eq!(table.logical_count(), 0);
        assert_eq!(table.solaris_partitions().count(), 1);
    }
}
