//! The editing protocol of the disk screen.
//!
//! The front end turns widget events into [`Intent`]s. Each intent is applied
//! to a disk's [`DiskEditState`] as a single transaction: the partition table
//! and both block-order lists change together or not at all.

mod logical;
mod primary;
mod space;

pub use self::space::{adjacent_free, calculate_avail_space, stealable, Absorbed, Released};

use crate::{
    blockorder::{BlockList, Dirty},
    config::ScreenConfig,
    error::EditError,
    invariants,
    layout::{self, Layout},
    orchestrator::DiskInfo,
};
use disk_types::{
    round_mb_to_gb, ContentType, DiskGeometry, PartInfoTable, PartitionKind, PartitionRecord,
    EXTENDED, PRIMARY_SLOTS, TENTH_GB_MB,
};
use itertools::Itertools;

/// A change requested by the operator. Rows are zero-based positions in the
/// primary or logical table as displayed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Intent {
    PrimaryType { index: usize, kind: PartitionKind },
    PrimarySize { index: usize, gb: f64 },
    LogicalType { index: usize, kind: PartitionKind },
    LogicalSize { index: usize, gb: f64 },
    DeleteLogical { index: usize },
    /// Binds free space after the given logical row, or anywhere in the
    /// extended partition if no row is given, to a new unused logical.
    CreateLogical { after: Option<usize> },
}

/// Something the operator should be warned about after an edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Notice {
    /// The partition shown at this order held data that will be erased.
    DataLoss { order: u8 },
    /// The logicals of the extended partition at this order were replaced by
    /// a single unused logical.
    LogicalsWiped { order: u8 },
}

/// Everything the front end needs to re-render after an edit.
#[derive(Debug, Clone, PartialEq)]
pub struct EditOutcome {
    pub notices:      Vec<Notice>,
    pub primary_rows: Vec<RowView>,
    pub logical_rows: Vec<RowView>,
}

/// One row of the primary or logical table.
#[derive(Debug, Clone, PartialEq)]
pub struct RowView {
    pub order:          u8,
    pub id:             u8,
    pub kind:           PartitionKind,
    pub content:        ContentType,
    pub size_gb:        f64,
    /// Size the row could reach using only free space beside it.
    pub avail_gb:       f64,
    /// Upper bound of the size spinner, including space that may be taken
    /// from neighbouring Solaris2 partitions.
    pub max_gb:         f64,
    pub type_sensitive: bool,
    pub size_sensitive: bool,
    pub dirty:          Dirty,
    pub type_choices:   Vec<PartitionKind>,
}

/// The working set of one disk.
#[derive(Debug, Clone, PartialEq)]
pub struct DiskEditState {
    pub name:           String,
    pub geometry:       DiskGeometry,
    /// False if the disk label could not be read.
    pub readable:       bool,
    /// True if the disk is below the minimum install size. Editing is
    /// disabled.
    pub too_small:      bool,
    pub boot_device:    bool,
    pub original_parts: PartInfoTable,
    pub modified_parts: PartInfoTable,
    pub default_parts:  PartInfoTable,
    pub original:       Layout,
    pub modified:       Layout,
    /// Pending changes per physical primary slot.
    pub primary_dirty:  [Dirty; PRIMARY_SLOTS],
}

impl DiskEditState {
    /// Starts an edit session on a disk, given the table read from its label.
    pub fn load(
        info: DiskInfo,
        table: Option<PartInfoTable>,
        min_mb: u64,
        boot_device: bool,
    ) -> Result<DiskEditState, EditError> {
        let DiskInfo { name, geometry } = info;
        let readable = table.is_some();

        let mut default_parts = layout::default_layout(&geometry);
        layout::build(&mut default_parts, &geometry)?;

        let mut original_parts = table.unwrap_or_default();
        let original = layout::build(&mut original_parts, &geometry)?;

        let mut modified_parts = if readable { original_parts.clone() } else { default_parts.clone() };
        let modified = layout::build(&mut modified_parts, &geometry)?;

        let too_small = geometry.total_mb < min_mb;
        if too_small {
            warn!("{}: {} MB is below the {} MB required to install", name, geometry.total_mb, min_mb);
        }

        info!(
            "{}: loaded {} MB disk with {} primary and {} logical partitions",
            name,
            geometry.total_mb,
            modified.primary.displayed_count(),
            modified.logical.displayed_count()
        );

        Ok(DiskEditState {
            name,
            geometry,
            readable,
            too_small,
            boot_device,
            original_parts,
            modified_parts,
            default_parts,
            original,
            modified,
            primary_dirty: [Dirty::INITIAL_SIZE_CHANGE; PRIMARY_SLOTS],
        })
    }

    /// The table that would be installed to.
    pub fn proposed_parts(&self, use_whole_disk: bool) -> &PartInfoTable {
        if use_whole_disk {
            &self.default_parts
        } else {
            &self.modified_parts
        }
    }

    /// Discards every edit, returning to the table read from the disk, or to
    /// the whole-disk layout if the label was unreadable.
    pub fn reset(&mut self) -> Result<(), EditError> {
        let mut table = if self.readable { self.original_parts.clone() } else { self.default_parts.clone() };
        let modified = layout::build(&mut table, &self.geometry)?;
        self.modified_parts = table;
        self.modified = modified;
        self.primary_dirty = [Dirty::INITIAL_SIZE_CHANGE; PRIMARY_SLOTS];
        info!("{}: reset partitions", self.name);
        Ok(())
    }

    /// Replaces the proposed table with one returned by the orchestrator, and
    /// rebuilds the views from it.
    pub fn adopt(&mut self, table: PartInfoTable, use_whole_disk: bool) -> Result<(), EditError> {
        let mut table = table;
        let modified = layout::build(&mut table, &self.geometry)?;
        if use_whole_disk {
            self.default_parts = table;
        } else {
            self.modified_parts = table;
            self.modified = modified;
        }

        Ok(())
    }

    /// Applies an intent. On failure the state is left untouched.
    pub fn apply(&mut self, intent: Intent, config: &ScreenConfig) -> Result<EditOutcome, EditError> {
        if self.too_small {
            return Err(EditError::DiskTooSmall);
        }

        info!("{}: applying {:?}", self.name, intent);
        let snapshot = self.clone();

        let result = self.dispatch(intent, config).and_then(|notices| {
            invariants::check(&self.modified_parts, &self.modified, &self.geometry).map_err(|why| {
                error!("{}: {:?} broke the layout: {}", self.name, intent, why);
                EditError::from(why)
            })?;
            Ok(notices)
        });

        match result {
            Ok(notices) => {
                debug!("{}: primary table is now {:?}", self.name, self.modified_parts);
                Ok(EditOutcome {
                    notices:      notices.into_iter().unique().collect(),
                    primary_rows: self.primary_rows(config),
                    logical_rows: self.logical_rows(config),
                })
            }
            Err(why) => {
                warn!("{}: rejected {:?}: {}", self.name, intent, why);
                *self = snapshot;
                Err(why)
            }
        }
    }

    fn dispatch(&mut self, intent: Intent, config: &ScreenConfig) -> Result<Vec<Notice>, EditError> {
        match intent {
            Intent::PrimaryType { index, kind } => self.change_primary_type(index, kind, config),
            Intent::PrimarySize { index, gb } => self.change_primary_size(index, gb, config),
            Intent::LogicalType { index, kind } => self.change_logical_type(index, kind),
            Intent::LogicalSize { index, gb } => self.change_logical_size(index, gb),
            Intent::DeleteLogical { index } => self.delete_logical(index),
            Intent::CreateLogical { after } => self.create_logical(after),
        }
    }

    /// Mirrors both lists into the modified table.
    fn sync(&mut self) -> Result<(), EditError> {
        layout::project(&mut self.modified_parts, &mut self.modified.primary, &mut self.modified.logical)
            .map_err(EditError::from)
    }

    /// The four primary rows. Rows past the last partition are empty.
    pub fn primary_rows(&self, config: &ScreenConfig) -> Vec<RowView> {
        let list = &self.modified.primary;
        let mut rows = list
            .displayed()
            .map(|(position, node)| {
                let slot = self.modified_parts.index_of_id(node.partinfo.id).unwrap_or(0);
                let mut choices = vec![PartitionKind::Unused, PartitionKind::Solaris2];
                if node.kind().is_extended() {
                    choices.push(node.kind());
                } else if !self.has_extended() {
                    choices.push(EXTENDED);
                }
                self.push_original_kind(&mut choices, node.partinfo.id);

                self.row(list, position, self.primary_dirty[slot], choices, config.steal_from_solaris)
            })
            .collect::<Vec<RowView>>();

        while rows.len() < PRIMARY_SLOTS {
            rows.push(self.empty_row(rows.len(), config));
        }

        rows
    }

    /// The logical rows, in on-disk order.
    pub fn logical_rows(&self, _config: &ScreenConfig) -> Vec<RowView> {
        let list = &self.modified.logical;
        list.displayed()
            .map(|(position, node)| {
                let mut choices = vec![PartitionKind::Unused, PartitionKind::Solaris2];
                if let Some(kind) = self.original_logical_kind(node.offset()) {
                    if !choices.contains(&kind) && !kind.is_extended() {
                        choices.push(kind);
                    }
                }

                self.row(list, position, node.dirty, choices, false)
            })
            .collect()
    }

    fn row(
        &self,
        list: &BlockList,
        position: usize,
        dirty: Dirty,
        type_choices: Vec<PartitionKind>,
        steal: bool,
    ) -> RowView {
        let node = &list.nodes()[position];
        let kind = node.kind();
        let avail = calculate_avail_space(list, position, None);
        let grows = kind.is_unused() || kind.is_resizable();
        let stolen = if steal && grows { stealable(list, position) } else { 0 };
        let max = if kind.is_resizable() { avail + stolen } else { node.size() };

        RowView {
            order: node.partinfo.order,
            id: node.partinfo.id,
            kind,
            content: node.partinfo.content,
            size_gb: round_mb_to_gb(node.size()),
            avail_gb: round_mb_to_gb(avail),
            max_gb: round_mb_to_gb(max),
            type_sensitive: !self.too_small && !(kind.is_unused() && avail == 0 && stolen == 0),
            size_sensitive: !self.too_small && kind.is_resizable(),
            dirty,
            type_choices,
        }
    }

    /// A primary row with no partition behind it. Its free space is the gap
    /// that a new partition would be placed in.
    fn empty_row(&self, index: usize, config: &ScreenConfig) -> RowView {
        let list = &self.modified.primary;
        let avail = list.iter().rev().find(|node| node.is_gap() && node.size() >= TENTH_GB_MB).map_or(0, |gap| gap.size());
        let stolen = if config.steal_from_solaris {
            list.iter()
                .rev()
                .find(|node| node.displayed && node.kind() == PartitionKind::Solaris2)
                .map_or(0, |node| node.size().saturating_sub(TENTH_GB_MB))
        } else {
            0
        };

        let mut type_choices = vec![PartitionKind::Unused, PartitionKind::Solaris2];
        if !self.has_extended() {
            type_choices.push(EXTENDED);
        }

        RowView {
            order: index as u8 + 1,
            id: 0,
            kind: PartitionKind::Unused,
            content: ContentType::Unknown,
            size_gb: 0.0,
            avail_gb: round_mb_to_gb(avail),
            max_gb: 0.0,
            type_sensitive: !self.too_small && (avail != 0 || stolen != 0),
            size_sensitive: false,
            dirty: Dirty::empty(),
            type_choices,
        }
    }

    fn has_extended(&self) -> bool { self.modified.primary.displayed().any(|(_, node)| node.kind().is_extended()) }

    /// Adds the type that the partition had when the session started, which
    /// may be kept even though it cannot be created.
    fn push_original_kind(&self, choices: &mut Vec<PartitionKind>, id: u8) {
        if let Some(original) = self.original_primary(id) {
            if !original.is_empty() && !choices.contains(&original.kind) && !original.is_extended() {
                choices.push(original.kind);
            }
        }
    }

    fn original_primary(&self, id: u8) -> Option<&PartitionRecord> {
        self.original_parts.primaries().iter().find(|slot| slot.id == id && id != 0)
    }

    /// The type of the original logical that started at this offset.
    fn original_logical_kind(&self, offset: u64) -> Option<PartitionKind> {
        self.original_parts
            .logicals()
            .iter()
            .find(|slot| !slot.is_empty() && slot.offset_mb == offset)
            .map(|slot| slot.kind)
    }

    /// True if a partition that held data when the session started overlaps
    /// the given range.
    fn holds_data(&self, start: u64, end: u64) -> bool {
        let primaries = self.original_parts.primaries().iter().filter(|slot| !slot.is_extended());
        primaries
            .chain(self.original_parts.logicals().iter())
            .any(|slot| !slot.is_empty() && !slot.is_unused() && slot.size_mb != 0 && slot.overlaps(start, end))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use disk_types::{ForeignKind, FIRST_LOGICAL_ID};

    pub(super) const DISK_MB: u64 = 20480;

    pub(super) fn state(table: Option<PartInfoTable>) -> DiskEditState {
        let info = DiskInfo::new("c0d0".into(), DiskGeometry::from_mb(DISK_MB));
        DiskEditState::load(info, table, 0, true).unwrap()
    }

    pub(super) fn table(parts: &[(usize, u8, PartitionKind, u64, u64)]) -> PartInfoTable {
        let disk = DiskGeometry::from_mb(DISK_MB);
        let mut table = PartInfoTable::new();
        for &(slot, id, kind, offset, size) in parts {
            table.set_slot(slot, PartitionRecord::new(id, kind, offset, size, &disk)).unwrap();
        }
        table
    }

    pub(super) fn primary(state: &DiskEditState, order: u8) -> (u8, PartitionKind, u64, u64) {
        let part = state.modified_parts.get_part_by_order(order).unwrap();
        (part.id, part.kind, part.offset_mb, part.size_mb)
    }

    pub(super) fn extents(list: &BlockList) -> Vec<(u8, PartitionKind, u64, u64, bool)> {
        list.iter().map(|n| (n.partinfo.id, n.kind(), n.offset(), n.size(), n.displayed)).collect()
    }

    #[test]
    fn unreadable_disk_gets_whole_disk_default() {
        let state = state(None);
        assert!(!state.readable);
        assert_eq!(state.original_parts, PartInfoTable::new());
        assert_eq!(state.modified_parts, state.default_parts);
        assert_eq!(primary(&state, 1), (1, PartitionKind::Solaris2, 0, DISK_MB));
        assert!(state.modified_parts.primaries()[1..].iter().all(PartitionRecord::is_empty));
        assert_eq!(extents(&state.modified.primary), vec![(1, PartitionKind::Solaris2, 0, DISK_MB, true)]);
        assert!(state.modified.logical.is_empty());
        assert_eq!(state.proposed_parts(true), &state.default_parts);
    }

    #[test]
    fn session_arms_initial_size_change() {
        let state = state(None);
        assert!(state.primary_dirty.iter().all(|dirty| *dirty == Dirty::INITIAL_SIZE_CHANGE));
    }

    #[test]
    fn rows_of_default_layout() {
        let state = state(None);
        let config = ScreenConfig::default();
        let rows = state.primary_rows(&config);

        assert_eq!(rows.len(), 4);
        assert_eq!((rows[0].order, rows[0].id, rows[0].kind), (1, 1, PartitionKind::Solaris2));
        assert_eq!(rows[0].size_gb, 20.0);
        assert_eq!(rows[0].avail_gb, 20.0);
        assert!(rows[0].size_sensitive);
        assert_eq!(rows[0].type_choices, vec![PartitionKind::Unused, PartitionKind::Solaris2, EXTENDED]);

        // No free space, but a new partition may shrink the Solaris2 one.
        assert_eq!((rows[1].order, rows[1].id, rows[1].avail_gb), (2, 0, 0.0));
        assert!(rows[1].type_sensitive);
        assert!(!rows[1].size_sensitive);

        let strict = ScreenConfig::default().steal_from_solaris(false);
        assert!(!state.primary_rows(&strict)[1].type_sensitive);
    }

    #[test]
    fn foreign_rows_keep_their_type() {
        let ntfs = PartitionKind::Foreign(ForeignKind::Ntfs);
        let state = state(Some(table(&[(0, 1, ntfs, 0, 10240), (1, 2, PartitionKind::Unused, 10240, 10240)])));
        let rows = state.primary_rows(&ScreenConfig::default());

        assert_eq!(rows[0].type_choices, vec![PartitionKind::Unused, PartitionKind::Solaris2, EXTENDED, ntfs]);
        assert_eq!(rows[0].avail_gb, 10.0);
        assert_eq!(rows[0].max_gb, 10.0);
        assert!(!rows[0].size_sensitive);
        assert_eq!(rows[1].avail_gb, 10.0);
        assert!(rows[1].type_sensitive);
    }

    #[test]
    fn unused_row_without_space_is_locked() {
        let ntfs = PartitionKind::Foreign(ForeignKind::Ntfs);
        let state = state(Some(table(&[(0, 1, ntfs, 0, DISK_MB), (1, 2, PartitionKind::Unused, DISK_MB, 0)])));
        let rows = state.primary_rows(&ScreenConfig::default());
        assert_eq!(rows[1].kind, PartitionKind::Unused);
        assert!(!rows[1].type_sensitive);
    }

    #[test]
    fn too_small_disks_refuse_edits() {
        let info = DiskInfo::new("c1d0".into(), DiskGeometry::from_mb(2048));
        let mut state = DiskEditState::load(info, None, 4096, false).unwrap();
        let before = state.clone();

        let intent = Intent::PrimarySize { index: 0, gb: 1.0 };
        assert_eq!(state.apply(intent, &ScreenConfig::default()), Err(EditError::DiskTooSmall));
        assert_eq!(state, before);
        assert!(state.primary_rows(&ScreenConfig::default()).iter().all(|row| !row.type_sensitive));
    }

    #[test]
    fn reset_round_trip() {
        let mut state = state(Some(table(&[
            (0, 1, PartitionKind::Solaris2, 0, 10240),
            (1, 2, EXTENDED, 10240, 10240),
            (4, FIRST_LOGICAL_ID, PartitionKind::Solaris2, 10240, 4096),
        ])));
        let config = ScreenConfig::default();

        state.apply(Intent::PrimarySize { index: 0, gb: 5.0 }, &config).unwrap();
        state.apply(Intent::LogicalType { index: 0, kind: PartitionKind::Unused }, &config).unwrap();
        state.apply(Intent::PrimaryType { index: 1, kind: PartitionKind::Solaris2 }, &config).unwrap();
        assert_ne!(state.modified_parts, state.original_parts);

        state.reset().unwrap();
        assert_eq!(state.modified_parts, state.original_parts);
        assert_eq!(state.modified, state.original);
        assert!(state.primary_dirty.iter().all(|dirty| *dirty == Dirty::INITIAL_SIZE_CHANGE));
    }

    #[test]
    fn failed_intents_leave_no_trace() {
        let mut state = state(None);
        let before = state.clone();
        let config = ScreenConfig::default();

        let intent = Intent::PrimaryType { index: 0, kind: PartitionKind::X86Boot };
        assert_eq!(state.apply(intent, &config), Err(EditError::UnsupportedType { kind: PartitionKind::X86Boot }));
        assert_eq!(state, before);

        let intent = Intent::PrimarySize { index: 3, gb: 2.0 };
        assert_eq!(state.apply(intent, &config), Err(EditError::NoSuchPrimary { row: 3 }));
        assert_eq!(state, before);
    }
}
