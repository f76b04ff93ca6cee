use super::{
    space::{self, Absorbed, Released},
    DiskEditState, Notice,
};
use crate::{
    blockorder::{BlockList, BlockNode, Dirty},
    config::ScreenConfig,
    error::EditError,
    invariants::InvariantViolation,
};
use disk_types::{
    gb_to_mb, is_tiny, one_decimal, PartitionKind, PartitionRecord, FIRST_LOGICAL_ID, PRIMARY_SLOTS,
    TENTH_GB_MB,
};

/// How the size of an extended partition changed.
enum SizeChange {
    Grew(Absorbed),
    Shrank(u64),
}

impl DiskEditState {
    pub(super) fn change_primary_type(
        &mut self,
        row: usize,
        kind: PartitionKind,
        config: &ScreenConfig,
    ) -> Result<Vec<Notice>, EditError> {
        if row >= PRIMARY_SLOTS {
            return Err(EditError::NoSuchPrimary { row });
        }

        let position = self.modified.primary.position_of_row(row);
        let current = position.and_then(|position| self.modified.primary.get(position)).map(|node| node.partinfo);

        match current {
            Some(ref current) if current.kind == kind => return Ok(Vec::new()),
            None if kind.is_unused() => return Ok(Vec::new()),
            _ => (),
        }

        let original = current.and_then(|current| self.original_primary(current.id)).map(|slot| slot.kind);
        let creatable = kind.is_unused() || kind == PartitionKind::Solaris2 || kind.is_extended();
        if !creatable && Some(kind) != original {
            return Err(EditError::UnsupportedType { kind });
        }

        if kind.is_extended() {
            let other = self
                .modified
                .primary
                .displayed()
                .any(|(other, node)| Some(other) != position && node.kind().is_extended());
            if other {
                return Err(EditError::OnlyOneExtended);
            }
        }

        let id = match current {
            Some(current) => current.id,
            None => self.insert_primary()?,
        };

        let slot = self.primary_slot(id)?;
        let previous = current.map_or(PartitionKind::Unused, |current| current.kind);
        let mut touched = vec![id];
        let mut notices = Vec::new();

        if previous.is_extended() && kind.is_extended() {
            self.set_primary_kind(id, kind)?;
        } else {
            if let Some(extended) = current.filter(|_| previous.is_extended()) {
                if self.logicals_held_data(extended.offset_mb, extended.end_mb()) {
                    let order = self.primary_order(id)?;
                    warn!("{}: retyping extended partition {} erases its logicals", self.name, id);
                    notices.push(Notice::LogicalsWiped { order });
                }
                self.remove_logicals();
            }

            self.set_primary_kind(id, kind)?;
            if kind.is_unused() {
                let position = self.primary_position(id)?;
                let size = self.modified.primary.nodes()[position].size();
                if size != 0 {
                    space::release(&mut self.modified.primary, position, size, &self.geometry);
                }
                self.primary_dirty[slot] |= Dirty::SIZE_CHANGED;
            } else {
                if self.primary_node(id)?.size() == 0 {
                    let position = self.primary_position(id)?;
                    let absorbed = space::absorb(
                        &mut self.modified.primary,
                        position,
                        TENTH_GB_MB,
                        config.steal_from_solaris,
                        &self.geometry,
                    )?;
                    touched.extend(self.mark_stolen(&absorbed)?);
                    self.primary_dirty[slot] |= Dirty::SIZE_CHANGED;
                }

                if kind.is_extended() {
                    self.span_logicals(id)?;
                    self.primary_dirty[slot] |= Dirty::INITIAL_SIZE_CHANGE;
                }
            }
        }

        self.primary_dirty[slot] |= Dirty::TYPE_CHANGED;
        self.sync()?;
        notices.extend(self.primary_losses(&touched));

        info!("{}: primary row {} changed from {} to {}", self.name, row, previous, kind);
        Ok(notices)
    }

    pub(super) fn change_primary_size(
        &mut self,
        row: usize,
        gb: f64,
        config: &ScreenConfig,
    ) -> Result<Vec<Notice>, EditError> {
        let position = self.modified.primary.position_of_row(row).ok_or(EditError::NoSuchPrimary { row })?;
        let node = self.modified.primary.nodes()[position];
        let kind = node.kind();
        if !kind.is_resizable() {
            return Err(EditError::NotResizable { kind });
        }

        let new_mb = gb_to_mb(one_decimal(gb));
        if new_mb == 0 {
            return Err(EditError::ZeroSize);
        } else if space::unchanged(new_mb, node.size()) {
            return Ok(Vec::new());
        }

        let id = node.partinfo.id;
        let slot = self.primary_slot(id)?;
        let mut touched = vec![id];

        let change = if new_mb > node.size() {
            let absorbed = space::absorb(
                &mut self.modified.primary,
                position,
                new_mb - node.size(),
                config.steal_from_solaris,
                &self.geometry,
            )?;
            touched.extend(self.mark_stolen(&absorbed)?);
            SizeChange::Grew(absorbed)
        } else {
            let amount = node.size() - new_mb;
            if let Released::Gap(gap) = space::release(&mut self.modified.primary, position, amount, &self.geometry) {
                self.reify_gap(gap)?;
            }
            SizeChange::Shrank(amount)
        };

        self.primary_dirty[slot] |= Dirty::SIZE_CHANGED;

        let mut notices = Vec::new();
        if kind.is_extended() {
            notices.extend(self.resize_extended(id, slot, change)?);
        }

        self.sync()?;
        notices.extend(self.primary_losses(&touched));

        info!("{}: primary row {} resized from {} MB to {} MB", self.name, row, node.size(), new_mb);
        Ok(notices)
    }

    /// Inserts a zero-sized partition for an empty row, returning its id.
    ///
    /// The partition is placed at the start of the last gap that can hold a
    /// tenth of a gigabyte, else after the last Solaris2 partition, else at
    /// the end of the disk.
    fn insert_primary(&mut self) -> Result<u8, EditError> {
        let list = &self.modified.primary;
        let (position, offset) = match list.nodes().iter().rposition(|n| n.is_gap() && n.size() >= TENTH_GB_MB) {
            Some(position) => (position, list.nodes()[position].offset()),
            None => match list.nodes().iter().rposition(|n| n.displayed && n.kind() == PartitionKind::Solaris2) {
                Some(position) => (position + 1, list.nodes()[position].end()),
                None => (list.len(), list.nodes().last().map_or(0, BlockNode::end)),
            },
        };

        let (slot, id) = self.modified_parts.allocate_primary()?;
        self.primary_dirty[slot] = Dirty::INITIAL_SIZE_CHANGE;

        let record = PartitionRecord::new(id, PartitionKind::Unused, offset, 0, &self.geometry);
        self.modified.primary.insert(position, BlockNode::bound(record));
        debug!("{}: inserted primary partition {} at {} MB", self.name, id, offset);
        Ok(id)
    }

    /// Binds the gap at `position` to an empty primary slot, if the gap is
    /// large enough to be shown and a slot is free.
    fn reify_gap(&mut self, position: usize) -> Result<(), EditError> {
        let size = match self.modified.primary.get(position) {
            Some(node) if node.is_gap() => node.size(),
            _ => return Ok(()),
        };

        if is_tiny(size) || self.modified_parts.find_unused_primary().is_none() {
            return Ok(());
        }

        let (slot, id) = self.modified_parts.allocate_primary()?;
        self.primary_dirty[slot] = Dirty::INITIAL_SIZE_CHANGE;
        if let Some(node) = self.modified.primary.get_mut(position) {
            node.displayed = true;
            node.partinfo.id = id;
        }

        debug!("{}: bound {} MB of free space to primary partition {}", self.name, size, id);
        Ok(())
    }

    /// Adjusts the logicals after their extended partition was resized.
    ///
    /// The first resize of the session replaces every logical with a single
    /// unused logical. Later resizes add or remove space at the head and tail
    /// of the logical list.
    fn resize_extended(&mut self, id: u8, slot: usize, change: SizeChange) -> Result<Vec<Notice>, EditError> {
        if self.primary_dirty[slot].contains(Dirty::INITIAL_SIZE_CHANGE) {
            self.primary_dirty[slot].remove(Dirty::INITIAL_SIZE_CHANGE);
            self.span_logicals(id)?;
            let order = self.primary_order(id)?;
            warn!("{}: first resize of extended partition {} replaced its logicals", self.name, id);
            return Ok(vec![Notice::LogicalsWiped { order }]);
        }

        if self.modified.logical.is_empty() {
            self.span_logicals(id)?;
            return Ok(Vec::new());
        }

        let extended = self.primary_node(id)?.partinfo;
        match change {
            SizeChange::Grew(absorbed) => {
                self.extend_logical_tail(extended.end_mb() - absorbed.forward, extended.end_mb());
                self.extend_logical_head(extended.offset_mb, extended.offset_mb + absorbed.backward);
            }
            SizeChange::Shrank(amount) => {
                debug!("{}: releasing {} MB from the tail of the logicals", self.name, amount);
                self.shrink_logical_tail(extended.end_mb())?;
            }
        }

        Ok(Vec::new())
    }

    /// Replaces the logicals with one unused logical spanning the extended
    /// partition.
    fn span_logicals(&mut self, id: u8) -> Result<(), EditError> {
        let extended = self.primary_node(id)?.partinfo;
        let record = PartitionRecord::new(
            FIRST_LOGICAL_ID,
            PartitionKind::Unused,
            extended.offset_mb,
            extended.size_mb,
            &self.geometry,
        );

        let mut list = BlockList::new();
        list.push(BlockNode::bound(record));
        self.modified.logical = list;
        Ok(())
    }

    pub(super) fn remove_logicals(&mut self) {
        self.modified.logical = BlockList::new();
        self.modified_parts.clear_logicals();
    }

    fn set_primary_kind(&mut self, id: u8, kind: PartitionKind) -> Result<(), EditError> {
        let position = self.primary_position(id)?;
        if let Some(node) = self.modified.primary.get_mut(position) {
            node.partinfo.kind = kind;
        }
        Ok(())
    }

    /// Marks the partitions that were shrunk to make room, returning their ids.
    fn mark_stolen(&mut self, absorbed: &Absorbed) -> Result<Vec<u8>, EditError> {
        for &id in &absorbed.stolen {
            let slot = self.primary_slot(id)?;
            self.primary_dirty[slot] |= Dirty::SIZE_CHANGED;
        }
        Ok(absorbed.stolen.clone())
    }

    /// Warnings for partitions that held data when the session started and
    /// no longer match it.
    fn primary_losses(&self, ids: &[u8]) -> Vec<Notice> {
        ids.iter()
            .filter_map(|&id| {
                let original = self.original_primary(id)?;
                if original.is_unused() || original.is_extended() || original.size_mb == 0 {
                    return None;
                }

                let modified = self.modified_parts.find_by_id(id);
                let changed = modified.map_or(true, |modified| {
                    modified.kind != original.kind
                        || modified.offset_mb != original.offset_mb
                        || modified.size_mb != original.size_mb
                });

                if changed {
                    Some(Notice::DataLoss { order: modified.map_or(original.order, |modified| modified.order) })
                } else {
                    None
                }
            })
            .collect()
    }

    /// True if a logical inside `start..end` held data when the session
    /// started.
    fn logicals_held_data(&self, start: u64, end: u64) -> bool {
        self.original_parts
            .logicals()
            .iter()
            .any(|slot| !slot.is_empty() && !slot.is_unused() && slot.size_mb != 0 && slot.overlaps(start, end))
    }

    pub(super) fn primary_position(&self, id: u8) -> Result<usize, EditError> {
        self.modified.primary.position_of_id(id).ok_or(EditError::Invariant { why: InvariantViolation::MissingNode { id } })
    }

    pub(super) fn primary_node(&self, id: u8) -> Result<&BlockNode, EditError> {
        let position = self.primary_position(id)?;
        Ok(&self.modified.primary.nodes()[position])
    }

    fn primary_slot(&self, id: u8) -> Result<usize, EditError> {
        self.modified_parts.index_of_id(id).ok_or(EditError::Invariant { why: InvariantViolation::MissingNode { id } })
    }

    /// The order that `project` will give the primary partition.
    fn primary_order(&self, id: u8) -> Result<u8, EditError> {
        let position = self.primary_position(id)?;
        Ok(self.modified.primary.nodes()[..=position].iter().filter(|node| node.displayed).count() as u8)
    }
}
