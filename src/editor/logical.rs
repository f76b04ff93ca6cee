use super::{
    space::{self, Released},
    DiskEditState, Notice,
};
use crate::{
    blockorder::{BlockNode, Dirty},
    error::EditError,
};
use disk_types::{
    gb_to_mb, is_tiny, one_decimal, PartitionKind, PartitionRecord, TableError, FIRST_LOGICAL_ID,
    LOGICAL_SLOTS,
};

impl DiskEditState {
    pub(super) fn change_logical_type(&mut self, row: usize, kind: PartitionKind) -> Result<Vec<Notice>, EditError> {
        let position = self.logical_position(row)?;
        let node = self.modified.logical.nodes()[position];
        if node.kind() == kind {
            return Ok(Vec::new());
        }

        let creatable = kind.is_unused() || kind == PartitionKind::Solaris2;
        if kind.is_extended() || (!creatable && self.original_logical_kind(node.offset()) != Some(kind)) {
            return Err(EditError::UnsupportedType { kind });
        }

        if let Some(node) = self.modified.logical.get_mut(position) {
            node.partinfo.kind = kind;
            node.dirty |= Dirty::TYPE_CHANGED;
        }

        let geometry = self.geometry;
        self.modified.logical.unbind_slivers(&geometry);
        self.sync()?;
        info!("{}: logical row {} changed from {} to {}", self.name, row, node.kind(), kind);
        Ok(self.logical_losses(row, node.offset(), node.end()))
    }

    pub(super) fn change_logical_size(&mut self, row: usize, gb: f64) -> Result<Vec<Notice>, EditError> {
        let position = self.logical_position(row)?;
        let node = self.modified.logical.nodes()[position];
        if node.kind() != PartitionKind::Solaris2 {
            return Err(EditError::NotResizable { kind: node.kind() });
        }

        let new_mb = gb_to_mb(one_decimal(gb));
        if new_mb == 0 {
            return Err(EditError::ZeroSize);
        } else if space::unchanged(new_mb, node.size()) {
            return Ok(Vec::new());
        }

        let geometry = self.geometry;
        if new_mb > node.size() {
            space::absorb(&mut self.modified.logical, position, new_mb - node.size(), false, &geometry)?;

            // Unused logicals that were consumed entirely go away.
            self.modified.logical.retain(|node| !(node.displayed && node.is_free() && node.size() == 0));
            self.modified.logical.normalize_gaps(&geometry);
        } else if let Released::Gap(gap) =
            space::release(&mut self.modified.logical, position, node.size() - new_mb, &geometry)
        {
            self.bind_logical_gap(gap);
        }

        let id = node.partinfo.id;
        let position = self.modified.logical.position_of_id(id).ok_or(EditError::NoSuchLogical { row })?;
        let resized = self.modified.logical.nodes()[position];
        if let Some(node) = self.modified.logical.get_mut(position) {
            node.dirty |= Dirty::SIZE_CHANGED;
        }

        self.sync()?;
        info!("{}: logical row {} resized from {} MB to {} MB", self.name, row, node.size(), new_mb);
        Ok(self.logical_losses(row, node.offset().min(resized.offset()), node.end().max(resized.end())))
    }

    pub(super) fn delete_logical(&mut self, row: usize) -> Result<Vec<Notice>, EditError> {
        let position = self.logical_position(row)?;
        let geometry = self.geometry;
        let list = &mut self.modified.logical;
        let removed = list.remove(position);

        let next = list.get(position).cloned().filter(BlockNode::is_free);
        let prev = if position == 0 { None } else { list.get(position - 1).cloned().filter(BlockNode::is_free) };

        match (next, prev) {
            (Some(next), _) => {
                if let Some(node) = list.get_mut(position) {
                    node.set_extent(removed.offset(), next.end() - removed.offset(), &geometry);
                }
            }
            (None, Some(prev)) => {
                if let Some(node) = list.get_mut(position - 1) {
                    node.set_extent(prev.offset(), removed.end() - prev.offset(), &geometry);
                }
            }
            (None, None) => list.insert(position, BlockNode::gap(removed.offset(), removed.size(), &geometry)),
        }

        list.normalize_gaps(&geometry);
        self.sync()?;

        info!("{}: deleted logical row {} ({} MB at {} MB)", self.name, row, removed.size(), removed.offset());
        Ok(self.logical_losses(row, removed.offset(), removed.end()))
    }

    pub(super) fn create_logical(&mut self, after: Option<usize>) -> Result<Vec<Notice>, EditError> {
        if self.modified_parts.extended().is_none() {
            return Err(EditError::NoExtendedPartition);
        }

        if self.modified.logical.displayed_count() >= LOGICAL_SLOTS {
            return Err(TableError::LogicalSlotsExhausted(LOGICAL_SLOTS).into());
        }

        let list = &self.modified.logical;
        let candidates = match after {
            Some(row) => {
                let position = self.logical_position(row)?;
                position + 1..(position + 2).min(list.len())
            }
            None => 0..list.len(),
        };

        let position = candidates
            .into_iter()
            .find(|&position| {
                let node = &list.nodes()[position];
                node.is_gap() && !is_tiny(node.size())
            })
            .ok_or(EditError::NoFreeSpace)?;

        if let Some(node) = self.modified.logical.get_mut(position) {
            node.displayed = true;
        }

        self.sync()?;
        info!("{}: created logical partition at position {}", self.name, position);
        Ok(Vec::new())
    }

    /// Adds `start..end` to the tail of the logicals after the extended
    /// partition grew forward. A free tail widens, and is shown as a row once
    /// it is large enough.
    pub(super) fn extend_logical_tail(&mut self, start: u64, end: u64) {
        if start >= end {
            return;
        }

        let geometry = self.geometry;
        let last = self.modified.logical.nodes().last().cloned();
        match last {
            Some(ref last) if last.is_free() => {
                let position = self.modified.logical.len() - 1;
                if let Some(node) = self.modified.logical.get_mut(position) {
                    node.set_extent(last.offset(), end - last.offset(), &geometry);
                }
                self.bind_logical_gap(position);
            }
            Some(last) => {
                let node = self.free_logical(last.end(), end - last.end());
                self.modified.logical.push(node);
            }
            None => {
                let node = self.free_logical(start, end - start);
                self.modified.logical.push(node);
            }
        }
    }

    /// Adds `start..end` to the head of the logicals after the extended
    /// partition grew backward.
    pub(super) fn extend_logical_head(&mut self, start: u64, end: u64) {
        if start >= end {
            return;
        }

        let geometry = self.geometry;
        let first = self.modified.logical.nodes().first().cloned();
        match first {
            Some(ref first) if first.is_free() => {
                if let Some(node) = self.modified.logical.get_mut(0) {
                    node.set_extent(start, first.end() - start, &geometry);
                }
                self.bind_logical_gap(0);
            }
            Some(first) => {
                let node = self.free_logical(start, first.offset() - start);
                self.modified.logical.insert(0, node);
            }
            None => {
                let node = self.free_logical(start, end - start);
                self.modified.logical.push(node);
            }
        }
    }

    /// Cuts the logicals back so that none extends past `end`. Free space and
    /// Solaris2 logicals give way, and are dropped once nothing is left of
    /// them; any other logical blocks the shrink.
    pub(super) fn shrink_logical_tail(&mut self, end: u64) -> Result<(), EditError> {
        let geometry = self.geometry;
        let list = &mut self.modified.logical;

        let mut position = list.len();
        while position > 0 {
            position -= 1;
            let node = list.nodes()[position];
            if node.end() <= end {
                break;
            }

            if !node.is_free() && node.kind() != PartitionKind::Solaris2 {
                return Err(EditError::ShrinkBlocked { needed: node.end() - end });
            }

            if let Some(node) = list.get_mut(position) {
                let offset = node.offset();
                node.set_extent(offset, end.saturating_sub(offset), &geometry);
                if node.displayed {
                    node.dirty |= Dirty::SIZE_CHANGED;
                }
            }
        }

        list.retain(|node| node.size() != 0);
        list.unbind_slivers(&geometry);
        Ok(())
    }

    /// Shows the gap at `position` as an unused logical, if it is large
    /// enough to be shown and a logical slot is free.
    fn bind_logical_gap(&mut self, position: usize) {
        let available = self.modified.logical.displayed_count() < LOGICAL_SLOTS;
        if let Some(node) = self.modified.logical.get_mut(position) {
            if node.is_gap() && available && !is_tiny(node.size()) {
                node.displayed = true;
            }
        }
    }

    /// An unused logical covering the given range, or a gap if the range is
    /// too small to show or the logical slots are full. Ids are assigned when
    /// the list is projected.
    fn free_logical(&self, offset: u64, size: u64) -> BlockNode {
        if !is_tiny(size) && self.modified.logical.displayed_count() < LOGICAL_SLOTS {
            BlockNode::bound(PartitionRecord::new(0, PartitionKind::Unused, offset, size, &self.geometry))
        } else {
            BlockNode::gap(offset, size, &self.geometry)
        }
    }

    fn logical_position(&self, row: usize) -> Result<usize, EditError> {
        self.modified.logical.position_of_row(row).ok_or(EditError::NoSuchLogical { row })
    }

    /// A warning if a logical that held data when the session started lies in
    /// `start..end` and is no longer present unchanged.
    fn logical_losses(&self, row: usize, start: u64, end: u64) -> Vec<Notice> {
        if !self.holds_data(start, end) {
            return Vec::new();
        }

        let lost = self
            .original_parts
            .logicals()
            .iter()
            .filter(|slot| !slot.is_empty() && !slot.is_unused() && slot.overlaps(start, end))
            .any(|slot| {
                !self.modified.logical.displayed().any(|(_, node)| {
                    node.kind() == slot.kind && node.offset() == slot.offset_mb && node.size() == slot.size_mb
                })
            });

        if lost {
            vec![Notice::DataLoss { order: FIRST_LOGICAL_ID + row as u8 }]
        } else {
            Vec::new()
        }
    }
}
