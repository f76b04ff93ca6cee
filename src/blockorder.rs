//! The block-order view: the partitions of a region in on-disk order, with
//! unallocated space represented by explicit gap nodes.

use disk_types::{is_tiny, DiskGeometry, PartitionKind, PartitionRecord, TENTH_GB_MB};
use std::slice;

bitflags! {
    /// Pending changes that drive the data-loss warnings.
    #[derive(Default)]
    pub struct Dirty: u8 {
        const SIZE_CHANGED = 0b001;
        const TYPE_CHANGED = 0b010;
        /// Armed until the first resize of an extended partition, which wipes
        /// its logicals.
        const INITIAL_SIZE_CHANGE = 0b100;
    }
}

/// How a node relates to the partition table.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Binding {
    /// Bound to the table slot with this id, and shown as a row.
    Displayed(u8),
    /// Unallocated space that is not bound to any slot.
    Gap,
}

/// One entry of a block-order list.
#[derive(Debug, Clone, Copy, PartialEq, new)]
pub struct BlockNode {
    pub partinfo:  PartitionRecord,
    pub displayed: bool,
    #[new(default)]
    pub dirty:     Dirty,
}

impl BlockNode {
    /// A node bound to the table slot described by `partinfo`.
    pub fn bound(partinfo: PartitionRecord) -> BlockNode { BlockNode::new(partinfo, true) }

    /// An unbound gap covering `offset_mb..offset_mb + size_mb`.
    pub fn gap(offset_mb: u64, size_mb: u64, geometry: &DiskGeometry) -> BlockNode {
        BlockNode::new(PartitionRecord::new(0, PartitionKind::Unused, offset_mb, size_mb, geometry), false)
    }

    pub fn binding(&self) -> Binding {
        if self.displayed {
            Binding::Displayed(self.partinfo.id)
        } else {
            Binding::Gap
        }
    }

    pub fn is_gap(&self) -> bool { !self.displayed }

    /// True if the node's space may be handed to a neighbour: gaps and
    /// unused rows.
    pub fn is_free(&self) -> bool { self.partinfo.is_unused() }

    /// True for an unused row that holds some space, but less than the
    /// smallest partition the editor creates.
    pub fn is_sliver(&self) -> bool {
        self.displayed && self.is_free() && self.size() != 0 && self.size() < TENTH_GB_MB
    }

    pub fn kind(&self) -> PartitionKind { self.partinfo.kind }

    pub fn offset(&self) -> u64 { self.partinfo.offset_mb }

    pub fn size(&self) -> u64 { self.partinfo.size_mb }

    pub fn end(&self) -> u64 { self.partinfo.end_mb() }

    /// Moves the node, touching the sector fields only if the extent changed.
    pub(crate) fn set_extent(&mut self, offset_mb: u64, size_mb: u64, geometry: &DiskGeometry) {
        if offset_mb != self.offset() || size_mb != self.size() {
            self.partinfo.set_extent(offset_mb, size_mb, geometry);
        }
    }
}

/// An ordered sequence of block nodes.
///
/// The list is an arena: a node's index is its position, and the node that
/// follows it on disk is at the next index.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct BlockList {
    nodes: Vec<BlockNode>,
}

impl BlockList {
    pub fn new() -> BlockList { BlockList::default() }

    pub fn len(&self) -> usize { self.nodes.len() }

    pub fn is_empty(&self) -> bool { self.nodes.is_empty() }

    pub fn iter(&self) -> slice::Iter<BlockNode> { self.nodes.iter() }

    pub fn nodes(&self) -> &[BlockNode] { &self.nodes }

    pub fn get(&self, index: usize) -> Option<&BlockNode> { self.nodes.get(index) }

    pub(crate) fn get_mut(&mut self, index: usize) -> Option<&mut BlockNode> { self.nodes.get_mut(index) }

    pub(crate) fn iter_mut(&mut self) -> slice::IterMut<BlockNode> { self.nodes.iter_mut() }

    pub(crate) fn push(&mut self, node: BlockNode) { self.nodes.push(node); }

    pub(crate) fn insert(&mut self, index: usize, node: BlockNode) { self.nodes.insert(index, node); }

    pub(crate) fn remove(&mut self, index: usize) -> BlockNode { self.nodes.remove(index) }

    pub(crate) fn retain<F: FnMut(&BlockNode) -> bool>(&mut self, func: F) { self.nodes.retain(func); }

    /// Bound nodes with their list positions, in row order.
    pub fn displayed<'a>(&'a self) -> impl Iterator<Item = (usize, &'a BlockNode)> + 'a {
        self.nodes.iter().enumerate().filter(|(_, node)| node.displayed)
    }

    pub fn displayed_count(&self) -> usize { self.nodes.iter().filter(|node| node.displayed).count() }

    /// List position of the `row`th bound node.
    pub fn position_of_row(&self, row: usize) -> Option<usize> {
        self.displayed().nth(row).map(|(index, _)| index)
    }

    /// List position of the bound node with the given slot id.
    pub fn position_of_id(&self, id: u8) -> Option<usize> {
        self.nodes.iter().position(|node| node.displayed && node.partinfo.id == id)
    }

    /// Sum of every node's size, gaps included.
    pub fn total_mb(&self) -> u64 { self.nodes.iter().map(BlockNode::size).sum() }

    /// Drops empty gaps and merges gaps that became neighbours, so that at
    /// most one gap separates two bound nodes.
    pub(crate) fn normalize_gaps(&mut self, geometry: &DiskGeometry) {
        self.nodes.retain(|node| node.displayed || node.size() != 0);

        let mut index = 1;
        while index < self.nodes.len() {
            if self.nodes[index - 1].is_gap() && self.nodes[index].is_gap() {
                let next = self.nodes.remove(index);
                let prev = &mut self.nodes[index - 1];
                let offset = prev.offset();
                prev.set_extent(offset, next.end() - offset, geometry);
            } else {
                index += 1;
            }
        }
    }

    /// Removes gaps that would display as 0.0 GB.
    /// Unbinds unused rows that are too small to show, merging them into the
    /// gaps beside them.
    pub(crate) fn unbind_slivers(&mut self, geometry: &DiskGeometry) {
        for node in self.nodes.iter_mut().filter(|node| node.is_sliver()) {
            debug!("unbinding {} MB unused row at {} MB", node.size(), node.offset());
            *node = BlockNode::gap(node.offset(), node.size(), geometry);
        }
        self.normalize_gaps(geometry);
    }

    pub(crate) fn drop_tiny_gaps(&mut self) {
        self.nodes.retain(|node| node.displayed || !is_tiny(node.size()));
    }
}

impl<'a> IntoIterator for &'a BlockList {
    type Item = &'a BlockNode;
    type IntoIter = slice::Iter<'a, BlockNode>;

    fn into_iter(self) -> Self::IntoIter { self.nodes.iter() }
}
