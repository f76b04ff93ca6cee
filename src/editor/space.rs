//! Moving megabytes between a node and its neighbours.
//!
//! Every pass works out what it will take from which node before the list is
//! touched. The mutation is then applied in one sweep that recomputes the
//! offsets of the affected run.

use crate::{
    blockorder::{BlockList, BlockNode},
    error::EditError,
};
use disk_types::{is_tiny, DiskGeometry, PartitionKind, TENTH_GB_MB};

/// Megabytes that a grown node took from the nodes after and before it.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Absorbed {
    pub forward:  u64,
    pub backward: u64,
    /// Ids of Solaris2 partitions that were shrunk to make room.
    pub stolen:   Vec<u8>,
}

impl Absorbed {
    pub fn total(&self) -> u64 { self.forward + self.backward }
}

/// Where the megabytes released by a shrinking node ended up.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Released {
    /// The free node at this position grew backwards to take them.
    Merged(usize),
    /// A new gap was inserted at this position.
    Gap(usize),
}

/// True if `requested` megabytes differ from `current` by no more than the
/// truncation of a spinner value.
pub fn unchanged(requested: u64, current: u64) -> bool { requested.max(current) - requested.min(current) <= 1 }

/// How much to take from a free neighbour of `available` megabytes. A
/// remainder that would round to 0.0 GB is taken as well.
fn take_free(available: u64, remaining: u64) -> u64 {
    let amount = available.min(remaining);
    if available > amount && is_tiny(available - amount) {
        available
    } else {
        amount
    }
}

/// Megabytes that may be taken from a Solaris2 neighbour, which always keeps
/// at least a tenth of a gigabyte.
fn spare(node: &BlockNode) -> u64 {
    if node.displayed && node.kind() == PartitionKind::Solaris2 {
        node.size().saturating_sub(TENTH_GB_MB)
    } else {
        0
    }
}

/// Grows the node at `index` by at least `need` megabytes.
///
/// Free nodes after the node are consumed first, then free nodes before it.
/// If `steal` is set and the free space runs out, the Solaris2 partitions
/// bordering the consumed runs are shrunk, forward first. Nodes consumed from
/// the forward side keep their end; nodes consumed from the backward side keep
/// their start.
pub fn absorb(
    list: &mut BlockList,
    index: usize,
    need: u64,
    steal: bool,
    geometry: &DiskGeometry,
) -> Result<Absorbed, EditError> {
    let mut takes: Vec<(usize, u64)> = Vec::new();
    let mut absorbed = Absorbed::default();
    let mut remaining = need;

    let (forward_stop, backward_stop) = {
        let nodes = list.nodes();

        let mut forward = index + 1;
        while remaining > 0 && forward < nodes.len() && nodes[forward].is_free() {
            let amount = take_free(nodes[forward].size(), remaining);
            takes.push((forward, amount));
            absorbed.forward += amount;
            remaining = remaining.saturating_sub(amount);
            forward += 1;
        }

        let mut backward = index;
        while remaining > 0 && backward > 0 && nodes[backward - 1].is_free() {
            backward -= 1;
            let amount = take_free(nodes[backward].size(), remaining);
            takes.push((backward, amount));
            absorbed.backward += amount;
            remaining = remaining.saturating_sub(amount);
        }

        if steal && remaining > 0 && forward < nodes.len() {
            let amount = spare(&nodes[forward]).min(remaining);
            if amount != 0 {
                takes.push((forward, amount));
                absorbed.forward += amount;
                absorbed.stolen.push(nodes[forward].partinfo.id);
                remaining -= amount;
            }
        }

        if steal && remaining > 0 && backward > 0 {
            let amount = spare(&nodes[backward - 1]).min(remaining);
            if amount != 0 {
                takes.push((backward - 1, amount));
                absorbed.backward += amount;
                absorbed.stolen.push(nodes[backward - 1].partinfo.id);
                remaining -= amount;
            }
        }

        (forward, backward)
    };

    if remaining > 0 {
        return Err(EditError::InsufficientSpace { needed: need, available: need - remaining });
    }

    let first = takes.iter().map(|&(position, _)| position).fold(index, usize::min);
    let last = takes.iter().map(|&(position, _)| position).fold(index, usize::max);
    let extents = (first..=last)
        .filter_map(|position| list.get(position).map(|node| (node.offset(), node.size())))
        .collect::<Vec<(u64, u64)>>();

    let mut sizes = extents.iter().map(|&(_, size)| size).collect::<Vec<u64>>();
    for &(position, amount) in &takes {
        sizes[position - first] -= amount;
    }
    sizes[index - first] += absorbed.total();

    reflow(list, first, &extents, &sizes, geometry);
    list.normalize_gaps(geometry);

    debug!(
        "absorbed {} MB ({} forward to {}, {} backward to {})",
        absorbed.total(),
        absorbed.forward,
        forward_stop,
        absorbed.backward,
        backward_stop
    );

    Ok(absorbed)
}

/// Lays out the run of nodes starting at `first` with new sizes, keeping the
/// run's start and any holes between its nodes.
fn reflow(list: &mut BlockList, first: usize, extents: &[(u64, u64)], sizes: &[u64], geometry: &DiskGeometry) {
    let mut cursor = match extents.first() {
        Some(&(offset, _)) => offset,
        None => return,
    };

    for (step, (&(offset, _), &size)) in extents.iter().zip(sizes).enumerate() {
        if step > 0 {
            let (prev_offset, prev_size) = extents[step - 1];
            cursor += offset.saturating_sub(prev_offset + prev_size);
        }

        if let Some(node) = list.get_mut(first + step) {
            node.set_extent(cursor, size, geometry);
        }

        cursor += size;
    }
}

/// Shrinks the node at `index` by `amount` megabytes, releasing them at its
/// end.
///
/// A following gap, or a following unused row that starts where the node
/// ended, grows backwards over the released space. Otherwise a new gap is
/// inserted after the node.
pub fn release(list: &mut BlockList, index: usize, amount: u64, geometry: &DiskGeometry) -> Released {
    let (offset, end) = match list.get(index) {
        Some(node) => (node.offset(), node.end()),
        None => return Released::Gap(index),
    };

    let amount = amount.min(end - offset);
    let new_end = end - amount;
    if let Some(node) = list.get_mut(index) {
        node.set_extent(offset, new_end - offset, geometry);
    }

    let next = list.get(index + 1).cloned();
    match next {
        Some(ref next) if next.is_gap() || (next.is_free() && next.offset() == end) => {
            if let Some(node) = list.get_mut(index + 1) {
                node.set_extent(new_end, next.end() - new_end, geometry);
            }
            Released::Merged(index + 1)
        }
        _ => {
            list.insert(index + 1, BlockNode::gap(new_end, amount, geometry));
            Released::Gap(index + 1)
        }
    }
}

/// Megabytes held by the runs of free nodes on either side of `index`.
pub fn adjacent_free(list: &BlockList, index: usize) -> u64 {
    let nodes = list.nodes();
    if index >= nodes.len() {
        return 0;
    }

    let after = nodes[index + 1..].iter().take_while(|node| node.is_free()).map(BlockNode::size).sum::<u64>();
    let before = nodes[..index].iter().rev().take_while(|node| node.is_free()).map(BlockNode::size).sum::<u64>();
    after + before
}

/// The size that the node at `index` could reach without touching another
/// partition: its own size, plus the free space beside it if the node is of a
/// type that can grow.
///
/// `pending` is the type that the node is being changed to, for callers that
/// need the answer before the change is applied.
pub fn calculate_avail_space(list: &BlockList, index: usize, pending: Option<PartitionKind>) -> u64 {
    let node = match list.get(index) {
        Some(node) => node,
        None => return 0,
    };

    let kind = pending.unwrap_or_else(|| node.kind());
    if kind.is_unused() || kind.is_resizable() {
        node.size() + adjacent_free(list, index)
    } else {
        node.size()
    }
}

/// Megabytes that growing the node at `index` could take from the Solaris2
/// partitions bordering its free runs.
pub fn stealable(list: &BlockList, index: usize) -> u64 {
    let nodes = list.nodes();
    if index >= nodes.len() {
        return 0;
    }

    let forward = nodes[index + 1..].iter().find(|node| !node.is_free()).map_or(0, spare);
    let backward = nodes[..index].iter().rev().find(|node| !node.is_free()).map_or(0, spare);
    forward + backward
}

#[cfg(test)]
mod tests {
    use super::*;
    use disk_types::{gb_to_mb, round_mb_to_gb, ForeignKind, PartitionRecord};

    fn disk() -> DiskGeometry { DiskGeometry::from_mb(20480) }

    fn bound(id: u8, kind: PartitionKind, offset: u64, size: u64) -> BlockNode {
        BlockNode::bound(PartitionRecord::new(id, kind, offset, size, &disk()))
    }

    fn extents(list: &BlockList) -> Vec<(u8, u64, u64)> {
        list.iter().map(|node| (node.partinfo.id, node.offset(), node.size())).collect()
    }

    fn list(nodes: Vec<BlockNode>) -> BlockList {
        let mut list = BlockList::new();
        for node in nodes {
            list.push(node);
        }
        list
    }

    #[test]
    fn grow_takes_free_space_forward_first() {
        let mut list = list(vec![
            BlockNode::gap(0, 2048, &disk()),
            bound(1, PartitionKind::Solaris2, 2048, 4096),
            BlockNode::gap(6144, 14336, &disk()),
        ]);

        let absorbed = absorb(&mut list, 1, 4096, true, &disk()).unwrap();
        assert_eq!((absorbed.forward, absorbed.backward), (4096, 0));
        assert!(absorbed.stolen.is_empty());
        assert_eq!(extents(&list), vec![(0, 0, 2048), (1, 2048, 8192), (0, 10240, 10240)]);
    }

    #[test]
    fn grow_falls_back_to_free_space_behind() {
        let mut list = list(vec![
            BlockNode::gap(0, 4096, &disk()),
            bound(1, PartitionKind::Solaris2, 4096, 14336),
            BlockNode::gap(18432, 2048, &disk()),
        ]);

        let absorbed = absorb(&mut list, 1, 3072, true, &disk()).unwrap();
        assert_eq!((absorbed.forward, absorbed.backward), (2048, 1024));
        assert_eq!(extents(&list), vec![(0, 0, 3072), (1, 3072, 17408)]);
        assert_eq!(list.get(1).map(|n| n.partinfo.offset_sec), Some(3072 * 2048));
    }

    #[test]
    fn grow_steals_from_solaris_neighbour() {
        let mut list = list(vec![bound(1, PartitionKind::Solaris2, 0, 20480), bound(2, PartitionKind::Solaris2, 20480, 0)]);

        let absorbed = absorb(&mut list, 1, TENTH_GB_MB, true, &disk()).unwrap();
        assert_eq!(absorbed.stolen, vec![1]);
        assert_eq!(extents(&list), vec![(1, 0, 20378), (2, 20378, 102)]);
    }

    #[test]
    fn grow_without_stealing_fails() {
        let mut list = list(vec![bound(1, PartitionKind::Solaris2, 0, 20480), bound(2, PartitionKind::Solaris2, 20480, 0)]);
        let before = list.clone();

        let result = absorb(&mut list, 1, TENTH_GB_MB, false, &disk());
        assert_eq!(result, Err(EditError::InsufficientSpace { needed: 102, available: 0 }));
        assert_eq!(list, before);
    }

    #[test]
    fn foreign_neighbours_are_never_taken_from() {
        let ntfs = PartitionKind::Foreign(ForeignKind::Ntfs);
        let mut list = list(vec![bound(1, ntfs, 0, 10240), bound(2, PartitionKind::Solaris2, 10240, 10240)]);
        let result = absorb(&mut list, 1, 1024, true, &disk());
        assert_eq!(result, Err(EditError::InsufficientSpace { needed: 1024, available: 0 }));
    }

    #[test]
    fn tiny_remainders_are_collapsed() {
        let mut list = list(vec![bound(1, PartitionKind::Solaris2, 0, 10240), BlockNode::gap(10240, 10240, &disk())]);

        let absorbed = absorb(&mut list, 0, 10200, true, &disk()).unwrap();
        assert_eq!(absorbed.forward, 10240);
        assert_eq!(extents(&list), vec![(1, 0, 20480)]);
    }

    #[test]
    fn shrink_merges_into_unused_row() {
        let mut list = list(vec![bound(1, PartitionKind::Solaris2, 0, 10240), bound(2, PartitionKind::Unused, 10240, 10240)]);

        assert_eq!(release(&mut list, 0, 2048, &disk()), Released::Merged(1));
        assert_eq!(extents(&list), vec![(1, 0, 8192), (2, 8192, 12288)]);
    }

    #[test]
    fn shrink_inserts_gap_before_partition() {
        let mut list = list(vec![bound(5, PartitionKind::Solaris2, 0, 3123), bound(6, PartitionKind::Solaris2, 3123, 3072)]);

        assert_eq!(release(&mut list, 0, 51, &disk()), Released::Gap(1));
        assert_eq!(extents(&list), vec![(5, 0, 3072), (0, 3072, 51), (6, 3123, 3072)]);
        assert!(list.get(1).map_or(false, BlockNode::is_gap));
    }

    #[test]
    fn spinner_truncation_is_not_a_change() {
        assert!(unchanged(gb_to_mb(round_mb_to_gb(20378)), 20378));
        assert!(unchanged(3072, 3072));
        assert!(!unchanged(gb_to_mb(3.0), 3123));
        assert!(!unchanged(20375, 20378));
    }

    #[test]
    fn avail_space() {
        let ntfs = PartitionKind::Foreign(ForeignKind::Ntfs);
        let list = list(vec![
            BlockNode::gap(0, 1024, &disk()),
            bound(1, PartitionKind::Solaris2, 1024, 4096),
            BlockNode::gap(5120, 1024, &disk()),
            bound(2, PartitionKind::Unused, 6144, 2048),
            bound(3, ntfs, 8192, 12288),
        ]);

        assert_eq!(calculate_avail_space(&list, 1, None), 8192);
        assert_eq!(calculate_avail_space(&list, 3, None), 3072);
        assert_eq!(calculate_avail_space(&list, 4, None), 12288);
        assert_eq!(calculate_avail_space(&list, 4, Some(PartitionKind::Solaris2)), 12288 + 3072);
        assert_eq!(calculate_avail_space(&list, 9, None), 0);
        assert_eq!(stealable(&list, 3), 4096 - TENTH_GB_MB);
        assert_eq!(stealable(&list, 1), 0);
    }
}
