use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::{multi_index::MultiIndexSet, navigation::{SiblingPair, SiblingPairs, TreeNavigator}};

///
/// Correspondence between the entries of a right sibling block and the entries
/// of its left sibling block.
///
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProjectionMask
{
    /// The right block is a single entry, matching the first entry on the left.
    SinglePoint,
    /// Both blocks have equal size and correspond one to one.
    Identity,
    /// `indices[i]` is the offset in the left block matching entry `i` on the right.
    Indices(Vec<usize>),
}

impl ProjectionMask
{
    ///
    /// Offset within the left block of entry `i` of the right block.
    ///
    #[inline]
    pub fn project(&self, i: usize) -> usize
    {
        match self
        {
            ProjectionMask::SinglePoint => 0,
            ProjectionMask::Identity => i,
            ProjectionMask::Indices(indices) => indices[i],
        }
    }
}

#[inline]
fn pack_key(dim: usize, left: usize, right: usize) -> u64
{
    assert!(dim < 1 << 16 && left < 1 << 24 && right < 1 << 24, "mask key out of range: dimension {dim}, nodes ({left}, {right})");
    ((dim as u64) << 48) | ((left as u64) << 24) | right as u64
}

///
/// All masks of one multi-index tree, keyed by `(dim, left, right)` for every
/// pair of sibling nodes `left < right` in dimension `dim`.
///
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectionMasks
{
    masks: FxHashMap<u64, ProjectionMask>,
}

impl ProjectionMasks
{
    pub fn len(&self) -> usize
    {
        self.masks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool
    {
        self.masks.is_empty()
    }

    pub fn try_get(&self, dim: usize, left: usize, right: usize) -> Option<&ProjectionMask>
    {
        self.masks.get(&pack_key(dim, left, right))
    }

    ///
    /// Panics when the pair was never compiled: the tree tables and the mask table
    /// are out of sync, or the multi-index set was not downward-closed.
    ///
    #[inline]
    pub fn get(&self, dim: usize, left: usize, right: usize) -> &ProjectionMask
    {
        match self.try_get(dim, left, right)
        {
            Some(mask) => mask,
            None => panic!("missing precomputed mask for dimension {dim}, nodes ({left}, {right})"),
        }
    }

    fn insert(&mut self, dim: usize, left: usize, right: usize, mask: ProjectionMask)
    {
        self.masks.insert(pack_key(dim, left, right), mask);
    }
}

///
/// Mask between sibling nodes `left` and `right` of dimension `dim`.
///
/// Only leaves whose exponents in dimensions `0..=dim` agree are paired; every
/// right leaf has such a partner on the left since the set is downward-closed,
/// and both are left-aligned so entry `i` of one maps to entry `i` of the other.
///
pub fn compute_projection_mask(navigator: &TreeNavigator, dim: usize, left: usize, right: usize, multi_index: &MultiIndexSet) -> ProjectionMask
{
    let size_right = navigator.node_size(dim, right);
    if size_right == 1
    {
        return ProjectionMask::SinglePoint;
    }
    let size_left = navigator.node_size(dim, left);
    if size_left == size_right
    {
        return ProjectionMask::Identity;
    }

    let mut mask = Vec::with_capacity(size_right);
    let (leaf_positions_l, leaf_sizes_l) = navigator.leaves(dim, left);
    let (leaf_positions_r, leaf_sizes_r) = navigator.leaves(dim, right);
    let prefix_matches = |pos_l: usize, pos_r: usize| (0..=dim).all(|d| multi_index.exponent(d, pos_l) == multi_index.exponent(d, pos_r));

    let mut leaf_r = 0;
    let mut offset_l = 0;
    for (&pos_l, &size_l) in leaf_positions_l.iter().zip(leaf_sizes_l)
    {
        if prefix_matches(pos_l, leaf_positions_r[leaf_r])
        {
            mask.extend(offset_l..offset_l + leaf_sizes_r[leaf_r]);
            leaf_r += 1;
            if leaf_r == leaf_positions_r.len()
            {
                break;
            }
        }
        offset_l += size_l;
    }
    assert_eq!(mask.len(), size_right, "unmatched leaves in dimension {dim}, nodes ({left}, {right})");
    ProjectionMask::Indices(mask)
}

///
/// Masks for every sibling pair of every parent above dimension 0.
///
pub fn precompute_masks(navigator: &TreeNavigator, multi_index: &MultiIndexSet) -> ProjectionMasks
{
    let mut masks = ProjectionMasks::default();
    for SiblingPair { dim, left, right } in SiblingPairs::new(*navigator)
    {
        let mask = compute_projection_mask(navigator, dim, left, right, multi_index);
        masks.insert(dim, left, right, mask);
    }
    masks
}

#[cfg(test)]
fn tables(multi_index: &MultiIndexSet) -> (Vec<Vec<usize>>, Vec<Vec<usize>>)
{
    let splits = crate::tree::compile_splits(multi_index);
    let sizes = crate::tree::compile_subtree_sizes(multi_index.len(), &splits);
    (splits, sizes)
}

#[test]
fn test_two_dimensional_masks()
{
    let multi_index = MultiIndexSet::from_lp_degree(2, 2, 1.0).unwrap();
    let (splits, sizes) = tables(&multi_index);
    let nav = TreeNavigator::new(&splits, &sizes);
    let masks = precompute_masks(&nav, &multi_index);
    assert_eq!(masks.len(), 3);
    assert_eq!(masks.get(0, 0, 1), &ProjectionMask::Indices(vec![0, 1]));
    assert_eq!(masks.get(0, 0, 2), &ProjectionMask::SinglePoint);
    assert_eq!(masks.get(0, 1, 2), &ProjectionMask::SinglePoint);
}

#[test]
fn test_masks_skip_unmatched_left_leaves()
{
    // Three dimensions, total degree 2. In dimension 1 the parent at x2 = 0 has
    // children x1 = 0 (leaves x0 = 0..=2), x1 = 1 (x0 = 0..=1), x1 = 2 (x0 = 0).
    let multi_index = MultiIndexSet::from_lp_degree(3, 2, 1.0).unwrap();
    let (splits, sizes) = tables(&multi_index);
    let nav = TreeNavigator::new(&splits, &sizes);
    let masks = precompute_masks(&nav, &multi_index);
    // dimension 1: node 0 spans 6 columns, node 1 spans 3 (x2 = 1), node 2 spans 1 (x2 = 2)
    assert_eq!(sizes[1], vec![6, 3, 1]);
    // matching leaves: x1 = 0 -> offset 0..2, x1 = 1 -> offset 3
    assert_eq!(masks.get(1, 0, 1), &ProjectionMask::Indices(vec![0, 1, 3]));
    assert_eq!(masks.get(1, 0, 2), &ProjectionMask::SinglePoint);

    for dim in 0..2
    {
        for left in 0..nav.num_nodes(dim)
        {
            for right in left + 1..nav.num_nodes(dim)
            {
                if let Some(ProjectionMask::Indices(indices)) = masks.try_get(dim, left, right)
                {
                    assert_eq!(indices.len(), nav.node_size(dim, right));
                    assert!(indices.iter().all(|&i| i < nav.node_size(dim, left)));
                }
            }
        }
    }
}

#[test]
#[should_panic(expected = "mask key out of range")]
fn test_pack_key_rejects_large_nodes()
{
    pack_key(0, 0, 1 << 24);
}

#[test]
fn test_pack_key_distinguishes_fields()
{
    let max = (1 << 24) - 1;
    assert_ne!(pack_key(0, 0, max), pack_key(0, 1, 0));
    assert_ne!(pack_key(0, max, 0), pack_key(1, 0, 0));
}

#[test]
#[should_panic(expected = "missing precomputed mask")]
fn test_missing_mask_panics()
{
    let masks = ProjectionMasks::default();
    masks.get(0, 0, 1);
}
