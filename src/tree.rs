use std::io::Write;

use serde::{Deserialize, Serialize};

use crate::{errors::DDSError, masks::{precompute_masks, ProjectionMasks}, multi_index::MultiIndexSet, navigation::TreeNavigator};

///
/// Positions in one exponent row where a new block starts: a zero directly
/// after a non-zero entry. Position 0 is always a split, and the splits of the
/// dimension above are carried over.
///
fn find_splits(exponent_row: &[u32], previous_splits: &[usize]) -> Vec<usize>
{
    let mut splits = previous_splits.to_vec();
    let mut previous_non_zero = true;
    for (i, &exponent) in exponent_row.iter().enumerate()
    {
        if exponent == 0
        {
            if previous_non_zero
            {
                splits.push(i);
                previous_non_zero = false;
            }
        }
        else
        {
            previous_non_zero = true;
        }
    }
    splits.sort_unstable();
    splits.dedup();
    splits
}

///
/// Split positions for every dimension, computed from the highest dimension
/// (a single root at position 0) downwards.
///
pub fn compile_splits(multi_index: &MultiIndexSet) -> Vec<Vec<usize>>
{
    let ndim = multi_index.spatial_dimension();
    let mut splits = vec![Vec::new(); ndim];
    splits[ndim - 1] = vec![0];
    for dim in (0..ndim - 1).rev()
    {
        splits[dim] = find_splits(multi_index.row(dim), &splits[dim + 1]);
    }
    splits
}

///
/// Block sizes aligned with the split positions of each dimension.
///
pub fn compile_subtree_sizes(total_count: usize, splits: &[Vec<usize>]) -> Vec<Vec<usize>>
{
    splits.iter().map(|row|
    {
        assert_eq!(row.first(), Some(&0), "the first split must be at position 0");
        let mut sizes: Vec<usize> = row.windows(2).map(|w| w[1] - w[0]).collect();
        sizes.push(total_count - row[row.len() - 1]);
        sizes
    }).collect()
}

///
/// Every node of dimension `dim` must hold a single exponent of each higher
/// dimension. The split rule only opens a block at a zero following a non-zero,
/// so some downward-closed sets end up with blocks merged across a higher
/// dimension: with `p = 0.5` the indices `(0, 1)` and `(0, 2)` share one leaf.
///
pub fn check_blocks(multi_index: &MultiIndexSet, splits: &[Vec<usize>]) -> Result<(), DDSError>
{
    let ndim = multi_index.spatial_dimension();
    for (dim, positions) in splits.iter().enumerate()
    {
        for i in 1..multi_index.len()
        {
            if positions.binary_search(&i).is_ok()
            {
                continue;
            }
            if (dim + 1..ndim).any(|above| multi_index.exponent(above, i) != multi_index.exponent(above, i - 1))
            {
                tracing::debug!(dim, position = i, "block spans several exponents of a higher dimension");
                return Err(DDSError::MergedBlocks);
            }
        }
    }
    Ok(())
}

///
/// The implicit tree over a lexicographically ordered, downward-closed
/// multi-index set. Built once per set and shared read-only by every DDS run.
///
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MultiIndexTree
{
    split_positions: Vec<Vec<usize>>,
    subtree_sizes: Vec<Vec<usize>>,
    masks: ProjectionMasks,
}

impl MultiIndexTree
{
    ///
    /// Build the split, size and mask tables. The set is trusted to have passed
    /// [`MultiIndexSet::validated`].
    ///
    pub fn new(multi_index: &MultiIndexSet) -> Self
    {
        let split_positions = compile_splits(multi_index);
        let subtree_sizes = compile_subtree_sizes(multi_index.len(), &split_positions);
        let masks = precompute_masks(&TreeNavigator::new(&split_positions, &subtree_sizes), multi_index);
        tracing::debug!(
            dimensions = multi_index.spatial_dimension(),
            indices = multi_index.len(),
            leaves = split_positions[0].len(),
            masks = masks.len(),
            "built multi-index tree"
        );
        Self { split_positions, subtree_sizes, masks }
    }

    pub fn navigator(&self) -> TreeNavigator<'_>
    {
        TreeNavigator::new(&self.split_positions, &self.subtree_sizes)
    }

    pub fn split_positions(&self) -> &[Vec<usize>]
    {
        &self.split_positions
    }

    pub fn subtree_sizes(&self) -> &[Vec<usize>]
    {
        &self.subtree_sizes
    }

    pub fn masks(&self) -> &ProjectionMasks
    {
        &self.masks
    }

    #[inline]
    pub fn num_dimensions(&self) -> usize
    {
        self.split_positions.len()
    }

    /// Number of multi-indices covered by the root.
    #[inline]
    pub fn len(&self) -> usize
    {
        self.subtree_sizes.last().map(|s| s[0]).unwrap_or(0)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool
    {
        self.len() == 0
    }

    ///
    /// Serializes the tree with bincode and compresses it with lz4.
    ///
    pub fn to_bytes(&self) -> Result<Vec<u8>, DDSError>
    {
        let bytes = bincode::serde::encode_to_vec(self, bincode::config::standard()).map_err(|_| DDSError::SerializationFailed)?;
        Ok(lz4_flex::compress_prepend_size(&bytes))
    }

    ///
    /// Saves tree to file...
    ///
    pub fn save(&self, path: &str) -> Result<(), DDSError>
    {
        let mut file = std::io::BufWriter::new(std::fs::File::create(path).map_err(|_| DDSError::FileIOError)?);
        file.write_all(&self.to_bytes()?).map_err(|_| DDSError::WriteBufferFailed)?;
        Ok(())
    }

    ///
    /// Reads tree from buffer produced by [`MultiIndexTree::to_bytes`].
    ///
    pub fn read_buffer(buffer: &[u8]) -> Result<Self, DDSError>
    {
        let buffer = lz4_flex::decompress_size_prepended(buffer).map_err(|_| DDSError::LZ4DecompressionFailed)?;
        let (tree, _) = bincode::serde::decode_from_slice(&buffer, bincode::config::standard()).map_err(|_| DDSError::DeserializationFailed)?;
        Ok(tree)
    }

    pub fn read<Reader: std::io::Read>(mut reader: Reader) -> Result<Self, DDSError>
    {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes).map_err(|_| DDSError::ReadBufferFailed)?;
        Self::read_buffer(&bytes)
    }
}

#[test]
fn test_splits_two_dimensions()
{
    let multi_index = MultiIndexSet::from_lp_degree(2, 2, 1.0).unwrap();
    let splits = compile_splits(&multi_index);
    assert_eq!(splits, vec![vec![0, 3, 5], vec![0]]);
    let sizes = compile_subtree_sizes(multi_index.len(), &splits);
    assert_eq!(sizes, vec![vec![3, 2, 1], vec![6]]);
}

#[test]
fn test_splits_propagate_downwards()
{
    let multi_index = MultiIndexSet::from_lp_degree(3, 2, 1.0).unwrap();
    let splits = compile_splits(&multi_index);
    // positions 6 and 9 carry over from dimension 1 although row 0 has no
    // zero-after-non-zero there
    assert_eq!(splits[2], vec![0]);
    assert_eq!(splits[1], vec![0, 6, 9]);
    assert_eq!(splits[0], vec![0, 3, 5, 6, 8, 9]);
}

#[test]
fn test_tree_invariants()
{
    for (ndim, degree, lp) in [(1, 4, 1.0), (2, 3, 2.0), (3, 3, 1.0), (4, 2, f64::INFINITY)]
    {
        let multi_index = MultiIndexSet::from_lp_degree(ndim, degree, lp).unwrap();
        let tree = MultiIndexTree::new(&multi_index);
        assert_eq!(tree.len(), multi_index.len());
        assert_eq!(tree.subtree_sizes()[ndim - 1], vec![multi_index.len()]);
        for (splits, sizes) in tree.split_positions().iter().zip(tree.subtree_sizes())
        {
            assert_eq!(splits[0], 0);
            assert!(splits.windows(2).all(|w| w[0] < w[1]));
            assert_eq!(sizes.iter().sum::<usize>(), multi_index.len());
        }
    }
}

#[test]
fn test_single_index_tree()
{
    let multi_index = MultiIndexSet::from_lp_degree(3, 0, 1.0).unwrap();
    let tree = MultiIndexTree::new(&multi_index);
    assert_eq!(tree.split_positions(), &[vec![0], vec![0], vec![0]]);
    assert!(tree.masks().is_empty());
}

#[test]
fn test_tree_buffer_roundtrip()
{
    let multi_index = MultiIndexSet::from_lp_degree(3, 3, 2.0).unwrap();
    let tree = MultiIndexTree::new(&multi_index);
    let bytes = tree.to_bytes().unwrap();
    let restored = MultiIndexTree::read(bytes.as_slice()).unwrap();
    assert_eq!(tree, restored);
    assert_eq!(MultiIndexTree::read_buffer(&[1, 2, 3]), Err(DDSError::LZ4DecompressionFailed));
}

#[test]
fn test_tree_file_roundtrip()
{
    let multi_index = crate::multi_index::union_of_boxes(&[vec![3, 2, 1], vec![1, 1, 3]]);
    let tree = MultiIndexTree::new(&multi_index);
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tree.bin");
    tree.save(path.to_str().unwrap()).unwrap();
    let restored = MultiIndexTree::read(std::fs::File::open(&path).unwrap()).unwrap();
    assert_eq!(tree, restored);
    assert_eq!(tree.save(dir.path().join("missing").join("tree.bin").to_str().unwrap()), Err(DDSError::FileIOError));
}

#[test]
fn test_check_blocks()
{
    let merged = MultiIndexSet::from_lp_degree(2, 2, 0.5).unwrap();
    let splits = compile_splits(&merged);
    // (2, 0) | (0, 1), (0, 2): the second leaf spans x1 = 1 and x1 = 2
    assert_eq!(splits, vec![vec![0, 3], vec![0]]);
    assert_eq!(check_blocks(&merged, &splits), Err(DDSError::MergedBlocks));

    let total_degree = MultiIndexSet::from_lp_degree(3, 3, 1.0).unwrap();
    assert_eq!(check_blocks(&total_degree, &compile_splits(&total_degree)), Ok(()));
}
