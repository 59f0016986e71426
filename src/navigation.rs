///
/// Index arithmetic over the implicit multi-index tree. A node is the pair
/// `(dim, node)` where `node` indexes into `split_positions[dim]`; no node
/// objects are ever built.
///
/// Out-of-range dimensions or node indices are programming errors and panic.
///
#[derive(Clone, Copy)]
pub struct TreeNavigator<'a>
{
    split_positions: &'a [Vec<usize>],
    subtree_sizes: &'a [Vec<usize>],
}

impl<'a> TreeNavigator<'a>
{
    pub fn new(split_positions: &'a [Vec<usize>], subtree_sizes: &'a [Vec<usize>]) -> Self
    {
        assert_eq!(split_positions.len(), subtree_sizes.len(), "split and size tables differ in dimension count");
        Self { split_positions, subtree_sizes }
    }

    #[inline]
    pub fn num_dimensions(&self) -> usize
    {
        self.split_positions.len()
    }

    #[inline]
    pub fn num_nodes(&self, dim: usize) -> usize
    {
        self.layer(dim).len()
    }

    #[inline]
    fn layer(&self, dim: usize) -> &'a [usize]
    {
        assert!(dim < self.split_positions.len(), "dimension {dim} out of range ({} dimensions)", self.split_positions.len());
        &self.split_positions[dim]
    }

    #[inline]
    fn check_node(&self, dim: usize, node: usize)
    {
        let nodes = self.num_nodes(dim);
        assert!(node < nodes, "node {node} out of range in dimension {dim} ({nodes} nodes)");
    }

    /// First column of the node's block.
    #[inline]
    pub fn node_position(&self, dim: usize, node: usize) -> usize
    {
        self.check_node(dim, node);
        self.split_positions[dim][node]
    }

    /// Number of columns covered by the node's block.
    #[inline]
    pub fn node_size(&self, dim: usize, node: usize) -> usize
    {
        self.check_node(dim, node);
        self.subtree_sizes[dim][node]
    }

    ///
    /// `(start, end)` of the node's block, `end` exclusive.
    ///
    #[inline]
    pub fn node_span(&self, dim: usize, node: usize) -> (usize, usize)
    {
        let start = self.node_position(dim, node);
        (start, start + self.node_size(dim, node))
    }

    ///
    /// Inclusive range `(first, last)` of the nodes in `target_layer` lying inside
    /// the span of `(dim, node)`.
    ///
    pub fn child_range(&self, dim: usize, node: usize, target_layer: usize) -> (usize, usize)
    {
        let (start, end) = self.node_span(dim, node);
        let splits = self.layer(target_layer);
        let first = splits.partition_point(|&pos| pos < start);
        let past_last = splits.partition_point(|&pos| pos < end);
        assert!(first < past_last, "no nodes of layer {target_layer} inside node {node} of dimension {dim}");
        (first, past_last - 1)
    }

    /// Children of `(dim, node)` in dimension `dim - 1`.
    #[inline]
    pub fn direct_child_range(&self, dim: usize, node: usize) -> (usize, usize)
    {
        assert!(dim > 0, "nodes of dimension 0 have no children");
        self.child_range(dim, node, dim - 1)
    }

    /// Leaf (dimension 0) nodes below `(dim, node)`.
    #[inline]
    pub fn leaf_range(&self, dim: usize, node: usize) -> (usize, usize)
    {
        self.child_range(dim, node, 0)
    }

    ///
    /// Split positions and sizes of the nodes in `layer` below `(dim, node)`.
    ///
    pub fn nodes(&self, dim: usize, node: usize, layer: usize) -> (&'a [usize], &'a [usize])
    {
        let (first, last) = self.child_range(dim, node, layer);
        (&self.split_positions[layer][first..=last], &self.subtree_sizes[layer][first..=last])
    }

    #[inline]
    pub fn leaves(&self, dim: usize, node: usize) -> (&'a [usize], &'a [usize])
    {
        self.nodes(dim, node, 0)
    }
}

///
/// A pair of sibling nodes `left < right` of dimension `dim` sharing a parent in
/// dimension `dim + 1`.
///
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SiblingPair
{
    pub dim: usize,
    pub left: usize,
    pub right: usize,
}

///
/// Every sibling pair of the tree in combination order: parent dimension
/// descending, then parent, then `left` ascending, then `right` ascending.
///
/// The DDS relies on this order. All pairs of a higher dimension come before
/// any pair of a lower one, and for a fixed parent the block of `left` is read
/// before any update with a smaller `right` index could have touched it.
///
pub struct SiblingPairs<'a>
{
    navigator: TreeNavigator<'a>,
    dim_parent: usize,
    parent: usize,
    last_child: usize,
    left: usize,
    right: usize,
}

impl<'a> SiblingPairs<'a>
{
    pub fn new(navigator: TreeNavigator<'a>) -> Self
    {
        let mut pairs = Self { navigator, dim_parent: navigator.num_dimensions().saturating_sub(1), parent: 0, last_child: 0, left: 0, right: 0 };
        if pairs.dim_parent > 0
        {
            pairs.load_parent();
        }
        pairs
    }

    fn load_parent(&mut self)
    {
        let (first, last) = self.navigator.direct_child_range(self.dim_parent, self.parent);
        self.left = first;
        self.right = first + 1;
        self.last_child = last;
    }
}

impl Iterator for SiblingPairs<'_>
{
    type Item = SiblingPair;

    fn next(&mut self) -> Option<Self::Item> {
        loop
        {
            if self.dim_parent == 0
            {
                return None;
            }
            if self.left < self.last_child
            {
                let pair = SiblingPair { dim: self.dim_parent - 1, left: self.left, right: self.right };
                self.right += 1;
                if self.right > self.last_child
                {
                    self.left += 1;
                    self.right = self.left + 1;
                }
                return Some(pair);
            }
            self.parent += 1;
            if self.parent == self.navigator.num_nodes(self.dim_parent)
            {
                self.dim_parent -= 1;
                self.parent = 0;
                if self.dim_parent == 0
                {
                    return None;
                }
            }
            self.load_parent();
        }
    }
}

#[cfg(test)]
fn two_dimensional_tables() -> (Vec<Vec<usize>>, Vec<Vec<usize>>)
{
    // total degree 2 in two dimensions: row 0 = [0, 1, 2, 0, 1, 0]
    (vec![vec![0, 3, 5], vec![0]], vec![vec![3, 2, 1], vec![6]])
}

#[test]
fn test_node_span()
{
    let (splits, sizes) = two_dimensional_tables();
    let nav = TreeNavigator::new(&splits, &sizes);
    assert_eq!(nav.node_span(1, 0), (0, 6));
    assert_eq!(nav.node_span(0, 1), (3, 5));
    assert_eq!(nav.node_span(0, 2), (5, 6));
}

#[test]
fn test_child_and_leaf_ranges()
{
    let (splits, sizes) = two_dimensional_tables();
    let nav = TreeNavigator::new(&splits, &sizes);
    assert_eq!(nav.direct_child_range(1, 0), (0, 2));
    assert_eq!(nav.leaf_range(0, 1), (1, 1));
    let (positions, leaf_sizes) = nav.leaves(1, 0);
    assert_eq!(positions, &[0, 3, 5]);
    assert_eq!(leaf_sizes, &[3, 2, 1]);
}

#[test]
#[should_panic(expected = "out of range")]
fn test_out_of_range_node_panics()
{
    let (splits, sizes) = two_dimensional_tables();
    let nav = TreeNavigator::new(&splits, &sizes);
    nav.node_span(0, 3);
}

#[test]
fn test_sibling_pairs_order()
{
    // total degree 2 in three dimensions
    let splits = vec![vec![0, 3, 5, 6, 8, 9], vec![0, 6, 9], vec![0]];
    let sizes = vec![vec![3, 2, 1, 2, 1, 1], vec![6, 3, 1], vec![10]];
    let nav = TreeNavigator::new(&splits, &sizes);
    let pairs: Vec<_> = SiblingPairs::new(nav).map(|p| (p.dim, p.left, p.right)).collect();
    assert_eq!(pairs, vec![(1, 0, 1), (1, 0, 2), (1, 1, 2), (0, 0, 1), (0, 0, 2), (0, 1, 2), (0, 3, 4)]);
}

#[test]
fn test_sibling_pairs_one_dimension()
{
    let splits = vec![vec![0]];
    let sizes = vec![vec![4]];
    assert_eq!(SiblingPairs::new(TreeNavigator::new(&splits, &sizes)).count(), 0);
}
