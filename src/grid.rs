use serde::{Deserialize, Serialize};

use crate::{errors::DDSError, generating_points::{GeneratingPoints, GeneratingRule}, multi_index::MultiIndexSet, tree::MultiIndexTree};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GridOptions
{
    /// Number of spatial dimensions
    pub spatial_dimension: usize,
    /// Bound on the lp-norm of the exponents
    pub poly_degree: u32,
    /// `p` of the lp-norm, `f64::INFINITY` for tensorial sets
    pub lp_degree: f64,
    /// One-dimensional rule used in every dimension
    pub generating_rule: GeneratingRule,
}

impl Default for GridOptions
{
    fn default() -> Self {
        Self { spatial_dimension: 2, poly_degree: 2, lp_degree: 2.0, generating_rule: GeneratingRule::Leja }
    }
}

///
/// Interpolation grid: a downward-closed multi-index set, the generating points
/// and the multi-index tree built once from them. The tree is immutable and can
/// be shared by any number of concurrent transformations.
///
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Grid
{
    multi_index: MultiIndexSet,
    generating_points: GeneratingPoints,
    tree: MultiIndexTree,
}

impl Grid
{
    ///
    /// Validate the multi-index set and the generating points, then build the tree.
    ///
    pub fn new(multi_index: MultiIndexSet, generating_points: GeneratingPoints) -> Result<Self, DDSError>
    {
        let multi_index = multi_index.validated()?;
        if generating_points.spatial_dimension() != multi_index.spatial_dimension()
        {
            return Err(DDSError::DimensionMismatch);
        }
        for dim in 0..multi_index.spatial_dimension()
        {
            if multi_index.max_exponent(dim) as usize >= generating_points.dim(dim).len()
            {
                return Err(DDSError::ShapeMismatch);
            }
        }
        let tree = MultiIndexTree::new(&multi_index);
        Ok(Self { multi_index, generating_points, tree })
    }

    pub fn from_options(options: &GridOptions) -> Result<Self, DDSError>
    {
        let multi_index = MultiIndexSet::from_lp_degree(options.spatial_dimension, options.poly_degree, options.lp_degree)?;
        let generating_points = GeneratingPoints::new(options.generating_rule, options.spatial_dimension, options.poly_degree);
        Self::new(multi_index, generating_points)
    }

    ///
    /// Grid over another multi-index set of the same dimension, built from the
    /// same generating rule (extended when higher exponents appear).
    ///
    pub fn with_multi_index(&self, multi_index: MultiIndexSet) -> Result<Self, DDSError>
    {
        if multi_index.spatial_dimension() != self.ndim()
        {
            return Err(DDSError::DimensionMismatch);
        }
        let degree = (0..multi_index.spatial_dimension()).map(|dim| multi_index.max_exponent(dim)).max().unwrap_or(0);
        let generating_points = self.generating_points.with_degree(degree)?;
        Self::new(multi_index, generating_points)
    }

    /// Number of unisolvent nodes
    #[inline]
    pub fn len(&self) -> usize
    {
        self.multi_index.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool
    {
        self.multi_index.is_empty()
    }

    #[inline]
    pub fn ndim(&self) -> usize
    {
        self.multi_index.spatial_dimension()
    }

    pub fn multi_index(&self) -> &MultiIndexSet
    {
        &self.multi_index
    }

    pub fn generating_points(&self) -> &GeneratingPoints
    {
        &self.generating_points
    }

    pub fn tree(&self) -> &MultiIndexTree
    {
        &self.tree
    }

    ///
    /// Unisolvent nodes, one row of `ndim` coordinates per multi-index:
    /// node `alpha` is `(p_0[alpha_0], ..., p_m[alpha_m])`.
    ///
    pub fn unisolvent_nodes(&self) -> Vec<f64>
    {
        let ndim = self.ndim();
        let mut nodes = vec![0.0; self.len() * ndim];
        for (i, node) in nodes.chunks_exact_mut(ndim).enumerate()
        {
            for (dim, x) in node.iter_mut().enumerate()
            {
                *x = self.generating_points.point(dim, self.multi_index.exponent(dim, i));
            }
        }
        nodes
    }

    ///
    /// Newton coefficients of the interpolant of `values` given at the unisolvent nodes.
    ///
    pub fn dds(&self, values: &[f64], num_outputs: usize) -> Result<Vec<f64>, DDSError>
    {
        crate::dds::dds(values, num_outputs, self)
    }
}

#[test]
fn test_unisolvent_nodes()
{
    let grid = Grid::from_options(&GridOptions { poly_degree: 1, lp_degree: 1.0, ..Default::default() }).unwrap();
    // Leja points of degree 1: [-1, 1]
    assert_eq!(grid.unisolvent_nodes(), vec![-1.0, -1.0, 1.0, -1.0, -1.0, 1.0]);
}

#[test]
fn test_grid_rejects_invalid_input()
{
    let gap = MultiIndexSet::from_exponents(&[vec![0], vec![2]]).unwrap();
    let points = GeneratingPoints::new(GeneratingRule::Leja, 1, 2);
    assert_eq!(Grid::new(gap, points.clone()), Err(DDSError::NotDownwardClosed));

    let too_high = MultiIndexSet::from_lp_degree(1, 3, 1.0).unwrap();
    assert_eq!(Grid::new(too_high, points.clone()), Err(DDSError::ShapeMismatch));

    let two_d = MultiIndexSet::from_lp_degree(2, 1, 1.0).unwrap();
    assert_eq!(Grid::new(two_d, points), Err(DDSError::DimensionMismatch));
}

#[test]
fn test_grid_rejects_merged_blocks()
{
    for poly_degree in [2, 4]
    {
        let options = GridOptions { poly_degree, lp_degree: 0.5, ..Default::default() };
        assert_eq!(Grid::from_options(&options), Err(DDSError::MergedBlocks));
    }
    let multi_index = crate::multi_index::union_of_boxes(&[vec![3, 1, 0], vec![0, 2, 2], vec![1, 0, 3]]);
    let points = GeneratingPoints::new(GeneratingRule::Leja, 3, 3);
    assert_eq!(Grid::new(multi_index, points), Err(DDSError::MergedBlocks));
}
