use num_traits::Float;

use crate::{errors::DDSError, grid::Grid, masks::ProjectionMask, multi_index::MultiIndexSet, navigation::{SiblingPair, SiblingPairs}, tree::MultiIndexTree};

///
/// Classic one-dimensional divided differences, in place.
///
/// `buffer` holds `n` rows of `num_outputs` values each (row-major); every column
/// is transformed independently against the first `n` entries of `grid_values`.
///
pub fn dds_1d<T: Float>(grid_values: &[T], buffer: &mut [T], num_outputs: usize)
{
    assert!(num_outputs > 0, "dds needs at least one output column");
    let n = buffer.len() / num_outputs;
    for i in 1..n
    {
        let (head, tail) = buffer.split_at_mut(i * num_outputs);
        let previous = &head[(i - 1) * num_outputs..];
        let x_previous = grid_values[i - 1];
        for (row, &x) in tail.chunks_exact_mut(num_outputs).zip(&grid_values[i..n])
        {
            let denominator = x - x_previous;
            for (value, &p) in row.iter_mut().zip(previous)
            {
                *value = (*value - p) / denominator;
            }
        }
    }
}

///
/// `right = (right - project(left)) / denominator` where `left` and `right` are
/// sibling blocks of the same buffer. `left` lies entirely before `right`.
///
#[inline]
fn project_and_update<T: Float>(buffer: &mut [T], num_outputs: usize, left: (usize, usize), right: (usize, usize), mask: &ProjectionMask, denominator: T)
{
    debug_assert!(left.1 <= right.0);
    let (head, tail) = buffer.split_at_mut(right.0 * num_outputs);
    let left_block = &head[left.0 * num_outputs..left.1 * num_outputs];
    let right_block = &mut tail[..(right.1 - right.0) * num_outputs];
    for (i, row) in right_block.chunks_exact_mut(num_outputs).enumerate()
    {
        let j = mask.project(i);
        let source = &left_block[j * num_outputs..(j + 1) * num_outputs];
        for (value, &s) in row.iter_mut().zip(source)
        {
            *value = (*value - s) / denominator;
        }
    }
}

///
/// Multivariate divided differences, in place.
///
/// On entry `buffer` holds function values at the unisolvent nodes (one row per
/// multi-index, `num_outputs` columns); on exit it holds Newton coefficients.
/// Sibling blocks are combined in [`SiblingPairs`] order, i.e. every higher
/// dimension is finished before a lower one starts, and the one-dimensional
/// scheme runs on all leaves last.
///
pub fn dds_nd<T: Float>(buffer: &mut [T], num_outputs: usize, generating_points: &[Vec<T>], tree: &MultiIndexTree, multi_index: &MultiIndexSet)
{
    assert!(num_outputs > 0, "dds needs at least one output column");
    let navigator = tree.navigator();
    let masks = tree.masks();
    tracing::trace!(rows = buffer.len() / num_outputs, num_outputs, dimensions = navigator.num_dimensions(), "running dds");

    let mut current_dim = None;
    for SiblingPair { dim, left, right } in SiblingPairs::new(navigator)
    {
        if current_dim != Some(dim)
        {
            tracing::trace!(dim, nodes = navigator.num_nodes(dim), "combining siblings");
            current_dim = Some(dim);
        }
        let dim_parent = dim + 1;
        let span_left = navigator.node_span(dim, left);
        let span_right = navigator.node_span(dim, right);
        // exponent of this sub problem, taken from the parent dimension
        let exponent_left = multi_index.exponent(dim_parent, span_left.0) as usize;
        let exponent_right = exponent_left + (right - left);
        let points = &generating_points[dim_parent];
        let denominator = points[exponent_right] - points[exponent_left];
        project_and_update(buffer, num_outputs, span_left, span_right, masks.get(dim, left, right), denominator);
    }

    for leaf in 0..navigator.num_nodes(0)
    {
        let (start, end) = navigator.node_span(0, leaf);
        dds_1d(&generating_points[0], &mut buffer[start * num_outputs..end * num_outputs], num_outputs);
    }
}

fn check_shape(values: usize, num_outputs: usize, grid: &Grid) -> Result<(), DDSError>
{
    if num_outputs == 0 || values != grid.len() * num_outputs
    {
        return Err(DDSError::ShapeMismatch);
    }
    Ok(())
}

///
/// Transform `values` (Lagrange coefficients, `grid.len()` rows of `num_outputs`)
/// into Newton coefficients in place.
///
pub fn dds_in_place(buffer: &mut [f64], num_outputs: usize, grid: &Grid) -> Result<(), DDSError>
{
    check_shape(buffer.len(), num_outputs, grid)?;
    dds_nd(buffer, num_outputs, grid.generating_points().as_slices(), grid.tree(), grid.multi_index());
    Ok(())
}

///
/// Newton coefficients of the interpolant of `values`, in a buffer of the same shape.
///
pub fn dds(values: &[f64], num_outputs: usize, grid: &Grid) -> Result<Vec<f64>, DDSError>
{
    let mut buffer = values.to_vec();
    dds_in_place(&mut buffer, num_outputs, grid)?;
    Ok(buffer)
}

///
/// Transform several independent buffers over the same grid in parallel.
///
#[cfg(feature = "rayon")]
pub fn dds_batch(buffers: &mut [Vec<f64>], num_outputs: usize, grid: &Grid) -> Result<(), DDSError>
{
    use rayon::iter::{IntoParallelRefMutIterator, ParallelIterator};
    for buffer in buffers.iter()
    {
        check_shape(buffer.len(), num_outputs, grid)?;
    }
    buffers.par_iter_mut().for_each(|buffer|
        dds_nd(buffer, num_outputs, grid.generating_points().as_slices(), grid.tree(), grid.multi_index())
    );
    Ok(())
}

#[test]
fn test_dds_1d()
{
    let mut values = [1.0, 3.0, 7.0];
    dds_1d(&[0.0, 1.0, 2.0], &mut values, 1);
    assert_eq!(values, [1.0, 2.0, 1.0]);
}

#[test]
fn test_dds_1d_multiple_columns()
{
    // columns: 1 + 2x + x(x-1) and the constant 5
    let mut values = [1.0, 5.0, 3.0, 5.0, 7.0, 5.0];
    dds_1d(&[0.0, 1.0, 2.0, 3.0], &mut values, 2);
    assert_eq!(values, [1.0, 5.0, 2.0, 0.0, 1.0, 0.0]);
}

#[test]
fn test_dds_1d_single_value()
{
    let mut values = [4.0f32];
    dds_1d(&[0.5f32], &mut values, 1);
    assert_eq!(values, [4.0]);
}

#[test]
#[should_panic(expected = "at least one output column")]
fn test_dds_1d_zero_outputs_panics()
{
    dds_1d::<f64>(&[0.0], &mut [], 0);
}

#[test]
#[should_panic(expected = "at least one output column")]
fn test_dds_nd_zero_outputs_panics()
{
    use crate::grid::GridOptions;
    let grid = Grid::from_options(&GridOptions::default()).unwrap();
    dds_nd::<f64>(&mut [], 0, grid.generating_points().as_slices(), grid.tree(), grid.multi_index());
}

#[test]
fn test_dds_identity_for_zero_index()
{
    use crate::grid::GridOptions;
    let grid = Grid::from_options(&GridOptions { spatial_dimension: 3, poly_degree: 0, ..Default::default() }).unwrap();
    assert_eq!(dds(&[2.5], 1, &grid).unwrap(), vec![2.5]);
}

#[test]
fn test_dds_constant_function()
{
    use crate::grid::GridOptions;
    let grid = Grid::from_options(&GridOptions { spatial_dimension: 2, poly_degree: 2, lp_degree: 1.0, ..Default::default() }).unwrap();
    let coeffs = dds(&vec![1.0; grid.len()], 1, &grid).unwrap();
    assert!((coeffs[0] - 1.0).abs() < 1e-14);
    assert!(coeffs[1..].iter().all(|c| c.abs() < 1e-14));
}

#[test]
fn test_dds_bilinear_coefficients()
{
    use crate::{generating_points::GeneratingPoints, multi_index::MultiIndexSet};
    // f(x, y) = 1 + 2x + 3y + 4xy on nodes {0, 1} x {0, 1}: Newton basis 1, x, y, xy
    let multi_index = MultiIndexSet::from_lp_degree(2, 1, f64::INFINITY).unwrap();
    let points = GeneratingPoints::from_points(vec![vec![0.0, 1.0]; 2]).unwrap();
    let grid = Grid::new(multi_index, points).unwrap();
    let values: Vec<f64> = grid.unisolvent_nodes().chunks_exact(2).map(|x| 1.0 + 2.0 * x[0] + 3.0 * x[1] + 4.0 * x[0] * x[1]).collect();
    let coeffs = dds(&values, 1, &grid).unwrap();
    for (c, expected) in coeffs.iter().zip([1.0, 2.0, 3.0, 4.0])
    {
        assert!((c - expected).abs() < 1e-14);
    }
}

#[test]
fn test_dds_shape_mismatch()
{
    use crate::grid::GridOptions;
    let grid = Grid::from_options(&GridOptions::default()).unwrap();
    assert_eq!(dds(&[1.0, 2.0], 1, &grid), Err(DDSError::ShapeMismatch));
    assert_eq!(dds(&[], 0, &grid), Err(DDSError::ShapeMismatch));
}

#[cfg(feature = "rayon")]
#[test]
fn test_dds_batch_matches_sequential()
{
    use crate::grid::GridOptions;
    let grid = Grid::from_options(&GridOptions { spatial_dimension: 3, poly_degree: 3, ..Default::default() }).unwrap();
    let mut buffers: Vec<Vec<f64>> = (0..4).map(|k| grid.unisolvent_nodes().chunks_exact(3).map(|x| x[0] * x[1] + k as f64 * x[2]).collect()).collect();
    let expected: Vec<Vec<f64>> = buffers.iter().map(|b| dds(b, 1, &grid).unwrap()).collect();
    dds_batch(&mut buffers, 1, &grid).unwrap();
    assert_eq!(buffers, expected);
}
