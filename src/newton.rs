use crate::{errors::DDSError, generating_points::GeneratingPoints, grid::Grid, multi_index::MultiIndexSet};

///
/// Values of the one-dimensional Newton products `prod_{i < k} (x - p_i)` for
/// `k = 0..=max_exponent`, or of their `order`-th derivative.
///
fn newton_products(x: f64, points: &[f64], max_exponent: usize, order: usize, products: &mut Vec<f64>)
{
    products.clear();
    // Taylor coefficients around x of the running product, highest order last
    let mut taylor = vec![0.0; order + 1];
    taylor[0] = 1.0;
    let factorial: f64 = (1..=order).map(|k| k as f64).product();
    products.push(taylor[order] * factorial);
    for &p in &points[..max_exponent]
    {
        for j in (0..=order).rev()
        {
            let lower = if j > 0 { taylor[j - 1] } else { 0.0 };
            taylor[j] = (x - p) * taylor[j] + lower;
        }
        products.push(taylor[order] * factorial);
    }
}

///
/// All Newton monomials `N_alpha(x) = prod_d prod_{i < alpha_d} (x_d - p_d[i])` of
/// the set at the point `x`. With `derivative = Some((dim, order))` the monomials
/// are differentiated `order` times with respect to `x_dim`.
///
pub fn eval_newton_monomials(x: &[f64], multi_index: &MultiIndexSet, generating_points: &GeneratingPoints, derivative: Option<(usize, usize)>) -> Vec<f64>
{
    let mut monomials = vec![1.0; multi_index.len()];
    let mut products = Vec::new();
    for (dim, &xd) in x.iter().enumerate()
    {
        let order = match derivative
        {
            Some((d, order)) if d == dim => order,
            _ => 0,
        };
        newton_products(xd, generating_points.dim(dim), multi_index.max_exponent(dim) as usize, order, &mut products);
        for (monomial, &exponent) in monomials.iter_mut().zip(multi_index.row(dim))
        {
            *monomial *= products[exponent as usize];
        }
    }
    monomials
}

///
/// Polynomial(s) in the Newton basis of a grid. `coeffs` has one row per
/// multi-index and `num_outputs` columns, one per polynomial.
///
#[derive(Clone, Debug, PartialEq)]
pub struct NewtonPolynomial
{
    grid: Grid,
    coeffs: Vec<f64>,
    num_outputs: usize,
}

impl NewtonPolynomial
{
    pub fn new(grid: Grid, coeffs: Vec<f64>, num_outputs: usize) -> Result<Self, DDSError>
    {
        if num_outputs == 0 || coeffs.len() != grid.len() * num_outputs
        {
            return Err(DDSError::ShapeMismatch);
        }
        Ok(Self { grid, coeffs, num_outputs })
    }

    ///
    /// Interpolant of `values` sampled at the unisolvent nodes of `grid`
    /// (the Lagrange coefficients).
    ///
    pub fn from_values(grid: Grid, values: &[f64], num_outputs: usize) -> Result<Self, DDSError>
    {
        let coeffs = grid.dds(values, num_outputs)?;
        Ok(Self { grid, coeffs, num_outputs })
    }

    ///
    /// Interpolant of the scalar function `f`.
    ///
    pub fn from_fn<F: Fn(&[f64]) -> f64>(grid: Grid, f: F) -> Result<Self, DDSError>
    {
        let values: Vec<f64> = grid.unisolvent_nodes().chunks_exact(grid.ndim()).map(f).collect();
        Self::from_values(grid, &values, 1)
    }

    pub fn grid(&self) -> &Grid
    {
        &self.grid
    }

    pub fn coeffs(&self) -> &[f64]
    {
        &self.coeffs
    }

    pub fn num_outputs(&self) -> usize
    {
        self.num_outputs
    }

    fn combine(&self, monomials: &[f64], y: &mut [f64])
    {
        y.fill(0.0);
        for (&monomial, coeffs) in monomials.iter().zip(self.coeffs.chunks_exact(self.num_outputs))
        {
            for (value, &c) in y.iter_mut().zip(coeffs)
            {
                *value += monomial * c;
            }
        }
    }

    fn eval_unchecked(&self, x: &[f64], derivative: Option<(usize, usize)>, y: &mut [f64])
    {
        let monomials = eval_newton_monomials(x, self.grid.multi_index(), self.grid.generating_points(), derivative);
        self.combine(&monomials, y);
    }

    fn eval_points(&self, points: &[f64], derivative: Option<(usize, usize)>) -> Vec<f64>
    {
        let ndim = self.grid.ndim();
        let mut results = vec![0.0; points.len() / ndim * self.num_outputs];
        #[cfg(feature = "rayon")]
        {
            use rayon::iter::{IndexedParallelIterator, ParallelIterator};
            use rayon::slice::{ParallelSlice, ParallelSliceMut};
            points.par_chunks_exact(ndim).zip(results.par_chunks_exact_mut(self.num_outputs)).for_each(
                |(x, y)| self.eval_unchecked(x, derivative, y)
            );
        }
        #[cfg(not(feature = "rayon"))]
        {
            for (x, y) in points.chunks_exact(ndim).zip(results.chunks_exact_mut(self.num_outputs))
            {
                self.eval_unchecked(x, derivative, y);
            }
        }
        results
    }

    ///
    /// Values of all `num_outputs` polynomials at `x`.
    ///
    pub fn eval(&self, x: &[f64]) -> Result<Vec<f64>, DDSError>
    {
        if x.len() != self.grid.ndim()
        {
            return Err(DDSError::DimensionMismatch);
        }
        let mut y = vec![0.0; self.num_outputs];
        self.eval_unchecked(x, None, &mut y);
        Ok(y)
    }

    ///
    /// Evaluate at many points (row-major, `ndim` coordinates each). Returns one
    /// row of `num_outputs` values per point.
    ///
    pub fn eval_batch(&self, points: &[f64]) -> Result<Vec<f64>, DDSError>
    {
        if points.len() % self.grid.ndim() != 0
        {
            return Err(DDSError::DimensionMismatch);
        }
        Ok(self.eval_points(points, None))
    }

    fn check_compatible(&self, other: &Self) -> Result<(), DDSError>
    {
        if self.grid.ndim() != other.grid.ndim()
        {
            return Err(DDSError::DimensionMismatch);
        }
        if self.num_outputs != other.num_outputs
        {
            return Err(DDSError::ShapeMismatch);
        }
        Ok(())
    }

    ///
    /// Sample both operands at the unisolvent nodes of `grid`, combine the samples
    /// pointwise and transform back into Newton coefficients.
    ///
    fn resample<F: Fn(f64, f64) -> f64>(&self, other: &Self, grid: Grid, op: F) -> Result<Self, DDSError>
    {
        let nodes = grid.unisolvent_nodes();
        let mut values = self.eval_points(&nodes, None);
        for (value, rhs) in values.iter_mut().zip(other.eval_points(&nodes, None))
        {
            *value = op(*value, rhs);
        }
        Self::from_values(grid, &values, self.num_outputs)
    }

    ///
    /// Sum, living on the union of both multi-index sets.
    ///
    pub fn add(&self, other: &Self) -> Result<Self, DDSError>
    {
        self.check_compatible(other)?;
        let multi_index = self.grid.multi_index().union(other.grid.multi_index())?;
        let grid = self.grid.with_multi_index(multi_index)?;
        self.resample(other, grid, |a, b| a + b)
    }

    ///
    /// Product, living on the Minkowski sum of both multi-index sets.
    ///
    pub fn mul(&self, other: &Self) -> Result<Self, DDSError>
    {
        self.check_compatible(other)?;
        let multi_index = self.grid.multi_index().multiply(other.grid.multi_index())?;
        let grid = self.grid.with_multi_index(multi_index)?;
        self.resample(other, grid, |a, b| a * b)
    }

    ///
    /// `order`-th partial derivative with respect to `x_dim`. The result lives on
    /// the same grid since downward-closed spaces are closed under differentiation.
    ///
    pub fn partial_diff(&self, dim: usize, order: usize) -> Result<Self, DDSError>
    {
        if dim >= self.grid.ndim()
        {
            return Err(DDSError::InvalidIndex);
        }
        let values = self.eval_points(&self.grid.unisolvent_nodes(), Some((dim, order)));
        Self::from_values(self.grid.clone(), &values, self.num_outputs)
    }
}

#[cfg(test)]
fn assert_close(a: f64, b: f64)
{
    assert!((a - b).abs() < 1e-10, "{a} != {b}");
}

#[test]
fn test_newton_products_and_derivatives()
{
    let points = [0.0, 1.0, 2.0];
    let mut products = Vec::new();
    // x, x(x-1), x(x-1)(x-2) at x = 3
    newton_products(3.0, &points, 3, 0, &mut products);
    assert_eq!(products, vec![1.0, 3.0, 6.0, 6.0]);
    // first derivatives: 0, 1, 2x-1, 3x^2-6x+2
    newton_products(3.0, &points, 3, 1, &mut products);
    assert_eq!(products, vec![0.0, 1.0, 5.0, 11.0]);
    // second derivatives: 0, 0, 2, 6x-6
    newton_products(3.0, &points, 3, 2, &mut products);
    assert_eq!(products, vec![0.0, 0.0, 2.0, 12.0]);
}

#[test]
fn test_interpolation_reproduces_values_at_nodes()
{
    use crate::grid::GridOptions;
    for options in [
        GridOptions { spatial_dimension: 1, poly_degree: 6, ..Default::default() },
        GridOptions { spatial_dimension: 2, poly_degree: 5, lp_degree: 1.0, ..Default::default() },
        GridOptions { spatial_dimension: 3, poly_degree: 4, lp_degree: 2.0, ..Default::default() },
        GridOptions { spatial_dimension: 4, poly_degree: 2, lp_degree: f64::INFINITY, ..Default::default() },
    ]
    {
        let grid = Grid::from_options(&options).unwrap();
        let ndim = grid.ndim();
        let nodes = grid.unisolvent_nodes();
        // two value sets per node
        let values: Vec<f64> = nodes.chunks_exact(ndim).flat_map(|x|
        {
            let s: f64 = x.iter().sum();
            [libm::sin(s) + 1.0, libm::exp(x[0]) * s]
        }).collect();
        let poly = NewtonPolynomial::from_values(grid, &values, 2).unwrap();
        let reproduced = poly.eval_batch(&nodes).unwrap();
        for (a, b) in reproduced.iter().zip(&values)
        {
            assert_close(*a, *b);
        }
    }
}

#[test]
fn test_polynomials_are_reproduced_exactly()
{
    use crate::grid::GridOptions;
    let grid = Grid::from_options(&GridOptions { spatial_dimension: 3, poly_degree: 3, lp_degree: 1.0, ..Default::default() }).unwrap();
    let f = |x: &[f64]| 1.0 + x[0] * x[1] * x[2] - 2.0 * x[2].powi(3) + 0.5 * x[0] * x[0] * x[1];
    let poly = NewtonPolynomial::from_fn(grid, f).unwrap();
    for x in [[0.3, -0.2, 0.7], [-0.9, 0.1, 0.25], [0.0, 0.5, -0.5]]
    {
        assert_close(poly.eval(&x).unwrap()[0], f(&x[..]));
    }
    assert_eq!(poly.eval(&[0.0, 0.0]), Err(DDSError::DimensionMismatch));
}

#[test]
fn test_add_and_mul()
{
    use crate::grid::GridOptions;
    let options = GridOptions { spatial_dimension: 2, poly_degree: 2, lp_degree: 1.0, ..Default::default() };
    let p = NewtonPolynomial::from_fn(Grid::from_options(&options).unwrap(), |x| x[0] * x[0] - x[1]).unwrap();
    let q = NewtonPolynomial::from_fn(Grid::from_options(&options).unwrap(), |x| 2.0 * x[0] * x[1] + 1.0).unwrap();
    let sum = p.add(&q).unwrap();
    let product = p.mul(&q).unwrap();
    assert_eq!(product.grid().multi_index().len(), 15);
    for x in [[0.2, 0.4], [-0.7, 0.9]]
    {
        let (a, b) = (x[0] * x[0] - x[1], 2.0 * x[0] * x[1] + 1.0);
        assert_close(sum.eval(&x).unwrap()[0], a + b);
        assert_close(product.eval(&x).unwrap()[0], a * b);
    }
}

#[test]
fn test_partial_diff()
{
    use crate::grid::GridOptions;
    let grid = Grid::from_options(&GridOptions { spatial_dimension: 2, poly_degree: 4, lp_degree: 1.0, ..Default::default() }).unwrap();
    let poly = NewtonPolynomial::from_fn(grid, |x| x[0].powi(3) * x[1] + x[1] * x[1]).unwrap();
    let dx = poly.partial_diff(0, 1).unwrap();
    let dyy = poly.partial_diff(1, 2).unwrap();
    let dxx = poly.partial_diff(0, 2).unwrap();
    for x in [[0.3, -0.6], [0.8, 0.1]]
    {
        assert_close(dx.eval(&x).unwrap()[0], 3.0 * x[0] * x[0] * x[1]);
        assert_close(dyy.eval(&x).unwrap()[0], 2.0);
        assert_close(dxx.eval(&x).unwrap()[0], 6.0 * x[0] * x[1]);
    }
    assert_eq!(poly.partial_diff(2, 1), Err(DDSError::InvalidIndex));
}

#[test]
fn test_interpolation_on_unions_of_boxes()
{
    use crate::{generating_points::GeneratingRule, multi_index::union_of_boxes};
    for corners in [vec![vec![3, 1], vec![1, 3]], vec![vec![3, 2, 1], vec![1, 1, 3]], vec![vec![4, 1, 0], vec![2, 2, 1], vec![0, 0, 2]]]
    {
        let ndim = corners[0].len();
        let degree = corners.iter().flatten().copied().max().unwrap();
        let grid = Grid::new(union_of_boxes(&corners), GeneratingPoints::new(GeneratingRule::Leja, ndim, degree)).unwrap();
        let nodes = grid.unisolvent_nodes();
        let values: Vec<f64> = nodes.chunks_exact(ndim).flat_map(|x|
        {
            let s: f64 = x.iter().sum();
            [libm::sin(s) + 1.0, libm::exp(x[0]) * s]
        }).collect();
        let poly = NewtonPolynomial::from_values(grid, &values, 2).unwrap();
        for (a, b) in poly.eval_batch(&nodes).unwrap().iter().zip(&values)
        {
            assert_close(*a, *b);
        }
    }

    // x0^3 x1 and x0 x1^3 both lie in the span of the boxes [0, (3, 1)] and [0, (1, 3)]
    let corners = [vec![3, 1], vec![1, 3]];
    let grid = Grid::new(union_of_boxes(&corners), GeneratingPoints::new(GeneratingRule::Leja, 2, 3)).unwrap();
    let f = |x: &[f64]| x[0].powi(3) * x[1] - 2.0 * x[0] * x[1].powi(3) + x[1];
    let poly = NewtonPolynomial::from_fn(grid, f).unwrap();
    for x in [[0.35, -0.8], [-0.6, 0.45]]
    {
        assert_close(poly.eval(&x).unwrap()[0], f(&x[..]));
    }
}
