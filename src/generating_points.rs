use core::f64;
use f64::consts::PI;

use serde::{Deserialize, Serialize};

use crate::errors::DDSError;

#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub enum GeneratingRule
{
    /// Chebyshev-Lobatto points in Leja order.
    #[default]
    Leja,
    /// Chebyshev-Lobatto (extrema) points `cos(k pi / n)`.
    ChebyshevLobatto,
    /// Equidistant points on [-1, 1].
    Equidistant,
}

pub trait OneDimensionalRule
{
    fn points(&self, degree: u32) -> Vec<f64>;
}

pub struct ChebyshevLobatto;

impl OneDimensionalRule for ChebyshevLobatto
{
    fn points(&self, degree: u32) -> Vec<f64> {
        if degree == 0
        {
            return vec![0.0];
        }
        let n = degree as f64;
        (0..=degree).map(|k| f64::cos(PI * k as f64 / n)).collect()
    }
}

pub struct Leja;

impl OneDimensionalRule for Leja
{
    ///
    /// Greedy Leja ordering of the Chebyshev-Lobatto points: start at -1, then
    /// repeatedly take the candidate maximising the product of distances to the
    /// points already chosen (the last maximiser wins ties).
    ///
    fn points(&self, degree: u32) -> Vec<f64> {
        let mut candidates = ChebyshevLobatto.points(degree);
        candidates.reverse();
        let mut ordered = Vec::with_capacity(candidates.len());
        ordered.push(candidates.remove(0));
        while !candidates.is_empty()
        {
            let mut best = 0;
            let mut best_product = 0.0;
            for (i, &x) in candidates.iter().enumerate()
            {
                let product = ordered.iter().map(|&y: &f64| (y - x).abs()).product::<f64>();
                if product >= best_product
                {
                    best = i;
                    best_product = product;
                }
            }
            ordered.push(candidates.remove(best));
        }
        ordered
    }
}

pub struct Equidistant;

impl OneDimensionalRule for Equidistant
{
    fn points(&self, degree: u32) -> Vec<f64> {
        if degree == 0
        {
            return vec![0.0];
        }
        let h = 2.0 / degree as f64;
        (0..=degree).map(|k| -1.0 + h * k as f64).collect()
    }
}

impl GeneratingRule
{
    pub fn points(&self, degree: u32) -> Vec<f64>
    {
        match self
        {
            GeneratingRule::Leja => Leja.points(degree),
            GeneratingRule::ChebyshevLobatto => ChebyshevLobatto.points(degree),
            GeneratingRule::Equidistant => Equidistant.points(degree),
        }
    }
}

///
/// Per-dimension interpolation abscissas. `dim(d)[k]` is the abscissa used for
/// exponent `k` in dimension `d`.
///
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeneratingPoints
{
    points: Vec<Vec<f64>>,
    /// `None` for caller-supplied points
    rule: Option<GeneratingRule>,
}

impl GeneratingPoints
{
    ///
    /// The same one-dimensional rule of degree `poly_degree` in every dimension.
    ///
    pub fn new(rule: GeneratingRule, spatial_dimension: usize, poly_degree: u32) -> Self
    {
        let points = rule.points(poly_degree);
        Self { points: vec![points; spatial_dimension], rule: Some(rule) }
    }

    ///
    /// Points able to serve exponents up to `degree` in every dimension. The
    /// current points are kept when they suffice; otherwise they are regenerated
    /// from the rule, which is impossible for caller-supplied points.
    ///
    pub fn with_degree(&self, degree: u32) -> Result<Self, DDSError>
    {
        if self.points.iter().all(|p| p.len() > degree as usize)
        {
            return Ok(self.clone());
        }
        match self.rule
        {
            Some(rule) => Ok(Self::new(rule, self.spatial_dimension(), degree)),
            None => Err(DDSError::ShapeMismatch),
        }
    }

    ///
    /// Use caller-supplied abscissas. Every dimension needs at least one point and
    /// the points of one dimension must be pairwise distinct.
    ///
    pub fn from_points(points: Vec<Vec<f64>>) -> Result<Self, DDSError>
    {
        if points.is_empty() || points.iter().any(|p| p.is_empty())
        {
            return Err(DDSError::ShapeMismatch);
        }
        for dim in &points
        {
            for (i, x) in dim.iter().enumerate()
            {
                if dim[i + 1..].contains(x)
                {
                    return Err(DDSError::InvalidConfiguration);
                }
            }
        }
        Ok(Self { points, rule: None })
    }

    #[inline]
    pub fn spatial_dimension(&self) -> usize
    {
        self.points.len()
    }

    #[inline]
    pub fn dim(&self, dim: usize) -> &[f64]
    {
        &self.points[dim]
    }

    #[inline]
    pub fn point(&self, dim: usize, exponent: u32) -> f64
    {
        self.points[dim][exponent as usize]
    }

    pub fn as_slices(&self) -> &[Vec<f64>]
    {
        &self.points
    }
}

#[test]
fn test_chebyshev_lobatto()
{
    let points = ChebyshevLobatto.points(2);
    assert_eq!(points.len(), 3);
    assert!((points[0] - 1.0).abs() < 1e-15);
    assert!(points[1].abs() < 1e-15);
    assert!((points[2] + 1.0).abs() < 1e-15);
}

#[test]
fn test_leja_order()
{
    let points = Leja.points(4);
    assert_eq!(points.len(), 5);
    // -1 first, then the point furthest away, then the midpoint
    assert!((points[0] + 1.0).abs() < 1e-15);
    assert!((points[1] - 1.0).abs() < 1e-15);
    assert!(points[2].abs() < 1e-15);
    let mut sorted = points.clone();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let lobatto = {
        let mut p = ChebyshevLobatto.points(4);
        p.reverse();
        p
    };
    for (a, b) in sorted.iter().zip(&lobatto)
    {
        assert!((a - b).abs() < 1e-15);
    }
}

#[test]
fn test_from_points_rejects_duplicates()
{
    assert_eq!(GeneratingPoints::from_points(vec![vec![0.0, 1.0, 0.0]]), Err(DDSError::InvalidConfiguration));
    assert_eq!(GeneratingPoints::from_points(vec![]), Err(DDSError::ShapeMismatch));
    let points = GeneratingPoints::from_points(vec![vec![0.0, 1.0, 2.0]; 2]).unwrap();
    assert_eq!(points.point(1, 2), 2.0);
    assert_eq!(points.with_degree(2).unwrap(), points);
    assert_eq!(points.with_degree(3), Err(DDSError::ShapeMismatch));
}

#[test]
fn test_with_degree_regenerates_from_rule()
{
    let points = GeneratingPoints::new(GeneratingRule::Equidistant, 2, 2);
    let extended = points.with_degree(4).unwrap();
    assert_eq!(extended.dim(1), &[-1.0, -0.5, 0.0, 0.5, 1.0]);
}
