use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::{errors::DDSError, tree::{check_blocks, compile_splits}};

///
/// Compare two exponent vectors in the ordering used throughout the crate:
/// the highest dimension is the most significant one, dimension 0 varies fastest.
///
#[inline]
pub fn lexicographic_cmp(a: &[u32], b: &[u32]) -> Ordering
{
    a.iter()
        .rev()
        .zip(b.iter().rev())
        .find_map(|(x, y)| match x.cmp(y) {
            Ordering::Equal => None,
            other => Some(other),
        })
        .unwrap_or(Ordering::Equal)
}

///
/// Depth-first walk over the lp-ball, highest dimension outermost so that the
/// indices come out in lexicographic order. Each level stops as soon as the
/// partial sum of `alpha_d^p` exceeds the budget.
///
struct LpEnumeration
{
    poly_degree: u32,
    lp_degree: f64,
    budget: f64,
    current: Vec<u32>,
    /// output, one row per dimension
    rows: Vec<Vec<u32>>,
}

impl LpEnumeration
{
    fn descend(&mut self, dim: usize, partial: f64)
    {
        for exponent in 0..=self.poly_degree
        {
            let cost = if self.lp_degree.is_infinite() { 0.0 } else { (exponent as f64).powf(self.lp_degree) };
            if partial + cost > self.budget
            {
                break;
            }
            self.current[dim] = exponent;
            if dim == 0
            {
                for (row, &e) in self.rows.iter_mut().zip(&self.current)
                {
                    row.push(e);
                }
            }
            else
            {
                self.descend(dim - 1, partial + cost);
            }
        }
    }
}

///
/// A finite set of exponent vectors stored dimension-major: one row per spatial
/// dimension, one column per multi-index. Columns are lexicographically sorted
/// and the all-zero index comes first.
///
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultiIndexSet
{
    spatial_dimension: usize,
    len: usize,
    exponents: Vec<u32>,
}

impl MultiIndexSet
{
    ///
    /// All exponent vectors `alpha` with `||alpha||_p <= poly_degree`, where
    /// `p = lp_degree`. `f64::INFINITY` yields the full tensorial set.
    ///
    pub fn from_lp_degree(spatial_dimension: usize, poly_degree: u32, lp_degree: f64) -> Result<Self, DDSError>
    {
        if spatial_dimension == 0 || lp_degree.is_nan() || lp_degree <= 0.0
        {
            return Err(DDSError::InvalidConfiguration);
        }
        let budget = if lp_degree.is_infinite() { f64::INFINITY } else { (poly_degree as f64 + 1e-9).powf(lp_degree) };
        let mut enumeration = LpEnumeration { poly_degree, lp_degree, budget, current: vec![0; spatial_dimension], rows: vec![Vec::new(); spatial_dimension] };
        enumeration.descend(spatial_dimension - 1, 0.0);
        let len = enumeration.rows[0].len();
        Ok(Self { spatial_dimension, len, exponents: enumeration.rows.concat() })
    }

    ///
    /// Build a set from arbitrary columns. Columns are sorted lexicographically
    /// and duplicates are removed. Downward closure is not enforced here, see
    /// [`MultiIndexSet::validated`].
    ///
    pub fn from_exponents(columns: &[Vec<u32>]) -> Result<Self, DDSError>
    {
        let spatial_dimension = columns.first().map(|c| c.len()).ok_or(DDSError::ShapeMismatch)?;
        if spatial_dimension == 0 || columns.iter().any(|c| c.len() != spatial_dimension)
        {
            return Err(DDSError::DimensionMismatch);
        }
        let mut sorted = columns.to_vec();
        sorted.sort_by(|a, b| lexicographic_cmp(a, b));
        sorted.dedup();
        Ok(Self::from_sorted_columns(spatial_dimension, &sorted))
    }

    ///
    /// Wrap an already dimension-major exponent array (`spatial_dimension` rows of
    /// equal length). The ordering and downward closure are checked.
    ///
    pub fn from_dimension_major(spatial_dimension: usize, exponents: Vec<u32>) -> Result<Self, DDSError>
    {
        if spatial_dimension == 0 || exponents.is_empty() || exponents.len() % spatial_dimension != 0
        {
            return Err(DDSError::ShapeMismatch);
        }
        let len = exponents.len() / spatial_dimension;
        Self { spatial_dimension, len, exponents }.validated()
    }

    fn from_sorted_columns(spatial_dimension: usize, columns: &[Vec<u32>]) -> Self
    {
        let len = columns.len();
        let mut exponents = vec![0; spatial_dimension * len];
        for (i, column) in columns.iter().enumerate()
        {
            for (dim, &exponent) in column.iter().enumerate()
            {
                exponents[dim * len + i] = exponent;
            }
        }
        Self { spatial_dimension, len, exponents }
    }

    ///
    /// Check the preconditions of the multi-index tree: strictly increasing
    /// lexicographic order, downward closure and blocks the split rule can
    /// separate (see [`crate::tree::check_blocks`]).
    ///
    pub fn validated(self) -> Result<Self, DDSError>
    {
        if !self.is_lexicographic()
        {
            return Err(DDSError::NotLexicographic);
        }
        if !self.is_downward_closed()
        {
            return Err(DDSError::NotDownwardClosed);
        }
        check_blocks(&self, &compile_splits(&self))?;
        Ok(self)
    }

    #[inline]
    pub fn len(&self) -> usize
    {
        self.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool
    {
        self.len == 0
    }

    #[inline]
    pub fn spatial_dimension(&self) -> usize
    {
        self.spatial_dimension
    }

    /// Exponents of all multi-indices in dimension `dim`.
    #[inline]
    pub fn row(&self, dim: usize) -> &[u32]
    {
        &self.exponents[dim * self.len..(dim + 1) * self.len]
    }

    #[inline]
    pub fn exponent(&self, dim: usize, index: usize) -> u32
    {
        self.exponents[dim * self.len + index]
    }

    pub fn column(&self, index: usize) -> Vec<u32>
    {
        (0..self.spatial_dimension).map(|dim| self.exponent(dim, index)).collect()
    }

    pub fn columns(&self) -> impl Iterator<Item = Vec<u32>> + '_
    {
        (0..self.len).map(|i| self.column(i))
    }

    /// Largest exponent appearing in dimension `dim`.
    pub fn max_exponent(&self, dim: usize) -> u32
    {
        self.row(dim).iter().copied().max().unwrap_or(0)
    }

    ///
    /// Position of `alpha` in the set. Relies on the lexicographic order.
    ///
    pub fn position(&self, alpha: &[u32]) -> Option<usize>
    {
        if alpha.len() != self.spatial_dimension
        {
            return None;
        }
        let mut column = vec![0; self.spatial_dimension];
        let (mut lo, mut hi) = (0, self.len);
        while lo < hi
        {
            let mid = (lo + hi) / 2;
            for (dim, value) in column.iter_mut().enumerate()
            {
                *value = self.exponent(dim, mid);
            }
            match lexicographic_cmp(&column, alpha)
            {
                Ordering::Less => lo = mid + 1,
                Ordering::Greater => hi = mid,
                Ordering::Equal => return Some(mid),
            }
        }
        None
    }

    pub fn contains(&self, alpha: &[u32]) -> bool
    {
        self.position(alpha).is_some()
    }

    pub fn is_lexicographic(&self) -> bool
    {
        (1..self.len).all(|i| lexicographic_cmp(&self.column(i - 1), &self.column(i)) == Ordering::Less)
    }

    ///
    /// Every index obtained by decrementing a single non-zero entry of a member
    /// must itself be a member.
    ///
    pub fn is_downward_closed(&self) -> bool
    {
        if self.is_empty() || self.column(0).iter().any(|&e| e != 0)
        {
            return false;
        }
        self.columns().all(|mut alpha|
        {
            for dim in 0..alpha.len()
            {
                if alpha[dim] > 0
                {
                    alpha[dim] -= 1;
                    let found = self.contains(&alpha);
                    alpha[dim] += 1;
                    if !found
                    {
                        return false;
                    }
                }
            }
            true
        })
    }

    ///
    /// Union of two sets of equal spatial dimension.
    ///
    pub fn union(&self, other: &Self) -> Result<Self, DDSError>
    {
        if self.spatial_dimension != other.spatial_dimension
        {
            return Err(DDSError::DimensionMismatch);
        }
        let columns: Vec<_> = self.columns().chain(other.columns()).collect();
        Self::from_exponents(&columns)
    }

    ///
    /// Minkowski sum of the two sets, i.e. the exponents of a product of
    /// polynomials living on `self` and `other`.
    ///
    pub fn multiply(&self, other: &Self) -> Result<Self, DDSError>
    {
        if self.spatial_dimension != other.spatial_dimension
        {
            return Err(DDSError::DimensionMismatch);
        }
        let rhs: Vec<_> = other.columns().collect();
        let mut columns = Vec::with_capacity(self.len * other.len);
        for a in self.columns()
        {
            for b in &rhs
            {
                columns.push(a.iter().zip(b).map(|(x, y)| x + y).collect::<Vec<u32>>());
            }
        }
        Self::from_exponents(&columns)
    }
}

#[test]
fn test_total_degree_ordering()
{
    let set = MultiIndexSet::from_lp_degree(2, 2, 1.0).unwrap();
    assert_eq!(set.len(), 6);
    assert_eq!(set.row(0), &[0, 1, 2, 0, 1, 0]);
    assert_eq!(set.row(1), &[0, 0, 0, 1, 1, 2]);
    assert!(set.is_lexicographic());
    assert!(set.is_downward_closed());
}

#[test]
fn test_euclidean_and_tensorial_sets()
{
    let euclidean = MultiIndexSet::from_lp_degree(3, 2, 2.0).unwrap();
    // (1,1,1) has norm sqrt(3) <= 2, (2,1,0) does not
    assert_eq!(euclidean.len(), 11);
    assert!(euclidean.contains(&[1, 1, 1]));
    assert!(!euclidean.contains(&[2, 1, 0]));
    assert!(euclidean.is_downward_closed());

    let tensorial = MultiIndexSet::from_lp_degree(3, 2, f64::INFINITY).unwrap();
    assert_eq!(tensorial.len(), 27);
    assert!(tensorial.is_downward_closed());
}

#[test]
fn test_from_exponents_sorts_and_deduplicates()
{
    let set = MultiIndexSet::from_exponents(&[vec![0, 1], vec![1, 0], vec![0, 0], vec![1, 0]]).unwrap();
    assert_eq!(set.len(), 3);
    assert_eq!(set.column(0), vec![0, 0]);
    assert_eq!(set.column(1), vec![1, 0]);
    assert_eq!(set.column(2), vec![0, 1]);
    assert_eq!(set.position(&[0, 1]), Some(2));
    assert_eq!(set.position(&[1, 1]), None);
}

#[test]
fn test_validation_rejects_bad_input()
{
    let gap = MultiIndexSet::from_exponents(&[vec![0, 0], vec![2, 0]]).unwrap();
    assert_eq!(gap.validated(), Err(DDSError::NotDownwardClosed));

    // columns (0,0), (0,1), (1,0) are out of order
    let unsorted = MultiIndexSet::from_dimension_major(2, vec![0, 0, 1, 0, 1, 0]);
    assert_eq!(unsorted, Err(DDSError::NotLexicographic));

    assert_eq!(MultiIndexSet::from_exponents(&[vec![0, 0], vec![1]]), Err(DDSError::DimensionMismatch));
    assert_eq!(MultiIndexSet::from_lp_degree(0, 2, 1.0), Err(DDSError::InvalidConfiguration));
}

#[test]
fn test_union_and_product()
{
    let a = MultiIndexSet::from_exponents(&[vec![0, 0], vec![1, 0]]).unwrap();
    let b = MultiIndexSet::from_exponents(&[vec![0, 0], vec![0, 1]]).unwrap();
    let union = a.union(&b).unwrap();
    assert_eq!(union.len(), 3);
    let product = a.multiply(&b).unwrap();
    assert_eq!(product.len(), 4);
    assert!(product.contains(&[1, 1]));
    assert!(product.is_downward_closed());
}

/// Downward-closed union of the boxes `[0, corner]`.
#[cfg(test)]
pub(crate) fn union_of_boxes(corners: &[Vec<u32>]) -> MultiIndexSet
{
    let degree = corners.iter().flatten().copied().max().unwrap_or(0);
    let tensorial = MultiIndexSet::from_lp_degree(corners[0].len(), degree, f64::INFINITY).unwrap();
    let columns: Vec<Vec<u32>> = tensorial.columns().filter(|alpha| corners.iter().any(|corner| alpha.iter().zip(corner).all(|(a, c)| a <= c))).collect();
    MultiIndexSet::from_exponents(&columns).unwrap()
}

#[test]
fn test_lp_enumeration_matches_norm_filter()
{
    for (ndim, degree, lp) in [(2, 5, 0.5), (3, 4, 1.0), (3, 5, 1.5), (4, 3, 2.0), (2, 6, 3.0)]
    {
        let set = MultiIndexSet::from_lp_degree(ndim, degree, lp).unwrap();
        let expected: Vec<Vec<u32>> = MultiIndexSet::from_lp_degree(ndim, degree, f64::INFINITY).unwrap().columns().filter(|alpha|
            alpha.iter().map(|&a| (a as f64).powf(lp)).sum::<f64>().powf(1.0 / lp) <= degree as f64 + 1e-9
        ).collect();
        assert_eq!(set.columns().collect::<Vec<_>>(), expected);
        assert!(set.is_lexicographic());
    }
}

#[test]
fn test_lp_enumeration_high_dimension()
{
    // binomial(16, 8) members, without walking the 9^8 tensorial candidates
    let set = MultiIndexSet::from_lp_degree(8, 8, 1.0).unwrap();
    assert_eq!(set.len(), 12870);
    assert_eq!(set.column(set.len() - 1), vec![0, 0, 0, 0, 0, 0, 0, 8]);
}

#[test]
fn test_validation_rejects_merged_blocks()
{
    // lp-degree 0.5: (0, 1) and (0, 2) follow (2, 0) and fall into one leaf
    let sub_linear = MultiIndexSet::from_lp_degree(2, 2, 0.5).unwrap();
    assert!(sub_linear.is_downward_closed());
    assert_eq!(sub_linear.validated(), Err(DDSError::MergedBlocks));

    for corners in [vec![vec![3, 1, 0], vec![0, 2, 2], vec![1, 0, 3]], vec![vec![2, 2, 2], vec![4, 0, 0], vec![0, 0, 4]]]
    {
        let set = union_of_boxes(&corners);
        assert!(set.is_downward_closed());
        assert_eq!(set.validated(), Err(DDSError::MergedBlocks));
    }

    for corners in [vec![vec![3, 1], vec![1, 3]], vec![vec![3, 2, 1], vec![1, 1, 3]], vec![vec![4, 1, 0], vec![2, 2, 1], vec![0, 0, 2]]]
    {
        assert!(union_of_boxes(&corners).validated().is_ok());
    }
}
