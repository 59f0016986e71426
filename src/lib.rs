//!
//! Multivariate divided-difference scheme (DDS) over downward-closed
//! multi-index sets.
//!
//! A [`grid::Grid`] owns a lexicographically ordered multi-index set, the
//! per-dimension generating points and the [`tree::MultiIndexTree`] built from
//! the set. [`dds::dds`] turns function values at the grid's unisolvent nodes
//! into coefficients of the Newton interpolant, walking the implicit tree
//! dimension by dimension and combining sibling blocks in place.
//!
pub mod dds;
pub mod errors;
pub mod generating_points;
pub mod grid;
pub mod masks;
pub mod multi_index;
pub mod navigation;
pub mod newton;
pub mod tree;
