use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};

use super::Real;
use crate::error::{LayerError, Result};

/// Computes the squared norm of each row in a batched manner.
/// x: A 2D array of shape (batch_size, dim).
/// Returns a 1D array of shape (batch_size,) where each element is the squared L2 norm of a row.
pub fn norm_sq_batched<F: Real>(x: &ArrayView2<F>) -> Array1<F> {
    (x * x).sum_axis(Axis(1))
}

/// Computes the dot product of corresponding rows in two matrices in a batched manner.
/// x: A 2D array of shape (batch_size, dim).
/// y: A 2D array of shape (batch_size, dim).
/// Returns a 1D array of shape (batch_size,) where each element is the dot product of corresponding rows.
pub fn dot_batched<F: Real>(x: &ArrayView2<F>, y: &ArrayView2<F>) -> Array1<F> {
    (x * y).sum_axis(Axis(1))
}

/// All pairwise row dot products, `x · xᵀ`, shape (batch_size, batch_size).
pub fn gram_matrix<F: Real>(x: &ArrayView2<F>) -> Array2<F> {
    x.dot(&x.t())
}

/// Fails on the first squared norm that is not strictly positive and finite.
///
/// A zero row has no direction, and a NaN/inf row would poison every pair it
/// takes part in, so both are rejected up front.
pub fn ensure_positive_norms<F: Real>(norms_sq: &ArrayView1<F>) -> Result<()> {
    match norms_sq
        .iter()
        .position(|&g| !(g > F::zero() && g.is_finite()))
    {
        Some(index) => Err(LayerError::DegenerateVector { index }),
        None => Ok(()),
    }
}
