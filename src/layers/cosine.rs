//! Row-wise cosine similarity between two equally shaped batches.

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis, Zip};
use serde::{Deserialize, Serialize};

use crate::error::{LayerError, Result};
use crate::ops::{dot_batched, ensure_positive_norms, norm_sq_batched, Real};

/// Per-row dot products kept from forward for backward.
#[derive(Debug, Clone, PartialEq)]
pub struct CosineCache<F> {
    pub xx: Array1<F>,
    pub yy: Array1<F>,
    pub xy: Array1<F>,
}

fn check_pair_shapes<F>(a: &ArrayView2<F>, b: &ArrayView2<F>) -> Result<()> {
    if a.nrows() != b.nrows() {
        return Err(LayerError::shape("second input rows", a.nrows(), b.nrows()));
    }
    if a.ncols() != b.ncols() {
        return Err(LayerError::shape("second input columns", a.ncols(), b.ncols()));
    }
    Ok(())
}

/// `s[n] = <a_n, b_n> / (|a_n| |b_n|)`.
pub fn cosine_similarity_forward<F: Real>(
    a: &ArrayView2<F>,
    b: &ArrayView2<F>,
) -> Result<(Array1<F>, CosineCache<F>)> {
    check_pair_shapes(a, b)?;
    let xx = norm_sq_batched(a);
    let yy = norm_sq_batched(b);
    ensure_positive_norms(&xx.view())?;
    ensure_positive_norms(&yy.view())?;
    let xy = dot_batched(a, b);

    let similarity = Zip::from(&xy)
        .and(&xx)
        .and(&yy)
        .map_collect(|&xy, &xx, &yy| xy / (xx.sqrt() * yy.sqrt()));
    Ok((similarity, CosineCache { xx, yy, xy }))
}

/// Gradients w.r.t. both inputs given the gradient w.r.t. each row similarity.
pub fn cosine_similarity_backward<F: Real>(
    d_similarity: &ArrayView1<F>,
    a: &ArrayView2<F>,
    b: &ArrayView2<F>,
    cache: &CosineCache<F>,
) -> Result<(Array2<F>, Array2<F>)> {
    check_pair_shapes(a, b)?;
    let n = a.nrows();
    if d_similarity.len() != n {
        return Err(LayerError::shape("similarity gradient", n, d_similarity.len()));
    }
    if cache.xy.len() != n {
        return Err(LayerError::shape("cached rows", n, cache.xy.len()));
    }

    let den = Zip::from(&cache.xx)
        .and(&cache.yy)
        .map_collect(|&xx, &yy| xx.sqrt() * yy.sqrt());
    let similarity = &cache.xy / &den;
    let ds = d_similarity.insert_axis(Axis(1));
    let den_col = den.view().insert_axis(Axis(1));
    let coeff_a = (&similarity / &cache.xx).insert_axis(Axis(1));
    let coeff_b = (&similarity / &cache.yy).insert_axis(Axis(1));

    let grad_a = &ds * &(&(b / &den_col) - &(a * &coeff_a));
    let grad_b = &ds * &(&(a / &den_col) - &(b * &coeff_b));
    Ok((grad_a, grad_b))
}

/// Row-wise cosine similarity layer. It has no parameters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CosineSimilarityConfig {}

#[derive(Debug, Clone, Default)]
pub struct CosineSimilarity {
    config: CosineSimilarityConfig,
}

impl CosineSimilarity {
    pub fn new(config: CosineSimilarityConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CosineSimilarityConfig {
        &self.config
    }

    pub fn forward<F: Real>(
        &self,
        a: &ArrayView2<F>,
        b: &ArrayView2<F>,
    ) -> Result<(Array1<F>, CosineCache<F>)> {
        cosine_similarity_forward(a, b)
    }

    pub fn backward<F: Real>(
        &self,
        d_similarity: &ArrayView1<F>,
        a: &ArrayView2<F>,
        b: &ArrayView2<F>,
        cache: &CosineCache<F>,
    ) -> Result<(Array2<F>, Array2<F>)> {
        cosine_similarity_backward(d_similarity, a, b, cache)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::{arr1, arr2};

    const EPSILON: f64 = 1e-6;

    #[test]
    fn test_forward_known_values() {
        let a = arr2(&[[1.0, 0.0], [1.0, 1.0], [2.0, 0.0]]);
        let b = arr2(&[[0.0, 3.0], [2.0, 2.0], [-1.0, 0.0]]);
        let (s, cache) = cosine_similarity_forward(&a.view(), &b.view()).unwrap();
        assert_relative_eq!(s, arr1(&[0.0, 1.0, -1.0]), epsilon = EPSILON);
        assert_relative_eq!(cache.xy, arr1(&[0.0, 4.0, -2.0]), epsilon = EPSILON);
    }

    #[test]
    fn test_gradient_matches_finite_differences() {
        let a = arr2(&[[0.3, -1.2, 0.8], [1.5, 0.4, -0.2]]);
        let b = arr2(&[[0.9, 0.1, -0.5], [-0.7, 1.1, 0.6]]);
        let ds = arr1(&[0.7, -1.3]);
        let (_, cache) = cosine_similarity_forward(&a.view(), &b.view()).unwrap();
        let (grad_a, grad_b) =
            cosine_similarity_backward(&ds.view(), &a.view(), &b.view(), &cache).unwrap();

        let loss = |a: &Array2<f64>, b: &Array2<f64>| {
            let (s, _) = cosine_similarity_forward(&a.view(), &b.view()).unwrap();
            s.dot(&ds)
        };
        let h = 1e-6;
        for ((r, c), &g) in grad_a.indexed_iter() {
            let mut plus = a.clone();
            plus[[r, c]] += h;
            let mut minus = a.clone();
            minus[[r, c]] -= h;
            let numeric = (loss(&plus, &b) - loss(&minus, &b)) / (2.0 * h);
            assert_relative_eq!(g, numeric, epsilon = 1e-6, max_relative = 1e-4);
        }
        for ((r, c), &g) in grad_b.indexed_iter() {
            let mut plus = b.clone();
            plus[[r, c]] += h;
            let mut minus = b.clone();
            minus[[r, c]] -= h;
            let numeric = (loss(&a, &plus) - loss(&a, &minus)) / (2.0 * h);
            assert_relative_eq!(g, numeric, epsilon = 1e-6, max_relative = 1e-4);
        }
    }

    #[test]
    fn test_gradient_is_orthogonal_to_own_row() {
        // cosine similarity is scale invariant in each argument
        let a = arr2(&[[0.3_f64, -1.2, 0.8]]);
        let b = arr2(&[[0.9_f64, 0.1, -0.5]]);
        let ds = arr1(&[1.0]);
        let layer = CosineSimilarity::default();
        let (_, cache) = layer.forward(&a.view(), &b.view()).unwrap();
        let (grad_a, grad_b) = layer
            .backward(&ds.view(), &a.view(), &b.view(), &cache)
            .unwrap();
        assert_relative_eq!(grad_a.row(0).dot(&a.row(0)), 0.0, epsilon = 1e-12);
        assert_relative_eq!(grad_b.row(0).dot(&b.row(0)), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_extreme_magnitudes_stay_in_range() {
        let ds = arr1(&[1.0_f32]);
        for &scale in &[1e10_f32, 1e-12] {
            let a = arr2(&[[scale, scale]]);
            let (s, cache) = cosine_similarity_forward(&a.view(), &a.view()).unwrap();
            assert_relative_eq!(s[0], 1.0, epsilon = 1e-5);
            let (grad_a, grad_b) =
                cosine_similarity_backward(&ds.view(), &a.view(), &a.view(), &cache).unwrap();
            assert!(grad_a.iter().chain(grad_b.iter()).all(|v| v.is_finite()));
        }
    }

    #[test]
    fn test_errors() {
        let a = arr2(&[[1.0, 0.0], [0.0, 0.0]]);
        let b = arr2(&[[1.0, 1.0], [1.0, 1.0]]);
        assert_eq!(
            cosine_similarity_forward(&a.view(), &b.view()).unwrap_err(),
            LayerError::DegenerateVector { index: 1 }
        );
        let c = arr2(&[[1.0, 1.0, 1.0]]);
        assert!(matches!(
            cosine_similarity_forward(&b.view(), &c.view()),
            Err(LayerError::ShapeMismatch { .. })
        ));
    }
}
