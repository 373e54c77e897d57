use approx::assert_relative_eq;
use metric_layers::layers::{cosine_similarity_batch_backward, cosine_similarity_batch_forward};
use metric_layers::ops::{pair_index, pairs};
use metric_layers::{CosineSimilarityBatch, CosineSimilarityBatchConfig, GramCache, LayerError};
use ndarray::{arr1, arr2, Array1, Array2, Axis};
use ndarray_rand::rand_distr::Uniform;
use ndarray_rand::RandomExt;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn random_batch(rng: &mut StdRng, n: usize, dim: usize) -> Array2<f64> {
    Array2::random_using((n, dim), Uniform::new(-1.0, 1.0), rng)
}

fn random_labels(rng: &mut StdRng, n: usize, classes: u32) -> Array1<f64> {
    Array1::from_shape_fn(n, |_| rng.gen_range(0..classes) as f64)
}

/// `sum_k w_k * similarity_k`, the scalar whose gradient backward computes
/// when fed `w` as the upstream gradient.
fn weighted_similarity(x: &Array2<f64>, labels: &Array1<f64>, w: &Array1<f64>) -> f64 {
    let (out, _) = cosine_similarity_batch_forward(
        &x.view(),
        &labels.view(),
        None,
        &CosineSimilarityBatchConfig::default(),
    )
    .unwrap();
    out.similarity.dot(w)
}

#[test]
fn test_gradient_matches_finite_differences() {
    let mut rng = StdRng::seed_from_u64(7);
    for &(n, dim) in &[(2, 1), (3, 4), (6, 5), (9, 3)] {
        let x = random_batch(&mut rng, n, dim);
        let labels = random_labels(&mut rng, n, 3);
        let layer = CosineSimilarityBatch::default();
        let (out, cache) = layer.forward(&x.view(), &labels.view(), None).unwrap();
        let w = Array1::random_using(out.len(), Uniform::new(-1.0, 1.0), &mut rng);
        let grad = layer
            .backward(&w.view(), &out.mask.view(), &x.view(), &cache)
            .unwrap();
        assert_eq!(grad.dim(), (n, dim));

        let h = 1e-6;
        for ((i, c), &analytic) in grad.indexed_iter() {
            let mut plus = x.clone();
            plus[[i, c]] += h;
            let mut minus = x.clone();
            minus[[i, c]] -= h;
            let numeric = (weighted_similarity(&plus, &labels, &w)
                - weighted_similarity(&minus, &labels, &w))
                / (2.0 * h);
            assert_relative_eq!(analytic, numeric, epsilon = 1e-7, max_relative = 1e-4);
        }
    }
}

#[test]
fn test_masked_pair_contributes_exactly_zero() {
    let mut rng = StdRng::seed_from_u64(11);
    let (n, dim) = (5, 4);
    let x = random_batch(&mut rng, n, dim);
    let labels = random_labels(&mut rng, n, 2);
    let (out, cache) = cosine_similarity_batch_forward(
        &x.view(),
        &labels.view(),
        None,
        &CosineSimilarityBatchConfig::default(),
    )
    .unwrap();
    let d_sim = Array1::random_using(out.len(), Uniform::new(-1.0, 1.0), &mut rng);

    let (i0, j0) = (1, 3);
    let k0 = pair_index(n, i0, j0).unwrap();
    let full =
        cosine_similarity_batch_backward(&d_sim.view(), &out.mask.view(), &x.view(), &cache)
            .unwrap();
    let mut masked = out.mask.clone();
    masked[k0] = 0.0;
    let without =
        cosine_similarity_batch_backward(&d_sim.view(), &masked.view(), &x.view(), &cache).unwrap();

    let diff = &full - &without;
    for r in 0..n {
        if r != i0 && r != j0 {
            assert!(diff.row(r).iter().all(|&v| v == 0.0), "row {} changed", r);
        }
    }

    // the difference isolates exactly the contribution of (i0, j0)
    let g = cache.norms_sq();
    let xy = cache.dot(i0, j0);
    let den = (g[i0] * g[j0]).sqrt();
    let expected_i = (&x.row(j0) / den - &x.row(i0) * (xy / (g[i0] * den))) * d_sim[k0];
    let expected_j = (&x.row(i0) / den - &x.row(j0) * (xy / (g[j0] * den))) * d_sim[k0];
    assert_relative_eq!(diff.row(i0), expected_i.view(), epsilon = 1e-12);
    assert_relative_eq!(diff.row(j0), expected_j.view(), epsilon = 1e-12);
}

#[test]
fn test_masked_pair_ignores_non_finite_upstream_gradient() {
    let x = arr2(&[[1.0, 0.5], [0.2, -1.0], [0.7, 0.7]]);
    let labels = arr1(&[1.0, 1.0, 2.0]);
    let config = CosineSimilarityBatchConfig {
        eliminate_pos: true,
        ..Default::default()
    };
    let (out, cache) =
        cosine_similarity_batch_forward(&x.view(), &labels.view(), None, &config).unwrap();
    assert_eq!(out.mask, arr1(&[0.0, 1.0, 1.0]));

    let d_sim = arr1(&[f64::NAN, 1.0, 1.0]);
    let grad =
        cosine_similarity_batch_backward(&d_sim.view(), &out.mask.view(), &x.view(), &cache)
            .unwrap();
    assert!(grad.iter().all(|v| v.is_finite()));
}

#[test]
fn test_identical_and_orthogonal_vectors() {
    let x = arr2(&[
        [0.3_f32, -2.0, 1.1],
        [2.0, 0.3, 0.0],
        [0.3, -2.0, 1.1],
        [0.0, 0.0, 4.0],
    ]);
    let labels = arr1(&[0.0_f32, 1.0, 0.0, 2.0]);
    let (out, _) = cosine_similarity_batch_forward(
        &x.view(),
        &labels.view(),
        None,
        &CosineSimilarityBatchConfig::default(),
    )
    .unwrap();
    // rows 0 and 2 are equal, rows 0 and 1 are orthogonal
    assert_relative_eq!(out.similarity[pair_index(4, 0, 2).unwrap()], 1.0, epsilon = 1e-5);
    assert_relative_eq!(out.similarity[pair_index(4, 0, 1).unwrap()], 0.0, epsilon = 1e-5);
    assert_relative_eq!(out.similarity[pair_index(4, 1, 3).unwrap()], 0.0, epsilon = 1e-5);
}

#[test]
fn test_similarity_is_independent_of_row_order_within_pair() {
    let mut rng = StdRng::seed_from_u64(3);
    let n = 6;
    let x = random_batch(&mut rng, n, 8);
    let labels = random_labels(&mut rng, n, 2);
    let (out, _) = cosine_similarity_batch_forward(
        &x.view(),
        &labels.view(),
        None,
        &CosineSimilarityBatchConfig::default(),
    )
    .unwrap();

    for (k, (i, j)) in pairs(n).enumerate() {
        let swapped = ndarray::stack(Axis(0), &[x.row(j), x.row(i)]).unwrap();
        let pair_labels = arr1(&[labels[j], labels[i]]);
        let (pair_out, _) = cosine_similarity_batch_forward(
            &swapped.view(),
            &pair_labels.view(),
            None,
            &CosineSimilarityBatchConfig::default(),
        )
        .unwrap();
        assert_relative_eq!(out.similarity[k], pair_out.similarity[0], epsilon = 1e-12);
        assert_eq!(out.pair_label[k], pair_out.pair_label[0]);
        assert!(out.similarity[k].abs() <= 1.0 + 1e-12);
    }
}

#[test]
fn test_group_elimination_example() {
    let x = arr2(&[[1.0, 0.0], [0.5, 0.5], [0.0, 1.0], [-1.0, 0.2]]);
    let labels = arr1(&[1.0, 1.0, 1.0, 1.0]);
    let groups = arr1(&[10.0, 10.0, 20.0, 20.0]);
    let config = CosineSimilarityBatchConfig {
        eliminate_pos_same_group: true,
        ..Default::default()
    };
    let (out, _) =
        cosine_similarity_batch_forward(&x.view(), &labels.view(), Some(&groups.view()), &config)
            .unwrap();

    for (k, (i, j)) in pairs(4).enumerate() {
        let expected = if groups[i] == groups[j] { 0.0 } else { 1.0 };
        assert_eq!(out.mask[k], expected, "pair ({}, {})", i, j);
        assert_eq!(out.pair_label[k], 1.0);
    }
}

#[test]
fn test_degenerate_vector_policy_is_uniform() {
    let x = arr2(&[[1.0, 1.0], [2.0, -1.0], [0.0, 0.0]]);
    let labels = arr1(&[1.0, 2.0, 3.0]);
    assert_eq!(
        cosine_similarity_batch_forward(
            &x.view(),
            &labels.view(),
            None,
            &CosineSimilarityBatchConfig::default()
        )
        .unwrap_err(),
        LayerError::DegenerateVector { index: 2 }
    );
    // a cache handed in from outside goes through the same check
    let gram = x.dot(&x.t());
    assert_eq!(
        GramCache::from_matrix(gram).unwrap_err(),
        LayerError::DegenerateVector { index: 2 }
    );
}

#[test]
fn test_single_sample_batch() {
    let x = arr2(&[[0.5, -0.25, 2.0, 1.0]]);
    let labels = arr1(&[4.0]);
    let layer = CosineSimilarityBatch::default();
    let (out, cache) = layer.forward(&x.view(), &labels.view(), None).unwrap();
    assert_eq!(out.len(), 0);
    assert_eq!(out.num_positive + out.num_negative, 0);

    let grad = layer
        .backward(&out.similarity.view(), &out.mask.view(), &x.view(), &cache)
        .unwrap();
    assert_eq!(grad, Array2::<f64>::zeros((1, 4)));
}
