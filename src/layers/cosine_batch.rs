//! Pairwise cosine similarity over a batch, with positive/negative pair
//! labelling and an elimination mask driven by per-sample labels and group
//! ids (e.g. identity and camera id for re-identification).
//!
//! Forward produces one entry per unordered pair in the packed
//! upper-triangular order of [`crate::ops::pair_index`]. The Gram matrix it
//! computes is handed back as a [`GramCache`] and must be passed to the
//! matching backward call.

use log::debug;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{LayerError, Result};
use crate::ops::{cast, ensure_positive_norms, gram_matrix, pair_count, pair_index, Real};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CosineSimilarityBatchConfig {
    /// Pair label written for samples sharing a label.
    pub pos_label: i32,
    /// Pair label written for samples with different labels.
    pub neg_label: i32,
    pub eliminate_pos: bool,
    pub eliminate_neg: bool,
    /// Mask out positive pairs whose samples share a group id.
    pub eliminate_pos_same_group: bool,
    /// Mask out negative pairs whose samples share a group id.
    pub eliminate_neg_same_group: bool,
}

impl Default for CosineSimilarityBatchConfig {
    fn default() -> Self {
        Self {
            pos_label: 1,
            neg_label: -1,
            eliminate_pos: false,
            eliminate_neg: false,
            eliminate_pos_same_group: false,
            eliminate_neg_same_group: false,
        }
    }
}

impl CosineSimilarityBatchConfig {
    pub fn validate(&self) -> Result<()> {
        if self.pos_label == self.neg_label {
            return Err(LayerError::InvalidConfiguration(format!(
                "pos_label and neg_label must differ (both {})",
                self.pos_label
            )));
        }
        Ok(())
    }
}

/// Dot products among the rows of one feature batch, `xy[i][j] = <x_i, x_j>`.
///
/// Only built through [`GramCache::compute`] or [`GramCache::from_matrix`],
/// both of which reject rows with a non-positive squared norm, so every
/// cache reaching backward describes well-defined similarities.
#[derive(Debug, Clone, PartialEq)]
pub struct GramCache<F> {
    xy: Array2<F>,
    norms: Array1<F>,
}

impl<F: Real> GramCache<F> {
    pub fn compute(features: &ArrayView2<F>) -> Result<Self> {
        Self::from_matrix(gram_matrix(features))
    }

    /// Wraps a precomputed square Gram matrix.
    pub fn from_matrix(xy: Array2<F>) -> Result<Self> {
        let (rows, cols) = xy.dim();
        if rows != cols {
            return Err(LayerError::shape("gram matrix columns", rows, cols));
        }
        ensure_positive_norms(&xy.diag())?;
        let norms = xy.diag().mapv(F::sqrt);
        Ok(Self { xy, norms })
    }

    pub fn num_samples(&self) -> usize {
        self.xy.nrows()
    }

    /// Squared norms `g[i] = <x_i, x_i>`.
    pub fn norms_sq(&self) -> ArrayView1<'_, F> {
        self.xy.diag()
    }

    /// Row norms `|x_i|`. Denominators are products of these, never of
    /// squared norms, so they stay finite whenever each `g[i]` is.
    pub fn norms(&self) -> ArrayView1<'_, F> {
        self.norms.view()
    }

    pub fn dot(&self, i: usize, j: usize) -> F {
        self.xy[[i, j]]
    }

    pub fn as_matrix(&self) -> ArrayView2<'_, F> {
        self.xy.view()
    }

    pub fn into_matrix(self) -> Array2<F> {
        self.xy
    }
}

/// Per-pair outputs of the forward pass, all of length `n(n-1)/2`.
#[derive(Debug, Clone, PartialEq)]
pub struct PairOutput<F> {
    pub similarity: Array1<F>,
    pub pair_label: Array1<F>,
    /// 1 if the pair takes part in the loss, 0 if it was eliminated.
    pub mask: Array1<F>,
    /// Positive pairs with mask 1.
    pub num_positive: usize,
    /// Negative pairs with mask 1.
    pub num_negative: usize,
}

impl<F> PairOutput<F> {
    pub fn len(&self) -> usize {
        self.similarity.len()
    }

    pub fn is_empty(&self) -> bool {
        self.similarity.is_empty()
    }
}

#[derive(Debug, Clone, Copy)]
struct EliminationPolicy {
    pos: bool,
    neg: bool,
    pos_same_group: bool,
    neg_same_group: bool,
}

impl EliminationPolicy {
    fn new(config: &CosineSimilarityBatchConfig, has_groups: bool) -> Self {
        let (pos_same_group, neg_same_group) = if has_groups {
            (config.eliminate_pos_same_group, config.eliminate_neg_same_group)
        } else {
            if config.eliminate_pos_same_group || config.eliminate_neg_same_group {
                debug!("no group ids supplied, same-group elimination disabled");
            }
            (false, false)
        };
        Self {
            pos: config.eliminate_pos,
            neg: config.eliminate_neg,
            pos_same_group,
            neg_same_group,
        }
    }

    fn keeps(&self, positive: bool, same_group: bool) -> bool {
        if positive {
            !(self.pos || (self.pos_same_group && same_group))
        } else {
            !(self.neg || (self.neg_same_group && same_group))
        }
    }
}

#[derive(Clone, Copy)]
struct PairEntry<F> {
    similarity: F,
    positive: bool,
    keep: bool,
}

pub fn cosine_similarity_batch_forward<F: Real>(
    features: &ArrayView2<F>,
    labels: &ArrayView1<F>,
    groups: Option<&ArrayView1<F>>,
    config: &CosineSimilarityBatchConfig,
) -> Result<(PairOutput<F>, GramCache<F>)> {
    config.validate()?;
    let (n, dim) = features.dim();
    if n == 0 {
        return Err(LayerError::InvalidConfiguration("empty feature batch".into()));
    }
    if dim == 0 {
        return Err(LayerError::InvalidConfiguration(
            "feature dimension must be at least 1".into(),
        ));
    }
    if labels.len() != n {
        return Err(LayerError::shape("labels", n, labels.len()));
    }
    if let Some(groups) = groups {
        if groups.len() != n {
            return Err(LayerError::shape("group ids", n, groups.len()));
        }
    }
    let pos_label: F = cast(config.pos_label, "pos_label")?;
    let neg_label: F = cast(config.neg_label, "neg_label")?;
    if pos_label == neg_label {
        return Err(LayerError::InvalidConfiguration(format!(
            "pos_label {} and neg_label {} are equal in the feature element type",
            config.pos_label, config.neg_label
        )));
    }

    let cache = GramCache::compute(features)?;
    let policy = EliminationPolicy::new(config, groups.is_some());
    let norms = cache.norms();

    let rows: Vec<Vec<PairEntry<F>>> = (0..n)
        .into_par_iter()
        .map(|i| {
            (i + 1..n)
                .map(|j| {
                    let positive = labels[i] == labels[j];
                    let same_group = match groups {
                        Some(g) => g[i] == g[j],
                        None => false,
                    };
                    PairEntry {
                        similarity: cache.dot(i, j) / (norms[i] * norms[j]),
                        positive,
                        keep: policy.keeps(positive, same_group),
                    }
                })
                .collect()
        })
        .collect();

    let m = pair_count(n);
    let mut similarity = Array1::zeros(m);
    let mut pair_label = Array1::zeros(m);
    let mut mask = Array1::zeros(m);
    let mut num_positive = 0;
    let mut num_negative = 0;
    for (k, entry) in rows.iter().flatten().enumerate() {
        similarity[k] = entry.similarity;
        pair_label[k] = if entry.positive { pos_label } else { neg_label };
        if entry.keep {
            mask[k] = F::one();
            if entry.positive {
                num_positive += 1;
            } else {
                num_negative += 1;
            }
        }
    }
    debug!(
        "cosine similarity batch: n={} dim={} pairs={} active positive={} active negative={}",
        n, dim, m, num_positive, num_negative
    );

    let output = PairOutput {
        similarity,
        pair_label,
        mask,
        num_positive,
        num_negative,
    };
    Ok((output, cache))
}

/// Gradient of the loss w.r.t. the features, given its gradient w.r.t. every
/// pair similarity. Pairs with mask 0 are skipped entirely.
pub fn cosine_similarity_batch_backward<F: Real>(
    d_similarity: &ArrayView1<F>,
    mask: &ArrayView1<F>,
    features: &ArrayView2<F>,
    cache: &GramCache<F>,
) -> Result<Array2<F>> {
    let n = cache.num_samples();
    if features.nrows() != n {
        return Err(LayerError::shape("features", n, features.nrows()));
    }
    let m = pair_count(n);
    if d_similarity.len() != m {
        return Err(LayerError::shape("similarity gradient", m, d_similarity.len()));
    }
    if mask.len() != m {
        return Err(LayerError::shape("mask", m, mask.len()));
    }

    let norms_sq = cache.norms_sq();
    let norms = cache.norms();
    let mut grad = Array2::zeros(features.raw_dim());
    grad.axis_iter_mut(Axis(0))
        .into_par_iter()
        .enumerate()
        .for_each(|(i, mut row)| {
            let x_i = features.row(i);
            let g_i = norms_sq[i];
            for j in 0..n {
                let k = match pair_index(n, i, j) {
                    Some(k) => k,
                    None => continue,
                };
                if mask[k] == F::zero() {
                    continue;
                }
                let upstream = d_similarity[k] * mask[k];
                let den = norms[i] * norms[j];
                let similarity = cache.dot(i, j) / den;
                row.scaled_add(upstream / den, &features.row(j));
                row.scaled_add(-upstream * similarity / g_i, &x_i);
            }
        });
    Ok(grad)
}

/// Configured pairwise cosine similarity layer.
#[derive(Debug, Clone, Default)]
pub struct CosineSimilarityBatch {
    config: CosineSimilarityBatchConfig,
}

impl CosineSimilarityBatch {
    pub fn new(config: CosineSimilarityBatchConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &CosineSimilarityBatchConfig {
        &self.config
    }

    pub fn forward<F: Real>(
        &self,
        features: &ArrayView2<F>,
        labels: &ArrayView1<F>,
        groups: Option<&ArrayView1<F>>,
    ) -> Result<(PairOutput<F>, GramCache<F>)> {
        cosine_similarity_batch_forward(features, labels, groups, &self.config)
    }

    pub fn backward<F: Real>(
        &self,
        d_similarity: &ArrayView1<F>,
        mask: &ArrayView1<F>,
        features: &ArrayView2<F>,
        cache: &GramCache<F>,
    ) -> Result<Array2<F>> {
        cosine_similarity_batch_backward(d_similarity, mask, features, cache)
    }
}
