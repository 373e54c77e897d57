//! Binomial deviance loss over pair similarities.
//!
//! Pairs labelled `1` are pulled towards high similarity and pairs labelled
//! `-1` pushed below `beta`, with the negative side weighted by the cost
//! `c`. Each side is averaged over its own pair count and the elimination
//! mask removes pairs from both the loss and its gradient.

use log::trace;
use ndarray::{Array1, ArrayView1, Zip};
use serde::{Deserialize, Serialize};

use crate::error::{LayerError, Result};
use crate::ops::{cast, Real};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BinomialDevianceConfig {
    pub alpha: f32,
    pub beta: f32,
    /// Cost applied to negative pairs.
    pub c: f32,
}

impl Default for BinomialDevianceConfig {
    fn default() -> Self {
        Self {
            alpha: 2.0,
            beta: 0.5,
            c: 25.0,
        }
    }
}

impl BinomialDevianceConfig {
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [("alpha", self.alpha), ("beta", self.beta), ("c", self.c)] {
            if !value.is_finite() {
                return Err(LayerError::InvalidConfiguration(format!(
                    "{} must be finite, got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }
}

/// Per-pair terms kept from forward for backward.
#[derive(Debug, Clone, PartialEq)]
pub struct BinomialDevianceCache<F> {
    /// `1` for positive pairs, `-c` for negative pairs.
    pub margin_sign: Array1<F>,
    /// `1/n1` for positive pairs, `1/n2` for negative pairs, 0 otherwise.
    pub weight: Array1<F>,
    /// Exponent `z = -alpha * m * (s - beta)`.
    pub z: Array1<F>,
}

/// `ln(1 + e^z)` without overflow for large `z`.
fn softplus<F: Real>(z: F) -> F {
    if z > F::zero() {
        z + (-z).exp().ln_1p()
    } else {
        z.exp().ln_1p()
    }
}

/// `e^z / (1 + e^z)` without overflow for large `|z|`.
fn sigmoid<F: Real>(z: F) -> F {
    if z >= F::zero() {
        F::one() / (F::one() + (-z).exp())
    } else {
        let e = z.exp();
        e / (F::one() + e)
    }
}

fn check_lengths<F>(similarity: &ArrayView1<F>, other: &ArrayView1<F>, what: &'static str) -> Result<()> {
    if other.len() != similarity.len() {
        return Err(LayerError::shape(what, similarity.len(), other.len()));
    }
    Ok(())
}

pub fn binomial_deviance_forward<F: Real>(
    similarity: &ArrayView1<F>,
    pair_label: &ArrayView1<F>,
    mask: &ArrayView1<F>,
    config: &BinomialDevianceConfig,
) -> Result<(F, BinomialDevianceCache<F>)> {
    config.validate()?;
    check_lengths(similarity, pair_label, "pair labels")?;
    check_lengths(similarity, mask, "mask")?;
    let alpha: F = cast(config.alpha, "alpha")?;
    let beta: F = cast(config.beta, "beta")?;
    let c: F = cast(config.c, "c")?;

    let one = F::one();
    let n1 = pair_label.iter().filter(|&&l| l == one).count();
    let n2 = pair_label.iter().filter(|&&l| l == -one).count();
    let inv = |count: usize| -> Result<F> {
        if count == 0 {
            Ok(F::zero())
        } else {
            Ok(one / cast::<F, _>(count, "pair count")?)
        }
    };
    let (w_pos, w_neg) = (inv(n1)?, inv(n2)?);

    let margin_sign = pair_label.mapv(|l| if l == -one { -c } else { l });
    let weight = pair_label.mapv(|l| {
        if l == one {
            w_pos
        } else if l == -one {
            w_neg
        } else {
            F::zero()
        }
    });
    let z = Zip::from(similarity)
        .and(&margin_sign)
        .map_collect(|&s, &m| -alpha * m * (s - beta));

    let mut loss = F::zero();
    Zip::from(&weight)
        .and(mask)
        .and(&z)
        .for_each(|&w, &keep, &z| {
            if keep != F::zero() && w != F::zero() {
                loss = loss + w * keep * softplus(z);
            }
        });
    trace!(
        "binomial deviance: pairs={} positive={} negative={} loss={:?}",
        similarity.len(),
        n1,
        n2,
        loss
    );

    Ok((
        loss,
        BinomialDevianceCache {
            margin_sign,
            weight,
            z,
        },
    ))
}

/// Gradient w.r.t. the similarities given the upstream gradient of the
/// scalar loss.
pub fn binomial_deviance_backward<F: Real>(
    d_loss: F,
    mask: &ArrayView1<F>,
    cache: &BinomialDevianceCache<F>,
    config: &BinomialDevianceConfig,
) -> Result<Array1<F>> {
    let n = cache.z.len();
    if mask.len() != n {
        return Err(LayerError::shape("mask", n, mask.len()));
    }
    let alpha: F = cast(config.alpha, "alpha")?;

    let grad = Zip::from(mask)
        .and(&cache.weight)
        .and(&cache.margin_sign)
        .and(&cache.z)
        .map_collect(|&keep, &w, &m, &z| {
            if keep == F::zero() {
                F::zero()
            } else {
                -alpha * d_loss * w * m * sigmoid(z) * keep
            }
        });
    Ok(grad)
}

#[derive(Debug, Clone, Default)]
pub struct BinomialDevianceLoss {
    config: BinomialDevianceConfig,
}

impl BinomialDevianceLoss {
    pub fn new(config: BinomialDevianceConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &BinomialDevianceConfig {
        &self.config
    }

    pub fn forward<F: Real>(
        &self,
        similarity: &ArrayView1<F>,
        pair_label: &ArrayView1<F>,
        mask: &ArrayView1<F>,
    ) -> Result<(F, BinomialDevianceCache<F>)> {
        binomial_deviance_forward(similarity, pair_label, mask, &self.config)
    }

    pub fn backward<F: Real>(
        &self,
        d_loss: F,
        mask: &ArrayView1<F>,
        cache: &BinomialDevianceCache<F>,
    ) -> Result<Array1<F>> {
        binomial_deviance_backward(d_loss, mask, cache, &self.config)
    }
}
