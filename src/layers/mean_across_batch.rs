use ndarray::{Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

use crate::error::{LayerError, Result};
use crate::ops::{cast, Real};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeanAcrossBatchConfig {
    /// Number of consecutive rows averaged together. The last chunk may be
    /// shorter.
    pub chunk_size: usize,
}

impl Default for MeanAcrossBatchConfig {
    fn default() -> Self {
        Self { chunk_size: 1 }
    }
}

impl MeanAcrossBatchConfig {
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(LayerError::InvalidConfiguration(
                "chunk size for mean calculation must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

/// Replaces every chunk of `chunk_size` consecutive rows by the chunk mean.
///
/// The operator is symmetric, so the same function serves as its own
/// backward pass.
fn chunk_mean<F: Real>(x: &ArrayView2<F>, chunk_size: usize) -> Result<Array2<F>> {
    let mut out = Array2::zeros(x.raw_dim());
    for (chunk, mut out_chunk) in x
        .axis_chunks_iter(Axis(0), chunk_size)
        .zip(out.axis_chunks_iter_mut(Axis(0), chunk_size))
    {
        let rows: F = cast(chunk.nrows(), "chunk rows")?;
        let mean = chunk.sum_axis(Axis(0)) / rows;
        out_chunk.assign(&mean);
    }
    Ok(out)
}

pub fn mean_across_batch_forward<F: Real>(
    x: &ArrayView2<F>,
    config: &MeanAcrossBatchConfig,
) -> Result<Array2<F>> {
    config.validate()?;
    chunk_mean(x, config.chunk_size)
}

pub fn mean_across_batch_backward<F: Real>(
    grad_output: &ArrayView2<F>,
    config: &MeanAcrossBatchConfig,
) -> Result<Array2<F>> {
    config.validate()?;
    chunk_mean(grad_output, config.chunk_size)
}

#[derive(Debug, Clone, Default)]
pub struct MeanAcrossBatch {
    config: MeanAcrossBatchConfig,
}

impl MeanAcrossBatch {
    pub fn new(config: MeanAcrossBatchConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &MeanAcrossBatchConfig {
        &self.config
    }

    pub fn forward<F: Real>(&self, x: &ArrayView2<F>) -> Result<Array2<F>> {
        mean_across_batch_forward(x, &self.config)
    }

    pub fn backward<F: Real>(&self, grad_output: &ArrayView2<F>) -> Result<Array2<F>> {
        mean_across_batch_backward(grad_output, &self.config)
    }
}
