//! Metric-learning layers with explicit forward and backward passes.
//!
//! The centrepiece is [`layers::cosine_batch`]: cosine similarity between
//! every pair of samples in a batch, together with positive/negative pair
//! labels and an elimination mask derived from per-sample labels and group
//! ids. Its output feeds [`layers::binomial_deviance`].
//!
//! Kernels are generic over `f32`/`f64` and parallelised with rayon. The
//! optional `python` feature exposes the `f32` entry points as a Python
//! extension module.

pub mod error;
pub mod layers;
pub mod ops;

#[cfg(feature = "python")]
mod bindings;

pub use error::{LayerError, Result};
pub use layers::{
    BinomialDevianceConfig, BinomialDevianceLoss, CosineSimilarity, CosineSimilarityBatch,
    CosineSimilarityBatchConfig, GradientScaler, GradientScalerConfig, GramCache, Layer,
    LayerConfig, LayerKind, MeanAcrossBatch, MeanAcrossBatchConfig, PairOutput, TrainingStep,
};
pub use ops::Real;
