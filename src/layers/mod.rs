pub mod binomial_deviance;
pub mod cosine;
pub mod cosine_batch;
pub mod gradient_scaler;
pub mod mean_across_batch;
pub mod registry;

pub use self::binomial_deviance::{
    binomial_deviance_backward, binomial_deviance_forward, BinomialDevianceCache,
    BinomialDevianceConfig, BinomialDevianceLoss,
};
pub use self::cosine::{
    cosine_similarity_backward, cosine_similarity_forward, CosineCache, CosineSimilarity,
    CosineSimilarityConfig,
};
pub use self::cosine_batch::{
    cosine_similarity_batch_backward, cosine_similarity_batch_forward, CosineSimilarityBatch,
    CosineSimilarityBatchConfig, GramCache, PairOutput,
};
pub use self::gradient_scaler::{
    gradient_scaler_backward, gradient_scaler_forward, GradientScaler, GradientScalerConfig,
    TrainingStep,
};
pub use self::mean_across_batch::{
    mean_across_batch_backward, mean_across_batch_forward, MeanAcrossBatch,
    MeanAcrossBatchConfig,
};
pub use self::registry::{Layer, LayerConfig, LayerKind};
