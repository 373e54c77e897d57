//! Closed set of layer kinds and their configurations.
//!
//! Hosts that address layers by type name resolve the name through
//! [`LayerKind::from_str`] and load parameters through the serde-tagged
//! [`LayerConfig`], e.g.
//!
//! ```text
//! { "type": "CosineSimilarityBatch", "eliminate_pos_same_group": true }
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::{
    BinomialDevianceConfig, BinomialDevianceLoss, CosineSimilarity, CosineSimilarityBatch,
    CosineSimilarityBatchConfig, CosineSimilarityConfig, GradientScaler, GradientScalerConfig,
    MeanAcrossBatch, MeanAcrossBatchConfig,
};
use crate::error::{LayerError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LayerKind {
    CosineSimilarityBatch,
    CosineSimilarity,
    BinomialDevianceLoss,
    MeanAcrossBatch,
    GradientScaler,
}

impl LayerKind {
    pub const ALL: [LayerKind; 5] = [
        LayerKind::CosineSimilarityBatch,
        LayerKind::CosineSimilarity,
        LayerKind::BinomialDevianceLoss,
        LayerKind::MeanAcrossBatch,
        LayerKind::GradientScaler,
    ];

    pub fn type_name(self) -> &'static str {
        match self {
            LayerKind::CosineSimilarityBatch => "CosineSimilarityBatch",
            LayerKind::CosineSimilarity => "CosineSimilarity",
            LayerKind::BinomialDevianceLoss => "BinomialDevianceLoss",
            LayerKind::MeanAcrossBatch => "MeanAcrossBatch",
            LayerKind::GradientScaler => "GradientScaler",
        }
    }

    /// Configuration with every parameter at its default.
    pub fn default_config(self) -> LayerConfig {
        match self {
            LayerKind::CosineSimilarityBatch => {
                LayerConfig::CosineSimilarityBatch(CosineSimilarityBatchConfig::default())
            }
            LayerKind::CosineSimilarity => {
                LayerConfig::CosineSimilarity(CosineSimilarityConfig::default())
            }
            LayerKind::BinomialDevianceLoss => {
                LayerConfig::BinomialDevianceLoss(BinomialDevianceConfig::default())
            }
            LayerKind::MeanAcrossBatch => {
                LayerConfig::MeanAcrossBatch(MeanAcrossBatchConfig::default())
            }
            LayerKind::GradientScaler => {
                LayerConfig::GradientScaler(GradientScalerConfig::default())
            }
        }
    }
}

impl fmt::Display for LayerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

impl FromStr for LayerKind {
    type Err = LayerError;

    fn from_str(s: &str) -> Result<Self> {
        LayerKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.type_name() == s)
            .ok_or_else(|| LayerError::UnknownLayer(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum LayerConfig {
    CosineSimilarityBatch(CosineSimilarityBatchConfig),
    CosineSimilarity(CosineSimilarityConfig),
    BinomialDevianceLoss(BinomialDevianceConfig),
    MeanAcrossBatch(MeanAcrossBatchConfig),
    GradientScaler(GradientScalerConfig),
}

impl LayerConfig {
    pub fn kind(&self) -> LayerKind {
        match self {
            LayerConfig::CosineSimilarityBatch(_) => LayerKind::CosineSimilarityBatch,
            LayerConfig::CosineSimilarity(_) => LayerKind::CosineSimilarity,
            LayerConfig::BinomialDevianceLoss(_) => LayerKind::BinomialDevianceLoss,
            LayerConfig::MeanAcrossBatch(_) => LayerKind::MeanAcrossBatch,
            LayerConfig::GradientScaler(_) => LayerKind::GradientScaler,
        }
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            LayerConfig::CosineSimilarityBatch(c) => c.validate(),
            LayerConfig::CosineSimilarity(_) => Ok(()),
            LayerConfig::BinomialDevianceLoss(c) => c.validate(),
            LayerConfig::MeanAcrossBatch(c) => c.validate(),
            LayerConfig::GradientScaler(c) => c.validate(),
        }
    }

    /// Validates the configuration and builds the layer it describes.
    pub fn build(&self) -> Result<Layer> {
        Ok(match self {
            LayerConfig::CosineSimilarityBatch(c) => {
                Layer::CosineSimilarityBatch(CosineSimilarityBatch::new(*c)?)
            }
            LayerConfig::CosineSimilarity(c) => Layer::CosineSimilarity(CosineSimilarity::new(*c)),
            LayerConfig::BinomialDevianceLoss(c) => {
                Layer::BinomialDevianceLoss(BinomialDevianceLoss::new(*c)?)
            }
            LayerConfig::MeanAcrossBatch(c) => Layer::MeanAcrossBatch(MeanAcrossBatch::new(*c)?),
            LayerConfig::GradientScaler(c) => Layer::GradientScaler(GradientScaler::new(*c)?),
        })
    }
}

/// A configured layer of any kind.
///
/// The layers take different inputs, so callers match on the variant and
/// call its typed `forward`/`backward`.
#[derive(Debug, Clone)]
pub enum Layer {
    CosineSimilarityBatch(CosineSimilarityBatch),
    CosineSimilarity(CosineSimilarity),
    BinomialDevianceLoss(BinomialDevianceLoss),
    MeanAcrossBatch(MeanAcrossBatch),
    GradientScaler(GradientScaler),
}

impl Layer {
    pub fn kind(&self) -> LayerKind {
        match self {
            Layer::CosineSimilarityBatch(_) => LayerKind::CosineSimilarityBatch,
            Layer::CosineSimilarity(_) => LayerKind::CosineSimilarity,
            Layer::BinomialDevianceLoss(_) => LayerKind::BinomialDevianceLoss,
            Layer::MeanAcrossBatch(_) => LayerKind::MeanAcrossBatch,
            Layer::GradientScaler(_) => LayerKind::GradientScaler,
        }
    }
}
