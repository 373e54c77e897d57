//! Gradient reversal with a scheduled coefficient.
//!
//! Forward is the identity. Backward multiplies the incoming gradient by
//! `-coeff`, where
//!
//! ```text
//! progress = min(iter / max_iter, 1)
//! height   = upper_bound - lower_bound
//! coeff    = 2 * height / (1 + exp(-alpha * progress)) - height + lower_bound
//! ```
//!
//! so the coefficient starts at `lower_bound` and approaches `upper_bound`
//! as training progresses. The current iteration is passed in explicitly.

use log::trace;
use ndarray::{Array, ArrayView, Dimension};
use serde::{Deserialize, Serialize};

use crate::error::{LayerError, Result};
use crate::ops::{cast, Real};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GradientScalerConfig {
    pub lower_bound: f32,
    pub upper_bound: f32,
    /// Steepness of the transition between the bounds.
    pub alpha: f32,
    pub max_iter: f32,
}

impl Default for GradientScalerConfig {
    fn default() -> Self {
        Self {
            lower_bound: 0.0,
            upper_bound: 1.0,
            alpha: 10.0,
            max_iter: 1.0,
        }
    }
}

impl GradientScalerConfig {
    pub fn validate(&self) -> Result<()> {
        let values = [
            ("lower_bound", self.lower_bound),
            ("upper_bound", self.upper_bound),
            ("alpha", self.alpha),
            ("max_iter", self.max_iter),
        ];
        if let Some((name, value)) = values.iter().find(|(_, v)| !v.is_finite()) {
            return Err(LayerError::InvalidConfiguration(format!(
                "{} must be finite, got {}",
                name, value
            )));
        }
        if self.max_iter <= 0.0 {
            return Err(LayerError::InvalidConfiguration(format!(
                "max_iter must be positive, got {}",
                self.max_iter
            )));
        }
        Ok(())
    }

    /// Scaling coefficient at `step`.
    pub fn coefficient(&self, step: TrainingStep) -> f32 {
        let progress = (step.iter as f32 / self.max_iter).min(1.0);
        let height = self.upper_bound - self.lower_bound;
        2.0 * height / (1.0 + (-self.alpha * progress).exp()) - height + self.lower_bound
    }
}

/// Position in the training run, supplied by the caller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TrainingStep {
    pub iter: u64,
}

impl TrainingStep {
    pub fn new(iter: u64) -> Self {
        Self { iter }
    }
}

pub fn gradient_scaler_forward<F: Real, D: Dimension>(x: &ArrayView<F, D>) -> Array<F, D> {
    x.to_owned()
}

pub fn gradient_scaler_backward<F: Real, D: Dimension>(
    grad_output: &ArrayView<F, D>,
    step: TrainingStep,
    config: &GradientScalerConfig,
) -> Result<Array<F, D>> {
    config.validate()?;
    let coeff = config.coefficient(step);
    trace!("gradient scaler: iter={} coeff={}", step.iter, coeff);
    let scale: F = cast(-coeff, "coefficient")?;
    Ok(grad_output.mapv(|g| g * scale))
}

#[derive(Debug, Clone, Default)]
pub struct GradientScaler {
    config: GradientScalerConfig,
}

impl GradientScaler {
    pub fn new(config: GradientScalerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &GradientScalerConfig {
        &self.config
    }

    pub fn coefficient(&self, step: TrainingStep) -> f32 {
        self.config.coefficient(step)
    }

    pub fn forward<F: Real, D: Dimension>(&self, x: &ArrayView<F, D>) -> Array<F, D> {
        gradient_scaler_forward(x)
    }

    pub fn backward<F: Real, D: Dimension>(
        &self,
        grad_output: &ArrayView<F, D>,
        step: TrainingStep,
    ) -> Result<Array<F, D>> {
        gradient_scaler_backward(grad_output, step, &self.config)
    }
}
