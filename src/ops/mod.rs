pub mod batch;
pub mod pair_index;

use std::fmt::Debug;

use ndarray::ScalarOperand;
use num_traits::{Float, ToPrimitive};

use crate::error::{LayerError, Result};

pub use self::batch::{dot_batched, ensure_positive_norms, gram_matrix, norm_sq_batched};
pub use self::pair_index::{pair_coords, pair_count, pair_index, pairs, row_offset};

/// Floating-point element type accepted by every layer (`f32`, `f64`).
pub trait Real: Float + ScalarOperand + Debug + Send + Sync + 'static {}

impl<T> Real for T where T: Float + ScalarOperand + Debug + Send + Sync + 'static {}

/// Converts a configuration value into the layer's element type.
pub(crate) fn cast<F: Real, T: ToPrimitive + Debug + Copy>(value: T, name: &str) -> Result<F> {
    F::from(value).ok_or_else(|| {
        LayerError::InvalidConfiguration(format!("{} = {:?} is not representable", name, value))
    })
}
