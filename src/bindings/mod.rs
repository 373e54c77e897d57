mod batch;
mod cosine;
mod loss;

use pyo3::prelude::*;
use pyo3::types::PyModule;

/// Metric-learning layers: pairwise cosine similarity, binomial deviance,
/// batch means and gradient scaling.
#[pymodule]
pub fn _rust(_py: Python, m: &PyModule) -> PyResult<()> {
    m.add("__version__", env!("CARGO_PKG_VERSION"))?;
    // Cosine similarity (pairwise over the batch and row-wise)
    cosine::register(m)?;
    // Binomial deviance loss
    loss::register(m)?;
    // Mean across batch, gradient scaler
    batch::register(m)?;
    Ok(())
}
