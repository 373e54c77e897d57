use numpy::{IntoPyArray, PyArray1, PyReadonlyArray1};
use pyo3::prelude::*;

use crate::layers::{binomial_deviance, BinomialDevianceConfig};

#[pyfunction]
#[pyo3(signature = (similarity, pair_label, mask, alpha = 2.0, beta = 0.5, c = 25.0))]
pub fn binomial_deviance_forward_cpu(
    similarity: PyReadonlyArray1<f32>,
    pair_label: PyReadonlyArray1<f32>,
    mask: PyReadonlyArray1<f32>,
    alpha: f32,
    beta: f32,
    c: f32,
) -> PyResult<f32> {
    let config = BinomialDevianceConfig { alpha, beta, c };
    let (loss, _) = binomial_deviance::binomial_deviance_forward(
        &similarity.as_array(),
        &pair_label.as_array(),
        &mask.as_array(),
        &config,
    )?;
    Ok(loss)
}

#[pyfunction]
#[pyo3(signature = (
    d_loss, similarity, pair_label, mask, alpha = 2.0, beta = 0.5, c = 25.0
))]
#[allow(clippy::too_many_arguments)]
pub fn binomial_deviance_backward_cpu<'py>(
    py: Python<'py>,
    d_loss: f32,
    similarity: PyReadonlyArray1<f32>,
    pair_label: PyReadonlyArray1<f32>,
    mask: PyReadonlyArray1<f32>,
    alpha: f32,
    beta: f32,
    c: f32,
) -> PyResult<&'py PyArray1<f32>> {
    let config = BinomialDevianceConfig { alpha, beta, c };
    let mask_arr = mask.as_array();
    let (_, cache) = binomial_deviance::binomial_deviance_forward(
        &similarity.as_array(),
        &pair_label.as_array(),
        &mask_arr,
        &config,
    )?;
    let grad = binomial_deviance::binomial_deviance_backward(d_loss, &mask_arr, &cache, &config)?;
    Ok(grad.into_pyarray(py))
}

pub fn register(m: &PyModule) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(binomial_deviance_forward_cpu, m)?)?;
    m.add_function(wrap_pyfunction!(binomial_deviance_backward_cpu, m)?)?;
    Ok(())
}
