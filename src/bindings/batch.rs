use numpy::{IntoPyArray, PyArray2, PyArrayDyn, PyReadonlyArray2, PyReadonlyArrayDyn};
use pyo3::prelude::*;

use crate::layers::{
    gradient_scaler, mean_across_batch, GradientScalerConfig, MeanAcrossBatchConfig, TrainingStep,
};

#[pyfunction]
pub fn mean_across_batch_forward_cpu<'py>(
    py: Python<'py>,
    x: PyReadonlyArray2<f32>,
    chunk_size: usize,
) -> PyResult<&'py PyArray2<f32>> {
    let config = MeanAcrossBatchConfig { chunk_size };
    let result = mean_across_batch::mean_across_batch_forward(&x.as_array(), &config)?;
    Ok(result.into_pyarray(py))
}

#[pyfunction]
pub fn mean_across_batch_backward_cpu<'py>(
    py: Python<'py>,
    grad_output: PyReadonlyArray2<f32>,
    chunk_size: usize,
) -> PyResult<&'py PyArray2<f32>> {
    let config = MeanAcrossBatchConfig { chunk_size };
    let result = mean_across_batch::mean_across_batch_backward(&grad_output.as_array(), &config)?;
    Ok(result.into_pyarray(py))
}

#[pyfunction]
pub fn gradient_scaler_forward_cpu<'py>(
    py: Python<'py>,
    x: PyReadonlyArrayDyn<f32>,
) -> PyResult<&'py PyArrayDyn<f32>> {
    Ok(gradient_scaler::gradient_scaler_forward(&x.as_array()).into_pyarray(py))
}

#[pyfunction]
#[pyo3(signature = (
    grad_output, iter, lower_bound = 0.0, upper_bound = 1.0, alpha = 10.0, max_iter = 1.0
))]
pub fn gradient_scaler_backward_cpu<'py>(
    py: Python<'py>,
    grad_output: PyReadonlyArrayDyn<f32>,
    iter: u64,
    lower_bound: f32,
    upper_bound: f32,
    alpha: f32,
    max_iter: f32,
) -> PyResult<&'py PyArrayDyn<f32>> {
    let config = GradientScalerConfig {
        lower_bound,
        upper_bound,
        alpha,
        max_iter,
    };
    let result = gradient_scaler::gradient_scaler_backward(
        &grad_output.as_array(),
        TrainingStep::new(iter),
        &config,
    )?;
    Ok(result.into_pyarray(py))
}

pub fn register(m: &PyModule) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(mean_across_batch_forward_cpu, m)?)?;
    m.add_function(wrap_pyfunction!(mean_across_batch_backward_cpu, m)?)?;
    m.add_function(wrap_pyfunction!(gradient_scaler_forward_cpu, m)?)?;
    m.add_function(wrap_pyfunction!(gradient_scaler_backward_cpu, m)?)?;
    Ok(())
}
