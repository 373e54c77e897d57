use numpy::{IntoPyArray, PyArray1, PyArray2, PyReadonlyArray1, PyReadonlyArray2};
use pyo3::prelude::*;

use crate::layers::{cosine, cosine_batch, CosineCache, CosineSimilarityBatchConfig, GramCache};

#[pyfunction]
#[pyo3(signature = (
    features,
    labels,
    groups = None,
    pos_label = 1,
    neg_label = -1,
    eliminate_pos = false,
    eliminate_neg = false,
    eliminate_pos_same_group = false,
    eliminate_neg_same_group = false
))]
#[allow(clippy::too_many_arguments, clippy::type_complexity)]
pub fn cosine_similarity_batch_forward_cpu<'py>(
    py: Python<'py>,
    features: PyReadonlyArray2<f32>,
    labels: PyReadonlyArray1<f32>,
    groups: Option<PyReadonlyArray1<f32>>,
    pos_label: i32,
    neg_label: i32,
    eliminate_pos: bool,
    eliminate_neg: bool,
    eliminate_pos_same_group: bool,
    eliminate_neg_same_group: bool,
) -> PyResult<(
    &'py PyArray1<f32>,
    &'py PyArray1<f32>,
    &'py PyArray1<f32>,
    &'py PyArray2<f32>,
)> {
    let config = CosineSimilarityBatchConfig {
        pos_label,
        neg_label,
        eliminate_pos,
        eliminate_neg,
        eliminate_pos_same_group,
        eliminate_neg_same_group,
    };
    let features_arr = features.as_array();
    let labels_arr = labels.as_array();
    let groups_arr = groups.as_ref().map(|g| g.as_array());

    let (output, cache) = cosine_batch::cosine_similarity_batch_forward(
        &features_arr,
        &labels_arr,
        groups_arr.as_ref(),
        &config,
    )?;

    Ok((
        output.similarity.into_pyarray(py),
        output.pair_label.into_pyarray(py),
        output.mask.into_pyarray(py),
        cache.into_matrix().into_pyarray(py),
    ))
}

#[pyfunction]
pub fn cosine_similarity_batch_backward_cpu<'py>(
    py: Python<'py>,
    d_similarity: PyReadonlyArray1<f32>,
    mask: PyReadonlyArray1<f32>,
    features: PyReadonlyArray2<f32>,
    gram: PyReadonlyArray2<f32>,
) -> PyResult<&'py PyArray2<f32>> {
    let cache = GramCache::from_matrix(gram.as_array().to_owned())?;
    let grad = cosine_batch::cosine_similarity_batch_backward(
        &d_similarity.as_array(),
        &mask.as_array(),
        &features.as_array(),
        &cache,
    )?;
    Ok(grad.into_pyarray(py))
}

#[pyfunction]
pub fn cosine_similarity_forward_cpu<'py>(
    py: Python<'py>,
    a: PyReadonlyArray2<f32>,
    b: PyReadonlyArray2<f32>,
) -> PyResult<&'py PyArray1<f32>> {
    let (similarity, _) = cosine::cosine_similarity_forward(&a.as_array(), &b.as_array())?;
    Ok(similarity.into_pyarray(py))
}

#[pyfunction]
pub fn cosine_similarity_backward_cpu<'py>(
    py: Python<'py>,
    d_similarity: PyReadonlyArray1<f32>,
    a: PyReadonlyArray2<f32>,
    b: PyReadonlyArray2<f32>,
) -> PyResult<(&'py PyArray2<f32>, &'py PyArray2<f32>)> {
    let a_arr = a.as_array();
    let b_arr = b.as_array();
    // row dot products are cheap, recompute instead of round-tripping them
    let (_, cache): (_, CosineCache<f32>) = cosine::cosine_similarity_forward(&a_arr, &b_arr)?;
    let (grad_a, grad_b) =
        cosine::cosine_similarity_backward(&d_similarity.as_array(), &a_arr, &b_arr, &cache)?;
    Ok((grad_a.into_pyarray(py), grad_b.into_pyarray(py)))
}

pub fn register(m: &PyModule) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(cosine_similarity_batch_forward_cpu, m)?)?;
    m.add_function(wrap_pyfunction!(cosine_similarity_batch_backward_cpu, m)?)?;
    m.add_function(wrap_pyfunction!(cosine_similarity_forward_cpu, m)?)?;
    m.add_function(wrap_pyfunction!(cosine_similarity_backward_cpu, m)?)?;
    Ok(())
}
