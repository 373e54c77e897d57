use thiserror::Error;

/// Errors raised by layer forward/backward passes.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LayerError {
    /// Two inputs disagree on a dimension.
    #[error("shape mismatch in {what}: expected {expected}, got {actual}")]
    ShapeMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    /// Row `index` has a non-positive (or non-finite) squared norm, so its
    /// cosine similarity is undefined.
    #[error("degenerate feature vector at row {index}: squared norm must be positive and finite")]
    DegenerateVector { index: usize },

    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("unknown layer type: {0}")]
    UnknownLayer(String),
}

pub type Result<T> = std::result::Result<T, LayerError>;

impl LayerError {
    pub(crate) fn shape(what: &'static str, expected: usize, actual: usize) -> Self {
        LayerError::ShapeMismatch {
            what,
            expected,
            actual,
        }
    }
}

#[cfg(feature = "python")]
impl From<LayerError> for pyo3::PyErr {
    fn from(err: LayerError) -> Self {
        pyo3::exceptions::PyValueError::new_err(err.to_string())
    }
}
