use thiserror::Error;

/// A result type for GP inference
pub type Result<T> = std::result::Result<T, GpError>;

/// An error when using [`GaussianProcess`](crate::GaussianProcess) or one of the free functions
#[derive(Error, Debug)]
pub enum GpError {
    /// When inputs, observations or matrices have inconsistent dimensions
    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),
    /// When a required factorization or linear solve fails, even after jitter
    #[error("Numerical instability: {0}")]
    NumericalInstability(String),
    /// When error due to a bad parameter value
    #[error("InvalidValue error: {0}")]
    InvalidValueError(String),
}

impl From<linfa_linalg::LinalgError> for GpError {
    fn from(err: linfa_linalg::LinalgError) -> Self {
        GpError::NumericalInstability(err.to_string())
    }
}

#[cfg(feature = "blas")]
impl From<ndarray_linalg::error::LinalgError> for GpError {
    fn from(err: ndarray_linalg::error::LinalgError) -> Self {
        GpError::NumericalInstability(err.to_string())
    }
}
