//! Factorizations used by GP inference: jittered cholesky and forward substitution.
//!
//! Computations rely on `linfa-linalg` (pure Rust) by default and on `ndarray-linalg`
//! (BLAS/LAPACK) when the `blas` feature is enabled.
use crate::errors::{GpError, Result};
use linfa::Float;
#[cfg(feature = "blas")]
use linfa::dataset::{WithLapack, WithoutLapack};
#[cfg(not(feature = "blas"))]
use linfa_linalg::{cholesky::*, triangular::*};
use ndarray::{Array2, ArrayBase, Data, Ix2};
#[cfg(feature = "blas")]
use ndarray_linalg::{cholesky::*, triangular::*};
use ndarray_stats::QuantileExt;

/// Pivots `L[i, i]^2` of a cholesky factor have to be greater than
/// `PIVOT_TOLERANCE_FACTOR * epsilon * max(diag(A))` for the factorization to be accepted
pub const PIVOT_TOLERANCE_FACTOR: f64 = 1e4;

/// Lower triangular cholesky factor `L` of `a + jitter * I` such that `L.Lt = a + jitter * I`.
///
/// Fails with [`GpError::NumericalInstability`] when the matrix is not positive definite
/// or when a pivot is too small wrt the diagonal scale of the matrix: the latter happens
/// with (near-)duplicated locations for which round-off errors hide the singularity.
pub fn cholesky<F: Float>(a: &ArrayBase<impl Data<Elem = F>, Ix2>, jitter: F) -> Result<Array2<F>> {
    if !a.is_square() {
        return Err(GpError::ShapeMismatch(format!(
            "cholesky expects a square matrix, got {:?}",
            a.shape()
        )));
    }
    let mut mat = a.to_owned();
    mat.diag_mut().mapv_inplace(|v| v + jitter);

    let scale = *mat.diag().max().map_err(|_| {
        GpError::NumericalInstability("cannot get diagonal scale of the matrix".to_string())
    })?;

    #[cfg(feature = "blas")]
    let mut l = mat.with_lapack().cholesky(UPLO::Lower)?.without_lapack();
    #[cfg(not(feature = "blas"))]
    let mut l = mat.cholesky()?;

    let tol = F::epsilon() * F::cast(PIVOT_TOLERANCE_FACTOR) * scale;
    if let Some((i, pivot)) = l
        .diag()
        .iter()
        .map(|v| *v * *v)
        .enumerate()
        .find(|(_, p)| p.is_nan() || *p <= tol)
    {
        return Err(GpError::NumericalInstability(format!(
            "matrix is not numerically positive definite (pivot {pivot} at row {i} below {tol}), \
             check for duplicated locations or increase jitter"
        )));
    }

    // enforce a lower triangular result whatever the backend
    for ((i, j), v) in l.indexed_iter_mut() {
        if j > i {
            *v = F::zero();
        }
    }
    Ok(l)
}

/// Solve `L.X = B` by forward substitution given the lower triangular matrix `L`
pub fn solve_lower<F: Float>(
    l: &ArrayBase<impl Data<Elem = F>, Ix2>,
    b: &ArrayBase<impl Data<Elem = F>, Ix2>,
) -> Result<Array2<F>> {
    #[cfg(feature = "blas")]
    let x = l
        .to_owned()
        .with_lapack()
        .solve_triangular(UPLO::Lower, Diag::NonUnit, &b.to_owned().with_lapack())?
        .without_lapack();
    #[cfg(not(feature = "blas"))]
    let x = l.solve_triangular(b, UPLO::Lower)?;
    Ok(x)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::{Array2, array};

    #[test]
    fn test_cholesky() {
        let a = array![[4., 2., 0.4], [2., 5., 1.], [0.4, 1., 3.]];
        let l = cholesky(&a, 0.).expect("positive definite");
        assert_abs_diff_eq!(a, l.dot(&l.t()), epsilon = 1e-12);
        assert_eq!(0., l[[0, 1]]);
        assert_eq!(0., l[[0, 2]]);
        assert_eq!(0., l[[1, 2]]);
        assert_abs_diff_eq!(2., l[[0, 0]], epsilon = 1e-12);
    }

    #[test]
    fn test_cholesky_jitter() {
        let a = Array2::<f64>::eye(3);
        let l = cholesky(&a, 1e-6).expect("positive definite");
        assert_abs_diff_eq!(
            Array2::<f64>::eye(3) * (1. + 1e-6),
            l.dot(&l.t()),
            epsilon = 1e-14
        );
    }

    #[test]
    fn test_cholesky_singular() {
        let a = array![[1., 1.], [1., 1.]];
        assert!(matches!(
            cholesky(&a, 0.),
            Err(GpError::NumericalInstability(_))
        ));
    }

    #[test]
    fn test_cholesky_rounded_singular() {
        // singular up to a tiny diagonal term: backend succeeds, pivot check fails
        let nugget = 100. * f64::EPSILON;
        let a = array![[1., 1.], [1., 1.]];
        assert!(matches!(
            cholesky(&a, nugget),
            Err(GpError::NumericalInstability(_))
        ));
        // whereas a larger jitter makes it usable
        assert!(cholesky(&a, 1e-6).is_ok());
    }

    #[test]
    fn test_cholesky_not_square() {
        let a = Array2::<f64>::ones((2, 3));
        assert!(matches!(
            cholesky(&a, 0.),
            Err(GpError::ShapeMismatch(_))
        ));
    }

    #[test]
    fn test_solve_lower() {
        let l = array![[2., 0.], [1., 3.]];
        let b = array![[4., 2.], [11., 1.]];
        let x = solve_lower(&l, &b).expect("solved");
        assert_abs_diff_eq!(array![[2., 1.], [3., 0.]], x, epsilon = 1e-12);
    }
}
