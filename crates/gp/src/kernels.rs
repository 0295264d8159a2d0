//! A module for covariance kernels used as GP prior covariance.
//!
//! The following kernel is implemented:
//! * squared exponential (a.k.a. gaussian or RBF) with a fixed length-scale.
//!
//! Kernels are evaluated on squared euclidean distances, hence the same code path
//! applies whatever the dimension of the input space.

use crate::errors::{GpError, Result};
use crate::utils::squared_distances;
use linfa::Float;
use ndarray::{Array2, ArrayBase, Data, Ix2};
#[cfg(feature = "serializable")]
use serde::{Deserialize, Serialize};
use std::fmt;

/// A trait for using a covariance kernel in GP inference
pub trait Kernel<F: Float>: Clone + Copy + fmt::Display + Sync + Send {
    /// Kernel values given squared euclidean distances `d2` between x and x' points.
    /// The returned array has the shape of `d2`.
    fn value(&self, d2: &ArrayBase<impl Data<Elem = F>, Ix2>) -> Array2<F>;

    /// Kernel matrix `K[i, j] = k(x1_i, x2_j)` given (m, nx) `x1` and (n, nx) `x2` points.
    ///
    /// Fails with [`GpError::ShapeMismatch`] if x1 and x2 have not the same number of columns
    fn matrix(
        &self,
        x1: &ArrayBase<impl Data<Elem = F>, Ix2>,
        x2: &ArrayBase<impl Data<Elem = F>, Ix2>,
    ) -> Result<Array2<F>> {
        Ok(self.value(&squared_distances(x1, x2)?))
    }

    /// Check kernel parameters validity
    fn check(&self) -> Result<()> {
        Ok(())
    }
}

/// Squared exponential kernel
///
/// `k(x, x') = exp(-0.5 * ||x - x'||^2 / l^2)` where `l` is the length-scale.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serializable", derive(Serialize, Deserialize))]
pub struct SquaredExponentialKernel<F: Float> {
    length_scale: F,
}

impl<F: Float> Default for SquaredExponentialKernel<F> {
    /// Unit length-scale
    fn default() -> Self {
        SquaredExponentialKernel {
            length_scale: F::one(),
        }
    }
}

impl<F: Float> SquaredExponentialKernel<F> {
    /// Constructor given the length-scale `l`.
    ///
    /// Validity (`l > 0`) is checked when the kernel goes through [`GpParams`](crate::GpParams).
    pub fn new(length_scale: F) -> Self {
        SquaredExponentialKernel { length_scale }
    }

    /// Length-scale of the kernel
    pub fn length_scale(&self) -> F {
        self.length_scale
    }
}

impl<F: Float> Kernel<F> for SquaredExponentialKernel<F> {
    fn value(&self, d2: &ArrayBase<impl Data<Elem = F>, Ix2>) -> Array2<F> {
        let factor = F::cast(-0.5) / (self.length_scale * self.length_scale);
        d2.mapv(|v| F::exp(factor * v))
    }

    fn check(&self) -> Result<()> {
        if self.length_scale.is_finite() && self.length_scale > F::zero() {
            Ok(())
        } else {
            Err(GpError::InvalidValueError(format!(
                "`length_scale` should be a finite strictly positive value, got {}",
                self.length_scale
            )))
        }
    }
}

impl<F: Float> fmt::Display for SquaredExponentialKernel<F> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "SquaredExponential(l={})", self.length_scale)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::{Array, Array2, Axis, array};
    use ndarray_rand::RandomExt;
    use ndarray_rand::rand::SeedableRng;
    use ndarray_rand::rand_distr::Uniform;
    use rand_xoshiro::Xoshiro256Plus;

    #[test]
    fn test_squared_exponential_value() {
        let kernel = SquaredExponentialKernel::default();
        let d2 = array![[0., 1.], [2., 4.]];
        assert_abs_diff_eq!(
            array![
                [1., (-0.5f64).exp()],
                [(-1.0f64).exp(), (-2.0f64).exp()]
            ],
            kernel.value(&d2),
            epsilon = 1e-15
        );
    }

    #[test]
    fn test_squared_exponential_length_scale() {
        let kernel = SquaredExponentialKernel::new(2.);
        let x1 = array![[0.]];
        let x2 = array![[2.]];
        assert_abs_diff_eq!((-0.5f64).exp(), kernel.matrix(&x1, &x2).unwrap()[[0, 0]], epsilon = 1e-15);
        assert_eq!("SquaredExponential(l=2)", kernel.to_string());
    }

    #[test]
    fn test_kernel_matrix_shape() {
        let kernel = SquaredExponentialKernel::default();
        let x1 = Array2::<f64>::zeros((4, 3));
        let x2 = Array2::<f64>::ones((7, 3));
        let k = kernel.matrix(&x1, &x2).unwrap();
        assert_eq!(&[4, 7], k.shape());
        assert_abs_diff_eq!(k[[2, 5]], (-1.5f64).exp(), epsilon = 1e-15);
    }

    #[test]
    fn test_kernel_matrix_dimension_mismatch() {
        let kernel = SquaredExponentialKernel::default();
        let x1 = Array2::<f64>::zeros((4, 3));
        let x2 = Array2::<f64>::ones((7, 2));
        assert!(matches!(
            kernel.matrix(&x1, &x2),
            Err(GpError::ShapeMismatch(_))
        ));
    }

    #[test]
    fn test_kernel_symmetry_and_unit_diagonal() {
        let mut rng = Xoshiro256Plus::seed_from_u64(42);
        let x = Array::random_using((20, 3), Uniform::new(-3f64, 3.), &mut rng);
        let kernel = SquaredExponentialKernel::default();
        let k = kernel.matrix(&x, &x).unwrap();
        assert_abs_diff_eq!(k, k.t(), epsilon = 1e-15);
        assert!(k.diag().iter().all(|v| *v == 1.0));
    }

    #[test]
    fn test_kernel_1d_matches_difference_shortcut() {
        let x = Array::linspace(-5., 5., 30);
        // 1d shortcut: exp(-0.5 * (x_i - x_j)^2) from plain differences
        let xi = x.view().insert_axis(Axis(1));
        let xj = x.view().insert_axis(Axis(0));
        let expected = (&xi - &xj).mapv(|v: f64| (-0.5 * v * v).exp());

        let kernel = SquaredExponentialKernel::default();
        let xcol = x.insert_axis(Axis(1));
        assert_abs_diff_eq!(expected, kernel.matrix(&xcol, &xcol).unwrap(), epsilon = 1e-10);
    }
}
