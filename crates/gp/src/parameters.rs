use crate::errors::{GpError, Result};
use crate::kernels::Kernel;
use crate::{GP_NUGGET_FACTOR, GP_SAMPLING_JITTER};
use linfa::{Float, ParamGuard};

#[cfg(feature = "serializable")]
use serde::{Deserialize, Serialize};

/// A set of validated GP parameters.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(
    feature = "serializable",
    derive(Serialize, Deserialize),
    serde(bound(
        serialize = "F: Serialize, K: Serialize",
        deserialize = "F: Deserialize<'de>, K: Deserialize<'de>"
    ))
)]
pub struct GpValidParams<F: Float, K: Kernel<F>> {
    /// Prior covariance kernel k(x, x')
    pub(crate) kernel: K,
    /// Diagonal term added to covariance matrices before sampling
    pub(crate) jitter: F,
    /// Diagonal term added to the training kernel matrix before conditioning
    pub(crate) nugget: F,
}

impl<F: Float, K: Kernel<F> + Default> Default for GpValidParams<F, K> {
    fn default() -> GpValidParams<F, K> {
        GpValidParams {
            kernel: K::default(),
            jitter: F::cast(GP_SAMPLING_JITTER),
            nugget: F::cast(GP_NUGGET_FACTOR) * F::epsilon(),
        }
    }
}

impl<F: Float, K: Kernel<F>> GpValidParams<F, K> {
    /// Get covariance kernel k(x, x')
    pub fn kernel(&self) -> &K {
        &self.kernel
    }

    /// Get jitter used when sampling
    pub fn jitter(&self) -> F {
        self.jitter
    }

    /// Get nugget used when conditioning on observations
    pub fn nugget(&self) -> F {
        self.nugget
    }
}

#[derive(Clone, Debug)]
/// The set of parameters that can be specified for the execution of
/// the [GP inference](struct.GaussianProcess.html).
pub struct GpParams<F: Float, K: Kernel<F>>(GpValidParams<F, K>);

impl<F: Float, K: Kernel<F>> GpParams<F, K> {
    /// A constructor for GP parameters given a covariance kernel
    pub fn new(kernel: K) -> GpParams<F, K> {
        Self(GpValidParams {
            kernel,
            jitter: F::cast(GP_SAMPLING_JITTER),
            nugget: F::cast(GP_NUGGET_FACTOR) * F::epsilon(),
        })
    }

    /// A constructor for GP parameters from validated parameters
    pub fn new_from_valid(params: &GpValidParams<F, K>) -> Self {
        Self(*params)
    }

    /// Set covariance kernel.
    pub fn kernel(mut self, kernel: K) -> Self {
        self.0.kernel = kernel;
        self
    }

    /// Set jitter.
    ///
    /// Jitter is added to the diagonal of the prior or posterior covariance matrix
    /// before its cholesky decomposition when drawing samples.
    pub fn jitter(mut self, jitter: F) -> Self {
        self.0.jitter = jitter;
        self
    }

    /// Set nugget.
    ///
    /// Nugget is added to the diagonal of the training kernel matrix to improve numerical
    /// stability of the conditioning. It is not an observation noise: keep it tiny to
    /// interpolate the observations.
    pub fn nugget(mut self, nugget: F) -> Self {
        self.0.nugget = nugget;
        self
    }
}

impl<F: Float, K: Kernel<F>> From<GpValidParams<F, K>> for GpParams<F, K> {
    fn from(valid: GpValidParams<F, K>) -> Self {
        GpParams(valid)
    }
}

impl<F: Float, K: Kernel<F>> ParamGuard for GpParams<F, K> {
    type Checked = GpValidParams<F, K>;
    type Error = GpError;

    fn check_ref(&self) -> Result<&Self::Checked> {
        if !self.0.jitter.is_finite() || self.0.jitter < F::zero() {
            return Err(GpError::InvalidValueError(format!(
                "`jitter` should be a finite positive value, got {}",
                self.0.jitter
            )));
        }
        if !self.0.nugget.is_finite() || self.0.nugget < F::zero() {
            return Err(GpError::InvalidValueError(format!(
                "`nugget` should be a finite positive value, got {}",
                self.0.nugget
            )));
        }
        self.0.kernel.check()?;
        Ok(&self.0)
    }

    fn check(self) -> Result<Self::Checked> {
        self.check_ref()?;
        Ok(self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernels::SquaredExponentialKernel;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_default_params() {
        let params = GpParams::new(SquaredExponentialKernel::<f64>::default())
            .check()
            .expect("valid params");
        assert_abs_diff_eq!(1e-6, params.jitter());
        assert_abs_diff_eq!(100. * f64::EPSILON, params.nugget());
        assert_eq!(1., params.kernel().length_scale());
        assert_eq!(params, GpValidParams::default());
    }

    #[test]
    fn test_params_setters() {
        let params = GpParams::new(SquaredExponentialKernel::default())
            .kernel(SquaredExponentialKernel::new(0.5))
            .jitter(1e-4)
            .nugget(1e-10)
            .check()
            .expect("valid params");
        assert_eq!(0.5, params.kernel().length_scale());
        assert_eq!(1e-4, params.jitter());
        assert_eq!(1e-10, params.nugget());

        let again = GpParams::new_from_valid(&params).check().expect("valid");
        assert_eq!(params, again);
    }

    #[test]
    fn test_invalid_jitter() {
        let res = GpParams::new(SquaredExponentialKernel::default())
            .jitter(-1e-6)
            .check();
        assert!(matches!(res, Err(GpError::InvalidValueError(_))));

        let res = GpParams::new(SquaredExponentialKernel::default())
            .jitter(f64::NAN)
            .check();
        assert!(matches!(res, Err(GpError::InvalidValueError(_))));
    }

    #[test]
    fn test_invalid_nugget() {
        let res = GpParams::new(SquaredExponentialKernel::default())
            .nugget(f64::INFINITY)
            .check();
        assert!(matches!(res, Err(GpError::InvalidValueError(_))));
    }

    #[test]
    fn test_invalid_length_scale() {
        for l in [0., -1., f64::NAN] {
            let res = GpParams::new(SquaredExponentialKernel::new(l)).check();
            assert!(matches!(res, Err(GpError::InvalidValueError(_))));
        }
    }
}
