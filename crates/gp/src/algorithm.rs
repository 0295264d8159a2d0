use crate::errors::{GpError, Result};
use crate::kernels::{Kernel, SquaredExponentialKernel};
use crate::linalg::{cholesky, solve_lower};
use crate::parameters::{GpParams, GpValidParams};
use crate::utils::duplicated_rows;

use linfa::Float;
use ndarray::{Array1, Array2, ArrayBase, Axis, Data, Ix1, Ix2};
use ndarray_rand::RandomExt;
use ndarray_rand::rand::{Rng, SeedableRng};
use ndarray_rand::rand_distr::StandardNormal;
use ndarray_stats::QuantileExt;
use rand_xoshiro::Xoshiro256Plus;

use log::{debug, warn};
#[cfg(feature = "serializable")]
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;

/// Default jitter added to covariance matrices diagonal before sampling
pub const GP_SAMPLING_JITTER: f64 = 1e-6;
/// Default nugget as a multiple of the machine epsilon of the float type
pub const GP_NUGGET_FACTOR: f64 = 100.;
/// Posterior variances below this negative value are reported as numerical issues
pub const GP_NEGATIVE_VARIANCE_TOLERANCE: f64 = 1e-8;

/// Gaussian distribution of the process values at a set of n query locations
/// once conditioned on observations.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(
    feature = "serializable",
    derive(Serialize, Deserialize),
    serde(bound(deserialize = "F: Deserialize<'de>"))
)]
pub struct Posterior<F: Float> {
    /// Posterior mean (n,)
    mean: Array1<F>,
    /// Posterior covariance (n, n)
    covariance: Array2<F>,
}

impl<F: Float> Posterior<F> {
    /// Posterior mean vector (n,)
    pub fn mean(&self) -> &Array1<F> {
        &self.mean
    }

    /// Posterior covariance matrix (n, n)
    pub fn covariance(&self) -> &Array2<F> {
        &self.covariance
    }

    /// Number of query locations
    pub fn len(&self) -> usize {
        self.mean.len()
    }

    /// Whether the posterior is defined over no location
    pub fn is_empty(&self) -> bool {
        self.mean.is_empty()
    }

    /// Posterior variances, i.e. the covariance diagonal.
    ///
    /// Variance might be slightly negative depending on machine precision:
    /// it is set to zero in that case.
    pub fn variance(&self) -> Array1<F> {
        self.covariance
            .diag()
            .mapv(|v| if v < F::zero() { F::zero() } else { v })
    }

    /// Posterior standard deviations
    pub fn std(&self) -> Array1<F> {
        self.variance().mapv(|v| v.sqrt())
    }

    /// Pointwise interval `(mean - z * std, mean + z * std)`,
    /// `z = 1.96` giving the usual 95% credible band.
    pub fn credible_interval(&self, z: F) -> (Array1<F>, Array1<F>) {
        let half_width = self.std().mapv(|s| z.abs() * s);
        (&self.mean - &half_width, &self.mean + &half_width)
    }

    /// Consume the posterior and return (mean, covariance)
    pub fn into_parts(self) -> (Array1<F>, Array2<F>) {
        (self.mean, self.covariance)
    }
}

/// A GP regressor with fixed hyperparameters working on noiseless observations.
///
/// The process is zero-mean with a prior covariance given by a [`Kernel`]:
///
/// `f ~ GP(0, k(x, x'))`
///
/// Observing `y = f(X)` at training locations `X`, the process values at query
/// locations `X*` are gaussian with:
///
/// * `mean = K(X*, X).K(X, X)^-1.y`
/// * `covariance = K(X*, X*) - K(X*, X).K(X, X)^-1.K(X, X*)`
///
/// # Implementation
///
/// * Based on [ndarray](https://github.com/rust-ndarray/ndarray) and
///   [linfa](https://github.com/rust-ml/linfa) `Float` and `ParamGuard` conventions.
/// * `K(X, X)^-1` is never formed: the cholesky factor `L` of `K(X, X)` (plus a tiny nugget)
///   is computed once per call and triangular systems are solved against it.
/// * The cost is dominated by the cholesky decomposition which is O(m^3) in time
///   and O(m^2) in memory with m the number of training points: this is the limiting
///   factor when choosing m. No upper bound is enforced.
/// * Nothing is cached: every call is a pure function of its arguments and of the
///   (immutable) parameters, hence a `GaussianProcess` can be shared between threads.
///
/// # Features
///
/// ## serializable
///
/// The `serializable` feature enables the serialization of parameters and posteriors
/// using the [`serde crate`](https://serde.rs/).
///
/// ## blas
///
/// The `blas` feature enables the use of BLAS/LAPACK linear algebra backend available
/// with [`ndarray-linalg`](https://github.com/rust-ndarray/ndarray-linalg).
///
/// # Example
///
/// ```
/// use condgp::{SquaredExponentialGp, GpError};
/// use ndarray::{array, Array, Axis};
///
/// let gp = SquaredExponentialGp::<f64>::default();
///
/// let xt = array![[-4.], [-3.], [-2.], [-1.], [1.]];
/// let yt = xt.column(0).mapv(f64::sin);
/// let xq = Array::linspace(-5., 5., 50).insert_axis(Axis(1));
///
/// let posterior = gp.posterior(&xt, &yt, &xq)?;
/// let (lower, upper) = posterior.credible_interval(1.96);
/// let samples = gp.sample_posterior(&posterior, 3)?;
///
/// assert_eq!(50, posterior.len());
/// assert_eq!(&[50, 3], samples.shape());
/// assert!(lower.iter().zip(upper.iter()).all(|(l, u)| l <= u));
/// # Ok::<(), GpError>(())
/// ```
#[derive(Clone, Copy, Debug)]
#[cfg_attr(
    feature = "serializable",
    derive(Serialize, Deserialize),
    serde(bound(
        serialize = "F: Serialize, K: Serialize",
        deserialize = "F: Deserialize<'de>, K: Deserialize<'de>"
    ))
)]
pub struct GaussianProcess<F: Float, K: Kernel<F>> {
    /// Parameters used by this regressor
    params: GpValidParams<F, K>,
}

/// GP with the squared exponential kernel
pub type SquaredExponentialGp<F> = GaussianProcess<F, SquaredExponentialKernel<F>>;

impl<F: Float, K: Kernel<F> + Default> Default for GaussianProcess<F, K> {
    fn default() -> Self {
        GaussianProcess {
            params: GpValidParams::default(),
        }
    }
}

impl<F: Float, K: Kernel<F>> fmt::Display for GaussianProcess<F, K> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "GP(kernel={}, jitter={}, nugget={})",
            self.params.kernel, self.params.jitter, self.params.nugget,
        )
    }
}

impl<F: Float, K: Kernel<F>> From<GpValidParams<F, K>> for GaussianProcess<F, K> {
    fn from(params: GpValidParams<F, K>) -> Self {
        Self::new(params)
    }
}

impl<F: Float, K: Kernel<F>> GaussianProcess<F, K> {
    /// Gp parameters contructor
    pub fn params<NewKernel: Kernel<F>>(kernel: NewKernel) -> GpParams<F, NewKernel> {
        GpParams::new(kernel)
    }

    /// Constructor from validated parameters
    pub fn new(params: GpValidParams<F, K>) -> Self {
        GaussianProcess { params }
    }

    /// Parameters of this GP
    pub fn valid_params(&self) -> &GpValidParams<F, K> {
        &self.params
    }

    /// Covariance kernel of this GP
    pub fn kernel(&self) -> &K {
        &self.params.kernel
    }

    /// Kernel matrix between (m, nx) `x1` and (n, nx) `x2` points as a (m, n) matrix.
    pub fn kernel_matrix(
        &self,
        x1: &ArrayBase<impl Data<Elem = F>, Ix2>,
        x2: &ArrayBase<impl Data<Elem = F>, Ix2>,
    ) -> Result<Array2<F>> {
        check_points("x1", x1)?;
        check_points("x2", x2)?;
        check_same_dim("x1", x1, "x2", x2)?;
        self.params.kernel.matrix(x1, x2)
    }

    /// Draw `n_traj` trajectories of the prior process at the n given `x` points.
    /// Returns a (n, n_traj) matrix, the random generator being seeded from entropy.
    pub fn sample_prior(
        &self,
        x: &ArrayBase<impl Data<Elem = F>, Ix2>,
        n_traj: usize,
    ) -> Result<Array2<F>> {
        self.sample_prior_with_rng(x, n_traj, &mut Xoshiro256Plus::from_entropy())
    }

    /// Draw `n_traj` trajectories of the prior process at the n given `x` points using
    /// the given random generator. Returns a (n, n_traj) matrix.
    pub fn sample_prior_with_rng<R: Rng + ?Sized>(
        &self,
        x: &ArrayBase<impl Data<Elem = F>, Ix2>,
        n_traj: usize,
        rng: &mut R,
    ) -> Result<Array2<F>> {
        check_points("x", x)?;
        let cov = self.params.kernel.matrix(x, x)?;
        let mean = Array1::zeros(x.nrows());
        sample(&mean, &cov, n_traj, self.params.jitter, rng)
    }

    /// Condition the process on `yt` values observed at `xt` locations and return
    /// the distribution of the process at `xq` locations.
    ///
    /// `xt` is (m, nx), `yt` is (m,) and `xq` is (n, nx), the result has a (n,) mean
    /// and a (n, n) covariance.
    ///
    /// Observations are exact: at a query location equal to a training one,
    /// the posterior mean is the observed value and the variance vanishes.
    pub fn posterior(
        &self,
        xt: &ArrayBase<impl Data<Elem = F>, Ix2>,
        yt: &ArrayBase<impl Data<Elem = F>, Ix1>,
        xq: &ArrayBase<impl Data<Elem = F>, Ix2>,
    ) -> Result<Posterior<F>> {
        check_points("training inputs", xt)?;
        check_points("query inputs", xq)?;
        if xt.nrows() != yt.len() {
            return Err(GpError::ShapeMismatch(format!(
                "{} training inputs but {} training values",
                xt.nrows(),
                yt.len()
            )));
        }
        check_same_dim("training inputs", xt, "query inputs", xq)?;

        let now = Instant::now();
        let duplicates = duplicated_rows(xt);
        if !duplicates.is_empty() {
            warn!("Training inputs contain duplicated locations (row pairs {duplicates:?})");
        }

        let kernel = &self.params.kernel;
        let k = kernel.matrix(xt, xt)?;
        let k_chol = cholesky(&k, self.params.nugget)?;

        let k_s = kernel.matrix(xt, xq)?;
        let k_ss = kernel.matrix(xq, xq)?;

        // v = L^-1.Ks and a = L^-1.y so that Ks^t.K^-1.y = v^t.a and Ks^t.K^-1.Ks = v^t.v
        let v = solve_lower(&k_chol, &k_s)?;
        let a = solve_lower(&k_chol, &yt.to_owned().insert_axis(Axis(1)))?;

        let mean = v.t().dot(&a).remove_axis(Axis(1));
        let cov = k_ss - v.t().dot(&v);
        let covariance = (&cov + &cov.t()).mapv(|c| c * F::cast(0.5));

        if let Ok(min_var) = covariance.diag().min() {
            if *min_var < -F::cast(GP_NEGATIVE_VARIANCE_TOLERANCE) {
                warn!("Negative posterior variance {min_var}: ill-conditioned kernel matrix");
            }
        }
        debug!(
            "Posterior with {} training points at {} query points computed in {} ms",
            xt.nrows(),
            xq.nrows(),
            now.elapsed().as_millis()
        );
        Ok(Posterior { mean, covariance })
    }

    /// Draw `n_traj` trajectories from the given `posterior`.
    /// Returns a (n, n_traj) matrix, the random generator being seeded from entropy.
    pub fn sample_posterior(&self, posterior: &Posterior<F>, n_traj: usize) -> Result<Array2<F>> {
        self.sample_posterior_with_rng(posterior, n_traj, &mut Xoshiro256Plus::from_entropy())
    }

    /// Draw `n_traj` trajectories from the given `posterior` using the given random generator.
    /// Returns a (n, n_traj) matrix.
    pub fn sample_posterior_with_rng<R: Rng + ?Sized>(
        &self,
        posterior: &Posterior<F>,
        n_traj: usize,
        rng: &mut R,
    ) -> Result<Array2<F>> {
        sample(
            &posterior.mean,
            &posterior.covariance,
            n_traj,
            self.params.jitter,
            rng,
        )
    }
}

/// Squared exponential kernel matrix, with unit length-scale,
/// between (m, nx) `x1` and (n, nx) `x2` points as a (m, n) matrix.
pub fn kernel<F: Float>(
    x1: &ArrayBase<impl Data<Elem = F>, Ix2>,
    x2: &ArrayBase<impl Data<Elem = F>, Ix2>,
) -> Result<Array2<F>> {
    SquaredExponentialGp::<F>::default().kernel_matrix(x1, x2)
}

/// Draw `n_traj` trajectories at the n given `x` points of the GP prior
/// with unit length-scale squared exponential kernel, as a (n, n_traj) matrix.
pub fn sample_prior<F: Float>(
    x: &ArrayBase<impl Data<Elem = F>, Ix2>,
    n_traj: usize,
) -> Result<Array2<F>> {
    SquaredExponentialGp::<F>::default().sample_prior(x, n_traj)
}

/// See [`sample_prior`], using the given random generator.
pub fn sample_prior_with_rng<F: Float, R: Rng + ?Sized>(
    x: &ArrayBase<impl Data<Elem = F>, Ix2>,
    n_traj: usize,
    rng: &mut R,
) -> Result<Array2<F>> {
    SquaredExponentialGp::<F>::default().sample_prior_with_rng(x, n_traj, rng)
}

/// Posterior of the GP with unit length-scale squared exponential kernel
/// given `yt` exact observations at `xt` and evaluated at `xq`.
/// See [`GaussianProcess::posterior`].
pub fn posterior<F: Float>(
    xt: &ArrayBase<impl Data<Elem = F>, Ix2>,
    yt: &ArrayBase<impl Data<Elem = F>, Ix1>,
    xq: &ArrayBase<impl Data<Elem = F>, Ix2>,
) -> Result<Posterior<F>> {
    SquaredExponentialGp::<F>::default().posterior(xt, yt, xq)
}

/// Draw `n_traj` trajectories of the gaussian distribution given by its (n,) `mean` and
/// (n, n) `covariance`, as a (n, n_traj) matrix.
pub fn sample_posterior<F: Float>(
    mean: &ArrayBase<impl Data<Elem = F>, Ix1>,
    covariance: &ArrayBase<impl Data<Elem = F>, Ix2>,
    n_traj: usize,
) -> Result<Array2<F>> {
    sample_posterior_with_rng(mean, covariance, n_traj, &mut Xoshiro256Plus::from_entropy())
}

/// See [`sample_posterior`], using the given random generator.
pub fn sample_posterior_with_rng<F: Float, R: Rng + ?Sized>(
    mean: &ArrayBase<impl Data<Elem = F>, Ix1>,
    covariance: &ArrayBase<impl Data<Elem = F>, Ix2>,
    n_traj: usize,
    rng: &mut R,
) -> Result<Array2<F>> {
    sample(mean, covariance, n_traj, F::cast(GP_SAMPLING_JITTER), rng)
}

/// Sample `n_traj` trajectories of the gaussian distribution N(mean_x, cov_x)
/// using the cholesky decomposition of `cov_x + jitter * I`.
pub(crate) fn sample<F: Float, R: Rng + ?Sized>(
    mean_x: &ArrayBase<impl Data<Elem = F>, Ix1>,
    cov_x: &ArrayBase<impl Data<Elem = F>, Ix2>,
    n_traj: usize,
    jitter: F,
    rng: &mut R,
) -> Result<Array2<F>> {
    let n_eval = mean_x.len();
    if n_eval == 0 {
        return Err(GpError::ShapeMismatch(
            "cannot sample a distribution over no location".to_string(),
        ));
    }
    if cov_x.nrows() != n_eval || cov_x.ncols() != n_eval {
        return Err(GpError::ShapeMismatch(format!(
            "mean of length {} requires a ({n_eval}, {n_eval}) covariance, got {:?}",
            n_eval,
            cov_x.shape()
        )));
    }
    let c = cholesky(cov_x, jitter)?;
    let z: Array2<f64> = Array2::random_using((n_eval, n_traj), StandardNormal, rng);
    let z = z.mapv(|v| F::cast(v));
    Ok(c.dot(&z) + &mean_x.view().insert_axis(Axis(1)))
}

fn check_points<F: Float>(name: &str, x: &ArrayBase<impl Data<Elem = F>, Ix2>) -> Result<()> {
    if x.nrows() == 0 || x.ncols() == 0 {
        return Err(GpError::ShapeMismatch(format!(
            "{name} should contain at least one point of dimension >= 1, got {:?}",
            x.shape()
        )));
    }
    Ok(())
}

fn check_same_dim<F: Float>(
    name1: &str,
    x1: &ArrayBase<impl Data<Elem = F>, Ix2>,
    name2: &str,
    x2: &ArrayBase<impl Data<Elem = F>, Ix2>,
) -> Result<()> {
    if x1.ncols() != x2.ncols() {
        return Err(GpError::ShapeMismatch(format!(
            "{name1} have dimension {} while {name2} have dimension {}",
            x1.ncols(),
            x2.ncols()
        )));
    }
    Ok(())
}
