//! This library implements closed-form [Gaussian Process](https://en.wikipedia.org/wiki/Gaussian_process)
//! inference with fixed hyperparameters, as derived from the conditioning identities of the
//! multivariate normal distribution:
//!
//! * kernel construction over inputs of any dimension ([`kernel`]),
//! * sampling from the GP prior ([`sample_prior`]),
//! * posterior mean and covariance given noiseless observations ([`posterior`]),
//! * sampling from a posterior ([`sample_posterior`]).
//!
//! The free functions use the squared exponential kernel with unit length-scale.
//! Other settings (length-scale, jitter, nugget) go through [`GaussianProcess`]
//! parameterized by [`GpParams`].
//!
//! No hyperparameter is ever estimated. The complexity of the conditioning is in O(m^3)
//! in processing time and O(m^2) in memory where m is the number of training points.
#![warn(missing_docs)]
#![warn(rustdoc::broken_intra_doc_links)]
mod algorithm;
mod errors;
pub mod kernels;
pub mod linalg;
mod parameters;
mod utils;

pub use algorithm::*;
pub use errors::*;
pub use kernels::{Kernel, SquaredExponentialKernel};
pub use parameters::*;
