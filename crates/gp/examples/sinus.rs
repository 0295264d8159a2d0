use condgp::{GaussianProcess, SquaredExponentialKernel};
use env_logger::{Builder, Env};
use linfa::ParamGuard;
use ndarray::{Array, Array1, Array2, Axis, arr2, concatenate};
use ndarray_npy::write_npy;
use ndarray_rand::rand::SeedableRng;
use rand_xoshiro::Xoshiro256Plus;

fn sinus(x: &Array2<f64>) -> Array1<f64> {
    x.column(0).mapv(f64::sin)
}

fn main() {
    let env = Env::new().filter_or("CONDGP_LOG", "info");
    Builder::from_env(env)
        .target(env_logger::Target::Stdout)
        .try_init()
        .ok();

    let xt = arr2(&[[-4.0], [-3.0], [-2.0], [-1.0], [1.0]]);
    let yt = sinus(&xt);

    let gp = GaussianProcess::<f64, SquaredExponentialKernel<f64>>::params(
        SquaredExponentialKernel::default(),
    )
    .jitter(1e-6)
    .check()
    .map(GaussianProcess::new)
    .expect("GP parameters");
    println!("{gp} conditioned on 'sin' at {}", xt.column(0));

    let xtest = Array::linspace(-5., 5., 50).insert_axis(Axis(1));
    let ytest = sinus(&xtest);

    let mut rng = Xoshiro256Plus::seed_from_u64(42);
    let prior = gp
        .sample_prior_with_rng(&xtest, 3, &mut rng)
        .expect("Prior sampling");
    let posterior = gp.posterior(&xt, &yt, &xtest).expect("GP posterior");
    let samples = gp
        .sample_posterior_with_rng(&posterior, 3, &mut rng)
        .expect("Posterior sampling");
    let (lower, upper) = posterior.credible_interval(1.96);

    println!("Prediction errors and 95% band (x, err(x), lower(x), upper(x))");
    println!(
        "{}",
        concatenate![
            Axis(1),
            xtest,
            (posterior.mean() - &ytest).insert_axis(Axis(1)),
            lower.view().insert_axis(Axis(1)),
            upper.view().insert_axis(Axis(1))
        ]
    );

    let out_dir = "target/demos";
    std::fs::create_dir_all(out_dir).expect("output directory");
    for (name, data) in [
        ("xtest", &xtest),
        ("prior_samples", &prior),
        ("posterior_samples", &samples),
        ("posterior_cov", posterior.covariance()),
    ] {
        write_npy(format!("{out_dir}/{name}.npy"), data).expect("array saved");
    }
    write_npy(format!("{out_dir}/posterior_mean.npy"), posterior.mean()).expect("mean saved");
    println!("Arrays saved in {out_dir} for plotting");
}
