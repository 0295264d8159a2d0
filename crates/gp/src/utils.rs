use crate::errors::{GpError, Result};
use linfa::Float;
use ndarray::{Array2, ArrayBase, Data, Ix2};

/// Computes squared euclidean distances between each row of x and each row of y
/// resulting in a 2d array of shape (nrows(x), nrows(y)).
pub(crate) fn squared_distances<F: Float>(
    x: &ArrayBase<impl Data<Elem = F>, Ix2>,
    y: &ArrayBase<impl Data<Elem = F>, Ix2>,
) -> Result<Array2<F>> {
    if x.ncols() != y.ncols() {
        return Err(GpError::ShapeMismatch(format!(
            "cannot compute distances between points of dimension {} and {}",
            x.ncols(),
            y.ncols()
        )));
    }
    Ok(Array2::from_shape_fn((x.nrows(), y.nrows()), |(i, j)| {
        x.row(i)
            .iter()
            .zip(y.row(j).iter())
            .fold(F::zero(), |acc, (a, b)| {
                let d = *a - *b;
                acc + d * d
            })
    }))
}

/// Index pairs (i, j), i < j, of rows of x which are exactly equal
pub(crate) fn duplicated_rows<F: Float>(
    x: &ArrayBase<impl Data<Elem = F>, Ix2>,
) -> Vec<(usize, usize)> {
    let n_obs = x.nrows();
    (0..n_obs)
        .flat_map(|i| ((i + 1)..n_obs).map(move |j| (i, j)))
        .filter(|&(i, j)| x.row(i) == x.row(j))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn test_squared_distances() {
        let x = array![[0., 0.], [1., 1.]];
        let y = array![[0., 0.], [3., 4.], [1., 0.]];
        assert_abs_diff_eq!(
            array![[0., 25., 1.], [2., 13., 1.]],
            squared_distances(&x, &y).unwrap(),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_squared_distances_1d_matches_differences() {
        let x = array![[-2.], [0.3], [1.7]];
        let y = array![[0.5], [-1.1]];
        let d2 = squared_distances(&x, &y).unwrap();
        for i in 0..x.nrows() {
            for j in 0..y.nrows() {
                let diff: f64 = x[[i, 0]] - y[[j, 0]];
                assert_abs_diff_eq!(diff * diff, d2[[i, j]], epsilon = 1e-14);
            }
        }
    }

    #[test]
    fn test_squared_distances_dimension_mismatch() {
        let x = array![[0., 0.], [1., 1.]];
        let y = array![[0.], [3.]];
        assert!(matches!(
            squared_distances(&x, &y),
            Err(GpError::ShapeMismatch(_))
        ));
    }

    #[test]
    fn test_duplicated_rows() {
        let xt = array![[0.5], [1.2], [2.0], [3.0], [4.0]];
        assert!(duplicated_rows(&xt).is_empty());

        let xt = array![[0., 1.], [2., 3.], [0., 1.], [2., 3.5], [0., 1.]];
        assert_eq!(vec![(0, 2), (0, 4), (2, 4)], duplicated_rows(&xt));
    }

    #[test]
    fn test_duplicated_rows_single_point() {
        assert!(duplicated_rows(&array![[1., 2.]]).is_empty());
    }
}
