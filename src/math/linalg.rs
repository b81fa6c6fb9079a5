//! Dense linear algebra helpers.
//!
//! Everything here works on small `nalgebra` matrices (data points × parameters):
//!
//! - least squares via SVD (tall design matrices, possibly near-collinear columns)
//! - covariance inversion via Cholesky (a covariance that is not positive definite is
//!   treated as singular)

use nalgebra::{DMatrix, DVector};

/// Solve a least squares problem using SVD.
///
/// Returns `None` if the system is too ill-conditioned to solve robustly.
pub fn solve_least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<DVector<f64>> {
    if x.nrows() != y.len() {
        return None;
    }
    if x.ncols() == 0 {
        return Some(DVector::zeros(0));
    }
    let svd = x.clone().svd(true, true);

    // Try progressively looser tolerances if strict solve fails.
    for &tol in &[1e-12, 1e-10, 1e-8] {
        if let Ok(beta) = svd.solve(y, tol) {
            if beta.iter().all(|v| v.is_finite()) {
                return Some(beta);
            }
        }
    }

    None
}

/// Invert a symmetric positive definite matrix (e.g. a covariance matrix).
///
/// Returns `None` for non-square, non-finite or singular input.
pub fn invert_covariance(cov: &DMatrix<f64>) -> Option<DMatrix<f64>> {
    if !cov.is_square() || cov.iter().any(|v| !v.is_finite()) {
        return None;
    }
    let inverse = cov.clone().cholesky()?.inverse();
    if inverse.iter().all(|v| v.is_finite()) {
        Some(inverse)
    } else {
        None
    }
}

/// `n` evenly spaced values from `start` to `end` (inclusive).
pub fn linspace(start: f64, end: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (end - start) / (n as f64 - 1.0);
            (0..n).map(|i| start + step * i as f64).collect()
        }
    }
}
