//! Dense linear algebra helpers for the Levenberg–Marquardt solver.
//!
//! The systems solved here are tiny (5×5 damped normal equations), so we use
//! SVD throughout: it degrades gracefully when the Jacobian columns are nearly
//! collinear (e.g. a very wide resonance where width and amplitude trade off).

use nalgebra::{DMatrix, DVector};

/// Solve `a · x = b` in the least-squares sense using SVD.
///
/// Returns `None` if the system is too ill-conditioned to solve robustly.
pub fn solve_least_squares(a: &DMatrix<f64>, b: &DVector<f64>) -> Option<DVector<f64>> {
    if a.iter().any(|v| !v.is_finite()) || b.iter().any(|v| !v.is_finite()) {
        return None;
    }
    let svd = a.clone().svd(true, true);

    // Try progressively looser tolerances if strict solve fails.
    for &tol in &[1e-14, 1e-12, 1e-10] {
        if let Ok(x) = svd.solve(b, tol) {
            if x.iter().all(|v| v.is_finite()) {
                return Some(x);
            }
        }
    }

    None
}

/// Moore–Penrose pseudo-inverse of a symmetric positive semi-definite matrix.
///
/// Singular values below `rcond * σ_max` are treated as zero, matching how
/// fit covariances are usually estimated from `JᵀJ`.
pub fn pseudo_inverse(a: &DMatrix<f64>, rcond: f64) -> Option<DMatrix<f64>> {
    if a.iter().any(|v| !v.is_finite()) {
        return None;
    }
    let svd = a.clone().svd(true, true);
    let sigma_max = svd.singular_values.max();
    let eps = (rcond * sigma_max).max(f64::MIN_POSITIVE);
    svd.pseudo_inverse(eps).ok()
}
