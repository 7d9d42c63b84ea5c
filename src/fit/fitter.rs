//! Fail-soft lineshape fitting over a selected window.
//!
//! Given the windowed wavelength/intensity samples we:
//! - drop pairs where either value is not finite
//! - seed the center from the wavelength of maximum intensity
//! - run Levenberg–Marquardt (optionally inside the bounded box)
//! - estimate standard errors from `(JᵀJ)⁺ · SSE / (n - p)`
//! - read the peak and its error through the lineshape's `ParamLayout`
//!
//! A solver failure never becomes an `Err`: the caller gets the all-zero
//! result with `FitStatus::NotConverged`, so one bad spectrum cannot abort a
//! batch.

use log::{debug, warn};

use crate::domain::{
    FanoFitResult, FitStatus, LineshapeKind, N_PARAMS, NormalizedSpectrum, PipelineConfig,
    RegionOfInterest, SolverSettings,
};
use crate::fit::lm::{LmSolution, levenberg_marquardt};
use crate::math::pseudo_inverse;

/// Relative cutoff for singular values of `JᵀJ` in the covariance estimate.
const COVARIANCE_RCOND: f64 = f64::EPSILON * N_PARAMS as f64;

/// Options for a single lineshape fit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitOptions {
    pub lineshape: LineshapeKind,
    /// Fit inside `LineshapeKind::bounds_around(initial_guess)`.
    pub bounded: bool,
    pub solver: SolverSettings,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            lineshape: LineshapeKind::Fano,
            bounded: false,
            solver: SolverSettings::default(),
        }
    }
}

impl FitOptions {
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            lineshape: config.lineshape,
            bounded: config.bounded,
            solver: config.solver,
        }
    }
}

impl FanoFitResult {
    /// The "no peak found" sentinel: every parameter, error and the peak are zero.
    pub fn failed(lineshape: LineshapeKind, reason: impl Into<String>) -> Self {
        Self {
            lineshape,
            parameter_names: parameter_names(lineshape),
            parameters: vec![0.0; N_PARAMS],
            errors: vec![0.0; N_PARAMS],
            peak_wavelength: 0.0,
            peak_error: 0.0,
            status: FitStatus::NotConverged {
                reason: reason.into(),
            },
        }
    }
}

fn parameter_names(lineshape: LineshapeKind) -> Vec<String> {
    lineshape
        .layout()
        .names
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// Fit the window of `spectrum` covered by `region`.
pub fn fit_region(
    spectrum: &NormalizedSpectrum,
    region: &RegionOfInterest,
    opts: &FitOptions,
) -> FanoFitResult {
    fit_fano(
        region.window(&spectrum.wavelength),
        region.window(&spectrum.intensity),
        opts,
    )
}

/// Fit a lineshape to `(wavelength, intensity)` and extract the resonance peak.
///
/// Never fails: see the module docs for the fail-soft contract.
pub fn fit_fano(wavelength: &[f64], intensity: &[f64], opts: &FitOptions) -> FanoFitResult {
    let kind = opts.lineshape;
    let intensity_len = intensity.len();

    if wavelength.len() != intensity_len {
        return no_peak(
            kind,
            format!(
                "window has {} wavelengths but {} intensities",
                wavelength.len(),
                intensity.len()
            ),
        );
    }

    // Background division can leave Inf/NaN where the lamp was dark; fit the rest.
    let (wavelength, intensity): (Vec<f64>, Vec<f64>) = wavelength
        .iter()
        .zip(intensity)
        .filter(|(w, i)| w.is_finite() && i.is_finite())
        .map(|(&w, &i)| (w, i))
        .unzip();
    let dropped = intensity_len - intensity.len();
    if dropped > 0 {
        debug!("dropping {dropped} non-finite samples from the fit window");
    }
    let Some(seed) = argmax_finite(&intensity) else {
        return no_peak(kind, "window has no finite intensity samples");
    };

    let guess = kind.initial_guess(wavelength[seed]);
    let bounds = opts.bounded.then(|| kind.bounds_around(&guess));
    debug!(
        "fitting {} to {} samples, initial guess {:?}{}",
        kind.display_name(),
        wavelength.len(),
        guess,
        if opts.bounded { " (bounded)" } else { "" }
    );

    let solution = match levenberg_marquardt(
        &kind,
        &wavelength,
        &intensity,
        &guess,
        bounds.as_ref(),
        &opts.solver,
    ) {
        Ok(s) => s,
        Err(failure) => return no_peak(kind, failure.to_string()),
    };

    if solution.params.iter().any(|p| !p.is_finite()) {
        return no_peak(kind, "solver returned non-finite parameters");
    }

    let errors = standard_errors(&solution, wavelength.len());
    let layout = kind.layout();
    debug!(
        "converged after {} iterations ({:?}), sse={:.4e}",
        solution.iterations, solution.stop, solution.sse
    );

    FanoFitResult {
        lineshape: kind,
        parameter_names: parameter_names(kind),
        peak_wavelength: solution.params[layout.peak_index],
        peak_error: errors[layout.peak_error_index],
        parameters: solution.params,
        errors,
        status: FitStatus::Converged {
            iterations: solution.iterations,
            sse: solution.sse,
        },
    }
}

fn no_peak(kind: LineshapeKind, reason: impl Into<String>) -> FanoFitResult {
    let reason = reason.into();
    warn!("No peak found ({reason}); reporting zeros.");
    FanoFitResult::failed(kind, reason)
}

/// Index of the largest finite sample; first wins ties.
fn argmax_finite(values: &[f64]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, &v) in values.iter().enumerate() {
        if !v.is_finite() {
            continue;
        }
        match best {
            Some((_, b)) if v <= b => {}
            _ => best = Some((i, v)),
        }
    }
    best.map(|(i, _)| i)
}

/// `sqrt(diag((JᵀJ)⁺ · SSE / (n - p)))`, with `+∞` where no estimate exists.
fn standard_errors(solution: &LmSolution, n_obs: usize) -> Vec<f64> {
    let n_params = solution.params.len();
    let dof = n_obs.saturating_sub(n_params);
    let Some(cov) = pseudo_inverse(&solution.jtj, COVARIANCE_RCOND).filter(|_| dof > 0) else {
        return vec![f64::INFINITY; n_params];
    };

    let scale = solution.sse / dof as f64;
    (0..n_params)
        .map(|i| {
            let var = cov[(i, i)] * scale;
            if var.is_finite() && var >= 0.0 {
                var.sqrt()
            } else {
                f64::INFINITY
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::evaluate;
    use approx::assert_abs_diff_eq;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use rand_distr::{Distribution, Normal};

    fn grid() -> Vec<f64> {
        (0..=120).map(|i| 620.0 + 0.5 * i as f64).collect()
    }

    fn sample(kind: LineshapeKind, params: &[f64], x: &[f64]) -> Vec<f64> {
        x.iter().map(|&xi| evaluate(kind, xi, params)).collect()
    }

    fn opts(lineshape: LineshapeKind, bounded: bool) -> FitOptions {
        FitOptions {
            lineshape,
            bounded,
            solver: SolverSettings::default(),
        }
    }

    #[test]
    fn recovers_noiseless_fano_peak() {
        let x = grid();
        let y = sample(LineshapeKind::Fano, &[650.0, 8.0, 3.0, 0.8, 0.1], &x);

        let fit = fit_fano(&x, &y, &opts(LineshapeKind::Fano, false));
        assert!(fit.is_converged(), "{:?}", fit.status);
        assert_abs_diff_eq!(fit.peak_wavelength, 650.0, epsilon = 1e-3);
        assert_eq!(fit.parameters.len(), N_PARAMS);
        assert_eq!(fit.errors.len(), N_PARAMS);
        assert!(fit.peak_error >= 0.0 && fit.peak_error < 1e-3);
        assert_eq!(fit.parameter_names[0], "x0");
    }

    #[test]
    fn bounded_fit_recovers_the_same_peak() {
        let x = grid();
        let y = sample(LineshapeKind::Fano, &[650.0, 8.0, 3.0, 0.8, 0.1], &x);

        let fit = fit_fano(&x, &y, &opts(LineshapeKind::Fano, true));
        assert!(fit.is_converged());
        assert_abs_diff_eq!(fit.peak_wavelength, 650.0, epsilon = 1e-3);
    }

    #[test]
    fn shifted_form_reports_res_as_peak() {
        let x = grid();
        let y = sample(LineshapeKind::ShiftedFano, &[0.5, 1.5, 650.0, 6.0, 0.05], &x);

        let fit = fit_fano(&x, &y, &opts(LineshapeKind::ShiftedFano, false));
        assert!(fit.is_converged(), "{:?}", fit.status);
        let layout = LineshapeKind::ShiftedFano.layout();
        assert_eq!(fit.peak_wavelength, fit.parameters[layout.peak_index]);
        assert_eq!(fit.peak_error, fit.errors[layout.peak_error_index]);
        assert_abs_diff_eq!(fit.peak_wavelength, 650.0, epsilon = 1e-3);
    }

    #[test]
    fn noisy_fano_stays_near_true_center() {
        let x = grid();
        let mut y = sample(LineshapeKind::Fano, &[650.0, 8.0, 3.0, 0.8, 0.1], &x);
        let mut rng = StdRng::seed_from_u64(7);
        let noise = Normal::new(0.0, 0.02).unwrap();
        for v in &mut y {
            *v += noise.sample(&mut rng);
        }

        let fit = fit_fano(&x, &y, &opts(LineshapeKind::Fano, false));
        assert!(fit.is_converged());
        assert!((fit.peak_wavelength - 650.0).abs() < 0.5);
        assert!(fit.peak_error > 0.0 && fit.peak_error.is_finite());
    }

    #[test]
    fn pure_noise_yields_a_well_formed_result() {
        let x = grid();
        let mut rng = StdRng::seed_from_u64(42);
        let noise = Normal::new(1.0, 0.05).unwrap();
        let y: Vec<f64> = x.iter().map(|_| noise.sample(&mut rng)).collect();

        let fit = fit_fano(&x, &y, &opts(LineshapeKind::Fano, false));
        assert_eq!(fit.parameters.len(), N_PARAMS);
        assert_eq!(fit.errors.len(), N_PARAMS);
        assert!(fit.errors.iter().all(|&e| e >= 0.0));
        if !fit.is_converged() {
            assert!(fit.parameters.iter().all(|&p| p == 0.0));
            assert_eq!(fit.peak_wavelength, 0.0);
        }
    }

    #[test]
    fn too_few_points_fail_soft() {
        let x = [649.0, 650.0, 651.0, 652.0, 653.0];
        let y = [1.0, 0.5, 0.1, 0.5, 1.0];

        let fit = fit_fano(&x, &y, &opts(LineshapeKind::Fano, false));
        match &fit.status {
            FitStatus::NotConverged { reason } => assert!(reason.contains("underdetermined")),
            other => panic!("expected failure, got {other:?}"),
        }
        assert!(fit.parameters.iter().all(|&p| p == 0.0));
        assert_eq!(fit.peak_wavelength, 0.0);
    }

    #[test]
    fn non_finite_samples_are_skipped() {
        let x = grid();
        let mut y = sample(LineshapeKind::Fano, &[650.0, 8.0, 3.0, 0.8, 0.1], &x);
        y[10] = f64::NAN;
        y[40] = f64::INFINITY;

        let fit = fit_fano(&x, &y, &opts(LineshapeKind::Fano, false));
        assert!(fit.is_converged(), "{:?}", fit.status);
        assert_abs_diff_eq!(fit.peak_wavelength, 650.0, epsilon = 1e-3);
        assert!(fit.peak_error.is_finite());
    }

    #[test]
    fn too_few_finite_samples_give_the_zero_sentinel() {
        let x = grid();
        let mut y = vec![f64::NAN; x.len()];
        for (i, v) in y.iter_mut().enumerate().take(5) {
            *v = 1.0 - 0.1 * i as f64;
        }

        let fit = fit_fano(&x, &y, &opts(LineshapeKind::Fano, false));
        match &fit.status {
            FitStatus::NotConverged { reason } => assert!(reason.contains("underdetermined")),
            other => panic!("expected failure, got {other:?}"),
        }
        assert!(fit.parameters.iter().all(|&p| p == 0.0));
        assert!(fit.errors.iter().all(|&e| e == 0.0));
        assert_eq!(fit.peak_error, 0.0);
    }

    #[test]
    fn all_non_finite_window_gives_the_zero_sentinel() {
        let x = grid();
        let y = vec![f64::INFINITY; x.len()];
        let fit = fit_fano(&x, &y, &opts(LineshapeKind::Fano, false));
        assert!(!fit.is_converged());
        assert_eq!(fit.peak_wavelength, 0.0);
    }

    #[test]
    fn fit_region_uses_the_inclusive_window() {
        let x = grid();
        let y = sample(LineshapeKind::Fano, &[650.0, 8.0, 3.0, 0.8, 0.1], &x);
        let spectrum = NormalizedSpectrum {
            wavelength: x.clone(),
            intensity: y,
            method: crate::domain::NormalizationMethod::MaxIntensity,
        };
        let region = RegionOfInterest::new(20, 100, x.len()).unwrap();

        let fit = fit_region(&spectrum, &region, &opts(LineshapeKind::Fano, false));
        assert!(fit.is_converged());
        assert_abs_diff_eq!(fit.peak_wavelength, 650.0, epsilon = 1e-3);
    }

    #[test]
    fn argmax_skips_non_finite_and_prefers_first() {
        assert_eq!(argmax_finite(&[f64::NAN, 1.0, 3.0, 3.0]), Some(2));
        assert_eq!(argmax_finite(&[f64::NAN, f64::INFINITY]), None);
        assert_eq!(argmax_finite(&[]), None);
    }
}
