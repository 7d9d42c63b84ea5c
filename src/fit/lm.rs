//! Levenberg–Marquardt nonlinear least squares.
//!
//! Minimizes `Σ (y_i - f(x_i; p))²` for a small parameter vector `p`:
//!
//! - Marquardt scaling: damping is applied to `diag(JᵀJ)`, so parameters with
//!   very different magnitudes (a center near 650 nm next to a damping term
//!   near 0.1) are treated evenly.
//! - Damping update by gain ratio (actual vs. predicted reduction), with the
//!   smooth `max(1/3, 1 - (2ρ - 1)³)` decrease on success and geometric
//!   increase on rejection.
//! - Optional box bounds are enforced by projecting each trial point.
//!
//! Failures are returned as `LmFailure` values; deciding what a failure means
//! for the pipeline is the caller's job.

use std::fmt;

use nalgebra::{DMatrix, DVector};

use crate::domain::{LineshapeKind, SolverSettings};
use crate::math::solve_least_squares;
use crate::models::{ParamBounds, evaluate, fill_gradient};

/// Initial damping factor (relative to `diag(JᵀJ)`).
const INITIAL_DAMPING: f64 = 1e-3;

/// Give up once damping grows past this; the step system is hopeless.
const MAX_DAMPING: f64 = 1e20;

/// Floor for `diag(JᵀJ)` entries so a parameter with zero sensitivity still gets damped.
const DIAG_FLOOR: f64 = 1e-12;

/// A model `y = f(x; p)` with an analytic gradient.
pub trait CurveModel {
    fn n_params(&self) -> usize;
    fn evaluate(&self, x: f64, params: &[f64]) -> f64;
    fn gradient(&self, x: f64, params: &[f64], out: &mut [f64]);
}

impl CurveModel for LineshapeKind {
    fn n_params(&self) -> usize {
        crate::domain::N_PARAMS
    }

    fn evaluate(&self, x: f64, params: &[f64]) -> f64 {
        evaluate(*self, x, params)
    }

    fn gradient(&self, x: f64, params: &[f64], out: &mut [f64]) {
        fill_gradient(*self, x, params, out)
    }
}

/// Which stopping rule ended a successful solve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Relative reduction of the sum of squares fell below `ftol`.
    Ftol,
    /// Relative step size fell below `xtol`.
    Xtol,
    /// Gradient max-norm fell below `gtol`.
    Gtol,
    /// Residuals vanished.
    ExactFit,
}

/// Converged solver state.
#[derive(Debug, Clone)]
pub struct LmSolution {
    pub params: Vec<f64>,
    pub sse: f64,
    pub iterations: usize,
    /// `JᵀJ` at the solution, used for the covariance estimate.
    pub jtj: DMatrix<f64>,
    pub stop: StopReason,
}

/// Why the solver could not produce a solution.
#[derive(Debug, Clone, PartialEq)]
pub enum LmFailure {
    /// Fewer observations than parameters plus one.
    Underdetermined { observations: usize, params: usize },
    /// Residuals or Jacobian contain `Inf`/`NaN`.
    NonFinite,
    /// The damped normal equations could not be solved.
    SingularStep,
    /// Damping grew without finding a downhill step.
    Stalled,
    IterationLimit(usize),
}

impl fmt::Display for LmFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LmFailure::Underdetermined {
                observations,
                params,
            } => write!(
                f,
                "underdetermined: {observations} samples for {params} parameters"
            ),
            LmFailure::NonFinite => write!(f, "non-finite residuals or Jacobian"),
            LmFailure::SingularStep => write!(f, "singular step system"),
            LmFailure::Stalled => write!(f, "no downhill step found"),
            LmFailure::IterationLimit(n) => write!(f, "no convergence after {n} iterations"),
        }
    }
}

/// Solve the least-squares problem starting from `initial`.
///
/// `x` and `y` must have equal length.
pub fn levenberg_marquardt<M: CurveModel>(
    model: &M,
    x: &[f64],
    y: &[f64],
    initial: &[f64],
    bounds: Option<&ParamBounds>,
    settings: &SolverSettings,
) -> Result<LmSolution, LmFailure> {
    debug_assert_eq!(x.len(), y.len());
    let n = x.len();
    let m = model.n_params();
    if n <= m {
        return Err(LmFailure::Underdetermined {
            observations: n,
            params: m,
        });
    }

    let mut p = DVector::from_column_slice(initial);
    if let Some(b) = bounds {
        b.project(p.as_mut_slice());
    }

    let max_iterations = settings.max_iterations.unwrap_or(200 * (m + 1));
    let mut r = residuals(model, x, y, p.as_slice());
    let mut cost = r.norm_squared();
    if !cost.is_finite() {
        return Err(LmFailure::NonFinite);
    }

    let mut jac = DMatrix::<f64>::zeros(n, m);
    let mut lambda = INITIAL_DAMPING;
    let mut nu = 2.0;

    for iteration in 1..=max_iterations {
        fill_jacobian(model, x, p.as_slice(), &mut jac);
        if jac.iter().any(|v| !v.is_finite()) {
            return Err(LmFailure::NonFinite);
        }
        let jtj = jac.tr_mul(&jac);
        let g = jac.tr_mul(&r);

        if g.amax() <= settings.gtol {
            return Ok(finish(p, cost, iteration, jtj, StopReason::Gtol));
        }

        let mut damped = jtj.clone();
        for i in 0..m {
            damped[(i, i)] += lambda * jtj[(i, i)].max(DIAG_FLOOR);
        }
        let Some(delta) = solve_least_squares(&damped, &g) else {
            return Err(LmFailure::SingularStep);
        };

        let mut trial = &p + &delta;
        if let Some(b) = bounds {
            b.project(trial.as_mut_slice());
        }
        let step = &trial - &p;
        let step_norm = step.norm();
        let small_step = step_norm <= settings.xtol * (trial.norm() + settings.xtol);

        let r_trial = residuals(model, x, y, trial.as_slice());
        let cost_trial = r_trial.norm_squared();
        // Reduction predicted by the local linear model for the (projected) step.
        let predicted = cost - (&r - &jac * &step).norm_squared();

        if cost_trial.is_finite() && cost_trial < cost && predicted > 0.0 {
            let rho = (cost - cost_trial) / predicted;
            let reduction = cost - cost_trial;
            let previous = cost;

            p = trial;
            r = r_trial;
            cost = cost_trial;
            lambda *= (1.0_f64 / 3.0).max(1.0 - (2.0 * rho - 1.0).powi(3));
            nu = 2.0;

            let stop = if cost == 0.0 {
                Some(StopReason::ExactFit)
            } else if reduction <= settings.ftol * previous {
                Some(StopReason::Ftol)
            } else if small_step {
                Some(StopReason::Xtol)
            } else {
                None
            };
            if let Some(stop) = stop {
                fill_jacobian(model, x, p.as_slice(), &mut jac);
                let jtj = jac.tr_mul(&jac);
                return Ok(finish(p, cost, iteration, jtj, stop));
            }
        } else {
            if small_step {
                // Rejected step that would not have moved us anyway: `p` is the minimum.
                return Ok(finish(p, cost, iteration, jtj, StopReason::Xtol));
            }
            lambda *= nu;
            nu *= 2.0;
            if lambda > MAX_DAMPING {
                return Err(LmFailure::Stalled);
            }
        }
        log::trace!("lm iteration {iteration}: sse={cost:.6e} lambda={lambda:.3e}");
    }

    Err(LmFailure::IterationLimit(max_iterations))
}

fn finish(
    p: DVector<f64>,
    sse: f64,
    iterations: usize,
    jtj: DMatrix<f64>,
    stop: StopReason,
) -> LmSolution {
    LmSolution {
        params: p.iter().copied().collect(),
        sse,
        iterations,
        jtj,
        stop,
    }
}

fn residuals<M: CurveModel>(model: &M, x: &[f64], y: &[f64], params: &[f64]) -> DVector<f64> {
    DVector::from_iterator(
        x.len(),
        x.iter()
            .zip(y.iter())
            .map(|(&xi, &yi)| yi - model.evaluate(xi, params)),
    )
}

fn fill_jacobian<M: CurveModel>(model: &M, x: &[f64], params: &[f64], jac: &mut DMatrix<f64>) {
    let mut row = vec![0.0; model.n_params()];
    for (i, &xi) in x.iter().enumerate() {
        model.gradient(xi, params, &mut row);
        for (j, &v) in row.iter().enumerate() {
            jac[(i, j)] = v;
        }
    }
}
