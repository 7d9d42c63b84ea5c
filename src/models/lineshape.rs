//! Lineshape evaluation for the supported resonance models.
//!
//! The fitter relies on three primitive operations:
//! - evaluate `y(x)` for a parameter vector (for residuals/plots)
//! - fill the analytic gradient `∂y/∂p` at `x` (for the Jacobian)
//! - describe which parameter is the resonance center (`ParamLayout`)
//!
//! Peak extraction always goes through `ParamLayout::peak_index` and
//! `ParamLayout::peak_error_index`, never through a literal array index.

use std::f64::consts::PI;

use crate::domain::{LineshapeKind, N_PARAMS};

/// Half-width of the allowed center range around the initial guess (nm).
pub const CENTER_BOUND_NM: f64 = 25.0;

/// Limit on the asymmetry (shape) factor in bounded fits.
pub const SHAPE_BOUND: f64 = 10.0;

/// Limit on damping / offset in bounded fits.
pub const OFFSET_BOUND: f64 = 2.0 * PI;

/// Meaning of each slot in a lineshape's parameter vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParamLayout {
    pub names: [&'static str; N_PARAMS],
    /// Resonance center.
    pub peak_index: usize,
    /// Standard error reported as the peak error. Always the center's own error.
    pub peak_error_index: usize,
    pub width_index: usize,
    pub shape_index: usize,
    /// Damping term (`Fano`) or additive offset (`ShiftedFano`).
    pub offset_index: usize,
}

/// Box constraints on the parameter vector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamBounds {
    pub lower: [f64; N_PARAMS],
    pub upper: [f64; N_PARAMS],
}

impl ParamBounds {
    pub fn unbounded() -> Self {
        Self {
            lower: [f64::NEG_INFINITY; N_PARAMS],
            upper: [f64::INFINITY; N_PARAMS],
        }
    }

    /// Clamp `params` into the box.
    pub fn project(&self, params: &mut [f64]) {
        for (i, p) in params.iter_mut().enumerate() {
            *p = p.clamp(self.lower[i], self.upper[i]);
        }
    }

    pub fn contains(&self, params: &[f64]) -> bool {
        params
            .iter()
            .enumerate()
            .all(|(i, &p)| p >= self.lower[i] && p <= self.upper[i])
    }
}

impl LineshapeKind {
    pub fn layout(self) -> ParamLayout {
        match self {
            LineshapeKind::Fano => ParamLayout {
                names: ["x0", "gamma", "q", "amplitude", "damping"],
                peak_index: 0,
                peak_error_index: 0,
                width_index: 1,
                shape_index: 2,
                offset_index: 4,
            },
            LineshapeKind::ShiftedFano => ParamLayout {
                names: ["amplitude", "assym", "res", "gamma", "offset"],
                peak_index: 2,
                peak_error_index: 2,
                width_index: 3,
                shape_index: 1,
                offset_index: 4,
            },
        }
    }

    /// Starting point for the solver, centered on `center` (nm).
    ///
    /// Width, shape, amplitude and offset start from small positive constants;
    /// only the center comes from the data.
    pub fn initial_guess(self, center: f64) -> [f64; N_PARAMS] {
        match self {
            LineshapeKind::Fano => [center, 10.0, 5.0, 0.6, 1.0],
            LineshapeKind::ShiftedFano => [1.0, 1.0, center, 10.0, 1.0],
        }
    }

    /// Bounds for the constrained fit variant, built around an initial guess.
    pub fn bounds_around(self, guess: &[f64; N_PARAMS]) -> ParamBounds {
        let layout = self.layout();
        let mut bounds = ParamBounds::unbounded();

        let center = guess[layout.peak_index];
        bounds.lower[layout.peak_index] = center - CENTER_BOUND_NM;
        bounds.upper[layout.peak_index] = center + CENTER_BOUND_NM;
        bounds.lower[layout.shape_index] = -SHAPE_BOUND;
        bounds.upper[layout.shape_index] = SHAPE_BOUND;
        bounds.lower[layout.offset_index] = -OFFSET_BOUND;
        bounds.upper[layout.offset_index] = OFFSET_BOUND;
        bounds
    }
}

/// Evaluate the lineshape at `x`.
///
/// # Panics
/// Panics if `params` has fewer than `N_PARAMS` entries.
pub fn evaluate(kind: LineshapeKind, x: f64, params: &[f64]) -> f64 {
    match kind {
        LineshapeKind::Fano => {
            let (x0, gamma, q, amplitude, damping) =
                (params[0], params[1], params[2], params[3], params[4]);
            let omega = 2.0 * (x - x0) / gamma;
            let numer = (q + omega).powi(2) + damping;
            let denom = 1.0 + omega * omega;
            amplitude * numer / denom
        }
        LineshapeKind::ShiftedFano => {
            let (amplitude, assym, res, gamma, offset) =
                (params[0], params[1], params[2], params[3], params[4]);
            let u = x - res;
            let numer = (assym * gamma + u).powi(2);
            let denom = gamma * gamma + u * u;
            amplitude * numer / denom + offset
        }
    }
}

/// Fill `out` with `∂y/∂p_k` at `x`.
///
/// # Panics
/// Panics if `params` or `out` has fewer than `N_PARAMS` entries.
pub fn fill_gradient(kind: LineshapeKind, x: f64, params: &[f64], out: &mut [f64]) {
    match kind {
        LineshapeKind::Fano => {
            let (x0, gamma, q, amplitude, damping) =
                (params[0], params[1], params[2], params[3], params[4]);
            let omega = 2.0 * (x - x0) / gamma;
            let numer = (q + omega).powi(2) + damping;
            let denom = 1.0 + omega * omega;
            let dy_domega = amplitude * (2.0 * (q + omega) * denom - 2.0 * omega * numer) / (denom * denom);

            out[0] = dy_domega * (-2.0 / gamma);
            out[1] = dy_domega * (-omega / gamma);
            out[2] = amplitude * 2.0 * (q + omega) / denom;
            out[3] = numer / denom;
            out[4] = amplitude / denom;
        }
        LineshapeKind::ShiftedFano => {
            let (amplitude, assym, res, gamma, _offset) =
                (params[0], params[1], params[2], params[3], params[4]);
            let u = x - res;
            let lead = assym * gamma + u;
            let numer = lead * lead;
            let denom = gamma * gamma + u * u;
            let dy_du = amplitude * (2.0 * lead * denom - 2.0 * u * numer) / (denom * denom);

            out[0] = numer / denom;
            out[1] = amplitude * 2.0 * lead * gamma / denom;
            out[2] = -dy_du;
            out[3] = amplitude * (2.0 * lead * assym * denom - 2.0 * gamma * numer) / (denom * denom);
            out[4] = 1.0;
        }
    }
}
