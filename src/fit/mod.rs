//! Resonance fitting.
//!
//! - `lm`: the Levenberg–Marquardt solver (model-agnostic)
//! - `fitter`: fail-soft lineshape fit over a selected window, peak extraction

pub mod fitter;
pub mod lm;

pub use fitter::*;
pub use lm::{CurveModel, LmFailure, LmSolution, StopReason, levenberg_marquardt};
