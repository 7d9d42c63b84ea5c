//! Plot output.
//!
//! - `ascii`: deterministic terminal plots of a fitted window
//! - `svg`: per-spectrum SVG fit reports (plotters)
//!
//! The pipeline only sees the `PlotSink` trait; headless and test runs use `NoPlot`.

use std::path::PathBuf;

use crate::domain::{NormalizedSpectrum, SpectrumResult};
use crate::error::Result;

pub mod ascii;
pub mod svg;

pub use ascii::*;
pub use svg::SvgPlotter;

/// Receives a diagnostic figure for each processed spectrum.
pub trait PlotSink: Send + Sync {
    /// Render the fit report; returns where it was written, if anywhere.
    fn fit_report(&self, result: &SpectrumResult, spectrum: &NormalizedSpectrum) -> Result<Option<PathBuf>>;
}

/// Discards plots.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPlot;

impl PlotSink for NoPlot {
    fn fit_report(&self, _result: &SpectrumResult, _spectrum: &NormalizedSpectrum) -> Result<Option<PathBuf>> {
        Ok(None)
    }
}
