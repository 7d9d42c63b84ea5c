//! SVG fit reports.
//!
//! One figure per processed spectrum, `<dir>/<stem>_Fit.svg`:
//! - normalized spectrum around the fitted window (grey line)
//! - samples handed to the fitter (blue dots)
//! - fitted lineshape (red line) and a vertical line at the peak

use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};

use plotters::prelude::*;

use crate::domain::{NormalizedSpectrum, SpectrumResult};
use crate::error::{PeakError, Result};
use crate::models::evaluate;
use crate::plot::PlotSink;

const FIGURE_SIZE: (u32, u32) = (900, 600);
const CURVE_SAMPLES: usize = 400;

/// Writes SVG fit reports into a directory.
#[derive(Debug, Clone)]
pub struct SvgPlotter {
    dir: PathBuf,
}

impl SvgPlotter {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| PeakError::io(&dir, e))?;
        Ok(Self { dir })
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}_Fit.svg"))
    }
}

impl PlotSink for SvgPlotter {
    fn fit_report(&self, result: &SpectrumResult, spectrum: &NormalizedSpectrum) -> Result<Option<PathBuf>> {
        let path = self.path_for(result.key());
        draw_fit_report(&path, result, spectrum)
            .map_err(|e| PeakError::Plot(format!("{}: {e}", path.display())))?;
        Ok(Some(path))
    }
}

fn draw_fit_report(
    path: &Path,
    result: &SpectrumResult,
    spectrum: &NormalizedSpectrum,
) -> std::result::Result<(), Box<dyn Error>> {
    let (lo, hi) = match (result.window_wavelength.first(), result.window_wavelength.last()) {
        (Some(&a), Some(&b)) if b > a => (a, b),
        _ => return Err("empty fit window".into()),
    };
    let (x0, x1) = (lo - 0.1 * (hi - lo), hi + 0.1 * (hi - lo));

    let context: Vec<(f64, f64)> = spectrum
        .wavelength
        .iter()
        .zip(&spectrum.intensity)
        .filter(|(w, i)| (x0..=x1).contains(*w) && i.is_finite())
        .map(|(&w, &i)| (w, i))
        .collect();
    let samples: Vec<(f64, f64)> = result
        .window_wavelength
        .iter()
        .zip(&result.window_intensity)
        .filter(|(_, i)| i.is_finite())
        .map(|(&w, &i)| (w, i))
        .collect();
    let curve: Vec<(f64, f64)> = if result.fit.is_converged() {
        (0..CURVE_SAMPLES)
            .map(|i| {
                let x = lo + (hi - lo) * i as f64 / (CURVE_SAMPLES - 1) as f64;
                (x, evaluate(result.fit.lineshape, x, &result.fit.parameters))
            })
            .filter(|(_, y)| y.is_finite())
            .collect()
    } else {
        Vec::new()
    };

    let (mut y0, mut y1) = context
        .iter()
        .chain(&samples)
        .chain(&curve)
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &(_, y)| {
            (lo.min(y), hi.max(y))
        });
    if !(y0.is_finite() && y1.is_finite()) {
        return Err("no finite intensity to plot".into());
    }
    let pad = ((y1 - y0) * 0.05).max(1e-6);
    y0 -= pad;
    y1 += pad;

    let caption = if result.fit.is_converged() {
        format!(
            "{}  peak {:.3} ± {:.3} nm",
            result.key(),
            result.peak_wavelength,
            result.peak_error
        )
    } else {
        format!("{}  no peak found", result.key())
    };

    let root = SVGBackend::new(path, FIGURE_SIZE).into_drawing_area();
    root.fill(&WHITE)?;
    let mut chart = ChartBuilder::on(&root)
        .caption(caption, ("sans-serif", 20))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(x0..x1, y0..y1)?;

    chart
        .configure_mesh()
        .x_desc("Wavelength [nm]")
        .y_desc("Normalized intensity")
        .draw()?;

    chart.draw_series(LineSeries::new(context, &RGBColor(160, 160, 160)))?;
    chart.draw_series(
        samples
            .iter()
            .map(|&(x, y)| Circle::new((x, y), 2, BLUE.filled())),
    )?;
    if !curve.is_empty() {
        chart.draw_series(LineSeries::new(curve, RED.stroke_width(2)))?;
        if (x0..=x1).contains(&result.peak_wavelength) {
            chart.draw_series(std::iter::once(PathElement::new(
                vec![(result.peak_wavelength, y0), (result.peak_wavelength, y1)],
                &BLACK,
            )))?;
        }
    }

    root.present()?;
    Ok(())
}
