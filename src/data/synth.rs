//! Seeded synthetic scans for demos and tests.
//!
//! A synthetic sample scan is `counts · t · lamp(λ) · y(λ) + noise`, where `y`
//! is a resonance lineshape and `lamp` is a broad Gaussian light-source
//! envelope. The matching background scan is `counts · t_bg · lamp(λ)`, so
//! background normalization recovers `y` exactly (up to noise).

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::{Distribution, Normal};

use crate::domain::{LineshapeKind, N_PARAMS, Spectrum};
use crate::error::{PeakError, Result};
use crate::models::evaluate;

/// Parameters for a synthetic scan.
#[derive(Debug, Clone, PartialEq)]
pub struct SynthConfig {
    pub lineshape: LineshapeKind,
    pub params: [f64; N_PARAMS],
    /// First wavelength (nm).
    pub start: f64,
    /// Last wavelength (nm), included when it falls on the grid.
    pub stop: f64,
    pub step: f64,
    /// Peak detector counts per second.
    pub counts: f64,
    /// Sample integration time (s).
    pub integration_time: f64,
    /// Background integration time (s).
    pub background_integration_time: f64,
    /// Gaussian noise on the sample scan, as a fraction of `counts · t`.
    pub noise: f64,
    /// Lamp envelope `(center, sigma)` in nm; `None` means a flat lamp.
    pub lamp: Option<(f64, f64)>,
    pub seed: u64,
}

impl Default for SynthConfig {
    fn default() -> Self {
        Self {
            lineshape: LineshapeKind::Fano,
            params: [650.0, 8.0, 3.0, 0.8, 0.1],
            start: 600.0,
            stop: 700.0,
            step: 0.5,
            counts: 20_000.0,
            integration_time: 0.25,
            background_integration_time: 0.1,
            noise: 0.0,
            lamp: Some((650.0, 80.0)),
            seed: 42,
        }
    }
}

/// A sample scan and its light-source background.
#[derive(Debug, Clone, PartialEq)]
pub struct SynthScan {
    pub sample: Spectrum,
    pub background: Spectrum,
}

/// Generate a deterministic scan pair from `config`.
pub fn synthesize(config: &SynthConfig) -> Result<SynthScan> {
    if !(config.step.is_finite() && config.step > 0.0) || !(config.stop > config.start) {
        return Err(PeakError::invalid(format!(
            "invalid wavelength grid {}..{} step {}",
            config.start, config.stop, config.step
        )));
    }
    for (label, t) in [
        ("sample", config.integration_time),
        ("background", config.background_integration_time),
    ] {
        if !(t.is_finite() && t > 0.0) {
            return Err(PeakError::invalid(format!(
                "{label} integration time must be > 0 s (got {t})"
            )));
        }
    }
    let noise = Normal::new(0.0, config.noise.abs() * config.counts * config.integration_time)
        .map_err(|e| PeakError::invalid(format!("noise distribution: {e}")))?;
    let mut rng = StdRng::seed_from_u64(config.seed);

    let n = ((config.stop - config.start) / config.step + 1e-9).floor() as usize + 1;
    let wavelength: Vec<f64> = (0..n).map(|i| config.start + i as f64 * config.step).collect();
    let lamp: Vec<f64> = wavelength
        .iter()
        .map(|&x| match config.lamp {
            Some((center, sigma)) => (-0.5 * ((x - center) / sigma).powi(2)).exp(),
            None => 1.0,
        })
        .collect();

    let sample: Vec<f64> = wavelength
        .iter()
        .zip(&lamp)
        .map(|(&x, &l)| {
            let y = evaluate(config.lineshape, x, &config.params);
            config.counts * config.integration_time * l * y + noise.sample(&mut rng)
        })
        .collect();
    let background: Vec<f64> = lamp
        .iter()
        .map(|l| config.counts * config.background_integration_time * l)
        .collect();

    Ok(SynthScan {
        sample: Spectrum::new(wavelength.clone(), sample)?,
        background: Spectrum::new(wavelength, background)?,
    })
}
