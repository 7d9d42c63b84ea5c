//! Turn raw spectrometer counts into dimensionless intensity.
//!
//! Two routes:
//! - no background: `raw / t`, then divide by the maximum
//! - background scan: `raw / ((t / t_bg) · background)`, which removes the
//!   light-source spectrum and leaves the sample's response
//!
//! Background division is a plain element-wise divide: zeros in the
//! background propagate as `Inf`/`NaN` and are left for the fitter to reject.

use log::debug;

use crate::domain::{AcquisitionMetadata, NormalizationMethod, NormalizedSpectrum, Spectrum};
use crate::error::{PeakError, Result};

fn check_integration_time(label: &str, t: f64) -> Result<()> {
    if t.is_finite() && t > 0.0 {
        Ok(())
    } else {
        Err(PeakError::invalid(format!(
            "{label} integration time must be > 0 s (got {t})"
        )))
    }
}

/// Counts per second: `raw[i] / integration_time`.
pub fn time_correct(raw: &[f64], integration_time: f64) -> Result<Vec<f64>> {
    check_integration_time("spectrum", integration_time)?;
    Ok(raw.iter().map(|r| r / integration_time).collect())
}

/// Divide by the largest finite sample so the maximum becomes exactly `1.0`.
///
/// Fails with `DegenerateSignal` when there is no positive finite maximum.
pub fn normalize_to_max(intensity: &[f64]) -> Result<Vec<f64>> {
    let max = intensity
        .iter()
        .copied()
        .filter(|v| v.is_finite())
        .fold(f64::NEG_INFINITY, f64::max);

    if !(max > 0.0) {
        return Err(PeakError::DegenerateSignal(if intensity.is_empty() {
            "spectrum is empty".to_string()
        } else {
            format!("maximum intensity is {max}, cannot normalize")
        }));
    }
    Ok(intensity.iter().map(|v| v / max).collect())
}

/// `intensity[i] / ((t / t_bg) · background[i])`.
///
/// Arrays must already share a wavelength axis; nothing is interpolated.
pub fn normalize_to_background(
    intensity: &[f64],
    background: &[f64],
    integration_time: f64,
    background_integration_time: f64,
) -> Result<Vec<f64>> {
    check_integration_time("spectrum", integration_time)?;
    check_integration_time("background", background_integration_time)?;
    if intensity.len() != background.len() {
        return Err(PeakError::invalid(format!(
            "background has {} samples but spectrum has {}",
            background.len(),
            intensity.len()
        )));
    }

    let factor = integration_time / background_integration_time;
    Ok(intensity
        .iter()
        .zip(background)
        .map(|(i, b)| i / (factor * b))
        .collect())
}

/// Normalize a scan, against its background when one is available.
pub fn normalize_spectrum(
    spectrum: &Spectrum,
    metadata: &AcquisitionMetadata,
    background: Option<(&Spectrum, &AcquisitionMetadata)>,
) -> Result<NormalizedSpectrum> {
    match background {
        Some((bg, bg_meta)) => {
            debug!(
                "normalizing '{}' against background '{}'",
                metadata.file_name(),
                bg_meta.file_name()
            );
            let intensity = normalize_to_background(
                spectrum.intensity(),
                bg.intensity(),
                metadata.integration_time(),
                bg_meta.integration_time(),
            )?;
            let zeros = bg.intensity().iter().filter(|&&b| b == 0.0).count();
            if zeros > 0 {
                debug!("background has {zeros} zero samples; those points are non-finite");
            }
            Ok(NormalizedSpectrum {
                wavelength: spectrum.wavelength().to_vec(),
                intensity,
                method: NormalizationMethod::Background {
                    file_name: bg_meta.file_name().to_string(),
                },
            })
        }
        None => {
            debug!("normalizing '{}' to its maximum", metadata.file_name());
            let corrected = time_correct(spectrum.intensity(), metadata.integration_time())?;
            Ok(NormalizedSpectrum {
                wavelength: spectrum.wavelength().to_vec(),
                intensity: normalize_to_max(&corrected)?,
                method: NormalizationMethod::MaxIntensity,
            })
        }
    }
}
