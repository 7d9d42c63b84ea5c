//! Map wavelength bounds onto sample indices.

use log::debug;

use crate::domain::{RegionOfInterest, WavelengthBounds};
use crate::error::{PeakError, Result};

/// Index of the sample closest to `target`; the first index wins ties.
///
/// Returns `None` for an empty axis or a non-finite target.
pub fn nearest_index(wavelength: &[f64], target: f64) -> Option<usize> {
    if !target.is_finite() {
        return None;
    }
    let mut best: Option<(usize, f64)> = None;
    for (i, &w) in wavelength.iter().enumerate() {
        let d = (w - target).abs();
        match best {
            Some((_, bd)) if !(d < bd) => {}
            _ => best = Some((i, d)),
        }
    }
    best.map(|(i, _)| i)
}

/// Turn two wavelength bounds (either order) into an inclusive index region.
///
/// Fails with `InvalidParameter` if the axis is empty, a bound is not finite,
/// or both bounds land on the same sample.
pub fn select_region(wavelength: &[f64], bounds: WavelengthBounds) -> Result<RegionOfInterest> {
    let (low, high) = bounds.ordered();
    let (Some(a), Some(b)) = (
        nearest_index(wavelength, low),
        nearest_index(wavelength, high),
    ) else {
        return Err(PeakError::invalid(format!(
            "cannot select {low}..{high} nm on a spectrum of {} samples",
            wavelength.len()
        )));
    };

    let (min_index, max_index) = (a.min(b), a.max(b));
    if min_index == max_index {
        return Err(PeakError::invalid(format!(
            "bounds {low}..{high} nm both map to sample {min_index} ({} nm)",
            wavelength[min_index]
        )));
    }
    debug!(
        "region {low}..{high} nm -> indices {min_index}..={max_index} ({}..{} nm)",
        wavelength[min_index], wavelength[max_index]
    );
    RegionOfInterest::new(min_index, max_index, wavelength.len())
}
