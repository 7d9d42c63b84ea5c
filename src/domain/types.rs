//! Shared domain types.
//!
//! These types are intentionally kept lightweight and serializable so they can be:
//!
//! - passed between the normalizer, region selector and fitter
//! - persisted as per-spectrum result JSON
//! - reloaded later for plotting or comparisons

use std::fmt;

use chrono::{DateTime, Utc};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::{PeakError, Result};

/// Number of free parameters in every supported lineshape.
pub const N_PARAMS: usize = 5;

/// Supported resonance lineshapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum LineshapeKind {
    /// `A((q + ω)² + d) / (1 + ω²)` with `ω = 2(x - x0)/γ`.
    ///
    /// Parameters: `[x0, gamma, q, amplitude, damping]`.
    Fano,
    /// `A((aγ + (x - res))² / (γ² + (x - res)²)) + offset`.
    ///
    /// Parameters: `[amplitude, assym, res, gamma, offset]`.
    ShiftedFano,
}

impl LineshapeKind {
    /// Human-readable label for terminal output.
    pub fn display_name(self) -> &'static str {
        match self {
            LineshapeKind::Fano => "Fano",
            LineshapeKind::ShiftedFano => "Fano (shifted Lorentzian form)",
        }
    }
}

/// Polarization of the incident light for a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Polarization {
    #[serde(rename = "TE")]
    Te,
    #[serde(rename = "TM")]
    Tm,
    #[serde(rename = "unknown")]
    Unknown,
}

impl Polarization {
    /// Recognize a polarization token (`TE` / `TM`, any case).
    pub fn from_token(token: &str) -> Option<Self> {
        if token.eq_ignore_ascii_case("te") {
            Some(Polarization::Te)
        } else if token.eq_ignore_ascii_case("tm") {
            Some(Polarization::Tm)
        } else {
            None
        }
    }
}

impl fmt::Display for Polarization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Polarization::Te => write!(f, "TE"),
            Polarization::Tm => write!(f, "TM"),
            Polarization::Unknown => write!(f, "unknown"),
        }
    }
}

/// A raw spectrometer scan: wavelength (nm, strictly increasing) and intensity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Spectrum {
    wavelength: Vec<f64>,
    intensity: Vec<f64>,
}

impl Spectrum {
    /// Build a spectrum, validating the axis invariants.
    pub fn new(wavelength: Vec<f64>, intensity: Vec<f64>) -> Result<Self> {
        if wavelength.len() != intensity.len() {
            return Err(PeakError::invalid(format!(
                "wavelength has {} samples but intensity has {}",
                wavelength.len(),
                intensity.len()
            )));
        }
        if wavelength.is_empty() {
            return Err(PeakError::invalid("spectrum has no samples"));
        }
        if let Some(i) = wavelength.windows(2).position(|w| !(w[1] > w[0])) {
            return Err(PeakError::invalid(format!(
                "wavelength axis is not strictly increasing at sample {} ({} -> {})",
                i + 1,
                wavelength[i],
                wavelength[i + 1]
            )));
        }
        Ok(Self {
            wavelength,
            intensity,
        })
    }

    pub fn wavelength(&self) -> &[f64] {
        &self.wavelength
    }

    pub fn intensity(&self) -> &[f64] {
        &self.intensity
    }

    pub fn len(&self) -> usize {
        self.wavelength.len()
    }

    pub fn is_empty(&self) -> bool {
        self.wavelength.is_empty()
    }
}

/// Acquisition details parsed from a scan's file name.
///
/// Immutable once built: fields are only exposed through accessors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcquisitionMetadata {
    file_name: String,
    sample_id: String,
    grating_period: Option<String>,
    polarization: Polarization,
    /// Seconds.
    integration_time: f64,
    is_background: bool,
}

impl AcquisitionMetadata {
    pub fn new(
        file_name: impl Into<String>,
        sample_id: impl Into<String>,
        polarization: Polarization,
        integration_time: f64,
    ) -> Result<Self> {
        let file_name = file_name.into();
        if !(integration_time.is_finite() && integration_time > 0.0) {
            return Err(PeakError::invalid(format!(
                "integration time for '{file_name}' must be > 0 s (got {integration_time})"
            )));
        }
        Ok(Self {
            file_name,
            sample_id: sample_id.into(),
            grating_period: None,
            polarization,
            integration_time,
            is_background: false,
        })
    }

    pub fn with_grating_period(mut self, period: impl Into<String>) -> Self {
        self.grating_period = Some(period.into());
        self
    }

    pub fn as_background(mut self) -> Self {
        self.is_background = true;
        self
    }

    /// Copy with a different integration time (e.g. from a CLI override).
    pub fn with_integration_time(self, integration_time: f64) -> Result<Self> {
        let mut out = Self::new(
            self.file_name,
            self.sample_id,
            self.polarization,
            integration_time,
        )?;
        out.grating_period = self.grating_period;
        out.is_background = self.is_background;
        Ok(out)
    }

    /// File stem; also the key used for result persistence.
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn sample_id(&self) -> &str {
        &self.sample_id
    }

    pub fn grating_period(&self) -> Option<&str> {
        self.grating_period.as_deref()
    }

    pub fn polarization(&self) -> Polarization {
        self.polarization
    }

    pub fn integration_time(&self) -> f64 {
        self.integration_time
    }

    pub fn is_background(&self) -> bool {
        self.is_background
    }

    /// Whether `other` is a background scan for this sample.
    pub fn matches_background(&self, other: &AcquisitionMetadata) -> bool {
        other.is_background
            && other.sample_id == self.sample_id
            && other.polarization == self.polarization
    }
}

/// How a spectrum's intensity was made dimensionless.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum NormalizationMethod {
    /// Time-corrected, then divided by its own maximum.
    MaxIntensity,
    /// Divided by a time-corrected background (light source) scan.
    Background { file_name: String },
}

/// A spectrum whose intensity has been normalized.
///
/// Background division may leave `Inf`/`NaN` samples where the background was zero.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedSpectrum {
    pub wavelength: Vec<f64>,
    pub intensity: Vec<f64>,
    pub method: NormalizationMethod,
}

/// Two wavelength bounds (nm) as produced by a selection, in the order given.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WavelengthBounds {
    pub first: f64,
    pub second: f64,
}

impl WavelengthBounds {
    pub fn new(first: f64, second: f64) -> Self {
        Self { first, second }
    }

    /// `(low, high)` regardless of the order the bounds were given in.
    pub fn ordered(&self) -> (f64, f64) {
        if self.first <= self.second {
            (self.first, self.second)
        } else {
            (self.second, self.first)
        }
    }
}

/// Index range of a spectrum selected for fitting.
///
/// Both ends are **inclusive**: the fitter sees samples `min_index..=max_index`.
/// Invariant: `min_index < max_index < len(spectrum)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RegionIndices")]
pub struct RegionOfInterest {
    min_index: usize,
    max_index: usize,
}

#[derive(Deserialize)]
struct RegionIndices {
    min_index: usize,
    max_index: usize,
}

impl TryFrom<RegionIndices> for RegionOfInterest {
    type Error = PeakError;

    /// Stored regions carry no spectrum length; only the ordering is checked.
    fn try_from(raw: RegionIndices) -> Result<Self> {
        Self::new(raw.min_index, raw.max_index, raw.max_index.saturating_add(1))
    }
}

impl RegionOfInterest {
    pub fn new(min_index: usize, max_index: usize, len: usize) -> Result<Self> {
        if min_index >= max_index {
            return Err(PeakError::invalid(format!(
                "region must span at least two samples (got indices {min_index}..={max_index})"
            )));
        }
        if max_index >= len {
            return Err(PeakError::invalid(format!(
                "region end index {max_index} is outside a spectrum of {len} samples"
            )));
        }
        Ok(Self {
            min_index,
            max_index,
        })
    }

    pub fn min_index(&self) -> usize {
        self.min_index
    }

    pub fn max_index(&self) -> usize {
        self.max_index
    }

    /// Number of samples in the window.
    pub fn len(&self) -> usize {
        self.max_index - self.min_index + 1
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    /// The inclusive window of `values` covered by this region.
    ///
    /// # Panics
    /// Panics if `values` is shorter than the spectrum the region was built for.
    pub fn window<'a>(&self, values: &'a [f64]) -> &'a [f64] {
        &values[self.min_index..=self.max_index]
    }
}

/// Outcome of a fit attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FitStatus {
    Converged { iterations: usize, sse: f64 },
    NotConverged { reason: String },
}

/// Fitted lineshape parameters and the extracted resonance peak.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FanoFitResult {
    pub lineshape: LineshapeKind,
    pub parameter_names: Vec<String>,
    pub parameters: Vec<f64>,
    /// Standard errors, `+∞` where the covariance could not be estimated.
    #[serde(with = "crate::domain::serde_floats::errors")]
    pub errors: Vec<f64>,
    pub peak_wavelength: f64,
    #[serde(with = "crate::domain::serde_floats::error")]
    pub peak_error: f64,
    pub status: FitStatus,
}

impl FanoFitResult {
    pub fn is_converged(&self) -> bool {
        matches!(self.status, FitStatus::Converged { .. })
    }
}

/// Everything known about one processed spectrum.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpectrumResult {
    pub metadata: AcquisitionMetadata,
    pub background: Option<AcquisitionMetadata>,
    pub normalization: NormalizationMethod,
    pub bounds: WavelengthBounds,
    pub region: RegionOfInterest,
    pub fit: FanoFitResult,
    pub peak_wavelength: f64,
    #[serde(with = "crate::domain::serde_floats::error")]
    pub peak_error: f64,
    /// Wavelength samples handed to the fitter.
    pub window_wavelength: Vec<f64>,
    /// Normalized intensity samples handed to the fitter.
    #[serde(with = "crate::domain::serde_floats::samples")]
    pub window_intensity: Vec<f64>,
    pub processed_at: DateTime<Utc>,
}

impl SpectrumResult {
    /// Persistence key (file stem of the source scan).
    pub fn key(&self) -> &str {
        self.metadata.file_name()
    }
}

/// What happened to one file of a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BatchOutcome {
    Converged {
        peak_wavelength: f64,
        #[serde(with = "crate::domain::serde_floats::error")]
        peak_error: f64,
    },
    NoPeak { reason: String },
    Skipped { reason: String },
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchEntry {
    pub file: String,
    pub outcome: BatchOutcome,
}

/// Persisted aggregate of one batch run (`<batch>_Summary.json`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchRecord {
    pub batch: String,
    pub converged: usize,
    pub no_peak: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Processed files first, in input order, then skipped and failed ones.
    pub entries: Vec<BatchEntry>,
    pub finished_at: DateTime<Utc>,
}

/// Levenberg–Marquardt stopping rules.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolverSettings {
    /// Relative reduction of the sum of squares.
    pub ftol: f64,
    /// Relative step size.
    pub xtol: f64,
    /// Max-norm of the gradient.
    pub gtol: f64,
    /// Iteration budget; `None` means `200 * (n_params + 1)`.
    pub max_iterations: Option<usize>,
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self {
            ftol: 1.49012e-8,
            xtol: 1.49012e-8,
            gtol: 1.49012e-8,
            max_iterations: None,
        }
    }
}

/// Settings for one pipeline run.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub lineshape: LineshapeKind,
    /// Constrain center/shape/offset during the fit.
    pub bounded: bool,
    pub solver: SolverSettings,
    /// Replaces the integration time parsed from file names.
    pub integration_time_override: Option<f64>,
    /// Re-process files that already have a stored result.
    pub overwrite: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            lineshape: LineshapeKind::Fano,
            bounded: false,
            solver: SolverSettings::default(),
            integration_time_override: None,
            overwrite: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spectrum_rejects_mismatched_lengths() {
        let err = Spectrum::new(vec![1.0, 2.0], vec![1.0]).unwrap_err();
        assert!(matches!(err, PeakError::InvalidParameter(_)));
    }

    #[test]
    fn spectrum_rejects_non_increasing_axis() {
        assert!(Spectrum::new(vec![1.0, 1.0], vec![0.0, 0.0]).is_err());
        assert!(Spectrum::new(vec![2.0, 1.0], vec![0.0, 0.0]).is_err());
        assert!(Spectrum::new(vec![], vec![]).is_err());
        assert!(Spectrum::new(vec![500.0], vec![3.0]).is_ok());
    }

    #[test]
    fn metadata_requires_positive_integration_time() {
        assert!(AcquisitionMetadata::new("f", "s", Polarization::Te, 0.0).is_err());
        assert!(AcquisitionMetadata::new("f", "s", Polarization::Te, -1.0).is_err());
        assert!(AcquisitionMetadata::new("f", "s", Polarization::Te, f64::NAN).is_err());
    }

    #[test]
    fn background_match_needs_sample_and_polarization() {
        let sample = AcquisitionMetadata::new("GMR1_P400_TE", "GMR1", Polarization::Te, 0.1).unwrap();
        let bg = AcquisitionMetadata::new("GMR1_Background_TE", "GMR1", Polarization::Te, 0.05)
            .unwrap()
            .as_background();
        let bg_tm = AcquisitionMetadata::new("GMR1_Background_TM", "GMR1", Polarization::Tm, 0.05)
            .unwrap()
            .as_background();
        assert!(sample.matches_background(&bg));
        assert!(!sample.matches_background(&bg_tm));
        assert!(!sample.matches_background(&sample));
    }

    #[test]
    fn region_invariants_and_inclusive_window() {
        assert!(RegionOfInterest::new(3, 3, 10).is_err());
        assert!(RegionOfInterest::new(4, 3, 10).is_err());
        assert!(RegionOfInterest::new(3, 10, 10).is_err());

        let roi = RegionOfInterest::new(1, 3, 5).unwrap();
        let values = [10.0, 11.0, 12.0, 13.0, 14.0];
        assert_eq!(roi.window(&values), &[11.0, 12.0, 13.0]);
        assert_eq!(roi.len(), 3);
    }

    #[test]
    fn stored_region_with_inverted_indices_is_rejected() {
        let roi: RegionOfInterest =
            serde_json::from_str(r#"{"min_index":2,"max_index":5}"#).unwrap();
        assert_eq!((roi.min_index(), roi.max_index()), (2, 5));

        assert!(serde_json::from_str::<RegionOfInterest>(r#"{"min_index":5,"max_index":2}"#).is_err());
        assert!(serde_json::from_str::<RegionOfInterest>(r#"{"min_index":4,"max_index":4}"#).is_err());
    }

    #[test]
    fn batch_outcomes_are_tagged_by_status() {
        let entry = BatchEntry {
            file: "A_P400_TE_Int250.txt".into(),
            outcome: BatchOutcome::Converged {
                peak_wavelength: 650.0,
                peak_error: f64::INFINITY,
            },
        };
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["outcome"]["status"], "converged");
        assert!(json["outcome"]["peak_error"].is_null());

        let back: BatchEntry = serde_json::from_value(json).unwrap();
        assert_eq!(back, entry);
    }

    #[test]
    fn bounds_order_is_normalized() {
        assert_eq!(WavelengthBounds::new(680.0, 620.0).ordered(), (620.0, 680.0));
        assert_eq!(WavelengthBounds::new(620.0, 680.0).ordered(), (620.0, 680.0));
    }
}
