//! The peak-extraction pipeline shared by the `fit` and `batch` commands.
//!
//! Per spectrum:
//! metadata -> background lookup -> normalize -> bounds -> region -> fit -> result -> persist
//!
//! `process_spectrum` is the in-memory core; `process_file` and `run_batch`
//! add file reading, background lookup and persistence around it.

use std::path::{Path, PathBuf};

use chrono::Utc;
use log::{debug, info, warn};
use rayon::prelude::*;

use crate::domain::{
    AcquisitionMetadata, BatchEntry, BatchOutcome, BatchRecord, FitStatus, PipelineConfig, Spectrum,
    SpectrumResult,
};
use crate::error::{PeakError, Result};
use crate::fit::{FitOptions, fit_region};
use crate::io::{ResultStore, file_stem, find_background, parse_file_name, read_spectrum};
use crate::plot::PlotSink;
use crate::region::{BoundsSource, SelectionRequest, select_region};
use crate::signal::normalize_spectrum;

/// One scan to process, with its background if one was found.
#[derive(Debug, Clone, Copy)]
pub struct SpectrumInput<'a> {
    pub spectrum: &'a Spectrum,
    pub metadata: &'a AcquisitionMetadata,
    pub background: Option<(&'a Spectrum, &'a AcquisitionMetadata)>,
}

/// Collaborators for file-level processing.
#[derive(Clone, Copy)]
pub struct PipelineContext<'a> {
    pub config: &'a PipelineConfig,
    /// Where to look for background scans; `None` always normalizes to max.
    pub background_dir: Option<&'a Path>,
    pub store: &'a dyn ResultStore,
    pub plot: &'a dyn PlotSink,
}

/// Normalize, select a region, fit and assemble the result for one scan.
///
/// A fit that does not converge is still `Ok`: the result carries the zero
/// sentinel and `FitStatus::NotConverged`. Plot failures are logged only.
pub fn process_spectrum(
    input: &SpectrumInput<'_>,
    bounds_source: &mut dyn BoundsSource,
    config: &PipelineConfig,
    plot: &dyn PlotSink,
) -> Result<SpectrumResult> {
    let metadata = input.metadata;
    let normalized = normalize_spectrum(input.spectrum, metadata, input.background)?;

    let bounds = bounds_source.acquire(&SelectionRequest {
        key: metadata.file_name(),
        spectrum: &normalized,
    })?;
    let region = select_region(&normalized.wavelength, bounds)?;
    let fit = fit_region(&normalized, &region, &FitOptions::from_config(config));

    let result = SpectrumResult {
        metadata: metadata.clone(),
        background: input.background.map(|(_, meta)| meta.clone()),
        normalization: normalized.method.clone(),
        bounds,
        region,
        peak_wavelength: fit.peak_wavelength,
        peak_error: fit.peak_error,
        fit,
        window_wavelength: region.window(&normalized.wavelength).to_vec(),
        window_intensity: region.window(&normalized.intensity).to_vec(),
        processed_at: Utc::now(),
    };

    match plot.fit_report(&result, &normalized) {
        Ok(Some(path)) => debug!("fit report written to '{}'", path.display()),
        Ok(None) => {}
        Err(e) => warn!("{}: {e}", metadata.file_name()),
    }
    Ok(result)
}

/// Read, process and persist one scan file.
pub fn process_file(
    path: &Path,
    bounds_source: &mut dyn BoundsSource,
    ctx: &PipelineContext<'_>,
) -> Result<SpectrumResult> {
    let metadata = parse_file_name(path, ctx.config.integration_time_override)?;
    if metadata.is_background() {
        return Err(PeakError::invalid(format!(
            "'{}' is a background scan",
            metadata.file_name()
        )));
    }
    let spectrum = read_spectrum(path)?;

    let background = match ctx.background_dir {
        Some(dir) => match find_background(dir, &metadata)? {
            Some((bg_path, bg_meta)) => Some((read_spectrum(&bg_path)?, bg_meta)),
            None => {
                info!(
                    "{}: no background in '{}', normalizing to maximum",
                    metadata.file_name(),
                    dir.display()
                );
                None
            }
        },
        None => None,
    };

    let input = SpectrumInput {
        spectrum: &spectrum,
        metadata: &metadata,
        background: background.as_ref().map(|(s, m)| (s, m)),
    };
    let result = process_spectrum(&input, bounds_source, ctx.config, ctx.plot)?;
    let saved = ctx.store.save(&result)?;

    if result.fit.is_converged() {
        info!(
            "{}: peak {:.3} ± {:.3} nm -> {}",
            result.key(),
            result.peak_wavelength,
            result.peak_error,
            saved.display()
        );
    } else {
        info!("{}: no peak found -> {}", result.key(), saved.display());
    }
    Ok(result)
}

/// What happened to one file in a batch.
#[derive(Debug)]
enum FileOutcome {
    Processed(Box<SpectrumResult>),
    Skipped(PathBuf, String),
    Failed(PathBuf, String),
}

/// Totals for a batch run, in input file order.
#[derive(Debug, Default)]
pub struct BatchSummary {
    pub results: Vec<SpectrumResult>,
    /// Already processed, or background scans.
    pub skipped: Vec<(PathBuf, String)>,
    pub failed: Vec<(PathBuf, String)>,
}

impl BatchSummary {
    pub fn converged(&self) -> usize {
        self.results.iter().filter(|r| r.fit.is_converged()).count()
    }

    pub fn no_peak(&self) -> usize {
        self.results.len() - self.converged()
    }

    /// Serializable form of this summary for the result store.
    pub fn record(&self, batch: &str) -> BatchRecord {
        let name = |path: &Path| {
            let stem = path.file_stem().unwrap_or(path.as_os_str());
            stem.to_string_lossy().into_owned()
        };
        let processed = self.results.iter().map(|r| BatchEntry {
            file: r.key().to_string(),
            outcome: match &r.fit.status {
                FitStatus::Converged { .. } => BatchOutcome::Converged {
                    peak_wavelength: r.peak_wavelength,
                    peak_error: r.peak_error,
                },
                FitStatus::NotConverged { reason } => BatchOutcome::NoPeak {
                    reason: reason.clone(),
                },
            },
        });
        let skipped = self.skipped.iter().map(|(path, reason)| BatchEntry {
            file: name(path),
            outcome: BatchOutcome::Skipped {
                reason: reason.clone(),
            },
        });
        let failed = self.failed.iter().map(|(path, reason)| BatchEntry {
            file: name(path),
            outcome: BatchOutcome::Failed {
                reason: reason.clone(),
            },
        });

        BatchRecord {
            batch: batch.to_string(),
            converged: self.converged(),
            no_peak: self.no_peak(),
            skipped: self.skipped.len(),
            failed: self.failed.len(),
            entries: processed.chain(skipped).chain(failed).collect(),
            finished_at: Utc::now(),
        }
    }
}

/// Process every file, skipping ones the store already has.
///
/// Errors are logged and counted per file; they never stop the batch.
/// Files are processed in parallel when the bounds source can be forked
/// (fixed or recorded bounds), sequentially otherwise.
pub fn run_batch(
    files: &[PathBuf],
    bounds_source: &mut dyn BoundsSource,
    ctx: &PipelineContext<'_>,
) -> BatchSummary {
    let forks: Option<Vec<Box<dyn BoundsSource + Send>>> =
        files.iter().map(|_| bounds_source.fork()).collect();

    let outcomes: Vec<FileOutcome> = match forks {
        Some(forks) => {
            debug!("processing {} files in parallel", files.len());
            files
                .par_iter()
                .zip(forks)
                .map(|(path, mut source)| process_batch_file(path, source.as_mut(), ctx))
                .collect()
        }
        None => files
            .iter()
            .map(|path| process_batch_file(path, &mut *bounds_source, ctx))
            .collect(),
    };

    let mut summary = BatchSummary::default();
    for outcome in outcomes {
        match outcome {
            FileOutcome::Processed(result) => summary.results.push(*result),
            FileOutcome::Skipped(path, reason) => summary.skipped.push((path, reason)),
            FileOutcome::Failed(path, reason) => summary.failed.push((path, reason)),
        }
    }
    info!(
        "batch done: {} processed ({} with a peak), {} skipped, {} failed",
        summary.results.len(),
        summary.converged(),
        summary.skipped.len(),
        summary.failed.len()
    );
    summary
}

fn process_batch_file(
    path: &Path,
    bounds_source: &mut dyn BoundsSource,
    ctx: &PipelineContext<'_>,
) -> FileOutcome {
    let key = match file_stem(path) {
        Ok(key) => key,
        Err(e) => return FileOutcome::Failed(path.to_path_buf(), e.to_string()),
    };
    if parse_file_name(path, ctx.config.integration_time_override).is_ok_and(|m| m.is_background()) {
        debug!("{key}: background scan, skipping");
        return FileOutcome::Skipped(path.to_path_buf(), "background scan".to_string());
    }
    if !ctx.config.overwrite && ctx.store.exists(&key) {
        info!("{key}: already processed, skipping");
        return FileOutcome::Skipped(path.to_path_buf(), "already processed".to_string());
    }

    match process_file(path, bounds_source, ctx) {
        Ok(result) => FileOutcome::Processed(Box::new(result)),
        Err(e) => {
            warn!("{}: {e}", path.display());
            FileOutcome::Failed(path.to_path_buf(), e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{SynthConfig, synthesize};
    use crate::domain::{NormalizationMethod, Polarization, WavelengthBounds};
    use crate::io::{JsonResultStore, write_spectrum};
    use crate::plot::NoPlot;
    use approx::assert_abs_diff_eq;

    fn meta(name: &str, t: f64) -> AcquisitionMetadata {
        AcquisitionMetadata::new(name, "S1", Polarization::Te, t).unwrap()
    }

    #[test]
    fn max_normalized_spectrum_yields_peak() {
        let scan = synthesize(&SynthConfig {
            step: 1.0,
            lamp: None,
            ..SynthConfig::default()
        })
        .unwrap();
        let m = meta("S1_P400_TE_Int250", 0.25);
        let input = SpectrumInput {
            spectrum: &scan.sample,
            metadata: &m,
            background: None,
        };

        let mut bounds = WavelengthBounds::new(620.0, 680.0);
        let result =
            process_spectrum(&input, &mut bounds, &PipelineConfig::default(), &NoPlot).unwrap();

        assert_eq!(result.normalization, NormalizationMethod::MaxIntensity);
        assert!(result.fit.is_converged());
        assert_abs_diff_eq!(result.peak_wavelength, 650.0, epsilon = 1e-3);
        assert_eq!(result.window_wavelength.first(), Some(&620.0));
        assert_eq!(result.window_wavelength.last(), Some(&680.0));
        assert_eq!(result.peak_wavelength, result.fit.peak_wavelength);
    }

    #[test]
    fn background_normalized_spectrum_yields_peak() {
        let config = SynthConfig::default();
        let scan = synthesize(&config).unwrap();
        let m = meta("S1_P400_TE_Int250", config.integration_time);
        let bg = meta("S1_Background_TE_Int100", config.background_integration_time).as_background();
        let input = SpectrumInput {
            spectrum: &scan.sample,
            metadata: &m,
            background: Some((&scan.background, &bg)),
        };

        let mut bounds = WavelengthBounds::new(620.0, 680.0);
        let result =
            process_spectrum(&input, &mut bounds, &PipelineConfig::default(), &NoPlot).unwrap();
        assert!(matches!(
            result.normalization,
            NormalizationMethod::Background { .. }
        ));
        assert_eq!(result.background.as_ref().map(|b| b.file_name()), Some("S1_Background_TE_Int100"));
        assert_abs_diff_eq!(result.peak_wavelength, 650.0, epsilon = 1e-3);
    }

    #[test]
    fn dark_background_pixel_in_window_still_yields_peak() {
        let config = SynthConfig::default();
        let scan = synthesize(&config).unwrap();
        let mut dark = scan.background.intensity().to_vec();
        let idx = scan.background.wavelength().iter().position(|&w| w == 640.0).unwrap();
        dark[idx] = 0.0;
        let background = Spectrum::new(scan.background.wavelength().to_vec(), dark).unwrap();

        let m = meta("S1_P400_TE_Int250", config.integration_time);
        let bg = meta("S1_Background_TE_Int100", config.background_integration_time).as_background();
        let input = SpectrumInput {
            spectrum: &scan.sample,
            metadata: &m,
            background: Some((&background, &bg)),
        };

        let mut bounds = WavelengthBounds::new(620.0, 680.0);
        let result =
            process_spectrum(&input, &mut bounds, &PipelineConfig::default(), &NoPlot).unwrap();
        assert!(result.window_intensity.iter().any(|v| !v.is_finite()));
        assert!(result.fit.is_converged(), "{:?}", result.fit.status);
        assert_abs_diff_eq!(result.peak_wavelength, 650.0, epsilon = 1e-3);
    }

    #[test]
    fn mismatched_background_is_invalid_parameter() {
        let scan = synthesize(&SynthConfig::default()).unwrap();
        let short = Spectrum::new(vec![600.0, 601.0], vec![1.0, 1.0]).unwrap();
        let m = meta("S1_P400_TE_Int250", 0.25);
        let bg = meta("S1_Background_TE_Int100", 0.1).as_background();
        let input = SpectrumInput {
            spectrum: &scan.sample,
            metadata: &m,
            background: Some((&short, &bg)),
        };

        let mut bounds = WavelengthBounds::new(620.0, 680.0);
        let err = process_spectrum(&input, &mut bounds, &PipelineConfig::default(), &NoPlot)
            .unwrap_err();
        assert!(matches!(err, PeakError::InvalidParameter(_)));
    }

    #[test]
    fn batch_skips_backgrounds_and_processed_files() {
        let dir = tempfile::tempdir().unwrap();
        let config = SynthConfig::default();
        let scan = synthesize(&config).unwrap();
        let sample_path = dir.path().join("S1_P400_TE_Int250.txt");
        let bg_path = dir.path().join("S1_Background_TE_Int100.txt");
        let bad_path = dir.path().join("S2_P400_TE.txt");
        write_spectrum(&sample_path, &scan.sample).unwrap();
        write_spectrum(&bg_path, &scan.background).unwrap();
        write_spectrum(&bad_path, &scan.sample).unwrap();

        let store = JsonResultStore::new(dir.path().join("results")).unwrap();
        let pipeline_config = PipelineConfig::default();
        let ctx = PipelineContext {
            config: &pipeline_config,
            background_dir: Some(dir.path()),
            store: &store,
            plot: &NoPlot,
        };
        let files = vec![bg_path.clone(), sample_path.clone(), bad_path.clone()];
        let mut bounds = WavelengthBounds::new(620.0, 680.0);

        let first = run_batch(&files, &mut bounds, &ctx);
        assert_eq!(first.results.len(), 1);
        assert_eq!(first.converged(), 1);
        assert_eq!(first.skipped.len(), 1);
        assert_eq!(first.failed.len(), 1);
        assert_eq!(first.failed[0].0, bad_path);
        assert!(matches!(
            first.results[0].normalization,
            NormalizationMethod::Background { .. }
        ));
        assert_abs_diff_eq!(first.results[0].peak_wavelength, 650.0, epsilon = 1e-3);

        let second = run_batch(&files, &mut bounds, &ctx);
        assert!(second.results.is_empty());
        assert_eq!(second.skipped.len(), 2);
        assert!(second.skipped.iter().any(|(p, r)| p == &sample_path && r == "already processed"));
    }
}
