//! File-based runs of the whole pipeline: scan files in, result JSON out.

use std::path::{Path, PathBuf};

use approx::assert_abs_diff_eq;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::{Distribution, Normal};

use peakfit::app::pipeline::{PipelineContext, process_file, run_batch};
use peakfit::data::{SynthConfig, synthesize};
use peakfit::domain::{
    BatchOutcome, BatchRecord, FitStatus, NormalizationMethod, PipelineConfig, Spectrum, WavelengthBounds,
};
use peakfit::error::PeakError;
use peakfit::io::{JsonResultStore, ResultStore, list_spectrum_files, load_result, write_spectrum};
use peakfit::plot::NoPlot;
use peakfit::region::RegionBook;

fn write_pair(dir: &Path, sample: &str, config: &SynthConfig) -> PathBuf {
    let scan = synthesize(config).unwrap();
    let sample_path = dir.join(format!("{sample}_P400_TE_Int250.txt"));
    write_spectrum(&sample_path, &scan.sample).unwrap();
    write_spectrum(&dir.join(format!("{sample}_Background_TE_Int100.txt")), &scan.background).unwrap();
    sample_path
}

fn context<'a>(config: &'a PipelineConfig, dir: &'a Path, store: &'a JsonResultStore) -> PipelineContext<'a> {
    PipelineContext {
        config,
        background_dir: Some(dir),
        store,
        plot: &NoPlot,
    }
}

#[test]
fn synthetic_fano_peak_is_recovered_and_stored() {
    let dir = tempfile::tempdir().unwrap();
    let sample = write_pair(dir.path(), "GMR1", &SynthConfig::default());
    let store = JsonResultStore::new(dir.path().join("results")).unwrap();
    let config = PipelineConfig::default();

    let mut bounds = WavelengthBounds::new(680.0, 620.0);
    let result = process_file(&sample, &mut bounds, &context(&config, dir.path(), &store)).unwrap();

    assert!(result.fit.is_converged());
    assert_abs_diff_eq!(result.peak_wavelength, 650.0, epsilon = 1e-2);
    assert!(result.peak_error.is_finite() && result.peak_error >= 0.0);
    assert_eq!(
        result.normalization,
        NormalizationMethod::Background {
            file_name: "GMR1_Background_TE_Int100".to_string()
        }
    );

    let stored = load_result(&store.path_for("GMR1_P400_TE_Int250")).unwrap();
    assert_eq!(stored.peak_wavelength, result.peak_wavelength);
    assert_eq!(stored.region, result.region);
}

#[test]
fn without_background_dir_intensity_is_max_normalized() {
    let dir = tempfile::tempdir().unwrap();
    let sample = write_pair(dir.path(), "GMR1", &SynthConfig::default());
    let store = JsonResultStore::new(dir.path().join("results")).unwrap();
    let config = PipelineConfig::default();
    let ctx = PipelineContext {
        background_dir: None,
        ..context(&config, dir.path(), &store)
    };

    let mut bounds = WavelengthBounds::new(620.0, 680.0);
    let result = process_file(&sample, &mut bounds, &ctx).unwrap();
    assert_eq!(result.normalization, NormalizationMethod::MaxIntensity);
    assert!(result.background.is_none());
    // The lamp envelope tilts the max-normalized lineshape slightly.
    assert_abs_diff_eq!(result.peak_wavelength, 650.0, epsilon = 0.5);
}

#[test]
fn background_of_different_length_is_invalid_parameter() {
    let dir = tempfile::tempdir().unwrap();
    let scan = synthesize(&SynthConfig::default()).unwrap();
    let sample = dir.path().join("GMR1_P400_TE_Int250.txt");
    write_spectrum(&sample, &scan.sample).unwrap();
    let short = Spectrum::new(
        scan.background.wavelength()[..50].to_vec(),
        scan.background.intensity()[..50].to_vec(),
    )
    .unwrap();
    write_spectrum(&dir.path().join("GMR1_Background_TE_Int100.txt"), &short).unwrap();

    let store = JsonResultStore::new(dir.path().join("results")).unwrap();
    let config = PipelineConfig::default();
    let mut bounds = WavelengthBounds::new(620.0, 680.0);
    let err = process_file(&sample, &mut bounds, &context(&config, dir.path(), &store)).unwrap_err();

    assert!(matches!(err, PeakError::InvalidParameter(_)));
    assert!(!store.exists("GMR1_P400_TE_Int250"));
}

#[test]
fn pure_noise_gives_well_formed_result() {
    let dir = tempfile::tempdir().unwrap();
    let mut rng = StdRng::seed_from_u64(3);
    let noise = Normal::new(0.0, 50.0).unwrap();
    let wavelength: Vec<f64> = (0..200).map(|i| 600.0 + 0.5 * i as f64).collect();
    let intensity: Vec<f64> = wavelength.iter().map(|_| 1000.0 + noise.sample(&mut rng)).collect();
    let path = dir.path().join("Noise_P400_TM_Int250.txt");
    write_spectrum(&path, &Spectrum::new(wavelength, intensity).unwrap()).unwrap();

    let store = JsonResultStore::new(dir.path().join("results")).unwrap();
    let config = PipelineConfig::default();
    let mut bounds = WavelengthBounds::new(620.0, 680.0);
    let result = process_file(&path, &mut bounds, &context(&config, dir.path(), &store)).unwrap();

    assert_eq!(result.fit.parameters.len(), 5);
    assert_eq!(result.fit.errors.len(), 5);
    match &result.fit.status {
        FitStatus::Converged { .. } => assert!(result.peak_wavelength.is_finite()),
        FitStatus::NotConverged { .. } => {
            assert_eq!(result.peak_wavelength, 0.0);
            assert_eq!(result.peak_error, 0.0);
            assert!(result.fit.parameters.iter().all(|&p| p == 0.0));
        }
    }
    assert!(store.exists("Noise_P400_TM_Int250"));
}

#[test]
fn batch_is_idempotent_unless_overwriting() {
    let dir = tempfile::tempdir().unwrap();
    write_pair(dir.path(), "A", &SynthConfig::default());
    write_pair(dir.path(), "B", &SynthConfig::default());
    let files = list_spectrum_files(dir.path()).unwrap();
    assert_eq!(files.len(), 4);

    let store = JsonResultStore::new(dir.path().join("results")).unwrap();
    let config = PipelineConfig::default();
    let ctx = context(&config, dir.path(), &store);
    let mut bounds = WavelengthBounds::new(620.0, 680.0);

    let first = run_batch(&files, &mut bounds, &ctx);
    assert_eq!(first.results.len(), 2);
    assert_eq!(first.converged(), 2);
    assert_eq!(first.skipped.len(), 2);
    assert!(first.failed.is_empty());

    let path = store.save_batch(&first.record("scans")).unwrap();
    assert_eq!(path, store.summary_path_for("scans"));
    let record: BatchRecord = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!((record.converged, record.no_peak, record.skipped, record.failed), (2, 0, 2, 0));
    assert_eq!(record.entries.len(), 4);
    assert_eq!(record.entries[0].file, "A_P400_TE_Int250");
    match &record.entries[0].outcome {
        BatchOutcome::Converged { peak_wavelength, .. } => {
            assert_abs_diff_eq!(*peak_wavelength, 650.0, epsilon = 1e-2)
        }
        other => panic!("expected a converged entry, got {other:?}"),
    }
    assert_eq!(record.entries[3].file, "B_Background_TE_Int100");
    assert!(matches!(record.entries[3].outcome, BatchOutcome::Skipped { .. }));

    let second = run_batch(&files, &mut bounds, &ctx);
    assert!(second.results.is_empty());
    assert_eq!(second.skipped.iter().filter(|(_, r)| r == "already processed").count(), 2);

    let overwrite = PipelineConfig {
        overwrite: true,
        ..PipelineConfig::default()
    };
    let third = run_batch(&files, &mut bounds, &context(&overwrite, dir.path(), &store));
    assert_eq!(third.results.len(), 2);
}

#[test]
fn recorded_regions_drive_a_parallel_batch() {
    let dir = tempfile::tempdir().unwrap();
    let centers = [("A", 640.0), ("B", 650.0), ("C", 660.0)];
    for (sample, center) in centers {
        let mut config = SynthConfig::default();
        config.params[0] = center;
        write_pair(dir.path(), sample, &config);
    }

    let mut book = RegionBook {
        default: Some(WavelengthBounds::new(620.0, 680.0)),
        ..RegionBook::default()
    };
    book.insert("A_P400_TE_Int250", WavelengthBounds::new(615.0, 665.0));
    book.insert("C_P400_TE_Int250", WavelengthBounds::new(635.0, 685.0));
    let regions = dir.path().join("regions.json");
    book.save(&regions).unwrap();
    let mut book = RegionBook::load(&regions).unwrap();

    let files = list_spectrum_files(dir.path()).unwrap();
    let store = JsonResultStore::new(dir.path().join("results")).unwrap();
    let config = PipelineConfig::default();
    let summary = run_batch(&files, &mut book, &context(&config, dir.path(), &store));

    assert!(summary.failed.is_empty());
    assert_eq!(summary.results.len(), 3);
    for (result, (sample, center)) in summary.results.iter().zip(centers) {
        assert!(result.key().starts_with(sample));
        assert_abs_diff_eq!(result.peak_wavelength, center, epsilon = 1e-2);
    }
    assert_eq!(summary.results[0].bounds, WavelengthBounds::new(615.0, 665.0));
    assert_eq!(summary.results[1].bounds, WavelengthBounds::new(620.0, 680.0));
}
