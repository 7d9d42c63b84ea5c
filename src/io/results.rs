//! Per-spectrum result persistence.
//!
//! Each processed scan gets one pretty-printed JSON file,
//! `<results dir>/<stem>_Results.json`, holding the full `SpectrumResult`.
//! Its presence is what makes batch runs idempotent. A batch run also leaves
//! `<batch>_Summary.json` next to the per-spectrum files.
//!
//! Files are written to a `.tmp` sibling, synced and renamed into place, so a
//! failed write never leaves a truncated result behind.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::domain::{BatchRecord, SpectrumResult};
use crate::error::{PeakError, Result};

const RESULT_SUFFIX: &str = "_Results.json";
const SUMMARY_SUFFIX: &str = "_Summary.json";

/// Keyed storage for processed spectra. Keys are file stems.
pub trait ResultStore: Send + Sync {
    fn exists(&self, key: &str) -> bool;
    /// Persist `result`, returning where it went.
    fn save(&self, result: &SpectrumResult) -> Result<PathBuf>;
    /// Persist the aggregate of a batch run.
    fn save_batch(&self, record: &BatchRecord) -> Result<PathBuf>;
}

/// Stores results as JSON files in one directory.
#[derive(Debug, Clone)]
pub struct JsonResultStore {
    dir: PathBuf,
}

impl JsonResultStore {
    /// Use `dir`, creating it if needed.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| PeakError::io(&dir, e))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}{RESULT_SUFFIX}"))
    }

    pub fn summary_path_for(&self, batch: &str) -> PathBuf {
        self.dir.join(format!("{batch}{SUMMARY_SUFFIX}"))
    }
}

impl ResultStore for JsonResultStore {
    fn exists(&self, key: &str) -> bool {
        self.path_for(key).is_file()
    }

    fn save(&self, result: &SpectrumResult) -> Result<PathBuf> {
        let path = self.path_for(result.key());
        write_json_atomic(&path, result)?;
        Ok(path)
    }

    fn save_batch(&self, record: &BatchRecord) -> Result<PathBuf> {
        let path = self.summary_path_for(&record.batch);
        write_json_atomic(&path, record)?;
        Ok(path)
    }
}

fn write_json_atomic(path: &Path, value: &impl Serialize) -> Result<()> {
    let tmp = path.with_extension("json.tmp");
    let written = File::create(&tmp).and_then(|file| {
        let mut writer = BufWriter::new(file);
        write_json(&mut writer, value)?;
        writer.get_ref().sync_all()
    });
    if let Err(e) = written.and_then(|()| fs::rename(&tmp, path)) {
        let _ = fs::remove_file(&tmp);
        return Err(PeakError::io(path, e));
    }
    Ok(())
}

fn write_json<W: Write>(mut writer: W, value: &impl Serialize) -> std::io::Result<()> {
    serde_json::to_writer_pretty(&mut writer, value)?;
    writer.flush()
}

/// Load a result written by `JsonResultStore`.
pub fn load_result(path: &Path) -> Result<SpectrumResult> {
    let file = File::open(path).map_err(|e| PeakError::io(path, e))?;
    let result: SpectrumResult = serde_json::from_reader(std::io::BufReader::new(file))
        .map_err(|e| PeakError::Parse(format!("invalid result JSON '{}': {e}", path.display())))?;

    let n = result.region.len();
    if result.window_wavelength.len() != n || result.window_intensity.len() != n {
        return Err(PeakError::Parse(format!(
            "result '{}' has a {n}-sample region but {} wavelengths and {} intensities",
            path.display(),
            result.window_wavelength.len(),
            result.window_intensity.len()
        )));
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        AcquisitionMetadata, FanoFitResult, LineshapeKind, NormalizationMethod, Polarization,
        RegionOfInterest, WavelengthBounds,
    };
    use chrono::Utc;

    struct FullDisk;

    impl Write for FullDisk {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::other("no space left on device"))
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Err(std::io::Error::other("no space left on device"))
        }
    }

    fn result() -> SpectrumResult {
        let mut fit = FanoFitResult::failed(LineshapeKind::Fano, "test");
        fit.errors[1] = f64::INFINITY;
        SpectrumResult {
            metadata: AcquisitionMetadata::new("S1_P400_TE_Int250", "S1", Polarization::Te, 0.25)
                .unwrap()
                .with_grating_period("400"),
            background: None,
            normalization: NormalizationMethod::MaxIntensity,
            bounds: WavelengthBounds::new(620.0, 680.0),
            region: RegionOfInterest::new(1, 2, 4).unwrap(),
            fit,
            peak_wavelength: 0.0,
            peak_error: f64::INFINITY,
            window_wavelength: vec![621.0, 622.0],
            window_intensity: vec![0.5, f64::NAN],
            processed_at: Utc::now(),
        }
    }

    #[test]
    fn save_then_load_preserves_non_finite_values() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonResultStore::new(dir.path().join("out")).unwrap();
        let original = result();

        assert!(!store.exists(original.key()));
        let path = store.save(&original).unwrap();
        assert!(store.exists(original.key()));
        assert!(path.ends_with("S1_P400_TE_Int250_Results.json"));

        let loaded = load_result(&path).unwrap();
        assert_eq!(loaded.metadata, original.metadata);
        assert_eq!(loaded.region, original.region);
        assert!(loaded.fit.errors[1].is_infinite());
        assert!(loaded.peak_error.is_infinite());
        assert!(loaded.window_intensity[1].is_nan());
        assert_eq!(loaded.processed_at, original.processed_at);
    }

    #[test]
    fn write_errors_surface_instead_of_being_dropped() {
        let err = write_json(BufWriter::new(FullDisk), &result()).unwrap_err();
        assert_eq!(err.to_string(), "no space left on device");
    }

    #[test]
    fn failed_save_leaves_no_result_behind() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonResultStore::new(dir.path().join("out")).unwrap();
        fs::remove_dir(store.dir()).unwrap();

        let err = store.save(&result()).unwrap_err();
        assert!(matches!(err, PeakError::Io { .. }));
        assert!(!store.exists("S1_P400_TE_Int250"));
    }

    #[cfg(unix)]
    #[test]
    fn save_replaces_the_entry_instead_of_writing_through_it() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonResultStore::new(dir.path()).unwrap();
        let target = dir.path().join("elsewhere.json");
        fs::write(&target, "untouched").unwrap();
        let path = store.path_for("S1_P400_TE_Int250");
        std::os::unix::fs::symlink(&target, &path).unwrap();

        store.save(&result()).unwrap();

        assert!(!fs::symlink_metadata(&path).unwrap().file_type().is_symlink());
        assert_eq!(fs::read_to_string(&target).unwrap(), "untouched");
        assert!(load_result(&path).is_ok());
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn batch_record_is_written_next_to_results() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonResultStore::new(dir.path()).unwrap();
        let record = BatchRecord {
            batch: "run1".into(),
            converged: 0,
            no_peak: 0,
            skipped: 0,
            failed: 0,
            entries: Vec::new(),
            finished_at: Utc::now(),
        };

        let path = store.save_batch(&record).unwrap();
        assert_eq!(path, dir.path().join("run1_Summary.json"));
        let back: BatchRecord = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn window_not_matching_region_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonResultStore::new(dir.path()).unwrap();
        let mut bad = result();
        bad.window_intensity.push(1.0);
        let path = store.save(&bad).unwrap();
        assert!(matches!(load_result(&path), Err(PeakError::Parse(_))));
    }

    #[test]
    fn malformed_result_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x_Results.json");
        fs::write(&path, "{}").unwrap();
        assert!(matches!(load_result(&path), Err(PeakError::Parse(_))));
    }
}
