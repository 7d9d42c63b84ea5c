//! Locate spectrum files on disk.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{PeakError, Result};

/// Extensions written by the spectrometers we read.
const SPECTRUM_EXTENSIONS: [&str; 3] = ["txt", "csv", "dat"];

pub fn is_spectrum_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            SPECTRUM_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
}

/// Spectrum files directly inside `dir`, sorted by path.
pub fn list_spectrum_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(dir).map_err(|e| PeakError::io(dir, e))?;
    let mut out: Vec<PathBuf> = entries
        .flatten()
        .filter(|entry| entry.file_type().is_ok_and(|ft| ft.is_file()))
        .map(|entry| entry.path())
        .filter(|path| is_spectrum_file(path))
        .collect();
    out.sort();
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lists_only_spectrum_files_in_order() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b_Int1.txt", "a_Int1.CSV", "notes.md", "a_Results.json"] {
            fs::write(dir.path().join(name), "").unwrap();
        }
        fs::create_dir(dir.path().join("sub.txt")).unwrap();

        let files = list_spectrum_files(dir.path()).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap())
            .collect();
        assert_eq!(names, ["a_Int1.CSV", "b_Int1.txt"]);
    }

    #[test]
    fn missing_directory_is_io_error() {
        assert!(matches!(
            list_spectrum_files(Path::new("/no/such/dir")),
            Err(PeakError::Io { .. })
        ));
    }
}
