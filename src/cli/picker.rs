//! Interactive spectrum-file picker for `peakfit fit` without a path.
//!
//! Lists spectrum files (`.txt`, `.csv`, `.dat`) under the current directory,
//! skipping background scans, and accepts a number or an explicit path.
//! `q` cancels.

use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use crate::error::{PeakError, Result};
use crate::io::{is_spectrum_file, parse_file_name};

const DEFAULT_SEARCH_DEPTH: usize = 4;

/// Prompt on stdin/stdout for a spectrum file below the current directory.
pub fn prompt_for_spectrum_path() -> Result<PathBuf> {
    let files = discover_spectrum_files(Path::new("."));
    if files.is_empty() {
        return Err(PeakError::invalid(
            "no spectrum files found. Provide one with `peakfit fit <FILE>`.",
        ));
    }
    let stdin = io::stdin();
    prompt_from(&files, stdin.lock(), io::stdout())
}

/// The prompt loop over arbitrary input/output.
pub fn prompt_from(files: &[PathBuf], mut input: impl BufRead, mut out: impl Write) -> Result<PathBuf> {
    let write_err = |e: io::Error| PeakError::Terminal(format!("failed to write prompt: {e}"));

    writeln!(out, "Found {} spectrum file(s):", files.len()).map_err(write_err)?;
    for (idx, path) in files.iter().enumerate() {
        writeln!(out, "{:>3}) {}", idx + 1, pretty_path(path)).map_err(write_err)?;
    }

    loop {
        write!(out, "Select a file by number (1-{}) or type a path (q to quit): ", files.len())
            .map_err(write_err)?;
        out.flush().map_err(write_err)?;

        let mut line = String::new();
        let bytes = input
            .read_line(&mut line)
            .map_err(|e| PeakError::Terminal(format!("failed to read input: {e}")))?;
        if bytes == 0 {
            return Err(PeakError::SelectionCancelled("file picker".to_string()));
        }

        let line = line.trim();
        if line.eq_ignore_ascii_case("q") {
            return Err(PeakError::SelectionCancelled("file picker".to_string()));
        }

        if let Ok(choice) = line.parse::<usize>() {
            if (1..=files.len()).contains(&choice) {
                return validate_spectrum_path(&files[choice - 1]);
            }
            writeln!(out, "Invalid choice: {choice}. Enter a number between 1 and {}.", files.len())
                .map_err(write_err)?;
            continue;
        }

        match validate_spectrum_path(Path::new(line)) {
            Ok(path) => return Ok(path),
            Err(err) => writeln!(out, "{err}").map_err(write_err)?,
        }
    }
}

/// Check that `path` is an existing spectrum file.
pub fn validate_spectrum_path(path: &Path) -> Result<PathBuf> {
    if !path.exists() {
        return Err(PeakError::invalid(format!("spectrum file not found: {}", path.display())));
    }
    if path.is_dir() {
        return Err(PeakError::invalid(format!(
            "expected a file, got a directory: {}",
            path.display()
        )));
    }
    if !is_spectrum_file(path) {
        return Err(PeakError::invalid(format!(
            "expected a .txt, .csv or .dat spectrum (got: {})",
            path.display()
        )));
    }
    Ok(path.to_path_buf())
}

/// Sample scans below `root` (deterministic order, backgrounds excluded).
pub fn discover_spectrum_files(root: &Path) -> Vec<PathBuf> {
    let mut out = Vec::new();
    find_inner(root, 0, DEFAULT_SEARCH_DEPTH, &mut out);
    out.retain(|p| !parse_file_name(p, Some(1.0)).is_ok_and(|m| m.is_background()));
    out.sort_by_key(|p| pretty_path(p));
    out
}

fn find_inner(root: &Path, depth: usize, max_depth: usize, out: &mut Vec<PathBuf>) {
    if depth > max_depth {
        return;
    }
    let Ok(entries) = fs::read_dir(root) else {
        return;
    };

    for entry in entries.flatten() {
        let path = entry.path();
        let Ok(file_type) = entry.file_type() else {
            continue;
        };
        if file_type.is_dir() {
            if !should_skip_dir(&path) {
                find_inner(&path, depth + 1, max_depth, out);
            }
        } else if file_type.is_file() && is_spectrum_file(&path) {
            out.push(path);
        }
    }
}

fn should_skip_dir(path: &Path) -> bool {
    let name = path.file_name().and_then(|s| s.to_str()).unwrap_or("");
    matches!(name, ".git" | "target" | "node_modules" | "results")
}

fn pretty_path(path: &Path) -> String {
    let stripped = path.strip_prefix("./").unwrap_or(path);
    stripped.display().to_string()
}
