//! Thin-film instrument exports.
//!
//! - Filmetrics `.fitnk`: comma-separated `wavelength, n, k` between a
//!   5-line header and a 6-line footer.
//! - J.A. Woollam VASE `.csv`: a 2-line header, then
//!   `wavelength, Ψ, Δ, model Ψ, model Δ`.
//!
//! Rows that don't parse are skipped, like in `spectrum`.

use std::fs;
use std::path::Path;

use log::debug;

use crate::error::{PeakError, Result};
use crate::optics::{OpticalConstants, Permittivity};

const FITNK_HEADER_LINES: usize = 5;
const FITNK_FOOTER_LINES: usize = 6;
const VASE_HEADER_LINES: usize = 2;

/// Measured and modelled ellipsometric angles (degrees) per wavelength (nm).
#[derive(Debug, Clone, PartialEq)]
pub struct EllipsometryScan {
    pub wavelength: Vec<f64>,
    pub psi: Vec<f64>,
    pub delta: Vec<f64>,
    pub model_psi: Vec<f64>,
    pub model_delta: Vec<f64>,
}

/// Read a Filmetrics `.fitnk` export.
pub fn read_reflectometer_nk(path: &Path) -> Result<OpticalConstants> {
    let text = fs::read_to_string(path).map_err(|e| PeakError::io(path, e))?;
    parse_reflectometer_nk(&text).map_err(|e| with_path(path, e))
}

pub fn parse_reflectometer_nk(text: &str) -> Result<OpticalConstants> {
    let lines: Vec<&str> = text.lines().collect();
    let body = lines
        .get(FITNK_HEADER_LINES..lines.len().saturating_sub(FITNK_FOOTER_LINES))
        .unwrap_or_default();
    let rows = numeric_rows(body, 3);
    if rows.is_empty() {
        return Err(PeakError::Parse("no wavelength, n, k rows found".to_string()));
    }
    let mut wavelength = Vec::with_capacity(rows.len());
    let mut n = Vec::with_capacity(rows.len());
    let mut k = Vec::with_capacity(rows.len());
    for row in rows {
        wavelength.push(row[0]);
        n.push(row[1]);
        k.push(row[2]);
    }
    OpticalConstants::new(wavelength, n, k)
}

/// Read a Woollam VASE `.csv` export.
pub fn read_ellipsometer(path: &Path) -> Result<EllipsometryScan> {
    let text = fs::read_to_string(path).map_err(|e| PeakError::io(path, e))?;
    parse_ellipsometer(&text).map_err(|e| with_path(path, e))
}

pub fn parse_ellipsometer(text: &str) -> Result<EllipsometryScan> {
    let body: Vec<&str> = text.lines().skip(VASE_HEADER_LINES).collect();
    let rows = numeric_rows(&body, 5);
    if rows.is_empty() {
        return Err(PeakError::Parse("no ellipsometry rows found".to_string()));
    }
    let column = |i: usize| rows.iter().map(|r| r[i]).collect::<Vec<f64>>();
    Ok(EllipsometryScan {
        wavelength: column(0),
        psi: column(1),
        delta: column(2),
        model_psi: column(3),
        model_delta: column(4),
    })
}

/// Write `wavelength, n, k, eps_real, eps_imaginary` as comma-separated text.
pub fn write_optical_constants(path: &Path, constants: &OpticalConstants) -> Result<()> {
    let mut writer = csv::Writer::from_path(path).map_err(|e| csv_write_error(path, e))?;
    writer
        .write_record(["wavelength", "n", "k", "eps_real", "eps_imaginary"])
        .map_err(|e| csv_write_error(path, e))?;
    let eps = constants.permittivity();
    for (i, Permittivity { real, imaginary }) in eps.iter().enumerate() {
        writer
            .write_record([
                constants.wavelength()[i].to_string(),
                constants.n()[i].to_string(),
                constants.k()[i].to_string(),
                real.to_string(),
                imaginary.to_string(),
            ])
            .map_err(|e| csv_write_error(path, e))?;
    }
    writer.flush().map_err(|e| PeakError::io(path, e))
}

/// First `columns` numbers of every comma-separated line that has them.
fn numeric_rows(lines: &[&str], columns: usize) -> Vec<Vec<f64>> {
    let text = lines.join("\n");
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let mut rows = Vec::new();
    let mut skipped = 0usize;
    for record in reader.records() {
        let row: Option<Vec<f64>> = record.ok().and_then(|record| {
            record
                .iter()
                .take(columns)
                .map(|f| f.parse::<f64>().ok().filter(|v| v.is_finite()))
                .collect()
        });
        match row {
            Some(row) if row.len() == columns => rows.push(row),
            _ => skipped += 1,
        }
    }
    debug!("read {} rows of {columns} columns ({skipped} lines skipped)", rows.len());
    rows
}

fn with_path(path: &Path, err: PeakError) -> PeakError {
    match err {
        PeakError::Parse(msg) => PeakError::Parse(format!("{}: {msg}", path.display())),
        PeakError::InvalidParameter(msg) => {
            PeakError::InvalidParameter(format!("{}: {msg}", path.display()))
        }
        other => other,
    }
}

fn csv_write_error(path: &Path, err: csv::Error) -> PeakError {
    match err.into_kind() {
        csv::ErrorKind::Io(e) => PeakError::io(path, e),
        other => PeakError::Parse(format!("{}: {other:?}", path.display())),
    }
}
