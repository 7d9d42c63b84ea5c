//! Two-column spectrum files (wavelength, intensity).
//!
//! Spectrometer software is inconsistent about delimiters, so the reader sniffs
//! the first numeric line:
//! - `;` (with `,` allowed as the decimal separator)
//! - tab
//! - `,`
//! - runs of spaces
//!
//! Lines that don't hold two numbers (headers, footers, blank lines) are skipped.

use std::fs;
use std::path::Path;

use log::debug;

use crate::domain::Spectrum;
use crate::error::{PeakError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Delimiter {
    Semicolon,
    Tab,
    Comma,
    Whitespace,
}

impl Delimiter {
    fn byte(self) -> u8 {
        match self {
            Delimiter::Semicolon => b';',
            Delimiter::Tab => b'\t',
            Delimiter::Comma => b',',
            Delimiter::Whitespace => b' ',
        }
    }
}

/// Read a spectrum from `path`.
pub fn read_spectrum(path: &Path) -> Result<Spectrum> {
    let text = fs::read_to_string(path).map_err(|e| PeakError::io(path, e))?;
    parse_spectrum(&text).map_err(|e| match e {
        PeakError::Parse(msg) => PeakError::Parse(format!("{}: {msg}", path.display())),
        PeakError::InvalidParameter(msg) => {
            PeakError::InvalidParameter(format!("{}: {msg}", path.display()))
        }
        other => other,
    })
}

/// Parse spectrum text (see module docs for the accepted layouts).
pub fn parse_spectrum(text: &str) -> Result<Spectrum> {
    let delimiter = sniff_delimiter(text)
        .ok_or_else(|| PeakError::Parse("no numeric data lines found".to_string()))?;

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .delimiter(delimiter.byte())
        .from_reader(text.as_bytes());

    let mut wavelength = Vec::new();
    let mut intensity = Vec::new();
    let mut skipped = 0usize;

    for record in reader.records() {
        let Ok(record) = record else {
            skipped += 1;
            continue;
        };
        let mut fields = record.iter().filter(|f| !f.is_empty());
        let pair = match (fields.next(), fields.next()) {
            (Some(w), Some(i)) => parse_number(w, delimiter).zip(parse_number(i, delimiter)),
            _ => None,
        };
        match pair {
            Some((w, i)) => {
                wavelength.push(w);
                intensity.push(i);
            }
            None => skipped += 1,
        }
    }

    if wavelength.is_empty() {
        return Err(PeakError::Parse("no numeric data lines found".to_string()));
    }
    debug!(
        "read {} samples ({delimiter:?}-delimited, {skipped} lines skipped)",
        wavelength.len()
    );
    Spectrum::new(wavelength, intensity)
}

/// Write a spectrum as `;`-delimited text.
pub fn write_spectrum(path: &Path, spectrum: &Spectrum) -> Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(b';')
        .from_path(path)
        .map_err(|e| csv_error(path, e))?;
    for (w, i) in spectrum.wavelength().iter().zip(spectrum.intensity()) {
        writer
            .write_record([w.to_string(), i.to_string()])
            .map_err(|e| csv_error(path, e))?;
    }
    writer.flush().map_err(|e| PeakError::io(path, e))
}

fn csv_error(path: &Path, err: csv::Error) -> PeakError {
    if err.is_io_error() {
        match err.into_kind() {
            csv::ErrorKind::Io(e) => PeakError::io(path, e),
            other => PeakError::Parse(format!("{}: {other:?}", path.display())),
        }
    } else {
        PeakError::Parse(format!("{}: {err}", path.display()))
    }
}

fn sniff_delimiter(text: &str) -> Option<Delimiter> {
    let line = text.lines().map(str::trim).find(|l| {
        l.chars()
            .next()
            .is_some_and(|c| c.is_ascii_digit() || matches!(c, '-' | '+' | '.'))
    })?;
    Some(if line.contains(';') {
        Delimiter::Semicolon
    } else if line.contains('\t') {
        Delimiter::Tab
    } else if line.contains(',') {
        Delimiter::Comma
    } else {
        Delimiter::Whitespace
    })
}

fn parse_number(field: &str, delimiter: Delimiter) -> Option<f64> {
    let value = if delimiter == Delimiter::Semicolon && field.contains(',') {
        field.replace(',', ".").parse::<f64>().ok()
    } else {
        field.parse::<f64>().ok()
    };
    value.filter(|v| !v.is_nan())
}
