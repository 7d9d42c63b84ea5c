//! Acquisition metadata encoded in scan file names.
//!
//! Lab naming convention, `_`-separated:
//!
//! ```text
//! GMR1_P400_TE_Run2_Int250.txt        sample scan
//! GMR1_Background_TE_Run2_Int100.txt  light-source scan for the same sample
//! ```
//!
//! - first token: sample id
//! - `P<period>` second token: grating period (dropped for backgrounds)
//! - `TE` / `TM` anywhere: polarization
//! - `Int<ms>` anywhere: integration time in milliseconds
//! - `Background` / `Bg` anywhere: background scan

use std::path::Path;

use crate::domain::{AcquisitionMetadata, Polarization};
use crate::error::{PeakError, Result};

/// File stem without directories or extension.
pub fn file_stem(path: &Path) -> Result<String> {
    path.file_stem()
        .and_then(|s| s.to_str())
        .map(str::to_string)
        .ok_or_else(|| PeakError::Parse(format!("'{}' has no usable file name", path.display())))
}

/// Parse metadata from a scan's file name.
///
/// `integration_time_override` (seconds) replaces the `Int` token and makes it
/// optional.
pub fn parse_file_name(
    path: &Path,
    integration_time_override: Option<f64>,
) -> Result<AcquisitionMetadata> {
    let stem = file_stem(path)?;
    let tokens: Vec<&str> = stem.split('_').filter(|t| !t.is_empty()).collect();
    let Some(&sample_id) = tokens.first() else {
        return Err(PeakError::Parse(format!("'{stem}' has no sample id")));
    };

    let is_background = tokens
        .iter()
        .any(|t| t.eq_ignore_ascii_case("background") || t.eq_ignore_ascii_case("bg"));
    let polarization = tokens
        .iter()
        .find_map(|t| Polarization::from_token(t))
        .unwrap_or(Polarization::Unknown);

    let integration_time = match integration_time_override {
        Some(t) => t,
        None => parse_integration_time(&stem, &tokens)?,
    };

    let mut meta = AcquisitionMetadata::new(stem.clone(), sample_id, polarization, integration_time)?;
    if is_background {
        meta = meta.as_background();
    } else if let Some(period) = tokens.get(1).and_then(|t| grating_period(t)) {
        meta = meta.with_grating_period(period);
    }
    Ok(meta)
}

fn grating_period(token: &str) -> Option<&str> {
    let rest = token.strip_prefix('P').or_else(|| token.strip_prefix('p'))?;
    (!rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit() || c == '.')).then_some(rest)
}

fn parse_integration_time(stem: &str, tokens: &[&str]) -> Result<f64> {
    let token = tokens
        .iter()
        .find_map(|t| t.strip_prefix("Int").or_else(|| t.strip_prefix("int")))
        .ok_or_else(|| {
            PeakError::Parse(format!(
                "'{stem}' has no Int<ms> token; pass --integration-time"
            ))
        })?;
    let ms: f64 = token.parse().map_err(|_| {
        PeakError::Parse(format!("'{stem}': integration time '{token}' is not a number"))
    })?;
    Ok(ms / 1000.0)
}
