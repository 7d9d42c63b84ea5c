//! Environment defaults (`.env` is loaded if present).
//!
//! | Variable | Meaning |
//! | --- | --- |
//! | `PEAKFIT_BACKGROUND_DIR` | where background scans live |
//! | `PEAKFIT_RESULTS_DIR` | where `<stem>_Results.json` files go |
//! | `PEAKFIT_SELECT_TIMEOUT_SECS` | interactive selection timeout |
//!
//! Command-line flags take precedence over these.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{PeakError, Result};

pub const BACKGROUND_DIR_VAR: &str = "PEAKFIT_BACKGROUND_DIR";
pub const RESULTS_DIR_VAR: &str = "PEAKFIT_RESULTS_DIR";
pub const SELECT_TIMEOUT_VAR: &str = "PEAKFIT_SELECT_TIMEOUT_SECS";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Settings {
    pub background_dir: Option<PathBuf>,
    pub results_dir: Option<PathBuf>,
    pub select_timeout: Option<Duration>,
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from any variable lookup (the process environment in practice).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let non_empty = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let select_timeout = match non_empty(SELECT_TIMEOUT_VAR) {
            Some(raw) => {
                let secs: u64 = raw.parse().map_err(|_| {
                    PeakError::invalid(format!(
                        "{SELECT_TIMEOUT_VAR} must be a whole number of seconds (got '{raw}')"
                    ))
                })?;
                (secs > 0).then(|| Duration::from_secs(secs))
            }
            None => None,
        };

        Ok(Self {
            background_dir: non_empty(BACKGROUND_DIR_VAR).map(PathBuf::from),
            results_dir: non_empty(RESULTS_DIR_VAR).map(PathBuf::from),
            select_timeout,
        })
    }
}
