//! Error taxonomy for the peak-fitting pipeline.
//!
//! Only conditions the caller must act on are errors. A fit that does not
//! converge is reported through `FitStatus::NotConverged`, and a missing
//! background is `Ok(None)` from the background lookup.

use std::path::PathBuf;

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, PeakError>;

#[derive(Error, Debug)]
pub enum PeakError {
    /// Non-positive integration time, mismatched array lengths, unusable region.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Signal cannot be normalized (zero maximum intensity).
    #[error("Degenerate signal: {0}")]
    DegenerateSignal(String),

    #[error("I/O error on '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Malformed spectrum file, file name or result JSON.
    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Region selection cancelled for '{0}'")]
    SelectionCancelled(String),

    #[error("Region selection for '{file}' timed out after {seconds}s")]
    SelectionTimedOut { file: String, seconds: u64 },

    #[error("Another interactive region selection is already using the terminal")]
    SelectionBusy,

    #[error("Terminal error: {0}")]
    Terminal(String),

    #[error("Plot error: {0}")]
    Plot(String),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl PeakError {
    pub fn invalid(message: impl Into<String>) -> Self {
        PeakError::InvalidParameter(message.into())
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PeakError::Io {
            path: path.into(),
            source,
        }
    }

    /// Process exit code for the `peakfit` binary.
    ///
    /// - 2: bad input or usage (including a cancelled selection)
    /// - 3: signal unusable for analysis
    /// - 4: internal / environment failure
    pub fn exit_code(&self) -> u8 {
        match self {
            PeakError::InvalidParameter(_)
            | PeakError::Io { .. }
            | PeakError::Parse(_)
            | PeakError::SelectionCancelled(_)
            | PeakError::SelectionTimedOut { .. }
            | PeakError::SelectionBusy => 2,
            PeakError::DegenerateSignal(_) => 3,
            PeakError::Terminal(_) | PeakError::Plot(_) | PeakError::Serialize(_) => 4,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_follow_error_class() {
        assert_eq!(PeakError::invalid("t <= 0").exit_code(), 2);
        assert_eq!(PeakError::DegenerateSignal("max == 0".into()).exit_code(), 3);
        assert_eq!(PeakError::Plot("svg".into()).exit_code(), 4);
    }

    #[test]
    fn io_error_mentions_path() {
        let err = PeakError::io(
            "scan.txt",
            std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
        );
        assert!(err.to_string().contains("scan.txt"));
    }
}
