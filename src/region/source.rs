//! Sources of wavelength bounds.
//!
//! The pipeline asks a `BoundsSource` for bounds once per spectrum. Sources
//! return the bounds directly; nothing is stashed in shared state.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::domain::{NormalizedSpectrum, WavelengthBounds};
use crate::error::{PeakError, Result};

/// What a bounds source gets to see when asked for a region.
#[derive(Debug, Clone, Copy)]
pub struct SelectionRequest<'a> {
    /// File stem of the scan.
    pub key: &'a str,
    pub spectrum: &'a NormalizedSpectrum,
}

/// Provides wavelength bounds for a spectrum.
pub trait BoundsSource {
    fn acquire(&mut self, request: &SelectionRequest<'_>) -> Result<WavelengthBounds>;

    /// An independent copy for use on another thread.
    ///
    /// Sources that need a human (one terminal, one person) return `None`,
    /// which keeps batch runs sequential.
    fn fork(&self) -> Option<Box<dyn BoundsSource + Send>> {
        None
    }
}

/// Fixed bounds, used for every spectrum.
impl BoundsSource for WavelengthBounds {
    fn acquire(&mut self, _request: &SelectionRequest<'_>) -> Result<WavelengthBounds> {
        Ok(*self)
    }

    fn fork(&self) -> Option<Box<dyn BoundsSource + Send>> {
        Some(Box::new(*self))
    }
}

/// Bounds recorded per file stem, with an optional fallback.
///
/// On disk:
///
/// ```json
/// {
///   "default": { "first": 620.0, "second": 680.0 },
///   "regions": { "GMR1_P400_TE_Int250": { "first": 640.0, "second": 660.0 } }
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegionBook {
    #[serde(default)]
    pub default: Option<WavelengthBounds>,
    #[serde(default)]
    pub regions: BTreeMap<String, WavelengthBounds>,
}

impl RegionBook {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| PeakError::io(path, e))?;
        serde_json::from_str(&text)
            .map_err(|e| PeakError::Parse(format!("{}: {e}", path.display())))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let text = serde_json::to_string_pretty(self)?;
        fs::write(path, text).map_err(|e| PeakError::io(path, e))
    }

    pub fn insert(&mut self, key: impl Into<String>, bounds: WavelengthBounds) {
        self.regions.insert(key.into(), bounds);
    }

    pub fn lookup(&self, key: &str) -> Option<WavelengthBounds> {
        self.regions.get(key).copied().or(self.default)
    }
}

impl BoundsSource for RegionBook {
    fn acquire(&mut self, request: &SelectionRequest<'_>) -> Result<WavelengthBounds> {
        self.lookup(request.key).ok_or_else(|| {
            PeakError::invalid(format!(
                "no recorded region for '{}' and no default region",
                request.key
            ))
        })
    }

    fn fork(&self) -> Option<Box<dyn BoundsSource + Send>> {
        Some(Box::new(self.clone()))
    }
}

impl<S: BoundsSource + ?Sized> BoundsSource for &mut S {
    fn acquire(&mut self, request: &SelectionRequest<'_>) -> Result<WavelengthBounds> {
        (**self).acquire(request)
    }

    fn fork(&self) -> Option<Box<dyn BoundsSource + Send>> {
        (**self).fork()
    }
}
