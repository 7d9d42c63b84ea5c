//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - input data (`Spectrum`, `AcquisitionMetadata`)
//! - intermediate products (`NormalizedSpectrum`, `WavelengthBounds`, `RegionOfInterest`)
//! - fit outputs (`FanoFitResult`, `SpectrumResult`) and run settings

pub mod serde_floats;
pub mod types;

pub use types::*;
