//! Region-of-interest selection.
//!
//! - `select`: wavelength bounds → inclusive index window
//! - `source`: where bounds come from (fixed, recorded per file, interactive)

pub mod select;
pub mod source;

pub use select::*;
pub use source::*;
