//! Intensity normalization.

pub mod normalize;

pub use normalize::*;
