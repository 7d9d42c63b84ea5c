//! Thin-film optical constants from reflectometry and ellipsometry.
//!
//! - Cauchy dispersion `n(λ) = A + B/λ² + C/λ⁴` (`dispersion`)
//! - conversion between `n + ik` and the complex permittivity (`dispersion`)

pub mod dispersion;

pub use dispersion::*;
