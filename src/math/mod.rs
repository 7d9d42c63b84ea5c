//! Mathematical utilities: small dense linear algebra for the fitter.

pub mod linalg;

pub use linalg::*;
