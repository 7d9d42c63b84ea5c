//! Resonance lineshape implementations.
//!
//! Lineshapes are implemented as small, pure functions keyed by
//! `LineshapeKind` so that the fitter can stay generic.

pub mod lineshape;

pub use lineshape::*;
