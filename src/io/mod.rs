//! Input/output helpers.
//!
//! - spectrum text files (`spectrum`)
//! - metadata from file names (`metadata`)
//! - spectrum file discovery (`discover`) and background lookup (`background`)
//! - per-spectrum result JSON (`results`)
//! - thin-film reflectometer and ellipsometer exports (`optical`)

pub mod background;
pub mod discover;
pub mod metadata;
pub mod optical;
pub mod results;
pub mod spectrum;

pub use background::*;
pub use discover::*;
pub use metadata::*;
pub use optical::*;
pub use results::*;
pub use spectrum::*;
