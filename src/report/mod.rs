//! Terminal reports for single fits and batch runs.

pub mod format;

pub use format::*;
