//! `peakfit` library crate.
//!
//! The binary is a thin wrapper around this library so that:
//!
//! - the normalizer, region selector and fitter are testable without a terminal
//! - the pipeline can be driven with fixed bounds, recorded bounds or interactively

pub mod app;
pub mod cli;
pub mod data;
pub mod domain;
pub mod error;
pub mod fit;
pub mod io;
pub mod math;
pub mod models;
pub mod optics;
pub mod plot;
pub mod region;
pub mod report;
pub mod signal;
pub mod tui;
