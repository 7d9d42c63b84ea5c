//! Command-line parsing for the `peakfit` binary.
//!
//! Argument parsing and command dispatch stay separate from the fitting code;
//! `app` turns these structs into a `PipelineConfig`.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::domain::LineshapeKind;

pub mod picker;

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "peakfit", version, about = "Fano resonance peak extraction from spectrometer scans")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fit one scan and print the result (prompts for a file if none is given).
    Fit(FitArgs),
    /// Fit every sample scan in a directory, skipping ones already processed.
    Batch(BatchArgs),
    /// Write a synthetic sample scan and its background.
    Synth(SynthArgs),
    /// Plot a stored `<stem>_Results.json` in the terminal.
    Plot(PlotArgs),
    /// Convert a reflectometer or ellipsometer export to n, k and permittivity.
    Optics(OpticsArgs),
}

/// Options shared by `fit` and `batch`.
#[derive(Debug, Args, Clone)]
pub struct PipelineArgs {
    /// Lineshape to fit.
    #[arg(long, value_enum, default_value_t = LineshapeKind::Fano)]
    pub lineshape: LineshapeKind,

    /// Constrain center, shape and offset parameters during the fit.
    #[arg(long)]
    pub bounded: bool,

    /// First wavelength bound (nm). Together with `--to`, skips interactive selection.
    #[arg(long, requires = "to", conflicts_with = "regions")]
    pub from: Option<f64>,

    /// Second wavelength bound (nm).
    #[arg(long, requires = "from")]
    pub to: Option<f64>,

    /// JSON file with recorded bounds per file stem.
    #[arg(long, value_name = "JSON")]
    pub regions: Option<PathBuf>,

    /// Append interactively selected bounds to this JSON file.
    #[arg(long, value_name = "JSON", conflicts_with_all = ["from", "regions"])]
    pub record: Option<PathBuf>,

    /// Directory with background (light source) scans [env: PEAKFIT_BACKGROUND_DIR].
    #[arg(long, value_name = "DIR")]
    pub background_dir: Option<PathBuf>,

    /// Where `<stem>_Results.json` files are written [env: PEAKFIT_RESULTS_DIR] [default: results].
    #[arg(long, value_name = "DIR")]
    pub results_dir: Option<PathBuf>,

    /// Also write `<stem>_Fit.svg` reports into this directory.
    #[arg(long, value_name = "DIR")]
    pub svg_dir: Option<PathBuf>,

    /// Interactive selection timeout in seconds [env: PEAKFIT_SELECT_TIMEOUT_SECS].
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Integration time in ms, replacing the `Int<ms>` file-name token.
    #[arg(long, value_name = "MS")]
    pub integration_time: Option<f64>,

    /// Re-process files that already have a stored result.
    #[arg(long)]
    pub overwrite: bool,

    /// Solver iteration budget (default `200 * (n_params + 1)`).
    #[arg(long)]
    pub max_iterations: Option<usize>,
}

#[derive(Debug, Args, Clone)]
pub struct FitArgs {
    /// Spectrum file to fit.
    pub file: Option<PathBuf>,

    #[command(flatten)]
    pub pipeline: PipelineArgs,

    /// Disable the terminal plot.
    #[arg(long)]
    pub no_plot: bool,

    /// Plot width (columns).
    #[arg(long, default_value_t = 100)]
    pub width: usize,

    /// Plot height (rows).
    #[arg(long, default_value_t = 25)]
    pub height: usize,
}

#[derive(Debug, Args, Clone)]
pub struct BatchArgs {
    /// Directory of spectrum files.
    pub dir: PathBuf,

    #[command(flatten)]
    pub pipeline: PipelineArgs,
}

#[derive(Debug, Args, Clone)]
pub struct SynthArgs {
    /// Output directory for the sample and background scans.
    #[arg(short, long, default_value = ".")]
    pub out: PathBuf,

    /// Sample id used in the file names.
    #[arg(long, default_value = "Synth")]
    pub sample: String,

    /// Resonance center (nm).
    #[arg(long, default_value_t = 650.0)]
    pub center: f64,

    /// Resonance width (nm).
    #[arg(long, default_value_t = 8.0)]
    pub gamma: f64,

    /// Fano asymmetry parameter.
    #[arg(long, default_value_t = 3.0)]
    pub q: f64,

    /// Gaussian noise as a fraction of the peak counts.
    #[arg(long, default_value_t = 0.01)]
    pub noise: f64,

    /// Sample integration time (ms).
    #[arg(long, default_value_t = 250.0)]
    pub integration_ms: f64,

    /// Background integration time (ms).
    #[arg(long, default_value_t = 100.0)]
    pub background_ms: f64,

    #[arg(long, default_value_t = 42)]
    pub seed: u64,
}

#[derive(Debug, Args, Clone)]
pub struct PlotArgs {
    /// Result JSON written by `peakfit fit` or `peakfit batch`.
    #[arg(value_name = "JSON")]
    pub result: PathBuf,

    /// Plot width (columns).
    #[arg(long, default_value_t = 100)]
    pub width: usize,

    /// Plot height (rows).
    #[arg(long, default_value_t = 25)]
    pub height: usize,
}

#[derive(Debug, Args, Clone)]
pub struct OpticsArgs {
    /// Filmetrics `.fitnk` export, or a Woollam VASE `.csv` together with `--cauchy`.
    pub file: PathBuf,

    /// Cauchy coefficients `A,B,C` (λ in µm) applied to the ellipsometry wavelengths.
    #[arg(long, value_delimiter = ',', num_args = 3, allow_negative_numbers = true, value_name = "A,B,C")]
    pub cauchy: Option<Vec<f64>>,

    /// Where `<stem>_nk.csv` is written [default: next to the input].
    #[arg(long, value_name = "DIR")]
    pub out: Option<PathBuf>,
}
