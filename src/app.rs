//! Top-level application orchestration.
//!
//! `src/main.rs` stays tiny; this module parses the CLI, merges environment
//! defaults, builds the collaborators the pipeline needs and prints reports.

use std::fs;
use std::path::{Path, PathBuf};

use clap::Parser;
use log::info;

use crate::cli::{BatchArgs, Command, FitArgs, OpticsArgs, PipelineArgs, PlotArgs, SynthArgs};
use crate::data::{SynthConfig, synthesize};
use crate::domain::{PipelineConfig, SolverSettings, WavelengthBounds};
use crate::error::{PeakError, Result};
use crate::io::{
    JsonResultStore, ResultStore, file_stem, list_spectrum_files, load_result, read_ellipsometer,
    read_reflectometer_nk, write_optical_constants, write_spectrum,
};
use crate::optics::{CauchyCoefficients, OpticalConstants};
use crate::plot::{NoPlot, PlotSink, SvgPlotter};
use crate::region::{BoundsSource, RegionBook};
use crate::tui::InteractiveSelector;

pub mod pipeline;
pub mod settings;

use pipeline::PipelineContext;
use settings::Settings;

const DEFAULT_RESULTS_DIR: &str = "results";

/// Entry point for the `peakfit` binary.
pub fn run() -> Result<()> {
    let cli = crate::cli::Cli::parse();

    match cli.command {
        Command::Fit(args) => handle_fit(args),
        Command::Batch(args) => handle_batch(args),
        Command::Synth(args) => handle_synth(args),
        Command::Plot(args) => handle_plot(args),
        Command::Optics(args) => handle_optics(args),
    }
}

fn handle_fit(args: FitArgs) -> Result<()> {
    let settings = Settings::from_env()?;
    let path = match &args.file {
        Some(path) => path.clone(),
        None => crate::cli::picker::prompt_for_spectrum_path()?,
    };

    let session = Session::new(&args.pipeline, &settings)?;
    let mut source = bounds_source(&args.pipeline, &settings)?;
    let result = pipeline::process_file(&path, source.as_mut(), &session.context())?;

    println!("{}", crate::report::format_spectrum_result(&result));
    if !args.no_plot {
        println!("{}", crate::plot::render_result_plot(&result, args.width, args.height));
    }
    Ok(())
}

fn handle_batch(args: BatchArgs) -> Result<()> {
    let settings = Settings::from_env()?;
    let files = list_spectrum_files(&args.dir)?;
    if files.is_empty() {
        return Err(PeakError::invalid(format!(
            "no spectrum files in '{}'",
            args.dir.display()
        )));
    }
    info!("{} spectrum files in '{}'", files.len(), args.dir.display());

    let session = Session::new(&args.pipeline, &settings)?;
    let mut source = bounds_source(&args.pipeline, &settings)?;
    let summary = pipeline::run_batch(&files, source.as_mut(), &session.context());

    println!("{}", crate::report::format_batch_summary(&summary));
    let path = session.store.save_batch(&summary.record(&batch_name(&args.dir)))?;
    info!("batch summary written to '{}'", path.display());
    Ok(())
}

/// Batch name for the summary file: the scan directory's name.
fn batch_name(dir: &Path) -> String {
    dir.canonicalize()
        .ok()
        .as_deref()
        .unwrap_or(dir)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "batch".to_string())
}

fn handle_synth(args: SynthArgs) -> Result<()> {
    let config = synth_config_from_args(&args);
    let scan = synthesize(&config)?;
    fs::create_dir_all(&args.out).map_err(|e| PeakError::io(&args.out, e))?;

    let (sample_path, background_path) = synth_paths(&args);
    write_spectrum(&sample_path, &scan.sample)?;
    write_spectrum(&background_path, &scan.background)?;

    println!("Wrote {}", sample_path.display());
    println!("Wrote {}", background_path.display());
    Ok(())
}

fn handle_plot(args: PlotArgs) -> Result<()> {
    let result = load_result(&args.result)?;
    println!("{}", crate::report::format_spectrum_result(&result));
    println!("{}", crate::plot::render_result_plot(&result, args.width, args.height));
    Ok(())
}

fn handle_optics(args: OpticsArgs) -> Result<()> {
    let path = write_optics(&args)?;
    println!("Wrote {}", path.display());
    Ok(())
}

/// Read the export, derive n, k and ε, and write `<stem>_nk.csv`.
fn write_optics(args: &OpticsArgs) -> Result<PathBuf> {
    let constants = match args.cauchy.as_deref() {
        Some(&[a, b, c]) => {
            let scan = read_ellipsometer(&args.file)?;
            OpticalConstants::from_cauchy(&scan.wavelength, &CauchyCoefficients::new(a, b, c))?
        }
        Some(other) => {
            return Err(PeakError::invalid(format!(
                "--cauchy needs exactly three coefficients (got {})",
                other.len()
            )));
        }
        None => read_reflectometer_nk(&args.file)?,
    };
    info!("{} optical constant samples from '{}'", constants.len(), args.file.display());

    let dir = match &args.out {
        Some(dir) => dir.clone(),
        None => args.file.parent().map(Path::to_path_buf).unwrap_or_default(),
    };
    fs::create_dir_all(&dir).map_err(|e| PeakError::io(&dir, e))?;
    let path = dir.join(format!("{}_nk.csv", file_stem(&args.file)?));
    write_optical_constants(&path, &constants)?;
    Ok(path)
}

/// Store, plot sink and config for one command invocation.
struct Session {
    config: PipelineConfig,
    background_dir: Option<PathBuf>,
    store: JsonResultStore,
    plot: Box<dyn PlotSink>,
}

impl Session {
    fn new(args: &PipelineArgs, settings: &Settings) -> Result<Self> {
        let results_dir = args
            .results_dir
            .clone()
            .or_else(|| settings.results_dir.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_RESULTS_DIR));
        let plot: Box<dyn PlotSink> = match &args.svg_dir {
            Some(dir) => Box::new(SvgPlotter::new(dir)?),
            None => Box::new(NoPlot),
        };
        Ok(Self {
            config: pipeline_config_from_args(args)?,
            background_dir: args.background_dir.clone().or_else(|| settings.background_dir.clone()),
            store: JsonResultStore::new(results_dir)?,
            plot,
        })
    }

    fn context(&self) -> PipelineContext<'_> {
        PipelineContext {
            config: &self.config,
            background_dir: self.background_dir.as_deref(),
            store: &self.store,
            plot: self.plot.as_ref(),
        }
    }
}

/// Fixed bounds, a region file, or interactive selection (in that order).
fn bounds_source(args: &PipelineArgs, settings: &Settings) -> Result<Box<dyn BoundsSource>> {
    if let (Some(first), Some(second)) = (args.from, args.to) {
        return Ok(Box::new(WavelengthBounds::new(first, second)));
    }
    if let Some(path) = &args.regions {
        return Ok(Box::new(RegionBook::load(path)?));
    }

    let timeout = args
        .timeout
        .map(|secs| (secs > 0).then(|| std::time::Duration::from_secs(secs)))
        .unwrap_or(settings.select_timeout);
    let selector = InteractiveSelector::new(timeout);
    Ok(Box::new(match &args.record {
        Some(path) => selector.recording_to(path)?,
        None => selector,
    }))
}

pub fn pipeline_config_from_args(args: &PipelineArgs) -> Result<PipelineConfig> {
    let integration_time_override = match args.integration_time {
        Some(ms) if ms.is_finite() && ms > 0.0 => Some(ms / 1000.0),
        Some(ms) => {
            return Err(PeakError::invalid(format!(
                "--integration-time must be > 0 ms (got {ms})"
            )));
        }
        None => None,
    };
    Ok(PipelineConfig {
        lineshape: args.lineshape,
        bounded: args.bounded,
        solver: SolverSettings {
            max_iterations: args.max_iterations,
            ..SolverSettings::default()
        },
        integration_time_override,
        overwrite: args.overwrite,
    })
}

fn synth_config_from_args(args: &SynthArgs) -> SynthConfig {
    let defaults = SynthConfig::default();
    let mut params = defaults.params;
    params[0] = args.center;
    params[1] = args.gamma;
    params[2] = args.q;
    SynthConfig {
        params,
        noise: args.noise,
        integration_time: args.integration_ms / 1000.0,
        background_integration_time: args.background_ms / 1000.0,
        lamp: Some((args.center, 80.0)),
        seed: args.seed,
        ..defaults
    }
}

/// `<sample>_P400_TE_Int<ms>.txt` and `<sample>_Background_TE_Int<ms>.txt`.
fn synth_paths(args: &SynthArgs) -> (PathBuf, PathBuf) {
    let name = |middle: &str, ms: f64| format!("{}_{middle}_TE_Int{}.txt", args.sample, fmt_ms(ms));
    (
        args.out.join(name("P400", args.integration_ms)),
        args.out.join(name("Background", args.background_ms)),
    )
}

fn fmt_ms(ms: f64) -> String {
    if ms.fract() == 0.0 { format!("{ms:.0}") } else { ms.to_string() }
}
