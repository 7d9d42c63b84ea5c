//! Formatted terminal output.
//!
//! Formatting lives here so the pipeline and fitter stay free of presentation
//! code, and output changes stay localized.

use std::path::Path;

use crate::app::pipeline::BatchSummary;
use crate::domain::{FitStatus, NormalizationMethod, SpectrumResult};

/// Format one processed spectrum: acquisition, normalization, region and fit.
pub fn format_spectrum_result(result: &SpectrumResult) -> String {
    let mut out = String::new();
    let meta = &result.metadata;

    out.push_str(&format!("=== peakfit - {} ===\n", result.key()));
    out.push_str(&format!(
        "Sample: {} | grating={} | pol={} | t={:.3}s\n",
        meta.sample_id(),
        meta.grating_period().unwrap_or("-"),
        meta.polarization(),
        meta.integration_time()
    ));
    out.push_str(&format!("Normalization: {}\n", fmt_normalization(&result.normalization)));

    let (lo, hi) = result.bounds.ordered();
    out.push_str(&format!(
        "Region: [{lo:.3}, {hi:.3}] nm -> indices {}..={} ({} points)\n",
        result.region.min_index(),
        result.region.max_index(),
        result.region.len()
    ));

    out.push_str(&format!("\nFit ({}):\n", result.fit.lineshape.display_name()));
    match &result.fit.status {
        FitStatus::Converged { iterations, sse } => {
            out.push_str(&format!("- converged in {iterations} iterations, SSE={sse:.6e}\n"));
            for ((name, value), err) in result
                .fit
                .parameter_names
                .iter()
                .zip(&result.fit.parameters)
                .zip(&result.fit.errors)
            {
                out.push_str(&format!("- {name:<10} {value:>14.6} ± {}\n", fmt_error(*err)));
            }
            out.push_str(&format!(
                "\nPeak: {:.3} ± {} nm\n",
                result.peak_wavelength,
                fmt_error(result.peak_error)
            ));
        }
        FitStatus::NotConverged { reason } => {
            out.push_str(&format!("- no peak found: {reason}\n"));
            out.push_str("\nPeak: none (reported as 0)\n");
        }
    }

    out
}

/// Format batch totals plus one row per processed file.
pub fn format_batch_summary(summary: &BatchSummary) -> String {
    let mut out = String::new();

    out.push_str(&format!(
        "Processed: {} ({} with a peak, {} without) | skipped: {} | failed: {}\n\n",
        summary.results.len(),
        summary.converged(),
        summary.no_peak(),
        summary.skipped.len(),
        summary.failed.len()
    ));

    if !summary.results.is_empty() {
        out.push_str(&format_results_table(&summary.results));
    }
    if !summary.skipped.is_empty() {
        out.push_str("\nSkipped:\n");
        for (path, reason) in &summary.skipped {
            out.push_str(&format!("- {}: {reason}\n", display_name(path)));
        }
    }
    if !summary.failed.is_empty() {
        out.push_str("\nFailed:\n");
        for (path, reason) in &summary.failed {
            out.push_str(&format!("- {}: {reason}\n", display_name(path)));
        }
    }

    out
}

/// Fixed-width table of peak positions.
pub fn format_results_table(results: &[SpectrumResult]) -> String {
    let mut out = String::new();
    out.push_str(
        format!(
            "{:<32} {:<4} {:>12} {:>10} {:<10}\n",
            "file", "pol", "peak_nm", "error_nm", "status"
        )
        .trim_end(),
    );
    out.push('\n');
    out.push_str(format!("{:-<32} {:-<4} {:-<12} {:-<10} {:-<10}\n", "", "", "", "", "").trim_end());
    out.push('\n');

    for r in results {
        let status = if r.fit.is_converged() { "ok" } else { "no peak" };
        out.push_str(
            format!(
                "{:<32} {:<4} {:>12.3} {:>10} {:<10}\n",
                truncate(r.key(), 32),
                r.metadata.polarization().to_string(),
                r.peak_wavelength,
                fmt_error(r.peak_error),
                status
            )
            .trim_end(),
        );
        out.push('\n');
    }

    out
}

fn fmt_normalization(method: &NormalizationMethod) -> String {
    match method {
        NormalizationMethod::MaxIntensity => "maximum intensity".to_string(),
        NormalizationMethod::Background { file_name } => format!("background '{file_name}'"),
    }
}

fn fmt_error(e: f64) -> String {
    if e.is_finite() { format!("{e:.3}") } else { "inf".to_string() }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
    out.push('.');
    out
}
