//! ASCII plotting for terminal output.
//!
//! Fixed-size character grid, deterministic output:
//! - measured samples: `o`
//! - fitted lineshape: `-` line
//! - fitted peak position: `|` column

use crate::domain::{FanoFitResult, SpectrumResult};
use crate::models::evaluate;

/// Render a stored result: its fitted window plus the fitted curve.
pub fn render_result_plot(result: &SpectrumResult, width: usize, height: usize) -> String {
    render_fit_plot(
        &result.window_wavelength,
        &result.window_intensity,
        Some(&result.fit),
        width,
        height,
    )
}

/// Render samples and (if it converged) the fitted curve over the same range.
pub fn render_fit_plot(
    wavelength: &[f64],
    intensity: &[f64],
    fit: Option<&FanoFitResult>,
    width: usize,
    height: usize,
) -> String {
    let width = width.max(10);
    let height = height.max(5);

    let points: Vec<(f64, f64)> = wavelength
        .iter()
        .zip(intensity)
        .filter(|(w, i)| w.is_finite() && i.is_finite())
        .map(|(&w, &i)| (w, i))
        .collect();
    let (x_min, x_max) = x_range(&points).unwrap_or((0.0, 1.0));

    let fit = fit.filter(|f| f.is_converged());
    let curve = fit.map(|f| sample_curve(f, x_min, x_max, width));

    let (y_min, y_max) = y_range(&points, curve.as_deref()).unwrap_or((0.0, 1.0));
    let (y_min, y_max) = pad_range(y_min, y_max, 0.05);

    let mut grid = vec![vec![' '; width]; height];

    if let Some(f) = fit {
        if (x_min..=x_max).contains(&f.peak_wavelength) {
            let col = map_x(f.peak_wavelength, x_min, x_max, width);
            for row in grid.iter_mut() {
                row[col] = '|';
            }
        }
    }
    if let Some(curve) = &curve {
        draw_curve(&mut grid, curve, x_min, x_max, y_min, y_max);
    }
    for &(w, i) in &points {
        let x = map_x(w, x_min, x_max, width);
        let y = map_y(i, y_min, y_max, height);
        grid[y][x] = 'o';
    }

    let mut out = format!("Plot: λ=[{x_min:.2}, {x_max:.2}] nm | I=[{y_min:.3}, {y_max:.3}]");
    if let Some(f) = fit {
        out.push_str(&format!(
            " | peak {:.3} ± {:.3} nm",
            f.peak_wavelength, f.peak_error
        ));
    }
    out.push('\n');
    for row in grid {
        out.push_str(&row.into_iter().collect::<String>());
        out.push('\n');
    }
    out
}

fn x_range(points: &[(f64, f64)]) -> Option<(f64, f64)> {
    let min = points.iter().map(|p| p.0).fold(f64::INFINITY, f64::min);
    let max = points.iter().map(|p| p.0).fold(f64::NEG_INFINITY, f64::max);
    (min.is_finite() && max.is_finite() && max > min).then_some((min, max))
}

fn sample_curve(fit: &FanoFitResult, x_min: f64, x_max: f64, n: usize) -> Vec<(f64, f64)> {
    let n = n.max(2);
    (0..n)
        .map(|i| {
            let x = x_min + (i as f64 / (n as f64 - 1.0)) * (x_max - x_min);
            (x, evaluate(fit.lineshape, x, &fit.parameters))
        })
        .filter(|(_, y)| y.is_finite())
        .collect()
}

fn y_range(points: &[(f64, f64)], curve: Option<&[(f64, f64)]>) -> Option<(f64, f64)> {
    let mut min_y = f64::INFINITY;
    let mut max_y = f64::NEG_INFINITY;
    for &(_, y) in points.iter().chain(curve.unwrap_or(&[])) {
        min_y = min_y.min(y);
        max_y = max_y.max(y);
    }
    (min_y.is_finite() && max_y.is_finite() && max_y > min_y).then_some((min_y, max_y))
}

fn pad_range(min: f64, max: f64, frac: f64) -> (f64, f64) {
    let pad = ((max - min).abs() * frac).max(1e-12);
    (min - pad, max + pad)
}

fn map_x(x: f64, x_min: f64, x_max: f64, width: usize) -> usize {
    let u = ((x - x_min) / (x_max - x_min)).clamp(0.0, 1.0);
    (u * (width as f64 - 1.0)).round() as usize
}

fn map_y(y: f64, y_min: f64, y_max: f64, height: usize) -> usize {
    let u = ((y - y_min) / (y_max - y_min)).clamp(0.0, 1.0);
    // Row 0 is the top.
    (height as f64 - 1.0 - (u * (height as f64 - 1.0))).round() as usize
}

fn draw_curve(grid: &mut [Vec<char>], curve: &[(f64, f64)], x_min: f64, x_max: f64, y_min: f64, y_max: f64) {
    let height = grid.len();
    let width = grid[0].len();

    let mut prev = None;
    for &(x, y) in curve {
        let col = map_x(x, x_min, x_max, width);
        let row = map_y(y, y_min, y_max, height);
        if let Some((c0, r0)) = prev {
            draw_line(grid, c0, r0, col, row, '-');
        } else {
            grid[row][col] = '-';
        }
        prev = Some((col, row));
    }
}

/// Integer line drawing (Bresenham).
fn draw_line(grid: &mut [Vec<char>], x0: usize, y0: usize, x1: usize, y1: usize, ch: char) {
    let mut x0 = x0 as isize;
    let mut y0 = y0 as isize;
    let x1 = x1 as isize;
    let y1 = y1 as isize;

    let dx = (x1 - x0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let dy = -(y1 - y0).abs();
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    loop {
        let (r, c) = (y0 as usize, x0 as usize);
        if r < grid.len() && c < grid[0].len() && matches!(grid[r][c], ' ' | '|') {
            grid[r][c] = ch;
        }
        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
}
