//! Plotters-rendered spectrum chart with two selection cursors.
//!
//! Plotters output is drawn into the Ratatui buffer through
//! `plotters-ratatui-backend`.

use plotters::prelude::*;
use plotters_ratatui_backend::widget_fn;
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Style},
    widgets::Widget,
};

/// Render-only chart description; all series and bounds are prepared outside `render`.
pub struct SpectrumChart<'a> {
    /// Normalized spectrum as `(wavelength, intensity)`, finite samples only.
    pub spectrum: &'a [(f64, f64)],
    /// Cursor wavelengths.
    pub cursors: [f64; 2],
    /// Index into `cursors` of the cursor the arrow keys move.
    pub active: usize,
    pub x_bounds: [f64; 2],
    pub y_bounds: [f64; 2],
}

impl Widget for SpectrumChart<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if area.width < 20 || area.height < 8 {
            buf.set_string(
                area.x,
                area.y,
                "Chart area too small (resize terminal).",
                Style::default().fg(Color::Yellow),
            );
            return;
        }

        let [x0, x1] = self.x_bounds;
        let [y0, y1] = self.y_bounds;
        if !(x0.is_finite() && x1.is_finite() && y0.is_finite() && y1.is_finite()) || x1 <= x0 || y1 <= y0 {
            return;
        }

        let widget = widget_fn(move |root| {
            let mut chart = ChartBuilder::on(&root)
                .margin(1)
                .set_label_area_size(LabelAreaPosition::Left, 6)
                .set_label_area_size(LabelAreaPosition::Bottom, 3)
                .build_cartesian_2d(x0..x1, y0..y1)?;

            chart
                .configure_mesh()
                .disable_x_mesh()
                .disable_y_mesh()
                .x_desc("nm")
                .x_labels(6)
                .y_labels(5)
                .x_label_formatter(&|v| format!("{v:.0}"))
                .y_label_formatter(&|v| format!("{v:.2}"))
                .label_style(("sans-serif", 10).into_font().color(&WHITE))
                .axis_style(&WHITE)
                .bold_line_style(&WHITE)
                .draw()?;

            chart.draw_series(LineSeries::new(self.spectrum.iter().copied(), &WHITE))?;

            let active_color = RGBColor(255, 255, 0);
            let idle_color = RGBColor(0, 255, 255);
            for (i, &x) in self.cursors.iter().enumerate() {
                let color = if i == self.active { active_color } else { idle_color };
                chart.draw_series(LineSeries::new([(x, y0), (x, y1)], &color))?;
            }

            Ok(())
        });

        widget.render(area, buf);
    }
}
