//! Ratatui-based interactive region selection.
//!
//! `InteractiveSelector` plots the normalized spectrum with two cursors and
//! blocks until the user confirms or cancels:
//!
//! - `←` / `→`: move the active cursor one sample (`PgUp` / `PgDn`: ten)
//! - `Tab`: switch cursor
//! - `Enter`: confirm
//! - `Esc` / `q`: cancel
//!
//! Only one selection can own the terminal at a time; a second concurrent
//! call fails with `SelectionBusy`.

use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use log::{debug, info};
use ratatui::{
    Terminal,
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
};

use crate::domain::{NormalizedSpectrum, WavelengthBounds};
use crate::error::{PeakError, Result};
use crate::region::{BoundsSource, RegionBook, SelectionRequest};

mod plotters_chart;

use plotters_chart::SpectrumChart;

const POLL_INTERVAL: Duration = Duration::from_millis(100);
const PAGE_STEP: usize = 10;

static SELECTION_ACTIVE: AtomicBool = AtomicBool::new(false);

/// Blocking terminal selection of wavelength bounds.
#[derive(Debug, Default)]
pub struct InteractiveSelector {
    timeout: Option<Duration>,
    record: Option<(PathBuf, RegionBook)>,
}

impl InteractiveSelector {
    pub fn new(timeout: Option<Duration>) -> Self {
        Self { timeout, record: None }
    }

    /// Save every confirmed selection into the region file at `path`
    /// (existing entries are kept).
    pub fn recording_to(mut self, path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let book = if path.exists() { RegionBook::load(&path)? } else { RegionBook::default() };
        self.record = Some((path, book));
        Ok(self)
    }

    fn select(&self, request: &SelectionRequest<'_>) -> Result<WavelengthBounds> {
        let _lock = SelectionLock::acquire()?;
        let mut state = SelectionState::new(&request.spectrum.wavelength).ok_or_else(|| {
            PeakError::invalid(format!("'{}' has too few samples to select a region", request.key))
        })?;
        let view = ChartData::from_spectrum(request.spectrum);

        let _guard = TerminalGuard::new()?;
        let mut terminal = Terminal::new(CrosstermBackend::new(io::stdout()))
            .map_err(|e| PeakError::Terminal(format!("failed to initialize terminal: {e}")))?;

        let deadline = self.timeout.map(|t| Instant::now() + t);
        let mut needs_redraw = true;
        loop {
            if needs_redraw {
                terminal
                    .draw(|f| draw(f, request.key, &state, &view))
                    .map_err(|e| PeakError::Terminal(format!("draw error: {e}")))?;
                needs_redraw = false;
            }

            let wait = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Err(PeakError::SelectionTimedOut {
                            file: request.key.to_string(),
                            seconds: self.timeout.map_or(0, |t| t.as_secs()),
                        });
                    }
                    POLL_INTERVAL.min(deadline - now)
                }
                None => POLL_INTERVAL,
            };
            if !event::poll(wait).map_err(|e| PeakError::Terminal(format!("event poll error: {e}")))? {
                continue;
            }

            match event::read().map_err(|e| PeakError::Terminal(format!("event read error: {e}")))? {
                Event::Key(key) if key.kind == KeyEventKind::Press => match state.handle_key(key.code) {
                    Some(Outcome::Confirmed(bounds)) => return Ok(bounds),
                    Some(Outcome::Cancelled) => {
                        return Err(PeakError::SelectionCancelled(request.key.to_string()));
                    }
                    None => needs_redraw = true,
                },
                Event::Resize(_, _) => needs_redraw = true,
                _ => {}
            }
        }
    }
}

impl BoundsSource for InteractiveSelector {
    fn acquire(&mut self, request: &SelectionRequest<'_>) -> Result<WavelengthBounds> {
        let bounds = self.select(request)?;
        debug!("{}: selected [{}, {}] nm", request.key, bounds.first, bounds.second);

        if let Some((path, book)) = &mut self.record {
            book.insert(request.key, bounds);
            book.save(path)?;
            info!("{}: bounds recorded in '{}'", request.key, path.display());
        }
        Ok(bounds)
    }
}

/// Process-wide claim on the terminal for one selection.
struct SelectionLock;

impl SelectionLock {
    fn acquire() -> Result<Self> {
        SELECTION_ACTIVE
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| Self)
            .map_err(|_| PeakError::SelectionBusy)
    }
}

impl Drop for SelectionLock {
    fn drop(&mut self) {
        SELECTION_ACTIVE.store(false, Ordering::Release);
    }
}

/// Ensures the terminal is restored (raw mode, alternate screen) on exit.
struct TerminalGuard;

impl TerminalGuard {
    fn new() -> Result<Self> {
        enable_raw_mode().map_err(|e| PeakError::Terminal(format!("failed to enable raw mode: {e}")))?;
        if let Err(e) = execute!(io::stdout(), EnterAlternateScreen) {
            let _ = disable_raw_mode();
            return Err(PeakError::Terminal(format!("failed to enter alternate screen: {e}")));
        }
        Ok(Self)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Outcome {
    Confirmed(WavelengthBounds),
    Cancelled,
}

/// Cursor positions over the wavelength axis, independent of the terminal.
#[derive(Debug, Clone, PartialEq)]
struct SelectionState {
    wavelength: Vec<f64>,
    cursors: [usize; 2],
    active: usize,
    status: String,
}

impl SelectionState {
    /// Cursors start at 10% and 90% of the axis. `None` for fewer than two samples.
    fn new(wavelength: &[f64]) -> Option<Self> {
        let n = wavelength.len();
        if n < 2 {
            return None;
        }
        let last = n - 1;
        let first = last / 10;
        let second = (last - last / 10).max(first + 1);
        Some(Self {
            wavelength: wavelength.to_vec(),
            cursors: [first, second.min(last)],
            active: 0,
            status: String::new(),
        })
    }

    fn handle_key(&mut self, code: KeyCode) -> Option<Outcome> {
        self.status.clear();
        match code {
            KeyCode::Esc | KeyCode::Char('q') => return Some(Outcome::Cancelled),
            KeyCode::Left => self.step(-1),
            KeyCode::Right => self.step(1),
            KeyCode::PageDown => self.step(-(PAGE_STEP as isize)),
            KeyCode::PageUp => self.step(PAGE_STEP as isize),
            KeyCode::Home => self.cursors[self.active] = 0,
            KeyCode::End => self.cursors[self.active] = self.wavelength.len() - 1,
            KeyCode::Tab | KeyCode::BackTab => self.active = 1 - self.active,
            KeyCode::Enter => {
                if self.cursors[0] == self.cursors[1] {
                    self.status = "Cursors are on the same sample; move one before confirming.".to_string();
                } else {
                    return Some(Outcome::Confirmed(self.bounds()));
                }
            }
            _ => {}
        }
        None
    }

    fn step(&mut self, delta: isize) {
        let last = self.wavelength.len() - 1;
        let cur = self.cursors[self.active];
        self.cursors[self.active] = cur.saturating_add_signed(delta).min(last);
    }

    fn bounds(&self) -> WavelengthBounds {
        WavelengthBounds::new(self.wavelength[self.cursors[0]], self.wavelength[self.cursors[1]])
    }
}

/// Chart series and axis ranges for one spectrum.
#[derive(Debug, Clone, PartialEq)]
struct ChartData {
    points: Vec<(f64, f64)>,
    x_bounds: [f64; 2],
    y_bounds: [f64; 2],
}

impl ChartData {
    fn from_spectrum(spectrum: &NormalizedSpectrum) -> Self {
        let points: Vec<(f64, f64)> = spectrum
            .wavelength
            .iter()
            .zip(&spectrum.intensity)
            .filter(|(w, i)| w.is_finite() && i.is_finite())
            .map(|(&w, &i)| (w, i))
            .collect();

        let x_bounds = match (spectrum.wavelength.first(), spectrum.wavelength.last()) {
            (Some(&a), Some(&b)) if b > a => [a, b],
            _ => [0.0, 1.0],
        };
        let (lo, hi) = points
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &(_, y)| (lo.min(y), hi.max(y)));
        let y_bounds = if lo.is_finite() && hi.is_finite() {
            let pad = ((hi - lo) * 0.05).max(1e-6);
            [lo - pad, hi + pad]
        } else {
            [0.0, 1.0]
        };

        Self {
            points,
            x_bounds,
            y_bounds,
        }
    }
}

fn draw(frame: &mut ratatui::Frame<'_>, key: &str, state: &SelectionState, view: &ChartData) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(10), Constraint::Length(3)])
        .split(frame.area());

    let header = Paragraph::new(Line::from(vec![
        Span::styled(key.to_string(), Style::default().add_modifier(Modifier::BOLD)),
        Span::raw("  select the fit region"),
    ]))
    .block(Block::default().borders(Borders::ALL).title("peakfit"));
    frame.render_widget(header, chunks[0]);

    let chart_block = Block::default().borders(Borders::ALL);
    let inner = chart_block.inner(chunks[1]);
    frame.render_widget(chart_block, chunks[1]);
    frame.render_widget(
        SpectrumChart {
            spectrum: &view.points,
            cursors: [state.wavelength[state.cursors[0]], state.wavelength[state.cursors[1]]],
            active: state.active,
            x_bounds: view.x_bounds,
            y_bounds: view.y_bounds,
        },
        inner,
    );

    let cursor_span = |i: usize| {
        let style = if i == state.active {
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::Cyan)
        };
        Span::styled(format!("{:.3} nm", state.wavelength[state.cursors[i]]), style)
    };
    let mut spans = vec![
        Span::raw("bounds: "),
        cursor_span(0),
        Span::raw(" .. "),
        cursor_span(1),
        Span::raw("  ←/→ PgUp/PgDn move · Tab switch · Enter confirm · Esc cancel"),
    ];
    if !state.status.is_empty() {
        spans.push(Span::styled(format!("  {}", state.status), Style::default().fg(Color::Red)));
    }
    frame.render_widget(
        Paragraph::new(Line::from(spans)).block(Block::default().borders(Borders::ALL)),
        chunks[2],
    );
}
