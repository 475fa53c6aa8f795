use crate::config::OverlayConfig;
use crate::graphic::Graphic;
use crate::terminal::host::{CellRect, CellSize, ConsoleHost, Coord, InputEvent, PixelRect, ViewportMetrics};
use crate::terminal::scanner::{Marker, scan_from};
use crate::terminal::splice::splice;
use crate::terminal::viewport::ViewportTracker;
use crate::utils::{OverlayError, Result};
use std::collections::HashSet;
use std::path::Path;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No console binding
    Detached,
    /// Bound to a console, no frame run yet
    Attached,
    Running,
    /// The console went away; the session will not attach again
    Closed,
}

/// A graphic pinned to a cell of the console buffer
pub struct PlacedGraphic {
    pub graphic: Graphic,
    pub col: usize,
    pub row: usize,
}

/// Marker that failed to decode, keyed by where it sits in the buffer
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct MarkerKey {
    col: usize,
    row: usize,
    file_name: String,
}

/// Drives the overlay for one console: scans for markers, splices room for
/// the images and keeps them drawn over the text.
pub struct OverlaySession<H: ConsoleHost> {
    config: OverlayConfig,
    state: SessionState,
    host: Option<H>,
    cell_size: CellSize,
    tracker: ViewportTracker,
    graphics: Vec<PlacedGraphic>,
    failed_markers: HashSet<MarkerKey>,
    /// A marker was used up last scan; look for the next one this tick
    pending_rescan: bool,
}

impl<H: ConsoleHost> OverlaySession<H> {
    pub fn new(config: OverlayConfig) -> Self {
        let tracker = ViewportTracker::new(config.rescan_every_frame);
        Self {
            config,
            state: SessionState::Detached,
            host: None,
            cell_size: CellSize {
                width: 0,
                height: 0,
            },
            tracker,
            graphics: Vec::new(),
            failed_markers: HashSet::new(),
            pending_rescan: false,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn graphics(&self) -> &[PlacedGraphic] {
        &self.graphics
    }

    #[cfg(test)]
    pub fn host(&self) -> Option<&H> {
        self.host.as_ref()
    }

    #[cfg(test)]
    pub fn host_mut(&mut self) -> Option<&mut H> {
        self.host.as_mut()
    }

    /// Bind to a console produced by `connect`.
    ///
    /// The binding must also answer a geometry query. On any failure the
    /// session stays detached.
    pub fn attach_with<F>(&mut self, connect: F) -> Result<()>
    where
        F: FnOnce() -> Result<H>,
    {
        if self.state != SessionState::Detached {
            return Err(OverlayError::attach(format!(
                "session is {:?}, not detached",
                self.state
            )));
        }

        let attempt = connect().and_then(|mut host| {
            let metrics = host.metrics()?;
            Ok((host, metrics))
        });

        let (host, metrics) = attempt.map_err(|e| match e {
            OverlayError::Attach(_) => e,
            other => OverlayError::attach(other.to_string()),
        })?;

        self.cell_size = host.cell_size();
        self.host = Some(host);
        self.state = SessionState::Attached;

        log::info!(
            "Attached to console: buffer {}x{}, window {}x{}, cell {}x{}px",
            metrics.buffer_size.cols,
            metrics.buffer_size.rows,
            metrics.window.width(),
            metrics.window.height(),
            self.cell_size.width,
            self.cell_size.height
        );

        Ok(())
    }

    /// Drop the console binding and every placed graphic
    pub fn close(&mut self) {
        if self.state != SessionState::Closed {
            log::info!("Closing overlay session ({} graphics)", self.graphics.len());
        }
        self.graphics.clear();
        self.host = None;
        self.state = SessionState::Closed;
    }

    /// Run one frame, `dt` seconds after the previous one.
    ///
    /// Does nothing unless attached. Failures to read input or geometry are
    /// returned; a marker that cannot be turned into an image is only logged.
    pub fn tick(&mut self, dt: f64) -> Result<()> {
        let Some(host) = self.host.as_mut() else {
            return Ok(());
        };

        if self.state == SessionState::Attached {
            self.state = SessionState::Running;
        }

        let mut rescan = std::mem::take(&mut self.pending_rescan);
        let mut redraw = false;

        for event in host.poll_input(self.config.input_batch)? {
            match event {
                InputEvent::Key { pressed: true } => rescan = true,
                InputEvent::BufferResized { .. } => {
                    rescan = true;
                    redraw = true;
                }
                _ => {}
            }
        }

        let delta = self.tracker.poll(host)?;
        rescan |= delta.needs_rescan;
        redraw |= delta.needs_redraw;

        if rescan {
            match self.rescan() {
                Ok(placed) => redraw |= placed,
                Err(e) => log::warn!("Rescan failed: {}", e),
            }
        }

        for placed in &mut self.graphics {
            if placed.graphic.update(dt) {
                redraw = true;
            }
        }

        if redraw {
            self.draw();
        }

        Ok(())
    }

    /// Tick until `stop` returns true, measuring frame time with a monotonic clock
    pub fn run_until(&mut self, stop: &dyn Fn() -> bool) {
        let interval = Duration::from_millis(self.config.tick_interval_ms);
        let mut last = Instant::now();
        let mut failing = false;

        while !stop() {
            let now = Instant::now();
            let dt = now.duration_since(last).as_secs_f64();
            last = now;

            match self.tick(dt) {
                Ok(()) => failing = false,
                Err(e) => {
                    // report the first failure of a streak only
                    if !failing {
                        log::warn!("Overlay tick failed: {}", e);
                    }
                    failing = true;
                }
            }

            if !interval.is_zero() {
                std::thread::sleep(interval);
            }
        }
    }

    /// Look for the next unresolved marker in the visible text and turn it into
    /// a placed graphic. Returns whether one was placed.
    fn rescan(&mut self) -> Result<bool> {
        let (Some(host), Some(metrics)) = (self.host.as_mut(), self.tracker.current().copied()) else {
            return Ok(false);
        };

        let cols = metrics.buffer_size.cols;
        let origin = Coord::new(0, metrics.window.top);
        let text = host.read_text(origin, cols * metrics.window.height())?;

        let Some(marker) = next_marker(&text, &metrics, &self.failed_markers) else {
            return Ok(false);
        };

        let graphic = match Graphic::load(Path::new(&marker.file_name)) {
            Ok(graphic) => graphic,
            Err(e) => {
                log::warn!("Leaving marker for {} in place: {}", marker.file_name, e);
                if !self.config.retry_failed_markers {
                    self.failed_markers.insert(marker_key(&marker, &metrics));
                    self.pending_rescan = true;
                }
                return Ok(false);
            }
        };

        let reserved_rows = usize::from(self.config.reserved_rows());
        splice_marker(host, &metrics, &marker, reserved_rows)?;

        let row = metrics.window.top + marker.index / cols + 1;
        log::info!(
            "Placed {} ({}x{}) at row {}",
            marker.file_name,
            graphic.width(),
            graphic.height(),
            row
        );
        self.graphics.push(PlacedGraphic { graphic, col: 0, row });
        self.pending_rescan = true;

        Ok(true)
    }

    fn draw(&mut self) {
        let (Some(host), Some(metrics)) = (self.host.as_mut(), self.tracker.current()) else {
            return;
        };

        let surface = host.surface();
        for placed in &self.graphics {
            if let Some(dest) = placement(placed, metrics, self.cell_size, self.config.image_rows) {
                placed.graphic.render(surface, dest);
            }
        }
    }
}

/// First marker in `text` that has not already failed to decode
fn next_marker(
    text: &str,
    metrics: &ViewportMetrics,
    failed: &HashSet<MarkerKey>,
) -> Option<Marker> {
    let mut from = 0;
    loop {
        let marker = scan_from(text, from)?;
        if !failed.contains(&marker_key(&marker, metrics)) {
            return Some(marker);
        }
        from = marker.end_offset();
    }
}

fn marker_key(marker: &Marker, metrics: &ViewportMetrics) -> MarkerKey {
    let cols = metrics.buffer_size.cols.max(1);
    MarkerKey {
        col: marker.index % cols,
        row: metrics.window.top + marker.index / cols,
        file_name: marker.file_name.clone(),
    }
}

/// Splice the buffer from the window top to the buffer end and commit it with
/// a single write. Nothing reaches the console if reading or splicing fails.
fn splice_marker(
    host: &mut dyn ConsoleHost,
    metrics: &ViewportMetrics,
    marker: &Marker,
    reserved_rows: usize,
) -> Result<()> {
    let cols = metrics.buffer_size.cols;
    let region = CellRect {
        left: 0,
        top: metrics.window.top,
        width: cols,
        height: metrics.buffer_size.rows.saturating_sub(metrics.window.top),
    };

    let mut cells = host.read_region(region)?;
    splice(&mut cells, cols, marker.index, marker.len(), reserved_rows)?;
    host.write_region(region, &cells)?;

    let last_row = metrics.buffer_size.rows.saturating_sub(1);
    let cursor_row = (metrics.cursor.y + reserved_rows).min(last_row);
    host.set_cursor(Coord::new(0, cursor_row))?;

    Ok(())
}

/// Pixel rectangle of a placed graphic in the current window, or `None` when
/// it lies entirely outside the window
fn placement(
    placed: &PlacedGraphic,
    metrics: &ViewportMetrics,
    cell: CellSize,
    image_rows: u16,
) -> Option<PixelRect> {
    let height = u32::from(image_rows) * cell.height;
    let width = (f64::from(height) * placed.graphic.aspect_ratio()) as u32;

    let x = (placed.col as i64 - metrics.window.left as i64) * i64::from(cell.width);
    let y = (placed.row as i64 - metrics.window.top as i64) * i64::from(cell.height);
    let window_height = metrics.window.height() as i64 * i64::from(cell.height);

    if y + i64::from(height) <= 0 || y >= window_height {
        return None;
    }

    Some(PixelRect {
        x: i32::try_from(x).ok()?,
        y: i32::try_from(y).ok()?,
        width,
        height,
    })
}
