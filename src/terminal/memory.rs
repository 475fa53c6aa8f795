//! In-memory console used to drive the overlay in tests

use crate::terminal::host::{
    BufferSize, Cell, CellRect, CellSize, ConsoleHost, Coord, DrawSurface, InputEvent, PixelRect,
    ViewportMetrics, WindowRect,
};
use crate::utils::{OverlayError, Result};
use std::collections::VecDeque;

pub const DEFAULT_ATTRIBUTES: u16 = 0x07;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blit {
    pub first_pixel: Option<u32>,
    pub src_width: u32,
    pub src_height: u32,
    pub dest: PixelRect,
}

#[derive(Debug, Default)]
pub struct RecordingSurface {
    pub blits: Vec<Blit>,
}

impl DrawSurface for RecordingSurface {
    fn stretch_blit(&mut self, pixels: &[u32], src_width: u32, src_height: u32, dest: PixelRect) {
        self.blits.push(Blit {
            first_pixel: pixels.first().copied(),
            src_width,
            src_height,
            dest,
        });
    }
}

pub struct ScreenBuffer {
    pub cells: Vec<Cell>,
    pub size: BufferSize,
    pub window: WindowRect,
    pub cursor: Coord,
    pub cell_size: CellSize,
    pub input: VecDeque<InputEvent>,
    /// Leave input queued like the Windows console peek does
    pub peek_input: bool,
    pub surface: RecordingSurface,
    pub fail_metrics: bool,
    pub fail_writes: bool,
    pub text_reads: usize,
}

impl ScreenBuffer {
    /// Buffer of `cols` x `rows` spaces with the window showing the first `visible_rows`
    pub fn new(cols: usize, rows: usize, visible_rows: usize) -> Self {
        Self {
            cells: vec![Cell::new(' ', DEFAULT_ATTRIBUTES); cols * rows],
            size: BufferSize { cols, rows },
            window: WindowRect {
                left: 0,
                top: 0,
                right: cols - 1,
                bottom: visible_rows - 1,
            },
            cursor: Coord::default(),
            cell_size: CellSize {
                width: 8,
                height: 16,
            },
            input: VecDeque::new(),
            peek_input: false,
            surface: RecordingSurface::default(),
            fail_metrics: false,
            fail_writes: false,
            text_reads: 0,
        }
    }

    /// Write `text` at the start of `row`, wrapping into the following rows
    pub fn put_text(&mut self, row: usize, text: &str) {
        let start = row * self.size.cols;
        for (i, ch) in text.chars().enumerate() {
            self.cells[start + i] = Cell::new(ch, DEFAULT_ATTRIBUTES);
        }
    }

    /// Row contents with blank cells shown as spaces, trailing spaces trimmed
    pub fn row_text(&self, row: usize) -> String {
        let start = row * self.size.cols;
        self.cells[start..start + self.size.cols]
            .iter()
            .map(|cell| if cell.is_blank() { ' ' } else { cell.ch })
            .collect::<String>()
            .trim_end()
            .to_string()
    }

    pub fn scroll_to(&mut self, top: usize) {
        let height = self.window.height();
        self.window.top = top;
        self.window.bottom = top + height - 1;
    }

    fn index(&self, col: usize, row: usize) -> Result<usize> {
        if col < self.size.cols && row < self.size.rows {
            Ok(row * self.size.cols + col)
        } else {
            Err(OverlayError::terminal(format!("({}, {}) is outside the buffer", col, row)))
        }
    }
}

impl ConsoleHost for ScreenBuffer {
    fn metrics(&mut self) -> Result<ViewportMetrics> {
        if self.fail_metrics {
            return Err(OverlayError::terminal("screen buffer info unavailable"));
        }
        Ok(ViewportMetrics {
            window: self.window,
            buffer_size: self.size,
            cursor: self.cursor,
        })
    }

    fn cell_size(&self) -> CellSize {
        self.cell_size
    }

    fn read_text(&mut self, origin: Coord, len: usize) -> Result<String> {
        self.text_reads += 1;
        let start = self.index(origin.x, origin.y)?;
        let end = (start + len).min(self.cells.len());
        Ok(self.cells[start..end].iter().map(|cell| cell.ch).collect())
    }

    fn read_region(&mut self, region: CellRect) -> Result<Vec<Cell>> {
        let mut cells = Vec::with_capacity(region.len());
        for row in region.top..region.top + region.height {
            for col in region.left..region.left + region.width {
                cells.push(self.cells[self.index(col, row)?]);
            }
        }
        Ok(cells)
    }

    fn write_region(&mut self, region: CellRect, cells: &[Cell]) -> Result<()> {
        if self.fail_writes {
            return Err(OverlayError::terminal("write refused"));
        }
        if cells.len() != region.len() {
            return Err(OverlayError::terminal("region size mismatch"));
        }
        // validate the whole block before touching anything
        self.index(region.left + region.width - 1, region.top + region.height - 1)?;

        for (i, cell) in cells.iter().enumerate() {
            let col = region.left + i % region.width;
            let row = region.top + i / region.width;
            let idx = self.index(col, row)?;
            self.cells[idx] = *cell;
        }
        Ok(())
    }

    fn set_cursor(&mut self, pos: Coord) -> Result<()> {
        self.index(pos.x, pos.y)?;
        self.cursor = pos;
        Ok(())
    }

    fn poll_input(&mut self, max: usize) -> Result<Vec<InputEvent>> {
        let count = max.min(self.input.len());
        if self.peek_input {
            return Ok(self.input.iter().take(count).copied().collect());
        }
        Ok(self.input.drain(..count).collect())
    }

    fn surface(&mut self) -> &mut dyn DrawSurface {
        &mut self.surface
    }
}
