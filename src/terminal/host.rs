use crate::utils::Result;

/// Character written into cells that the splicer clears
pub const BLANK_CHAR: char = '\0';

/// One character cell of the console screen buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cell {
    pub ch: char,
    pub attributes: u16,
    /// UTF-16 unit the console stored when it is not a char on its own
    /// (one half of a surrogate pair); `ch` is U+FFFD then
    surrogate: Option<u16>,
}

impl Default for Cell {
    fn default() -> Self {
        Self {
            ch: BLANK_CHAR,
            attributes: 0,
            surrogate: None,
        }
    }
}

impl Cell {
    pub fn new(ch: char, attributes: u16) -> Self {
        Self {
            ch,
            attributes,
            surrogate: None,
        }
    }

    /// Cell holding one UTF-16 unit as read from the console
    pub fn from_unit(unit: u16, attributes: u16) -> Self {
        match char::from_u32(u32::from(unit)) {
            Some(ch) => Self::new(ch, attributes),
            None => Self {
                ch: char::REPLACEMENT_CHARACTER,
                attributes,
                surrogate: Some(unit),
            },
        }
    }

    /// UTF-16 unit to write back to the console
    pub fn unit(&self) -> u16 {
        match self.surrogate {
            Some(unit) => unit,
            None => u16::try_from(u32::from(self.ch)).unwrap_or(0xFFFD),
        }
    }

    pub fn is_blank(&self) -> bool {
        self.ch == BLANK_CHAR
    }

    /// Drop the character but keep the colors
    pub fn clear(&mut self) {
        self.ch = BLANK_CHAR;
        self.surrogate = None;
    }
}

/// Position in buffer coordinates (column, row)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Coord {
    pub x: usize,
    pub y: usize,
}

impl Coord {
    pub const fn new(x: usize, y: usize) -> Self {
        Self { x, y }
    }
}

/// Size of the whole screen buffer, scrollback included
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BufferSize {
    pub cols: usize,
    pub rows: usize,
}

/// Visible window inside the screen buffer; all edges are inclusive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WindowRect {
    pub left: usize,
    pub top: usize,
    pub right: usize,
    pub bottom: usize,
}

impl WindowRect {
    pub fn width(&self) -> usize {
        self.right.saturating_sub(self.left) + 1
    }

    pub fn height(&self) -> usize {
        self.bottom.saturating_sub(self.top) + 1
    }

    pub fn origin(&self) -> Coord {
        Coord::new(self.left, self.top)
    }
}

/// Snapshot of the console geometry taken once per frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ViewportMetrics {
    pub window: WindowRect,
    pub buffer_size: BufferSize,
    pub cursor: Coord,
}

/// Rectangular block of cells in buffer coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellRect {
    pub left: usize,
    pub top: usize,
    pub width: usize,
    pub height: usize,
}

impl CellRect {
    pub fn len(&self) -> usize {
        self.width * self.height
    }
}

/// Pixel size of one character cell of the console font
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellSize {
    pub width: u32,
    pub height: u32,
}

/// Destination rectangle on the window surface, in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

/// Console input record, reduced to what the overlay reacts to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    Key { pressed: bool },
    Mouse,
    BufferResized { cols: usize, rows: usize },
    Focus,
    Other,
}

/// Window surface the overlay draws on
pub trait DrawSurface {
    /// Stretch a packed 0xAARRGGBB frame of `src_width` x `src_height` pixels into `dest`.
    /// The alpha byte is carried along but not blended.
    fn stretch_blit(&mut self, pixels: &[u32], src_width: u32, src_height: u32, dest: PixelRect);
}

/// Binding to the host console.
///
/// The console buffer is owned by another process. Callers must be the only
/// writer issuing these calls; the binding does no locking of its own.
pub trait ConsoleHost {
    /// Query the current window, buffer size and cursor position
    fn metrics(&mut self) -> Result<ViewportMetrics>;

    /// Get the console font's cell dimensions in pixels
    fn cell_size(&self) -> CellSize;

    /// Read `len` characters starting at `origin`, wrapping across rows
    fn read_text(&mut self, origin: Coord, len: usize) -> Result<String>;

    /// Read a block of cells, row-major
    fn read_region(&mut self, region: CellRect) -> Result<Vec<Cell>>;

    /// Write a block of cells back, row-major
    fn write_region(&mut self, region: CellRect, cells: &[Cell]) -> Result<()>;

    /// Move the write cursor
    fn set_cursor(&mut self, pos: Coord) -> Result<()>;

    /// Look at no more than `max` pending input events without blocking.
    ///
    /// Implementations may leave the events queued for their real owner (the
    /// Windows console peeks, so the same records can show up again on the
    /// next call and records past `max` stay hidden until the owner drains
    /// the queue).
    fn poll_input(&mut self, max: usize) -> Result<Vec<InputEvent>>;

    /// Drawing surface of the console window
    fn surface(&mut self) -> &mut dyn DrawSurface;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_surrogate_halves_survive_a_round_trip() {
        // U+1F600 as stored by the console, one unit per cell
        for unit in [0xD83D, 0xDE00] {
            let cell = Cell::from_unit(unit, 0x1F);
            assert_eq!(cell.ch, char::REPLACEMENT_CHARACTER);
            assert_eq!(cell.unit(), unit);
            assert_eq!(cell.attributes, 0x1F);
        }
    }

    #[test]
    fn test_plain_units_map_to_chars() {
        let cell = Cell::from_unit(u16::from(b'A'), 7);
        assert_eq!(cell, Cell::new('A', 7));
        assert_eq!(cell.unit(), 0x41);
        assert_eq!(Cell::new('\u{1F600}', 7).unit(), 0xFFFD);
    }

    #[test]
    fn test_clear_drops_surrogate() {
        let mut cell = Cell::from_unit(0xD83D, 0x1F);
        cell.clear();
        assert!(cell.is_blank());
        assert_eq!(cell.unit(), 0);
        assert_eq!(cell.attributes, 0x1F);
    }
}
