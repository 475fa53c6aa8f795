//! Windows console binding: screen buffer access through the console API and
//! drawing through GDI on the console window.

use crate::terminal::host::{
    BufferSize, Cell, CellRect, CellSize, ConsoleHost, Coord, DrawSurface, InputEvent, PixelRect,
    ViewportMetrics, WindowRect,
};
use crate::utils::{OverlayError, Result};
use std::ffi::OsStr;
use std::os::windows::ffi::OsStrExt;
use std::ptr;
use winapi::shared::minwindef::{BOOL, DWORD, FALSE, TRUE};
use winapi::shared::windef::{HDC, HWND};
use winapi::um::consoleapi::{
    GetConsoleMode, GetNumberOfConsoleInputEvents, PeekConsoleInputW, SetConsoleCtrlHandler,
    SetConsoleMode,
};
use winapi::um::fileapi::{CreateFileW, OPEN_EXISTING};
use winapi::um::handleapi::{CloseHandle, INVALID_HANDLE_VALUE};
use winapi::um::wincon::{
    AttachConsole, CONSOLE_FONT_INFO, CONSOLE_SCREEN_BUFFER_INFO, ENABLE_WINDOW_INPUT, FreeConsole,
    GetConsoleScreenBufferInfo, GetConsoleWindow, GetCurrentConsoleFont,
    ReadConsoleOutputCharacterW, ReadConsoleOutputW, SetConsoleCursorPosition,
    WriteConsoleOutputW,
};
use winapi::um::wincontypes::{
    CHAR_INFO, COORD, FOCUS_EVENT, INPUT_RECORD, KEY_EVENT, MOUSE_EVENT, SMALL_RECT,
    WINDOW_BUFFER_SIZE_EVENT,
};
use winapi::um::wingdi::{BI_RGB, BITMAPINFO, BITMAPINFOHEADER, DIB_RGB_COLORS, SRCCOPY, StretchDIBits};
use winapi::um::winnt::{FILE_SHARE_READ, FILE_SHARE_WRITE, GENERIC_READ, GENERIC_WRITE, HANDLE};
use winapi::um::winuser::{GetDC, ReleaseDC};

/// Font cell used when the console reports a zero-sized font
const FALLBACK_CELL: CellSize = CellSize {
    width: 8,
    height: 16,
};

/// GDI device context of the console window
pub struct WindowSurface {
    hwnd: HWND,
    hdc: HDC,
}

impl WindowSurface {
    fn new(hwnd: HWND) -> Result<Self> {
        let hdc = unsafe { GetDC(hwnd) };
        if hdc.is_null() {
            return Err(OverlayError::attach("GetDC returned no device context"));
        }
        Ok(Self { hwnd, hdc })
    }
}

impl DrawSurface for WindowSurface {
    fn stretch_blit(&mut self, pixels: &[u32], src_width: u32, src_height: u32, dest: PixelRect) {
        let mut info: BITMAPINFO = unsafe { std::mem::zeroed() };
        info.bmiHeader.biSize = std::mem::size_of::<BITMAPINFOHEADER>() as DWORD;
        info.bmiHeader.biWidth = src_width as i32;
        // negative height: rows are stored top first
        info.bmiHeader.biHeight = -(src_height as i32);
        info.bmiHeader.biPlanes = 1;
        info.bmiHeader.biBitCount = 32;
        info.bmiHeader.biCompression = BI_RGB;

        let lines = unsafe {
            StretchDIBits(
                self.hdc,
                dest.x,
                dest.y,
                dest.width as i32,
                dest.height as i32,
                0,
                0,
                src_width as i32,
                src_height as i32,
                pixels.as_ptr().cast(),
                &info,
                DIB_RGB_COLORS,
                SRCCOPY,
            )
        };

        if lines == 0 {
            log::trace!("StretchDIBits drew nothing at {:?}", dest);
        }
    }
}

impl Drop for WindowSurface {
    fn drop(&mut self) {
        unsafe {
            ReleaseDC(self.hwnd, self.hdc);
        }
    }
}

/// The console of another process, attached to with `AttachConsole`
pub struct WindowsConsole {
    input: HANDLE,
    output: HANDLE,
    cell_size: CellSize,
    surface: WindowSurface,
}

impl WindowsConsole {
    /// Attach to the console owned by `pid` and open its buffers and window
    pub fn attach(pid: u32) -> Result<Self> {
        if unsafe { AttachConsole(pid) } == FALSE {
            return Err(OverlayError::attach(format!(
                "AttachConsole({}): {}",
                pid,
                std::io::Error::last_os_error()
            )));
        }

        let input = match open_console_file("CONIN$") {
            Ok(handle) => handle,
            Err(e) => {
                unsafe { FreeConsole() };
                return Err(e);
            }
        };
        let output = match open_console_file("CONOUT$") {
            Ok(handle) => handle,
            Err(e) => {
                unsafe {
                    CloseHandle(input);
                    FreeConsole();
                }
                return Err(e);
            }
        };

        let console = Self::bind(input, output);
        if console.is_err() {
            unsafe {
                CloseHandle(input);
                CloseHandle(output);
                FreeConsole();
            }
        }
        console
    }

    fn bind(input: HANDLE, output: HANDLE) -> Result<Self> {
        let hwnd = unsafe { GetConsoleWindow() };
        if hwnd.is_null() {
            return Err(OverlayError::attach("console has no window"));
        }
        let surface = WindowSurface::new(hwnd)?;

        let mut mode: DWORD = 0;
        unsafe {
            if GetConsoleMode(input, &mut mode) != FALSE {
                SetConsoleMode(input, mode | ENABLE_WINDOW_INPUT);
            }
            // keep Ctrl+C in the shared console from ending the overlay
            SetConsoleCtrlHandler(Some(ignore_ctrl_event), TRUE);
        }

        let mut font: CONSOLE_FONT_INFO = unsafe { std::mem::zeroed() };
        let cell_size = if unsafe { GetCurrentConsoleFont(output, FALSE, &mut font) } != FALSE
            && font.dwFontSize.X > 0
            && font.dwFontSize.Y > 0
        {
            CellSize {
                width: font.dwFontSize.X as u32,
                height: font.dwFontSize.Y as u32,
            }
        } else {
            log::warn!("Console font size unavailable, assuming {:?}", FALLBACK_CELL);
            FALLBACK_CELL
        };

        Ok(Self {
            input,
            output,
            cell_size,
            surface,
        })
    }
}

impl Drop for WindowsConsole {
    fn drop(&mut self) {
        unsafe {
            CloseHandle(self.input);
            CloseHandle(self.output);
            FreeConsole();
        }
    }
}

impl ConsoleHost for WindowsConsole {
    fn metrics(&mut self) -> Result<ViewportMetrics> {
        let mut info: CONSOLE_SCREEN_BUFFER_INFO = unsafe { std::mem::zeroed() };
        if unsafe { GetConsoleScreenBufferInfo(self.output, &mut info) } == FALSE {
            return Err(OverlayError::last_os_error("GetConsoleScreenBufferInfo"));
        }

        Ok(ViewportMetrics {
            window: WindowRect {
                left: to_index(info.srWindow.Left),
                top: to_index(info.srWindow.Top),
                right: to_index(info.srWindow.Right),
                bottom: to_index(info.srWindow.Bottom),
            },
            buffer_size: BufferSize {
                cols: to_index(info.dwSize.X),
                rows: to_index(info.dwSize.Y),
            },
            cursor: Coord::new(
                to_index(info.dwCursorPosition.X),
                to_index(info.dwCursorPosition.Y),
            ),
        })
    }

    fn cell_size(&self) -> CellSize {
        self.cell_size
    }

    fn read_text(&mut self, origin: Coord, len: usize) -> Result<String> {
        let mut units = vec![0u16; len];
        let mut read: DWORD = 0;
        let ok = unsafe {
            ReadConsoleOutputCharacterW(
                self.output,
                units.as_mut_ptr(),
                len as DWORD,
                to_coord(origin)?,
                &mut read,
            )
        };
        if ok == FALSE {
            return Err(OverlayError::last_os_error("ReadConsoleOutputCharacterW"));
        }
        units.truncate(read as usize);

        // one char per cell, so character indices stay cell indices
        Ok(units.into_iter().map(unit_to_char).collect())
    }

    fn read_region(&mut self, region: CellRect) -> Result<Vec<Cell>> {
        let mut buffer: Vec<CHAR_INFO> = vec![unsafe { std::mem::zeroed() }; region.len()];
        let mut rect = to_small_rect(region)?;
        let requested = rect;

        let ok = unsafe {
            ReadConsoleOutputW(
                self.output,
                buffer.as_mut_ptr(),
                to_coord(Coord::new(region.width, region.height))?,
                COORD { X: 0, Y: 0 },
                &mut rect,
            )
        };
        if ok == FALSE {
            return Err(OverlayError::last_os_error("ReadConsoleOutputW"));
        }
        if !same_rect(&rect, &requested) {
            return Err(OverlayError::terminal("console returned a partial region"));
        }

        Ok(buffer
            .iter()
            .map(|info| Cell::from_unit(unsafe { *info.Char.UnicodeChar() }, info.Attributes))
            .collect())
    }

    fn write_region(&mut self, region: CellRect, cells: &[Cell]) -> Result<()> {
        if cells.len() != region.len() {
            return Err(OverlayError::terminal("region size mismatch"));
        }

        let buffer: Vec<CHAR_INFO> = cells
            .iter()
            .map(|cell| {
                let mut info: CHAR_INFO = unsafe { std::mem::zeroed() };
                unsafe {
                    *info.Char.UnicodeChar_mut() = cell.unit();
                }
                info.Attributes = cell.attributes;
                info
            })
            .collect();

        let mut rect = to_small_rect(region)?;
        let requested = rect;
        let ok = unsafe {
            WriteConsoleOutputW(
                self.output,
                buffer.as_ptr(),
                to_coord(Coord::new(region.width, region.height))?,
                COORD { X: 0, Y: 0 },
                &mut rect,
            )
        };
        if ok == FALSE {
            return Err(OverlayError::last_os_error("WriteConsoleOutputW"));
        }
        if !same_rect(&rect, &requested) {
            log::warn!("Console clipped the spliced region to {:?}", (rect.Top, rect.Bottom));
        }
        Ok(())
    }

    fn set_cursor(&mut self, pos: Coord) -> Result<()> {
        if unsafe { SetConsoleCursorPosition(self.output, to_coord(pos)?) } == FALSE {
            return Err(OverlayError::last_os_error("SetConsoleCursorPosition"));
        }
        Ok(())
    }

    fn poll_input(&mut self, max: usize) -> Result<Vec<InputEvent>> {
        let mut pending: DWORD = 0;
        if unsafe { GetNumberOfConsoleInputEvents(self.input, &mut pending) } == FALSE {
            return Err(OverlayError::last_os_error("GetNumberOfConsoleInputEvents"));
        }
        if pending == 0 || max == 0 {
            return Ok(Vec::new());
        }

        // Peek rather than read: the shell owns the input queue. Records stay
        // queued, so a busy shell shows us the same batch again next tick.
        let mut records: Vec<INPUT_RECORD> = vec![unsafe { std::mem::zeroed() }; max];
        let mut count: DWORD = 0;
        if unsafe { PeekConsoleInputW(self.input, records.as_mut_ptr(), max as DWORD, &mut count) }
            == FALSE
        {
            return Err(OverlayError::last_os_error("PeekConsoleInputW"));
        }
        records.truncate(count as usize);

        Ok(records.iter().map(to_input_event).collect())
    }

    fn surface(&mut self) -> &mut dyn DrawSurface {
        &mut self.surface
    }
}

unsafe extern "system" fn ignore_ctrl_event(_ctrl_type: DWORD) -> BOOL {
    TRUE
}

fn open_console_file(name: &str) -> Result<HANDLE> {
    let wide: Vec<u16> = OsStr::new(name).encode_wide().chain(Some(0)).collect();
    let handle = unsafe {
        CreateFileW(
            wide.as_ptr(),
            GENERIC_READ | GENERIC_WRITE,
            FILE_SHARE_READ | FILE_SHARE_WRITE,
            ptr::null_mut(),
            OPEN_EXISTING,
            0,
            ptr::null_mut(),
        )
    };
    if handle == INVALID_HANDLE_VALUE {
        return Err(OverlayError::attach(format!(
            "CreateFileW({}): {}",
            name,
            std::io::Error::last_os_error()
        )));
    }
    Ok(handle)
}

fn to_input_event(record: &INPUT_RECORD) -> InputEvent {
    match record.EventType {
        KEY_EVENT => InputEvent::Key {
            pressed: unsafe { record.Event.KeyEvent() }.bKeyDown != FALSE,
        },
        WINDOW_BUFFER_SIZE_EVENT => {
            let size = unsafe { record.Event.WindowBufferSizeEvent() }.dwSize;
            InputEvent::BufferResized {
                cols: to_index(size.X),
                rows: to_index(size.Y),
            }
        }
        MOUSE_EVENT => InputEvent::Mouse,
        FOCUS_EVENT => InputEvent::Focus,
        _ => InputEvent::Other,
    }
}

fn to_index(value: i16) -> usize {
    value.max(0) as usize
}

fn to_coord(pos: Coord) -> Result<COORD> {
    let x = i16::try_from(pos.x).map_err(|_| OverlayError::terminal("column out of range"))?;
    let y = i16::try_from(pos.y).map_err(|_| OverlayError::terminal("row out of range"))?;
    Ok(COORD { X: x, Y: y })
}

fn to_small_rect(region: CellRect) -> Result<SMALL_RECT> {
    let top_left = to_coord(Coord::new(region.left, region.top))?;
    let bottom_right = to_coord(Coord::new(
        region.left + region.width.saturating_sub(1),
        region.top + region.height.saturating_sub(1),
    ))?;
    Ok(SMALL_RECT {
        Left: top_left.X,
        Top: top_left.Y,
        Right: bottom_right.X,
        Bottom: bottom_right.Y,
    })
}

fn same_rect(a: &SMALL_RECT, b: &SMALL_RECT) -> bool {
    a.Left == b.Left && a.Top == b.Top && a.Right == b.Right && a.Bottom == b.Bottom
}

fn unit_to_char(unit: u16) -> char {
    char::from_u32(u32::from(unit)).unwrap_or(char::REPLACEMENT_CHARACTER)
}
