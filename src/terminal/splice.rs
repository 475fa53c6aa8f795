//! In-place shifting of a console cell snapshot to open up rows for an image.
//!
//! A splice runs three steps in a fixed order: the text after the marker is
//! moved forward, the marker and the reserved rows are blanked, then the row
//! under the reserved block is pulled back to column zero. Blanking before the
//! move would destroy the text that is about to be moved.

use crate::terminal::host::Cell;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SpliceError {
    #[error("region width is zero")]
    ZeroWidth,

    #[error("marker at {index} (+{len}) lies outside a region of {region} cells")]
    MarkerOutOfBounds {
        index: usize,
        len: usize,
        region: usize,
    },
}

/// Reserve `reserved_rows` rows in `region` at the marker starting at cell
/// `marker_index`, keeping the text that follows it.
///
/// `region` is row-major with rows of `width` cells. Text pushed past the end
/// of the region is dropped. On error the region is left untouched.
pub fn splice(
    region: &mut [Cell],
    width: usize,
    marker_index: usize,
    marker_len: usize,
    reserved_rows: usize,
) -> Result<(), SpliceError> {
    if width == 0 {
        return Err(SpliceError::ZeroWidth);
    }

    if marker_len == 0 || marker_index + marker_len > region.len() {
        return Err(SpliceError::MarkerOutOfBounds {
            index: marker_index,
            len: marker_len,
            region: region.len(),
        });
    }

    let distance = shift_distance(width, marker_len, reserved_rows);

    shift_tail(region, marker_index, marker_len, distance);
    blank_block(region, marker_index, distance);
    compact_row(region, width, marker_index / width + reserved_rows);

    log::debug!(
        "Spliced region of {} cells: marker at {}, shifted tail by {}",
        region.len(),
        marker_index,
        distance
    );

    Ok(())
}

/// Forward shift that clears the marker and `reserved_rows` full rows
pub fn shift_distance(width: usize, marker_len: usize, reserved_rows: usize) -> usize {
    marker_len + reserved_rows * width
}

/// Move everything after the marker forward so it starts at `marker_index + distance`
fn shift_tail(region: &mut [Cell], marker_index: usize, marker_len: usize, distance: usize) {
    let dest = marker_index + distance;
    if dest >= region.len() {
        return;
    }

    let src = marker_index + marker_len;
    let count = region.len() - dest;

    // copy_within is memmove: the overlapping forward copy is safe
    region.copy_within(src..src + count, dest);
}

fn blank_block(region: &mut [Cell], marker_index: usize, distance: usize) {
    let end = (marker_index + distance).min(region.len());
    for cell in &mut region[marker_index..end] {
        cell.clear();
    }
}

/// Slide the first non-blank run of `row` to column zero and blank the vacated tail
fn compact_row(region: &mut [Cell], width: usize, row: usize) {
    let start = row * width;
    if start >= region.len() {
        return;
    }
    let end = (start + width).min(region.len());
    let line = &mut region[start..end];

    let Some(first) = line.iter().position(|cell| !cell.is_blank()) else {
        return;
    };
    if first == 0 {
        return;
    }

    let kept = line.len() - first;
    line.copy_within(first.., 0);
    for cell in &mut line[kept..] {
        cell.clear();
    }
}
