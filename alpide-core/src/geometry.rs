//! ALPIDE sensor geometry.
//!
//! The matrix is read out as 512 double columns grouped into 32 regions of
//! 16 double columns each. Inside a double column the priority encoder numbers
//! pixels 0..1024 in groups of four that snake across the two columns:
//!
//! ```text
//!   address % 4 | column | row
//!   ------------+--------+------------
//!        0      |  left  | addr/2 + 1
//!        1      |  right | addr/2
//!        2      |  right | addr/2
//!        3      |  left  | addr/2 - 1
//! ```

use crate::{Error, Result};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Highest valid region id.
pub const MAX_REGION: u32 = 31;
/// Region value meaning "no region header seen yet".
pub const NO_REGION: u32 = 32;
/// Double columns served by one region.
pub const DCOLS_PER_REGION: u32 = 16;
/// Highest valid double column id.
pub const MAX_DCOL: u32 = 511;
/// Highest valid pixel address inside a double column.
pub const MAX_ADDRESS: u32 = 1023;
/// Chip id that never belongs to a real chip.
pub const ILLEGAL_CHIP_ID: u32 = 15;
/// Highest valid chip id.
pub const MAX_CHIP_ID: u32 = 14;
/// Number of pixel columns on a chip.
pub const N_COLUMNS: u32 = (MAX_DCOL + 1) * 2;
/// Number of pixel rows on a chip.
pub const N_ROWS: u32 = (MAX_ADDRESS + 1) / 2;

/// Pixel position on the chip matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PixelCoord {
    /// Column, 0..1024.
    pub column: u32,
    /// Row, 0..512.
    pub row: u32,
}

impl PixelCoord {
    /// Creates a new pixel coordinate.
    #[inline]
    #[must_use]
    pub fn new(column: u32, row: u32) -> Self {
        Self { column, row }
    }
}

/// Double column reached by `encoder_id` inside `region`.
#[inline]
#[must_use]
pub fn double_column(region: u32, encoder_id: u32) -> u32 {
    region
        .saturating_mul(DCOLS_PER_REGION)
        .saturating_add(encoder_id)
}

/// Pixel column of `address` in `double_column`.
#[inline]
#[must_use]
pub fn column(double_column: u32, address: u32) -> u32 {
    let right = u32::from(matches!(address % 4, 1 | 2));
    double_column.saturating_mul(2).saturating_add(right)
}

/// Pixel row of `address`.
///
/// `address % 4 == 3` implies `address >= 3`, so the subtraction cannot wrap.
#[inline]
#[must_use]
pub fn row(address: u32) -> u32 {
    let row = address / 2;
    match address % 4 {
        0 => row + 1,
        3 => row - 1,
        _ => row,
    }
}

/// Maps a pixel position back to `(double_column, address)`.
///
/// # Errors
/// Returns [`Error::InvalidCoordinate`] if the position lies outside the matrix.
pub fn locate(coord: PixelCoord) -> Result<(u32, u32)> {
    if coord.column >= N_COLUMNS || coord.row >= N_ROWS {
        return Err(Error::InvalidCoordinate {
            column: coord.column,
            row: coord.row,
        });
    }

    let base = (coord.row / 2) * 4;
    let right = coord.column % 2 == 1;
    let offset = match (coord.row % 2 == 0, right) {
        (true, false) => 3,
        (true, true) => 1,
        (false, false) => 0,
        (false, true) => 2,
    };

    Ok((coord.column / 2, base + offset))
}
