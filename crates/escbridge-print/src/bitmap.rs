// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Grayscale thresholding and 1-bit packing.
//
// Layout of a packed bitmap: row-major, `ceil(width / 8)` bytes per row, the
// leftmost pixel in the most significant bit. A set bit burns a dot. Bits past
// `width` in the last byte of a row are always zero.

use escbridge_core::error::{PrintError, Result};
use escbridge_core::types::GrayscaleFormula;
use escbridge_document::{PixelFormat, PixelGrid};
use tracing::{debug, instrument};

/// Threshold used when the caller does not supply one.
pub const DEFAULT_THRESHOLD: i32 = 128;

/// A packed 1-bit image, ready for framing. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonochromeBitmap {
    width: u32,
    height: u32,
    bytes_per_row: usize,
    data: Vec<u8>,
}

impl MonochromeBitmap {
    /// Threshold `grid` into a bitmap.
    ///
    /// A pixel prints when its gray level is strictly below `threshold`.
    /// Out-of-range thresholds are clamped to `0..=255` rather than rejected,
    /// so 0 yields an empty bitmap and 255 prints everything but pure white.
    #[instrument(skip(grid), fields(width = grid.width(), height = grid.height()))]
    pub fn from_grid(grid: &PixelGrid, threshold: i32, formula: GrayscaleFormula) -> Result<Self> {
        let (width, height) = (grid.width(), grid.height());
        if width == 0 || height == 0 {
            return Err(PrintError::InvalidDimensions { width, height });
        }

        let cutoff = threshold.clamp(0, 255) as u16;
        let bytes_per_row = packed_row_len(width);
        let mut data = vec![0u8; bytes_per_row * height as usize];
        let channels = grid.format().channels();

        for (y, out_row) in data.chunks_exact_mut(bytes_per_row).enumerate() {
            let row = grid.row(y as u32);
            for (x, pixel) in row.chunks_exact(channels).enumerate() {
                let gray = match grid.format() {
                    PixelFormat::Gray => pixel[0] as u16,
                    PixelFormat::Rgb => gray_level(pixel[0], pixel[1], pixel[2], formula),
                };
                if gray < cutoff {
                    out_row[x / 8] |= 0x80 >> (x % 8);
                }
            }
        }

        debug!(cutoff, ?formula, bytes = data.len(), "bitmap packed");
        Ok(Self {
            width,
            height,
            bytes_per_row,
            data,
        })
    }

    /// Wrap already-packed rows. Padding bits are cleared.
    pub fn from_packed(width: u32, height: u32, mut data: Vec<u8>) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(PrintError::InvalidDimensions { width, height });
        }
        let bytes_per_row = packed_row_len(width);
        if data.len() != bytes_per_row * height as usize {
            return Err(PrintError::Encoding(format!(
                "{} packed bytes cannot hold a {}x{} bitmap ({} needed)",
                data.len(),
                width,
                height,
                bytes_per_row * height as usize
            )));
        }
        let tail = (width % 8) as u8;
        if tail != 0 {
            let mask = !(0xFFu8 >> tail);
            for row in data.chunks_exact_mut(bytes_per_row) {
                row[bytes_per_row - 1] &= mask;
            }
        }
        Ok(Self {
            width,
            height,
            bytes_per_row,
            data,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn bytes_per_row(&self) -> usize {
        self.bytes_per_row
    }

    /// The packed payload, `bytes_per_row * height` bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Whether the dot at (`x`, `y`) prints. Coordinates outside the bitmap
    /// read as white.
    pub fn is_black(&self, x: u32, y: u32) -> bool {
        if x >= self.width || y >= self.height {
            return false;
        }
        let byte = self.data[y as usize * self.bytes_per_row + x as usize / 8];
        byte & (0x80 >> (x % 8)) != 0
    }
}

/// `ceil(width / 8)`.
pub fn packed_row_len(width: u32) -> usize {
    width.div_ceil(8) as usize
}

fn gray_level(r: u8, g: u8, b: u8, formula: GrayscaleFormula) -> u16 {
    let (r, g, b) = (r as u32, g as u32, b as u32);
    let level = match formula {
        GrayscaleFormula::Average => (r + g + b) / 3,
        GrayscaleFormula::Luma => (299 * r + 587 * g + 114 * b + 500) / 1000,
    };
    level as u16
}
