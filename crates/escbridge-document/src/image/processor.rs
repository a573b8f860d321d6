// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Image processor: decode, flatten transparency onto paper white, and scale
// to the print head's dot width. Operates on in-memory images using the
// `image` crate.

use std::io::Cursor;

use escbridge_core::error::{PrintError, Result};
use image::{DynamicImage, ImageReader, Limits, Rgba, RgbaImage};
use tracing::{debug, info, instrument};

use crate::grid::PixelGrid;

/// Largest width or height an ESC/POS 16-bit size field can describe.
pub const MAX_DIMENSION: u32 = u16::MAX as u32;

/// Upper bound on the pixel count of a scaled image.
pub const MAX_PIXELS: u64 = 64 * 1024 * 1024;

/// Allocation ceiling for decoding untrusted input.
const DECODE_ALLOC_LIMIT: u64 = 256 * 1024 * 1024;

/// Reject a `width`x`height` output before a buffer that size exists.
pub fn check_bounds(width: u32, height: u32) -> Result<()> {
    if width > MAX_DIMENSION || height > MAX_DIMENSION {
        return Err(PrintError::Encoding(format!(
            "{width}x{height} exceeds the {MAX_DIMENSION}-dot command limit"
        )));
    }
    if width as u64 * height as u64 > MAX_PIXELS {
        return Err(PrintError::Encoding(format!(
            "{width}x{height} exceeds the {MAX_PIXELS}-pixel working limit"
        )));
    }
    Ok(())
}

/// Image preparation pipeline operating on a single in-memory image.
///
/// Each transformation consumes `self` and returns a new `ImageProcessor`,
/// enabling method chaining.
///
/// ```ignore
/// let grid = ImageProcessor::from_bytes(&png)?
///     .flatten_alpha()
///     .fit_width(576)?
///     .to_pixel_grid();
/// ```
pub struct ImageProcessor {
    /// The current working image.
    image: DynamicImage,
}

impl ImageProcessor {
    // -- Construction ---------------------------------------------------------

    /// Create a processor from raw encoded bytes (JPEG, PNG, etc.).
    #[instrument(skip(data), fields(data_len = data.len()))]
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let mut reader = ImageReader::new(Cursor::new(data))
            .with_guessed_format()
            .map_err(|err| PrintError::Render(format!("failed to read image: {}", err)))?;
        let mut limits = Limits::default();
        limits.max_alloc = Some(DECODE_ALLOC_LIMIT);
        reader.limits(limits);
        let img = reader
            .decode()
            .map_err(|err| PrintError::Render(format!("failed to decode image: {}", err)))?;
        debug!(
            width = img.width(),
            height = img.height(),
            "Image decoded from bytes"
        );
        Ok(Self { image: img })
    }

    /// Wrap an already-decoded `DynamicImage`.
    pub fn from_dynamic(image: DynamicImage) -> Self {
        Self { image }
    }

    // -- Accessors ------------------------------------------------------------

    /// Current image width in pixels.
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    /// Current image height in pixels.
    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Consume the processor and return the underlying `DynamicImage`.
    pub fn into_dynamic(self) -> DynamicImage {
        self.image
    }

    // -- Transformations (consume self, return new Self) -----------------------

    /// Composite the image over white so transparent regions print as blank
    /// paper instead of whatever colour hides under alpha = 0.
    pub fn flatten_alpha(self) -> Self {
        if !self.image.color().has_alpha() {
            return self;
        }
        let rgba = self.image.to_rgba8();
        let flattened = RgbaImage::from_fn(rgba.width(), rgba.height(), |x, y| {
            let Rgba([r, g, b, a]) = *rgba.get_pixel(x, y);
            let over_white = |c: u8| -> u8 {
                let c = c as u32;
                let a = a as u32;
                ((c * a + 255 * (255 - a) + 127) / 255) as u8
            };
            Rgba([over_white(r), over_white(g), over_white(b), 255])
        });
        Self {
            image: DynamicImage::ImageRgb8(DynamicImage::ImageRgba8(flattened).to_rgb8()),
        }
    }

    /// Scale uniformly so the width equals `target_width` dots. The height
    /// follows from the same scale factor (rounded, never below one row).
    ///
    /// The output size is checked against [`check_bounds`] before resampling.
    #[instrument(skip(self), fields(target_width))]
    pub fn fit_width(self, target_width: u32) -> Result<Self> {
        let (w, h) = (self.image.width(), self.image.height());
        if target_width == 0 || w == 0 || h == 0 {
            return Err(PrintError::InvalidDimensions {
                width: target_width.min(w),
                height: h,
            });
        }
        let target_height = scaled_height(w, h, target_width);
        check_bounds(target_width, target_height)?;
        if (w, h) == (target_width, target_height) {
            return Ok(self);
        }
        info!(
            from_w = w,
            from_h = h,
            to_w = target_width,
            to_h = target_height,
            "Scaling image to head width"
        );
        let resized = self.image.resize_exact(
            target_width,
            target_height,
            image::imageops::FilterType::Lanczos3,
        );
        Ok(Self { image: resized })
    }

    // -- Output ---------------------------------------------------------------

    /// Copy the current image into an RGB [`PixelGrid`].
    pub fn to_pixel_grid(&self) -> PixelGrid {
        PixelGrid::from_dynamic(&self.image)
    }
}

/// Height of a `width`x`height` image scaled to `target_width`, preserving
/// aspect ratio.
pub fn scaled_height(width: u32, height: u32, target_width: u32) -> u32 {
    let scale = target_width as f64 / width as f64;
    ((height as f64 * scale).round() as u32).max(1)
}
