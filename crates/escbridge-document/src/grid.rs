// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Pixel grid: the device-resolution image handed to the thresholder.

use escbridge_core::error::{PrintError, Result};
use image::DynamicImage;

/// Channel layout of a [`PixelGrid`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// One intensity byte per pixel.
    Gray,
    /// Three bytes per pixel, R then G then B.
    Rgb,
}

impl PixelFormat {
    pub fn channels(self) -> usize {
        match self {
            Self::Gray => 1,
            Self::Rgb => 3,
        }
    }
}

/// Row-major pixel buffer at device resolution.
///
/// Owned by the encoding call that produced it and dropped once packed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelGrid {
    width: u32,
    height: u32,
    format: PixelFormat,
    data: Vec<u8>,
}

impl PixelGrid {
    /// Wrap a raw buffer. The length must be `width * height * channels`.
    pub fn new(width: u32, height: u32, format: PixelFormat, data: Vec<u8>) -> Result<Self> {
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|n| n.checked_mul(format.channels()))
            .ok_or(PrintError::InvalidDimensions { width, height })?;
        if data.len() != expected {
            return Err(PrintError::Render(format!(
                "pixel buffer is {} bytes, {}x{} {:?} needs {}",
                data.len(),
                width,
                height,
                format,
                expected
            )));
        }
        Ok(Self {
            width,
            height,
            format,
            data,
        })
    }

    /// A grid where every pixel has the same gray level.
    pub fn filled_gray(width: u32, height: u32, level: u8) -> Self {
        Self {
            width,
            height,
            format: PixelFormat::Gray,
            data: vec![level; width as usize * height as usize],
        }
    }

    /// A grid where every pixel has the same colour.
    pub fn filled_rgb(width: u32, height: u32, rgb: [u8; 3]) -> Self {
        let mut data = Vec::with_capacity(width as usize * height as usize * 3);
        for _ in 0..width as usize * height as usize {
            data.extend_from_slice(&rgb);
        }
        Self {
            width,
            height,
            format: PixelFormat::Rgb,
            data,
        }
    }

    /// Take an RGB copy of a decoded image. Alpha must already be flattened.
    pub fn from_dynamic(image: &DynamicImage) -> Self {
        let rgb = image.to_rgb8();
        let (width, height) = rgb.dimensions();
        Self {
            width,
            height,
            format: PixelFormat::Rgb,
            data: rgb.into_raw(),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    /// Row `y` as raw channel bytes.
    pub fn row(&self, y: u32) -> &[u8] {
        let stride = self.width as usize * self.format.channels();
        let start = y as usize * stride;
        &self.data[start..start + stride]
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }
}
