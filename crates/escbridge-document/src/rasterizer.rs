// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Document rasterizer: one page of a PDF, or a raster image, in; a pixel grid
// exactly `target_width` dots wide out.

use escbridge_core::error::{PrintError, Result};
use escbridge_core::types::{DocumentKind, SourceDocument};
use tracing::{debug, info, instrument};

use crate::grid::PixelGrid;
use crate::image::processor::{ImageProcessor, check_bounds};
use crate::pdf::reader::{PageSize, PdfReader};
use crate::pdf::render::{PdfRenderer, RenderScale};

/// Dot width of an 80mm head at 203 DPI.
pub const DEFAULT_TARGET_WIDTH: u32 = 576;

/// Highest PDF render resolution accepted.
pub const MAX_DPI: u32 = 1200;

/// Parameters for one rasterization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderOptions {
    /// Output width in printer dots (384 for 58mm, 576 for 80mm heads).
    pub target_width: u32,
    /// Render PDFs at this resolution first, then resample to the target
    /// width. Without it the page is rendered straight at the target width.
    pub dpi: Option<u32>,
    /// Which PDF page to print, 0-indexed. Ignored for images.
    pub page_index: usize,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            target_width: DEFAULT_TARGET_WIDTH,
            dpi: None,
            page_index: 0,
        }
    }
}

impl RenderOptions {
    pub fn with_width(target_width: u32) -> Self {
        Self {
            target_width,
            ..Self::default()
        }
    }
}

/// Turns [`SourceDocument`]s into [`PixelGrid`]s.
#[derive(Debug, Clone, Default)]
pub struct Rasterizer {
    pdf: PdfRenderer,
}

impl Rasterizer {
    pub fn new(pdf: PdfRenderer) -> Self {
        Self { pdf }
    }

    /// Rasterize `document` at a uniform scale of
    /// `target_width / native width`, preserving aspect ratio.
    ///
    /// # Errors
    ///
    /// - [`PrintError::InvalidDimensions`] for a zero target width.
    /// - [`PrintError::InvalidInput`] for a DPI hint above [`MAX_DPI`].
    /// - [`PrintError::Encoding`] when the scaled output, or an intermediate
    ///   PDF render, would exceed the size limits. Checked before rendering.
    /// - [`PrintError::EmptyDocument`] for a PDF without pages.
    /// - [`PrintError::Render`] for undecodable input, a page index past the
    ///   end of the document, or a failed external render.
    #[instrument(skip(self, document), fields(kind = ?document.kind(), bytes = document.bytes().len()))]
    pub fn rasterize(&self, document: &SourceDocument, options: &RenderOptions) -> Result<PixelGrid> {
        if options.target_width == 0 {
            return Err(PrintError::InvalidDimensions {
                width: 0,
                height: 0,
            });
        }
        if options.dpi.is_some_and(|dpi| dpi > MAX_DPI) {
            return Err(PrintError::InvalidInput(format!(
                "dpi must be at most {MAX_DPI}"
            )));
        }
        check_bounds(options.target_width, 1)?;

        let processor = match document.kind() {
            DocumentKind::Pdf => self.render_pdf(document.bytes(), options)?,
            DocumentKind::RasterImage => ImageProcessor::from_bytes(document.bytes())?,
        };

        let grid = processor
            .flatten_alpha()
            .fit_width(options.target_width)?
            .to_pixel_grid();

        info!(
            width = grid.width(),
            height = grid.height(),
            "document rasterized"
        );
        Ok(grid)
    }

    fn render_pdf(&self, bytes: &[u8], options: &RenderOptions) -> Result<ImageProcessor> {
        let reader = PdfReader::from_bytes(bytes)?;
        let pages = reader.page_count();
        if pages == 0 {
            return Err(PrintError::EmptyDocument);
        }
        let size = reader.page_size(options.page_index)?;

        let scale = options.target_width as f64 / size.width_pt;
        debug!(
            pages,
            page_index = options.page_index,
            width_pt = size.width_pt,
            height_pt = size.height_pt,
            scale,
            "rendering PDF page"
        );

        let render_scale = match options.dpi {
            Some(dpi) if dpi > 0 => RenderScale::Dpi(dpi),
            _ => RenderScale::Width(options.target_width),
        };
        check_bounds(options.target_width, height_at(size, options.target_width))?;
        if let RenderScale::Dpi(dpi) = render_scale {
            let px = |pt: f64| (pt * dpi as f64 / 72.0).ceil() as u32;
            check_bounds(px(size.width_pt), px(size.height_pt))?;
        }
        let image = self
            .pdf
            .render_page(bytes, options.page_index, render_scale)?;
        Ok(ImageProcessor::from_dynamic(image))
    }
}

/// Pixel height of `size` rendered `width` pixels across.
fn height_at(size: PageSize, width: u32) -> u32 {
    ((size.height_pt * width as f64 / size.width_pt).round() as u32).max(1)
}
