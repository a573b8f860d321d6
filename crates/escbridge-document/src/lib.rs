// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// escbridge-document: turns input documents into device-resolution pixel
// grids.
//
// Provides PDF inspection (page count, page geometry) and rendering through an
// external rasterizer, image decoding and width-fitting, and the `Rasterizer`
// that picks between them.

pub mod grid;
pub mod image;
pub mod pdf;
pub mod rasterizer;

// Re-export the primary structs so callers can use `escbridge_document::PdfReader` etc.
pub use grid::{PixelFormat, PixelGrid};
pub use crate::image::processor::ImageProcessor;
pub use pdf::reader::PdfReader;
pub use pdf::render::PdfRenderer;
pub use rasterizer::{RenderOptions, Rasterizer};
