// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// ESC/POS command framing for monochrome bitmaps.
//
// Two framings are supported:
//
// - `ESC * 33` (24-dot double density): the image is cut into 24-row strips,
//   each sent column-major with three bytes per column and ended by a line
//   feed. Understood by practically every ESC/POS clone.
// - `GS v 0` raster bit image: the packed rows go out as a single block.
//   Faster, but some cheap printers ignore it.
//
// Every stream starts with `ESC @` and ends with a three-line feed followed by
// a full cut.

use escbridge_core::error::{PrintError, Result};
use escbridge_core::types::PrintMode;
use tracing::{debug, instrument};

use crate::bitmap::MonochromeBitmap;

/// Rows per `ESC *` strip in 24-dot mode.
pub const STRIP_HEIGHT: u32 = 24;

/// Largest value a little-endian 16-bit size field can carry.
const MAX_FIELD: u32 = u16::MAX as u32;

/// Raw ESC/POS command bytes.
pub mod commands {
    /// `ESC @`: reset the printer.
    pub const INIT: [u8; 2] = [0x1B, 0x40];
    /// `ESC * 33`: 24-dot double-density bit image; width follows.
    pub const BIT_IMAGE_24: [u8; 3] = [0x1B, 0x2A, 0x21];
    /// `GS v 0` with normal scaling; x and y sizes follow.
    pub const RASTER_IMAGE: [u8; 4] = [0x1D, 0x76, 0x30, 0x00];
    /// `ESC t`: select character code table; table number follows.
    pub const SELECT_CODE_TABLE: [u8; 2] = [0x1B, 0x74];
    /// `LF`.
    pub const LINE_FEED: u8 = 0x0A;
    /// `ESC d 3`: print and feed three lines.
    pub const FEED_3: [u8; 3] = [0x1B, 0x64, 0x03];
    /// `GS V 0`: full cut.
    pub const FULL_CUT: [u8; 3] = [0x1D, 0x56, 0x00];
}

/// Bytes ready for the wire. Opaque to everything except the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrinterCommandStream(Vec<u8>);

impl PrinterCommandStream {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl AsRef<[u8]> for PrinterCommandStream {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Accumulates one command stream. Always opens with `ESC @`.
#[derive(Debug)]
pub struct CommandBuilder {
    buf: Vec<u8>,
}

impl CommandBuilder {
    pub fn with_capacity(capacity: usize) -> Self {
        let mut buf = Vec::with_capacity(capacity + commands::INIT.len());
        buf.extend_from_slice(&commands::INIT);
        Self { buf }
    }

    pub fn raw(&mut self, bytes: &[u8]) -> &mut Self {
        self.buf.extend_from_slice(bytes);
        self
    }

    pub fn byte(&mut self, byte: u8) -> &mut Self {
        self.buf.push(byte);
        self
    }

    /// Little-endian 16-bit size field.
    pub fn u16_le(&mut self, value: u16) -> &mut Self {
        self.buf.extend_from_slice(&value.to_le_bytes());
        self
    }

    pub fn line_feed(&mut self) -> &mut Self {
        self.byte(commands::LINE_FEED)
    }

    /// Feed three lines, then cut, and hand the stream over.
    pub fn finish(mut self) -> PrinterCommandStream {
        self.buf.extend_from_slice(&commands::FEED_3);
        self.buf.extend_from_slice(&commands::FULL_CUT);
        PrinterCommandStream(self.buf)
    }
}

/// A way of turning a bitmap into printer commands.
pub trait CommandFramer: Send + Sync {
    /// Which [`PrintMode`] this framer implements.
    fn mode(&self) -> PrintMode;

    /// Frame `bitmap`. Deterministic: the same bitmap always gives the same
    /// bytes.
    fn frame(&self, bitmap: &MonochromeBitmap) -> Result<PrinterCommandStream>;
}

/// Pick the framer for `mode`.
pub fn framer_for(mode: PrintMode) -> Box<dyn CommandFramer> {
    match mode {
        PrintMode::Striped => Box::new(StripedFramer),
        PrintMode::RasterBlock => Box::new(RasterBlockFramer),
    }
}

fn size_field(name: &str, value: u64) -> Result<u16> {
    if value > MAX_FIELD as u64 {
        return Err(PrintError::Encoding(format!(
            "{name} {value} does not fit a 16-bit size field"
        )));
    }
    Ok(value as u16)
}

// ---------------------------------------------------------------------------
// ESC * 33
// ---------------------------------------------------------------------------

/// `ESC * 33` strips, 24 rows each.
#[derive(Debug, Clone, Copy, Default)]
pub struct StripedFramer;

impl StripedFramer {
    /// Column-major 24-dot data for the strip starting at row `top`.
    fn pack_strip(bitmap: &MonochromeBitmap, top: u32, out: &mut CommandBuilder) {
        for x in 0..bitmap.width() {
            for band in 0..3u32 {
                let mut byte = 0u8;
                for bit in 0..8u32 {
                    if bitmap.is_black(x, top + band * 8 + bit) {
                        byte |= 0x80 >> bit;
                    }
                }
                out.byte(byte);
            }
        }
    }
}

impl CommandFramer for StripedFramer {
    fn mode(&self) -> PrintMode {
        PrintMode::Striped
    }

    #[instrument(skip_all, fields(width = bitmap.width(), height = bitmap.height()))]
    fn frame(&self, bitmap: &MonochromeBitmap) -> Result<PrinterCommandStream> {
        let width = size_field("width", bitmap.width() as u64)?;
        size_field("height", bitmap.height() as u64)?;

        let strips = bitmap.height().div_ceil(STRIP_HEIGHT);
        let per_strip = commands::BIT_IMAGE_24.len() + 2 + bitmap.width() as usize * 3 + 1;
        let mut out = CommandBuilder::with_capacity(per_strip * strips as usize + 6);

        for strip in 0..strips {
            out.raw(&commands::BIT_IMAGE_24).u16_le(width);
            Self::pack_strip(bitmap, strip * STRIP_HEIGHT, &mut out);
            out.line_feed();
        }

        let stream = out.finish();
        debug!(strips, bytes = stream.len(), "striped stream framed");
        Ok(stream)
    }
}

// ---------------------------------------------------------------------------
// GS v 0
// ---------------------------------------------------------------------------

/// One `GS v 0` block carrying the whole bitmap.
#[derive(Debug, Clone, Copy, Default)]
pub struct RasterBlockFramer;

impl CommandFramer for RasterBlockFramer {
    fn mode(&self) -> PrintMode {
        PrintMode::RasterBlock
    }

    #[instrument(skip_all, fields(width = bitmap.width(), height = bitmap.height()))]
    fn frame(&self, bitmap: &MonochromeBitmap) -> Result<PrinterCommandStream> {
        // Field x counts bytes, not dots.
        let x = size_field("bytes per row", bitmap.bytes_per_row() as u64)?;
        let y = size_field("height", bitmap.height() as u64)?;

        let payload = bitmap.as_bytes();
        let mut out = CommandBuilder::with_capacity(payload.len() + 16);
        out.raw(&commands::RASTER_IMAGE)
            .u16_le(x)
            .u16_le(y)
            .raw(payload);

        let stream = out.finish();
        debug!(bytes = stream.len(), "raster block framed");
        Ok(stream)
    }
}
