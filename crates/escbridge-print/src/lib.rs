// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// escbridge print: thresholding, ESC/POS framing, raw TCP delivery, and the
// printer registry. Sits between the pixel grids produced by
// `escbridge-document` and the printers on the network.

pub mod bitmap;
pub mod framer;
pub mod pipeline;
pub mod raw_client;
pub mod registry;
pub mod text;

pub use bitmap::MonochromeBitmap;
pub use framer::{CommandFramer, PrinterCommandStream, RasterBlockFramer, StripedFramer, framer_for};
pub use pipeline::{EncodeOptions, encode_document, print_document, print_text};
pub use raw_client::{TransportOptions, probe, send_to_printer};
pub use registry::{InMemoryPrinterRegistry, PrinterRegistry, SqlitePrinterRegistry};
