// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// End-to-end print pipeline: document -> pixel grid -> bitmap -> command
// stream -> printer.
//
// Encoding is synchronous and CPU bound; the async entry points move it onto
// the blocking pool so only the transport runs on the reactor. The whole
// stream is built before the socket is opened, so a failed encode never puts
// a partial image on paper.

use chrono::Utc;
use sha2::{Digest, Sha256};
use tracing::{info, instrument};

use escbridge_core::error::{PrintError, Result};
use escbridge_core::types::{
    CodePage, Destination, GrayscaleFormula, JobId, PrintJob, PrintMode, SourceDocument,
};
use escbridge_document::{Rasterizer, RenderOptions};

use crate::bitmap::{DEFAULT_THRESHOLD, MonochromeBitmap};
use crate::framer::{PrinterCommandStream, framer_for};
use crate::raw_client::{TransportOptions, send_to_printer};
use crate::text::frame_text;

/// Everything that shapes the bytes of an image job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodeOptions {
    pub mode: PrintMode,
    pub render: RenderOptions,
    /// Gray levels strictly below this print. Clamped to `0..=255`.
    pub threshold: i32,
    pub grayscale: GrayscaleFormula,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            mode: PrintMode::default(),
            render: RenderOptions::default(),
            threshold: DEFAULT_THRESHOLD,
            grayscale: GrayscaleFormula::default(),
        }
    }
}

/// Rasterize, threshold and frame `document`.
///
/// Re-encoding the same document with the same options gives the same bytes.
#[instrument(skip(rasterizer, document), fields(kind = ?document.kind()))]
pub fn encode_document(
    rasterizer: &Rasterizer,
    document: &SourceDocument,
    options: &EncodeOptions,
) -> Result<PrinterCommandStream> {
    let grid = rasterizer.rasterize(document, &options.render)?;
    let bitmap = MonochromeBitmap::from_grid(&grid, options.threshold, options.grayscale)?;
    framer_for(options.mode).frame(&bitmap)
}

/// Describe the job that will carry `stream` to `destination`.
pub fn job_for(
    destination: Destination,
    mode: Option<PrintMode>,
    stream: &PrinterCommandStream,
) -> PrintJob {
    PrintJob {
        id: JobId::new(),
        destination,
        mode,
        payload_hash: hex::encode(Sha256::digest(stream.as_bytes())),
        total_bytes: stream.len() as u64,
        created_at: Utc::now(),
    }
}

/// Transmit an already-framed job.
#[instrument(skip(job, stream, transport), fields(job_id = %job.id, addr = %job.destination))]
pub async fn send_job(
    job: &PrintJob,
    stream: &PrinterCommandStream,
    transport: TransportOptions,
) -> Result<()> {
    send_to_printer(
        &job.destination.host,
        job.destination.port,
        stream.as_bytes(),
        transport,
    )
    .await?;
    info!(
        bytes = job.total_bytes,
        payload_hash = %job.payload_hash,
        "print job delivered"
    );
    Ok(())
}

/// Encode `document` off the reactor, then send it to `destination`.
pub async fn print_document(
    rasterizer: Rasterizer,
    document: SourceDocument,
    options: EncodeOptions,
    destination: Destination,
    transport: TransportOptions,
) -> Result<PrintJob> {
    let stream = tokio::task::spawn_blocking(move || {
        encode_document(&rasterizer, &document, &options)
    })
    .await
    .map_err(|e| PrintError::Encoding(format!("encoder task failed: {e}")))??;

    let job = job_for(destination, Some(options.mode), &stream);
    send_job(&job, &stream, transport).await?;
    Ok(job)
}

/// Frame `text` as a receipt in `page` and send it to `destination`.
pub async fn print_text(
    text: &str,
    page: CodePage,
    destination: Destination,
    transport: TransportOptions,
) -> Result<PrintJob> {
    let stream = frame_text(text, page)?;
    let job = job_for(destination, None, &stream);
    send_job(&job, &stream, transport).await?;
    Ok(job)
}
