// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// POST /print
//
// Always answers 200. Success or failure travels in the body as
// `{ success, error?, jobId? }` so thin frontends only ever parse one shape.

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use escbridge_core::error::{PrintError, Result};
use escbridge_core::types::{
    Destination, DocumentKind, GrayscaleFormula, JobId, PrintJob, PrintMode, SourceDocument,
};
use escbridge_document::RenderOptions;
use escbridge_document::image::processor::MAX_DIMENSION;
use escbridge_document::rasterizer::MAX_DPI;
use escbridge_print::{EncodeOptions, print_document, print_text};

use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrintRequest {
    pub ip_address: Option<String>,
    pub port: Option<u16>,
    /// Plain text receipt.
    pub content: Option<String>,
    /// Base64 raster image (PNG, JPEG), optionally as a data URI.
    pub content_base64: Option<String>,
    /// Base64 PDF, optionally as a data URI.
    pub pdf_base64: Option<String>,
    #[serde(default)]
    pub options: PrintRequestOptions,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrintRequestOptions {
    pub mode: Option<PrintMode>,
    /// Target width in dots.
    pub width: Option<u32>,
    pub threshold: Option<i32>,
    pub dpi: Option<u32>,
    /// PDF page to print, counting from 1.
    pub page: Option<usize>,
    pub grayscale: Option<GrayscaleFormula>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PrintResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
}

impl PrintResponse {
    fn delivered(id: &JobId) -> Self {
        Self {
            success: true,
            error: None,
            job_id: Some(id.to_string()),
        }
    }

    fn failed(err: &PrintError) -> Self {
        Self {
            success: false,
            error: Some(err.to_string()),
            job_id: None,
        }
    }
}

enum Payload {
    Text(String),
    Document(SourceDocument),
}

pub async fn print(State(state): State<AppState>, body: Bytes) -> Json<PrintResponse> {
    match handle(&state, &body).await {
        Ok(job) => {
            info!(job_id = %job.id, addr = %job.destination, bytes = job.total_bytes, "print request served");
            Json(PrintResponse::delivered(&job.id))
        }
        Err(e) => {
            warn!(error = %e, "print request failed");
            Json(PrintResponse::failed(&e))
        }
    }
}

#[instrument(skip_all, fields(body_len = body.len()))]
async fn handle(state: &AppState, body: &[u8]) -> Result<PrintJob> {
    let request: PrintRequest = serde_json::from_slice(body)
        .map_err(|e| PrintError::InvalidInput(format!("malformed request body: {e}")))?;

    let payload = payload(&request)?;
    let destination = resolve_destination(state, &request)?;

    match payload {
        Payload::Text(text) => {
            print_text(
                &text,
                state.config.text_code_page,
                destination,
                state.transport(),
            )
            .await
        }
        Payload::Document(document) => {
            let options = encode_options(state, &request.options, document.kind())?;
            print_document(
                state.rasterizer.clone(),
                document,
                options,
                destination,
                state.transport(),
            )
            .await
        }
    }
}

fn payload(request: &PrintRequest) -> Result<Payload> {
    let supplied = [
        request.content.is_some(),
        request.content_base64.is_some(),
        request.pdf_base64.is_some(),
    ]
    .iter()
    .filter(|&&s| s)
    .count();
    if supplied != 1 {
        return Err(PrintError::InvalidInput(
            "exactly one of content, contentBase64 or pdfBase64 is required".into(),
        ));
    }

    if let Some(text) = &request.content {
        return Ok(Payload::Text(text.clone()));
    }
    if let Some(encoded) = &request.content_base64 {
        return SourceDocument::from_base64(DocumentKind::RasterImage, encoded).map(Payload::Document);
    }
    match &request.pdf_base64 {
        Some(encoded) => SourceDocument::from_base64(DocumentKind::Pdf, encoded).map(Payload::Document),
        None => Err(PrintError::InvalidInput("no document supplied".into())),
    }
}

/// Explicit address first, then the registry's active printer.
fn resolve_destination(state: &AppState, request: &PrintRequest) -> Result<Destination> {
    if request.port == Some(0) {
        return Err(PrintError::InvalidInput("port must be 1-65535".into()));
    }

    let explicit = request
        .ip_address
        .as_deref()
        .map(str::trim)
        .filter(|ip| !ip.is_empty());
    if let Some(ip) = explicit {
        let port = request.port.unwrap_or(state.config.default_port);
        return Ok(Destination::new(ip, port));
    }

    let active = state
        .with_registry(|registry| registry.get_active())?
        .ok_or(PrintError::NoActivePrinter)?;
    let mut destination = active.destination();
    if let Some(port) = request.port {
        destination.port = port;
    }
    Ok(destination)
}

fn encode_options(
    state: &AppState,
    options: &PrintRequestOptions,
    kind: DocumentKind,
) -> Result<EncodeOptions> {
    let mode = options.mode.unwrap_or_default();
    let threshold = options.threshold.unwrap_or(match mode {
        PrintMode::Striped => state.config.striped_threshold,
        PrintMode::RasterBlock => state.config.raster_threshold,
    });
    let page_index = match (kind, options.page) {
        (DocumentKind::Pdf, Some(0)) => {
            return Err(PrintError::InvalidInput("page numbers start at 1".into()));
        }
        (DocumentKind::Pdf, Some(page)) => page - 1,
        _ => 0,
    };

    let target_width = options.width.unwrap_or(state.config.default_width);
    if target_width == 0 || target_width > MAX_DIMENSION {
        return Err(PrintError::InvalidInput(format!(
            "width must be 1-{MAX_DIMENSION}"
        )));
    }
    if options.dpi.is_some_and(|dpi| dpi == 0 || dpi > MAX_DPI) {
        return Err(PrintError::InvalidInput(format!("dpi must be 1-{MAX_DPI}")));
    }

    Ok(EncodeOptions {
        mode,
        render: RenderOptions {
            target_width,
            dpi: options.dpi,
            page_index,
        },
        threshold,
        grayscale: options.grayscale.unwrap_or_default(),
    })
}
