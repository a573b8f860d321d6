// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF page rendering through poppler's `pdftoppm`.
//
// The document and the rendered PNG live in a private temporary directory
// that is removed when the `TempDir` guard drops, on the success path and on
// every error path alike.

use std::fs::File;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use escbridge_core::error::{PrintError, Result};
use image::DynamicImage;
use tracing::{debug, info, instrument, warn};

/// File name the document is written to inside the scratch directory.
const INPUT_FILE: &str = "input.pdf";

/// Output prefix; `-singlefile` makes pdftoppm append only `.png`.
const OUTPUT_PREFIX: &str = "page";

/// Captured rasterizer diagnostics.
const STDERR_FILE: &str = "stderr.txt";

/// Default bound on one rasterizer run.
pub const DEFAULT_RENDER_TIMEOUT: Duration = Duration::from_secs(30);

const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// How the rendered page should be sized.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RenderScale {
    /// Ask the rasterizer for exactly this many pixels across; height follows
    /// the page aspect ratio.
    Width(u32),
    /// Render at this resolution in dots per inch.
    Dpi(u32),
}

/// Renders single PDF pages to images with an external rasterizer.
#[derive(Debug, Clone)]
pub struct PdfRenderer {
    /// Path or bare name of the `pdftoppm` binary.
    program: PathBuf,
    /// Where scratch directories are created (system temp dir when `None`).
    temp_root: Option<PathBuf>,
    /// The child is killed once it runs longer than this.
    timeout: Duration,
}

impl Default for PdfRenderer {
    fn default() -> Self {
        Self::new("pdftoppm")
    }
}

impl PdfRenderer {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            temp_root: None,
            timeout: DEFAULT_RENDER_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Create scratch directories under `root` instead of the system temp dir.
    pub fn with_temp_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.temp_root = Some(root.into());
        self
    }

    /// Render page `page_index` (0-indexed) of `pdf` and decode the result.
    #[instrument(skip(self, pdf), fields(program = %self.program.display(), pdf_len = pdf.len()))]
    pub fn render_page(
        &self,
        pdf: &[u8],
        page_index: usize,
        scale: RenderScale,
    ) -> Result<DynamicImage> {
        let scratch = match &self.temp_root {
            Some(root) => tempfile::Builder::new()
                .prefix("escbridge-")
                .tempdir_in(root),
            None => tempfile::Builder::new().prefix("escbridge-").tempdir(),
        }
        .map_err(|e| PrintError::Render(format!("cannot create scratch directory: {e}")))?;

        let input = scratch.path().join(INPUT_FILE);
        std::fs::write(&input, pdf)
            .map_err(|e| PrintError::Render(format!("cannot stage PDF for rendering: {e}")))?;
        let prefix = scratch.path().join(OUTPUT_PREFIX);

        let page = (page_index + 1).to_string();
        let mut cmd = Command::new(&self.program);
        cmd.args(["-f", page.as_str(), "-l", page.as_str(), "-png", "-singlefile"]);
        match scale {
            RenderScale::Width(width) => {
                let width = width.to_string();
                cmd.args(["-scale-to-x", width.as_str(), "-scale-to-y", "-1"]);
            }
            RenderScale::Dpi(dpi) => {
                let dpi = dpi.to_string();
                cmd.args(["-r", dpi.as_str()]);
            }
        }
        cmd.arg(&input).arg(&prefix);

        let stderr_path = scratch.path().join(STDERR_FILE);
        let stderr_file = File::create(&stderr_path)
            .map_err(|e| PrintError::Render(format!("cannot capture rasterizer output: {e}")))?;
        cmd.stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::from(stderr_file));

        debug!(?scale, page = %page, timeout_ms = self.timeout.as_millis() as u64, "running PDF rasterizer");
        let mut child = cmd.spawn().map_err(|e| {
            PrintError::Render(format!(
                "cannot run PDF rasterizer {}: {}",
                self.program.display(),
                e
            ))
        })?;

        let started = Instant::now();
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) if started.elapsed() >= self.timeout => {
                    let _ = child.kill();
                    let _ = child.wait();
                    warn!(timeout_ms = self.timeout.as_millis() as u64, "PDF rasterizer killed");
                    return Err(PrintError::Render(format!(
                        "PDF rasterizer timed out after {} ms",
                        self.timeout.as_millis()
                    )));
                }
                Ok(None) => thread::sleep(POLL_INTERVAL),
                Err(e) => {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(PrintError::Render(format!("cannot wait for PDF rasterizer: {e}")));
                }
            }
        };

        if !status.success() {
            let stderr = std::fs::read_to_string(&stderr_path).unwrap_or_default();
            warn!(status = %status, stderr = %stderr.trim(), "PDF rasterizer failed");
            return Err(PrintError::Render(format!(
                "PDF rasterizer exited with {}: {}",
                status,
                stderr.trim()
            )));
        }

        let png = prefix.with_extension("png");
        let bytes = std::fs::read(&png)
            .map_err(|e| PrintError::Render(format!("rasterizer produced no image: {e}")))?;
        let image = image::load_from_memory(&bytes)
            .map_err(|e| PrintError::Render(format!("cannot decode rendered page: {e}")))?;

        info!(
            width = image.width(),
            height = image.height(),
            "PDF page rendered"
        );
        Ok(image)
    }
}
