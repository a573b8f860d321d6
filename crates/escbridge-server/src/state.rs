// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Shared state handed to every request handler.

use std::sync::{Arc, Mutex};

use escbridge_core::error::{PrintError, Result};
use escbridge_core::BridgeConfig;
use escbridge_document::{PdfRenderer, Rasterizer};
use escbridge_print::{PrinterRegistry, TransportOptions};

/// Registry behind a lock. Registry calls are short and synchronous; never
/// hold the guard across an `.await`.
pub type SharedRegistry = Arc<Mutex<Box<dyn PrinterRegistry>>>;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<BridgeConfig>,
    pub registry: SharedRegistry,
    /// Cloned into each encode task.
    pub rasterizer: Rasterizer,
}

impl AppState {
    pub fn new(config: BridgeConfig, registry: Box<dyn PrinterRegistry>) -> Self {
        let rasterizer = Rasterizer::new(
            PdfRenderer::new(&config.pdftoppm_path).with_timeout(config.render_timeout()),
        );
        Self {
            config: Arc::new(config),
            registry: Arc::new(Mutex::new(registry)),
            rasterizer,
        }
    }

    pub fn transport(&self) -> TransportOptions {
        TransportOptions {
            connect_timeout: self.config.connect_timeout(),
            settle_delay: self.config.settle_delay(),
        }
    }

    /// Run `f` with the registry locked.
    pub fn with_registry<T>(
        &self,
        f: impl FnOnce(&mut dyn PrinterRegistry) -> Result<T>,
    ) -> Result<T> {
        let mut guard = self
            .registry
            .lock()
            .map_err(|_| PrintError::Registry("registry lock poisoned".into()))?;
        f(&mut **guard)
    }
}
