// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for escbridge.
//
// Every variant is terminal for the print job that raised it. Nothing in the
// pipeline retries on its own; resubmitting is up to the caller.

use thiserror::Error;

/// Top-level error type for all escbridge operations.
#[derive(Debug, Error)]
pub enum PrintError {
    // -- Document errors --
    #[error("render failed: {0}")]
    Render(String),

    #[error("document has no pages")]
    EmptyDocument,

    #[error("invalid dimensions: {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    #[error("encoding failed: {0}")]
    Encoding(String),

    // -- Transport errors --
    #[error("connection to {addr} timed out after {timeout_ms}ms")]
    ConnectionTimeout { addr: String, timeout_ms: u64 },

    #[error("transport error talking to {addr}: {source}")]
    Transport {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("write to {addr} failed: {source}")]
    Write {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    // -- Request / registry errors --
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("no active printer configured")]
    NoActivePrinter,

    #[error("printer {0} not found")]
    PrinterNotFound(String),

    #[error("registry error: {0}")]
    Registry(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, PrintError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_error_keeps_source() {
        let err = PrintError::Transport {
            addr: "10.0.0.5:9100".into(),
            source: std::io::Error::from(std::io::ErrorKind::ConnectionRefused),
        };
        let source = std::error::Error::source(&err).expect("source");
        let io = source.downcast_ref::<std::io::Error>().expect("io error");
        assert_eq!(io.kind(), std::io::ErrorKind::ConnectionRefused);
        assert!(err.to_string().contains("10.0.0.5:9100"));
    }

    #[test]
    fn timeout_message_names_address_and_budget() {
        let err = PrintError::ConnectionTimeout {
            addr: "192.168.1.50:9100".into(),
            timeout_ms: 100,
        };
        assert_eq!(
            err.to_string(),
            "connection to 192.168.1.50:9100 timed out after 100ms"
        );
    }
}
