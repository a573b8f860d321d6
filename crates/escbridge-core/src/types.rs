// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the escbridge print bridge.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{PrintError, Result};

/// Default raw TCP port (HP JetDirect), spoken by nearly every receipt printer.
pub const RAW_PORT: u16 = 9100;

/// Unique identifier for a print job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(pub Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a registered printer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrinterId(pub Uuid);

impl PrinterId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse a printer id from its hyphenated string form.
    pub fn parse(s: &str) -> Result<Self> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| PrintError::InvalidInput(format!("bad printer id {s:?}: {e}")))
    }
}

impl Default for PrinterId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for PrinterId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Source documents
// ---------------------------------------------------------------------------

/// What a [`SourceDocument`] contains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocumentKind {
    Pdf,
    /// PNG, JPEG, or any other codec the `image` crate was built with.
    RasterImage,
}

impl DocumentKind {
    /// Guess the kind from magic bytes. Anything that is not a PDF is handed
    /// to the image decoder, which reports unsupported codecs itself.
    pub fn sniff(bytes: &[u8]) -> Self {
        if bytes.starts_with(b"%PDF-") {
            Self::Pdf
        } else {
            Self::RasterImage
        }
    }
}

/// An input document as received from the caller. Immutable once built.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    kind: DocumentKind,
    bytes: Vec<u8>,
}

impl SourceDocument {
    pub fn new(kind: DocumentKind, bytes: Vec<u8>) -> Self {
        Self { kind, bytes }
    }

    pub fn pdf(bytes: Vec<u8>) -> Self {
        Self::new(DocumentKind::Pdf, bytes)
    }

    pub fn image(bytes: Vec<u8>) -> Self {
        Self::new(DocumentKind::RasterImage, bytes)
    }

    /// Build a document whose kind is inferred from its leading bytes.
    pub fn sniffed(bytes: Vec<u8>) -> Self {
        Self::new(DocumentKind::sniff(&bytes), bytes)
    }

    /// Decode a base64 payload, accepting an optional `data:<mime>;base64,`
    /// prefix as produced by browser canvases and `FileReader`.
    pub fn from_base64(kind: DocumentKind, encoded: &str) -> Result<Self> {
        let payload = strip_data_uri(encoded.trim());
        let bytes = STANDARD
            .decode(payload)
            .map_err(|e| PrintError::InvalidInput(format!("invalid base64 payload: {e}")))?;
        if bytes.is_empty() {
            return Err(PrintError::InvalidInput("empty document payload".into()));
        }
        Ok(Self::new(kind, bytes))
    }

    pub fn kind(&self) -> DocumentKind {
        self.kind
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

fn strip_data_uri(s: &str) -> &str {
    match s.strip_prefix("data:") {
        Some(rest) => rest.split_once(',').map(|(_, body)| body).unwrap_or(rest),
        None => s,
    }
}

// ---------------------------------------------------------------------------
// Encoding options
// ---------------------------------------------------------------------------

/// ESC/POS image framing strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PrintMode {
    /// `ESC * 33` 24-dot strips, one line feed per strip.
    #[default]
    #[serde(rename = "bitmap", alias = "striped")]
    Striped,
    /// `GS v 0` single raster block.
    #[serde(rename = "raster", alias = "raster-block")]
    RasterBlock,
}

/// How RGB pixels are collapsed to one intensity before thresholding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GrayscaleFormula {
    /// `(r + g + b) / 3`. Not luminance-weighted; this is a deliberate
    /// simplification, and the default for both print modes.
    #[default]
    Average,
    /// ITU-R BT.601 weights (0.299, 0.587, 0.114).
    Luma,
}

/// Printer character table used for text receipts, selected with `ESC t n`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CodePage {
    /// Windows-1252, Western European.
    Wpc1252,
    /// Windows-1258, Vietnamese. Tone marks travel as combining characters.
    #[default]
    Wpc1258,
}

impl std::str::FromStr for CodePage {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "wpc1252" | "1252" | "windows-1252" => Ok(Self::Wpc1252),
            "wpc1258" | "1258" | "windows-1258" => Ok(Self::Wpc1258),
            other => Err(format!("unknown code page {other:?}")),
        }
    }
}

// ---------------------------------------------------------------------------
// Jobs and printers
// ---------------------------------------------------------------------------

/// Where a print job is sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Destination {
    pub host: String,
    pub port: u16,
}

impl Destination {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl std::fmt::Display for Destination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // IPv6 literals need brackets or the port is ambiguous.
        if self.host.contains(':') && !self.host.starts_with('[') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

/// One framed command stream bound for one printer. Lives for exactly one
/// TCP round trip; nothing about it is persisted.
#[derive(Debug, Clone)]
pub struct PrintJob {
    pub id: JobId,
    pub destination: Destination,
    pub mode: Option<PrintMode>,
    /// SHA-256 of the command stream, hex encoded (for log correlation).
    pub payload_hash: String,
    pub total_bytes: u64,
    pub created_at: DateTime<Utc>,
}

/// A printer known to the bridge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrinterRecord {
    pub id: PrinterId,
    pub name: String,
    pub ip_address: String,
    pub port: u16,
    /// URL of the bridge service that fronts this printer, if not this one.
    pub bridge_url: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl PrinterRecord {
    pub fn new(name: impl Into<String>, ip_address: impl Into<String>, port: u16) -> Self {
        Self {
            id: PrinterId::new(),
            name: name.into(),
            ip_address: ip_address.into(),
            port,
            bridge_url: None,
            is_active: false,
            created_at: Utc::now(),
        }
    }

    pub fn destination(&self) -> Destination {
        Destination::new(self.ip_address.clone(), self.port)
    }
}

/// Lifecycle state of the HTTP bridge server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServerStatus {
    Stopped,
    Starting,
    Running,
    Error,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sniff_detects_pdf_magic() {
        assert_eq!(DocumentKind::sniff(b"%PDF-1.7\n..."), DocumentKind::Pdf);
        assert_eq!(
            DocumentKind::sniff(&[0x89, b'P', b'N', b'G']),
            DocumentKind::RasterImage
        );
    }

    #[test]
    fn base64_accepts_data_uri() {
        let doc = SourceDocument::from_base64(
            DocumentKind::RasterImage,
            "data:image/png;base64,aGVsbG8=",
        )
        .unwrap();
        assert_eq!(doc.bytes(), b"hello");
        assert_eq!(doc.kind(), DocumentKind::RasterImage);
    }

    #[test]
    fn base64_accepts_bare_payload() {
        let doc = SourceDocument::from_base64(DocumentKind::Pdf, "  aGVsbG8=\n").unwrap();
        assert_eq!(doc.bytes(), b"hello");
    }

    #[test]
    fn bad_base64_is_invalid_input() {
        let err = SourceDocument::from_base64(DocumentKind::Pdf, "***").unwrap_err();
        assert!(matches!(err, PrintError::InvalidInput(_)));
    }

    #[test]
    fn print_mode_wire_names() {
        let mode: PrintMode = serde_json::from_str("\"bitmap\"").unwrap();
        assert_eq!(mode, PrintMode::Striped);
        let mode: PrintMode = serde_json::from_str("\"raster\"").unwrap();
        assert_eq!(mode, PrintMode::RasterBlock);
        assert_eq!(PrintMode::default(), PrintMode::Striped);
    }

    #[test]
    fn printer_record_serializes_camel_case() {
        let rec = PrinterRecord::new("Counter", "192.168.1.40", RAW_PORT);
        let json = serde_json::to_value(&rec).unwrap();
        assert_eq!(json["ipAddress"], "192.168.1.40");
        assert_eq!(json["isActive"], false);
        assert_eq!(rec.destination().to_string(), "192.168.1.40:9100");
    }

    #[test]
    fn destination_brackets_ipv6_hosts() {
        assert_eq!(Destination::new("10.0.0.5", 9100).to_string(), "10.0.0.5:9100");
        assert_eq!(Destination::new("fe80::1", 9100).to_string(), "[fe80::1]:9100");
        assert_eq!(Destination::new("[::1]", 9101).to_string(), "[::1]:9101");
        assert_eq!(Destination::new("printer.lan", 9100).to_string(), "printer.lan:9100");
    }

    #[test]
    fn code_page_parses_common_spellings() {
        assert_eq!("1252".parse::<CodePage>().unwrap(), CodePage::Wpc1252);
        assert_eq!(" Windows-1258 ".parse::<CodePage>().unwrap(), CodePage::Wpc1258);
        assert!("cp437".parse::<CodePage>().is_err());
        let page: CodePage = serde_json::from_str("\"wpc1252\"").unwrap();
        assert_eq!(page, CodePage::Wpc1252);
    }
}
