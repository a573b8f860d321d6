// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Bridge configuration.
//
// Resolution order: built-in defaults, then `<data dir>/config.json`, then
// `ESCBRIDGE_*` environment variables.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{PrintError, Result};
use crate::types::{CodePage, RAW_PORT};

/// File name of the persisted configuration inside the data directory.
pub const CONFIG_FILE: &str = "config.json";

/// Persistent bridge settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Address the HTTP surface binds to.
    pub listen_addr: String,
    /// Printer port used when a request names an IP but no port.
    pub default_port: u16,
    /// Target dot width when a request does not give one (80mm head at 203 DPI).
    pub default_width: u32,
    /// Default threshold for `ESC *` strip printing.
    pub striped_threshold: i32,
    /// Default threshold for `GS v 0` raster block printing.
    pub raster_threshold: i32,
    pub connect_timeout_ms: u64,
    /// Pause between flushing the payload and closing the socket.
    pub settle_delay_ms: u64,
    /// Character table for plain-text receipts.
    pub text_code_page: CodePage,
    /// External PDF rasterizer (poppler's `pdftoppm`).
    pub pdftoppm_path: String,
    /// Upper bound on one `pdftoppm` run.
    pub render_timeout_ms: u64,
    /// SQLite file holding the printer registry. Relative paths resolve
    /// against the data directory.
    pub registry_path: PathBuf,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:3001".into(),
            default_port: RAW_PORT,
            default_width: 576,
            striped_threshold: 128,
            raster_threshold: 128,
            connect_timeout_ms: 10_000,
            settle_delay_ms: 500,
            text_code_page: CodePage::default(),
            pdftoppm_path: "pdftoppm".into(),
            render_timeout_ms: 30_000,
            registry_path: PathBuf::from("printers.db"),
        }
    }
}

impl BridgeConfig {
    /// Load the config from `data_dir`, writing the defaults out on first run,
    /// then apply environment overrides.
    pub fn load(data_dir: &Path) -> Result<Self> {
        let path = data_dir.join(CONFIG_FILE);
        let mut config = match std::fs::read_to_string(&path) {
            Ok(data) => {
                debug!(path = %path.display(), "loading config");
                serde_json::from_str(&data).map_err(|e| {
                    PrintError::Config(format!("{}: {}", path.display(), e))
                })?
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let config = Self::default();
                if let Err(e) = config.persist(data_dir) {
                    warn!(error = %e, "could not write default config");
                } else {
                    info!(path = %path.display(), "wrote default config");
                }
                config
            }
            Err(e) => return Err(e.into()),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Write the config as pretty-printed JSON into `data_dir`.
    pub fn persist(&self, data_dir: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(data_dir.join(CONFIG_FILE), json)?;
        Ok(())
    }

    /// Apply `ESCBRIDGE_*` overrides looked up through `lookup`.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(v) = lookup("ESCBRIDGE_LISTEN_ADDR") {
            self.listen_addr = v;
        }
        if let Some(v) = lookup("ESCBRIDGE_DEFAULT_PORT") {
            self.default_port = parse_var("ESCBRIDGE_DEFAULT_PORT", &v)?;
        }
        if let Some(v) = lookup("ESCBRIDGE_DEFAULT_WIDTH") {
            self.default_width = parse_var("ESCBRIDGE_DEFAULT_WIDTH", &v)?;
        }
        if let Some(v) = lookup("ESCBRIDGE_CONNECT_TIMEOUT_MS") {
            self.connect_timeout_ms = parse_var("ESCBRIDGE_CONNECT_TIMEOUT_MS", &v)?;
        }
        if let Some(v) = lookup("ESCBRIDGE_SETTLE_DELAY_MS") {
            self.settle_delay_ms = parse_var("ESCBRIDGE_SETTLE_DELAY_MS", &v)?;
        }
        if let Some(v) = lookup("ESCBRIDGE_TEXT_CODE_PAGE") {
            self.text_code_page = parse_var("ESCBRIDGE_TEXT_CODE_PAGE", &v)?;
        }
        if let Some(v) = lookup("ESCBRIDGE_PDFTOPPM") {
            self.pdftoppm_path = v;
        }
        if let Some(v) = lookup("ESCBRIDGE_RENDER_TIMEOUT_MS") {
            self.render_timeout_ms = parse_var("ESCBRIDGE_RENDER_TIMEOUT_MS", &v)?;
        }
        if let Some(v) = lookup("ESCBRIDGE_REGISTRY_PATH") {
            self.registry_path = PathBuf::from(v);
        }
        Ok(())
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn render_timeout(&self) -> Duration {
        Duration::from_millis(self.render_timeout_ms)
    }

    /// Registry location, resolved against `data_dir` when relative.
    pub fn registry_path_in(&self, data_dir: &Path) -> PathBuf {
        if self.registry_path.is_absolute() {
            self.registry_path.clone()
        } else {
            data_dir.join(&self.registry_path)
        }
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, value: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| PrintError::Config(format!("{key}={value:?}: {e}")))
}

/// Return the application data directory, creating it if needed.
///
/// `ESCBRIDGE_DATA_DIR` wins; otherwise the XDG data dir, then
/// `~/.local/share`.
pub fn data_dir() -> PathBuf {
    let dir = match std::env::var("ESCBRIDGE_DATA_DIR") {
        Ok(dir) => PathBuf::from(dir),
        Err(_) => dirs_fallback().join("escbridge"),
    };
    std::fs::create_dir_all(&dir).ok();
    dir
}

fn dirs_fallback() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_DATA_HOME") {
        return PathBuf::from(xdg);
    }
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".local").join("share");
    }
    // Last resort
    std::env::temp_dir()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_thermal_printer_norms() {
        let config = BridgeConfig::default();
        assert_eq!(config.default_port, 9100);
        assert_eq!(config.default_width, 576);
        assert_eq!(config.connect_timeout(), Duration::from_secs(10));
        assert_eq!(config.settle_delay(), Duration::from_millis(500));
    }

    #[test]
    fn first_load_persists_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = BridgeConfig::load(dir.path()).unwrap();
        assert!(dir.path().join(CONFIG_FILE).exists());

        let again = BridgeConfig::load(dir.path()).unwrap();
        assert_eq!(config.default_width, again.default_width);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), r#"{"default_width": 384}"#).unwrap();
        let config = BridgeConfig::load(dir.path()).unwrap();
        assert_eq!(config.default_width, 384);
        assert_eq!(config.default_port, 9100);
    }

    #[test]
    fn malformed_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), "{not json").unwrap();
        assert!(matches!(
            BridgeConfig::load(dir.path()),
            Err(PrintError::Config(_))
        ));
    }

    #[test]
    fn env_overrides_apply() {
        let mut config = BridgeConfig::default();
        config
            .apply_overrides(|key| match key {
                "ESCBRIDGE_DEFAULT_WIDTH" => Some("384".into()),
                "ESCBRIDGE_SETTLE_DELAY_MS" => Some(" 50 ".into()),
                "ESCBRIDGE_TEXT_CODE_PAGE" => Some("1252".into()),
                _ => None,
            })
            .unwrap();
        assert_eq!(config.default_width, 384);
        assert_eq!(config.settle_delay_ms, 50);
        assert_eq!(config.text_code_page, CodePage::Wpc1252);
    }

    #[test]
    fn bad_env_value_is_rejected() {
        let mut config = BridgeConfig::default();
        let err = config
            .apply_overrides(|key| (key == "ESCBRIDGE_DEFAULT_PORT").then(|| "ninety".into()))
            .unwrap_err();
        assert!(matches!(err, PrintError::Config(_)));
    }

    #[test]
    fn relative_registry_path_resolves_into_data_dir() {
        let config = BridgeConfig::default();
        let resolved = config.registry_path_in(Path::new("/var/lib/escbridge"));
        assert_eq!(resolved, PathBuf::from("/var/lib/escbridge/printers.db"));
    }
}
