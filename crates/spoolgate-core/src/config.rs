// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Service configuration.
//
// Loaded from a JSON file; every field has a default so a partial file (or
// no file at all) is valid.  The binary layers CLI/env overrides on top.

use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Printer name used when a request does not name one.
pub const DEFAULT_PRINTER: &str = "XP-80C";

/// How a configured printer is reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrinterProtocol {
    /// IPP Print-Job; `address` is an `ipp://` or `ipps://` URI.
    Ipp,
    /// RFC 1179 LPR; `address` is `host[:port]`, `queue` the remote queue.
    Lpr,
    /// JetDirect raw socket; `address` is `host[:port]`.
    Raw,
    /// Local command-line print utility (CUPS `lp`); `queue` is the local
    /// destination, defaulting to the printer name.
    Command,
}

/// One statically configured printer destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrinterEntry {
    /// Logical name callers use in the `printer` field.
    pub name: String,
    pub protocol: PrinterProtocol,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub queue: Option<String>,
    /// Executable for the `command` protocol (default `lp`).
    #[serde(default)]
    pub command: Option<PathBuf>,
}

impl PrinterEntry {
    /// A printer reached through the local spooler's `lp` utility.
    pub fn local(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            protocol: PrinterProtocol::Command,
            address: None,
            queue: None,
            command: None,
        }
    }
}

/// Runtime settings for the dispatch service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Address the HTTP server binds to.
    pub listen_addr: SocketAddr,
    /// Largest accepted decoded document, in bytes.
    pub max_payload_bytes: u64,
    /// Directory holding staged documents.  Nothing else is written there.
    pub staging_dir: PathBuf,
    /// Total bytes that may be staged at once across all in-flight jobs.
    pub staging_capacity_bytes: u64,
    /// Destination for requests that do not name a printer.
    pub default_printer: String,
    /// Deadline for a single spooler submission.
    pub submit_timeout_ms: u64,
    /// Jobs allowed in flight before new requests are refused.
    pub max_in_flight: usize,
    /// Origins allowed to call the API cross-origin; `"*"` allows any.
    pub cors_origins: Vec<String>,
    /// SQLite file for the dispatch audit trail; disabled when unset.
    pub audit_db: Option<PathBuf>,
    /// Also resolve destinations among IPP printers advertised via mDNS.
    pub discovery: bool,
    /// Statically configured destinations.
    pub printers: Vec<PrinterEntry>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            max_payload_bytes: 20 * 1024 * 1024,
            staging_dir: std::env::temp_dir().join("spoolgate"),
            staging_capacity_bytes: 512 * 1024 * 1024,
            default_printer: DEFAULT_PRINTER.into(),
            submit_timeout_ms: 30_000,
            max_in_flight: 16,
            cors_origins: vec!["*".into()],
            audit_db: None,
            discovery: false,
            printers: vec![PrinterEntry::local(DEFAULT_PRINTER)],
        }
    }
}

impl ServiceConfig {
    /// Load and validate a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let config: Self = serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check that limits are usable and printer entries are complete.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_payload_bytes == 0 {
            return Err(ConfigError::Invalid("max_payload_bytes must be > 0".into()));
        }
        if self.staging_capacity_bytes < self.max_payload_bytes {
            return Err(ConfigError::Invalid(
                "staging_capacity_bytes must be at least max_payload_bytes".into(),
            ));
        }
        if self.submit_timeout_ms == 0 {
            return Err(ConfigError::Invalid("submit_timeout_ms must be > 0".into()));
        }
        if self.max_in_flight == 0 {
            return Err(ConfigError::Invalid("max_in_flight must be > 0".into()));
        }
        if self.default_printer.trim().is_empty() {
            return Err(ConfigError::Invalid("default_printer must not be empty".into()));
        }

        let mut seen = HashSet::new();
        for entry in &self.printers {
            if !seen.insert(entry.name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "printer '{}' is configured twice",
                    entry.name
                )));
            }
            let needs_address = !matches!(entry.protocol, PrinterProtocol::Command);
            if needs_address && entry.address.as_deref().is_none_or(str::is_empty) {
                return Err(ConfigError::Invalid(format!(
                    "printer '{}' needs an address for protocol {:?}",
                    entry.name, entry.protocol
                )));
            }
        }
        Ok(())
    }

    pub fn submit_timeout(&self) -> Duration {
        Duration::from_millis(self.submit_timeout_ms)
    }

    /// Upper bound for an HTTP request body: base64 inflates by 4/3, plus
    /// room for the JSON envelope.
    pub fn max_request_body_bytes(&self) -> usize {
        let encoded = self.max_payload_bytes.saturating_mul(4).div_ceil(3);
        usize::try_from(encoded.saturating_add(64 * 1024)).unwrap_or(usize::MAX)
    }
}
