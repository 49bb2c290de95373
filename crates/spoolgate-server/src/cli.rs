// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Command-line arguments.  Flags (or their environment variables) override
// values from the config file.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;

use spoolgate_core::config::ServiceConfig;
use spoolgate_core::error::ConfigError;

#[derive(Debug, Parser)]
#[command(name = "spoolgate", version, about = "HTTP print job dispatch service")]
pub struct Cli {
    /// JSON configuration file.
    #[arg(long, env = "SPOOLGATE_CONFIG", value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Address to listen on.
    #[arg(long, env = "SPOOLGATE_LISTEN", value_name = "ADDR")]
    pub listen: Option<SocketAddr>,

    /// Directory for staged documents.
    #[arg(long, env = "SPOOLGATE_STAGING_DIR", value_name = "PATH")]
    pub staging_dir: Option<PathBuf>,

    /// Printer used when a request names none.
    #[arg(long, env = "SPOOLGATE_DEFAULT_PRINTER", value_name = "NAME")]
    pub default_printer: Option<String>,

    /// Largest accepted decoded document, in bytes.
    #[arg(long, env = "SPOOLGATE_MAX_PAYLOAD_BYTES", value_name = "BYTES")]
    pub max_payload_bytes: Option<u64>,

    /// Deadline for one spooler submission, in milliseconds.
    #[arg(long, env = "SPOOLGATE_SUBMIT_TIMEOUT_MS", value_name = "MS")]
    pub submit_timeout_ms: Option<u64>,

    /// Jobs allowed in flight before requests are refused.
    #[arg(long, env = "SPOOLGATE_MAX_IN_FLIGHT", value_name = "N")]
    pub max_in_flight: Option<usize>,

    /// Allowed CORS origin; repeat for several, `*` for any.
    #[arg(
        long = "cors-origin",
        env = "SPOOLGATE_CORS_ORIGINS",
        value_delimiter = ',',
        value_name = "ORIGIN"
    )]
    pub cors_origins: Vec<String>,

    /// SQLite file for the dispatch audit trail.
    #[arg(long, env = "SPOOLGATE_AUDIT_DB", value_name = "PATH")]
    pub audit_db: Option<PathBuf>,

    /// Also resolve printers advertised via mDNS.
    #[arg(long, env = "SPOOLGATE_DISCOVERY")]
    pub discovery: bool,

    /// Emit logs as JSON lines.
    #[arg(long, env = "SPOOLGATE_LOG_JSON")]
    pub log_json: bool,
}

impl Cli {
    /// Load the config file (or defaults), apply overrides, and validate.
    pub fn resolve_config(&self) -> Result<ServiceConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => ServiceConfig::load(path)?,
            None => ServiceConfig::default(),
        };
        self.apply_overrides(&mut config);
        config.validate()?;
        Ok(config)
    }

    fn apply_overrides(&self, config: &mut ServiceConfig) {
        if let Some(listen) = self.listen {
            config.listen_addr = listen;
        }
        if let Some(dir) = &self.staging_dir {
            config.staging_dir = dir.clone();
        }
        if let Some(printer) = &self.default_printer {
            config.default_printer = printer.clone();
        }
        if let Some(max) = self.max_payload_bytes {
            config.max_payload_bytes = max;
            config.staging_capacity_bytes = config.staging_capacity_bytes.max(max);
        }
        if let Some(ms) = self.submit_timeout_ms {
            config.submit_timeout_ms = ms;
        }
        if let Some(n) = self.max_in_flight {
            config.max_in_flight = n;
        }
        if !self.cors_origins.is_empty() {
            config.cors_origins = self.cors_origins.clone();
        }
        if let Some(path) = &self.audit_db {
            config.audit_db = Some(path.clone());
        }
        if self.discovery {
            config.discovery = true;
        }
    }
}
