// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Start-up wiring: staging area, printer directory, audit trail, dispatcher.

use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use spoolgate_core::config::ServiceConfig;
use spoolgate_core::error::{ConfigError, StorageError};
use spoolgate_print::{
    ChainedDirectory, DriverError, MdnsDirectory, PrinterDirectory, PrinterRouter,
    StaticDirectory,
};
use spoolgate_store::{AuditError, AuditLog, StagingArea, StagingLimits};

use crate::dispatch::Dispatcher;

/// Anything that stops the service from starting.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("staging area unavailable: {0}")]
    Staging(#[from] StorageError),

    #[error("printer setup failed: {0}")]
    Printers(#[from] DriverError),

    #[error(transparent)]
    Audit(#[from] AuditError),

    #[error("cannot bind {addr}: {source}")]
    Bind {
        addr: std::net::SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("server error: {0}")]
    Serve(#[source] std::io::Error),
}

/// Build a ready-to-serve dispatcher from a validated config.
///
/// Clears documents left in the staging directory by an earlier run before
/// anything new is staged.
pub async fn build_dispatcher(config: &ServiceConfig) -> Result<Dispatcher, StartupError> {
    config.validate()?;

    let staging = StagingArea::open(
        &config.staging_dir,
        StagingLimits {
            max_payload_bytes: config.max_payload_bytes,
            capacity_bytes: config.staging_capacity_bytes,
        },
    )?;
    staging.sweep_stale().await?;

    let router = PrinterRouter::new(build_directory(config)?);
    if !router.knows(&config.default_printer) {
        warn!(printer = %config.default_printer, "default printer is not configured");
    }

    let mut dispatcher = Dispatcher::new(config, staging, router);
    if let Some(path) = &config.audit_db {
        let audit = AuditLog::open(path)?;
        info!(path = %path.display(), "dispatch audit enabled");
        dispatcher = dispatcher.with_audit(audit);
    }
    Ok(dispatcher)
}

/// Static printers first, then (if enabled) printers found via mDNS.
fn build_directory(config: &ServiceConfig) -> Result<Arc<dyn PrinterDirectory>, DriverError> {
    let configured = StaticDirectory::from_config(&config.printers)?;
    if !config.discovery {
        return Ok(Arc::new(configured));
    }

    // Multicast may be unavailable (containers, CI); serve the static
    // printers anyway.
    match MdnsDirectory::start() {
        Ok(mdns) => Ok(Arc::new(
            ChainedDirectory::new()
                .then(Arc::new(configured))
                .then(Arc::new(mdns)),
        )),
        Err(e) => {
            warn!(error = %e, "mDNS discovery unavailable, using configured printers only");
            Ok(Arc::new(configured))
        }
    }
}
