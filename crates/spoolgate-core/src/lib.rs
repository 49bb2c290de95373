// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Spoolgate Core: types, error taxonomy, and configuration shared across all
// crates.

pub mod config;
pub mod error;
pub mod options;
pub mod types;

pub use config::{PrinterEntry, PrinterProtocol, ServiceConfig};
pub use error::{ConfigError, DispatchError, StorageError};
pub use options::{ColorMode, Orientation, PrintOptions, Scale};
pub use types::*;
