// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Spoolgate.

use thiserror::Error;

use crate::types::{JobId, RejectReason};

/// Top-level error returned by a dispatch.
///
/// Every variant except `InvalidPayload` carries the id of the job that was
/// created for the request, so callers can correlate with the logs.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Malformed, missing, or oversized input.  Nothing was written and no
    /// printer was contacted.
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    #[error("could not stage document: {source}")]
    Storage {
        job_id: JobId,
        #[source]
        source: StorageError,
    },

    #[error("{reason}")]
    PrinterUnavailable { job_id: JobId, reason: RejectReason },

    #[error("printer did not respond within {after_ms} ms")]
    Timeout { job_id: JobId, after_ms: u64 },
}

impl DispatchError {
    /// The job this error belongs to, if one had been created.
    pub fn job_id(&self) -> Option<JobId> {
        match self {
            Self::InvalidPayload(_) => None,
            Self::Storage { job_id, .. }
            | Self::PrinterUnavailable { job_id, .. }
            | Self::Timeout { job_id, .. } => Some(*job_id),
        }
    }

    /// Whether the caller sent something unusable (as opposed to a failure
    /// on our side or the printer's).
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::InvalidPayload(_))
    }
}

/// Failures of the ephemeral document store.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("document is empty")]
    Empty,

    #[error("document is {size} bytes, limit is {limit}")]
    TooLarge { size: u64, limit: u64 },

    #[error("staging area is full ({in_use} of {capacity} bytes in use)")]
    Saturated { in_use: u64, capacity: u64 },

    #[error("staging I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A job was asked to move to a state that is not ahead of its current one.
#[derive(Debug, Error)]
#[error("job {job_id} cannot move from {from} to {to}")]
pub struct InvalidTransition {
    pub job_id: JobId,
    pub from: &'static str,
    pub to: &'static str,
}

/// Configuration could not be loaded or is inconsistent.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, DispatchError>;
