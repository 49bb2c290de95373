// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Errors raised while building drivers and directories.  Submission failures
// are not errors here; they come back as `SpoolResult::Rejected`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DriverError {
    #[error("invalid printer address '{address}': {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("printer '{0}' has no address configured")]
    MissingAddress(String),

    #[error("mDNS discovery failed: {0}")]
    Discovery(String),
}
